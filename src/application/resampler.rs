// Resampler - Bring a record to the display rate
use crate::domain::telemetry::SampleRecord;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMethod {
    /// Rates already match, the input is returned untouched.
    Passthrough,
    /// Linear interpolation within the record's own span.
    Linear,
    /// Too few input samples to interpolate; the value is held.
    Held,
}

#[derive(Debug, Clone)]
pub struct Resampled<'a> {
    pub record: Cow<'a, SampleRecord>,
    pub method: ResampleMethod,
}

/// Number of output samples for `input_len` samples taken at `rate_in` when
/// re-expressed at `rate_out`. Never zero.
pub fn output_len(input_len: usize, rate_in: f64, rate_out: f64) -> usize {
    ((input_len as f64 * rate_out / rate_in).round() as usize).max(1)
}

/// Resample `record` to `target_rate`.
///
/// Interpolation never reaches across record boundaries; positions past the
/// last input sample hold the last value.
pub fn resample(record: &SampleRecord, target_rate: f64) -> Resampled<'_> {
    let rate_in = record.sample_rate();
    if rate_in == target_rate || !target_rate.is_finite() || target_rate <= 0.0 {
        return Resampled {
            record: Cow::Borrowed(record),
            method: ResampleMethod::Passthrough,
        };
    }

    let input = record.samples();
    let len = output_len(input.len(), rate_in, target_rate);

    let (samples, method) = if input.len() < 2 {
        (vec![input[0]; len], ResampleMethod::Held)
    } else {
        let step = rate_in / target_rate;
        let last = input.len() - 1;
        let samples = (0..len)
            .map(|k| {
                let position = k as f64 * step;
                let lower = (position.floor() as usize).min(last);
                let upper = (lower + 1).min(last);
                let fraction = position - lower as f64;
                if lower == upper {
                    input[lower]
                } else {
                    input[lower] + (input[upper] - input[lower]) * fraction
                }
            })
            .collect();
        (samples, ResampleMethod::Linear)
    };

    match record.with_samples(target_rate, samples) {
        Ok(resampled) => Resampled {
            record: Cow::Owned(resampled),
            method,
        },
        // Unreachable with a positive target rate and a non-empty output,
        // but never fail a tick over it.
        Err(_) => Resampled {
            record: Cow::Borrowed(record),
            method: ResampleMethod::Passthrough,
        },
    }
}
