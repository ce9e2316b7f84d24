// Line-oriented, checksummed frame decoder for the instrument's TCP feed
//
// Frame layout (CR LF terminated):
//   $<seq>,<net>,<sta>,<loc>,<chan>,<timestamp_ms>,<sample_rate>,<s1>,...,<sN>,*<CC>
// CC is the XOR of every little-endian byte of every sample as an i32.
use crate::domain::error::FrameError;
use crate::domain::telemetry::SampleRecord;
use bytes::{Buf, BytesMut};
use chrono::DateTime;

const TERMINATOR: &[u8; 2] = b"\r\n";
const CHECKSUM_MARKER: char = '*';
const FIELD_DELIMITER: char = ',';
const HEADER_FIELDS: usize = 7;

/// Longest frame accepted before the buffered bytes are discarded.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Accumulates transport bytes and yields decoded frames.
///
/// Partial trailing data stays buffered until its terminator arrives, up to
/// `max_frame_len` bytes. The terminator search resumes where the previous
/// one stopped.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    scanned: usize,
    max_frame_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_frame_len: max_frame_len.max(1),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn find_terminator(&mut self) -> Option<usize> {
        // Step back one byte so a terminator split across reads is found.
        let from = self.scanned.saturating_sub(TERMINATOR.len() - 1);
        match self.buffer[from..]
            .windows(TERMINATOR.len())
            .position(|w| w == TERMINATOR)
        {
            Some(offset) => {
                self.scanned = 0;
                Some(from + offset)
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Next complete frame, skipping blank lines. `None` once only a partial
    /// frame (or nothing) remains. An unterminated run longer than the
    /// maximum frame length is dropped and reported as malformed.
    pub fn next_frame(&mut self) -> Option<Result<SampleRecord, FrameError>> {
        loop {
            let Some(end) = self.find_terminator() else {
                if self.buffer.len() > self.max_frame_len {
                    let dropped = self.buffer.len();
                    self.buffer.clear();
                    self.scanned = 0;
                    return Some(Err(FrameError::malformed(format!(
                        "no terminator within {} bytes, dropped {dropped} bytes",
                        self.max_frame_len
                    ))));
                }
                return None;
            };
            let line = self.buffer.split_to(end);
            self.buffer.advance(TERMINATOR.len());

            if line.len() > self.max_frame_len {
                return Some(Err(FrameError::malformed(format!(
                    "frame of {} bytes exceeds {} bytes",
                    line.len(),
                    self.max_frame_len
                ))));
            }

            let text = match std::str::from_utf8(&line) {
                Ok(text) => text,
                Err(_) => return Some(Err(FrameError::malformed("frame is not valid UTF-8"))),
            };
            if text.trim().is_empty() {
                continue;
            }
            return Some(decode_frame(text));
        }
    }

    /// Decode every complete frame currently buffered.
    pub fn drain(&mut self) -> Vec<Result<SampleRecord, FrameError>> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }
}

/// XOR of every byte of every value's little-endian i32 encoding.
pub fn checksum(values: &[i32]) -> u8 {
    values
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .fold(0u8, |acc, b| acc ^ b)
}

/// Decode a single frame with the terminator already stripped.
pub fn decode_frame(frame: &str) -> Result<SampleRecord, FrameError> {
    let frame = frame.trim();
    let marker = frame
        .rfind(CHECKSUM_MARKER)
        .ok_or_else(|| FrameError::malformed("missing checksum marker"))?;

    let claimed_hex = frame[marker + 1..].trim();
    if claimed_hex.len() != 2 {
        return Err(FrameError::malformed(format!(
            "checksum must be two hex digits, got {claimed_hex:?}"
        )));
    }
    let claimed = u8::from_str_radix(claimed_hex, 16)
        .map_err(|_| FrameError::malformed(format!("invalid checksum digits {claimed_hex:?}")))?;

    let payload = frame[..marker].strip_prefix('$').unwrap_or(&frame[..marker]);
    let mut fields: Vec<&str> = payload.split(FIELD_DELIMITER).collect();
    if fields.last().is_some_and(|f| f.trim().is_empty()) {
        fields.pop();
    }
    if fields.len() <= HEADER_FIELDS {
        return Err(FrameError::malformed(format!(
            "expected at least {} fields, got {}",
            HEADER_FIELDS + 1,
            fields.len()
        )));
    }

    let (header, sample_fields) = fields.split_at(HEADER_FIELDS);
    let samples = sample_fields
        .iter()
        .map(|f| parse_int::<i32>(f, "sample"))
        .collect::<Result<Vec<_>, _>>()?;

    let computed = checksum(&samples);
    if claimed != computed {
        return Err(FrameError::ChecksumMismatch { claimed, computed });
    }

    // Sequence numbers are parsed but not checked for continuity.
    parse_int::<u64>(header[0], "sequence")?;
    let timestamp_ms = parse_int::<i64>(header[5], "timestamp")?;
    let sample_rate = parse_int::<u32>(header[6], "sample rate")?;

    let start_time = DateTime::from_timestamp_millis(timestamp_ms)
        .ok_or_else(|| FrameError::malformed(format!("timestamp {timestamp_ms} out of range")))?;

    SampleRecord::new(
        header[1].trim().to_string(),
        header[2].trim().to_string(),
        header[3].trim().to_string(),
        header[4].trim().to_string(),
        sample_rate as f64,
        start_time,
        samples.into_iter().map(f64::from).collect(),
    )
    .map_err(FrameError::from)
}

fn parse_int<T: std::str::FromStr>(field: &str, what: &str) -> Result<T, FrameError> {
    field
        .trim()
        .parse::<T>()
        .map_err(|_| FrameError::malformed(format!("{what} field {field:?} is not an integer")))
}

/// Render a record as a wire frame, terminator included.
#[cfg(test)]
pub fn encode_frame(seq: u64, record: &SampleRecord) -> String {
    let samples: Vec<i32> = record.samples().iter().map(|&s| s as i32).collect();
    let body: String = samples.iter().map(|s| format!("{s},")).collect();
    format!(
        "${},{},{},{},{},{},{},{}*{:02X}\r\n",
        seq,
        record.network(),
        record.station(),
        record.location(),
        record.channel(),
        record.start_time().timestamp_millis(),
        record.sample_rate() as u32,
        body,
        checksum(&samples)
    )
}

#[cfg(test)]
pub fn test_record(channel: &str, rate: u32, samples: Vec<i32>, timestamp_ms: i64) -> SampleRecord {
    SampleRecord::new(
        "AS".to_string(),
        "SHAKE".to_string(),
        "00".to_string(),
        channel.to_string(),
        rate as f64,
        DateTime::from_timestamp_millis(timestamp_ms).unwrap(),
        samples.into_iter().map(f64::from).collect(),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::RecordInvariant;

    #[test]
    fn test_round_trip() {
        let record = test_record("EHZ", 100, vec![-1, 0, 2_147_483_647, -2_147_483_648, 42], 1_700_000_000_123);
        let mut decoder = FrameDecoder::new();
        decoder.extend(encode_frame(7, &record).as_bytes());

        let decoded = decoder.next_frame().unwrap().unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.start_time().timestamp_subsec_millis(), 123);
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn test_checksum_over_negative_values() {
        // -1 encodes as FF FF FF FF, so two of them cancel out
        assert_eq!(checksum(&[-1, -1]), 0);
        assert_eq!(checksum(&[-1]), 0);
        assert_eq!(checksum(&[0x0102_0304]), 0x01 ^ 0x02 ^ 0x03 ^ 0x04);
    }

    #[test]
    fn test_known_frame() {
        let frame = format!("$1,AS,SHAKE,00,EHE,1000,100,1,2,3,*{:02X}", checksum(&[1, 2, 3]));
        let record = decode_frame(&frame).unwrap();
        assert_eq!(record.channel(), "EHE");
        assert_eq!(record.samples(), &[1.0, 2.0, 3.0]);
        assert_eq!(record.sample_rate(), 100.0);
        assert_eq!(record.start_time().timestamp(), 1);
    }

    #[test]
    fn test_flipped_sample_byte_is_rejected() {
        let samples = vec![120, -340, 560, 78];
        for index in 0..samples.len() {
            for bit in 0..8 {
                let mut corrupted = samples.clone();
                corrupted[index] ^= 1 << bit;
                let body: String = corrupted.iter().map(|s| format!("{s},")).collect();
                let frame = format!("$1,AS,SHAKE,00,EHZ,0,100,{body}*{:02X}", checksum(&samples));
                assert!(matches!(
                    decode_frame(&frame),
                    Err(FrameError::ChecksumMismatch { .. })
                ));
            }
        }
    }

    #[test]
    fn test_missing_marker_is_malformed() {
        let result = decode_frame("$1,AS,SHAKE,00,EHZ,0,100,1,2,3,");
        assert!(matches!(result, Err(FrameError::MalformedFrame(_))));
    }

    #[test]
    fn test_non_integer_fields_are_malformed() {
        let sum = checksum(&[1, 2]);
        assert!(matches!(
            decode_frame(&format!("$1,AS,SHAKE,00,EHZ,abc,100,1,2,*{sum:02X}")),
            Err(FrameError::MalformedFrame(_))
        ));
        assert!(matches!(
            decode_frame(&format!("$1,AS,SHAKE,00,EHZ,0,1.5,1,2,*{sum:02X}")),
            Err(FrameError::MalformedFrame(_))
        ));
        assert!(matches!(
            decode_frame("$1,AS,SHAKE,00,EHZ,0,100,1,x,*00"),
            Err(FrameError::MalformedFrame(_))
        ));
        assert_eq!(
            decode_frame(&format!("$1,AS,SHAKE,00,EHZ,0,0,1,2,*{sum:02X}")),
            Err(FrameError::InvalidRecord(RecordInvariant::NonPositiveRate))
        );
        assert!(decode_frame(&format!("$1,AS,SHAKE,00,EZ,0,100,1,2,*{sum:02X}"))
            .unwrap_err()
            .is_malformed());
    }

    #[test]
    fn test_frame_without_samples_is_malformed() {
        assert!(matches!(
            decode_frame("$1,AS,SHAKE,00,EHZ,0,100,*00"),
            Err(FrameError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_partial_frames_stay_buffered() {
        let record = test_record("EHN", 50, vec![5, -5, 10], 2_000);
        let wire = encode_frame(3, &record);
        let (head, tail) = wire.as_bytes().split_at(wire.len() / 2);

        let mut decoder = FrameDecoder::new();
        decoder.extend(head);
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.buffered(), head.len());

        decoder.extend(tail);
        assert_eq!(decoder.next_frame().unwrap().unwrap(), record);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_unterminated_noise_is_bounded() {
        let mut decoder = FrameDecoder::new();
        let noise = vec![b'A'; 4096];
        let mut discarded = 0;
        for _ in 0..64 {
            decoder.extend(&noise);
            for result in decoder.drain() {
                assert!(matches!(result, Err(FrameError::MalformedFrame(_))));
                discarded += 1;
            }
            assert!(decoder.buffered() <= MAX_FRAME_LEN);
        }
        assert!(discarded >= 3);

        // The stream recovers once a terminator shows up.
        let record = test_record("EHZ", 100, vec![1, 2, 3], 0);
        decoder.extend(b"\r\n");
        decoder.extend(encode_frame(1, &record).as_bytes());
        let results = decoder.drain();
        assert_eq!(results.last().unwrap().as_ref().unwrap(), &record);
    }

    #[test]
    fn test_oversized_terminated_frame_is_malformed() {
        let mut decoder = FrameDecoder::with_max_frame_len(16);
        decoder.extend(b"$1,AS,SHAKE,00,EHZ,0,100,1,2,3,*00\r\n");
        assert!(matches!(
            decoder.next_frame(),
            Some(Err(FrameError::MalformedFrame(_)))
        ));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_terminator_split_across_reads() {
        let record = test_record("EHE", 100, vec![4, 5], 0);
        let wire = encode_frame(9, &record);
        let (body, crlf) = wire.as_bytes().split_at(wire.len() - 1);

        let mut decoder = FrameDecoder::new();
        decoder.extend(body);
        assert!(decoder.next_frame().is_none());
        decoder.extend(crlf);
        assert_eq!(decoder.next_frame().unwrap().unwrap(), record);
    }

    #[test]
    fn test_blank_lines_skipped_and_bad_frames_do_not_stop_stream() {
        let good = test_record("EHZ", 100, vec![1, 2, 3], 0);
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"\r\n   \r\n");
        decoder.extend(b"$1,AS,SHAKE,00,EHZ,0,100,1,2,3,*FF\r\n");
        decoder.extend(b"garbage\r\n");
        decoder.extend(encode_frame(2, &good).as_bytes());

        let results = decoder.drain();
        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Err(FrameError::ChecksumMismatch { .. })));
        assert!(matches!(results[1], Err(FrameError::MalformedFrame(_))));
        assert_eq!(results[2].as_ref().unwrap(), &good);
    }
}
