// Channel router - Latest record per axis, last writer wins
use crate::domain::telemetry::{Axis, SampleRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Versioned snapshot of a slot. `version` increases on every write.
#[derive(Debug, Clone)]
pub struct SlotValue {
    pub version: u64,
    pub record: Arc<SampleRecord>,
}

/// Single-record holder. Writers swap in a fully built record under the lock,
/// so readers see either the previous record or the new one.
#[derive(Debug, Default)]
pub struct AxisSlot {
    inner: Mutex<Option<SlotValue>>,
}

impl AxisSlot {
    fn lock(&self) -> MutexGuard<'_, Option<SlotValue>> {
        // A panicking writer cannot leave a half-written record behind, so the
        // value is still valid after poisoning.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, record: SampleRecord) {
        let record = Arc::new(record);
        let mut guard = self.lock();
        let version = guard.as_ref().map_or(1, |v| v.version + 1);
        *guard = Some(SlotValue { version, record });
    }

    pub fn get(&self) -> Option<SlotValue> {
        self.lock().clone()
    }
}

#[derive(Debug)]
pub struct ChannelRouter {
    slots: HashMap<Axis, AxisSlot>,
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self::new(&Axis::ALL)
    }
}

impl ChannelRouter {
    pub fn new(axes: &[Axis]) -> Self {
        Self {
            slots: axes.iter().map(|&axis| (axis, AxisSlot::default())).collect(),
        }
    }

    pub fn axes(&self) -> Vec<Axis> {
        let mut axes: Vec<Axis> = self.slots.keys().copied().collect();
        axes.sort();
        axes
    }

    /// Overwrite the slot for `axis`. Returns false if the axis is not routed.
    pub fn set(&self, axis: Axis, record: SampleRecord) -> bool {
        match self.slots.get(&axis) {
            Some(slot) => {
                slot.set(record);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, axis: Axis) -> Option<SlotValue> {
        self.slots.get(&axis).and_then(AxisSlot::get)
    }

    /// Route a record by the component character of its channel code.
    pub fn route(&self, record: SampleRecord) -> Option<Axis> {
        let axis = record.axis()?;
        if self.set(axis, record) {
            Some(axis)
        } else {
            None
        }
    }
}
