//! Undo log for the elements of one primitive array

use std::collections::BTreeMap;
use txlog_core::{ArrayElement, ComponentType, Heap, ObjRef};

/// Element index -> pre-transaction raw value, for one primitive array
///
/// Reference arrays never reach this log: their element slots are heap
/// references and are logged through the object field path, which keeps
/// them visible to the collector.
#[derive(Debug, Clone, Default)]
pub struct ArrayLog {
    array_values: BTreeMap<usize, u64>,
}

impl ArrayLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the raw value of element `index` unless it was logged already
    pub fn log_value(&mut self, index: usize, value: u64) {
        self.array_values.entry(index).or_insert(value);
    }

    /// Logged raw value of element `index`
    pub fn get(&self, index: usize) -> Option<u64> {
        self.array_values.get(&index).copied()
    }

    /// Number of logged elements
    pub fn len(&self) -> usize {
        self.array_values.len()
    }

    /// Whether nothing is logged
    pub fn is_empty(&self) -> bool {
        self.array_values.is_empty()
    }

    /// Restore every logged element of `array`
    ///
    /// # Panics
    ///
    /// Panics if `array` is a reference array or not an array at all, or if
    /// the heap rejects a restoring write.
    pub fn undo(&self, heap: &dyn Heap, array: ObjRef) {
        let component = match heap.array_component(array) {
            Some(ComponentType::Primitive(ty)) => ty,
            Some(ComponentType::Reference) => {
                panic!("Reference array {} must be logged as an object", array)
            }
            None => panic!("Array log recorded for non-array {}", array),
        };
        for (&index, &raw) in &self.array_values {
            let value = ArrayElement::from_raw(component, raw);
            if let Err(e) = heap.write_element(array, index, value) {
                panic!("Failed to restore element {} of {}: {}", index, array, e);
            }
        }
    }
}
