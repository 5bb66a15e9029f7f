//! Undo log for the fields of one object

use std::collections::BTreeMap;
use txlog_core::{
    FieldOffset, FieldValue, Heap, ObjRef, RootInfo, RootType, RootVisitor, ARRAY_LENGTH_OFFSET,
    CLASS_OFFSET,
};

/// Pre-transaction content of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedField {
    /// Value observed before the first write in the transaction
    pub value: FieldValue,
    /// Whether the field is restored with volatile ordering
    pub is_volatile: bool,
}

/// Field offset -> pre-transaction value, for one object
///
/// Only the first write to an offset is logged; that original value is all
/// rollback needs.
#[derive(Debug, Clone, Default)]
pub struct ObjectLog {
    field_values: BTreeMap<FieldOffset, LoggedField>,
}

impl ObjectLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the value of `offset` unless it was logged already
    pub fn log_value(&mut self, offset: FieldOffset, value: FieldValue, is_volatile: bool) {
        self.field_values
            .entry(offset)
            .or_insert(LoggedField { value, is_volatile });
    }

    /// Logged entry for `offset`
    pub fn get(&self, offset: FieldOffset) -> Option<&LoggedField> {
        self.field_values.get(&offset)
    }

    /// Number of logged fields
    pub fn len(&self) -> usize {
        self.field_values.len()
    }

    /// Whether nothing is logged
    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty()
    }

    /// Restore every logged field of `obj`
    ///
    /// The class slot and, for arrays, the length slot are never restored:
    /// the collector reads both to size and type the object at any point,
    /// including in the middle of a rollback.
    ///
    /// # Panics
    ///
    /// Panics if the heap rejects a restoring write; a logged field that can
    /// no longer be written means the object model broke an invariant.
    pub fn undo(&self, heap: &dyn Heap, obj: ObjRef) {
        let is_array = heap.array_component(obj).is_some();
        for (&offset, field) in &self.field_values {
            if offset == CLASS_OFFSET {
                continue;
            }
            if is_array && offset == ARRAY_LENGTH_OFFSET {
                continue;
            }
            if let Err(e) = heap.write_field(obj, offset, field.value, field.is_volatile) {
                panic!("Failed to restore field {} of {}: {}", offset, obj, e);
            }
        }
    }

    /// Visit every non-null reference value waiting to be restored
    pub fn visit_roots(&mut self, visitor: &mut dyn RootVisitor) {
        for field in self.field_values.values_mut() {
            if let FieldValue::Reference(target) = &mut field.value {
                visitor.visit_root_if_non_null(target, RootInfo::new(RootType::Unknown));
            }
        }
    }
}
