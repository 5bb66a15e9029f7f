//! Object representation for the in-memory heap
//!
//! Objects keep their fields in a slot map keyed by offset. The two header
//! slots (class and, for arrays, length) are not stored in that map; they are
//! synthesized on read and applied to the header on write so that a stray
//! header write is visible as a real change of class or length.

use rustc_hash::FxHashMap;
use txlog_core::{
    ArrayElement, ComponentType, Error, FieldKind, FieldOffset, FieldValue, ObjRef, PrimitiveType,
    Result, StringIndex, ARRAY_LENGTH_OFFSET, CLASS_OFFSET,
};

/// Region an object was allocated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// Read-only platform image; never moved by the collector
    Image,
    /// Regular movable space
    Regular,
}

/// Shape-specific part of an object
#[derive(Debug, Clone)]
pub(crate) enum Body {
    Class {
        name: String,
        extension_referenceable: bool,
    },
    Instance,
    PrimitiveArray {
        component: PrimitiveType,
        elements: Vec<ArrayElement>,
    },
    ReferenceArray {
        length: usize,
    },
    String {
        value: String,
    },
    StringCache {
        slots: Vec<Option<ObjRef>>,
    },
}

/// A live object
#[derive(Debug, Clone)]
pub(crate) struct HeapObject {
    pub(crate) class: ObjRef,
    pub(crate) space: Space,
    pub(crate) fields: FxHashMap<FieldOffset, FieldValue>,
    pub(crate) body: Body,
}

impl HeapObject {
    pub(crate) fn new(class: ObjRef, space: Space, body: Body) -> Self {
        HeapObject {
            class,
            space,
            fields: FxHashMap::default(),
            body,
        }
    }

    pub(crate) fn is_class(&self) -> bool {
        matches!(self.body, Body::Class { .. })
    }

    pub(crate) fn component(&self) -> Option<ComponentType> {
        match &self.body {
            Body::PrimitiveArray { component, .. } => Some(ComponentType::Primitive(*component)),
            Body::ReferenceArray { .. } => Some(ComponentType::Reference),
            _ => None,
        }
    }

    pub(crate) fn length(&self) -> Option<usize> {
        match &self.body {
            Body::PrimitiveArray { elements, .. } => Some(elements.len()),
            Body::ReferenceArray { length } => Some(*length),
            _ => None,
        }
    }

    pub(crate) fn read_field(
        &self,
        me: ObjRef,
        offset: FieldOffset,
        kind: FieldKind,
    ) -> Result<FieldValue> {
        let value = match (offset, self.length()) {
            (CLASS_OFFSET, _) => FieldValue::Reference(Some(self.class)),
            (ARRAY_LENGTH_OFFSET, Some(len)) => FieldValue::Int32(len as u32),
            _ => self
                .fields
                .get(&offset)
                .copied()
                .unwrap_or_else(|| FieldValue::zero(kind)),
        };
        if value.kind() != kind {
            return Err(Error::FieldKindMismatch {
                object: me,
                offset,
                expected: value.kind(),
                actual: kind,
            });
        }
        Ok(value)
    }

    pub(crate) fn write_field(
        &mut self,
        me: ObjRef,
        offset: FieldOffset,
        value: FieldValue,
    ) -> Result<()> {
        if offset == CLASS_OFFSET {
            return match value {
                FieldValue::Reference(Some(class)) => {
                    self.class = class;
                    Ok(())
                }
                other => Err(Error::FieldKindMismatch {
                    object: me,
                    offset,
                    expected: FieldKind::Reference,
                    actual: other.kind(),
                }),
            };
        }
        if offset == ARRAY_LENGTH_OFFSET && self.length().is_some() {
            let FieldValue::Int32(len) = value else {
                return Err(Error::FieldKindMismatch {
                    object: me,
                    offset,
                    expected: FieldKind::Int32,
                    actual: value.kind(),
                });
            };
            self.set_length(len as usize);
            return Ok(());
        }
        if let Some(existing) = self.fields.get(&offset) {
            if existing.kind() != value.kind() {
                return Err(Error::FieldKindMismatch {
                    object: me,
                    offset,
                    expected: existing.kind(),
                    actual: value.kind(),
                });
            }
        }
        self.fields.insert(offset, value);
        Ok(())
    }

    fn set_length(&mut self, len: usize) {
        match &mut self.body {
            Body::PrimitiveArray { component, elements } => {
                elements.resize(len, component.zero());
            }
            Body::ReferenceArray { length } => *length = len,
            _ => {}
        }
    }

    pub(crate) fn elements(&self, me: ObjRef) -> Result<(&PrimitiveType, &Vec<ArrayElement>)> {
        match &self.body {
            Body::PrimitiveArray { component, elements } => Ok((component, elements)),
            Body::ReferenceArray { .. } => Err(Error::ReferenceArray(me)),
            _ => Err(Error::NotAnArray(me)),
        }
    }

    pub(crate) fn elements_mut(
        &mut self,
        me: ObjRef,
    ) -> Result<(PrimitiveType, &mut Vec<ArrayElement>)> {
        match &mut self.body {
            Body::PrimitiveArray { component, elements } => Ok((*component, elements)),
            Body::ReferenceArray { .. } => Err(Error::ReferenceArray(me)),
            _ => Err(Error::NotAnArray(me)),
        }
    }

    pub(crate) fn string_slots(&self, me: ObjRef) -> Result<&Vec<Option<ObjRef>>> {
        match &self.body {
            Body::StringCache { slots } => Ok(slots),
            _ => Err(Error::NotAStringCache(me)),
        }
    }

    pub(crate) fn string_slot_mut(
        &mut self,
        me: ObjRef,
        index: StringIndex,
    ) -> Result<&mut Option<ObjRef>> {
        match &mut self.body {
            Body::StringCache { slots } => {
                let count = slots.len() as u32;
                slots
                    .get_mut(index.0 as usize)
                    .ok_or_else(|| Error::string_index(me, index, count))
            }
            _ => Err(Error::NotAStringCache(me)),
        }
    }

    /// Rewrite every reference this object holds through `forward`
    pub(crate) fn forward_references(&mut self, forward: &impl Fn(ObjRef) -> ObjRef) {
        self.class = forward(self.class);
        for value in self.fields.values_mut() {
            if let FieldValue::Reference(Some(target)) = value {
                *target = forward(*target);
            }
        }
        if let Body::StringCache { slots } = &mut self.body {
            for slot in slots.iter_mut().flatten() {
                *slot = forward(*slot);
            }
        }
    }
}
