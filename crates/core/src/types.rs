//! Core value types shared by the heap, the collector and the transaction log
//!
//! - ObjRef: collector-movable handle to a managed object
//! - FieldOffset: byte offset of a field inside an object
//! - FieldValue: typed field payload (one variant per field kind)
//! - PrimitiveType / ArrayElement: primitive array component types and values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a managed object.
///
/// An `ObjRef` plays the role of an object address: it is stable only between
/// collection pauses. A moving collector may hand out a new `ObjRef` for the
/// same object, and every holder of the old one is expected to update it
/// when its roots are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjRef(u64);

impl ObjRef {
    /// Create a handle from a raw address
    pub const fn from_raw(raw: u64) -> Self {
        ObjRef(raw)
    }

    /// Raw address of this handle
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Byte offset of a field within an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldOffset(u32);

impl FieldOffset {
    /// Create an offset
    pub const fn new(offset: u32) -> Self {
        FieldOffset(offset)
    }

    /// Offset as a plain integer
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FieldOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.0)
    }
}

/// Offset of the class-identity slot present in every object header.
pub const CLASS_OFFSET: FieldOffset = FieldOffset::new(0);

/// Offset of the length slot present in every array header.
pub const ARRAY_LENGTH_OFFSET: FieldOffset = FieldOffset::new(8);

/// Offset of the first element slot of an array.
pub const ARRAY_DATA_OFFSET: u32 = 12;

/// Size of a reference element slot in a reference array.
pub const REFERENCE_SLOT_SIZE: u32 = 4;

impl FieldOffset {
    /// Offset of element `index` in a reference array.
    ///
    /// Reference array elements are ordinary reference slots of the array
    /// object, so they go through the field path rather than the primitive
    /// element path.
    pub fn reference_element(index: usize) -> Self {
        FieldOffset(ARRAY_DATA_OFFSET + REFERENCE_SLOT_SIZE * index as u32)
    }
}

/// Index into a string-resolution cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StringIndex(pub u32);

/// Kind of a field slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// `boolean`, stored as one byte
    Boolean,
    /// Signed 8-bit
    Byte,
    /// Unsigned 16-bit
    Char,
    /// Signed 16-bit
    Short,
    /// Any 32-bit value (int, float)
    Int32,
    /// Any 64-bit value (long, double)
    Int64,
    /// Object reference
    Reference,
}

/// Typed content of a field slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// `boolean` field (0 or 1)
    Boolean(u8),
    /// `byte` field
    Byte(i8),
    /// `char` field
    Char(u16),
    /// `short` field
    Short(i16),
    /// 32-bit field
    Int32(u32),
    /// 64-bit field
    Int64(u64),
    /// Reference field, `None` is null
    Reference(Option<ObjRef>),
}

impl FieldValue {
    /// Kind of this value
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Boolean(_) => FieldKind::Boolean,
            FieldValue::Byte(_) => FieldKind::Byte,
            FieldValue::Char(_) => FieldKind::Char,
            FieldValue::Short(_) => FieldKind::Short,
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::Int64(_) => FieldKind::Int64,
            FieldValue::Reference(_) => FieldKind::Reference,
        }
    }

    /// Zero value of a kind (what a freshly allocated slot holds)
    pub fn zero(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Boolean => FieldValue::Boolean(0),
            FieldKind::Byte => FieldValue::Byte(0),
            FieldKind::Char => FieldValue::Char(0),
            FieldKind::Short => FieldValue::Short(0),
            FieldKind::Int32 => FieldValue::Int32(0),
            FieldKind::Int64 => FieldValue::Int64(0),
            FieldKind::Reference => FieldValue::Reference(None),
        }
    }

    /// Referenced object, if this is a non-null reference
    pub fn as_reference(&self) -> Option<ObjRef> {
        match self {
            FieldValue::Reference(r) => *r,
            _ => None,
        }
    }
}

/// Primitive component type of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// `boolean[]`
    Boolean,
    /// `byte[]`
    Byte,
    /// `char[]`
    Char,
    /// `short[]`
    Short,
    /// `int[]`
    Int,
    /// `float[]`
    Float,
    /// `long[]`
    Long,
    /// `double[]`
    Double,
}

impl PrimitiveType {
    /// Zero element of this type
    pub fn zero(self) -> ArrayElement {
        ArrayElement::from_raw(self, 0)
    }
}

/// Typed primitive array element
///
/// Elements travel through the array log as raw 64-bit words. Floating point
/// values are carried by bit pattern, so `from_raw(t, e.to_raw())` gives back
/// exactly `e` for every type, NaN payloads included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ArrayElement {
    /// `boolean` element
    Boolean(u8),
    /// `byte` element
    Byte(i8),
    /// `char` element
    Char(u16),
    /// `short` element
    Short(i16),
    /// `int` element
    Int(i32),
    /// `float` element
    Float(f32),
    /// `long` element
    Long(i64),
    /// `double` element
    Double(f64),
}

impl ArrayElement {
    /// Component type of this element
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            ArrayElement::Boolean(_) => PrimitiveType::Boolean,
            ArrayElement::Byte(_) => PrimitiveType::Byte,
            ArrayElement::Char(_) => PrimitiveType::Char,
            ArrayElement::Short(_) => PrimitiveType::Short,
            ArrayElement::Int(_) => PrimitiveType::Int,
            ArrayElement::Float(_) => PrimitiveType::Float,
            ArrayElement::Long(_) => PrimitiveType::Long,
            ArrayElement::Double(_) => PrimitiveType::Double,
        }
    }

    /// Widen to the raw word stored in the array log
    pub fn to_raw(self) -> u64 {
        match self {
            ArrayElement::Boolean(v) => u64::from(v),
            ArrayElement::Byte(v) => v as u8 as u64,
            ArrayElement::Char(v) => u64::from(v),
            ArrayElement::Short(v) => v as u16 as u64,
            ArrayElement::Int(v) => v as u32 as u64,
            ArrayElement::Float(v) => u64::from(v.to_bits()),
            ArrayElement::Long(v) => v as u64,
            ArrayElement::Double(v) => v.to_bits(),
        }
    }

    /// Narrow a raw word back to an element of `ty`
    pub fn from_raw(ty: PrimitiveType, raw: u64) -> Self {
        match ty {
            PrimitiveType::Boolean => ArrayElement::Boolean(raw as u8),
            PrimitiveType::Byte => ArrayElement::Byte(raw as u8 as i8),
            PrimitiveType::Char => ArrayElement::Char(raw as u16),
            PrimitiveType::Short => ArrayElement::Short(raw as u16 as i16),
            PrimitiveType::Int => ArrayElement::Int(raw as u32 as i32),
            PrimitiveType::Float => ArrayElement::Float(f32::from_bits(raw as u32)),
            PrimitiveType::Long => ArrayElement::Long(raw as i64),
            PrimitiveType::Double => ArrayElement::Double(f64::from_bits(raw)),
        }
    }

    /// Bitwise equality (distinguishes `-0.0` from `0.0` and compares NaN payloads)
    pub fn bits_eq(&self, other: &ArrayElement) -> bool {
        self.primitive_type() == other.primitive_type() && self.to_raw() == other.to_raw()
    }
}
