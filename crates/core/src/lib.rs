//! Core types and traits for txlog
//!
//! This crate defines what the transaction log needs from its environment:
//! - ObjRef: collector-movable object handle
//! - FieldOffset / FieldValue / FieldKind: typed field slots
//! - PrimitiveType / ArrayElement: primitive array elements
//! - Error: heap accessor error type
//! - Traits: Heap, StringTables, RootVisitor, VisitRoots
//! - InternTable: interning table behind its exclusive lock

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod intern;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use intern::{InternTable, InternTableGuard};
pub use traits::{ComponentType, Heap, RootInfo, RootType, RootVisitor, StringTables, VisitRoots};
pub use types::{
    ArrayElement, FieldKind, FieldOffset, FieldValue, ObjRef, PrimitiveType, StringIndex,
    ARRAY_DATA_OFFSET, ARRAY_LENGTH_OFFSET, CLASS_OFFSET, REFERENCE_SLOT_SIZE,
};
