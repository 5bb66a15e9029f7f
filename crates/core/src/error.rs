//! Error types for heap collaborators
//!
//! These are the recoverable failures reported by object-model accessors.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::{FieldKind, FieldOffset, ObjRef, PrimitiveType, StringIndex};
use std::io;
use thiserror::Error;

/// Result type alias for heap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types reported by the heap and its accessors
#[derive(Debug, Error)]
pub enum Error {
    /// Handle does not name a live object
    #[error("Unknown object {0}")]
    UnknownObject(ObjRef),

    /// Array operation on a non-array object
    #[error("Object {0} is not an array")]
    NotAnArray(ObjRef),

    /// Primitive array operation on an array of references
    #[error("Array {0} has a reference component type")]
    ReferenceArray(ObjRef),

    /// Element index past the end of the array
    #[error("Index {index} out of bounds for array {array} of length {length}")]
    IndexOutOfBounds {
        /// Array accessed
        array: ObjRef,
        /// Requested index
        index: usize,
        /// Array length
        length: usize,
    },

    /// Element value does not match the array component type
    #[error("Array {array} holds {expected:?} elements, got {actual:?}")]
    ElementTypeMismatch {
        /// Array accessed
        array: ObjRef,
        /// Component type of the array
        expected: PrimitiveType,
        /// Type of the supplied element
        actual: PrimitiveType,
    },

    /// Field slot accessed with the wrong kind
    #[error("Field {offset} of {object} holds {expected:?}, accessed as {actual:?}")]
    FieldKindMismatch {
        /// Object accessed
        object: ObjRef,
        /// Field offset
        offset: FieldOffset,
        /// Kind stored in the slot
        expected: FieldKind,
        /// Kind requested
        actual: FieldKind,
    },

    /// Object is not a string-resolution cache
    #[error("Object {0} is not a string cache")]
    NotAStringCache(ObjRef),

    /// String index past the end of a string-resolution cache
    #[error("String index {index} out of bounds for cache {cache} with {count} strings")]
    StringIndexOutOfBounds {
        /// Cache accessed
        cache: ObjRef,
        /// Requested index
        index: u32,
        /// Number of strings in the cache
        count: u32,
    },

    /// I/O error while reading or writing configuration
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Configuration could not be parsed or serialized
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Convenience constructor for out-of-range string cache access
    pub fn string_index(cache: ObjRef, index: StringIndex, count: u32) -> Self {
        Error::StringIndexOutOfBounds {
            cache,
            index: index.0,
            count,
        }
    }
}
