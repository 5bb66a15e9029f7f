//! Collaborator traits
//!
//! The transaction log never touches object memory directly. It reaches the
//! object model, the string tables and the collector through these traits so
//! the heap implementation can be swapped without touching the log.

use crate::error::Result;
use crate::types::{
    ArrayElement, FieldKind, FieldOffset, FieldValue, ObjRef, PrimitiveType, StringIndex,
};

/// Component type of an array object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    /// Array of primitives
    Primitive(PrimitiveType),
    /// Array of references
    Reference,
}

/// Object model and space queries of a managed heap
///
/// Thread safety: all methods may be called concurrently (requires
/// Send + Sync); implementations provide their own interior locking.
pub trait Heap: Send + Sync {
    /// Whether `obj` lives in a read-only platform image space
    fn is_in_image_space(&self, obj: ObjRef) -> bool;

    /// Whether any platform image space is mapped.
    ///
    /// False while building the base platform image itself.
    fn has_image_spaces(&self) -> bool;

    /// Whether objects of `class` may be referenced from an image extension
    fn can_reference_from_image_extension(&self, class: ObjRef) -> bool;

    /// Whether `obj` is a class object
    fn is_class(&self, obj: ObjRef) -> bool;

    /// Class of `obj`
    ///
    /// # Errors
    ///
    /// Returns an error if `obj` is not a live object.
    fn class_of(&self, obj: ObjRef) -> Result<ObjRef>;

    /// Component type of `obj`, or `None` if it is not an array
    fn array_component(&self, obj: ObjRef) -> Option<ComponentType>;

    /// Read a field slot
    ///
    /// Slots that were never written read as the zero value of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if `obj` is unknown or the slot holds another kind.
    fn read_field(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        kind: FieldKind,
        is_volatile: bool,
    ) -> Result<FieldValue>;

    /// Write a field slot, with volatile ordering when `is_volatile` is set
    ///
    /// # Errors
    ///
    /// Returns an error if `obj` is unknown or the slot holds another kind.
    fn write_field(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: FieldValue,
        is_volatile: bool,
    ) -> Result<()>;

    /// Length of an array
    ///
    /// # Errors
    ///
    /// Returns an error if `array` is not a live array.
    fn array_length(&self, array: ObjRef) -> Result<usize>;

    /// Read an element of a primitive array
    ///
    /// # Errors
    ///
    /// Returns an error for unknown objects, reference arrays, or an index out of bounds.
    fn read_element(&self, array: ObjRef, index: usize) -> Result<ArrayElement>;

    /// Write an element of a primitive array
    ///
    /// # Errors
    ///
    /// Returns an error for unknown objects, reference arrays, an index out of
    /// bounds, or an element of the wrong type.
    fn write_element(&self, array: ObjRef, index: usize, value: ArrayElement) -> Result<()>;

    /// Number of string slots in a string-resolution cache
    ///
    /// # Errors
    ///
    /// Returns an error if `cache` is not a string cache.
    fn num_strings(&self, cache: ObjRef) -> Result<u32>;

    /// Resolved string in a cache slot, `None` if unresolved
    ///
    /// # Errors
    ///
    /// Returns an error if `cache` is not a string cache or the index is out of range.
    fn resolved_string(&self, cache: ObjRef, index: StringIndex) -> Result<Option<ObjRef>>;

    /// Fill a cache slot with a resolved string
    ///
    /// # Errors
    ///
    /// Returns an error if `cache` is not a string cache or the index is out of range.
    fn set_resolved_string(&self, cache: ObjRef, index: StringIndex, string: ObjRef) -> Result<()>;

    /// Reset a cache slot to unresolved
    ///
    /// # Errors
    ///
    /// Returns an error if `cache` is not a string cache or the index is out of range.
    fn clear_resolved_string(&self, cache: ObjRef, index: StringIndex) -> Result<()>;
}

/// Strong and weak tiers of a string interning table
///
/// Callers reach these through [`crate::InternTable`], which serializes
/// access behind the table's exclusive lock.
pub trait StringTables: Send {
    /// Add to the strong tier
    fn insert_strong(&mut self, string: ObjRef);

    /// Add to the weak tier
    fn insert_weak(&mut self, string: ObjRef);

    /// Remove from the strong tier
    fn remove_strong(&mut self, string: ObjRef);

    /// Remove from the weak tier
    fn remove_weak(&mut self, string: ObjRef);

    /// Whether the strong tier holds `string`
    fn contains_strong(&self, string: ObjRef) -> bool;

    /// Whether the weak tier holds `string`
    fn contains_weak(&self, string: ObjRef) -> bool;

    /// Report and update every string held by either tier
    fn visit_roots(&mut self, visitor: &mut dyn RootVisitor);
}

/// Why a root is held, reported to the collector alongside the root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootType {
    /// Unclassified root
    Unknown,
    /// String held by an interning table record
    InternedString,
    /// Runtime-internal object (e.g. a string-resolution cache)
    VmInternal,
}

/// Root descriptor passed to [`RootVisitor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootInfo {
    /// Root classification
    pub root_type: RootType,
}

impl RootInfo {
    /// Create a descriptor
    pub const fn new(root_type: RootType) -> Self {
        RootInfo { root_type }
    }
}

/// Collector callback for root visiting
///
/// The collector marks each visited root live and, if it moved the object,
/// overwrites the slot with the new handle.
pub trait RootVisitor {
    /// Visit a non-null root, updating it in place if the object moved
    fn visit_root(&mut self, root: &mut ObjRef, info: RootInfo);

    /// Visit a nullable root
    fn visit_root_if_non_null(&mut self, root: &mut Option<ObjRef>, info: RootInfo) {
        if let Some(obj) = root.as_mut() {
            self.visit_root(obj, info);
        }
    }
}

/// Types holding heap references that must be reported during a collection pause
pub trait VisitRoots {
    /// Report and update every reference held
    fn visit_roots(&self, visitor: &mut dyn RootVisitor);
}
