//! Undo records for string interning and string resolution

use txlog_core::{Heap, ObjRef, RootInfo, RootType, RootVisitor, StringIndex, StringTables};

/// Interning tier a record refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    /// Strong tier
    Strong,
    /// Weak tier
    Weak,
}

/// Operation performed on the interning table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    /// String was added
    Insert,
    /// String was removed
    Remove,
}

/// One interning table operation to be reverted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternStringLog {
    string: ObjRef,
    kind: StringKind,
    op: StringOp,
}

impl InternStringLog {
    /// Create a record
    pub fn new(string: ObjRef, kind: StringKind, op: StringOp) -> Self {
        InternStringLog { string, kind, op }
    }

    /// String the operation applied to
    pub fn string(&self) -> ObjRef {
        self.string
    }

    /// Tier the operation applied to
    pub fn kind(&self) -> StringKind {
        self.kind
    }

    /// Operation performed
    pub fn op(&self) -> StringOp {
        self.op
    }

    /// Apply the inverse operation
    pub fn undo(&self, tables: &mut dyn StringTables) {
        match (self.op, self.kind) {
            (StringOp::Insert, StringKind::Strong) => tables.remove_strong(self.string),
            (StringOp::Insert, StringKind::Weak) => tables.remove_weak(self.string),
            (StringOp::Remove, StringKind::Strong) => tables.insert_strong(self.string),
            (StringOp::Remove, StringKind::Weak) => tables.insert_weak(self.string),
        }
    }

    /// Visit the logged string
    pub fn visit_roots(&mut self, visitor: &mut dyn RootVisitor) {
        visitor.visit_root(&mut self.string, RootInfo::new(RootType::InternedString));
    }
}

/// A string-resolution cache slot filled during the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStringLog {
    cache: ObjRef,
    index: StringIndex,
}

impl ResolveStringLog {
    /// Create a record
    pub fn new(cache: ObjRef, index: StringIndex) -> Self {
        ResolveStringLog { cache, index }
    }

    /// Cache holding the slot
    pub fn cache(&self) -> ObjRef {
        self.cache
    }

    /// Slot index
    pub fn index(&self) -> StringIndex {
        self.index
    }

    /// Reset the slot to unresolved
    ///
    /// # Panics
    ///
    /// Panics if the heap no longer accepts the slot; the cache is kept alive
    /// by root visiting, so this means the cache layout changed under us.
    pub fn undo(&self, heap: &dyn Heap) {
        if let Err(e) = heap.clear_resolved_string(self.cache, self.index) {
            panic!(
                "Failed to clear string {} of cache {}: {}",
                self.index.0, self.cache, e
            );
        }
    }

    /// Visit the logged cache
    pub fn visit_roots(&mut self, visitor: &mut dyn RootVisitor) {
        visitor.visit_root(&mut self.cache, RootInfo::new(RootType::VmInternal));
    }
}
