//! Moving collector for the in-memory heap
//!
//! Every collection relocates all movable objects, then asks each registered
//! root holder to report its roots. The holder must overwrite every visited
//! slot with the forwarded handle; a root that names neither a moved object
//! nor a live one is counted as dangling.

use crate::heap::InMemoryHeap;
use rustc_hash::FxHashMap;
use tracing::debug;
use txlog_core::{ObjRef, RootInfo, RootType, RootVisitor, VisitRoots};

/// Old -> new handle mapping produced by one collection
#[derive(Debug, Clone, Default)]
pub struct Forwarding {
    map: FxHashMap<ObjRef, ObjRef>,
}

impl Forwarding {
    /// New handle of `obj`; unmoved objects map to themselves
    pub fn forward(&self, obj: ObjRef) -> ObjRef {
        self.map.get(&obj).copied().unwrap_or(obj)
    }

    /// Whether `obj` was moved
    pub fn moved(&self, obj: ObjRef) -> bool {
        self.map.contains_key(&obj)
    }

    /// Number of moved objects
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether nothing moved
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Outcome of a collection
#[derive(Debug, Clone, Default)]
pub struct CollectionResult {
    /// Handle mapping
    pub forwarding: Forwarding,
    /// Roots reported by holders
    pub roots_visited: usize,
    /// Roots whose handle changed
    pub roots_updated: usize,
    /// Roots naming no live object after the move
    pub dangling_roots: usize,
    /// Roots reported per root type
    pub roots_by_type: FxHashMap<RootTypeKey, usize>,
}

/// Hashable mirror of [`RootType`] used for per-type counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootTypeKey {
    /// [`RootType::Unknown`]
    Unknown,
    /// [`RootType::InternedString`]
    InternedString,
    /// [`RootType::VmInternal`]
    VmInternal,
}

impl From<RootType> for RootTypeKey {
    fn from(t: RootType) -> Self {
        match t {
            RootType::Unknown => RootTypeKey::Unknown,
            RootType::InternedString => RootTypeKey::InternedString,
            RootType::VmInternal => RootTypeKey::VmInternal,
        }
    }
}

struct RelocatingVisitor<'a> {
    heap: &'a InMemoryHeap,
    forwarding: &'a Forwarding,
    result: CollectionResult,
}

impl RootVisitor for RelocatingVisitor<'_> {
    fn visit_root(&mut self, root: &mut ObjRef, info: RootInfo) {
        self.result.roots_visited += 1;
        *self
            .result
            .roots_by_type
            .entry(info.root_type.into())
            .or_insert(0) += 1;
        if self.forwarding.moved(*root) {
            *root = self.forwarding.forward(*root);
            self.result.roots_updated += 1;
        } else if !self.heap.contains(*root) {
            self.result.dangling_roots += 1;
        }
    }
}

/// Collector that relocates every movable object on each pause
#[derive(Debug, Default)]
pub struct MovingCollector;

impl MovingCollector {
    /// Create a collector
    pub fn new() -> Self {
        MovingCollector
    }

    /// Run one collection pause over `heap`, updating every holder's roots
    pub fn collect(&self, heap: &InMemoryHeap, holders: &[&dyn VisitRoots]) -> CollectionResult {
        let forwarding = Forwarding {
            map: heap.relocate_movable(),
        };
        let mut visitor = RelocatingVisitor {
            heap,
            forwarding: &forwarding,
            result: CollectionResult::default(),
        };
        for holder in holders {
            holder.visit_roots(&mut visitor);
        }
        let mut result = visitor.result;
        debug!(
            target: "txlog::gc",
            moved = forwarding.len(),
            roots_visited = result.roots_visited,
            roots_updated = result.roots_updated,
            dangling_roots = result.dangling_roots,
            "Moving collection finished"
        );
        result.forwarding = forwarding;
        result
    }
}
