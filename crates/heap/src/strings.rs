//! Hash-set backed string interning tables

use rustc_hash::FxHashSet;
use txlog_core::{InternTable, ObjRef, RootInfo, RootType, RootVisitor, StringTables};

/// Strong and weak interning tiers kept in two hash sets
#[derive(Debug, Default)]
pub struct HashStringTables {
    strong: FxHashSet<ObjRef>,
    weak: FxHashSet<ObjRef>,
}

impl HashStringTables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap fresh tables in an [`InternTable`]
    pub fn into_intern_table(self) -> InternTable {
        InternTable::new(Box::new(self))
    }

    /// Number of strongly interned strings
    pub fn strong_len(&self) -> usize {
        self.strong.len()
    }

    /// Number of weakly interned strings
    pub fn weak_len(&self) -> usize {
        self.weak.len()
    }
}

fn visit_set(set: &mut FxHashSet<ObjRef>, visitor: &mut dyn RootVisitor) {
    let info = RootInfo::new(RootType::InternedString);
    let visited: FxHashSet<ObjRef> = set
        .drain()
        .map(|mut s| {
            visitor.visit_root(&mut s, info);
            s
        })
        .collect();
    *set = visited;
}

impl StringTables for HashStringTables {
    fn insert_strong(&mut self, string: ObjRef) {
        self.strong.insert(string);
    }

    fn insert_weak(&mut self, string: ObjRef) {
        self.weak.insert(string);
    }

    fn remove_strong(&mut self, string: ObjRef) {
        self.strong.remove(&string);
    }

    fn remove_weak(&mut self, string: ObjRef) {
        self.weak.remove(&string);
    }

    fn contains_strong(&self, string: ObjRef) -> bool {
        self.strong.contains(&string)
    }

    fn contains_weak(&self, string: ObjRef) -> bool {
        self.weak.contains(&string)
    }

    fn visit_roots(&mut self, visitor: &mut dyn RootVisitor) {
        visit_set(&mut self.strong, visitor);
        visit_set(&mut self.weak, visitor);
    }
}
