//! Exclusive lock around a string interning table
//!
//! The table's data structure is pluggable ([`StringTables`]); this wrapper
//! owns the one lock every interning operation and every transaction rollback
//! must take. Holding an [`InternTableGuard`] is the proof of exclusivity that
//! transaction record operations ask for.

use crate::traits::{RootVisitor, StringTables, VisitRoots};
use parking_lot::{Mutex, MutexGuard};

/// Guard proving the interning table lock is held
pub type InternTableGuard<'a> = MutexGuard<'a, Box<dyn StringTables>>;

/// String interning table with its exclusive lock
pub struct InternTable {
    tables: Mutex<Box<dyn StringTables>>,
}

impl InternTable {
    /// Wrap a table implementation
    pub fn new(tables: Box<dyn StringTables>) -> Self {
        InternTable {
            tables: Mutex::new(tables),
        }
    }

    /// Acquire the table lock
    pub fn lock(&self) -> InternTableGuard<'_> {
        self.tables.lock()
    }

    /// Whether some thread currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.tables.is_locked()
    }
}

impl VisitRoots for InternTable {
    fn visit_roots(&self, visitor: &mut dyn RootVisitor) {
        self.tables.lock().visit_roots(visitor);
    }
}

impl std::fmt::Debug for InternTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternTable")
            .field("locked", &self.is_locked())
            .finish()
    }
}
