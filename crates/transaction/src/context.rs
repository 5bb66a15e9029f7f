//! Execution context handed to every transactional operation
//!
//! One context exists per executing thread. It carries the heap and the
//! interning table the thread works against, the transaction currently
//! active on it, and the error pending in the thread's initializer code.

use crate::transaction::Transaction;
use parking_lot::Mutex;
use std::sync::Arc;
use txlog_core::{Heap, InternTable};

/// Error raised into initializer code and not yet handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingException {
    /// Type descriptor of the raised error
    pub descriptor: &'static str,
    /// Error message
    pub message: String,
}

/// Per-thread execution state for AOT class initialization
pub struct ExecutionContext {
    heap: Arc<dyn Heap>,
    intern_table: Arc<InternTable>,
    active: Mutex<Option<Arc<Transaction>>>,
    pending_exception: Mutex<Option<PendingException>>,
}

impl ExecutionContext {
    /// Create a context with no active transaction
    pub fn new(heap: Arc<dyn Heap>, intern_table: Arc<InternTable>) -> Self {
        ExecutionContext {
            heap,
            intern_table,
            active: Mutex::new(None),
            pending_exception: Mutex::new(None),
        }
    }

    /// Heap this context executes against
    pub fn heap(&self) -> &dyn Heap {
        self.heap.as_ref()
    }

    /// Interning table of the heap
    pub fn intern_table(&self) -> &InternTable {
        &self.intern_table
    }

    /// Enter transactional mode
    ///
    /// # Panics
    ///
    /// Panics if a transaction is already active; transactions do not nest.
    pub fn enter_transaction(&self, transaction: Arc<Transaction>) {
        let mut active = self.active.lock();
        if active.is_some() {
            panic!("Cannot enter a transaction while another one is active");
        }
        *active = Some(transaction);
    }

    /// Leave transactional mode, returning the transaction that was active
    pub fn exit_transaction(&self) -> Option<Arc<Transaction>> {
        self.active.lock().take()
    }

    /// Transaction currently active, if any
    pub fn active_transaction(&self) -> Option<Arc<Transaction>> {
        self.active.lock().clone()
    }

    /// Whether a transaction is active
    pub fn is_active_transaction(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Raise an error into initializer code
    pub fn throw(&self, descriptor: &'static str, message: impl Into<String>) {
        *self.pending_exception.lock() = Some(PendingException {
            descriptor,
            message: message.into(),
        });
    }

    /// Whether an error is pending
    pub fn has_pending_exception(&self) -> bool {
        self.pending_exception.lock().is_some()
    }

    /// Pending error, if any
    pub fn pending_exception(&self) -> Option<PendingException> {
        self.pending_exception.lock().clone()
    }

    /// Take the pending error, leaving none
    pub fn clear_exception(&self) -> Option<PendingException> {
        self.pending_exception.lock().take()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("active_transaction", &self.is_active_transaction())
            .field("pending_exception", &self.pending_exception())
            .finish()
    }
}
