//! txlog - transactional heap mutation log with rollback
//!
//! An ahead-of-time compiler that runs class initializers against a live
//! heap journals every mutation in a [`Transaction`]. A failing initializer
//! is undone with [`Transaction::rollback`]; a successful one simply drops
//! its transaction.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use txlog::{
//!     accessor, ExecutionContext, FieldOffset, FieldValue, HashStringTables, InMemoryHeap,
//!     Transaction,
//! };
//!
//! let heap = Arc::new(InMemoryHeap::new());
//! let ctx = ExecutionContext::new(
//!     heap.clone(),
//!     Arc::new(HashStringTables::new().into_intern_table()),
//! );
//! let class = heap.define_class("com.example.Config");
//!
//! let txn = Arc::new(Transaction::new(true, class));
//! ctx.enter_transaction(Arc::clone(&txn));
//! accessor::set_field(&ctx, class, FieldOffset::new(16), FieldValue::Int32(42), false).unwrap();
//!
//! // The initializer failed: undo everything it did.
//! txn.abort("initializer threw");
//! ctx.exit_transaction();
//! txn.rollback(&ctx);
//! ```
//!
//! # Architecture
//!
//! - `txlog-core`: handles, field values and the collaborator traits
//! - `txlog-heap`: in-memory heap, interning tables and a moving collector
//! - `txlog-transaction`: the transaction, its undo logs and the accessors

pub use txlog_core::{
    ArrayElement, ComponentType, Error, FieldKind, FieldOffset, FieldValue, Heap, InternTable,
    InternTableGuard, ObjRef, PrimitiveType, RootInfo, RootType, RootVisitor, StringIndex,
    StringTables, VisitRoots, ARRAY_DATA_OFFSET, ARRAY_LENGTH_OFFSET, CLASS_OFFSET,
    REFERENCE_SLOT_SIZE,
};
pub use txlog_heap::{
    CollectionResult, Forwarding, HashStringTables, HeapStats, InMemoryHeap, MovingCollector,
    RootTypeKey, Space,
};
pub use txlog_transaction::{
    accessor, AbortError, ArrayLog, ExecutionContext, InternStringLog, LoggedField, ObjectLog,
    PendingException, ResolveStringLog, ScopedAssertNoNewRecords, StringKind, StringOp,
    Transaction, TransactionConfig, TransactionError, TransactionStats, ABORT_ERROR_DESCRIPTOR,
    CONFIG_FILE_NAME,
};
