//! Transactional mutation log for txlog
//!
//! While an ahead-of-time compiler runs class initializers against a live
//! heap, every mutation is journaled here so a failing initializer can be
//! undone as a whole:
//! - Transaction: owns the undo logs, checks constraints, rolls back
//! - ObjectLog / ArrayLog: first pre-transaction value per field or element
//! - InternStringLog / ResolveStringLog: interning and string cache undo records
//! - ExecutionContext: heap, interning table, active transaction, pending error
//! - accessor: constraint-checked, recording heap writes
//! - ScopedAssertNoNewRecords: marks regions that must not record anything
//! - TransactionConfig: `txlog.toml` settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accessor;
pub mod array_log;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod object_log;
pub mod string_log;
pub mod transaction;

pub use array_log::ArrayLog;
pub use config::{TransactionConfig, CONFIG_FILE_NAME};
pub use context::{ExecutionContext, PendingException};
pub use error::{AbortError, Result, TransactionError, ABORT_ERROR_DESCRIPTOR};
pub use guard::ScopedAssertNoNewRecords;
pub use object_log::{LoggedField, ObjectLog};
pub use string_log::{InternStringLog, ResolveStringLog, StringKind, StringOp};
pub use transaction::{Transaction, TransactionStats};
