//! Scoped check that a region creates no transaction records

use crate::context::ExecutionContext;
use crate::transaction::Transaction;
use std::sync::Arc;

/// While alive, any new record on the active transaction is a bug
///
/// Used around runtime code that must not mutate managed state while a
/// transaction is active. The check fires in debug builds only; in release
/// builds the guard merely tracks which transaction it was installed on.
/// Does nothing if no transaction is active or the transaction's config
/// disables the check.
#[must_use = "the assertion is removed as soon as the guard is dropped"]
pub struct ScopedAssertNoNewRecords<'a> {
    ctx: &'a ExecutionContext,
    transaction: Option<Arc<Transaction>>,
}

impl<'a> ScopedAssertNoNewRecords<'a> {
    /// Install the assertion on the transaction active on `ctx`
    ///
    /// # Panics
    ///
    /// Panics if the active transaction already carries an assertion.
    pub fn new(ctx: &'a ExecutionContext, reason: &'static str) -> Self {
        let transaction = ctx
            .active_transaction()
            .filter(|txn| txn.config().enforce_no_new_records);
        if let Some(txn) = &transaction {
            txn.install_no_new_records_assertion(reason);
        }
        ScopedAssertNoNewRecords { ctx, transaction }
    }

    /// Reason installed by this guard, if it is enforcing
    pub fn reason(&self) -> Option<&'static str> {
        self.transaction
            .as_ref()
            .and_then(|txn| txn.no_new_records_reason())
    }
}

impl Drop for ScopedAssertNoNewRecords<'_> {
    fn drop(&mut self) {
        if let Some(txn) = self.transaction.take() {
            let still_active = self
                .ctx
                .active_transaction()
                .is_some_and(|active| Arc::ptr_eq(&active, &txn));
            if !still_active && !std::thread::panicking() {
                panic!("Active transaction changed inside a no-new-records region");
            }
            txn.remove_no_new_records_assertion();
        }
    }
}
