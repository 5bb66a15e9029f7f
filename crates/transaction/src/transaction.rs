//! Transaction for AOT class initialization
//!
//! While a class initializer runs ahead of time, every heap mutation it makes
//! is applied to the live heap and journaled here with its pre-mutation
//! value. If the initializer fails, `rollback` restores the heap as if it had
//! never run. There is no commit: on success the transaction is simply
//! dropped.
//!
//! # Locking
//!
//! All mutable state sits behind one mutex. `rollback` takes the interning
//! table lock before that mutex, and the `record_*_string_*` operations are
//! called with the interning table lock held, so the order is always
//! interning table -> transaction.
//!
//! # Collector cooperation
//!
//! Log keys and logged reference values are heap references. `visit_roots`
//! reports all of them to the collector and re-keys the logs of relocated
//! objects, so a rollback after a moving collection still finds its targets.

use crate::config::TransactionConfig;
use crate::context::ExecutionContext;
use crate::error::{AbortError, ABORT_ERROR_DESCRIPTOR};
use crate::array_log::ArrayLog;
use crate::object_log::ObjectLog;
use crate::string_log::{InternStringLog, ResolveStringLog, StringKind, StringOp};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use txlog_core::{
    ComponentType, FieldOffset, FieldValue, InternTableGuard, ObjRef, RootInfo, RootType,
    RootVisitor, StringIndex, VisitRoots,
};

/// Sizes of the logs held by a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionStats {
    /// Objects with at least one logged field
    pub objects_count: usize,
    /// Logged fields across all objects
    pub field_values_count: usize,
    /// Arrays with at least one logged element
    pub array_count: usize,
    /// Logged elements across all arrays
    pub array_values_count: usize,
    /// Interning table records
    pub intern_string_count: usize,
    /// String-resolution records
    pub resolve_string_count: usize,
}

impl TransactionStats {
    /// Whether no records are held
    pub fn is_empty(&self) -> bool {
        self.objects_count == 0
            && self.array_count == 0
            && self.intern_string_count == 0
            && self.resolve_string_count == 0
    }
}

struct TransactionState {
    root: ObjRef,
    aborted: bool,
    abort_message: String,
    assert_no_new_records_reason: Option<&'static str>,
    object_logs: FxHashMap<ObjRef, ObjectLog>,
    array_logs: FxHashMap<ObjRef, ArrayLog>,
    // Most recent first.
    intern_string_logs: VecDeque<InternStringLog>,
    resolve_string_logs: Vec<ResolveStringLog>,
}

impl TransactionState {
    fn stats(&self) -> TransactionStats {
        TransactionStats {
            objects_count: self.object_logs.len(),
            field_values_count: self.object_logs.values().map(ObjectLog::len).sum(),
            array_count: self.array_logs.len(),
            array_values_count: self.array_logs.values().map(ArrayLog::len).sum(),
            intern_string_count: self.intern_string_logs.len(),
            resolve_string_count: self.resolve_string_logs.len(),
        }
    }

    fn check_no_new_records(&self) {
        if cfg!(debug_assertions) {
            if let Some(reason) = self.assert_no_new_records_reason {
                panic!("New transaction record in a region without records: {}", reason);
            }
        }
    }
}

/// Undo journal for one class initialization
pub struct Transaction {
    strict: bool,
    config: TransactionConfig,
    rolling_back: AtomicBool,
    state: Mutex<TransactionState>,
}

impl Transaction {
    /// Create a transaction for initializing `root`
    ///
    /// `strict` is set for application classes, which may only mutate their
    /// own static state; platform image and image extension compilation run
    /// non-strict.
    pub fn new(strict: bool, root: ObjRef) -> Self {
        Self::with_config(strict, root, TransactionConfig::default())
    }

    /// Create a transaction with explicit settings
    pub fn with_config(strict: bool, root: ObjRef, config: TransactionConfig) -> Self {
        Transaction {
            strict,
            config,
            rolling_back: AtomicBool::new(false),
            state: Mutex::new(TransactionState {
                root,
                aborted: false,
                abort_message: String::new(),
                assert_no_new_records_reason: None,
                object_logs: FxHashMap::default(),
                array_logs: FxHashMap::default(),
                intern_string_logs: VecDeque::new(),
                resolve_string_logs: Vec::new(),
            }),
        }
    }

    /// Whether this is an application-level (strict) transaction
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Settings of this transaction
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Class being initialized
    pub fn root(&self) -> ObjRef {
        self.state.lock().root
    }

    // ========================================================================
    // Abort
    // ========================================================================

    /// Mark the transaction aborted
    ///
    /// Only the first abort is kept. Initializer code may catch the error
    /// thrown for an earlier abort and fail again; the transaction is rolled
    /// back either way, so later messages are dropped.
    pub fn abort(&self, message: &str) {
        let mut state = self.state.lock();
        if !state.aborted {
            state.aborted = true;
            state.abort_message = message.to_string();
            debug!(
                target: "txlog::txn",
                root = %state.root,
                reason = message,
                "Transaction aborted"
            );
        }
    }

    /// Raise the abort error into initializer code
    ///
    /// With `None`, rethrows with the stored abort message; the transaction
    /// must already be aborted. With a message, raises with that message.
    /// The error is left pending on `ctx` and also returned so Rust callers
    /// can propagate it with `?`.
    pub fn throw_abort_error(&self, ctx: &ExecutionContext, message: Option<&str>) -> AbortError {
        let message = match message {
            Some(message) => message.to_string(),
            None => {
                debug_assert!(
                    self.is_aborted(),
                    "Rethrow {} while transaction is not aborted",
                    ABORT_ERROR_DESCRIPTOR
                );
                self.abort_message()
            }
        };
        ctx.throw(ABORT_ERROR_DESCRIPTOR, message.clone());
        AbortError { message }
    }

    /// Whether `abort` was called
    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// Whether `rollback` is in progress
    pub fn is_rolling_back(&self) -> bool {
        self.rolling_back.load(Ordering::Acquire)
    }

    /// Message of the first abort, empty if not aborted
    pub fn abort_message(&self) -> String {
        self.state.lock().abort_message.clone()
    }

    // ========================================================================
    // Constraints (true = blocked)
    // ========================================================================

    /// Whether a write to `obj` must be rejected
    ///
    /// Platform image objects are never writable. In strict mode, static
    /// state of classes other than the root is also off limits; instances
    /// and arrays are not restricted by that rule.
    pub fn write_constraint(&self, ctx: &ExecutionContext, obj: ObjRef) -> bool {
        let state = self.state.lock();
        let heap = ctx.heap();

        // Without image spaces (building the base image) this never holds.
        if heap.is_in_image_space(obj) {
            return true;
        }

        self.strict && heap.is_class(obj) && obj != state.root
    }

    /// Whether storing the reference `value` into any field must be rejected
    ///
    /// Only image extension builds restrict stored values: the value's class
    /// must be one the extension may reference.
    pub fn write_value_constraint(&self, ctx: &ExecutionContext, value: Option<ObjRef>) -> bool {
        let Some(value) = value else {
            return false;
        };
        if self.strict {
            return false;
        }
        let heap = ctx.heap();
        if !heap.has_image_spaces() {
            return false;
        }
        let class = if heap.is_class(value) {
            value
        } else {
            match heap.class_of(value) {
                Ok(class) => class,
                Err(_) => return true,
            }
        };
        !heap.can_reference_from_image_extension(class)
    }

    /// Whether a static field read from the class `obj` must be rejected
    ///
    /// Instance fields and array elements are always readable.
    pub fn read_constraint(&self, ctx: &ExecutionContext, obj: ObjRef) -> bool {
        debug_assert!(ctx.heap().is_class(obj), "{} is not a class", obj);
        let state = self.state.lock();
        self.strict && obj != state.root
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Record the pre-write value of a field of `obj`
    ///
    /// Call after the write was applied to the live object. Only the first
    /// record for a given object and offset is kept.
    pub fn record_write_field(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: FieldValue,
        is_volatile: bool,
    ) {
        let mut state = self.state.lock();
        state.check_no_new_records();
        state
            .object_logs
            .entry(obj)
            .or_default()
            .log_value(offset, value, is_volatile);
    }

    /// Record the pre-write value of a `boolean` field
    pub fn record_write_field_boolean(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: u8,
        is_volatile: bool,
    ) {
        self.record_write_field(obj, offset, FieldValue::Boolean(value), is_volatile);
    }

    /// Record the pre-write value of a `byte` field
    pub fn record_write_field_byte(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: i8,
        is_volatile: bool,
    ) {
        self.record_write_field(obj, offset, FieldValue::Byte(value), is_volatile);
    }

    /// Record the pre-write value of a `char` field
    pub fn record_write_field_char(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: u16,
        is_volatile: bool,
    ) {
        self.record_write_field(obj, offset, FieldValue::Char(value), is_volatile);
    }

    /// Record the pre-write value of a `short` field
    pub fn record_write_field_short(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: i16,
        is_volatile: bool,
    ) {
        self.record_write_field(obj, offset, FieldValue::Short(value), is_volatile);
    }

    /// Record the pre-write value of a 32-bit field
    pub fn record_write_field_32(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: u32,
        is_volatile: bool,
    ) {
        self.record_write_field(obj, offset, FieldValue::Int32(value), is_volatile);
    }

    /// Record the pre-write value of a 64-bit field
    pub fn record_write_field_64(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: u64,
        is_volatile: bool,
    ) {
        self.record_write_field(obj, offset, FieldValue::Int64(value), is_volatile);
    }

    /// Record the pre-write value of a reference field
    pub fn record_write_field_reference(
        &self,
        obj: ObjRef,
        offset: FieldOffset,
        value: Option<ObjRef>,
        is_volatile: bool,
    ) {
        self.record_write_field(obj, offset, FieldValue::Reference(value), is_volatile);
    }

    /// Record the pre-write raw value of a primitive array element
    ///
    /// Reference arrays must go through [`Self::record_write_field_reference`]
    /// with the element's slot offset instead.
    pub fn record_write_array(
        &self,
        ctx: &ExecutionContext,
        array: ObjRef,
        index: usize,
        value: u64,
    ) {
        debug_assert!(
            matches!(ctx.heap().array_component(array), Some(ComponentType::Primitive(_))),
            "{} is not a primitive array",
            array
        );
        let mut state = self.state.lock();
        state.check_no_new_records();
        state
            .array_logs
            .entry(array)
            .or_default()
            .log_value(index, value);
    }

    /// Record that slot `index` of a string-resolution cache was filled
    pub fn record_resolve_string(&self, ctx: &ExecutionContext, cache: ObjRef, index: StringIndex) {
        debug_assert!(
            ctx.heap().num_strings(cache).is_ok_and(|count| index.0 < count),
            "String index {} out of range for cache {}",
            index.0,
            cache
        );
        let mut state = self.state.lock();
        state.check_no_new_records();
        state
            .resolve_string_logs
            .push(ResolveStringLog::new(cache, index));
    }

    /// Record a strong interning of `string`
    pub fn record_strong_string_insertion(&self, tables: &InternTableGuard<'_>, string: ObjRef) {
        self.log_interned_string(
            tables,
            InternStringLog::new(string, StringKind::Strong, StringOp::Insert),
        );
    }

    /// Record a weak interning of `string`
    pub fn record_weak_string_insertion(&self, tables: &InternTableGuard<'_>, string: ObjRef) {
        self.log_interned_string(
            tables,
            InternStringLog::new(string, StringKind::Weak, StringOp::Insert),
        );
    }

    /// Record a removal of `string` from the strong tier
    pub fn record_strong_string_removal(&self, tables: &InternTableGuard<'_>, string: ObjRef) {
        self.log_interned_string(
            tables,
            InternStringLog::new(string, StringKind::Strong, StringOp::Remove),
        );
    }

    /// Record a removal of `string` from the weak tier
    pub fn record_weak_string_removal(&self, tables: &InternTableGuard<'_>, string: ObjRef) {
        self.log_interned_string(
            tables,
            InternStringLog::new(string, StringKind::Weak, StringOp::Remove),
        );
    }

    // The guard is the caller's proof that the interning table lock is held.
    fn log_interned_string(&self, _tables: &InternTableGuard<'_>, log: InternStringLog) {
        let mut state = self.state.lock();
        state.check_no_new_records();
        state.intern_string_logs.push_front(log);
    }

    // ========================================================================
    // Rollback
    // ========================================================================

    /// Undo every recorded mutation
    ///
    /// Object fields are restored first, then array elements, then the
    /// interning table (most recent operation first), then string cache
    /// slots. All logs are empty afterwards.
    ///
    /// # Panics
    ///
    /// Panics if an error is pending on `ctx` or if `ctx` is still in
    /// transactional mode.
    pub fn rollback(&self, ctx: &ExecutionContext) {
        if let Some(pending) = ctx.pending_exception() {
            panic!(
                "Rollback with pending exception {}: {}",
                pending.descriptor, pending.message
            );
        }
        if ctx.is_active_transaction() {
            panic!("Rollback of a transaction while still in transactional mode");
        }
        let mut tables = ctx.intern_table().lock();
        let mut state = self.state.lock();
        self.rolling_back.store(true, Ordering::Release);

        let stats = state.stats();
        debug!(
            target: "txlog::txn",
            root = %state.root,
            objects = stats.objects_count,
            arrays = stats.array_count,
            intern_strings = stats.intern_string_count,
            resolve_strings = stats.resolve_string_count,
            "Rolling back transaction"
        );

        let heap = ctx.heap();
        for (obj, log) in state.object_logs.drain() {
            log.undo(heap, obj);
        }
        for (array, log) in state.array_logs.drain() {
            log.undo(heap, array);
        }
        for log in state.intern_string_logs.drain(..) {
            log.undo(&mut **tables);
        }
        for log in state.resolve_string_logs.drain(..) {
            log.undo(heap);
        }

        self.rolling_back.store(false, Ordering::Release);
        debug!(target: "txlog::txn", root = %state.root, "Rollback finished");
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Current log sizes
    pub fn stats(&self) -> TransactionStats {
        self.state.lock().stats()
    }

    /// Logged pre-transaction value of a field, if any
    pub fn logged_field(&self, obj: ObjRef, offset: FieldOffset) -> Option<FieldValue> {
        let state = self.state.lock();
        state
            .object_logs
            .get(&obj)
            .and_then(|log| log.get(offset))
            .map(|field| field.value)
    }

    /// Logged pre-transaction raw value of an array element, if any
    pub fn logged_element(&self, array: ObjRef, index: usize) -> Option<u64> {
        let state = self.state.lock();
        state.array_logs.get(&array).and_then(|log| log.get(index))
    }

    /// Interning records, most recent first
    pub fn intern_string_logs(&self) -> Vec<InternStringLog> {
        self.state.lock().intern_string_logs.iter().copied().collect()
    }

    /// String-resolution records, in recording order
    pub fn resolve_string_logs(&self) -> Vec<ResolveStringLog> {
        self.state.lock().resolve_string_logs.clone()
    }

    // ========================================================================
    // No-new-records assertion
    // ========================================================================

    pub(crate) fn install_no_new_records_assertion(&self, reason: &'static str) {
        let mut state = self.state.lock();
        if let Some(old) = state.assert_no_new_records_reason {
            panic!("No-new-records assertion already installed. old: {} new: {}", old, reason);
        }
        state.assert_no_new_records_reason = Some(reason);
    }

    pub(crate) fn remove_no_new_records_assertion(&self) {
        let mut state = self.state.lock();
        if state.assert_no_new_records_reason.take().is_none() {
            panic!("No-new-records assertion removed but none was installed");
        }
    }

    pub(crate) fn no_new_records_reason(&self) -> Option<&'static str> {
        self.state.lock().assert_no_new_records_reason
    }
}

/// Report every key and logged value of `logs` and re-key the moved entries.
///
/// Re-keying happens after the pass: all moved logs are taken out first and
/// then reinserted, so a log may move onto a key another moved log just
/// vacated.
fn visit_keyed_logs<L>(
    logs: &mut FxHashMap<ObjRef, L>,
    visitor: &mut dyn RootVisitor,
    mut visit_log: impl FnMut(&mut L, &mut dyn RootVisitor),
    what: &str,
) {
    let mut moving_roots = Vec::new();
    for (&old_root, log) in logs.iter_mut() {
        visit_log(log, &mut *visitor);
        let mut new_root = old_root;
        visitor.visit_root(&mut new_root, RootInfo::new(RootType::Unknown));
        if new_root != old_root {
            moving_roots.push((old_root, new_root));
        }
    }
    if moving_roots.is_empty() {
        return;
    }

    let mut moved = Vec::with_capacity(moving_roots.len());
    for (old_root, new_root) in moving_roots {
        match logs.remove(&old_root) {
            Some(log) => moved.push((old_root, new_root, log)),
            None => panic!("{} log for {} vanished during root visit", what, old_root),
        }
    }
    debug!(target: "txlog::gc", count = moved.len(), kind = what, "Re-keying relocated logs");
    for (old_root, new_root, log) in moved {
        if logs.insert(new_root, log).is_some() {
            panic!(
                "{} log for {} relocated onto already logged {}",
                what, old_root, new_root
            );
        }
    }
}

impl VisitRoots for Transaction {
    /// Report every heap reference held and follow relocations
    ///
    /// Called by the collector during a pause. Afterwards every key and
    /// logged reference names the object's current location.
    fn visit_roots(&self, visitor: &mut dyn RootVisitor) {
        let mut state = self.state.lock();
        visitor.visit_root(&mut state.root, RootInfo::new(RootType::Unknown));
        visit_keyed_logs(&mut state.object_logs, visitor, ObjectLog::visit_roots, "Object");
        // Only primitive arrays are logged, so array logs hold no references.
        visit_keyed_logs(&mut state.array_logs, visitor, |_, _| {}, "Array");
        for log in state.intern_string_logs.iter_mut() {
            log.visit_roots(visitor);
        }
        for log in state.resolve_string_logs.iter_mut() {
            log.visit_roots(visitor);
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.config.log_stats {
            let state = self.state.get_mut();
            let stats = state.stats();
            info!(
                target: "txlog::txn",
                root = %state.root,
                objects_count = stats.objects_count,
                field_values_count = stats.field_values_count,
                array_count = stats.array_count,
                array_values_count = stats.array_values_count,
                intern_string_count = stats.intern_string_count,
                resolve_string_count = stats.resolve_string_count,
                "Transaction dropped"
            );
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Transaction")
            .field("strict", &self.strict)
            .field("root", &state.root)
            .field("aborted", &state.aborted)
            .field("rolling_back", &self.is_rolling_back())
            .field("stats", &state.stats())
            .finish()
    }
}
