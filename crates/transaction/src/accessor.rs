//! Transactional heap accessors
//!
//! Entry points the execution engine calls for every mutation it performs on
//! behalf of initializer code. With a transaction active on the context each
//! accessor:
//!
//! - checks the transaction's constraints and, when blocked, aborts the
//!   transaction and returns the abort error (also left pending on the context)
//! - applies the write to the live heap
//! - records the pre-write value on the transaction
//!
//! Without an active transaction the accessors write straight through.

use crate::context::ExecutionContext;
use crate::error::{Result, TransactionError};
use crate::transaction::Transaction;
use txlog_core::{
    ArrayElement, ComponentType, Error, FieldKind, FieldOffset, FieldValue, InternTableGuard,
    ObjRef, StringIndex, StringTables,
};

fn abort_and_throw(ctx: &ExecutionContext, txn: &Transaction, message: String) -> TransactionError {
    txn.abort(&message);
    txn.throw_abort_error(ctx, Some(&message)).into()
}

/// Write a field of `obj` (instance field, or static field when `obj` is a class)
///
/// # Errors
///
/// Returns [`TransactionError::Aborted`] if the write breaks a constraint of
/// the active transaction, or a heap error if the field cannot be accessed.
pub fn set_field(
    ctx: &ExecutionContext,
    obj: ObjRef,
    offset: FieldOffset,
    value: FieldValue,
    is_volatile: bool,
) -> Result<()> {
    let heap = ctx.heap();
    let Some(txn) = ctx.active_transaction() else {
        heap.write_field(obj, offset, value, is_volatile)?;
        return Ok(());
    };

    if txn.write_constraint(ctx, obj) {
        return Err(abort_and_throw(ctx, &txn, format!("Can't set fields of {}", obj)));
    }
    if let FieldValue::Reference(Some(target)) = value {
        if txn.write_value_constraint(ctx, Some(target)) {
            return Err(abort_and_throw(
                ctx,
                &txn,
                format!("Can't store reference to {} in field {} of {}", target, offset, obj),
            ));
        }
    }

    let old = heap.read_field(obj, offset, value.kind(), is_volatile)?;
    heap.write_field(obj, offset, value, is_volatile)?;
    txn.record_write_field(obj, offset, old, is_volatile);
    Ok(())
}

/// Read a static field of `class`
///
/// # Errors
///
/// Returns [`TransactionError::Aborted`] if the active transaction may not
/// read statics of `class`, or a heap error if the field cannot be accessed.
pub fn get_static_field(
    ctx: &ExecutionContext,
    class: ObjRef,
    offset: FieldOffset,
    kind: FieldKind,
    is_volatile: bool,
) -> Result<FieldValue> {
    if let Some(txn) = ctx.active_transaction() {
        if txn.read_constraint(ctx, class) {
            return Err(abort_and_throw(
                ctx,
                &txn,
                format!(
                    "Can't read static fields of {} since it is not the class being initialized",
                    class
                ),
            ));
        }
    }
    Ok(ctx.heap().read_field(class, offset, kind, is_volatile)?)
}

/// Write an element of a primitive array
///
/// # Errors
///
/// Returns [`TransactionError::Aborted`] if `array` may not be written, or a
/// heap error on a bad index or element type.
pub fn set_array_element(
    ctx: &ExecutionContext,
    array: ObjRef,
    index: usize,
    value: ArrayElement,
) -> Result<()> {
    let heap = ctx.heap();
    let Some(txn) = ctx.active_transaction() else {
        heap.write_element(array, index, value)?;
        return Ok(());
    };

    if txn.write_constraint(ctx, array) {
        return Err(abort_and_throw(ctx, &txn, format!("Can't set array element of {}", array)));
    }

    let old = heap.read_element(array, index)?;
    heap.write_element(array, index, value)?;
    txn.record_write_array(ctx, array, index, old.to_raw());
    Ok(())
}

/// Write an element of a reference array
///
/// Reference elements are logged as reference fields at the element's slot
/// offset, which keeps the old value visible to the collector.
///
/// # Errors
///
/// Returns [`TransactionError::Aborted`] on a constraint violation, or a heap
/// error if `array` is not a reference array or `index` is out of bounds.
pub fn set_reference_element(
    ctx: &ExecutionContext,
    array: ObjRef,
    index: usize,
    value: Option<ObjRef>,
) -> Result<()> {
    let heap = ctx.heap();
    if heap.array_component(array) != Some(ComponentType::Reference) {
        return Err(Error::NotAnArray(array).into());
    }
    let length = heap.array_length(array)?;
    if index >= length {
        return Err(Error::IndexOutOfBounds { array, index, length }.into());
    }
    set_field(
        ctx,
        array,
        FieldOffset::reference_element(index),
        FieldValue::Reference(value),
        false,
    )
}

fn intern_with(
    ctx: &ExecutionContext,
    string: ObjRef,
    apply: impl FnOnce(&mut dyn StringTables, ObjRef) -> bool,
    record: impl FnOnce(&Transaction, &InternTableGuard<'_>, ObjRef),
) -> bool {
    let mut tables = ctx.intern_table().lock();
    if !apply(&mut **tables, string) {
        return false;
    }
    if let Some(txn) = ctx.active_transaction() {
        record(txn.as_ref(), &tables, string);
    }
    true
}

/// Add `string` to the strong interning tier
///
/// Returns `false` if it was already there.
pub fn intern_strong(ctx: &ExecutionContext, string: ObjRef) -> bool {
    intern_with(
        ctx,
        string,
        |tables, s| {
            if tables.contains_strong(s) {
                return false;
            }
            tables.insert_strong(s);
            true
        },
        Transaction::record_strong_string_insertion,
    )
}

/// Add `string` to the weak interning tier
///
/// Returns `false` if it was already there.
pub fn intern_weak(ctx: &ExecutionContext, string: ObjRef) -> bool {
    intern_with(
        ctx,
        string,
        |tables, s| {
            if tables.contains_weak(s) {
                return false;
            }
            tables.insert_weak(s);
            true
        },
        Transaction::record_weak_string_insertion,
    )
}

/// Remove `string` from the strong interning tier
///
/// Returns `false` if it was not there.
pub fn remove_strong(ctx: &ExecutionContext, string: ObjRef) -> bool {
    intern_with(
        ctx,
        string,
        |tables, s| {
            if !tables.contains_strong(s) {
                return false;
            }
            tables.remove_strong(s);
            true
        },
        Transaction::record_strong_string_removal,
    )
}

/// Remove `string` from the weak interning tier
///
/// Returns `false` if it was not there.
pub fn remove_weak(ctx: &ExecutionContext, string: ObjRef) -> bool {
    intern_with(
        ctx,
        string,
        |tables, s| {
            if !tables.contains_weak(s) {
                return false;
            }
            tables.remove_weak(s);
            true
        },
        Transaction::record_weak_string_removal,
    )
}

/// Fill slot `index` of a string-resolution cache
///
/// A slot that is already resolved is left alone and nothing is recorded,
/// so only first fills are undone by rollback.
///
/// # Errors
///
/// Returns a heap error if `cache` is not a cache or `index` is out of range.
pub fn resolve_string(
    ctx: &ExecutionContext,
    cache: ObjRef,
    index: StringIndex,
    string: ObjRef,
) -> Result<()> {
    if ctx.heap().resolved_string(cache, index)?.is_some() {
        return Ok(());
    }
    ctx.heap().set_resolved_string(cache, index, string)?;
    if let Some(txn) = ctx.active_transaction() {
        txn.record_resolve_string(ctx, cache, index);
    }
    Ok(())
}
