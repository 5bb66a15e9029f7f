//! Interning and String Resolution Tests
//!
//! Interning operations are undone most recent first; string cache slots
//! filled inside a transaction are cleared, others are left alone.

use crate::common::*;
use txlog::{StringKind, StringOp, StringTables};

fn strong(env: &TestEnv, s: ObjRef) -> bool {
    env.ctx.intern_table().lock().contains_strong(s)
}

fn weak(env: &TestEnv, s: ObjRef) -> bool {
    env.ctx.intern_table().lock().contains_weak(s)
}

// ============================================================================
// Interning order
// ============================================================================

#[test]
fn insert_then_remove_rolls_back_to_absent() {
    let env = TestEnv::new();
    let class = env.heap.define_class("com.example.Names");
    let s = env.heap.alloc_string("name");

    let txn = env.begin(false, class);
    assert!(accessor::intern_strong(&env.ctx, s));
    assert!(accessor::remove_strong(&env.ctx, s));

    let logs = txn.intern_string_logs();
    assert_eq!(logs.len(), 2);
    assert_eq!((logs[0].kind(), logs[0].op()), (StringKind::Strong, StringOp::Remove));
    assert_eq!((logs[1].kind(), logs[1].op()), (StringKind::Strong, StringOp::Insert));

    env.rollback(&txn);
    assert!(!strong(&env, s));
}

#[test]
fn remove_then_reinsert_rolls_back_to_present() {
    let env = TestEnv::new();
    let class = env.heap.define_class("com.example.Names");
    let s = env.heap.alloc_string("name");
    assert!(accessor::intern_weak(&env.ctx, s));

    let txn = env.begin(false, class);
    assert!(accessor::remove_weak(&env.ctx, s));
    assert!(accessor::intern_weak(&env.ctx, s));
    assert!(accessor::intern_strong(&env.ctx, s));

    env.rollback(&txn);
    assert!(weak(&env, s));
    assert!(!strong(&env, s));
}

#[test]
fn strings_interned_before_the_transaction_survive() {
    let env = TestEnv::new();
    let class = env.heap.define_class("com.example.Names");
    let kept = env.heap.alloc_string("kept");
    let added = env.heap.alloc_string("added");
    accessor::intern_strong(&env.ctx, kept);

    let txn = env.begin(false, class);
    assert!(!accessor::intern_strong(&env.ctx, kept));
    assert!(accessor::intern_strong(&env.ctx, added));
    assert_eq!(txn.stats().intern_string_count, 1);

    env.rollback(&txn);
    assert!(strong(&env, kept));
    assert!(!strong(&env, added));
}

#[test]
fn record_operations_need_the_table_lock() {
    let env = TestEnv::new();
    let txn = Transaction::new(false, ObjRef::from_raw(0x10));
    let s = env.heap.alloc_string("s");

    let mut tables = env.ctx.intern_table().lock();
    tables.insert_weak(s);
    txn.record_weak_string_insertion(&tables, s);
    assert!(env.ctx.intern_table().is_locked());
    drop(tables);

    txn.rollback(&env.ctx);
    assert!(!weak(&env, s));
    assert!(!env.ctx.intern_table().is_locked());
}

// ============================================================================
// String resolution
// ============================================================================

#[test]
fn only_slots_resolved_inside_the_transaction_are_cleared() {
    let env = TestEnv::new();
    let class = env.heap.define_class("com.example.Strings");
    let cache = env.heap.alloc_string_cache(4);
    let other_cache = env.heap.alloc_string_cache(4);
    let early = env.heap.alloc_string("early");
    let late = env.heap.alloc_string("late");

    accessor::resolve_string(&env.ctx, cache, StringIndex(0), early).unwrap();

    let txn = env.begin(false, class);
    accessor::resolve_string(&env.ctx, cache, StringIndex(0), late).unwrap();
    accessor::resolve_string(&env.ctx, cache, StringIndex(1), late).unwrap();
    accessor::resolve_string(&env.ctx, cache, StringIndex(3), late).unwrap();
    let logs = txn.resolve_string_logs();
    assert_eq!(logs.len(), 2);
    assert_eq!((logs[0].cache(), logs[0].index()), (cache, StringIndex(1)));
    assert_eq!((logs[1].cache(), logs[1].index()), (cache, StringIndex(3)));
    env.ctx.exit_transaction();

    accessor::resolve_string(&env.ctx, other_cache, StringIndex(1), late).unwrap();
    txn.rollback(&env.ctx);

    assert_eq!(env.heap.resolved_string(cache, StringIndex(0)).unwrap(), Some(early));
    assert_eq!(env.heap.resolved_string(cache, StringIndex(1)).unwrap(), None);
    assert_eq!(env.heap.resolved_string(cache, StringIndex(3)).unwrap(), None);
    assert_eq!(env.heap.resolved_string(other_cache, StringIndex(1)).unwrap(), Some(late));
}
