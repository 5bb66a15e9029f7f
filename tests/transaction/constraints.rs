//! Constraint and Abort Tests
//!
//! All three checks return `true` when the access must be refused. Aborting
//! is idempotent: the first message wins.

use crate::common::*;
use txlog::{ScopedAssertNoNewRecords, ABORT_ERROR_DESCRIPTOR};

struct World {
    env: TestEnv,
    root: ObjRef,
    other_class: ObjRef,
    instance: ObjRef,
    array: ObjRef,
    image_class: ObjRef,
    image_obj: ObjRef,
    shared_class: ObjRef,
    shared_obj: ObjRef,
}

fn world() -> World {
    let env = TestEnv::new();
    let (root, instance) = env.class_and_instance("com.example.App");
    let other_class = env.heap.define_class("com.example.Other");
    let array = env.heap.alloc_primitive_array(PrimitiveType::Int, 1);
    let image_class = env.heap.define_image_class("java.lang.Thread");
    let image_obj = env.heap.alloc_image_instance(image_class).unwrap();
    let shared_class = env.heap.define_image_class("java.lang.String");
    env.heap.allow_extension_reference(shared_class).unwrap();
    let shared_obj = env.heap.alloc_image_instance(shared_class).unwrap();
    World {
        env,
        root,
        other_class,
        instance,
        array,
        image_class,
        image_obj,
        shared_class,
        shared_obj,
    }
}

// ============================================================================
// Write constraint
// ============================================================================

#[test]
fn write_constraint_table() {
    let w = world();
    let strict = Transaction::new(true, w.root);
    let lenient = Transaction::new(false, w.root);
    let ctx = &w.env.ctx;

    // (target, blocked in strict mode, blocked in non-strict mode)
    let cases = [
        (w.root, false, false),
        (w.other_class, true, false),
        (w.instance, false, false),
        (w.array, false, false),
        (w.image_class, true, true),
        (w.image_obj, true, true),
    ];
    for (target, strict_blocked, lenient_blocked) in cases {
        assert_eq!(strict.write_constraint(ctx, target), strict_blocked, "strict {}", target);
        assert_eq!(lenient.write_constraint(ctx, target), lenient_blocked, "non-strict {}", target);
    }
}

// ============================================================================
// Value constraint
// ============================================================================

#[test]
fn value_constraint_table() {
    let w = world();
    let strict = Transaction::new(true, w.root);
    let lenient = Transaction::new(false, w.root);
    let ctx = &w.env.ctx;

    assert!(!lenient.write_value_constraint(ctx, None));
    assert!(lenient.write_value_constraint(ctx, Some(w.image_obj)));
    assert!(lenient.write_value_constraint(ctx, Some(w.image_class)));
    assert!(!lenient.write_value_constraint(ctx, Some(w.shared_obj)));
    assert!(!lenient.write_value_constraint(ctx, Some(w.shared_class)));
    assert!(!lenient.write_value_constraint(ctx, Some(w.instance)));
    assert!(!lenient.write_value_constraint(ctx, Some(w.root)));

    for value in [None, Some(w.image_obj), Some(w.image_class)] {
        assert!(!strict.write_value_constraint(ctx, value));
    }
}

#[test]
fn value_constraint_without_image_spaces_is_unrestricted() {
    let env = TestEnv::new();
    let (root, instance) = env.class_and_instance("com.example.Boot");
    let txn = Transaction::new(false, root);
    assert!(!txn.write_value_constraint(&env.ctx, Some(instance)));
    assert!(!txn.write_value_constraint(&env.ctx, Some(root)));
}

#[test]
fn storing_a_hidden_reference_aborts() {
    let w = world();
    let txn = w.env.begin(false, w.root);
    let refs = w.env.heap.alloc_reference_array(1);

    let err = accessor::set_reference_element(&w.env.ctx, refs, 0, Some(w.image_obj)).unwrap_err();
    assert!(err.as_abort().is_some());
    assert!(txn.is_aborted());
    assert!(txn.stats().is_empty());
    w.env.rollback(&txn);
}

// ============================================================================
// Read constraint
// ============================================================================

#[test]
fn read_constraint_table() {
    let w = world();
    let strict = Transaction::new(true, w.root);
    let lenient = Transaction::new(false, w.root);
    let ctx = &w.env.ctx;

    assert!(!strict.read_constraint(ctx, w.root));
    assert!(strict.read_constraint(ctx, w.other_class));
    assert!(strict.read_constraint(ctx, w.image_class));
    assert!(!lenient.read_constraint(ctx, w.other_class));
    assert!(!lenient.read_constraint(ctx, w.image_class));
}

#[test]
fn blocked_static_read_aborts() {
    let w = world();
    let txn = w.env.begin(true, w.root);
    let err = accessor::get_static_field(&w.env.ctx, w.other_class, FIELD, FieldKind::Int32, false)
        .unwrap_err();
    assert!(err.to_string().contains("Can't read static fields"));
    assert!(txn.is_aborted());
    w.env.rollback(&txn);
}

// ============================================================================
// Abort
// ============================================================================

#[test]
fn first_abort_message_wins() {
    let w = world();
    let txn = w.env.begin(true, w.root);

    let first = accessor::set_field(&w.env.ctx, w.other_class, FIELD, FieldValue::Int32(1), false)
        .unwrap_err();
    w.env.ctx.clear_exception();
    let second = accessor::set_field(&w.env.ctx, w.image_obj, FIELD, FieldValue::Int32(1), false)
        .unwrap_err();

    let first_message = first.as_abort().unwrap().message.clone();
    assert_eq!(txn.abort_message(), first_message);
    assert_ne!(second.as_abort().unwrap().message, first_message);

    txn.abort("explicit");
    assert_eq!(txn.abort_message(), first_message);

    // Rethrow carries the stored message.
    w.env.ctx.clear_exception();
    let rethrown = txn.throw_abort_error(&w.env.ctx, None);
    assert_eq!(rethrown.message, first_message);
    let pending = w.env.ctx.pending_exception().unwrap();
    assert_eq!(pending.descriptor, ABORT_ERROR_DESCRIPTOR);
    assert_eq!(pending.message, first_message);

    w.env.rollback(&txn);
    assert!(txn.is_aborted());
}

#[test]
fn abort_is_thread_safe() {
    let w = world();
    let txn = std::sync::Arc::new(Transaction::new(true, w.root));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let txn = std::sync::Arc::clone(&txn);
            std::thread::spawn(move || txn.abort(&format!("thread {}", i)))
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(txn.is_aborted());
    assert!(txn.abort_message().starts_with("thread "));
}

// ============================================================================
// Transactional mode
// ============================================================================

#[test]
#[should_panic(expected = "still in transactional mode")]
fn rollback_inside_transactional_mode_panics() {
    let w = world();
    let txn = w.env.begin(true, w.root);
    txn.rollback(&w.env.ctx);
}

#[test]
fn guard_allows_reads_but_not_records() {
    let w = world();
    let txn = w.env.begin(true, w.root);
    {
        let _guard = ScopedAssertNoNewRecords::new(&w.env.ctx, "static read");
        accessor::get_static_field(&w.env.ctx, w.root, FIELD, FieldKind::Int32, false).unwrap();
    }
    accessor::set_field(&w.env.ctx, w.root, FIELD, FieldValue::Int32(1), false).unwrap();
    assert_eq!(txn.stats().field_values_count, 1);
    w.env.rollback(&txn);
}
