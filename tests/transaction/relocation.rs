//! Relocation Tests
//!
//! A moving collection while the transaction is open must leave every log
//! pointing at the relocated objects, so a later rollback restores the right
//! objects with the right (forwarded) values.

use crate::common::*;
use txlog::{CollectionResult, RootTypeKey, StringTables, VisitRoots};

fn collect(env: &TestEnv, txn: &Transaction) -> CollectionResult {
    let holders: [&dyn VisitRoots; 2] = [txn, env.ctx.intern_table()];
    MovingCollector::new().collect(&env.heap, &holders)
}

#[test]
fn logs_follow_relocated_objects() {
    let env = TestEnv::new();
    let (class, obj) = env.class_and_instance("com.example.Graph");
    let original_target = env.heap.alloc_string("original");
    let replacement = env.heap.alloc_string("replacement");
    let array = env.heap.alloc_primitive_array(PrimitiveType::Double, 2);
    let cache = env.heap.alloc_string_cache(2);
    let interned = env.heap.alloc_string("interned");
    env.heap
        .write_field(obj, FIELD, FieldValue::Reference(Some(original_target)), false)
        .unwrap();
    env.heap.write_element(array, 1, ArrayElement::Double(1.5)).unwrap();

    let txn = env.begin(true, class);
    accessor::set_field(&env.ctx, obj, FIELD, FieldValue::Reference(Some(replacement)), false)
        .unwrap();
    accessor::set_array_element(&env.ctx, array, 1, ArrayElement::Double(-2.5)).unwrap();
    accessor::resolve_string(&env.ctx, cache, StringIndex(1), interned).unwrap();
    accessor::intern_weak(&env.ctx, interned);

    let result = collect(&env, &txn);
    assert_eq!(result.dangling_roots, 0);
    assert!(result.forwarding.moved(obj));

    let fwd = |r: ObjRef| result.forwarding.forward(r);
    let (obj, original_target, array, cache, interned, class) = (
        fwd(obj),
        fwd(original_target),
        fwd(array),
        fwd(cache),
        fwd(interned),
        fwd(class),
    );
    assert_eq!(txn.root(), class);
    assert_eq!(
        txn.logged_field(obj, FIELD),
        Some(FieldValue::Reference(Some(original_target)))
    );
    assert_eq!(txn.logged_element(array, 1), Some(1.5f64.to_bits()));
    assert_eq!(txn.resolve_string_logs()[0].cache(), cache);
    assert_eq!(txn.intern_string_logs()[0].string(), interned);

    env.rollback(&txn);
    assert_eq!(
        env.read(obj, FIELD, FieldKind::Reference),
        FieldValue::Reference(Some(original_target))
    );
    assert_eq!(env.element(array, 1), ArrayElement::Double(1.5));
    assert_eq!(env.heap.resolved_string(cache, StringIndex(1)).unwrap(), None);
    assert!(!env.ctx.intern_table().lock().contains_weak(interned));
    assert_eq!(env.heap.string_value(original_target).unwrap(), "original");
}

#[test]
fn every_held_reference_is_reported() {
    let env = TestEnv::new();
    let (class, obj) = env.class_and_instance("com.example.Roots");
    let target = env.heap.alloc_string("target");
    let array = env.heap.alloc_primitive_array(PrimitiveType::Int, 1);
    let cache = env.heap.alloc_string_cache(1);
    let interned = env.heap.alloc_string("interned");
    env.heap.write_field(obj, FIELD, FieldValue::Reference(Some(target)), false).unwrap();

    let txn = env.begin(false, class);
    accessor::set_field(&env.ctx, obj, FIELD, FieldValue::Reference(None), false).unwrap();
    accessor::set_field(&env.ctx, obj, FieldOffset::new(24), FieldValue::Int32(1), false).unwrap();
    accessor::set_array_element(&env.ctx, array, 0, ArrayElement::Int(1)).unwrap();
    accessor::resolve_string(&env.ctx, cache, StringIndex(0), interned).unwrap();
    accessor::intern_strong(&env.ctx, interned);
    env.ctx.exit_transaction();

    let holders: [&dyn VisitRoots; 1] = [&*txn];
    let result = MovingCollector::new().collect(&env.heap, &holders);

    // root, logged target, object key, array key, interned string, cache
    assert_eq!(result.roots_visited, 6);
    assert_eq!(result.roots_by_type.get(&RootTypeKey::Unknown), Some(&4));
    assert_eq!(result.roots_by_type.get(&RootTypeKey::InternedString), Some(&1));
    assert_eq!(result.roots_by_type.get(&RootTypeKey::VmInternal), Some(&1));
    assert_eq!(result.roots_updated, 6);
    assert_eq!(result.dangling_roots, 0);
}

#[test]
fn repeated_collections_keep_logs_consistent() {
    let env = TestEnv::new();
    let (class, first) = env.class_and_instance("com.example.Many");
    let mut objects = vec![first];
    for _ in 0..15 {
        objects.push(env.heap.alloc_instance(class).unwrap());
    }
    for (i, obj) in objects.iter().enumerate() {
        env.heap.write_field(*obj, FIELD, FieldValue::Int64(i as u64), false).unwrap();
    }

    let txn = env.begin(true, class);
    for obj in &objects {
        accessor::set_field(&env.ctx, *obj, FIELD, FieldValue::Int64(u64::MAX), false).unwrap();
    }

    let mut class = class;
    for _ in 0..3 {
        let result = collect(&env, &txn);
        assert_eq!(result.dangling_roots, 0);
        for obj in objects.iter_mut() {
            *obj = result.forwarding.forward(*obj);
        }
        class = result.forwarding.forward(class);
    }
    assert_eq!(env.heap.stats().collections, 3);
    assert_eq!(txn.stats().objects_count, objects.len());

    // The relocated root class is still the one this transaction may write.
    assert!(!txn.write_constraint(&env.ctx, class));
    accessor::set_field(&env.ctx, class, FIELD, FieldValue::Int32(1), false).unwrap();

    env.rollback(&txn);
    for (i, obj) in objects.iter().enumerate() {
        assert_eq!(env.read(*obj, FIELD, FieldKind::Int64), FieldValue::Int64(i as u64));
    }
    assert_eq!(env.read(class, FIELD, FieldKind::Int32), FieldValue::Int32(0));
}

#[test]
fn image_objects_keep_their_keys() {
    let env = TestEnv::new();
    let root = env.heap.define_class("com.example.Boot");
    let image_class = env.heap.define_image_class("java.lang.Runtime");
    let image_obj = env.heap.alloc_image_instance(image_class).unwrap();

    // The accessors refuse image objects; record by hand.
    let txn = Transaction::new(false, root);
    txn.record_write_field_32(image_obj, FIELD, 0, false);
    env.heap.write_field(image_obj, FIELD, FieldValue::Int32(3), false).unwrap();

    let holders: [&dyn VisitRoots; 1] = [&txn];
    let result = MovingCollector::new().collect(&env.heap, &holders);
    assert!(!result.forwarding.moved(image_obj));
    assert_eq!(txn.logged_field(image_obj, FIELD), Some(FieldValue::Int32(0)));

    txn.rollback(&env.ctx);
    assert_eq!(env.read(image_obj, FIELD, FieldKind::Int32), FieldValue::Int32(0));
}
