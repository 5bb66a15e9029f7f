//! Property Tests
//!
//! Whatever sequence of writes an initializer performs, rollback brings the
//! heap back to the state it had when the transaction started.

use crate::common::*;
use proptest::prelude::*;
use txlog::StringTables;

const FIELDS: usize = 4;
const STRINGS: usize = 3;

fn field(i: usize) -> FieldOffset {
    FieldOffset::new(16 + 4 * i as u32)
}

#[derive(Debug, Clone, Copy)]
enum InternOp {
    InternStrong,
    InternWeak,
    RemoveStrong,
    RemoveWeak,
}

fn intern_op() -> impl Strategy<Value = InternOp> {
    prop_oneof![
        Just(InternOp::InternStrong),
        Just(InternOp::InternWeak),
        Just(InternOp::RemoveStrong),
        Just(InternOp::RemoveWeak),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn field_writes_roll_back_to_initial_values(
        initial in prop::collection::vec(any::<u32>(), FIELDS),
        writes in prop::collection::vec((0..FIELDS, any::<u32>()), 0..32),
    ) {
        let env = TestEnv::new();
        let (class, obj) = env.class_and_instance("com.example.Prop");
        for (i, value) in initial.iter().enumerate() {
            env.heap.write_field(obj, field(i), FieldValue::Int32(*value), false).unwrap();
        }

        let txn = env.begin(true, class);
        for (i, value) in &writes {
            accessor::set_field(&env.ctx, obj, field(*i), FieldValue::Int32(*value), false)
                .unwrap();
        }
        for (i, value) in initial.iter().enumerate() {
            if let Some(logged) = txn.logged_field(obj, field(i)) {
                prop_assert_eq!(logged, FieldValue::Int32(*value));
            }
        }
        env.rollback(&txn);

        for (i, value) in initial.iter().enumerate() {
            prop_assert_eq!(env.read(obj, field(i), FieldKind::Int32), FieldValue::Int32(*value));
        }
    }

    #[test]
    fn element_writes_roll_back_bit_exact(
        initial in prop::collection::vec(any::<u64>(), 1..8),
        writes in prop::collection::vec((any::<prop::sample::Index>(), any::<u64>()), 0..32),
    ) {
        let env = TestEnv::new();
        let class = env.heap.define_class("com.example.Prop");
        let array = env.heap.alloc_primitive_array(PrimitiveType::Double, initial.len());
        for (i, raw) in initial.iter().enumerate() {
            env.heap
                .write_element(array, i, ArrayElement::from_raw(PrimitiveType::Double, *raw))
                .unwrap();
        }

        let txn = env.begin(true, class);
        for (index, raw) in &writes {
            let i = index.index(initial.len());
            let element = ArrayElement::from_raw(PrimitiveType::Double, *raw);
            accessor::set_array_element(&env.ctx, array, i, element).unwrap();
        }
        env.rollback(&txn);

        for (i, raw) in initial.iter().enumerate() {
            prop_assert_eq!(env.element(array, i).to_raw(), *raw);
        }
    }

    #[test]
    fn interning_rolls_back_to_initial_tables(
        initial_strong in prop::collection::vec(any::<bool>(), STRINGS),
        initial_weak in prop::collection::vec(any::<bool>(), STRINGS),
        ops in prop::collection::vec((0..STRINGS, intern_op()), 0..24),
    ) {
        let env = TestEnv::new();
        let class = env.heap.define_class("com.example.Prop");
        let strings: Vec<ObjRef> = (0..STRINGS)
            .map(|i| env.heap.alloc_string(&format!("s{}", i)))
            .collect();
        for (i, s) in strings.iter().enumerate() {
            if initial_strong[i] {
                accessor::intern_strong(&env.ctx, *s);
            }
            if initial_weak[i] {
                accessor::intern_weak(&env.ctx, *s);
            }
        }

        let txn = env.begin(false, class);
        for (i, op) in &ops {
            let s = strings[*i];
            match op {
                InternOp::InternStrong => accessor::intern_strong(&env.ctx, s),
                InternOp::InternWeak => accessor::intern_weak(&env.ctx, s),
                InternOp::RemoveStrong => accessor::remove_strong(&env.ctx, s),
                InternOp::RemoveWeak => accessor::remove_weak(&env.ctx, s),
            };
        }
        env.rollback(&txn);

        let tables = env.ctx.intern_table().lock();
        for (i, s) in strings.iter().enumerate() {
            prop_assert_eq!(tables.contains_strong(*s), initial_strong[i]);
            prop_assert_eq!(tables.contains_weak(*s), initial_weak[i]);
        }
    }
}
