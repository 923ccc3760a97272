#![cfg(test)]
#![allow(missing_docs)]
use std::rc::Rc;

use otable_heap::{Heap, Host, TaggedValue, Value};
use rand::prelude::*;

use crate::shape::SetShape;
use crate::{Error, LargeTable, OrderedSet, Runtime};

fn runtime() -> Runtime<Heap> {
    Runtime::new(Heap::new())
}

#[test]
fn insertion_order_with_duplicate() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    for text in ["a", "b", "c", "a"] {
        set.add(&rt, rt.host().intern(text)).unwrap();
    }
    assert_eq!(set.number_of_elements(), 3);
    assert_eq!(
        set.keys(),
        vec![
            rt.host().intern("a"),
            rt.host().intern("b"),
            rt.host().intern("c")
        ]
    );
}

#[test]
fn delete_preserves_order_of_survivors() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    for value in [1, 2, 3, 4] {
        set.add(&rt, Value::Smi(value)).unwrap();
    }
    assert!(set.delete(&rt, Value::Smi(2)));
    assert!(set.delete(&rt, Value::Smi(4)));
    assert!(!set.delete(&rt, Value::Smi(4)));
    assert_eq!(set.keys(), vec![Value::Smi(1), Value::Smi(3)]);
    assert_eq!(set.number_of_elements(), 2);
    assert_eq!(set.number_of_deleted_elements(), 2);
}

#[test]
fn re_add_after_delete_is_a_new_insertion() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    for value in [10, 20, 30] {
        set.add(&rt, Value::Smi(value)).unwrap();
    }
    set.delete(&rt, Value::Smi(10));
    set.add(&rt, Value::Smi(10)).unwrap();
    assert_eq!(
        set.keys(),
        vec![Value::Smi(20), Value::Smi(30), Value::Smi(10)]
    );
}

#[test]
fn add_then_find_then_delete() {
    let rt = runtime();
    let obj = rt.host().new_object();
    let mut set = OrderedSet::new(&rt).unwrap();
    assert!(!set.has(&rt, obj));
    set.add(&rt, obj).unwrap();
    assert!(set.has(&rt, obj));
    assert!(set.delete(&rt, obj));
    assert!(!set.has(&rt, obj));
}

#[test]
fn unhashed_object_is_never_found() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    set.add(&rt, Value::Smi(1)).unwrap();
    // This object has no identity hash, so lookup bails before walking.
    let stranger = rt.host().new_object();
    assert!(!set.has(&rt, stranger));
    assert!(!set.delete(&rt, stranger));
    assert_eq!(rt.host().hash(stranger), None);
}

#[test]
fn same_value_zero_keys_unify() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    set.add(&rt, Value::Num(0.0)).unwrap();
    set.add(&rt, Value::Num(-0.0)).unwrap();
    set.add(&rt, Value::Smi(0)).unwrap();
    set.add(&rt, Value::Num(f64::NAN)).unwrap();
    set.add(&rt, Value::Num(f64::NAN)).unwrap();
    assert_eq!(set.number_of_elements(), 2);
    assert!(set.has(&rt, Value::Smi(0)));
    assert!(set.has(&rt, Value::Num(f64::NAN)));
}

#[test]
fn large_compaction_keeps_used_capacity_monotonic() {
    let rt = runtime();
    let mut table = LargeTable::allocate(&rt, 4).unwrap();
    for value in [1, 2, 3, 4] {
        table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(value)).unwrap();
    }
    assert_eq!(table.capacity(), 4);
    // Tombstones keep their slots; the next add compacts instead of growing.
    table.delete(&rt, Value::Smi(1));
    table.delete(&rt, Value::Smi(2));
    assert_eq!(table.used_capacity(), 4);
    let old = table.clone();
    table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(5)).unwrap();
    assert_eq!(table.capacity(), 4);
    assert_eq!(table.number_of_deleted_elements(), 0);
    assert_eq!(
        table.live_entries().map(|e| table.key_at(e)).collect::<Vec<_>>(),
        vec![Value::Smi(3), Value::Smi(4), Value::Smi(5)]
    );
    assert!(old.is_obsolete());
    assert_eq!(old.removed_index_at(0), Some(0));
    assert_eq!(old.removed_index_at(1), Some(1));
}

#[test]
fn shrink_is_a_fixed_point_at_quarter_load() {
    let rt = runtime();
    let mut table = LargeTable::allocate(&rt, 8).unwrap();
    for value in 0..2 {
        table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(value)).unwrap();
    }
    // 2 live of 8 is exactly a quarter: no shrink.
    let same = LargeTable::shrink(&rt, &table).unwrap();
    assert!(Rc::ptr_eq(&table, &same));
    assert!(!table.is_obsolete());

    table.delete(&rt, Value::Smi(0));
    let shrunk = LargeTable::shrink(&rt, &table).unwrap();
    assert_eq!(shrunk.capacity(), 4);
    assert!(table.is_obsolete());
    assert_eq!(
        shrunk.live_entries().map(|e| shrunk.key_at(e)).collect::<Vec<_>>(),
        vec![Value::Smi(1)]
    );
}

#[test]
fn failed_rehash_leaves_the_source_usable() {
    let rt = runtime();
    let mut table = LargeTable::allocate(&rt, 4).unwrap();
    for value in 0..4 {
        table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(value)).unwrap();
    }
    rt.host().set_slot_limit(Some(rt.host().slots_allocated()));
    let err = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(4)).unwrap_err();
    assert!(matches!(err, Error::AllocationFailure(_)));
    // Only a successful allocation marks the source obsolete.
    assert!(!table.is_obsolete());
    assert!(table.has_key(&rt, Value::Smi(3)));

    rt.host().set_slot_limit(None);
    table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(4)).unwrap();
    assert_eq!(table.number_of_elements(), 5);
}

#[test]
fn randomized_against_ordered_model() {
    let rt = runtime();
    let mut rng = StdRng::seed_from_u64(0x5e7);
    let mut set = OrderedSet::new(&rt).unwrap();
    let mut model: Vec<Value> = vec![];

    let model_position = |model: &Vec<Value>, key: Value| {
        model.iter().position(|&present| present.same_value_zero(key))
    };

    for step in 0..4000 {
        let key = Value::Smi(rng.gen_range(0..48));
        match rng.gen_range(0..100) {
            0..=54 => {
                set.add(&rt, key).unwrap();
                if model_position(&model, key).is_none() {
                    model.push(key);
                }
            }
            55..=89 => {
                let deleted = set.delete(&rt, key);
                let in_model = model_position(&model, key);
                assert_eq!(deleted, in_model.is_some());
                if let Some(position) = in_model {
                    model.remove(position);
                }
            }
            90..=97 => {
                set.shrink(&rt).unwrap();
            }
            _ => {
                set.clear(&rt).unwrap();
                model.clear();
            }
        }
        assert_eq!(set.number_of_elements(), model.len());
        if step % 64 == 0 {
            assert_eq!(set.keys(), model);
        }
        let probe = Value::Smi(rng.gen_range(0..48));
        assert_eq!(set.has(&rt, probe), model_position(&model, probe).is_some());
    }
}
