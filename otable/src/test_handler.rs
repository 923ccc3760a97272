#![cfg(test)]
#![allow(missing_docs)]
use otable_heap::{Heap, Value};

use crate::{small, KeysConversion, OrderedSet, Runtime};

fn runtime() -> Runtime<Heap> {
    Runtime::new(Heap::new())
}

#[test]
fn capacity_routing_picks_the_form() {
    let rt = runtime();
    assert!(!OrderedSet::with_capacity(&rt, 0).unwrap().is_large());
    assert!(!OrderedSet::with_capacity(&rt, small::MAX_CAPACITY - 1)
        .unwrap()
        .is_large());
    assert!(OrderedSet::with_capacity(&rt, small::MAX_CAPACITY)
        .unwrap()
        .is_large());
}

#[test]
fn small_form_growth_hits_every_boundary() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    assert_eq!(set.capacity(), 4);
    for value in 0..128 {
        set.add(&rt, Value::Smi(value)).unwrap();
    }
    assert!(!set.is_large());
    assert_eq!(set.capacity(), 128);
    // Doubling past 128 would be 256, which the byte cells cannot address;
    // the growth lands on 254 instead.
    set.add(&rt, Value::Smi(128)).unwrap();
    assert_eq!(set.capacity(), small::MAX_CAPACITY);
    assert!(!set.is_large());
}

#[test]
fn promotion_is_total_and_order_preserving() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    for value in 0..300 {
        set.add(&rt, Value::Smi(value)).unwrap();
        let expect_large = value >= small::MAX_CAPACITY as i32;
        assert_eq!(set.is_large(), expect_large, "at key {value}");
    }
    assert_eq!(set.number_of_elements(), 300);
    assert_eq!(set.keys(), (0..300).map(Value::Smi).collect::<Vec<_>>());
    for value in 0..300 {
        assert!(set.has(&rt, Value::Smi(value)));
    }
}

#[test]
fn promotion_carries_tombstone_free_contents() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    for value in 0..254 {
        set.add(&rt, Value::Smi(value)).unwrap();
    }
    set.delete(&rt, Value::Smi(0));
    set.delete(&rt, Value::Smi(100));
    // 252 live + 2 tombstones fill all 254 slots, but half the capacity is
    // not yet deleted, so the small form cannot compact and must promote.
    set.add(&rt, Value::Smi(300)).unwrap();
    assert!(set.is_large());
    assert_eq!(set.number_of_elements(), 253);
    assert_eq!(set.number_of_deleted_elements(), 0);
    let keys = set.keys();
    assert_eq!(keys[0], Value::Smi(1));
    assert_eq!(keys[252], Value::Smi(300));
    assert!(!set.has(&rt, Value::Smi(100)));
}

#[test]
fn clear_resets_both_forms() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    for value in 0..10 {
        set.add(&rt, Value::Smi(value)).unwrap();
    }
    set.clear(&rt).unwrap();
    assert_eq!(set.number_of_elements(), 0);
    assert!(!set.is_large());
    assert!(!set.has(&rt, Value::Smi(3)));

    for value in 0..300 {
        set.add(&rt, Value::Smi(value)).unwrap();
    }
    assert!(set.is_large());
    set.clear(&rt).unwrap();
    assert_eq!(set.number_of_elements(), 0);
    // Promotion is one-way: clearing keeps the large form.
    assert!(set.is_large());
    set.add(&rt, Value::Smi(7)).unwrap();
    assert_eq!(set.keys(), vec![Value::Smi(7)]);
}

#[test]
fn keys_array_keeps_numbers_by_default() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    let name = rt.host().intern("size");
    set.add(&rt, Value::Smi(2)).unwrap();
    set.add(&rt, name).unwrap();
    set.add(&rt, Value::Smi(0)).unwrap();
    set.delete(&rt, Value::Smi(2));
    let keys = set.into_keys_array(&rt, KeysConversion::KeepNumbers);
    assert_eq!(keys, vec![name, Value::Smi(0)]);
}

#[test]
fn keys_array_stringifies_indices() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    set.add(&rt, Value::Smi(7)).unwrap();
    set.add(&rt, rt.host().intern("length")).unwrap();
    set.add(&rt, Value::Num(12.0)).unwrap();
    let keys = set.into_keys_array(&rt, KeysConversion::ConvertToString);
    assert_eq!(
        keys,
        vec![
            rt.host().intern("7"),
            rt.host().intern("length"),
            rt.host().intern("12")
        ]
    );
}

#[test]
fn keys_array_conversion_works_on_the_large_form() {
    let rt = runtime();
    // Cap the cache threshold so most conversions take the bypass path.
    rt.host().set_number_name_cache_limit(8);
    let mut set = OrderedSet::new(&rt).unwrap();
    for value in 0..300 {
        set.add(&rt, Value::Smi(value)).unwrap();
    }
    assert!(set.is_large());
    let keys = set.into_keys_array(&rt, KeysConversion::ConvertToString);
    assert_eq!(keys.len(), 300);
    assert_eq!(keys[0], rt.host().intern("0"));
    assert_eq!(keys[299], rt.host().intern("299"));
}

#[test]
fn keys_array_of_nonnumeric_keys() {
    let rt = runtime();
    let mut set = OrderedSet::new(&rt).unwrap();
    let a = rt.host().intern("a");
    let b = rt.host().intern("b");
    set.add(&rt, a).unwrap();
    set.add(&rt, b).unwrap();
    let keys = set.into_keys_array(&rt, KeysConversion::NoNumbers);
    assert_eq!(keys, vec![a, b]);
}
