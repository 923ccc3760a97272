#![cfg(test)]
#![allow(missing_docs)]
use otable_heap::{Heap, Host, Value};
use rand::prelude::*;

use crate::{OrderedMap, Runtime};

fn runtime() -> Runtime<Heap> {
    Runtime::new(Heap::new())
}

#[test]
fn compaction_rehash_drops_tombstones_in_order() {
    let rt = runtime();
    let mut map = OrderedMap::with_capacity(&rt, 4).unwrap();
    assert_eq!(map.capacity(), 4);
    for value in 1..=4 {
        map.add(&rt, Value::Smi(value), Value::Smi(value * 100)).unwrap();
    }
    map.delete(&rt, Value::Smi(1));
    map.delete(&rt, Value::Smi(2));
    // The next add finds the table full with half of it tombstones and
    // rehashes at the same capacity.
    map.add(&rt, Value::Smi(5), Value::Smi(500)).unwrap();
    assert_eq!(map.capacity(), 4);
    assert_eq!(map.number_of_deleted_elements(), 0);
    assert_eq!(
        map.keys(),
        vec![Value::Smi(3), Value::Smi(4), Value::Smi(5)]
    );
    assert_eq!(map.get(&rt, Value::Smi(3)), Some(Value::Smi(300)));
    assert_eq!(map.get(&rt, Value::Smi(5)), Some(Value::Smi(500)));
}

#[test]
fn add_keeps_the_first_value() {
    let rt = runtime();
    let mut map = OrderedMap::new(&rt).unwrap();
    map.add(&rt, Value::Smi(1), Value::Smi(10)).unwrap();
    map.add(&rt, Value::Smi(1), Value::Smi(20)).unwrap();
    assert_eq!(map.get(&rt, Value::Smi(1)), Some(Value::Smi(10)));
    assert_eq!(map.number_of_elements(), 1);
}

#[test]
fn set_overwrites_in_place_without_reordering() {
    let rt = runtime();
    let mut map = OrderedMap::new(&rt).unwrap();
    for value in [1, 2, 3] {
        map.set(&rt, Value::Smi(value), Value::Bool(false)).unwrap();
    }
    map.set(&rt, Value::Smi(1), Value::Bool(true)).unwrap();
    assert_eq!(map.get(&rt, Value::Smi(1)), Some(Value::Bool(true)));
    assert_eq!(
        map.keys(),
        vec![Value::Smi(1), Value::Smi(2), Value::Smi(3)]
    );
}

#[test]
fn set_keeps_the_first_stored_key() {
    let rt = runtime();
    let mut map = OrderedMap::new(&rt).unwrap();
    map.set(&rt, Value::Num(-0.0), Value::Smi(1)).unwrap();
    // Same-value-zero treats +0 and -0 as the same key; the stored key stays
    // the negative zero that arrived first.
    map.set(&rt, Value::Smi(0), Value::Smi(2)).unwrap();
    assert_eq!(map.number_of_elements(), 1);
    assert_eq!(map.get(&rt, Value::Smi(0)), Some(Value::Smi(2)));
    let keys = map.keys();
    assert!(matches!(keys[0], Value::Num(raw) if raw == 0.0 && raw.is_sign_negative()));
}

#[test]
fn key_hash_of_an_unused_object_is_absent() {
    let rt = runtime();
    let obj = rt.host().new_object();
    assert_eq!(OrderedMap::key_hash(&rt, obj), None);

    let mut map = OrderedMap::new(&rt).unwrap();
    map.add(&rt, obj, Value::Null).unwrap();
    let hash = OrderedMap::key_hash(&rt, obj);
    assert!(hash.is_some());
    // The hash is the key's identity hash, independent of the map.
    assert_eq!(hash, rt.host().hash(obj));
}

#[test]
fn values_follow_keys_across_rehashes() {
    let rt = runtime();
    let mut map = OrderedMap::new(&rt).unwrap();
    let mut rng = StdRng::seed_from_u64(0xbeef);
    let mut model: Vec<(i32, i32)> = vec![];

    for _ in 0..3000 {
        let key = rng.gen_range(0..64);
        match rng.gen_range(0..10) {
            0..=5 => {
                let value = rng.gen_range(0..1000);
                map.set(&rt, Value::Smi(key), Value::Smi(value)).unwrap();
                match model.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => model.push((key, value)),
                }
            }
            6..=8 => {
                let deleted = map.delete(&rt, Value::Smi(key));
                let position = model.iter().position(|(k, _)| *k == key);
                assert_eq!(deleted, position.is_some());
                if let Some(position) = position {
                    model.remove(position);
                }
            }
            _ => map.shrink(&rt).unwrap(),
        }
        assert_eq!(map.number_of_elements(), model.len());
        let probe = rng.gen_range(0..64);
        assert_eq!(
            map.get(&rt, Value::Smi(probe)),
            model
                .iter()
                .find(|(k, _)| *k == probe)
                .map(|&(_, v)| Value::Smi(v))
        );
    }
    assert_eq!(
        map.entries(),
        model
            .iter()
            .map(|&(k, v)| (Value::Smi(k), Value::Smi(v)))
            .collect::<Vec<_>>()
    );
}
