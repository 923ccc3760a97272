#![cfg(test)]
#![allow(missing_docs)]
use otable_heap::{Heap, Value};

use crate::{NameDictionary, PropertyDetails, Runtime};

fn runtime() -> Runtime<Heap> {
    Runtime::new(Heap::new())
}

#[test]
fn details_round_trip_and_deletion() {
    let rt = runtime();
    let x = rt.host().intern("x");
    let y = rt.host().intern("y");
    let mut dict = NameDictionary::new(&rt).unwrap();
    dict.add(&rt, x, Value::Smi(1), PropertyDetails(0b101)).unwrap();
    dict.add(&rt, y, Value::Smi(2), PropertyDetails(0b110)).unwrap();

    let entry = dict.find_entry(&rt, x).unwrap();
    assert_eq!(dict.details_at(entry), PropertyDetails(0b101));
    assert_eq!(dict.value_at(entry), Value::Smi(1));

    dict.delete_entry(&rt, entry).unwrap();
    assert_eq!(dict.find_entry(&rt, x), None);
    assert_eq!(dict.keys(), vec![y]);
    assert_eq!(dict.number_of_elements(), 1);
}

#[test]
fn object_hash_survives_deletion_and_shrink() {
    let rt = runtime();
    let mut dict = NameDictionary::with_capacity(&rt, 8).unwrap();
    assert_eq!(dict.capacity(), 8);
    dict.set_hash(0x2b3f);
    for (index, text) in ["p", "q"].iter().enumerate() {
        let name = rt.host().intern(text);
        dict.add(&rt, name, Value::Smi(index as i32), PropertyDetails::EMPTY)
            .unwrap();
    }

    // Dropping below a quarter of the capacity shrinks the backing table;
    // the owning object's hash must ride along.
    let entry = dict.find_entry(&rt, rt.host().intern("p")).unwrap();
    dict.delete_entry(&rt, entry).unwrap();
    assert_eq!(dict.capacity(), 4);
    assert_eq!(dict.hash(), 0x2b3f);
    assert_eq!(dict.keys(), vec![rt.host().intern("q")]);
}

#[test]
fn value_and_details_updates_are_in_place() {
    let rt = runtime();
    let a = rt.host().intern("a");
    let b = rt.host().intern("b");
    let mut dict = NameDictionary::new(&rt).unwrap();
    dict.add(&rt, a, Value::Smi(1), PropertyDetails(1)).unwrap();
    dict.add(&rt, b, Value::Smi(2), PropertyDetails(2)).unwrap();

    let entry = dict.find_entry(&rt, a).unwrap();
    dict.value_at_put(entry, Value::Smi(41));
    dict.details_at_put(entry, PropertyDetails(9));
    assert_eq!(dict.value_at(entry), Value::Smi(41));
    assert_eq!(dict.details_at(entry), PropertyDetails(9));
    // In-place updates never change insertion order.
    assert_eq!(dict.keys(), vec![a, b]);
}

#[test]
fn identity_lookup_distinguishes_names() {
    let rt = runtime();
    let long = rt.host().intern("property_name");
    let other = rt.host().intern("property_name2");
    let mut dict = NameDictionary::new(&rt).unwrap();
    dict.add(&rt, long, Value::Null, PropertyDetails::EMPTY).unwrap();
    assert!(dict.find_entry(&rt, long).is_some());
    assert_eq!(dict.find_entry(&rt, other), None);
    // Re-interning the same text yields the same identity.
    assert!(dict.find_entry(&rt, rt.host().intern("property_name")).is_some());
}

#[test]
fn hash_word_survives_promotion() {
    let rt = runtime();
    let mut dict = NameDictionary::new(&rt).unwrap();
    dict.set_hash(0x517);
    for index in 0..300 {
        let name = rt.host().intern(&format!("key{index}"));
        dict.add(&rt, name, Value::Smi(index), PropertyDetails::EMPTY)
            .unwrap();
    }
    assert!(dict.is_large());
    assert_eq!(dict.hash(), 0x517);
    assert_eq!(dict.number_of_elements(), 300);
    let probe = dict.find_entry(&rt, rt.host().intern("key123")).unwrap();
    assert_eq!(dict.value_at(probe), Value::Smi(123));
}
