#![cfg(test)]
#![allow(missing_docs)]
use crate::{Heap, Host, TaggedValue, Value};

#[test]
fn interned_names_have_one_identity() {
    let heap = Heap::new();
    let a = heap.intern("alpha");
    let b = heap.intern("alpha");
    let c = heap.intern("beta");
    assert!(a.same_identity(b));
    assert!(!a.same_identity(c));
    assert_eq!(heap.hash(a), heap.hash(b));
}

#[test]
fn object_identity_hash_is_lazy() {
    let heap = Heap::new();
    let obj = heap.new_object();
    assert_eq!(heap.hash(obj), None);
    let hash = heap.hash_or_create(obj);
    assert_eq!(heap.hash(obj), Some(hash));
    assert_eq!(heap.hash_or_create(obj), hash);

    let other = heap.new_object();
    assert!(!obj.same_identity(other));
    assert_eq!(heap.hash(other), None);
}

#[test]
fn same_value_zero_unifies_zeros_and_nans() {
    let plus = Value::Num(0.0);
    let minus = Value::Num(-0.0);
    let smi = Value::Smi(0);
    assert!(plus.same_value_zero(minus));
    assert!(plus.same_value_zero(smi));
    assert!(!plus.same_identity(minus));

    let nan = Value::Num(f64::NAN);
    let other_nan = Value::Num(f64::from_bits(f64::NAN.to_bits() | 1));
    assert!(nan.same_value_zero(other_nan));

    let heap = Heap::new();
    assert_eq!(heap.hash(plus), heap.hash(minus));
    assert_eq!(heap.hash(plus), heap.hash(smi));
    assert_eq!(heap.hash(nan), heap.hash(other_nan));
}

#[test]
fn smi_and_num_hash_consistently() {
    let heap = Heap::new();
    for value in [-5, 0, 1, 12345] {
        assert_eq!(
            heap.hash(Value::Smi(value)),
            heap.hash(Value::Num(value as f64))
        );
        assert!(Value::Smi(value).same_value_zero(Value::Num(value as f64)));
    }
}

#[test]
fn array_index_classification() {
    assert_eq!(Value::Smi(7).as_array_index(), Some(7));
    assert_eq!(Value::Smi(-1).as_array_index(), None);
    assert_eq!(Value::Num(3.0).as_array_index(), Some(3));
    assert_eq!(Value::Num(3.5).as_array_index(), None);
    assert_eq!(Value::Num(u32::MAX as f64).as_array_index(), None);
    assert_eq!(Value::Undefined.as_array_index(), None);
}

#[test]
fn slot_limit_fails_allocation() {
    let heap = Heap::new();
    heap.set_slot_limit(Some(10));
    assert!(heap.allocate_slots(8, Value::Hole).is_ok());
    let err = heap.allocate_slots(4, Value::Hole).unwrap_err();
    assert_eq!(err.slots, 4);
    heap.set_slot_limit(None);
    assert!(heap.allocate_slots(4, Value::Hole).is_ok());
    assert_eq!(heap.slots_allocated(), 12);
}

#[test]
fn index_to_name_caches_up_to_request() {
    let heap = Heap::new();
    let cached = heap.index_to_name(42, true);
    let again = heap.index_to_name(42, true);
    assert!(cached.same_identity(again));

    // Bypassing the cache still interns, so identity is preserved.
    let uncached = heap.index_to_name(42, false);
    assert!(cached.same_identity(uncached));
    assert!(heap.intern("42").same_identity(cached));
}

#[test]
#[should_panic(expected = "no-allocation scope")]
#[cfg(debug_assertions)]
fn allocation_inside_no_alloc_scope_panics() {
    let heap = Heap::new();
    let _guard = heap.no_alloc();
    let _ = heap.allocate_slots(1, Value::Hole);
}
