#![allow(missing_docs)] // test only
use otable_heap::{Heap, TaggedValue, Value};
use rand::prelude::*;

use otable::{
    LargeTable, NameDictionary, OrderedMap, OrderedSet, PropertyDetails, Runtime, SetShape,
    TableIter,
};

/// A facade-driven set checked step by step against an insertion-ordered
/// reference model.
struct CheckedSet<'rt> {
    rt: &'rt Runtime<Heap>,
    dut: OrderedSet<Heap>,
    spec: Vec<Value>,
}

impl<'rt> CheckedSet<'rt> {
    fn new(rt: &'rt Runtime<Heap>) -> Self {
        CheckedSet {
            rt,
            dut: OrderedSet::new(rt).unwrap(),
            spec: vec![],
        }
    }

    fn spec_position(&self, key: Value) -> Option<usize> {
        self.spec.iter().position(|&present| present.same_value_zero(key))
    }

    fn add(&mut self, key: Value) {
        self.dut.add(self.rt, key).unwrap();
        if self.spec_position(key).is_none() {
            self.spec.push(key);
        }
    }

    fn delete(&mut self, key: Value) {
        let deleted = self.dut.delete(self.rt, key);
        let position = self.spec_position(key);
        assert_eq!(deleted, position.is_some());
        if let Some(position) = position {
            self.spec.remove(position);
        }
    }

    fn check(&self, probe: Value) {
        assert_eq!(self.dut.number_of_elements(), self.spec.len());
        assert_eq!(self.dut.has(self.rt, probe), self.spec_position(probe).is_some());
    }

    fn check_order(&self) {
        let keys = self.dut.keys();
        assert_eq!(keys.len(), self.spec.len());
        for (yielded, &expected) in keys.iter().zip(&self.spec) {
            assert!(yielded.same_value_zero(expected), "{yielded:?} != {expected:?}");
        }
    }
}

fn key_pool(rt: &Runtime<Heap>) -> Vec<Value> {
    let mut pool = vec![
        Value::Num(0.0),
        Value::Num(-0.0),
        Value::Num(f64::NAN),
        Value::Num(2.5),
        Value::Bool(true),
        Value::Bool(false),
        Value::Undefined,
        Value::Null,
    ];
    for value in 0..24 {
        pool.push(Value::Smi(value));
    }
    for index in 0..8 {
        pool.push(rt.host().intern(&format!("name{index}")));
    }
    for _ in 0..8 {
        pool.push(rt.host().new_object());
    }
    pool
}

#[test]
fn checked_set_mixed_key_kinds() {
    let rt = Runtime::new(Heap::new());
    let pool = key_pool(&rt);
    let mut rng = StdRng::seed_from_u64(1);
    let mut checked = CheckedSet::new(&rt);

    for step in 0..6000 {
        let key = *pool.choose(&mut rng).unwrap();
        match rng.gen_range(0..10) {
            0..=5 => checked.add(key),
            6..=8 => checked.delete(key),
            _ => checked.dut.shrink(&rt).unwrap(),
        }
        checked.check(*pool.choose(&mut rng).unwrap());
        if step % 128 == 0 {
            checked.check_order();
        }
    }
    checked.check_order();
}

#[test]
fn checked_set_grows_past_promotion() {
    let rt = Runtime::new(Heap::new());
    let mut rng = StdRng::seed_from_u64(2);
    let mut checked = CheckedSet::new(&rt);

    for value in 0..600 {
        checked.add(Value::Smi(value));
        if value % 3 == 0 {
            checked.delete(Value::Smi(rng.gen_range(0..=value)));
        }
    }
    assert!(checked.dut.is_large());
    checked.check_order();
}

#[test]
fn checked_map_tracks_values() {
    let rt = Runtime::new(Heap::new());
    let pool = key_pool(&rt);
    let mut rng = StdRng::seed_from_u64(3);
    let mut dut = OrderedMap::new(&rt).unwrap();
    let mut spec: Vec<(Value, i32)> = vec![];

    let position = |spec: &Vec<(Value, i32)>, key: Value| {
        spec.iter().position(|&(present, _)| present.same_value_zero(key))
    };

    for _ in 0..6000 {
        let key = *pool.choose(&mut rng).unwrap();
        match rng.gen_range(0..10) {
            0..=5 => {
                let value = rng.gen_range(0..1_000_000);
                dut.set(&rt, key, Value::Smi(value)).unwrap();
                match position(&spec, key) {
                    Some(slot) => spec[slot].1 = value,
                    None => spec.push((key, value)),
                }
            }
            6..=8 => {
                let deleted = dut.delete(&rt, key);
                let slot = position(&spec, key);
                assert_eq!(deleted, slot.is_some());
                if let Some(slot) = slot {
                    spec.remove(slot);
                }
            }
            _ => dut.shrink(&rt).unwrap(),
        }
        assert_eq!(dut.number_of_elements(), spec.len());
        let probe = *pool.choose(&mut rng).unwrap();
        assert_eq!(
            dut.get(&rt, probe),
            position(&spec, probe).map(|slot| Value::Smi(spec[slot].1))
        );
    }

    for (&(key, value), (dut_key, dut_value)) in spec.iter().zip(dut.entries()) {
        assert!(dut_key.same_value_zero(key));
        assert_eq!(dut_value, Value::Smi(value));
    }
}

#[test]
fn checked_dictionary_full_surface() {
    let rt = Runtime::new(Heap::new());
    let mut rng = StdRng::seed_from_u64(4);
    let names: Vec<Value> = (0..40).map(|i| rt.host().intern(&format!("prop{i}"))).collect();
    let mut dut = NameDictionary::new(&rt).unwrap();
    let mut spec: Vec<(Value, i32, u32)> = vec![];
    dut.set_hash(0xcafe);

    for _ in 0..4000 {
        let key = *names.choose(&mut rng).unwrap();
        let present = spec.iter().position(|&(name, ..)| name.same_identity(key));
        match rng.gen_range(0..10) {
            0..=4 => {
                let value = rng.gen_range(0..1000);
                let details = rng.gen_range(0..64);
                match present {
                    // The add path rejects duplicates; update in place.
                    Some(slot) => {
                        let entry = dut.find_entry(&rt, key).unwrap();
                        dut.value_at_put(entry, Value::Smi(value));
                        dut.details_at_put(entry, PropertyDetails(details));
                        spec[slot].1 = value;
                        spec[slot].2 = details;
                    }
                    None => {
                        dut.add(&rt, key, Value::Smi(value), PropertyDetails(details))
                            .unwrap();
                        spec.push((key, value, details));
                    }
                }
            }
            5..=8 => {
                if let Some(slot) = present {
                    let entry = dut.find_entry(&rt, key).unwrap();
                    dut.delete_entry(&rt, entry).unwrap();
                    spec.remove(slot);
                } else {
                    assert_eq!(dut.find_entry(&rt, key), None);
                }
            }
            _ => {
                let probe = *names.choose(&mut rng).unwrap();
                let entry = dut.find_entry(&rt, probe);
                let slot = spec.iter().position(|&(name, ..)| name.same_identity(probe));
                assert_eq!(entry.is_some(), slot.is_some());
                if let (Some(entry), Some(slot)) = (entry, slot) {
                    assert_eq!(dut.value_at(entry), Value::Smi(spec[slot].1));
                    assert_eq!(dut.details_at(entry), PropertyDetails(spec[slot].2));
                }
            }
        }
        assert_eq!(dut.number_of_elements(), spec.len());
        assert_eq!(dut.hash(), 0xcafe);
    }

    let keys = dut.keys();
    assert_eq!(keys.len(), spec.len());
    for (yielded, &(expected, ..)) in keys.iter().zip(&spec) {
        assert!(yielded.same_identity(expected));
    }
}

/// Drives a migrating iterator while the table is mutated underneath it.
///
/// Deletions only target keys the iterator has already yielded, so the
/// expected remaining sequence stays computable: every key later than the
/// cursor that is still live when the cursor passes it, in insertion order.
#[test]
fn iterator_stress_under_mutation() {
    let rt = Runtime::new(Heap::new());
    let mut rng = StdRng::seed_from_u64(5);

    for round in 0..64 {
        let mut table = LargeTable::allocate(&rt, 4).unwrap();
        let mut order: Vec<i32> = vec![];
        let mut next = 0;
        for _ in 0..rng.gen_range(1..20) {
            table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(next)).unwrap();
            order.push(next);
            next += 1;
        }

        let mut iter: TableIter<Heap, SetShape> = TableIter::new(table.clone());
        let mut cursor = 0usize;
        loop {
            match rng.gen_range(0..10) {
                // Append a fresh key; the iterator must still visit it.
                0..=3 => {
                    table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(next)).unwrap();
                    order.push(next);
                    next += 1;
                }
                // Delete behind the cursor, occasionally forcing compaction
                // through the shrink path.
                4..=6 => {
                    if cursor > 0 {
                        let victim = order[rng.gen_range(0..cursor)];
                        if table.delete(&rt, Value::Smi(victim)) {
                            let position = order.iter().position(|&k| k == victim).unwrap();
                            order.remove(position);
                            cursor -= 1;
                        }
                        table = LargeTable::shrink(&rt, &table).unwrap();
                    }
                }
                _ => {
                    let Some(key) = iter.next_key(&rt) else { break };
                    assert_eq!(key, Value::Smi(order[cursor]), "round {round}");
                    cursor += 1;
                }
            }
            if next > 200 {
                break;
            }
        }
    }
}
