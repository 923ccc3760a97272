#![cfg(test)]
#![allow(missing_docs)]
use std::rc::Rc;

use otable_heap::{Heap, Value};

use crate::large::CLEARED_TABLE_SENTINEL;
use crate::shape::SetShape;
use crate::{LargeTable, Runtime, TableIter};

fn runtime() -> Runtime<Heap> {
    Runtime::new(Heap::new())
}

fn set_of(rt: &Runtime<Heap>, values: impl IntoIterator<Item = i32>) -> Rc<LargeTable<Heap, SetShape>> {
    let mut table = LargeTable::allocate(rt, 4).unwrap();
    for value in values {
        table = LargeTable::<Heap, SetShape>::add(rt, &table, Value::Smi(value)).unwrap();
    }
    table
}

fn drain(iter: &mut TableIter<Heap, SetShape>, rt: &Runtime<Heap>) -> Vec<Value> {
    iter.keys(rt).collect()
}

#[test]
fn iterator_survives_growth() {
    let rt = runtime();
    let mut table = set_of(&rt, 1..=4);
    let mut iter = TableIter::new(table.clone());
    assert_eq!(iter.next_key(&rt), Some(Value::Smi(1)));

    for value in 5..=9 {
        table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(value)).unwrap();
    }
    assert_eq!(table.capacity(), 16);
    assert_eq!(
        drain(&mut iter, &rt),
        (2..=9).map(Value::Smi).collect::<Vec<_>>()
    );
}

#[test]
fn iterator_restarts_on_cleared_successor() {
    let rt = runtime();
    let table = set_of(&rt, 1..=5);
    let mut iter = TableIter::new(table.clone());
    assert_eq!(iter.next_key(&rt), Some(Value::Smi(1)));
    assert_eq!(iter.next_key(&rt), Some(Value::Smi(2)));

    let cleared = LargeTable::clear(&rt, &table).unwrap();
    assert_eq!(table.number_of_deleted_elements(), CLEARED_TABLE_SENTINEL);
    assert_eq!(drain(&mut iter, &rt), vec![]);
    // The iterator parked on the canonical empty table, not the successor.
    assert!(Rc::ptr_eq(iter.table(), rt.roots().empty_set()));
    assert_eq!(cleared.number_of_elements(), 0);
}

#[test]
fn cursor_is_remapped_across_compaction() {
    let rt = runtime();
    let table = set_of(&rt, 1..=4);
    let mut iter = TableIter::new(table.clone());
    assert_eq!(iter.next_key(&rt), Some(Value::Smi(1)));
    assert_eq!(iter.next_key(&rt), Some(Value::Smi(2)));

    // Drop two entries behind the cursor, then force a same-capacity
    // compaction; the cursor index must shift down by the removed slots.
    table.delete(&rt, Value::Smi(1));
    table.delete(&rt, Value::Smi(2));
    let table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(5)).unwrap();
    assert_eq!(table.capacity(), 4);
    assert_eq!(drain(&mut iter, &rt), vec![Value::Smi(3), Value::Smi(4), Value::Smi(5)]);
}

#[test]
fn deletion_ahead_of_the_cursor_is_skipped() {
    let rt = runtime();
    let table = set_of(&rt, 1..=4);
    let mut iter = TableIter::new(table.clone());
    assert_eq!(iter.next_key(&rt), Some(Value::Smi(1)));

    table.delete(&rt, Value::Smi(3));
    assert_eq!(drain(&mut iter, &rt), vec![Value::Smi(2), Value::Smi(4)]);
}

#[test]
fn re_added_key_is_visited_at_its_new_position() {
    let rt = runtime();
    let mut table = set_of(&rt, 1..=3);
    let mut iter = TableIter::new(table.clone());
    assert_eq!(iter.next_key(&rt), Some(Value::Smi(1)));

    table.delete(&rt, Value::Smi(2));
    table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(2)).unwrap();
    assert_eq!(drain(&mut iter, &rt), vec![Value::Smi(3), Value::Smi(2)]);
}

#[test]
fn cursor_survives_a_chain_of_rehashes() {
    let rt = runtime();
    let mut table = set_of(&rt, 0..4);
    let mut iter = TableIter::new(table.clone());
    for expected in 0..3 {
        assert_eq!(iter.next_key(&rt), Some(Value::Smi(expected)));
    }

    // First hop: compaction with two slots removed below the cursor.
    table.delete(&rt, Value::Smi(0));
    table.delete(&rt, Value::Smi(1));
    table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(4)).unwrap();
    // Second hop: growth, no removals.
    table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(5)).unwrap();
    for value in 6..=8 {
        table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(value)).unwrap();
    }
    assert_eq!(
        drain(&mut iter, &rt),
        (3..=8).map(Value::Smi).collect::<Vec<_>>()
    );
}

#[test]
fn exhausted_iterator_releases_its_table() {
    let rt = runtime();
    let table = set_of(&rt, 1..=2);
    let mut iter = TableIter::new(table.clone());
    assert_eq!(drain(&mut iter, &rt), vec![Value::Smi(1), Value::Smi(2)]);
    assert!(Rc::ptr_eq(iter.table(), rt.roots().empty_set()));
    // Only the local binding still references the drained table.
    assert_eq!(Rc::strong_count(&table), 1);
}

#[test]
fn iterator_on_failed_rehash_source_stays_valid() {
    let rt = runtime();
    let mut table = set_of(&rt, 0..4);
    let mut iter = TableIter::new(table.clone());
    assert_eq!(iter.next_key(&rt), Some(Value::Smi(0)));

    rt.host().set_slot_limit(Some(rt.host().slots_allocated()));
    assert!(LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(9)).is_err());
    assert!(!table.is_obsolete());

    rt.host().set_slot_limit(None);
    table = LargeTable::<Heap, SetShape>::add(&rt, &table, Value::Smi(9)).unwrap();
    assert_eq!(
        drain(&mut iter, &rt),
        vec![Value::Smi(1), Value::Smi(2), Value::Smi(3), Value::Smi(9)]
    );
    assert_eq!(table.number_of_elements(), 5);
}

#[test]
fn map_iterator_yields_entries() {
    use crate::shape::MapShape;
    let rt = runtime();
    let mut table: Rc<LargeTable<Heap, MapShape>> = LargeTable::allocate(&rt, 4).unwrap();
    for value in 0..6 {
        table = LargeTable::<Heap, MapShape>::add(&rt, &table, Value::Smi(value), Value::Smi(value * 2)).unwrap();
    }
    let mut iter = TableIter::new(table);
    let mut seen = vec![];
    while let Some(entry) = iter.next_entry(&rt) {
        seen.push(entry);
    }
    assert_eq!(
        seen,
        (0..6)
            .map(|v| (Value::Smi(v), Value::Smi(v * 2)))
            .collect::<Vec<_>>()
    );
}
