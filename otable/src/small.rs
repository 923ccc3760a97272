//! The bounded small form.
//!
//! The small form packs buckets and chain links into single bytes, which
//! caps its capacity at 254 entries (`0xFF` is the chain terminator). It is
//! the initial representation of every container; once it can no longer
//! grow, the handler facade promotes to the large form, never back.
//!
//! Unlike the large form, a small table is never shared with iterators, so
//! growth and compaction replace the table in place and there is no
//! obsolete-table chain.
use std::marker::PhantomData;

use otable_heap::{AllocError, Host, TaggedValue};

use crate::error::Error;
use crate::layout::{SmallLayout, SMALL_NOT_FOUND};
use crate::runtime::Runtime;
use crate::shape::{DictShape, MapShape, PropertyDetails, SetShape, Shape, NO_HASH_SENTINEL};

/// Hard capacity limit of the small form, leaving `0xFF` free as the chain
/// terminator.
pub const MAX_CAPACITY: usize = 254;

/// Smallest capacity of a small table.
pub const MIN_CAPACITY: usize = 4;

/// Doubling from 128 would overshoot the byte-cell limit; this boundary
/// capacity maps to [`MAX_CAPACITY`] instead, so tables fill all 254 slots
/// rather than stopping at 128.
const GROWTH_HACK: usize = 256;

/// Why a small-form add did not complete.
pub(crate) enum SmallAddError {
    /// The table is at the byte-cell capacity limit; the caller promotes to
    /// the large form.
    Full,
    /// The host failed to provide a backing buffer.
    Alloc(AllocError),
}

/// Insertion-ordered hash table, small form. See the module docs.
pub struct SmallTable<H: Host, S: Shape> {
    /// Bucket bytes followed by chain bytes; `0xFF` terminates.
    ctrl: Box<[u8]>,
    /// Payload slots, `S::PAYLOAD` per entry.
    data: Box<[H::Value]>,
    layout: SmallLayout,
    nof: u8,
    nod: u8,
    object_hash: u32,
    _shape: PhantomData<S>,
}

impl<H: Host, S: Shape> SmallTable<H, S> {
    /// Allocates a table with room for at least `capacity` entries.
    ///
    /// The capacity is rounded up to a power of two no smaller than
    /// [`MIN_CAPACITY`], except that 256 becomes [`MAX_CAPACITY`]; anything
    /// larger fails with [`Error::CapacityExceeded`] and the caller uses the
    /// large form instead.
    pub fn allocate(rt: &Runtime<H>, capacity: usize) -> Result<Self, Error> {
        let mut capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        if capacity == GROWTH_HACK {
            capacity = MAX_CAPACITY;
        }
        if capacity > MAX_CAPACITY {
            return Err(Error::CapacityExceeded);
        }
        Self::with_capacity(rt, capacity).map_err(Error::from)
    }

    fn with_capacity(rt: &Runtime<H>, capacity: usize) -> Result<Self, AllocError> {
        debug_assert!(capacity <= MAX_CAPACITY);
        let layout = SmallLayout::for_capacity(capacity, S::PAYLOAD);
        let data = rt.host().allocate_slots(layout.data_len(), H::Value::hole())?;
        Ok(SmallTable {
            ctrl: vec![SMALL_NOT_FOUND; layout.ctrl_len()].into_boxed_slice(),
            data,
            layout,
            nof: 0,
            nod: 0,
            object_hash: NO_HASH_SENTINEL,
            _shape: PhantomData,
        })
    }

    /// Number of entry slots in the data region.
    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    /// Number of buckets; always `capacity / 2`.
    pub fn number_of_buckets(&self) -> usize {
        self.layout.num_buckets()
    }

    /// Number of live entries.
    pub fn number_of_elements(&self) -> usize {
        self.nof as usize
    }

    /// Number of tombstoned entries.
    pub fn number_of_deleted_elements(&self) -> usize {
        self.nod as usize
    }

    /// The next free slot index: live entries plus tombstones.
    pub fn used_capacity(&self) -> usize {
        self.nof as usize + self.nod as usize
    }

    /// The key stored at `entry`; the hole sentinel for tombstones.
    pub fn key_at(&self, entry: usize) -> H::Value {
        debug_assert!(entry < self.used_capacity());
        self.data[self.layout.payload(entry, 0)]
    }

    /// Finds the entry holding `key`, walking the bucket chain with this
    /// shape's key equality. A key without an identity hash is not found.
    pub fn find_entry(&self, rt: &Runtime<H>, key: H::Value) -> Option<usize> {
        let hash = rt.host().hash(key)?;
        let _no_alloc = rt.host().no_alloc();
        let mut raw = self.ctrl[self.layout.bucket(self.layout.hash_to_bucket(hash))];
        while raw != SMALL_NOT_FOUND {
            let entry = raw as usize;
            let candidate = self.data[self.layout.payload(entry, 0)];
            if S::keys_equal(candidate, key) {
                return Some(entry);
            }
            raw = self.ctrl[self.layout.chain(entry)];
        }
        None
    }

    /// Returns `true` if `key` is present.
    pub fn has_key(&self, rt: &Runtime<H>, key: H::Value) -> bool {
        self.find_entry(rt, key).is_some()
    }

    /// Tombstones `key` if present, wiping its payload to the hole sentinel.
    /// Chain links are never rewired.
    pub fn delete(&mut self, rt: &Runtime<H>, key: H::Value) -> bool {
        let Some(entry) = self.find_entry(rt, key) else {
            return false;
        };
        for slot in 0..S::PAYLOAD {
            self.data[self.layout.payload(entry, slot)] = H::Value::hole();
        }
        self.nof -= 1;
        self.nod += 1;
        true
    }

    fn insert(
        &mut self,
        rt: &Runtime<H>,
        hash: u32,
        payload: &[H::Value],
    ) -> Result<(), SmallAddError> {
        debug_assert_eq!(payload.len(), S::PAYLOAD);
        if self.used_capacity() == self.capacity() {
            self.grow(rt)?;
        }
        let _no_alloc = rt.host().no_alloc();
        let bucket = self.layout.bucket(self.layout.hash_to_bucket(hash));
        let new_entry = self.used_capacity();
        for (slot, &value) in payload.iter().enumerate() {
            self.data[self.layout.payload(new_entry, slot)] = value;
        }
        // Chain the new entry in front of the bucket's old head.
        self.ctrl[self.layout.chain(new_entry)] = self.ctrl[bucket];
        self.ctrl[bucket] = new_entry as u8;
        self.nof += 1;
        Ok(())
    }

    fn grow(&mut self, rt: &Runtime<H>) -> Result<(), SmallAddError> {
        let capacity = self.capacity();
        let mut new_capacity = capacity;
        if (self.nod as usize) < capacity / 2 {
            new_capacity = capacity * 2;
            if new_capacity == GROWTH_HACK {
                new_capacity = MAX_CAPACITY;
            }
            if new_capacity > MAX_CAPACITY {
                // The byte cells are exhausted; the handler facade migrates
                // to the large form.
                return Err(SmallAddError::Full);
            }
        }
        // Otherwise half the slots are tombstones and rehashing at the same
        // capacity clears them out.
        self.rehash(rt, new_capacity).map_err(SmallAddError::Alloc)
    }

    /// Rehashes into a fresh table of exactly `new_capacity` slots,
    /// preserving insertion order and dropping tombstones, then replaces
    /// `self` with it.
    fn rehash(&mut self, rt: &Runtime<H>, new_capacity: usize) -> Result<(), AllocError> {
        debug_assert!(new_capacity >= self.number_of_elements());
        let mut new_table = Self::with_capacity(rt, new_capacity)?;
        {
            let _no_alloc = rt.host().no_alloc();
            let mut new_entry = 0usize;
            for old_entry in 0..self.used_capacity() {
                let key = self.data[self.layout.payload(old_entry, 0)];
                if key.is_hole() {
                    continue;
                }
                let hash = rt.host().hash(key).expect("stored key has an identity hash");
                let bucket = new_table.layout.bucket(new_table.layout.hash_to_bucket(hash));
                for slot in 0..S::PAYLOAD {
                    new_table.data[new_table.layout.payload(new_entry, slot)] =
                        self.data[self.layout.payload(old_entry, slot)];
                }
                new_table.ctrl[new_table.layout.chain(new_entry)] = new_table.ctrl[bucket];
                new_table.ctrl[bucket] = new_entry as u8;
                new_entry += 1;
            }
            new_table.nof = new_entry as u8;
            new_table.object_hash = self.object_hash;
        }
        *self = new_table;
        Ok(())
    }

    /// Rehashes to half capacity once live entries drop below a quarter of
    /// it; otherwise does nothing.
    pub fn shrink(&mut self, rt: &Runtime<H>) -> Result<(), Error> {
        if self.number_of_elements() >= self.capacity() / 4 {
            return Ok(());
        }
        let new_capacity = self.capacity() / 2;
        self.rehash(rt, new_capacity).map_err(Error::from)
    }

    /// Slot indices of all live entries, in insertion order.
    pub fn live_entries(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.used_capacity()).filter(move |&entry| !self.key_at(entry).is_hole())
    }
}

impl<H: Host> SmallTable<H, SetShape> {
    /// Adds `key` unless an equal key is present. `Ok(true)` means the key
    /// was inserted; [`SmallAddError::Full`] means the caller has to promote
    /// to the large form.
    pub(crate) fn add(&mut self, rt: &Runtime<H>, key: H::Value) -> Result<bool, SmallAddError> {
        if self.find_entry(rt, key).is_some() {
            return Ok(false);
        }
        let hash = rt.host().hash_or_create(key);
        self.insert(rt, hash, &[key])?;
        Ok(true)
    }
}

impl<H: Host> SmallTable<H, MapShape> {
    /// Adds a `(key, value)` entry unless an equal key is present; a present
    /// key keeps its old value.
    pub(crate) fn add(
        &mut self,
        rt: &Runtime<H>,
        key: H::Value,
        value: H::Value,
    ) -> Result<bool, SmallAddError> {
        if self.find_entry(rt, key).is_some() {
            return Ok(false);
        }
        let hash = rt.host().hash_or_create(key);
        self.insert(rt, hash, &[key, value])?;
        Ok(true)
    }

    /// The value stored at `entry`.
    pub fn value_at(&self, entry: usize) -> H::Value {
        debug_assert!(entry < self.used_capacity());
        self.data[self.layout.payload(entry, 1)]
    }

    /// Overwrites `entry` in place; the entry keeps its slot and therefore
    /// its position in insertion order.
    pub fn set_entry(&mut self, entry: usize, key: H::Value, value: H::Value) {
        debug_assert!(entry < self.used_capacity());
        self.data[self.layout.payload(entry, 0)] = key;
        self.data[self.layout.payload(entry, 1)] = value;
    }
}

impl<H: Host> SmallTable<H, DictShape> {
    /// Adds a `(key, value, details)` entry. The key must be absent; a
    /// duplicate add is a contract violation.
    pub(crate) fn add(
        &mut self,
        rt: &Runtime<H>,
        key: H::Value,
        value: H::Value,
        details: PropertyDetails,
    ) -> Result<(), SmallAddError> {
        debug_assert!(self.find_entry(rt, key).is_none(), "duplicate dictionary key");
        let hash = rt.host().hash_or_create(key);
        self.insert(rt, hash, &[key, value, details.to_value()])
    }

    /// The value stored at `entry`.
    pub fn value_at(&self, entry: usize) -> H::Value {
        debug_assert!(entry < self.used_capacity());
        self.data[self.layout.payload(entry, 1)]
    }

    /// Overwrites the value at `entry` in place.
    pub fn value_at_put(&mut self, entry: usize, value: H::Value) {
        debug_assert!(entry < self.used_capacity());
        self.data[self.layout.payload(entry, 1)] = value;
    }

    /// The property details stored at `entry`.
    pub fn details_at(&self, entry: usize) -> PropertyDetails {
        debug_assert!(entry < self.used_capacity());
        PropertyDetails::from_value(self.data[self.layout.payload(entry, 2)])
    }

    /// Overwrites the property details at `entry` in place.
    pub fn details_at_put(&mut self, entry: usize, details: PropertyDetails) {
        debug_assert!(entry < self.used_capacity());
        self.data[self.layout.payload(entry, 2)] = details.to_value();
    }

    /// Overwrites `entry` in place.
    pub fn set_entry(
        &mut self,
        entry: usize,
        key: H::Value,
        value: H::Value,
        details: PropertyDetails,
    ) {
        debug_assert!(entry < self.used_capacity());
        self.data[self.layout.payload(entry, 0)] = key;
        self.data[self.layout.payload(entry, 1)] = value;
        self.data[self.layout.payload(entry, 2)] = details.to_value();
    }

    /// Tombstones `entry`, wiping key, value and details, then shrinks the
    /// table if live entries dropped below a quarter of its capacity.
    pub fn delete_entry(&mut self, rt: &Runtime<H>, entry: usize) -> Result<(), Error> {
        self.set_entry(entry, H::Value::hole(), H::Value::hole(), PropertyDetails::EMPTY);
        self.nof -= 1;
        self.nod += 1;
        self.shrink(rt)
    }

    /// The identity hash of the object owning this dictionary.
    pub fn hash(&self) -> u32 {
        self.object_hash
    }

    /// Stores the identity hash of the owning object; it survives rehashes.
    pub fn set_hash(&mut self, hash: u32) {
        self.object_hash = hash;
    }
}
