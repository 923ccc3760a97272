//! The unbounded large form.
//!
//! A large table keeps buckets, chain links and entry payloads in one
//! backing block of tagged slots. Capacity is always a power of two and new
//! entries always occupy the next free slot, so ascending slot order is
//! insertion order. Deletion wipes an entry's payload to the hole sentinel
//! without rewiring its chain; tombstones are reclaimed only by rehashing
//! into a fresh table.
//!
//! A table that has been rehashed away from (grown, compacted or cleared)
//! becomes *obsolete*: it records the successor in its next-table link and,
//! for a rehash, the slot indices it dropped. Iterators holding the old
//! table use both to carry their position over, see
//! [`TableIter`](crate::TableIter).
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use otable_heap::{Host, TaggedValue};

use crate::error::Error;
use crate::layout::{LargeLayout, NOT_FOUND};
use crate::runtime::Runtime;
use crate::shape::{DictShape, MapShape, PropertyDetails, SetShape, Shape, NO_HASH_SENTINEL};

/// Smallest capacity of a non-empty large table.
pub const INITIAL_CAPACITY: usize = 4;

/// Hard capacity limit of the large form.
pub const MAX_CAPACITY: usize = 1 << 30;

/// Deleted-count stamp of a cleared table, telling migrating iterators to
/// restart at slot 0 of the successor.
pub const CLEARED_TABLE_SENTINEL: u32 = u32::MAX;

/// Flag for [`convert_to_keys_array`](LargeTable::convert_to_keys_array):
/// what to do with keys that are numeric array indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeysConversion {
    /// Keep numeric keys as numbers.
    KeepNumbers,
    /// Convert numeric keys to their name form, bypassing the host's
    /// number-to-name cache beyond its threshold.
    ConvertToString,
    /// Assert that no key is a numeric array index.
    NoNumbers,
}

/// Insertion-ordered hash table, large form. See the module docs.
pub struct LargeTable<H: Host, S: Shape> {
    storage: RefCell<Box<[H::Value]>>,
    capacity: usize,
    layout: LargeLayout,
    nof: Cell<u32>,
    nod: Cell<u32>,
    object_hash: Cell<u32>,
    next_table: RefCell<Option<Rc<LargeTable<H, S>>>>,
    removed_indices: RefCell<Vec<u32>>,
    _shape: PhantomData<S>,
}

impl<H: Host, S: Shape> std::fmt::Debug for LargeTable<H, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeTable")
            .field("storage", &self.storage)
            .field("capacity", &self.capacity)
            .field("layout", &self.layout)
            .field("nof", &self.nof)
            .field("nod", &self.nod)
            .field("object_hash", &self.object_hash)
            .field("next_table", &self.next_table)
            .field("removed_indices", &self.removed_indices)
            .finish()
    }
}

impl<H: Host, S: Shape> LargeTable<H, S> {
    /// Allocates a table with room for at least `capacity` entries.
    ///
    /// The capacity is rounded up to a power of two no smaller than
    /// [`INITIAL_CAPACITY`]; a request beyond [`MAX_CAPACITY`] fails with
    /// [`Error::CapacityExceeded`].
    pub fn allocate(rt: &Runtime<H>, capacity: usize) -> Result<Rc<Self>, Error> {
        let capacity = capacity.max(INITIAL_CAPACITY).next_power_of_two();
        if capacity > MAX_CAPACITY {
            return Err(Error::CapacityExceeded);
        }
        let layout = LargeLayout::for_capacity(capacity, S::PAYLOAD);
        let mut storage = rt
            .host()
            .allocate_slots(layout.storage_len(capacity), H::Value::hole())?;
        for bucket in 0..layout.num_buckets() {
            storage[layout.bucket(bucket)] = H::Value::from_smi(NOT_FOUND);
        }
        Ok(Rc::new(LargeTable {
            storage: RefCell::new(storage),
            capacity,
            layout,
            nof: Cell::new(0),
            nod: Cell::new(0),
            object_hash: Cell::new(NO_HASH_SENTINEL),
            next_table: RefCell::new(None),
            removed_indices: RefCell::new(Vec::new()),
            _shape: PhantomData,
        }))
    }

    /// Builds the canonical empty table: zero buckets, zero capacity,
    /// immutable. Only [`Roots`](crate::Roots) calls this.
    pub(crate) fn canonical_empty() -> Self {
        LargeTable {
            storage: RefCell::new(Vec::new().into_boxed_slice()),
            capacity: 0,
            layout: LargeLayout::for_capacity(0, S::PAYLOAD),
            nof: Cell::new(0),
            nod: Cell::new(0),
            object_hash: Cell::new(NO_HASH_SENTINEL),
            next_table: RefCell::new(None),
            removed_indices: RefCell::new(Vec::new()),
            _shape: PhantomData,
        }
    }

    /// Number of entry slots in the data region.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buckets; always `capacity / 2`.
    pub fn number_of_buckets(&self) -> usize {
        self.layout.num_buckets()
    }

    /// Number of live entries.
    pub fn number_of_elements(&self) -> usize {
        self.nof.get() as usize
    }

    /// Number of tombstoned entries, or [`CLEARED_TABLE_SENTINEL`] if this
    /// table was obsoleted by a clear.
    pub fn number_of_deleted_elements(&self) -> u32 {
        self.nod.get()
    }

    /// The next free slot index: live entries plus tombstones.
    pub fn used_capacity(&self) -> usize {
        debug_assert_ne!(self.nod.get(), CLEARED_TABLE_SENTINEL);
        (self.nof.get() + self.nod.get()) as usize
    }

    /// Returns `true` once this table has been superseded.
    pub fn is_obsolete(&self) -> bool {
        self.next_table.borrow().is_some()
    }

    /// The successor of an obsolete table.
    pub fn next_table(&self) -> Option<Rc<Self>> {
        self.next_table.borrow().clone()
    }

    pub(crate) fn removed_index_at(&self, index: usize) -> Option<usize> {
        self.removed_indices
            .borrow()
            .get(index)
            .map(|&removed| removed as usize)
    }

    /// The key stored at `entry`; the hole sentinel for tombstones.
    pub fn key_at(&self, entry: usize) -> H::Value {
        debug_assert!(entry < self.used_capacity());
        self.storage.borrow()[self.layout.payload(entry, 0)]
    }

    fn cell_as_entry(cell: H::Value) -> i32 {
        cell.to_smi().expect("bucket and chain cells hold small integers")
    }

    /// Finds the entry holding `key`, walking the bucket chain with this
    /// shape's key equality. A key without an identity hash is not found.
    pub fn find_entry(&self, rt: &Runtime<H>, key: H::Value) -> Option<usize> {
        // Not just a fast path: the canonical empty table has no buckets to
        // hash into.
        if self.nof.get() == 0 {
            return None;
        }
        let hash = rt.host().hash(key)?;
        self.find_with_hash(rt, hash, key)
    }

    fn find_with_hash(&self, rt: &Runtime<H>, hash: u32, key: H::Value) -> Option<usize> {
        let _no_alloc = rt.host().no_alloc();
        let storage = self.storage.borrow();
        let mut raw = Self::cell_as_entry(storage[self.layout.bucket(self.layout.hash_to_bucket(hash))]);
        while raw != NOT_FOUND {
            let entry = raw as usize;
            let candidate = storage[self.layout.payload(entry, 0)];
            if S::keys_equal(candidate, key) {
                return Some(entry);
            }
            raw = Self::cell_as_entry(storage[self.layout.chain(entry)]);
        }
        None
    }

    /// Returns `true` if `key` is present.
    pub fn has_key(&self, rt: &Runtime<H>, key: H::Value) -> bool {
        self.find_entry(rt, key).is_some()
    }

    /// Tombstones `key` if present. The entry's payload is wiped to the hole
    /// sentinel; its chain link stays so later chain members remain
    /// reachable.
    pub fn delete(&self, rt: &Runtime<H>, key: H::Value) -> bool {
        debug_assert!(!self.is_obsolete());
        let Some(entry) = self.find_entry(rt, key) else {
            return false;
        };
        {
            let _no_alloc = rt.host().no_alloc();
            let mut storage = self.storage.borrow_mut();
            for slot in 0..S::PAYLOAD {
                storage[self.layout.payload(entry, slot)] = H::Value::hole();
            }
        }
        self.nof.set(self.nof.get() - 1);
        self.nod.set(self.nod.get() + 1);
        true
    }

    /// Returns `table` if it still has a free slot, or its rehashed
    /// successor: same capacity when half the slots are tombstones (pure
    /// compaction), doubled otherwise.
    pub fn ensure_capacity_for_adding(
        rt: &Runtime<H>,
        table: &Rc<Self>,
    ) -> Result<Rc<Self>, Error> {
        debug_assert!(!table.is_obsolete());
        let nof = table.number_of_elements();
        let nod = table.number_of_deleted_elements() as usize;
        let capacity = table.capacity();
        if nof + nod < capacity {
            return Ok(table.clone());
        }
        let new_capacity = if capacity == 0 {
            // step from empty to minimum proper size
            INITIAL_CAPACITY
        } else if nod >= capacity / 2 {
            // No need to grow if clearing out the tombstones is enough, but
            // compaction cannot happen in place: chains still run through
            // the tombstoned slots.
            capacity
        } else {
            capacity * 2
        };
        Self::rehash_to(rt, table, new_capacity)
    }

    /// Rehashes to half capacity once live entries drop below a quarter of
    /// it; otherwise returns `table` unchanged.
    pub fn shrink(rt: &Runtime<H>, table: &Rc<Self>) -> Result<Rc<Self>, Error> {
        debug_assert!(!table.is_obsolete());
        let nof = table.number_of_elements();
        if nof >= table.capacity() / 4 {
            return Ok(table.clone());
        }
        Self::rehash_to(rt, table, table.capacity() / 2)
    }

    /// Replaces `table` with a fresh minimum-capacity successor.
    ///
    /// The old table is stamped with [`CLEARED_TABLE_SENTINEL`] and linked
    /// to the successor so iterators restart from slot 0. The canonical
    /// empty table is never stamped or linked.
    pub fn clear(rt: &Runtime<H>, table: &Rc<Self>) -> Result<Rc<Self>, Error> {
        debug_assert!(!table.is_obsolete());
        let new_table = Self::allocate(rt, INITIAL_CAPACITY)?;
        if table.number_of_buckets() > 0 {
            *table.next_table.borrow_mut() = Some(new_table.clone());
            table.nod.set(CLEARED_TABLE_SENTINEL);
            log::debug!(
                "cleared table of capacity {}, successor at capacity {}",
                table.capacity(),
                new_table.capacity()
            );
        }
        Ok(new_table)
    }

    /// Rehashes at the current capacity, compacting tombstones away.
    pub fn rehash(rt: &Runtime<H>, table: &Rc<Self>) -> Result<Rc<Self>, Error> {
        Self::rehash_to(rt, table, table.capacity())
    }

    /// Rehashes into a fresh table of `new_capacity` slots, preserving
    /// insertion order and dropping tombstones.
    ///
    /// The source records every dropped slot index in its removed-indices
    /// log and is linked to the successor. Both happen only after the new
    /// table has been allocated, so a failed allocation leaves the source
    /// fully usable.
    pub fn rehash_to(
        rt: &Runtime<H>,
        table: &Rc<Self>,
        new_capacity: usize,
    ) -> Result<Rc<Self>, Error> {
        debug_assert!(!table.is_obsolete());
        let new_table = Self::allocate(rt, new_capacity)?;
        {
            let _no_alloc = rt.host().no_alloc();
            let old_storage = table.storage.borrow();
            let mut new_storage = new_table.storage.borrow_mut();
            let mut removed = table.removed_indices.borrow_mut();
            debug_assert!(removed.is_empty());
            let mut new_entry = 0usize;
            for old_entry in 0..table.used_capacity() {
                let key = old_storage[table.layout.payload(old_entry, 0)];
                if key.is_hole() {
                    removed.push(old_entry as u32);
                    continue;
                }
                let hash = rt.host().hash(key).expect("stored key has an identity hash");
                let bucket = new_table.layout.bucket(new_table.layout.hash_to_bucket(hash));
                let chain = new_storage[bucket];
                new_storage[bucket] = H::Value::from_smi(new_entry as i32);
                for slot in 0..S::PAYLOAD {
                    new_storage[new_table.layout.payload(new_entry, slot)] =
                        old_storage[table.layout.payload(old_entry, slot)];
                }
                new_storage[new_table.layout.chain(new_entry)] = chain;
                new_entry += 1;
            }
            debug_assert_eq!(removed.len(), table.nod.get() as usize);
            new_table.nof.set(table.nof.get());
            new_table.object_hash.set(table.object_hash.get());
        }
        if table.number_of_buckets() > 0 {
            // The canonical empty table is never marked obsolete.
            *table.next_table.borrow_mut() = Some(new_table.clone());
        }
        log::debug!(
            "rehashed table: capacity {} -> {}, {} live entries, {} tombstones dropped",
            table.capacity(),
            new_table.capacity(),
            new_table.number_of_elements(),
            table.removed_indices.borrow().len()
        );
        Ok(new_table)
    }

    fn insert(&self, rt: &Runtime<H>, hash: u32, payload: &[H::Value]) {
        debug_assert_eq!(payload.len(), S::PAYLOAD);
        debug_assert!(self.used_capacity() < self.capacity);
        let _no_alloc = rt.host().no_alloc();
        let mut storage = self.storage.borrow_mut();
        let bucket = self.layout.bucket(self.layout.hash_to_bucket(hash));
        let previous = storage[bucket];
        let new_entry = self.used_capacity();
        for (slot, &value) in payload.iter().enumerate() {
            storage[self.layout.payload(new_entry, slot)] = value;
        }
        // Chain the new entry in front of the bucket's old head.
        storage[self.layout.chain(new_entry)] = previous;
        storage[bucket] = H::Value::from_smi(new_entry as i32);
        self.nof.set(self.nof.get() + 1);
    }

    /// Slot indices of all live entries, in insertion order.
    pub fn live_entries(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.used_capacity()).filter(move |&entry| !self.key_at(entry).is_hole())
    }
}

impl<H: Host> LargeTable<H, SetShape> {
    /// Adds `key` unless an equal key is present; either way the returned
    /// table is the current one (possibly a rehashed successor).
    pub fn add(rt: &Runtime<H>, table: &Rc<Self>, key: H::Value) -> Result<Rc<Self>, Error> {
        let hash = rt.host().hash_or_create(key);
        if table.nof.get() > 0 && table.find_with_hash(rt, hash, key).is_some() {
            return Ok(table.clone());
        }
        let table = Self::ensure_capacity_for_adding(rt, table)?;
        table.insert(rt, hash, &[key]);
        Ok(table)
    }

    /// Converts the table's data region into a plain key array in insertion
    /// order, consuming the table and reusing its backing allocation.
    ///
    /// Numeric array-index keys are kept, stringified or asserted absent per
    /// `convert`; stringification bypasses the host's number-to-name cache
    /// beyond the host's threshold. The caller must hold the only reference
    /// to a non-empty table, as the table is destroyed in the process.
    pub fn convert_to_keys_array(
        rt: &Runtime<H>,
        table: Rc<Self>,
        convert: KeysConversion,
    ) -> Vec<H::Value> {
        if table.capacity() == 0 {
            return Vec::new();
        }
        let table = match Rc::try_unwrap(table) {
            Ok(table) => table,
            Err(_) => panic!("converting a shared table to a keys array"),
        };
        let layout = table.layout;
        let used = table.used_capacity();
        let mut slots: Vec<H::Value> = table.storage.into_inner().into_vec();
        let mut out = 0usize;
        for entry in 0..used {
            let mut key = slots[layout.payload(entry, 0)];
            if key.is_hole() {
                continue;
            }
            match convert {
                KeysConversion::KeepNumbers => {}
                KeysConversion::ConvertToString => {
                    if let Some(index) = key.as_array_index() {
                        // Avoid trashing the host's cache if indices get
                        // very numerous.
                        let use_cache = out < rt.host().number_name_cache_limit();
                        key = rt.host().index_to_name(index, use_cache);
                    }
                }
                KeysConversion::NoNumbers => {
                    debug_assert!(key.as_array_index().is_none(), "unexpected numeric key");
                }
            }
            slots[out] = key;
            out += 1;
        }
        slots.truncate(out);
        slots
    }
}

impl<H: Host> LargeTable<H, MapShape> {
    /// Adds a `(key, value)` entry unless an equal key is present. A present
    /// key keeps its old value; use [`set_entry`](Self::set_entry) to
    /// overwrite in place.
    pub fn add(
        rt: &Runtime<H>,
        table: &Rc<Self>,
        key: H::Value,
        value: H::Value,
    ) -> Result<Rc<Self>, Error> {
        let hash = rt.host().hash_or_create(key);
        if table.nof.get() > 0 && table.find_with_hash(rt, hash, key).is_some() {
            return Ok(table.clone());
        }
        let table = Self::ensure_capacity_for_adding(rt, table)?;
        table.insert(rt, hash, &[key, value]);
        Ok(table)
    }

    /// The value stored at `entry`.
    pub fn value_at(&self, entry: usize) -> H::Value {
        debug_assert!(entry < self.used_capacity());
        self.storage.borrow()[self.layout.payload(entry, 1)]
    }

    /// Overwrites `entry` in place; the entry keeps its slot and therefore
    /// its position in insertion order.
    pub fn set_entry(&self, entry: usize, key: H::Value, value: H::Value) {
        debug_assert!(entry < self.used_capacity());
        let mut storage = self.storage.borrow_mut();
        storage[self.layout.payload(entry, 0)] = key;
        storage[self.layout.payload(entry, 1)] = value;
    }
}

impl<H: Host> LargeTable<H, DictShape> {
    /// Adds a `(key, value, details)` entry. The key must be absent: the
    /// dictionary's callers check first, and a duplicate add is a contract
    /// violation.
    pub fn add(
        rt: &Runtime<H>,
        table: &Rc<Self>,
        key: H::Value,
        value: H::Value,
        details: PropertyDetails,
    ) -> Result<Rc<Self>, Error> {
        debug_assert!(
            table.find_entry(rt, key).is_none(),
            "duplicate dictionary key"
        );
        let hash = rt.host().hash_or_create(key);
        let table = Self::ensure_capacity_for_adding(rt, table)?;
        table.insert(rt, hash, &[key, value, details.to_value()]);
        Ok(table)
    }

    /// The value stored at `entry`.
    pub fn value_at(&self, entry: usize) -> H::Value {
        debug_assert!(entry < self.used_capacity());
        self.storage.borrow()[self.layout.payload(entry, 1)]
    }

    /// Overwrites the value at `entry` in place.
    pub fn value_at_put(&self, entry: usize, value: H::Value) {
        debug_assert!(entry < self.used_capacity());
        self.storage.borrow_mut()[self.layout.payload(entry, 1)] = value;
    }

    /// The property details stored at `entry`.
    pub fn details_at(&self, entry: usize) -> PropertyDetails {
        debug_assert!(entry < self.used_capacity());
        PropertyDetails::from_value(self.storage.borrow()[self.layout.payload(entry, 2)])
    }

    /// Overwrites the property details at `entry` in place.
    pub fn details_at_put(&self, entry: usize, details: PropertyDetails) {
        debug_assert!(entry < self.used_capacity());
        self.storage.borrow_mut()[self.layout.payload(entry, 2)] = details.to_value();
    }

    /// Overwrites `entry` in place.
    pub fn set_entry(
        &self,
        entry: usize,
        key: H::Value,
        value: H::Value,
        details: PropertyDetails,
    ) {
        debug_assert!(entry < self.used_capacity());
        {
            let mut storage = self.storage.borrow_mut();
            storage[self.layout.payload(entry, 0)] = key;
            storage[self.layout.payload(entry, 1)] = value;
        }
        self.details_at_put(entry, details);
    }

    /// Tombstones `entry`, wiping key, value and details, then shrinks the
    /// table if live entries dropped below a quarter of its capacity.
    pub fn delete_entry(
        rt: &Runtime<H>,
        table: &Rc<Self>,
        entry: usize,
    ) -> Result<Rc<Self>, Error> {
        table.set_entry(entry, H::Value::hole(), H::Value::hole(), PropertyDetails::EMPTY);
        table.nof.set(table.nof.get() - 1);
        table.nod.set(table.nod.get() + 1);
        Self::shrink(rt, table)
    }

    /// The identity hash of the object owning this dictionary.
    pub fn hash(&self) -> u32 {
        self.object_hash.get()
    }

    /// Stores the identity hash of the owning object; it survives rehashes.
    pub fn set_hash(&self, hash: u32) {
        debug_assert!(self.number_of_buckets() > 0 || hash == NO_HASH_SENTINEL);
        self.object_hash.set(hash);
    }
}
