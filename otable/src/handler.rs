//! Handler facades: one public container type per variant.
//!
//! A facade starts every container in the byte-celled small form and hides
//! the representation split: reads dispatch on the current form, writes go
//! to the small form until it can no longer grow, at which point the facade
//! rebuilds the contents into a fresh large table in insertion order.
//! Promotion is one-way; a large container never migrates back down.
use std::fmt;
use std::rc::Rc;

use otable_heap::{Host, TaggedValue};

use crate::error::Error;
use crate::large::{self, KeysConversion, LargeTable};
use crate::runtime::Runtime;
use crate::shape::{DictShape, MapShape, PropertyDetails, SetShape};
use crate::small::{self, SmallAddError, SmallTable};

/// Insertion-ordered set of values keyed by same-value-zero equality.
pub enum OrderedSet<H: Host> {
    /// Bounded byte-celled form.
    Small(SmallTable<H, SetShape>),
    /// Unbounded form.
    Large(Rc<LargeTable<H, SetShape>>),
}

impl<H: Host> OrderedSet<H> {
    /// Returns an empty set in the small form.
    pub fn new(rt: &Runtime<H>) -> Result<Self, Error> {
        Self::with_capacity(rt, small::MIN_CAPACITY)
    }

    /// Returns an empty set with room for `capacity` entries, choosing the
    /// form by whether the small form can ever hold that many.
    pub fn with_capacity(rt: &Runtime<H>, capacity: usize) -> Result<Self, Error> {
        if capacity < small::MAX_CAPACITY {
            Ok(OrderedSet::Small(SmallTable::allocate(rt, capacity)?))
        } else {
            Ok(OrderedSet::Large(LargeTable::allocate(rt, capacity)?))
        }
    }

    /// Returns `true` once the set has been promoted to the large form.
    pub fn is_large(&self) -> bool {
        matches!(self, OrderedSet::Large(_))
    }

    /// Number of live entries.
    pub fn number_of_elements(&self) -> usize {
        match self {
            OrderedSet::Small(table) => table.number_of_elements(),
            OrderedSet::Large(table) => table.number_of_elements(),
        }
    }

    /// Number of tombstoned entries.
    pub fn number_of_deleted_elements(&self) -> usize {
        match self {
            OrderedSet::Small(table) => table.number_of_deleted_elements(),
            OrderedSet::Large(table) => table.number_of_deleted_elements() as usize,
        }
    }

    /// Number of entry slots in the current backing table.
    pub fn capacity(&self) -> usize {
        match self {
            OrderedSet::Small(table) => table.capacity(),
            OrderedSet::Large(table) => table.capacity(),
        }
    }

    /// Returns `true` if `key` is present.
    pub fn has(&self, rt: &Runtime<H>, key: H::Value) -> bool {
        match self {
            OrderedSet::Small(table) => table.has_key(rt, key),
            OrderedSet::Large(table) => table.has_key(rt, key),
        }
    }

    /// The entry index of `key`, if present. Invalidated by any structural
    /// mutation.
    pub fn find_entry(&self, rt: &Runtime<H>, key: H::Value) -> Option<usize> {
        match self {
            OrderedSet::Small(table) => table.find_entry(rt, key),
            OrderedSet::Large(table) => table.find_entry(rt, key),
        }
    }

    /// The key stored at `entry`.
    pub fn key_at(&self, entry: usize) -> H::Value {
        match self {
            OrderedSet::Small(table) => table.key_at(entry),
            OrderedSet::Large(table) => table.key_at(entry),
        }
    }

    /// Adds `key` unless an equal key is present, promoting to the large
    /// form when the small form is out of byte-addressable slots.
    pub fn add(&mut self, rt: &Runtime<H>, key: H::Value) -> Result<(), Error> {
        if let OrderedSet::Small(table) = self {
            match table.add(rt, key) {
                Ok(_) => return Ok(()),
                Err(SmallAddError::Alloc(err)) => return Err(err.into()),
                Err(SmallAddError::Full) => {
                    let large = Self::adjust_representation(rt, table)?;
                    log::debug!(
                        "promoted set of {} entries to the large form",
                        large.number_of_elements()
                    );
                    *self = OrderedSet::Large(large);
                }
            }
        }
        let OrderedSet::Large(table) = self else {
            unreachable!()
        };
        *table = LargeTable::<H, SetShape>::add(rt, table, key)?;
        Ok(())
    }

    fn adjust_representation(
        rt: &Runtime<H>,
        small: &SmallTable<H, SetShape>,
    ) -> Result<Rc<LargeTable<H, SetShape>>, Error> {
        let mut table = LargeTable::allocate(rt, large::INITIAL_CAPACITY)?;
        for entry in small.live_entries() {
            table = LargeTable::<H, SetShape>::add(rt, &table, small.key_at(entry))?;
        }
        Ok(table)
    }

    /// Tombstones `key` if present.
    pub fn delete(&mut self, rt: &Runtime<H>, key: H::Value) -> bool {
        match self {
            OrderedSet::Small(table) => table.delete(rt, key),
            OrderedSet::Large(table) => table.delete(rt, key),
        }
    }

    /// Empties the set. A large backing table is obsoleted so iterators on
    /// it restart on its fresh successor.
    pub fn clear(&mut self, rt: &Runtime<H>) -> Result<(), Error> {
        match self {
            OrderedSet::Small(table) => *table = SmallTable::allocate(rt, small::MIN_CAPACITY)?,
            OrderedSet::Large(table) => *table = LargeTable::clear(rt, table)?,
        }
        Ok(())
    }

    /// Compacts the backing table if it is mostly empty.
    pub fn shrink(&mut self, rt: &Runtime<H>) -> Result<(), Error> {
        match self {
            OrderedSet::Small(table) => table.shrink(rt),
            OrderedSet::Large(table) => {
                *table = LargeTable::shrink(rt, table)?;
                Ok(())
            }
        }
    }

    /// All live keys in insertion order.
    pub fn keys(&self) -> Vec<H::Value> {
        match self {
            OrderedSet::Small(table) => table.live_entries().map(|e| table.key_at(e)).collect(),
            OrderedSet::Large(table) => table.live_entries().map(|e| table.key_at(e)).collect(),
        }
    }

    /// Consumes the set into a plain key array in insertion order, applying
    /// the numeric-key conversion; see
    /// [`LargeTable::convert_to_keys_array`].
    pub fn into_keys_array(self, rt: &Runtime<H>, convert: KeysConversion) -> Vec<H::Value> {
        match self {
            OrderedSet::Large(table) => LargeTable::convert_to_keys_array(rt, table, convert),
            OrderedSet::Small(table) => {
                let mut keys = Vec::with_capacity(table.number_of_elements());
                for entry in table.live_entries() {
                    let mut key = table.key_at(entry);
                    match convert {
                        KeysConversion::KeepNumbers => {}
                        KeysConversion::ConvertToString => {
                            if let Some(index) = key.as_array_index() {
                                let use_cache = keys.len() < rt.host().number_name_cache_limit();
                                key = rt.host().index_to_name(index, use_cache);
                            }
                        }
                        KeysConversion::NoNumbers => {
                            debug_assert!(key.as_array_index().is_none(), "unexpected numeric key");
                        }
                    }
                    keys.push(key);
                }
                keys
            }
        }
    }
}

impl<H: Host> fmt::Debug for OrderedSet<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedSet")
            .field("form", &if self.is_large() { "large" } else { "small" })
            .field("len", &self.number_of_elements())
            .finish()
    }
}

/// Insertion-ordered map keyed by same-value-zero equality.
pub enum OrderedMap<H: Host> {
    /// Bounded byte-celled form.
    Small(SmallTable<H, MapShape>),
    /// Unbounded form.
    Large(Rc<LargeTable<H, MapShape>>),
}

impl<H: Host> OrderedMap<H> {
    /// Returns an empty map in the small form.
    pub fn new(rt: &Runtime<H>) -> Result<Self, Error> {
        Self::with_capacity(rt, small::MIN_CAPACITY)
    }

    /// Returns an empty map with room for `capacity` entries.
    pub fn with_capacity(rt: &Runtime<H>, capacity: usize) -> Result<Self, Error> {
        if capacity < small::MAX_CAPACITY {
            Ok(OrderedMap::Small(SmallTable::allocate(rt, capacity)?))
        } else {
            Ok(OrderedMap::Large(LargeTable::allocate(rt, capacity)?))
        }
    }

    /// Returns `true` once the map has been promoted to the large form.
    pub fn is_large(&self) -> bool {
        matches!(self, OrderedMap::Large(_))
    }

    /// Number of live entries.
    pub fn number_of_elements(&self) -> usize {
        match self {
            OrderedMap::Small(table) => table.number_of_elements(),
            OrderedMap::Large(table) => table.number_of_elements(),
        }
    }

    /// Number of tombstoned entries.
    pub fn number_of_deleted_elements(&self) -> usize {
        match self {
            OrderedMap::Small(table) => table.number_of_deleted_elements(),
            OrderedMap::Large(table) => table.number_of_deleted_elements() as usize,
        }
    }

    /// Number of entry slots in the current backing table.
    pub fn capacity(&self) -> usize {
        match self {
            OrderedMap::Small(table) => table.capacity(),
            OrderedMap::Large(table) => table.capacity(),
        }
    }

    /// The entry index of `key`, if present. Invalidated by any structural
    /// mutation.
    pub fn find_entry(&self, rt: &Runtime<H>, key: H::Value) -> Option<usize> {
        match self {
            OrderedMap::Small(table) => table.find_entry(rt, key),
            OrderedMap::Large(table) => table.find_entry(rt, key),
        }
    }

    /// Returns `true` if `key` is present.
    pub fn has(&self, rt: &Runtime<H>, key: H::Value) -> bool {
        self.find_entry(rt, key).is_some()
    }

    /// The key stored at `entry`.
    pub fn key_at(&self, entry: usize) -> H::Value {
        match self {
            OrderedMap::Small(table) => table.key_at(entry),
            OrderedMap::Large(table) => table.key_at(entry),
        }
    }

    /// The value stored at `entry`.
    pub fn value_at(&self, entry: usize) -> H::Value {
        match self {
            OrderedMap::Small(table) => table.value_at(entry),
            OrderedMap::Large(table) => table.value_at(entry),
        }
    }

    /// The value stored under `key`, if present.
    pub fn get(&self, rt: &Runtime<H>, key: H::Value) -> Option<H::Value> {
        match self {
            OrderedMap::Small(table) => table.find_entry(rt, key).map(|e| table.value_at(e)),
            OrderedMap::Large(table) => table.find_entry(rt, key).map(|e| table.value_at(e)),
        }
    }

    /// Adds a `(key, value)` entry unless an equal key is present; a present
    /// key keeps its old value. Promotes when the small form is full.
    pub fn add(&mut self, rt: &Runtime<H>, key: H::Value, value: H::Value) -> Result<(), Error> {
        if let OrderedMap::Small(table) = self {
            match table.add(rt, key, value) {
                Ok(_) => return Ok(()),
                Err(SmallAddError::Alloc(err)) => return Err(err.into()),
                Err(SmallAddError::Full) => {
                    let large = Self::adjust_representation(rt, table)?;
                    log::debug!(
                        "promoted map of {} entries to the large form",
                        large.number_of_elements()
                    );
                    *self = OrderedMap::Large(large);
                }
            }
        }
        let OrderedMap::Large(table) = self else {
            unreachable!()
        };
        *table = LargeTable::<H, MapShape>::add(rt, table, key, value)?;
        Ok(())
    }

    /// Stores `value` under `key`, overwriting in place if an equal key is
    /// present. The entry keeps its position in insertion order and its
    /// first-stored key.
    pub fn set(&mut self, rt: &Runtime<H>, key: H::Value, value: H::Value) -> Result<(), Error> {
        match self {
            OrderedMap::Small(table) => {
                if let Some(entry) = table.find_entry(rt, key) {
                    let stored_key = table.key_at(entry);
                    table.set_entry(entry, stored_key, value);
                    return Ok(());
                }
            }
            OrderedMap::Large(table) => {
                if let Some(entry) = table.find_entry(rt, key) {
                    table.set_entry(entry, table.key_at(entry), value);
                    return Ok(());
                }
            }
        }
        self.add(rt, key, value)
    }

    fn adjust_representation(
        rt: &Runtime<H>,
        small: &SmallTable<H, MapShape>,
    ) -> Result<Rc<LargeTable<H, MapShape>>, Error> {
        let mut table = LargeTable::allocate(rt, large::INITIAL_CAPACITY)?;
        for entry in small.live_entries() {
            table = LargeTable::<H, MapShape>::add(rt, &table, small.key_at(entry), small.value_at(entry))?;
        }
        Ok(table)
    }

    /// Tombstones `key` if present.
    pub fn delete(&mut self, rt: &Runtime<H>, key: H::Value) -> bool {
        match self {
            OrderedMap::Small(table) => table.delete(rt, key),
            OrderedMap::Large(table) => table.delete(rt, key),
        }
    }

    /// Empties the map. A large backing table is obsoleted so iterators on
    /// it restart on its fresh successor.
    pub fn clear(&mut self, rt: &Runtime<H>) -> Result<(), Error> {
        match self {
            OrderedMap::Small(table) => *table = SmallTable::allocate(rt, small::MIN_CAPACITY)?,
            OrderedMap::Large(table) => *table = LargeTable::clear(rt, table)?,
        }
        Ok(())
    }

    /// Compacts the backing table if it is mostly empty.
    pub fn shrink(&mut self, rt: &Runtime<H>) -> Result<(), Error> {
        match self {
            OrderedMap::Small(table) => table.shrink(rt),
            OrderedMap::Large(table) => {
                *table = LargeTable::shrink(rt, table)?;
                Ok(())
            }
        }
    }

    /// The stored identity hash of a raw key, or `None` if the key was never
    /// used as a hash key (and therefore cannot be in any map).
    pub fn key_hash(rt: &Runtime<H>, key: H::Value) -> Option<u32> {
        rt.host().hash(key)
    }

    /// All live keys in insertion order.
    pub fn keys(&self) -> Vec<H::Value> {
        match self {
            OrderedMap::Small(table) => table.live_entries().map(|e| table.key_at(e)).collect(),
            OrderedMap::Large(table) => table.live_entries().map(|e| table.key_at(e)).collect(),
        }
    }

    /// All live `(key, value)` entries in insertion order.
    pub fn entries(&self) -> Vec<(H::Value, H::Value)> {
        match self {
            OrderedMap::Small(table) => table
                .live_entries()
                .map(|e| (table.key_at(e), table.value_at(e)))
                .collect(),
            OrderedMap::Large(table) => table
                .live_entries()
                .map(|e| (table.key_at(e), table.value_at(e)))
                .collect(),
        }
    }
}

impl<H: Host> fmt::Debug for OrderedMap<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMap")
            .field("form", &if self.is_large() { "large" } else { "small" })
            .field("len", &self.number_of_elements())
            .finish()
    }
}

/// Insertion-ordered property dictionary with identity-compared
/// interned-name keys and packed per-entry details.
pub enum NameDictionary<H: Host> {
    /// Bounded byte-celled form.
    Small(SmallTable<H, DictShape>),
    /// Unbounded form.
    Large(Rc<LargeTable<H, DictShape>>),
}

impl<H: Host> NameDictionary<H> {
    /// Returns an empty dictionary in the small form.
    pub fn new(rt: &Runtime<H>) -> Result<Self, Error> {
        Self::with_capacity(rt, small::MIN_CAPACITY)
    }

    /// Returns an empty dictionary with room for `capacity` entries.
    pub fn with_capacity(rt: &Runtime<H>, capacity: usize) -> Result<Self, Error> {
        if capacity < small::MAX_CAPACITY {
            Ok(NameDictionary::Small(SmallTable::allocate(rt, capacity)?))
        } else {
            Ok(NameDictionary::Large(LargeTable::allocate(rt, capacity)?))
        }
    }

    /// Returns `true` once the dictionary has been promoted to the large
    /// form.
    pub fn is_large(&self) -> bool {
        matches!(self, NameDictionary::Large(_))
    }

    /// Number of live entries.
    pub fn number_of_elements(&self) -> usize {
        match self {
            NameDictionary::Small(table) => table.number_of_elements(),
            NameDictionary::Large(table) => table.number_of_elements(),
        }
    }

    /// Number of entry slots in the current backing table.
    pub fn capacity(&self) -> usize {
        match self {
            NameDictionary::Small(table) => table.capacity(),
            NameDictionary::Large(table) => table.capacity(),
        }
    }

    /// The entry index of `key`, if present. Invalidated by any structural
    /// mutation.
    pub fn find_entry(&self, rt: &Runtime<H>, key: H::Value) -> Option<usize> {
        match self {
            NameDictionary::Small(table) => table.find_entry(rt, key),
            NameDictionary::Large(table) => table.find_entry(rt, key),
        }
    }

    /// Adds a `(key, value, details)` entry. The key must be absent; a
    /// duplicate add is a contract violation. Promotes when the small form
    /// is full.
    pub fn add(
        &mut self,
        rt: &Runtime<H>,
        key: H::Value,
        value: H::Value,
        details: PropertyDetails,
    ) -> Result<(), Error> {
        if let NameDictionary::Small(table) = self {
            match table.add(rt, key, value, details) {
                Ok(()) => return Ok(()),
                Err(SmallAddError::Alloc(err)) => return Err(err.into()),
                Err(SmallAddError::Full) => {
                    let large = Self::adjust_representation(rt, table)?;
                    log::debug!(
                        "promoted dictionary of {} entries to the large form",
                        large.number_of_elements()
                    );
                    *self = NameDictionary::Large(large);
                }
            }
        }
        let NameDictionary::Large(table) = self else {
            unreachable!()
        };
        *table = LargeTable::<H, DictShape>::add(rt, table, key, value, details)?;
        Ok(())
    }

    fn adjust_representation(
        rt: &Runtime<H>,
        small: &SmallTable<H, DictShape>,
    ) -> Result<Rc<LargeTable<H, DictShape>>, Error> {
        let mut table = LargeTable::allocate(rt, large::INITIAL_CAPACITY)?;
        for entry in small.live_entries() {
            table = LargeTable::<H, DictShape>::add(
                rt,
                &table,
                small.key_at(entry),
                small.value_at(entry),
                small.details_at(entry),
            )?;
        }
        table.set_hash(small.hash());
        Ok(table)
    }

    /// The key stored at `entry`.
    pub fn key_at(&self, entry: usize) -> H::Value {
        match self {
            NameDictionary::Small(table) => table.key_at(entry),
            NameDictionary::Large(table) => table.key_at(entry),
        }
    }

    /// The value stored at `entry`.
    pub fn value_at(&self, entry: usize) -> H::Value {
        match self {
            NameDictionary::Small(table) => table.value_at(entry),
            NameDictionary::Large(table) => table.value_at(entry),
        }
    }

    /// Overwrites the value at `entry` in place.
    pub fn value_at_put(&mut self, entry: usize, value: H::Value) {
        match self {
            NameDictionary::Small(table) => table.value_at_put(entry, value),
            NameDictionary::Large(table) => table.value_at_put(entry, value),
        }
    }

    /// The property details stored at `entry`.
    pub fn details_at(&self, entry: usize) -> PropertyDetails {
        match self {
            NameDictionary::Small(table) => table.details_at(entry),
            NameDictionary::Large(table) => table.details_at(entry),
        }
    }

    /// Overwrites the property details at `entry` in place.
    pub fn details_at_put(&mut self, entry: usize, details: PropertyDetails) {
        match self {
            NameDictionary::Small(table) => table.details_at_put(entry, details),
            NameDictionary::Large(table) => table.details_at_put(entry, details),
        }
    }

    /// Overwrites `entry` in place.
    pub fn set_entry(
        &mut self,
        entry: usize,
        key: H::Value,
        value: H::Value,
        details: PropertyDetails,
    ) {
        match self {
            NameDictionary::Small(table) => table.set_entry(entry, key, value, details),
            NameDictionary::Large(table) => table.set_entry(entry, key, value, details),
        }
    }

    /// Tombstones `entry` and shrinks the backing table if it became mostly
    /// empty.
    pub fn delete_entry(&mut self, rt: &Runtime<H>, entry: usize) -> Result<(), Error> {
        match self {
            NameDictionary::Small(table) => table.delete_entry(rt, entry),
            NameDictionary::Large(table) => {
                *table = LargeTable::delete_entry(rt, table, entry)?;
                Ok(())
            }
        }
    }

    /// The identity hash of the object owning this dictionary.
    pub fn hash(&self) -> u32 {
        match self {
            NameDictionary::Small(table) => table.hash(),
            NameDictionary::Large(table) => table.hash(),
        }
    }

    /// Stores the identity hash of the owning object.
    pub fn set_hash(&mut self, hash: u32) {
        match self {
            NameDictionary::Small(table) => table.set_hash(hash),
            NameDictionary::Large(table) => table.set_hash(hash),
        }
    }

    /// All live keys in insertion order.
    pub fn keys(&self) -> Vec<H::Value> {
        match self {
            NameDictionary::Small(table) => table.live_entries().map(|e| table.key_at(e)).collect(),
            NameDictionary::Large(table) => table.live_entries().map(|e| table.key_at(e)).collect(),
        }
    }
}

impl<H: Host> fmt::Debug for NameDictionary<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameDictionary")
            .field("form", &if self.is_large() { "large" } else { "small" })
            .field("len", &self.number_of_elements())
            .finish()
    }
}
