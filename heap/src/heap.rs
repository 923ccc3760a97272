//! Reference host implementation.
use std::cell::{Cell, RefCell};
use std::hash::BuildHasherDefault;
use std::rc::Rc;

use hashbrown::HashMap;
use zwohash::ZwoHasher;

use crate::host::{AllocError, Host};
use crate::value::{hash30, NameId, ObjId, TaggedValue, Value};

type ZwoMap<K, V> = HashMap<K, V, BuildHasherDefault<ZwoHasher>>;

/// Default number of cached numeric-index conversions, see
/// [`Host::number_name_cache_limit`].
pub const DEFAULT_NUMBER_NAME_CACHE_LIMIT: usize = 4096;

#[derive(Default)]
struct Interner {
    by_text: ZwoMap<Rc<str>, NameId>,
    records: Vec<NameRecord>,
}

struct NameRecord {
    text: Rc<str>,
    hash: u32,
}

/// Reference [`Host`]: a single-threaded heap of interned names and plain
/// objects with lazily assigned identity hashes.
///
/// The heap tracks how many value slots it has handed out and can be given a
/// budget with [`set_slot_limit`](Heap::set_slot_limit); once the budget is
/// exhausted, [`allocate_slots`](Host::allocate_slots) fails. Tests use this
/// to exercise the containers' allocation-failure paths deterministically.
pub struct Heap {
    names: RefCell<Interner>,
    object_hashes: RefCell<ZwoMap<ObjId, u32>>,
    next_object: Cell<u32>,
    number_names: RefCell<ZwoMap<u32, NameId>>,
    number_name_cache_limit: Cell<usize>,
    slots_allocated: Cell<usize>,
    slot_limit: Cell<Option<usize>>,
    no_alloc_depth: Cell<u32>,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    /// Returns a fresh heap with no allocation budget.
    pub fn new() -> Self {
        Heap {
            names: RefCell::new(Interner::default()),
            object_hashes: RefCell::new(ZwoMap::default()),
            next_object: Cell::new(0),
            number_names: RefCell::new(ZwoMap::default()),
            number_name_cache_limit: Cell::new(DEFAULT_NUMBER_NAME_CACHE_LIMIT),
            slots_allocated: Cell::new(0),
            slot_limit: Cell::new(None),
            no_alloc_depth: Cell::new(0),
        }
    }

    /// Interns `text` and returns its name value.
    ///
    /// Interning the same text twice returns the same name, so identity
    /// equality of names coincides with string equality.
    pub fn intern(&self, text: &str) -> Value {
        let mut names = self.names.borrow_mut();
        if let Some(&id) = names.by_text.get(text) {
            return Value::Name(id);
        }
        let text: Rc<str> = text.into();
        let id = NameId(u32::try_from(names.records.len()).expect("too many interned names"));
        names.records.push(NameRecord {
            text: text.clone(),
            hash: hash30(&*text),
        });
        names.by_text.insert(text, id);
        Value::Name(id)
    }

    /// Returns the text of an interned name.
    pub fn name_text(&self, id: NameId) -> Rc<str> {
        self.names.borrow().records[id.0 as usize].text.clone()
    }

    /// Allocates a plain object. Its identity hash is created on first use
    /// as a hash key.
    pub fn new_object(&self) -> Value {
        let id = ObjId(self.next_object.get());
        self.next_object.set(id.0.checked_add(1).expect("too many objects"));
        Value::Obj(id)
    }

    /// Limits the total number of value slots this heap will hand out, or
    /// removes the limit with `None`.
    pub fn set_slot_limit(&self, limit: Option<usize>) {
        self.slot_limit.set(limit);
    }

    /// Total number of value slots handed out so far.
    pub fn slots_allocated(&self) -> usize {
        self.slots_allocated.get()
    }

    /// Overrides the numeric-index conversion cache threshold.
    pub fn set_number_name_cache_limit(&self, limit: usize) {
        self.number_name_cache_limit.set(limit);
    }
}

impl Host for Heap {
    type Value = Value;

    fn allocate_slots(&self, len: usize, fill: Value) -> Result<Box<[Value]>, AllocError> {
        debug_assert_eq!(
            self.no_alloc_depth.get(),
            0,
            "allocation inside a no-allocation scope"
        );
        let total = self.slots_allocated.get() + len;
        if let Some(limit) = self.slot_limit.get() {
            if total > limit {
                return Err(AllocError { slots: len });
            }
        }
        self.slots_allocated.set(total);
        Ok(vec![fill; len].into_boxed_slice())
    }

    fn hash_or_create(&self, key: Value) -> u32 {
        if let Value::Obj(id) = key {
            return *self
                .object_hashes
                .borrow_mut()
                .entry(id)
                .or_insert_with(|| hash30((0x20u8, id)));
        }
        self.hash(key).expect("value cannot be used as a hash key")
    }

    fn hash(&self, key: Value) -> Option<u32> {
        match key {
            Value::Name(id) => Some(self.names.borrow().records[id.0 as usize].hash),
            Value::Obj(id) => self.object_hashes.borrow().get(&id).copied(),
            other => other.intrinsic_hash(),
        }
    }

    fn index_to_name(&self, index: u32, use_cache: bool) -> Value {
        if use_cache {
            if let Some(&id) = self.number_names.borrow().get(&index) {
                return Value::Name(id);
            }
        }
        let name = self.intern(&index.to_string());
        if use_cache {
            let Value::Name(id) = name else { unreachable!() };
            self.number_names.borrow_mut().insert(index, id);
        }
        name
    }

    fn number_name_cache_limit(&self) -> usize {
        self.number_name_cache_limit.get()
    }

    fn enter_no_alloc(&self) {
        self.no_alloc_depth.set(self.no_alloc_depth.get() + 1);
    }

    fn exit_no_alloc(&self) {
        self.no_alloc_depth.set(self.no_alloc_depth.get() - 1);
    }
}
