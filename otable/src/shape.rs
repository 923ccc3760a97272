//! Per-variant entry shapes.
//!
//! The three container variants differ only in how many payload slots an
//! entry carries, which equality relation their key lookup uses, and which
//! canonical empty table exhausted iterators park on. Everything else is
//! shared table machinery parameterized by a [`Shape`].
use std::rc::Rc;

use otable_heap::{Host, TaggedValue};

use crate::large::LargeTable;
use crate::runtime::Roots;

/// Entry shape of a container variant.
pub trait Shape: Sized + 'static {
    /// Payload slots per entry, excluding the chain link.
    const PAYLOAD: usize;

    /// Key equality used by lookup in this variant.
    fn keys_equal<V: TaggedValue>(a: V, b: V) -> bool;

    /// The per-variant canonical empty table.
    fn canonical_empty<H: Host>(roots: &Roots<H>) -> Rc<LargeTable<H, Self>>;
}

/// Shape of ordered sets: the key is the whole payload.
#[derive(Clone, Copy, Debug)]
pub struct SetShape;

/// Shape of ordered maps: key and value.
#[derive(Clone, Copy, Debug)]
pub struct MapShape;

/// Shape of name dictionaries: key, value and packed property details, with
/// identity-compared interned-name keys.
#[derive(Clone, Copy, Debug)]
pub struct DictShape;

impl Shape for SetShape {
    const PAYLOAD: usize = 1;

    fn keys_equal<V: TaggedValue>(a: V, b: V) -> bool {
        a.same_value_zero(b)
    }

    fn canonical_empty<H: Host>(roots: &Roots<H>) -> Rc<LargeTable<H, Self>> {
        roots.empty_set().clone()
    }
}

impl Shape for MapShape {
    const PAYLOAD: usize = 2;

    fn keys_equal<V: TaggedValue>(a: V, b: V) -> bool {
        a.same_value_zero(b)
    }

    fn canonical_empty<H: Host>(roots: &Roots<H>) -> Rc<LargeTable<H, Self>> {
        roots.empty_map().clone()
    }
}

impl Shape for DictShape {
    const PAYLOAD: usize = 3;

    // Dictionary keys are unique interned names, so identity suffices.
    fn keys_equal<V: TaggedValue>(a: V, b: V) -> bool {
        a.same_identity(b)
    }

    fn canonical_empty<H: Host>(roots: &Roots<H>) -> Rc<LargeTable<H, Self>> {
        roots.empty_dict().clone()
    }
}

/// Hash word of a dictionary whose owning object has no identity hash yet.
pub const NO_HASH_SENTINEL: u32 = 0;

/// Packed property metadata carried by dictionary entries.
///
/// The table treats details as an opaque scalar; it only ever stores them as
/// small integers and hands them back. Wiped entries hold
/// [`PropertyDetails::EMPTY`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyDetails(pub u32);

impl PropertyDetails {
    /// Details of a wiped dictionary entry.
    pub const EMPTY: PropertyDetails = PropertyDetails(0);

    pub(crate) fn to_value<V: TaggedValue>(self) -> V {
        debug_assert!(self.0 <= i32::MAX as u32);
        V::from_smi(self.0 as i32)
    }

    pub(crate) fn from_value<V: TaggedValue>(value: V) -> Self {
        let raw = value.to_smi().expect("details slot holds a small integer");
        PropertyDetails(raw as u32)
    }
}
