//! Tagged values as seen by the container family.
use std::fmt;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};

use zwohash::ZwoHasher;

/// Operations a value type has to support to be stored in the containers.
///
/// The containers treat values as opaque words apart from these operations:
/// the hole sentinel marks tombstoned entries and wiped payload slots, the
/// small-integer encoding is used for bucket cells, chain cells and packed
/// property details, and the two equality relations drive key lookup. A value
/// is `Copy` because it stands for a single tagged machine word in the host
/// runtime.
pub trait TaggedValue: Copy + fmt::Debug {
    /// Returns the hole sentinel.
    fn hole() -> Self;

    /// Returns `true` if this value is the hole sentinel.
    fn is_hole(self) -> bool;

    /// Encodes a small integer as a value.
    fn from_smi(value: i32) -> Self;

    /// Decodes a small integer, or `None` if this value is not one.
    fn to_smi(self) -> Option<i32>;

    /// Same-value-zero equality: NaN equals NaN and +0 equals −0.
    fn same_value_zero(self, other: Self) -> bool;

    /// Identity equality, used for interned-name keys.
    fn same_identity(self, other: Self) -> bool;

    /// Hash derivable from the value alone, without consulting the host.
    ///
    /// Values whose identity hash lives in a host-side registry (objects,
    /// interned names) return `None` here and are resolved via
    /// [`Host::hash`](crate::Host::hash) instead.
    fn intrinsic_hash(self) -> Option<u32>;

    /// Classifies this value as a numeric array index, if it is one.
    fn as_array_index(self) -> Option<u32>;
}

/// Identifier of an interned name owned by a [`Heap`](crate::Heap).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NameId(pub(crate) u32);

/// Identifier of a plain object owned by a [`Heap`](crate::Heap).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjId(pub(crate) u32);

/// Reference tagged value used by the [`Heap`](crate::Heap) host.
///
/// Small integers and doubles unify under same-value-zero equality, names
/// compare by interned identity and objects by allocation identity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// Small integer.
    Smi(i32),
    /// Double precision number.
    Num(f64),
    /// Boolean.
    Bool(bool),
    /// The undefined oddball.
    Undefined,
    /// The null oddball.
    Null,
    /// The hole sentinel. Never a user-visible key.
    Hole,
    /// An interned name.
    Name(NameId),
    /// A plain object, identified by its allocation.
    Obj(ObjId),
}

/// Identity hashes fit in 30 bits so every hash is a valid small integer.
pub(crate) const HASH_BITS: u32 = 30;
pub(crate) const HASH_MASK: u64 = (1 << HASH_BITS) - 1;

pub(crate) fn hash30<T: Hash>(value: T) -> u32 {
    let hash = <BuildHasherDefault<ZwoHasher>>::default().hash_one(value);
    (hash & HASH_MASK) as u32
}

impl Value {
    /// Numeric view with −0 and NaN canonicalized, so that hashing agrees
    /// with same-value-zero equality.
    fn canonical_number(self) -> Option<u64> {
        let number = match self {
            Value::Smi(value) => value as f64,
            Value::Num(value) if value.is_nan() => f64::NAN,
            Value::Num(value) if value == 0.0 => 0.0,
            Value::Num(value) => value,
            _ => return None,
        };
        Some(number.to_bits())
    }
}

impl TaggedValue for Value {
    fn hole() -> Self {
        Value::Hole
    }

    fn is_hole(self) -> bool {
        matches!(self, Value::Hole)
    }

    fn from_smi(value: i32) -> Self {
        Value::Smi(value)
    }

    fn to_smi(self) -> Option<i32> {
        match self {
            Value::Smi(value) => Some(value),
            _ => None,
        }
    }

    fn same_value_zero(self, other: Self) -> bool {
        if let (Some(a), Some(b)) = (self.canonical_number(), other.canonical_number()) {
            return a == b;
        }
        self.same_identity(other)
    }

    fn same_identity(self, other: Self) -> bool {
        match (self, other) {
            (Value::Smi(a), Value::Smi(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Hole, Value::Hole) => true,
            (Value::Name(a), Value::Name(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => a == b,
            _ => false,
        }
    }

    fn intrinsic_hash(self) -> Option<u32> {
        if let Some(bits) = self.canonical_number() {
            return Some(hash30(bits));
        }
        match self {
            Value::Bool(value) => Some(hash30((0x10u8, value))),
            Value::Undefined => Some(hash30(0x11u8)),
            Value::Null => Some(hash30(0x12u8)),
            _ => None,
        }
    }

    fn as_array_index(self) -> Option<u32> {
        // Array indices are the integers in [0, u32::MAX - 1], as usual for
        // indexed properties.
        match self {
            Value::Smi(value) => u32::try_from(value).ok(),
            Value::Num(value) => {
                if value.fract() == 0.0 && value >= 0.0 && value < u32::MAX as f64 {
                    Some(value as u32)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}
