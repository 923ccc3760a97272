//! The interface the container family expects from its host runtime.
use std::fmt;

use crate::value::TaggedValue;

/// Error returned when the host cannot provide a fresh backing buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError {
    /// Number of value slots that were requested.
    pub slots: usize,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allocation of {} value slots failed", self.slots)
    }
}

impl std::error::Error for AllocError {}

/// Services a host runtime provides to the container family.
///
/// The containers are single-threaded and cooperative: they call back into
/// the host only at well-defined points, and they bracket every section that
/// walks raw table storage with a [`NoAlloc`] guard obtained from
/// [`Host::no_alloc`]. A host that relocates storage on allocation can rely
/// on that bracketing; the reference [`Heap`](crate::Heap) merely turns a
/// guarded allocation into a debug panic.
pub trait Host {
    /// The tagged value type stored in the containers.
    type Value: TaggedValue;

    /// Allocates a fresh backing buffer of `len` value slots, every slot
    /// initialized to `fill`.
    ///
    /// This is the only fallible allocation path in the containers; an error
    /// propagates to the caller without retry.
    fn allocate_slots(&self, len: usize, fill: Self::Value)
        -> Result<Box<[Self::Value]>, AllocError>;

    /// Returns the identity hash of `key`, creating one if the key has never
    /// been hashed.
    ///
    /// Hashing the hole sentinel is a contract violation.
    fn hash_or_create(&self, key: Self::Value) -> u32;

    /// Returns the identity hash of `key`, or `None` if the key has never
    /// been used as a hash key.
    fn hash(&self, key: Self::Value) -> Option<u32>;

    /// Converts a numeric array index to its name value.
    ///
    /// With `use_cache` unset the host bypasses any number-to-name cache it
    /// maintains; callers pass `false` past
    /// [`number_name_cache_limit`](Host::number_name_cache_limit) conversions
    /// to avoid trashing the cache with rarely reused entries.
    fn index_to_name(&self, index: u32, use_cache: bool) -> Self::Value;

    /// Number of cached numeric-index conversions beyond which callers
    /// should bypass the cache.
    fn number_name_cache_limit(&self) -> usize;

    /// Called when a no-allocation scope is entered. Hosts with verification
    /// hooks override this; the default does nothing.
    fn enter_no_alloc(&self) {}

    /// Called when a no-allocation scope is left.
    fn exit_no_alloc(&self) {}

    /// Opens a scoped no-allocation region.
    ///
    /// While the returned guard is live, calling
    /// [`allocate_slots`](Host::allocate_slots) is a contract violation.
    fn no_alloc(&self) -> NoAlloc<'_, Self>
    where
        Self: Sized,
    {
        self.enter_no_alloc();
        NoAlloc { host: self }
    }
}

/// Guard for a scoped no-allocation region, see [`Host::no_alloc`].
#[must_use = "the no-allocation region ends when the guard is dropped"]
pub struct NoAlloc<'a, H: Host> {
    host: &'a H,
}

impl<H: Host> Drop for NoAlloc<'_, H> {
    fn drop(&mut self) {
        self.host.exit_no_alloc();
    }
}
