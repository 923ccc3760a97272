//! Slot arithmetic for the two backing layouts.
//!
//! Both forms keep buckets, chain links and entry payloads in the same
//! backing block, buckets first. An entry owns `payload` value slots; the
//! large form appends the chain link as one more tagged slot per entry,
//! while the small form keeps byte-sized chain links next to the byte-sized
//! buckets in a separate control block and stores only payloads as tagged
//! slots.

/// Ratio of capacity to bucket count, fixed for both forms.
pub(crate) const LOAD_FACTOR: usize = 2;

/// Chain terminator of the large form, encoded as a small integer.
pub(crate) const NOT_FOUND: i32 = -1;

/// Chain terminator of the small form's byte cells.
pub(crate) const SMALL_NOT_FOUND: u8 = 0xFF;

/// Layout of a large-form backing block: `num_buckets` tagged bucket cells
/// followed by `capacity` entries of `payload + 1` tagged slots each, the
/// chain link last.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LargeLayout {
    num_buckets: usize,
    entry_size: usize,
}

impl LargeLayout {
    pub(crate) fn for_capacity(capacity: usize, payload: usize) -> Self {
        debug_assert!(capacity == 0 || capacity.is_power_of_two());
        LargeLayout {
            num_buckets: capacity / LOAD_FACTOR,
            entry_size: payload + 1,
        }
    }

    pub(crate) fn num_buckets(self) -> usize {
        self.num_buckets
    }

    /// Total slot count of the backing block for `capacity` entries.
    pub(crate) fn storage_len(self, capacity: usize) -> usize {
        self.num_buckets + capacity * self.entry_size
    }

    pub(crate) fn bucket(self, bucket: usize) -> usize {
        debug_assert!(bucket < self.num_buckets);
        bucket
    }

    pub(crate) fn entry_base(self, entry: usize) -> usize {
        self.num_buckets + entry * self.entry_size
    }

    pub(crate) fn payload(self, entry: usize, slot: usize) -> usize {
        debug_assert!(slot < self.entry_size - 1);
        self.entry_base(entry) + slot
    }

    pub(crate) fn chain(self, entry: usize) -> usize {
        self.entry_base(entry) + self.entry_size - 1
    }

    /// Bucket counts are powers of two, so hashes map to buckets by masking.
    pub(crate) fn hash_to_bucket(self, hash: u32) -> usize {
        debug_assert!(self.num_buckets.is_power_of_two());
        hash as usize & (self.num_buckets - 1)
    }
}

/// Layout of a small-form control block: `num_buckets` bucket bytes followed
/// by `capacity` chain bytes. Payload slots live in a separate tagged block
/// of `payload` slots per entry.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SmallLayout {
    num_buckets: usize,
    capacity: usize,
    payload: usize,
}

impl SmallLayout {
    pub(crate) fn for_capacity(capacity: usize, payload: usize) -> Self {
        SmallLayout {
            num_buckets: capacity / LOAD_FACTOR,
            capacity,
            payload,
        }
    }

    pub(crate) fn num_buckets(self) -> usize {
        self.num_buckets
    }

    pub(crate) fn capacity(self) -> usize {
        self.capacity
    }

    pub(crate) fn ctrl_len(self) -> usize {
        self.num_buckets + self.capacity
    }

    pub(crate) fn data_len(self) -> usize {
        self.capacity * self.payload
    }

    pub(crate) fn bucket(self, bucket: usize) -> usize {
        debug_assert!(bucket < self.num_buckets);
        bucket
    }

    pub(crate) fn chain(self, entry: usize) -> usize {
        debug_assert!(entry < self.capacity);
        self.num_buckets + entry
    }

    pub(crate) fn payload(self, entry: usize, slot: usize) -> usize {
        debug_assert!(entry < self.capacity && slot < self.payload);
        entry * self.payload + slot
    }

    /// Small-form bucket counts need not be powers of two (capacity is
    /// capped at 254), so this is a modulo rather than a mask.
    pub(crate) fn hash_to_bucket(self, hash: u32) -> usize {
        hash as usize % self.num_buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_offsets() {
        let layout = LargeLayout::for_capacity(8, 2);
        assert_eq!(layout.num_buckets(), 4);
        assert_eq!(layout.storage_len(8), 4 + 8 * 3);
        assert_eq!(layout.bucket(3), 3);
        assert_eq!(layout.entry_base(0), 4);
        assert_eq!(layout.payload(1, 1), 4 + 3 + 1);
        assert_eq!(layout.chain(1), 4 + 3 + 2);
        assert_eq!(layout.hash_to_bucket(13), 13 % 4);
    }

    #[test]
    fn small_offsets() {
        let layout = SmallLayout::for_capacity(254, 3);
        assert_eq!(layout.num_buckets(), 127);
        assert_eq!(layout.ctrl_len(), 127 + 254);
        assert_eq!(layout.data_len(), 254 * 3);
        assert_eq!(layout.chain(0), 127);
        assert_eq!(layout.payload(2, 1), 7);
        assert_eq!(layout.hash_to_bucket(300), 300 % 127);
    }
}
