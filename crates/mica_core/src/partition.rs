//! Partition identity and dense partition-id sets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense partition identifier in `[0, partition_count)`.
pub type PartitionId = u32;
/// Logical identifier of a cluster member.
pub type MemberId = u64;

const WORD_BITS: usize = 64;

/// Fixed-capacity bitmap over partition ids `[0, capacity)`.
///
/// An empty set on a split means the split has no work left; sets are grouped
/// and re-grouped during migration recovery, so membership, iteration, and
/// union are the only operations the scan path needs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSet {
    capacity: usize,
    words: Vec<u64>,
}

impl PartitionSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            words: vec![0; capacity.div_ceil(WORD_BITS)],
        }
    }

    /// Build a set from explicit partition ids; ids outside the capacity are
    /// ignored.
    pub fn with_partitions(capacity: usize, partitions: impl IntoIterator<Item = PartitionId>) -> Self {
        let mut set = Self::new(capacity);
        for partition in partitions {
            set.insert(partition);
        }
        set
    }

    /// Insert a partition id; returns whether the set changed.
    pub fn insert(&mut self, partition: PartitionId) -> bool {
        let idx = partition as usize;
        if idx >= self.capacity {
            return false;
        }
        let word = &mut self.words[idx / WORD_BITS];
        let mask = 1u64 << (idx % WORD_BITS);
        let changed = *word & mask == 0;
        *word |= mask;
        changed
    }

    pub fn contains(&self, partition: PartitionId) -> bool {
        let idx = partition as usize;
        idx < self.capacity && self.words[idx / WORD_BITS] & (1u64 << (idx % WORD_BITS)) != 0
    }

    pub fn union_with(&mut self, other: &PartitionSet) {
        for (word, extra) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= extra;
        }
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate the contained partition ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, word)| {
            let mut bits = *word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some((word_idx * WORD_BITS + bit) as PartitionId)
            })
        })
    }
}

impl fmt::Debug for PartitionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
