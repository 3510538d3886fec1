//! Partition ownership oracle.

use mica_core::{MemberId, PartitionId};

/// Maps partitions to their current owner.
///
/// The oracle is consulted at resplit time and at the start of every pump for
/// orphaned partitions; `None` means ownership is in flux and the partition
/// has no usable owner right now.
pub trait PartitionOracle: Send + Sync {
    fn owner(&self, partition: PartitionId) -> Option<MemberId>;

    fn partition_count(&self) -> usize;
}
