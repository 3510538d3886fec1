//! In-memory secondary index and the fetch client that serves from it.
//!
//! `ClusterView` is the embedded, single-process rendition of the cluster: a
//! sorted index shard per partition, the current ownership table, and the
//! index stamp. It doubles as the `PartitionOracle`. `LocalIndexClient`
//! implements `IndexFetchClient` against the view, resolving each read on a
//! spawned task so the executor observes the same non-blocking handle
//! contract a remote transport would give it.
//!
//! Traversal is deterministic for a fixed cursor and partition subset:
//! entries are served in `(key, partition)` order within the cursor's head
//! pointer, batches never split a run of equal keys, and the returned cursor
//! resumes strictly after the last served key. That determinism is what lets
//! resplit descendants reuse their parent's cursor safely.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tokio::sync::oneshot;

use mica_core::{
    IndexCursor, IndexEntry, KeyPointer, MemberId, PartitionId, PartitionSet, Row, ScanError,
    Value,
};

use crate::config::configured_fetch_size;
use crate::fetch::{FetchHandle, IndexBatch, IndexFetchClient};
use crate::oracle::PartitionOracle;

/// One partition's slice of the secondary index.
#[derive(Debug, Default)]
struct IndexShard {
    entries: BTreeMap<Value, Vec<Row>>,
}

#[derive(Debug)]
struct ClusterViewInner {
    index_name: String,
    index_stamp: u64,
    index_dropped: bool,
    owners: Vec<Option<MemberId>>,
    shards: Vec<IndexShard>,
}

/// Shared in-memory cluster state: index data, ownership, and index stamp.
#[derive(Debug)]
pub struct ClusterView {
    inner: RwLock<ClusterViewInner>,
}

impl ClusterView {
    pub fn new(index_name: impl Into<String>, partition_count: usize) -> anyhow::Result<Arc<Self>> {
        anyhow::ensure!(partition_count > 0, "cluster view requires at least one partition");
        let mut shards = Vec::with_capacity(partition_count);
        shards.resize_with(partition_count, IndexShard::default);
        Ok(Arc::new(Self {
            inner: RwLock::new(ClusterViewInner {
                index_name: index_name.into(),
                index_stamp: 0,
                index_dropped: false,
                owners: vec![None; partition_count],
                shards,
            }),
        }))
    }

    pub fn index_name(&self) -> String {
        self.read().index_name.clone()
    }

    /// Stamp of the current index definition; captured by clients at scan
    /// open and validated on every fetch.
    pub fn index_stamp(&self) -> u64 {
        self.read().index_stamp
    }

    /// Insert one row under its index key.
    pub fn insert(&self, partition: PartitionId, key: Value, row: Row) -> anyhow::Result<()> {
        let mut inner = self.write();
        let shard = inner
            .shards
            .get_mut(partition as usize)
            .ok_or_else(|| anyhow::anyhow!("partition {partition} out of range"))?;
        shard.entries.entry(key).or_default().push(row);
        Ok(())
    }

    pub fn assign(&self, partition: PartitionId, owner: MemberId) -> anyhow::Result<()> {
        let mut inner = self.write();
        let slot = inner
            .owners
            .get_mut(partition as usize)
            .ok_or_else(|| anyhow::anyhow!("partition {partition} out of range"))?;
        *slot = Some(owner);
        Ok(())
    }

    pub fn assign_all(&self, owner: MemberId) {
        let mut inner = self.write();
        for slot in inner.owners.iter_mut() {
            *slot = Some(owner);
        }
    }

    /// Move ownership of `partitions`; `None` marks ownership as in flux.
    pub fn migrate(&self, partitions: &PartitionSet, new_owner: Option<MemberId>) {
        let mut inner = self.write();
        for partition in partitions.iter() {
            if let Some(slot) = inner.owners.get_mut(partition as usize) {
                *slot = new_owner;
            }
        }
    }

    /// Simulate an incompatible index change: scans opened before this call
    /// fail their next fetch with a stale stamp.
    pub fn bump_index_stamp(&self) {
        self.write().index_stamp += 1;
    }

    pub fn drop_index(&self) {
        self.write().index_dropped = true;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ClusterViewInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ClusterViewInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serve one fetch: validate target ownership and stamp, then walk the
    /// cursor's pointers in order until the batch fills or data runs out.
    pub(crate) fn fetch(
        &self,
        target: MemberId,
        partitions: &PartitionSet,
        cursor: &IndexCursor,
        fetch_size: usize,
        expected_stamp: u64,
    ) -> Result<IndexBatch, ScanError> {
        let inner = self.read();
        if inner.index_dropped {
            return Err(ScanError::IndexNotFound { index: inner.index_name.clone() });
        }
        if inner.index_stamp != expected_stamp {
            return Err(ScanError::StaleIndexStamp {
                index: inner.index_name.clone(),
                detail: format!("stamp moved from {expected_stamp} to {}", inner.index_stamp),
            });
        }

        let mut missing = PartitionSet::new(inner.owners.len());
        for partition in partitions.iter() {
            if inner.owners.get(partition as usize).copied().flatten() != Some(target) {
                missing.insert(partition);
            }
        }
        if !missing.is_empty() {
            return Err(ScanError::MissingPartition { partitions: missing });
        }

        let order = cursor.order();
        let mut remaining: Vec<KeyPointer> = cursor.pointers().to_vec();
        let mut entries: Vec<IndexEntry> = Vec::new();

        while entries.len() < fetch_size && !remaining.is_empty() {
            let pointer = remaining[0].clone();
            let mut pool: Vec<IndexEntry> = Vec::new();
            for partition in partitions.iter() {
                let shard = &inner.shards[partition as usize];
                for (key, rows) in &shard.entries {
                    if !pointer.admits(key) {
                        continue;
                    }
                    for row in rows {
                        pool.push(IndexEntry {
                            partition,
                            key: key.clone(),
                            row: row.clone(),
                        });
                    }
                }
            }
            pool.sort_by(|a, b| {
                let by_key = a.key.total_cmp(&b.key);
                let by_key = if order.is_descending() { by_key.reverse() } else { by_key };
                by_key.then(a.partition.cmp(&b.partition))
            });

            let mut stopped_at: Option<Value> = None;
            for entry in pool {
                if entries.len() >= fetch_size {
                    // Never split a run of equal keys across batches, so an
                    // exclusive-key resume cannot drop or duplicate rows.
                    let continues_run = entries.last().is_some_and(|last| last.key == entry.key);
                    if !continues_run {
                        stopped_at = entries.last().map(|last| last.key.clone());
                        break;
                    }
                }
                entries.push(entry);
            }

            match stopped_at {
                Some(key) => {
                    match pointer.resumed_after(&key, order) {
                        Some(narrowed) => remaining[0] = narrowed,
                        None => {
                            remaining.remove(0);
                        }
                    }
                    break;
                }
                None => {
                    // Pointer exhausted; move on to the next range.
                    remaining.remove(0);
                }
            }
        }

        let cursor = if remaining.is_empty() {
            IndexCursor::terminal(order)
        } else {
            IndexCursor::resume(remaining, order)
        };
        Ok(IndexBatch { entries, cursor })
    }
}

impl PartitionOracle for ClusterView {
    fn owner(&self, partition: PartitionId) -> Option<MemberId> {
        self.read().owners.get(partition as usize).copied().flatten()
    }

    fn partition_count(&self) -> usize {
        self.read().owners.len()
    }
}

/// Fetch client resolving reads against an in-process `ClusterView`.
pub struct LocalIndexClient {
    view: Arc<ClusterView>,
    fetch_size: usize,
    expected_stamp: u64,
}

impl LocalIndexClient {
    /// Open a client against the view, pinning the current index stamp.
    pub fn new(view: Arc<ClusterView>) -> Self {
        let expected_stamp = view.index_stamp();
        Self {
            view,
            fetch_size: configured_fetch_size(),
            expected_stamp,
        }
    }

    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }
}

impl IndexFetchClient for LocalIndexClient {
    fn read(&self, target: MemberId, partitions: &PartitionSet, cursor: &IndexCursor) -> FetchHandle {
        let view = Arc::clone(&self.view);
        let partitions = partitions.clone();
        let cursor = cursor.clone();
        let fetch_size = self.fetch_size;
        let expected_stamp = self.expected_stamp;
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = view.fetch(target, &partitions, &cursor, fetch_size, expected_stamp);
            let _ = tx.send(result);
        });
        FetchHandle::from_receiver(rx)
    }
}
