//! The basic unit of index-scan execution: one partition subset bound to one
//! member.
//!
//! A split owns its resume cursor, at most one in-flight fetch, the unread
//! tail of the last response, and a single-row lookahead. `advance` performs
//! one unit of work and never blocks. A split whose fetch fails with
//! `MissingPartition` is poisoned; the executor replaces it with descendants
//! grouped by the new owners, each inheriting this split's cursor.

use mica_core::{IndexCursor, IndexEntry, MemberId, PartitionSet, Row, ScanError};

use crate::executor::ScanStats;
use crate::fetch::{FetchHandle, IndexFetchClient};
use crate::shaper::RowShaper;

pub struct Split {
    partitions: PartitionSet,
    /// `None` marks an orphan: ownership is in flux and the split is parked
    /// until the oracle re-homes its partitions.
    owner: Option<MemberId>,
    cursor: IndexCursor,
    pending: Option<FetchHandle>,
    batch: Vec<IndexEntry>,
    batch_pos: usize,
    lookahead: Option<Row>,
}

impl Split {
    pub fn new(partitions: PartitionSet, owner: Option<MemberId>, cursor: IndexCursor) -> Self {
        Self {
            partitions,
            owner,
            cursor,
            pending: None,
            batch: Vec::new(),
            batch_pos: 0,
            lookahead: None,
        }
    }

    pub fn partitions(&self) -> &PartitionSet {
        &self.partitions
    }

    pub fn owner(&self) -> Option<MemberId> {
        self.owner
    }

    pub fn cursor(&self) -> &IndexCursor {
        &self.cursor
    }

    pub fn is_orphan(&self) -> bool {
        self.owner.is_none()
    }

    /// Perform at most one unit of work: issue a fetch, harvest a completed
    /// one, or materialize the next shaped row from the current batch.
    ///
    /// On `MissingPartition` the split is poisoned and must be discarded in
    /// favor of resplit descendants.
    pub fn advance(
        &mut self,
        client: &dyn IndexFetchClient,
        shaper: &RowShaper,
        stats: &mut ScanStats,
    ) -> Result<(), ScanError> {
        if self.lookahead.is_some() {
            return Ok(());
        }
        let Some(owner) = self.owner else {
            // Orphan: no target to fetch from until the oracle recovers.
            return Ok(());
        };

        if self.batch_pos == self.batch.len() && self.pending.is_none() && !self.cursor.is_terminal() {
            self.pending = Some(client.read(owner, &self.partitions, &self.cursor));
            stats.fetches_issued += 1;
            return Ok(());
        }

        if let Some(handle) = self.pending.as_mut() {
            match handle.try_take() {
                None => {}
                Some(Ok(batch)) => {
                    self.pending = None;
                    if batch.entries.is_empty() && !batch.cursor.is_terminal() {
                        return Err(ScanError::internal(
                            "index fetch returned an empty batch with a non-terminal cursor",
                        ));
                    }
                    self.batch = batch.entries;
                    self.batch_pos = 0;
                    self.cursor = batch.cursor;
                    stats.batches_harvested += 1;
                }
                Some(Err(err)) => {
                    self.pending = None;
                    return Err(err);
                }
            }
        }

        while self.batch_pos < self.batch.len() && self.lookahead.is_none() {
            let entry = &self.batch[self.batch_pos];
            self.batch_pos += 1;
            self.lookahead = shaper.shape(entry);
        }
        Ok(())
    }

    pub fn peek_lookahead(&self) -> Option<&Row> {
        self.lookahead.as_ref()
    }

    pub fn take_lookahead(&mut self) -> Option<Row> {
        self.lookahead.take()
    }

    /// Exhausted: terminal cursor, consumed batch, no buffered row.
    pub fn is_done(&self) -> bool {
        self.lookahead.is_none() && self.batch_pos == self.batch.len() && self.cursor.is_terminal()
    }

    /// Waiting on I/O with nothing buffered to emit.
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some() && self.lookahead.is_none()
    }
}
