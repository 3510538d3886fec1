//! The scan state machine: split set, emission loops, migration recovery.
//!
//! One executor drives one scan invocation, single-threaded and cooperative:
//! `pump()` performs as much work as downstream capacity and fetch readiness
//! allow, then returns `Done` or `Blocked`. Emission is either stable-order
//! concatenation across splits (hash indexes) or repeated extraction of the
//! comparator minimum across split lookaheads (sorted indexes).
//!
//! Recovery model: a fetch failing with `MissingPartition` poisons its split;
//! the executor regroups the split's partitions by their current owner and
//! splices the descendants in place, each resuming from the failed split's
//! cursor. Partitions whose owner is unknown stay behind in a parked orphan
//! split and are re-homed once the oracle catches up. Every other failure is
//! fatal: the executor releases its splits and keeps returning the error.

use std::collections::BTreeMap;
use std::sync::Arc;

use mica_core::{
    IndexCursor, IndexFilter, MemberId, PartitionSet, Predicate, Row, RowComparator, ScalarExpr,
    ScanError, ScanOrder,
};

use crate::config::ScanConfig;
use crate::fetch::IndexFetchClient;
use crate::oracle::PartitionOracle;
use crate::shaper::RowShaper;
use crate::sink::RowSink;
use crate::split::Split;

/// Outcome of one `pump()` activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpStatus {
    /// Every split is exhausted and nothing is pending emission.
    Done,
    /// No further progress without downstream capacity or I/O completion.
    Blocked,
}

/// Per-scan counters; single-threaded, read via `ScanExecutor::stats`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanStats {
    pub fetches_issued: u64,
    pub batches_harvested: u64,
    pub rows_emitted: u64,
    /// Migration recoveries performed.
    pub resplits: u64,
    /// Descendant splits created by recoveries and orphan re-homing.
    pub splits_spawned: u64,
    /// Orphan splits re-homed after the oracle caught up.
    pub orphan_adoptions: u64,
}

/// Everything a scan invocation is parameterized by.
#[derive(Clone, Debug)]
pub struct ScanParams {
    pub index_name: String,
    pub local_member: MemberId,
    pub local_partitions: PartitionSet,
    pub filter: IndexFilter,
    pub order: ScanOrder,
    pub residual: Option<Predicate>,
    pub projection: Vec<ScalarExpr>,
    /// `Some` selects sorted-merge emission; the comparator must agree with
    /// the per-partition index order.
    pub comparator: Option<RowComparator>,
}

pub struct ScanExecutor {
    client: Arc<dyn IndexFetchClient>,
    oracle: Arc<dyn PartitionOracle>,
    shaper: RowShaper,
    comparator: Option<RowComparator>,
    index_name: String,
    config: ScanConfig,
    splits: Vec<Split>,
    pending_emit: Option<Row>,
    stats: ScanStats,
    failed: Option<ScanError>,
}

impl ScanExecutor {
    /// Build the executor and its initial split. No I/O happens here; the
    /// first fetch is issued by the first `pump()`.
    pub fn new(
        params: ScanParams,
        client: Arc<dyn IndexFetchClient>,
        oracle: Arc<dyn PartitionOracle>,
        config: ScanConfig,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!params.projection.is_empty(), "scan projection must not be empty");
        anyhow::ensure!(config.pump_row_budget > 0, "pump row budget must be positive");
        anyhow::ensure!(
            params.local_partitions.capacity() == oracle.partition_count(),
            "partition set capacity {} does not match the oracle's partition count {}",
            params.local_partitions.capacity(),
            oracle.partition_count(),
        );
        if let Some(comparator) = &params.comparator {
            for key in comparator.keys() {
                anyhow::ensure!(
                    key.column < params.projection.len(),
                    "comparator key column {} is outside the projection",
                    key.column,
                );
            }
        }

        let cursor = IndexCursor::from_filter(&params.filter, params.order);
        let mut splits = Vec::new();
        if !params.local_partitions.is_empty() {
            // One split covering every local partition; migrations shrink it.
            splits.push(Split::new(
                params.local_partitions,
                Some(params.local_member),
                cursor,
            ));
        }

        Ok(Self {
            client,
            oracle,
            shaper: RowShaper::new(params.residual, params.projection),
            comparator: params.comparator,
            index_name: params.index_name,
            config,
            splits,
            pending_emit: None,
            stats: ScanStats::default(),
            failed: None,
        })
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn split_count(&self) -> usize {
        self.splits.len()
    }

    pub fn is_sorted(&self) -> bool {
        self.comparator.is_some()
    }

    /// Drive the scan: emit as many rows as the sink accepts and the fetch
    /// layer has ready, bounded by the per-activation row budget.
    pub fn pump(&mut self, sink: &mut dyn RowSink) -> Result<PumpStatus, ScanError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        self.adopt_orphans();
        let result = if self.is_sorted() {
            self.pump_sorted(sink)
        } else {
            self.pump_hash(sink)
        };
        match result {
            Ok(status) => Ok(status),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Transition to the terminal failed state, releasing every split and
    /// any in-flight fetch they hold.
    fn fail(&mut self, err: ScanError) -> ScanError {
        tracing::warn!(index = %self.index_name, error = %err, "index scan failed");
        self.splits.clear();
        self.pending_emit = None;
        self.failed = Some(err.clone());
        err
    }

    /// Flush the backpressured row, if any. Returns false when the sink is
    /// still rejecting it.
    fn try_flush_pending(&mut self, sink: &mut dyn RowSink) -> bool {
        let Some(row) = self.pending_emit.take() else {
            return true;
        };
        match sink.try_emit(row) {
            Ok(()) => {
                self.stats.rows_emitted += 1;
                true
            }
            Err(row) => {
                self.pending_emit = Some(row);
                false
            }
        }
    }

    /// Unordered emission: visit splits in stable order, emitting whatever
    /// each has buffered. Repeats passes while progress is being made.
    fn pump_hash(&mut self, sink: &mut dyn RowSink) -> Result<PumpStatus, ScanError> {
        if !self.try_flush_pending(sink) {
            return Ok(PumpStatus::Blocked);
        }

        let mut budget = self.config.pump_row_budget;
        loop {
            if self.splits.is_empty() {
                return Ok(PumpStatus::Done);
            }

            let mut progressed = false;
            let mut idx = 0;
            while idx < self.splits.len() {
                match self.splits[idx].advance(self.client.as_ref(), &self.shaper, &mut self.stats) {
                    Ok(()) => {}
                    Err(err) if err.is_missing_partition() => {
                        self.resplit(idx);
                        progressed = true;
                        // Continue at the first descendant.
                        continue;
                    }
                    Err(err) => return Err(err),
                }

                if self.splits[idx].peek_lookahead().is_some() {
                    if budget == 0 {
                        return Ok(PumpStatus::Blocked);
                    }
                    let row = self.splits[idx]
                        .take_lookahead()
                        .ok_or_else(|| ScanError::internal("lookahead vanished under the emit"))?;
                    match sink.try_emit(row) {
                        Ok(()) => {
                            self.stats.rows_emitted += 1;
                            budget -= 1;
                            progressed = true;
                        }
                        Err(row) => {
                            self.pending_emit = Some(row);
                            return Ok(PumpStatus::Blocked);
                        }
                    }
                }

                if self.splits[idx].is_done() {
                    self.splits.remove(idx);
                    progressed = true;
                } else {
                    idx += 1;
                }
            }

            if self.splits.is_empty() {
                return Ok(PumpStatus::Done);
            }
            if !progressed {
                // Everything left is waiting on I/O or parked.
                return Ok(PumpStatus::Blocked);
            }
        }
    }

    /// Sorted-merge emission: a row may only be emitted once every live split
    /// has a lookahead, so the global minimum is known.
    fn pump_sorted(&mut self, sink: &mut dyn RowSink) -> Result<PumpStatus, ScanError> {
        if !self.try_flush_pending(sink) {
            return Ok(PumpStatus::Blocked);
        }

        let mut budget = self.config.pump_row_budget;
        loop {
            let mut idx = 0;
            while idx < self.splits.len() {
                match self.splits[idx].advance(self.client.as_ref(), &self.shaper, &mut self.stats) {
                    Ok(()) => idx += 1,
                    Err(err) if err.is_missing_partition() => {
                        self.resplit(idx);
                        // Descendants are advanced in place before moving on.
                    }
                    Err(err) => return Err(err),
                }
            }

            if self
                .splits
                .iter()
                .any(|split| !split.is_done() && split.peek_lookahead().is_none())
            {
                // Cannot pick a global minimum without full information.
                return Ok(PumpStatus::Blocked);
            }

            self.splits.retain(|split| !split.is_done());
            if self.splits.is_empty() {
                return Ok(PumpStatus::Done);
            }
            if budget == 0 {
                return Ok(PumpStatus::Blocked);
            }

            let Some(comparator) = &self.comparator else {
                return Err(ScanError::internal("sorted pump without a comparator"));
            };
            // First minimal lookahead wins ties, keeping the merge stable.
            let mut min_idx = 0;
            for idx in 1..self.splits.len() {
                let (Some(candidate), Some(minimum)) = (
                    self.splits[idx].peek_lookahead(),
                    self.splits[min_idx].peek_lookahead(),
                ) else {
                    return Err(ScanError::internal("live split lost its lookahead mid-merge"));
                };
                if comparator.compare(candidate, minimum) == std::cmp::Ordering::Less {
                    min_idx = idx;
                }
            }

            let row = self.splits[min_idx]
                .take_lookahead()
                .ok_or_else(|| ScanError::internal("minimum split had no lookahead"))?;
            match sink.try_emit(row) {
                Ok(()) => {
                    self.stats.rows_emitted += 1;
                    budget -= 1;
                }
                Err(row) => {
                    self.pending_emit = Some(row);
                    return Ok(PumpStatus::Blocked);
                }
            }
        }
    }

    /// Replace the poisoned split at `idx` with descendants grouped by each
    /// partition's current owner, all resuming from the failed cursor.
    fn resplit(&mut self, idx: usize) {
        let failed = self.splits.remove(idx);
        tracing::debug!(
            index = %self.index_name,
            owner = ?failed.owner(),
            partitions = ?failed.partitions(),
            "resplitting after partition migration",
        );
        let descendants = self.regroup(failed.partitions(), failed.cursor());
        self.stats.resplits += 1;
        self.stats.splits_spawned += descendants.len() as u64;
        for (offset, split) in descendants.into_iter().enumerate() {
            self.splits.insert(idx + offset, split);
        }
    }

    /// Group partitions by their current owner, in deterministic owner order
    /// (unknown owners first), each group inheriting `cursor`.
    fn regroup(&self, partitions: &PartitionSet, cursor: &IndexCursor) -> Vec<Split> {
        let capacity = partitions.capacity();
        let mut groups: BTreeMap<Option<MemberId>, PartitionSet> = BTreeMap::new();
        for partition in partitions.iter() {
            groups
                .entry(self.oracle.owner(partition))
                .or_insert_with(|| PartitionSet::new(capacity))
                .insert(partition);
        }
        groups
            .into_iter()
            .map(|(owner, group)| Split::new(group, owner, cursor.clone()))
            .collect()
    }

    /// Re-home parked orphan splits whose partitions have a known owner
    /// again. Runs at the start of every pump.
    fn adopt_orphans(&mut self) {
        let mut idx = 0;
        while idx < self.splits.len() {
            if !self.splits[idx].is_orphan() {
                idx += 1;
                continue;
            }
            let any_known = self.splits[idx]
                .partitions()
                .iter()
                .any(|partition| self.oracle.owner(partition).is_some());
            if !any_known {
                idx += 1;
                continue;
            }

            let orphan = self.splits.remove(idx);
            tracing::debug!(
                index = %self.index_name,
                partitions = ?orphan.partitions(),
                "re-homing orphan split",
            );
            let descendants = self.regroup(orphan.partitions(), orphan.cursor());
            self.stats.orphan_adoptions += 1;
            self.stats.splits_spawned += descendants.len() as u64;
            let spawned = descendants.len();
            for (offset, split) in descendants.into_iter().enumerate() {
                self.splits.insert(idx + offset, split);
            }
            idx += spawned;
        }
    }
}
