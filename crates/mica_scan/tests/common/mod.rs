//! Shared helpers for scan integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Context;

use mica_core::{
    IndexCursor, IndexFilter, MemberId, PartitionSet, Row, ScalarExpr, ScanError, ScanOrder, Value,
};
use mica_scan::{
    ClusterView, FetchHandle, IndexFetchClient, LocalIndexClient, PumpStatus, RowSink, ScanConfig,
    ScanExecutor, ScanParams, VecSink,
};

/// Member hosting every partition at scan open.
pub const LOCAL_MEMBER: MemberId = 1;
/// Partition count of the seeded cluster.
pub const PARTITIONS: usize = 3;

/// Upper bound on pump activations before a test gives up.
const MAX_PUMPS: usize = 100_000;

/// Cluster seeded with the canonical scenario data: keys 10/20/30 in
/// partition 0, 11 in partition 1, 22/33 in partition 2, every row carrying
/// `[key, label]` columns.
pub fn seeded_cluster() -> Arc<ClusterView> {
    let view = ClusterView::new("orders_by_total", PARTITIONS).expect("create cluster view");
    view.assign_all(LOCAL_MEMBER);
    for (partition, key) in [(0u32, 10i64), (0, 20), (0, 30), (1, 11), (2, 22), (2, 33)] {
        view.insert(
            partition,
            Value::Int(key),
            Row::new(vec![Value::Int(key), Value::Str(format!("row-{key}"))]),
        )
        .expect("seed row");
    }
    view
}

pub fn all_local_partitions() -> PartitionSet {
    PartitionSet::with_partitions(PARTITIONS, 0..PARTITIONS as u32)
}

/// Scan parameters projecting the key column, hash mode unless a comparator
/// is added by the test.
pub fn scan_params(filter: IndexFilter, order: ScanOrder) -> ScanParams {
    ScanParams {
        index_name: "orders_by_total".into(),
        local_member: LOCAL_MEMBER,
        local_partitions: all_local_partitions(),
        filter,
        order,
        residual: None,
        projection: vec![ScalarExpr::Column(0)],
        comparator: None,
    }
}

pub fn small_batch_config() -> ScanConfig {
    ScanConfig {
        fetch_size: 2,
        ..ScanConfig::default()
    }
}

pub fn executor_over(
    view: &Arc<ClusterView>,
    params: ScanParams,
    config: ScanConfig,
) -> anyhow::Result<ScanExecutor> {
    let client = Arc::new(LocalIndexClient::new(Arc::clone(view)).with_fetch_size(config.fetch_size));
    let oracle = Arc::clone(view) as Arc<dyn mica_scan::PartitionOracle>;
    ScanExecutor::new(params, client, oracle, config)
}

pub fn executor_with_client(
    view: &Arc<ClusterView>,
    client: Arc<dyn IndexFetchClient>,
    params: ScanParams,
    config: ScanConfig,
) -> anyhow::Result<ScanExecutor> {
    let oracle = Arc::clone(view) as Arc<dyn mica_scan::PartitionOracle>;
    ScanExecutor::new(params, client, oracle, config)
}

/// Drive the executor to completion, yielding between activations so fetch
/// tasks can run. Returns how many activations reported `Blocked`.
pub async fn pump_to_done(executor: &mut ScanExecutor, sink: &mut dyn RowSink) -> anyhow::Result<usize> {
    let mut blocked = 0usize;
    for _ in 0..MAX_PUMPS {
        match executor.pump(sink).context("pump failed")? {
            PumpStatus::Done => return Ok(blocked),
            PumpStatus::Blocked => {
                blocked += 1;
                tokio::task::yield_now().await;
            }
        }
    }
    anyhow::bail!("scan did not finish within {MAX_PUMPS} activations");
}

/// Drive until `stop` says so or the scan finishes.
pub async fn pump_until(
    executor: &mut ScanExecutor,
    sink: &mut dyn RowSink,
    mut stop: impl FnMut(&ScanExecutor, &dyn RowSink) -> bool,
) -> anyhow::Result<PumpStatus> {
    for _ in 0..MAX_PUMPS {
        let status = executor.pump(sink).context("pump failed")?;
        if matches!(status, PumpStatus::Done) || stop(executor, sink) {
            return Ok(status);
        }
        tokio::task::yield_now().await;
    }
    anyhow::bail!("stop condition not reached within {MAX_PUMPS} activations");
}

/// Extract integer keys from single-column projected rows, preserving order.
pub fn emitted_keys(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|row| match row.column(0) {
            Some(Value::Int(key)) => *key,
            other => panic!("unexpected projected column: {other:?}"),
        })
        .collect()
}

/// Same keys, order-insensitive.
pub fn emitted_multiset(rows: &[Row]) -> Vec<i64> {
    let mut keys = emitted_keys(rows);
    keys.sort_unstable();
    keys
}

/// The full seeded key set, ascending.
pub fn seeded_keys() -> Vec<i64> {
    vec![10, 11, 20, 22, 30, 33]
}

/// Sink rejecting every other emit.
#[derive(Default)]
pub struct FlakySink {
    pub inner: VecSink,
    offers: usize,
}

impl RowSink for FlakySink {
    fn try_emit(&mut self, row: Row) -> Result<(), Row> {
        self.offers += 1;
        if self.offers % 2 == 0 {
            return Err(row);
        }
        self.inner.try_emit(row)
    }
}

/// Sink rejecting everything.
#[derive(Default)]
pub struct RejectingSink;

impl RowSink for RejectingSink {
    fn try_emit(&mut self, row: Row) -> Result<(), Row> {
        Err(row)
    }
}

type ReadHook = Box<dyn FnOnce() + Send>;

/// Client wrapper that runs a one-shot hook right before forwarding the
/// n-th read, making mid-scan cluster changes deterministic.
pub struct TriggerClient {
    inner: Arc<dyn IndexFetchClient>,
    trigger_at: usize,
    reads: Mutex<usize>,
    hook: Mutex<Option<ReadHook>>,
}

impl TriggerClient {
    pub fn new(inner: Arc<dyn IndexFetchClient>, trigger_at: usize, hook: ReadHook) -> Self {
        Self {
            inner,
            trigger_at,
            reads: Mutex::new(0),
            hook: Mutex::new(Some(hook)),
        }
    }
}

impl IndexFetchClient for TriggerClient {
    fn read(&self, target: MemberId, partitions: &PartitionSet, cursor: &IndexCursor) -> FetchHandle {
        let read_idx = {
            let mut reads = self.reads.lock().expect("reads lock");
            let idx = *reads;
            *reads += 1;
            idx
        };
        if read_idx == self.trigger_at {
            if let Some(hook) = self.hook.lock().expect("hook lock").take() {
                hook();
            }
        }
        self.inner.read(target, partitions, cursor)
    }
}

/// Client wrapper that fails the n-th read with a scripted error.
pub struct FaultClient {
    inner: Arc<dyn IndexFetchClient>,
    fail_at: usize,
    reads: Mutex<usize>,
    fault: Mutex<Option<ScanError>>,
}

impl FaultClient {
    pub fn new(inner: Arc<dyn IndexFetchClient>, fail_at: usize, fault: ScanError) -> Self {
        Self {
            inner,
            fail_at,
            reads: Mutex::new(0),
            fault: Mutex::new(Some(fault)),
        }
    }
}

impl IndexFetchClient for FaultClient {
    fn read(&self, target: MemberId, partitions: &PartitionSet, cursor: &IndexCursor) -> FetchHandle {
        let read_idx = {
            let mut reads = self.reads.lock().expect("reads lock");
            let idx = *reads;
            *reads += 1;
            idx
        };
        if read_idx == self.fail_at {
            if let Some(fault) = self.fault.lock().expect("fault lock").take() {
                return FetchHandle::ready(Err(fault));
            }
        }
        self.inner.read(target, partitions, cursor)
    }
}
