//! Migration-tolerant parallel index-scan executor.
//!
//! A scan is driven cooperatively: the owner of a `ScanExecutor` calls
//! `pump()` whenever downstream capacity or fetch completion is signalled,
//! and the executor performs as much work as both allow before returning
//! `Done` or `Blocked`. Parallelism comes from the set of in-flight splits,
//! each fetching batches from one member for one partition subset; partition
//! migrations are recovered locally by regrouping a failed split's
//! partitions along the new ownership boundary.

pub mod config;
pub mod executor;
pub mod fetch;
pub mod local;
pub mod oracle;
pub mod shaper;
pub mod sink;
pub mod split;

pub use config::ScanConfig;
pub use executor::{PumpStatus, ScanExecutor, ScanParams, ScanStats};
pub use fetch::{FetchHandle, IndexBatch, IndexFetchClient};
pub use local::{ClusterView, LocalIndexClient};
pub use oracle::PartitionOracle;
pub use shaper::RowShaper;
pub use sink::{ChannelSink, RowSink, VecSink};
pub use split::Split;
