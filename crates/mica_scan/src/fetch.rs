//! Index fetch capability and non-blocking completion handles.
//!
//! The executor consumes exactly one capability: ask a member for the next
//! batch of a traversal. Responses resolve through `FetchHandle`, which the
//! split polls without blocking; all waiting is externalized to the driver.

use tokio::sync::oneshot;

use mica_core::{IndexCursor, IndexEntry, MemberId, PartitionSet, ScanError};

/// One fetch response: entries in index order plus the narrowed resume
/// cursor. A non-terminal cursor is always accompanied by a non-empty batch.
#[derive(Clone, Debug)]
pub struct IndexBatch {
    pub entries: Vec<IndexEntry>,
    pub cursor: IndexCursor,
}

/// Non-blocking handle to an in-flight fetch.
///
/// Dropping the handle abandons the fetch; the sending side observes a
/// closed channel and the response is discarded.
pub struct FetchHandle {
    rx: oneshot::Receiver<Result<IndexBatch, ScanError>>,
}

impl FetchHandle {
    pub fn from_receiver(rx: oneshot::Receiver<Result<IndexBatch, ScanError>>) -> Self {
        Self { rx }
    }

    /// Handle resolved before it is returned, for synchronous readers.
    pub fn ready(result: Result<IndexBatch, ScanError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Poll the handle: `None` while the fetch is still in flight.
    pub fn try_take(&mut self) -> Option<Result<IndexBatch, ScanError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            // Sender dropped without responding: the fetch was torn down.
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(ScanError::Cancelled)),
        }
    }
}

/// Capability to read index batches from a member.
pub trait IndexFetchClient: Send + Sync {
    /// Start one asynchronous fetch against `target` for the given partition
    /// subset and resume cursor. Must not block.
    fn read(&self, target: MemberId, partitions: &PartitionSet, cursor: &IndexCursor) -> FetchHandle;
}
