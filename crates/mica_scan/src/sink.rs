//! Downstream row sinks.

use tokio::sync::mpsc;

use mica_core::Row;

/// Non-blocking downstream consumer.
pub trait RowSink {
    /// Offer one row; on backpressure the row is handed back unchanged.
    fn try_emit(&mut self, row: Row) -> Result<(), Row>;
}

/// Unbounded in-memory sink, mostly for tests and local collection.
#[derive(Debug, Default)]
pub struct VecSink {
    rows: Vec<Row>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl RowSink for VecSink {
    fn try_emit(&mut self, row: Row) -> Result<(), Row> {
        self.rows.push(row);
        Ok(())
    }
}

/// Adapter over a bounded channel; a full (or closed) channel reads as
/// backpressure and the driver retries after the consumer drains.
pub struct ChannelSink {
    tx: mpsc::Sender<Row>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Row>) -> Self {
        Self { tx }
    }
}

impl RowSink for ChannelSink {
    fn try_emit(&mut self, row: Row) -> Result<(), Row> {
        match self.tx.try_send(row) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(row)) => Err(row),
            Err(mpsc::error::TrySendError::Closed(row)) => Err(row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mica_core::Value;

    fn row(key: i64) -> Row {
        Row::new(vec![Value::Int(key)])
    }

    #[test]
    fn channel_sink_hands_back_rows_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut sink = ChannelSink::new(tx);

        assert!(sink.try_emit(row(1)).is_ok());
        let rejected = sink.try_emit(row(2)).expect_err("channel is full");
        assert_eq!(rejected, row(2));

        assert_eq!(rx.try_recv().expect("first row delivered"), row(1));
        assert!(sink.try_emit(row(2)).is_ok());
    }
}
