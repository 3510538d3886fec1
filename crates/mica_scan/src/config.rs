//! Scan executor configuration.

use serde::Deserialize;

const DEFAULT_FETCH_SIZE: usize = 128;
const DEFAULT_PUMP_ROW_BUDGET: usize = 1_024;

/// Batch size hint honored by fetch clients, overridable via environment.
pub(crate) fn configured_fetch_size() -> usize {
    std::env::var("MICA_SCAN_FETCH_SIZE")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_FETCH_SIZE)
}

fn configured_pump_row_budget() -> usize {
    std::env::var("MICA_SCAN_PUMP_ROW_BUDGET")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_PUMP_ROW_BUDGET)
}

/// Tunables for one scan invocation.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ScanConfig {
    /// Maximum entries requested per index fetch.
    #[serde(default = "configured_fetch_size")]
    pub fetch_size: usize,
    /// Maximum rows emitted per `pump()` activation, so one hot split cannot
    /// starve the cooperative scheduler.
    #[serde(default = "configured_pump_row_budget")]
    pub pump_row_budget: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fetch_size: configured_fetch_size(),
            pump_row_budget: configured_pump_row_budget(),
        }
    }
}
