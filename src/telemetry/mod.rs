//! Agent log telemetry: polling, parsing, and the derived snapshot.

mod parser;
mod poller;

use rust_decimal::Decimal;
use serde::Serialize;

pub use self::parser::{LogSignalParser, LogSignals, MarkerParser, MarkerProtocol};
pub use self::poller::{LogPoller, PollOutcome};

/// Latest log snapshot and what was derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivedTelemetry {
    pub logs: Vec<String>,
    pub cumulative_profit: Decimal,
    pub decision_pending: bool,
}

impl DerivedTelemetry {
    /// The last `n` lines, oldest first.
    pub fn recent(&self, n: usize) -> &[String] {
        let start = self.logs.len().saturating_sub(n);
        &self.logs[start..]
    }
}
