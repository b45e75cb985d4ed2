//! Signals derived from raw agent log lines.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Version of the log-line marker conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerProtocol {
    /// `📈 PROFIT: <amount> ETH` and the `HEARTBEAT` sentinel.
    #[default]
    V1,
}

impl MarkerProtocol {
    pub fn profit_marker(self) -> &'static str {
        match self {
            Self::V1 => "📈 PROFIT: ",
        }
    }

    pub fn profit_suffix(self) -> &'static str {
        match self {
            Self::V1 => " ETH",
        }
    }

    pub fn decision_sentinel(self) -> &'static str {
        match self {
            Self::V1 => "HEARTBEAT",
        }
    }

    /// Snapshot length that must be exceeded before the sentinel counts.
    pub fn decision_min_lines(self) -> usize {
        match self {
            Self::V1 => 5,
        }
    }
}

/// Values computed from one log snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogSignals {
    pub cumulative_profit: Decimal,
    pub decision_required: bool,
}

/// Turns a log snapshot into signals.
pub trait LogSignalParser: Send + Sync {
    fn protocol(&self) -> MarkerProtocol;

    fn signals(&self, lines: &[String]) -> LogSignals;
}

/// Substring-marker parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerParser {
    protocol: MarkerProtocol,
}

impl MarkerParser {
    pub fn new(protocol: MarkerProtocol) -> Self {
        Self { protocol }
    }

    /// Amount on a single line, or `None` when the line has no profit marker.
    /// A marker followed by an unreadable amount counts as zero.
    pub fn profit_amount(&self, line: &str) -> Option<Decimal> {
        let marker = self.protocol.profit_marker();
        let start = line.find(marker)? + marker.len();
        let rest = &line[start..];
        let raw = match rest.find(self.protocol.profit_suffix()) {
            Some(end) => &rest[..end],
            None => rest,
        };
        Some(parse_amount(raw.trim()).unwrap_or(Decimal::ZERO))
    }
}

impl LogSignalParser for MarkerParser {
    fn protocol(&self) -> MarkerProtocol {
        self.protocol
    }

    fn signals(&self, lines: &[String]) -> LogSignals {
        let cumulative_profit = lines
            .iter()
            .filter_map(|line| self.profit_amount(line))
            .fold(Decimal::ZERO, |acc, amount| {
                acc.checked_add(amount).unwrap_or(acc)
            });

        let sentinel = self.protocol.decision_sentinel();
        let decision_required = lines.len() > self.protocol.decision_min_lines()
            && lines.iter().any(|line| line.contains(sentinel));

        LogSignals {
            cumulative_profit,
            decision_required,
        }
    }
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn sums_profit_markers() {
        let parser = MarkerParser::default();
        let signals = parser.signals(&lines(&[
            "📈 PROFIT: 0.001 ETH",
            "📈 PROFIT: 0.002 ETH",
            "no marker",
        ]));
        assert_eq!(signals.cumulative_profit, dec!(0.003));
        assert!(!signals.decision_required);
    }

    #[test]
    fn marker_may_appear_mid_line() {
        let parser = MarkerParser::default();
        assert_eq!(
            parser.profit_amount("[12:00:01] A-01 📈 PROFIT: 1.5 ETH (arb)"),
            Some(dec!(1.5))
        );
        assert_eq!(parser.profit_amount("📈 PROFIT: 2"), Some(dec!(2)));
        assert_eq!(parser.profit_amount("📈 PROFIT: 1e-3 ETH"), Some(dec!(0.001)));
    }

    #[test]
    fn unparsable_amount_counts_as_zero() {
        let parser = MarkerParser::default();
        let signals = parser.signals(&lines(&["📈 PROFIT: lots ETH", "📈 PROFIT: 0.5 ETH"]));
        assert_eq!(signals.cumulative_profit, dec!(0.5));
    }

    #[test]
    fn decision_needs_more_than_five_lines() {
        let parser = MarkerParser::default();

        let six = lines(&["a", "b", "c", "d", "e", "HEARTBEAT check-in"]);
        assert!(parser.signals(&six).decision_required);

        let four = lines(&["a", "b", "c", "HEARTBEAT"]);
        assert!(!parser.signals(&four).decision_required);

        let five = lines(&["a", "b", "c", "d", "HEARTBEAT"]);
        assert!(!parser.signals(&five).decision_required);

        let no_sentinel = lines(&["a", "b", "c", "d", "e", "f"]);
        assert!(!parser.signals(&no_sentinel).decision_required);
    }

    #[test]
    fn empty_snapshot_has_no_signals() {
        assert_eq!(MarkerParser::default().signals(&[]), LogSignals::default());
    }
}
