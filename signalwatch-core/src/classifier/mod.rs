//! Signal classifier: turns one symbol's candle history into BUY or WAIT.
//!
//! The classifier holds an ordered list of [`SignalRule`]s. Rules are tried in
//! order and the first match wins, so a symbol gets at most one subtype per
//! evaluation. A matched rule whose levels break the long-only invariants is
//! reported as WAIT rather than producing an unusable signal.

pub mod compliance;
pub mod features;
pub mod rules;

pub use features::Features;
pub use rules::{
    standard_rules, Levels, MomentumBreakoutRule, PrimoRule, SignalRule, WhaleEntryRule,
};

use crate::domain::{Action, Candle, Signal, SignalId, SignalStatus, Trend};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Diagnostics for a symbol that produced no signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitReport {
    pub symbol: String,
    pub price: f64,
    pub rsi: f64,
    pub trend: Trend,
}

/// Result of classifying one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Buy(Box<Signal>),
    Wait(WaitReport),
}

impl Classification {
    pub fn action(&self) -> Action {
        match self {
            Self::Buy(_) => Action::Buy,
            Self::Wait(_) => Action::Wait,
        }
    }

    pub fn into_signal(self) -> Option<Signal> {
        match self {
            Self::Buy(signal) => Some(*signal),
            Self::Wait(_) => None,
        }
    }
}

/// Ordered, first-match-wins rule evaluator.
pub struct Classifier {
    rules: Vec<Box<dyn SignalRule>>,
}

impl Classifier {
    pub fn new(rules: Vec<Box<dyn SignalRule>>) -> Self {
        Self { rules }
    }

    /// Primo, then whale entry, then momentum breakout.
    pub fn standard() -> Self {
        Self::new(standard_rules())
    }

    pub fn rules(&self) -> &[Box<dyn SignalRule>] {
        &self.rules
    }

    /// Classify `symbol` from its candles (oldest first) at `price`.
    ///
    /// A BUY carries a fresh signal in status ACTIVE created at `created_at`.
    pub fn classify(
        &self,
        symbol: &str,
        candles: &[Candle],
        price: f64,
        change_24h: f64,
        created_at: DateTime<Utc>,
    ) -> Classification {
        let Some(features) = Features::compute(candles, price) else {
            return Classification::Wait(WaitReport {
                symbol: symbol.to_string(),
                price,
                rsi: 50.0,
                trend: Trend::Neutral,
            });
        };

        let wait = |features: &Features| {
            Classification::Wait(WaitReport {
                symbol: symbol.to_string(),
                price,
                rsi: features.rsi,
                trend: features.trend(),
            })
        };

        let Some(rule) = self.rules.iter().find(|rule| rule.matches(&features)) else {
            return wait(&features);
        };

        let levels = rule.levels(&features);
        let signal = Signal {
            id: SignalId::new(symbol, created_at),
            kind: rule.kind(),
            entry_price: price,
            current_price: price,
            tps: levels.tps,
            sl: levels.sl,
            rsi: features.rsi,
            ema20: features.ema20,
            trend: features.trend(),
            change_24h,
            volume: features.latest_volume,
            compliance: compliance::lookup(symbol),
            status: SignalStatus::Active,
            created_at,
            hit_at: None,
            message_id: None,
        };

        if !signal.has_valid_levels() {
            debug!(
                symbol,
                kind = rule.kind().label(),
                tps = ?levels.tps,
                sl = levels.sl,
                "rule matched with invalid levels, treating as WAIT"
            );
            return wait(&features);
        }

        debug!(symbol, kind = rule.kind().label(), price, "rule matched");
        Classification::Buy(Box::new(signal))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field(
                "rules",
                &self.rules.iter().map(|r| r.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalKind;
    use crate::indicators::make_candles;
    use chrono::TimeZone;

    struct Always(SignalKind, Levels);

    impl SignalRule for Always {
        fn kind(&self) -> SignalKind {
            self.0
        }
        fn matches(&self, _: &Features) -> bool {
            true
        }
        fn levels(&self, _: &Features) -> Levels {
            self.1
        }
    }

    struct Never;

    impl SignalRule for Never {
        fn kind(&self) -> SignalKind {
            SignalKind::Primo
        }
        fn matches(&self, _: &Features) -> bool {
            false
        }
        fn levels(&self, _: &Features) -> Levels {
            unreachable!("never matches")
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn good_levels() -> Levels {
        Levels {
            tps: [11.0, 12.0, 13.0],
            sl: 9.0,
        }
    }

    #[test]
    fn first_match_wins() {
        let classifier = Classifier::new(vec![
            Box::new(Never),
            Box::new(Always(SignalKind::MomentumBreakout, good_levels())),
            Box::new(Always(SignalKind::WhaleEntry, good_levels())),
        ]);
        let candles = make_candles(&[10.0; 5]);
        let signal = classifier
            .classify("SOLUSDT", &candles, 10.0, 0.0, now())
            .into_signal()
            .unwrap();
        assert_eq!(signal.kind, SignalKind::MomentumBreakout);
        assert_eq!(signal.status, SignalStatus::Active);
        assert_eq!(signal.hit_at, None);
        assert_eq!(signal.id, SignalId::new("SOLUSDT", now()));
        assert!(signal.compliance.is_compliant());
    }

    #[test]
    fn invalid_levels_become_wait() {
        let bad = Levels {
            tps: [11.0, 10.5, 13.0],
            sl: 9.0,
        };
        let classifier = Classifier::new(vec![Box::new(Always(SignalKind::Primo, bad))]);
        let candles = make_candles(&[10.0; 5]);
        let result = classifier.classify("SOLUSDT", &candles, 10.0, 0.0, now());
        assert_eq!(result.action(), Action::Wait);
    }

    #[test]
    fn empty_candles_wait() {
        let result = Classifier::standard().classify("SOLUSDT", &[], 10.0, 0.0, now());
        assert_eq!(result.action(), Action::Wait);
    }

    #[test]
    fn debug_lists_rule_kinds() {
        let rendered = format!("{:?}", Classifier::standard());
        assert!(rendered.contains("Primo"));
        assert!(rendered.contains("MomentumBreakout"));
    }
}
