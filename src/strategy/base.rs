//! Strategy contract shared by every signal generator

use crate::data::Candle;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl SignalType {
    pub fn opposite(self) -> Self {
        match self {
            SignalType::Buy => SignalType::Sell,
            SignalType::Sell => SignalType::Buy,
            SignalType::Hold => SignalType::Hold,
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
            SignalType::Hold => write!(f, "HOLD"),
        }
    }
}

/// A recommendation produced by one `analyze` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Always within [0, 1]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Signal {
    pub fn new(signal_type: SignalType, candle: &Candle, confidence: f64) -> Self {
        Self {
            signal_type,
            price: candle.close,
            timestamp: candle.timestamp,
            confidence: confidence.clamp(0.0, 1.0),
            metadata: BTreeMap::new(),
        }
    }

    pub fn hold(candle: &Candle) -> Self {
        Self::new(SignalType::Hold, candle, 0.0)
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_hold(&self) -> bool {
        self.signal_type == SignalType::Hold
    }
}

/// Suppresses a BUY after a BUY (or SELL after SELL) until the opposite
/// side fires. HOLD never latches.
#[derive(Debug, Clone, Default)]
pub struct SignalLatch {
    last: Option<SignalType>,
}

impl SignalLatch {
    pub fn allows(&self, signal_type: SignalType) -> bool {
        signal_type != SignalType::Hold && self.last != Some(signal_type)
    }

    pub fn record(&mut self, signal_type: SignalType) {
        if signal_type != SignalType::Hold {
            self.last = Some(signal_type);
        }
    }

    pub fn last(&self) -> Option<SignalType> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

pub trait Strategy: Send {
    /// Analyze a window of candles ending "now" and produce a signal.
    ///
    /// Successive calls on one instance must pass windows that only grow.
    fn analyze(&mut self, window: &[Candle]) -> Signal;

    /// Minimum window length before any indicator math runs
    fn min_lookback(&self) -> usize;

    /// The strategy's long moving-average period, if it declares one.
    /// The backtester starts its replay at this index.
    fn long_period(&self) -> Option<usize> {
        None
    }

    /// Parameters as a JSON object, for reports
    fn parameters(&self) -> serde_json::Value;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Reset strategy state
    fn reset(&mut self);
}

/// Common warm-up guard: `None` when the window is long enough to analyze.
/// Callers may index the last candle once this returns `None`.
pub(crate) fn warm_up_hold(window: &[Candle], min_lookback: usize) -> Option<Signal> {
    if window.len() >= min_lookback.max(1) {
        return None;
    }

    let signal = match window.last() {
        Some(last) => Signal::hold(last),
        None => Signal {
            signal_type: SignalType::Hold,
            price: Decimal::ZERO,
            timestamp: DateTime::<Utc>::default(),
            confidence: 0.0,
            metadata: BTreeMap::new(),
        },
    };
    Some(signal.with_meta("reason", "warm_up"))
}
