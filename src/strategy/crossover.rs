//! Moving Average Crossover Strategy
//!
//! Buys when the short SMA crosses above the long SMA (golden cross).
//! Sells when the short SMA crosses below the long SMA (death cross).

use crate::data::candles::{closes, Candle};
use crate::strategy::base::{warm_up_hold, Signal, SignalLatch, SignalType, Strategy};
use crate::strategy::indicators::{crossed_above, crossed_below, sma};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the crossover strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    pub short_period: usize,
    pub long_period: usize,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            short_period: 5,
            long_period: 20,
        }
    }
}

pub struct CrossoverStrategy {
    config: CrossoverConfig,
    latch: SignalLatch,
}

impl CrossoverStrategy {
    pub fn new(config: CrossoverConfig) -> Self {
        Self {
            config,
            latch: SignalLatch::default(),
        }
    }

    /// Short and long SMA of `prices`
    fn averages(&self, prices: &[Decimal]) -> Option<(Decimal, Decimal)> {
        let short = sma(prices, self.config.short_period)?;
        let long = sma(prices, self.config.long_period)?;
        Some((short, long))
    }

    fn confidence(short: Decimal, long: Decimal) -> f64 {
        if long.is_zero() {
            return 0.5;
        }
        let spread = ((short - long) / long).abs() * dec!(50);
        spread.to_f64().unwrap_or(0.0).clamp(0.5, 0.9)
    }
}

impl Strategy for CrossoverStrategy {
    fn analyze(&mut self, window: &[Candle]) -> Signal {
        if let Some(hold) = warm_up_hold(window, self.min_lookback()) {
            return hold;
        }

        let last = &window[window.len() - 1];
        let prices = closes(window);

        let Some((short, long)) = self.averages(&prices) else {
            return Signal::hold(last);
        };
        // No earlier pair on the first full window: treat the averages as
        // level there, so a trend already underway counts as a cross.
        let (prev_short, prev_long) = self
            .averages(&prices[..prices.len() - 1])
            .unwrap_or((long, long));

        let signal_type = if crossed_above(prev_short, short, prev_long, long) {
            SignalType::Buy
        } else if crossed_below(prev_short, short, prev_long, long) {
            SignalType::Sell
        } else {
            SignalType::Hold
        };

        if !self.latch.allows(signal_type) {
            return Signal::hold(last)
                .with_meta("short_sma", short.to_f64())
                .with_meta("long_sma", long.to_f64());
        }

        let confidence = Self::confidence(short, long);
        debug!(
            "Crossover {}: short SMA {} vs long SMA {} at {} (confidence {:.2})",
            signal_type, short, long, last.close, confidence
        );
        self.latch.record(signal_type);

        Signal::new(signal_type, last, confidence)
            .with_meta("short_sma", short.to_f64())
            .with_meta("long_sma", long.to_f64())
    }

    fn min_lookback(&self) -> usize {
        self.config.long_period
    }

    fn long_period(&self) -> Option<usize> {
        Some(self.config.long_period)
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn name(&self) -> &str {
        "Crossover"
    }

    fn reset(&mut self) {
        self.latch.reset();
    }
}
