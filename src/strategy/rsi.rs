//! RSI Strategy
//!
//! Uses Relative Strength Index to identify overbought/oversold conditions.
//! Buys when RSI climbs back above the oversold level, sells when it falls
//! back below the overbought level.

use crate::config::decimal_setting;
use crate::data::candles::{closes, Candle};
use crate::strategy::base::{warm_up_hold, Signal, SignalLatch, SignalType, Strategy};
use crate::strategy::indicators::rsi;
use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for RSI strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RSIConfig {
    pub rsi_period: usize,
    pub oversold_level: f64,
    pub overbought_level: f64,
}

impl Default for RSIConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            oversold_level: 30.0,
            overbought_level: 70.0,
        }
    }
}

pub struct RSIStrategy {
    config: RSIConfig,
    oversold: Decimal,
    overbought: Decimal,
    latch: SignalLatch,
}

impl RSIStrategy {
    pub fn new(config: RSIConfig) -> Result<Self> {
        let oversold = decimal_setting("rsi.oversold_level", config.oversold_level)?;
        let overbought = decimal_setting("rsi.overbought_level", config.overbought_level)?;

        Ok(Self {
            config,
            oversold,
            overbought,
            latch: SignalLatch::default(),
        })
    }

    /// Current RSI of a window, if enough history is available
    pub fn current_rsi(&self, window: &[Candle]) -> Option<Decimal> {
        rsi(&closes(window), self.config.rsi_period)
    }

    /// 0.5 plus one tenth for every two RSI points the prior reading sat
    /// beyond the threshold, capped at 0.9
    fn depth_confidence(depth: Decimal) -> f64 {
        let scaled = dec!(0.5) + depth.max(Decimal::ZERO) / dec!(20);
        scaled.min(dec!(0.9)).to_f64().unwrap_or(0.5)
    }
}

impl Strategy for RSIStrategy {
    fn analyze(&mut self, window: &[Candle]) -> Signal {
        if let Some(hold) = warm_up_hold(window, self.min_lookback()) {
            return hold;
        }

        let last = &window[window.len() - 1];
        let prices = closes(window);
        let period = self.config.rsi_period;

        let (Some(current), Some(previous)) =
            (rsi(&prices, period), rsi(&prices[..prices.len() - 1], period))
        else {
            return Signal::hold(last);
        };

        let (signal_type, confidence) = if previous <= self.oversold && current > self.oversold {
            (SignalType::Buy, Self::depth_confidence(self.oversold - previous))
        } else if previous >= self.overbought && current < self.overbought {
            (SignalType::Sell, Self::depth_confidence(previous - self.overbought))
        } else {
            (SignalType::Hold, 0.0)
        };

        if !self.latch.allows(signal_type) {
            return Signal::hold(last).with_meta("rsi", current.to_f64());
        }

        debug!(
            "RSI {}: {} -> {} (oversold {}, overbought {})",
            signal_type, previous, current, self.oversold, self.overbought
        );
        self.latch.record(signal_type);

        Signal::new(signal_type, last, confidence)
            .with_meta("rsi", current.to_f64())
            .with_meta("prev_rsi", previous.to_f64())
    }

    fn min_lookback(&self) -> usize {
        // period changes now, plus the reading one candle earlier
        self.config.rsi_period + 2
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn name(&self) -> &str {
        "RSI"
    }

    fn reset(&mut self) {
        self.latch.reset();
    }
}
