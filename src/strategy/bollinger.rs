//! Bollinger Bands Strategy
//!
//! Buys when the close touches or breaks the lower band and sells when it
//! touches or breaks the upper band.

use crate::config::decimal_setting;
use crate::data::candles::{closes, Candle};
use crate::strategy::base::{warm_up_hold, Signal, SignalLatch, SignalType, Strategy};
use crate::strategy::indicators::bollinger_bands;
use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the Bollinger Bands strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerConfig {
    pub period: usize,
    pub num_std_devs: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            period: 20,
            num_std_devs: 2.0,
        }
    }
}

pub struct BollingerStrategy {
    config: BollingerConfig,
    multiplier: Decimal,
    latch: SignalLatch,
}

impl BollingerStrategy {
    pub fn new(config: BollingerConfig) -> Result<Self> {
        let multiplier = decimal_setting("bollinger.num_std_devs", config.num_std_devs)?;
        Ok(Self {
            config,
            multiplier,
            latch: SignalLatch::default(),
        })
    }

    /// (lower, middle, upper) for the current window
    pub fn bands(&self, window: &[Candle]) -> Option<(Decimal, Decimal, Decimal)> {
        bollinger_bands(&closes(window), self.config.period, self.multiplier)
    }

    /// Ten times the relative distance past the band, capped at 0.9
    fn breach_confidence(distance: Decimal, band: Decimal) -> f64 {
        if band.is_zero() {
            return 0.0;
        }
        let scaled = distance / band * dec!(10);
        scaled.min(dec!(0.9)).max(Decimal::ZERO).to_f64().unwrap_or(0.0)
    }
}

impl Strategy for BollingerStrategy {
    fn analyze(&mut self, window: &[Candle]) -> Signal {
        if let Some(hold) = warm_up_hold(window, self.min_lookback()) {
            return hold;
        }

        let last = &window[window.len() - 1];
        let Some((lower, middle, upper)) = self.bands(window) else {
            return Signal::hold(last);
        };

        let close = last.close;
        let (signal_type, confidence) = if close <= lower {
            (SignalType::Buy, Self::breach_confidence(lower - close, lower))
        } else if close >= upper {
            (SignalType::Sell, Self::breach_confidence(close - upper, upper))
        } else {
            (SignalType::Hold, 0.0)
        };

        let signal = if self.latch.allows(signal_type) {
            debug!(
                "Bollinger {}: close {} outside [{}, {}] (confidence {:.2})",
                signal_type, close, lower, upper, confidence
            );
            self.latch.record(signal_type);
            Signal::new(signal_type, last, confidence)
        } else {
            Signal::hold(last)
        };

        signal
            .with_meta("lower_band", lower.to_f64())
            .with_meta("middle_band", middle.to_f64())
            .with_meta("upper_band", upper.to_f64())
    }

    fn min_lookback(&self) -> usize {
        self.config.period
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn name(&self) -> &str {
        "BollingerBands"
    }

    fn reset(&mut self) {
        self.latch.reset();
    }
}
