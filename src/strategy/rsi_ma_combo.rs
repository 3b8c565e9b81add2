//! RSI + Moving Average Combo Strategy
//!
//! Combines RSI threshold crossings with a short/long SMA crossover. Each
//! side is a three-rung ladder evaluated top to bottom; the first rung that
//! matches decides the confidence.

use crate::config::decimal_setting;
use crate::data::candles::{closes, Candle};
use crate::strategy::base::{warm_up_hold, Signal, SignalLatch, SignalType, Strategy};
use crate::strategy::indicators::{crossed_above, crossed_below, rsi, sma};
use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the RSI + MA combo strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiMaComboConfig {
    pub rsi_period: usize,
    pub oversold_level: f64,
    pub overbought_level: f64,
    pub ma_short: usize,
    pub ma_long: usize,
}

impl Default for RsiMaComboConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            oversold_level: 30.0,
            overbought_level: 70.0,
            ma_short: 10,
            ma_long: 30,
        }
    }
}

/// Indicator values for the current and previous candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComboReading {
    pub rsi: Decimal,
    pub prev_rsi: Decimal,
    pub short_ma: Decimal,
    pub long_ma: Decimal,
    pub prev_short_ma: Decimal,
    pub prev_long_ma: Decimal,
}

impl ComboReading {
    /// Percent distance of the short MA above the long MA
    pub fn trend_strength(&self) -> Decimal {
        if self.long_ma.is_zero() {
            return Decimal::ZERO;
        }
        (self.short_ma - self.long_ma) / self.long_ma * dec!(100)
    }

    fn ma_upcross(&self) -> bool {
        crossed_above(self.prev_short_ma, self.short_ma, self.prev_long_ma, self.long_ma)
    }

    fn ma_downcross(&self) -> bool {
        crossed_below(self.prev_short_ma, self.short_ma, self.prev_long_ma, self.long_ma)
    }
}

pub struct RsiMaComboStrategy {
    config: RsiMaComboConfig,
    oversold: Decimal,
    overbought: Decimal,
    latch: SignalLatch,
}

impl RsiMaComboStrategy {
    const TREND_THRESHOLD: Decimal = dec!(0.1);
    const BUY_RSI_CEILING: Decimal = dec!(60);
    const SELL_RSI_FLOOR: Decimal = dec!(40);

    pub fn new(config: RsiMaComboConfig) -> Result<Self> {
        let oversold = decimal_setting("rsi_ma.oversold_level", config.oversold_level)?;
        let overbought = decimal_setting("rsi_ma.overbought_level", config.overbought_level)?;

        Ok(Self {
            config,
            oversold,
            overbought,
            latch: SignalLatch::default(),
        })
    }

    pub fn reading(&self, window: &[Candle]) -> Option<ComboReading> {
        let prices = closes(window);
        if prices.len() < 2 {
            return None;
        }
        let previous = &prices[..prices.len() - 1];

        Some(ComboReading {
            rsi: rsi(&prices, self.config.rsi_period)?,
            prev_rsi: rsi(previous, self.config.rsi_period)?,
            short_ma: sma(&prices, self.config.ma_short)?,
            long_ma: sma(&prices, self.config.ma_long)?,
            prev_short_ma: sma(previous, self.config.ma_short)?,
            prev_long_ma: sma(previous, self.config.ma_long)?,
        })
    }

    fn buy_rung(&self, reading: &ComboReading) -> Option<f64> {
        let recovery = reading.prev_rsi <= self.oversold && reading.rsi > self.oversold;
        let upcross = reading.ma_upcross();

        if recovery && upcross {
            Some(0.9)
        } else if recovery && reading.trend_strength() > Self::TREND_THRESHOLD {
            Some(0.7)
        } else if upcross && reading.rsi < Self::BUY_RSI_CEILING {
            Some(0.5)
        } else {
            None
        }
    }

    fn sell_rung(&self, reading: &ComboReading) -> Option<f64> {
        let decline = reading.prev_rsi >= self.overbought && reading.rsi < self.overbought;
        let downcross = reading.ma_downcross();

        if decline && downcross {
            Some(0.9)
        } else if decline && reading.trend_strength() < -Self::TREND_THRESHOLD {
            Some(0.7)
        } else if downcross && reading.rsi > Self::SELL_RSI_FLOOR {
            Some(0.5)
        } else {
            None
        }
    }
}

impl Strategy for RsiMaComboStrategy {
    fn analyze(&mut self, window: &[Candle]) -> Signal {
        if let Some(hold) = warm_up_hold(window, self.min_lookback()) {
            return hold;
        }

        let last = &window[window.len() - 1];
        let Some(reading) = self.reading(window) else {
            return Signal::hold(last);
        };

        let (signal_type, confidence) = if let Some(confidence) = self.buy_rung(&reading) {
            (SignalType::Buy, confidence)
        } else if let Some(confidence) = self.sell_rung(&reading) {
            (SignalType::Sell, confidence)
        } else {
            (SignalType::Hold, 0.0)
        };

        let signal = if self.latch.allows(signal_type) {
            debug!(
                "RSI+MA {}: rsi {} -> {}, trend {}% (confidence {:.1})",
                signal_type,
                reading.prev_rsi,
                reading.rsi,
                reading.trend_strength().round_dp(4),
                confidence
            );
            self.latch.record(signal_type);
            Signal::new(signal_type, last, confidence)
        } else {
            Signal::hold(last)
        };

        signal
            .with_meta("rsi", reading.rsi.to_f64())
            .with_meta("trend_strength", reading.trend_strength().to_f64())
    }

    fn min_lookback(&self) -> usize {
        self.config.ma_long.max(self.config.rsi_period + 1) + 1
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn name(&self) -> &str {
        "RSI_MA_Combo"
    }

    fn reset(&mut self) {
        self.latch.reset();
    }
}
