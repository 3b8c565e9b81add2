//! MACD Strategy
//!
//! Trades crossovers between the MACD line (fast EMA - slow EMA) and its
//! signal line, the simple average of the last `signal_period` MACD values.

use crate::data::candles::{closes, Candle};
use crate::strategy::base::{warm_up_hold, Signal, SignalLatch, SignalType, Strategy};
use crate::strategy::indicators::{crossed_above, crossed_below, ema_series};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the MACD strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MACDConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl Default for MACDConfig {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

/// MACD line and signal line, now and one candle earlier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MACDReading {
    pub macd: Decimal,
    pub signal: Decimal,
    pub prev_macd: Decimal,
    pub prev_signal: Decimal,
}

impl MACDReading {
    pub fn histogram(&self) -> Decimal {
        self.macd - self.signal
    }
}

pub struct MACDStrategy {
    config: MACDConfig,
    latch: SignalLatch,
}

impl MACDStrategy {
    pub fn new(config: MACDConfig) -> Self {
        Self {
            config,
            latch: SignalLatch::default(),
        }
    }

    /// MACD value after every prefix of `prices`
    fn macd_series(&self, prices: &[Decimal]) -> Vec<Option<Decimal>> {
        let fast = ema_series(prices, self.config.fast_period);
        let slow = ema_series(prices, self.config.slow_period);

        fast.into_iter()
            .zip(slow)
            .map(|(f, s)| Some(f? - s?))
            .collect()
    }

    fn average(values: &[Option<Decimal>]) -> Option<Decimal> {
        if values.is_empty() {
            return None;
        }
        let mut sum = Decimal::ZERO;
        for value in values {
            sum += (*value)?;
        }
        Some(sum / Decimal::from(values.len()))
    }

    pub fn reading(&self, window: &[Candle]) -> Option<MACDReading> {
        let signal_period = self.config.signal_period;
        let series = self.macd_series(&closes(window));
        let n = series.len();
        if signal_period == 0 || n < signal_period + 1 {
            return None;
        }

        Some(MACDReading {
            macd: series[n - 1]?,
            signal: Self::average(&series[n - signal_period..])?,
            prev_macd: series[n - 2]?,
            prev_signal: Self::average(&series[n - 1 - signal_period..n - 1])?,
        })
    }

    /// 0.8 when the MACD is on the trade's side of zero, 0.6 when only the
    /// histogram is, 0.4 otherwise
    fn tiered_confidence(signal_type: SignalType, reading: &MACDReading) -> f64 {
        let (macd, histogram) = match signal_type {
            SignalType::Buy => (reading.macd, reading.histogram()),
            SignalType::Sell => (-reading.macd, -reading.histogram()),
            SignalType::Hold => return 0.0,
        };

        if macd > Decimal::ZERO {
            0.8
        } else if histogram > Decimal::ZERO {
            0.6
        } else {
            0.4
        }
    }
}

impl Strategy for MACDStrategy {
    fn analyze(&mut self, window: &[Candle]) -> Signal {
        if let Some(hold) = warm_up_hold(window, self.min_lookback()) {
            return hold;
        }

        let last = &window[window.len() - 1];
        let Some(reading) = self.reading(window) else {
            return Signal::hold(last);
        };

        let signal_type = if crossed_above(reading.prev_macd, reading.macd, reading.prev_signal, reading.signal) {
            SignalType::Buy
        } else if crossed_below(reading.prev_macd, reading.macd, reading.prev_signal, reading.signal) {
            SignalType::Sell
        } else {
            SignalType::Hold
        };

        let signal = if self.latch.allows(signal_type) {
            let confidence = Self::tiered_confidence(signal_type, &reading);
            debug!(
                "MACD {}: macd {} signal {} histogram {}",
                signal_type,
                reading.macd,
                reading.signal,
                reading.histogram()
            );
            self.latch.record(signal_type);
            Signal::new(signal_type, last, confidence)
        } else {
            Signal::hold(last)
        };

        signal
            .with_meta("macd", reading.macd.to_f64())
            .with_meta("signal_line", reading.signal.to_f64())
            .with_meta("histogram", reading.histogram().to_f64())
    }

    fn min_lookback(&self) -> usize {
        self.config.slow_period + self.config.signal_period + 5
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn name(&self) -> &str {
        "MACD"
    }

    fn reset(&mut self) {
        self.latch.reset();
    }
}
