//! Scalping Strategy
//!
//! Short-lived trades on small price moves. Unlike the other strategies it
//! keeps its own book of open positions so it can decide exits (quick
//! profit, max hold, momentum reversal, stop loss) from entry prices.

use crate::config::decimal_setting;
use crate::data::candles::{closes, Candle};
use crate::strategy::base::{warm_up_hold, Signal, SignalLatch, SignalType, Strategy};
use crate::strategy::indicators::{momentum_pct, return_volatility_pct, tick_change};
use chrono::{DateTime, Utc};
use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Closed trades kept for inspection
const TRADE_HISTORY_LEN: usize = 20;

/// Candles averaged for the momentum reading
const MOMENTUM_PERIOD: usize = 5;

/// Configuration for the scalping strategy. Percentages are in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalpingConfig {
    /// Minimum candle range relative to the close
    pub spread_threshold: f64,
    /// Volume spike multiple over the recent average
    pub volume_threshold: f64,
    pub quick_profit_target: f64,
    /// In candles
    pub max_hold_time: usize,
    pub volatility_period: usize,
    pub min_volatility: f64,
}

impl Default for ScalpingConfig {
    fn default() -> Self {
        Self {
            spread_threshold: 0.1,
            volume_threshold: 1.5,
            quick_profit_target: 0.5,
            max_hold_time: 10,
            volatility_period: 10,
            min_volatility: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Signal that opens a position on this side
    fn entry_signal(self) -> SignalType {
        match self {
            PositionSide::Long => SignalType::Buy,
            PositionSide::Short => SignalType::Sell,
        }
    }

    fn exit_signal(self) -> SignalType {
        self.entry_signal().opposite()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalpPosition {
    pub entry_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub candles_held: usize,
}

impl ScalpPosition {
    /// Unrealized profit in percent for a position on `side`
    pub fn profit_pct(&self, side: PositionSide, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let change = match side {
            PositionSide::Long => price - self.entry_price,
            PositionSide::Short => self.entry_price - price,
        };
        change / self.entry_price * dec!(100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    QuickProfit,
    MaxHoldTime,
    MomentumReversal,
    StopLoss,
}

impl ExitReason {
    fn confidence(self) -> f64 {
        match self {
            ExitReason::QuickProfit => 0.9,
            ExitReason::MaxHoldTime => 0.7,
            ExitReason::MomentumReversal | ExitReason::StopLoss => 0.8,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ExitReason::QuickProfit => "quick_profit",
            ExitReason::MaxHoldTime => "max_hold_time",
            ExitReason::MomentumReversal => "momentum_reversal",
            ExitReason::StopLoss => "stop_loss",
        }
    }
}

/// A position the strategy opened and later closed
#[derive(Debug, Clone, PartialEq)]
pub struct ScalpTrade {
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub candles_held: usize,
    pub profit_pct: Decimal,
    pub reason: ExitReason,
}

pub struct ScalpingStrategy {
    config: ScalpingConfig,
    spread_threshold: Decimal,
    volume_threshold: Decimal,
    quick_profit_target: Decimal,
    min_volatility: Decimal,
    positions: BTreeMap<PositionSide, ScalpPosition>,
    trades: VecDeque<ScalpTrade>,
    latch: SignalLatch,
}

impl ScalpingStrategy {
    const INSTANT_MOVE: Decimal = dec!(0.0003);
    const VOLUME_BUMP: Decimal = dec!(1.1);
    const MOMENTUM_THRESHOLD: Decimal = dec!(0.05);

    pub fn new(config: ScalpingConfig) -> Result<Self> {
        let spread_threshold = decimal_setting("scalping.spread_threshold", config.spread_threshold)?;
        let volume_threshold = decimal_setting("scalping.volume_threshold", config.volume_threshold)?;
        let quick_profit_target =
            decimal_setting("scalping.quick_profit_target", config.quick_profit_target)?;
        let min_volatility = decimal_setting("scalping.min_volatility", config.min_volatility)?;

        Ok(Self {
            config,
            spread_threshold,
            volume_threshold,
            quick_profit_target,
            min_volatility,
            positions: BTreeMap::new(),
            trades: VecDeque::with_capacity(TRADE_HISTORY_LEN),
            latch: SignalLatch::default(),
        })
    }

    pub fn open_positions(&self) -> &BTreeMap<PositionSide, ScalpPosition> {
        &self.positions
    }

    /// Most recent closed trades, oldest first
    pub fn recent_trades(&self) -> &VecDeque<ScalpTrade> {
        &self.trades
    }

    fn record_trade(&mut self, trade: ScalpTrade) {
        if self.trades.len() == TRADE_HISTORY_LEN {
            self.trades.pop_front();
        }
        self.trades.push_back(trade);
    }

    fn exit_reason(
        &self,
        side: PositionSide,
        position: &ScalpPosition,
        price: Decimal,
        momentum: Option<Decimal>,
    ) -> Option<ExitReason> {
        let profit = position.profit_pct(side, price);
        let half_target = self.quick_profit_target * dec!(0.5);

        let momentum_against = match (side, momentum) {
            (PositionSide::Long, Some(m)) => m < Decimal::ZERO,
            (PositionSide::Short, Some(m)) => m > Decimal::ZERO,
            (_, None) => false,
        };

        if profit >= half_target {
            Some(ExitReason::QuickProfit)
        } else if position.candles_held >= self.config.max_hold_time && profit <= Decimal::ZERO {
            Some(ExitReason::MaxHoldTime)
        } else if position.candles_held >= 2 && momentum_against {
            Some(ExitReason::MomentumReversal)
        } else if profit <= -self.quick_profit_target * dec!(2) {
            Some(ExitReason::StopLoss)
        } else {
            None
        }
    }

    /// Scan open positions, Long before Short, and close the first one with
    /// an exit condition.
    fn check_exits(&mut self, last: &Candle, momentum: Option<Decimal>) -> Option<Signal> {
        let (side, reason) = self.positions.iter().find_map(|(side, position)| {
            self.exit_reason(*side, position, last.close, momentum)
                .map(|reason| (*side, reason))
        })?;

        let signal_type = side.exit_signal();
        if !self.latch.allows(signal_type) {
            return Some(Signal::hold(last));
        }

        let position = self.positions.remove(&side)?;
        let profit_pct = position.profit_pct(side, last.close);
        debug!(
            "Scalp exit {:?} {}: entry {} exit {} ({}%) after {} candles",
            side,
            reason.as_str(),
            position.entry_price,
            last.close,
            profit_pct.round_dp(4),
            position.candles_held
        );

        self.record_trade(ScalpTrade {
            side,
            entry_price: position.entry_price,
            exit_price: last.close,
            opened_at: position.opened_at,
            closed_at: last.timestamp,
            candles_held: position.candles_held,
            profit_pct,
            reason,
        });
        self.latch.record(signal_type);

        Some(
            Signal::new(signal_type, last, reason.confidence())
                .with_meta("reason", reason.as_str())
                .with_meta("profit_pct", profit_pct.to_f64()),
        )
    }

    /// A sharp tick that is either accelerating or carried by rising volume
    fn instant_move(&self, window: &[Candle], prices: &[Decimal]) -> Option<PositionSide> {
        let tick = tick_change(prices, 0)?;
        if tick.abs() <= Self::INSTANT_MOVE {
            return None;
        }

        let accelerating = tick_change(prices, 1).is_some_and(|prev| {
            prev.is_sign_positive() == tick.is_sign_positive()
                && !prev.is_zero()
                && tick.abs() > prev.abs()
        });

        let n = window.len();
        let previous_volume = window[n - 2].volume;
        let volume_bump = !previous_volume.is_zero()
            && window[n - 1].volume >= previous_volume * Self::VOLUME_BUMP;

        if !(accelerating || volume_bump) {
            return None;
        }

        if tick > Decimal::ZERO {
            Some(PositionSide::Long)
        } else {
            Some(PositionSide::Short)
        }
    }

    /// Wide candle, enough volatility, a volume spike and momentum backed
    /// by the candle body
    fn price_action(
        &self,
        window: &[Candle],
        prices: &[Decimal],
        momentum: Option<Decimal>,
    ) -> Option<PositionSide> {
        let last = window.last()?;
        if last.close.is_zero() {
            return None;
        }

        let range_pct = last.range() / last.close * dec!(100);
        if range_pct < self.spread_threshold {
            return None;
        }

        let period = self.config.volatility_period;
        let volatility = return_volatility_pct(prices, period)?;
        if volatility < self.min_volatility {
            return None;
        }

        let n = window.len();
        if period == 0 || n < period + 1 {
            return None;
        }
        let avg_volume = window[n - 1 - period..n - 1]
            .iter()
            .map(|c| c.volume)
            .sum::<Decimal>()
            / Decimal::from(period);
        if last.volume < avg_volume * self.volume_threshold {
            return None;
        }

        let momentum = momentum?;
        if momentum > Self::MOMENTUM_THRESHOLD && last.is_bullish() {
            Some(PositionSide::Long)
        } else if momentum < -Self::MOMENTUM_THRESHOLD && last.is_bearish() {
            Some(PositionSide::Short)
        } else {
            None
        }
    }

    fn check_entries(&mut self, window: &[Candle], momentum: Option<Decimal>) -> Option<Signal> {
        let prices = closes(window);
        let (side, confidence, reason) = if let Some(side) = self.instant_move(window, &prices) {
            (side, 0.8, "instant_move")
        } else if let Some(side) = self.price_action(window, &prices, momentum) {
            (side, 0.7, "price_action")
        } else {
            return None;
        };

        let last = window.last()?;
        let signal_type = side.entry_signal();
        if !self.latch.allows(signal_type) {
            return None;
        }

        debug!("Scalp entry {:?} via {} at {}", side, reason, last.close);
        self.positions.insert(
            side,
            ScalpPosition {
                entry_price: last.close,
                opened_at: last.timestamp,
                candles_held: 0,
            },
        );
        self.latch.record(signal_type);

        Some(Signal::new(signal_type, last, confidence).with_meta("reason", reason))
    }
}

impl Strategy for ScalpingStrategy {
    fn analyze(&mut self, window: &[Candle]) -> Signal {
        if let Some(hold) = warm_up_hold(window, self.min_lookback()) {
            return hold;
        }

        let last = &window[window.len() - 1];
        for position in self.positions.values_mut() {
            position.candles_held += 1;
        }

        let momentum = momentum_pct(&closes(window), MOMENTUM_PERIOD);

        if let Some(signal) = self.check_exits(last, momentum) {
            return signal;
        }

        if self.positions.is_empty() {
            if let Some(signal) = self.check_entries(window, momentum) {
                return signal;
            }
        }

        Signal::hold(last).with_meta("momentum", momentum.and_then(|m| m.to_f64()))
    }

    fn min_lookback(&self) -> usize {
        (self.config.volatility_period + 1).max(MOMENTUM_PERIOD)
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn name(&self) -> &str {
        "Scalping"
    }

    fn reset(&mut self) {
        self.positions.clear();
        self.trades.clear();
        self.latch.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testutil::{
        assert_latched, assert_warm_up, candles_from_closes, random_walk, run_growing,
    };

    fn flat(len: usize) -> Vec<Decimal> {
        vec![dec!(100); len]
    }

    fn strategy() -> ScalpingStrategy {
        ScalpingStrategy::new(ScalpingConfig::default()).unwrap()
    }

    fn trade_at(i: usize) -> ScalpTrade {
        let candle = &candles_from_closes(&[dec!(100)])[0];
        ScalpTrade {
            side: PositionSide::Long,
            entry_price: Decimal::from(i),
            exit_price: Decimal::from(i),
            opened_at: candle.timestamp,
            closed_at: candle.timestamp,
            candles_held: 1,
            profit_pct: Decimal::ZERO,
            reason: ExitReason::QuickProfit,
        }
    }

    /// Flat history, then a +0.1% candle on a 20% volume bump: instant long
    fn long_entry(after: &[Decimal]) -> Vec<Candle> {
        let mut closes = flat(11);
        closes.push(dec!(100.1));
        closes.extend_from_slice(after);
        let mut candles = candles_from_closes(&closes);
        candles[11].volume = dec!(120);
        candles
    }

    #[test]
    fn test_warm_up() {
        let candles = random_walk(20, 6);
        let mut strategy = strategy();
        assert_eq!(strategy.min_lookback(), 11);
        assert_warm_up(&mut strategy, &candles);
        assert!(strategy.open_positions().is_empty());
    }

    #[test]
    fn test_instant_long_then_quick_profit() {
        let candles = long_entry(&[dec!(100.4)]);
        let mut strategy = strategy();
        let signals = run_growing(&mut strategy, &candles);

        assert!(signals[..11].iter().all(|s| s.is_hold()));

        let entry = &signals[11];
        assert_eq!(entry.signal_type, SignalType::Buy);
        assert_eq!(entry.confidence, 0.8);
        assert_eq!(entry.metadata["reason"], "instant_move");

        // +0.3% clears half of the 0.5% target
        let exit = &signals[12];
        assert_eq!(exit.signal_type, SignalType::Sell);
        assert_eq!(exit.confidence, 0.9);
        assert!(strategy.open_positions().is_empty());

        let trade = strategy.recent_trades().back().unwrap();
        assert_eq!(trade.side, PositionSide::Long);
        assert_eq!(trade.reason, ExitReason::QuickProfit);
        assert_eq!(trade.entry_price, dec!(100.1));
        assert_eq!(trade.exit_price, dec!(100.4));
        assert_eq!(trade.candles_held, 1);
    }

    #[test]
    fn test_momentum_reversal_closes_long() {
        let candles = long_entry(&[dec!(100), dec!(99.9)]);
        let mut strategy = strategy();
        let signals = run_growing(&mut strategy, &candles);

        // one candle held is too early for a reversal
        assert!(signals[12].is_hold());
        assert_eq!(strategy.recent_trades().len(), 1);

        let exit = &signals[13];
        assert_eq!(exit.signal_type, SignalType::Sell);
        assert_eq!(exit.confidence, 0.8);
        assert_eq!(
            strategy.recent_trades().back().unwrap().reason,
            ExitReason::MomentumReversal
        );
    }

    #[test]
    fn test_stop_loss_on_gap_down() {
        let candles = long_entry(&[dec!(98)]);
        let mut strategy = strategy();
        let signals = run_growing(&mut strategy, &candles);

        let exit = &signals[12];
        assert_eq!(exit.signal_type, SignalType::Sell);
        assert_eq!(exit.confidence, 0.8);
        assert_eq!(
            strategy.recent_trades().back().unwrap().reason,
            ExitReason::StopLoss
        );
    }

    #[test]
    fn test_accelerating_drop_opens_short_until_max_hold() {
        let mut closes = flat(10);
        closes.push(dec!(99.95));
        closes.extend(vec![dec!(99.85); 11]);
        let candles = candles_from_closes(&closes);
        let mut strategy = strategy();
        let signals = run_growing(&mut strategy, &candles);

        // first dip alone is not enough
        assert!(signals[10].is_hold());

        let entry = &signals[11];
        assert_eq!(entry.signal_type, SignalType::Sell);
        assert_eq!(entry.confidence, 0.8);
        assert!(signals[12..21].iter().all(|s| s.is_hold()));

        let exit = &signals[21];
        assert_eq!(exit.signal_type, SignalType::Buy);
        assert_eq!(exit.confidence, 0.7);

        let trade = strategy.recent_trades().back().unwrap();
        assert_eq!(trade.side, PositionSide::Short);
        assert_eq!(trade.reason, ExitReason::MaxHoldTime);
        assert_eq!(trade.candles_held, 10);
    }

    #[test]
    fn test_price_action_entry_needs_volume_spike() {
        // choppy start for volatility, then a slow grind up under the
        // instant-move threshold
        let mut closes = Vec::new();
        for i in 0..6 {
            closes.push(if i % 2 == 0 { dec!(100) } else { dec!(100.3) });
        }
        let mut price = dec!(100.3);
        for _ in 0..6 {
            price = (price * dec!(1.00028)).round_dp(8);
            closes.push(price);
        }

        let quiet = candles_from_closes(&closes);
        let mut strategy = strategy();
        assert!(run_growing(&mut strategy, &quiet).iter().all(|s| s.is_hold()));

        let mut spiked = quiet.clone();
        spiked[11].volume = dec!(200);
        let mut strategy = ScalpingStrategy::new(ScalpingConfig::default()).unwrap();
        let signals = run_growing(&mut strategy, &spiked);

        let entry = &signals[11];
        assert_eq!(entry.signal_type, SignalType::Buy);
        assert_eq!(entry.confidence, 0.7);
        assert_eq!(entry.metadata["reason"], "price_action");
        assert!(strategy.open_positions().contains_key(&PositionSide::Long));
    }

    #[test]
    fn test_trade_history_is_capped() {
        let mut strategy = strategy();
        for i in 0..25 {
            strategy.record_trade(trade_at(i));
        }
        assert_eq!(strategy.recent_trades().len(), TRADE_HISTORY_LEN);
        assert_eq!(strategy.recent_trades().front().unwrap().entry_price, dec!(5));
    }

    #[test]
    fn test_latch_and_reset_on_random_walk() {
        let candles = random_walk(400, 31);
        let mut strategy = strategy();
        let first = run_growing(&mut strategy, &candles);
        assert_latched(&first);

        strategy.reset();
        assert!(strategy.open_positions().is_empty());
        assert!(strategy.recent_trades().is_empty());
        assert_eq!(run_growing(&mut strategy, &candles), first);
    }
}
