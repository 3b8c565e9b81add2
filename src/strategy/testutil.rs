//! Synthetic candle builders shared by strategy and backtest tests

use super::base::{Signal, SignalType, Strategy};
use crate::data::Candle;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One-minute candles whose close follows `closes`; open is the previous
/// close, wicks sit 0.1% outside the body, volume is constant.
pub fn candles_from_closes(closes: &[Decimal]) -> Vec<Candle> {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let mut candles = Vec::with_capacity(closes.len());

    for (i, close) in closes.iter().enumerate() {
        let open = if i == 0 { *close } else { closes[i - 1] };
        let wick = open.max(*close) * dec!(0.001);
        candles.push(Candle::new(
            start + Duration::minutes(i as i64),
            open,
            open.max(*close) + wick,
            open.min(*close) - wick,
            *close,
            dec!(100),
        ));
    }

    candles
}

/// Closes built from segments of `(candles, pct change per candle)`
pub fn trend_closes(start: Decimal, segments: &[(usize, Decimal)]) -> Vec<Decimal> {
    let mut price = start;
    let mut closes = Vec::new();

    for &(count, pct) in segments {
        for _ in 0..count {
            price = (price * (Decimal::ONE + pct / dec!(100))).round_dp(8);
            closes.push(price);
        }
    }

    closes
}

/// Deterministic pseudo-random walk with occasional volume bursts
pub fn random_walk(len: usize, seed: u64) -> Vec<Candle> {
    let mut state = seed;
    let mut price = dec!(100);
    let mut closes = Vec::with_capacity(len);

    for _ in 0..len {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let step = Decimal::from((state >> 33) % 201) - dec!(100);
        price = (price * (Decimal::ONE + step / dec!(10000))).round_dp(8).max(dec!(1));
        closes.push(price);
    }

    let mut candles = candles_from_closes(&closes);
    for (i, candle) in candles.iter_mut().enumerate() {
        if i % 7 == 0 {
            candle.volume = dec!(250);
        }
    }
    candles
}

/// Feed every prefix of `candles` to `strategy`, one candle at a time
pub fn run_growing(strategy: &mut dyn Strategy, candles: &[Candle]) -> Vec<Signal> {
    (1..=candles.len())
        .map(|end| strategy.analyze(&candles[..end]))
        .collect()
}

/// Panics if two same-side signals occur without the opposite side between
pub fn assert_latched(signals: &[Signal]) {
    let mut last: Option<SignalType> = None;
    for signal in signals.iter().filter(|s| !s.is_hold()) {
        assert_ne!(
            last,
            Some(signal.signal_type),
            "repeated {} at {}",
            signal.signal_type,
            signal.timestamp
        );
        last = Some(signal.signal_type);
    }
}

/// Checks the warm-up guard for every window shorter than `min_lookback`
pub fn assert_warm_up(strategy: &mut dyn Strategy, candles: &[Candle]) {
    let min = strategy.min_lookback();
    for end in 1..min.min(candles.len() + 1) {
        let signal = strategy.analyze(&candles[..end]);
        assert!(signal.is_hold(), "{} traded during warm-up", strategy.name());
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.price, candles[end - 1].close);
    }
}
