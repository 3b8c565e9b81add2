//! Technical indicators for trading strategies
//!
//! Every function looks at the trailing end of `prices` (oldest first) and
//! returns `None` when there is not enough history or a denominator would be
//! zero.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

/// Simple Moving Average
pub fn sma(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if prices.len() < period || period == 0 {
        return None;
    }

    let sum: Decimal = prices.iter().rev().take(period).sum();
    Some(sum / Decimal::from(period))
}

/// Exponential Moving Average
pub fn ema(prices: &[Decimal], period: usize) -> Option<Decimal> {
    ema_series(prices, period).last().copied().flatten()
}

/// EMA value after each prefix of `prices`.
///
/// Entry `i` is the EMA of `prices[..=i]`: `None` until `period` prices are
/// available, then seeded with the SMA of the first `period` prices and
/// advanced with the 2/(period+1) recurrence. Computing the series in one
/// pass performs exactly the operations a per-prefix recomputation would.
pub fn ema_series(prices: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let mut series = vec![None; prices.len()];
    if prices.len() < period || period == 0 {
        return series;
    }

    let multiplier = Decimal::from(2) / Decimal::from(period + 1);

    // Start with SMA of first `period` prices
    let mut ema = prices.iter().take(period).sum::<Decimal>() / Decimal::from(period);
    series[period - 1] = Some(ema);

    for (i, price) in prices.iter().enumerate().skip(period) {
        ema = (*price - ema) * multiplier + ema;
        series[i] = Some(ema);
    }

    series
}

/// Population standard deviation of the last `period` prices
pub fn std_dev(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if prices.len() < period || period == 0 {
        return None;
    }

    let mean = sma(prices, period)?;

    let variance: Decimal = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| (*p - mean) * (*p - mean))
        .sum::<Decimal>()
        / Decimal::from(period);

    let std_dev_f64 = variance.to_f64()?.sqrt();

    Decimal::try_from(std_dev_f64).ok()
}

/// Relative Strength Index over the trailing `period` price changes.
///
/// Average gain and loss are plain means of those changes (no Wilder
/// smoothing). With no losses the RSI is exactly 100.
pub fn rsi(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if prices.len() < period + 1 || period == 0 {
        return None;
    }

    let recent = &prices[prices.len() - period - 1..];

    let mut gain_sum = Decimal::ZERO;
    let mut loss_sum = Decimal::ZERO;

    for pair in recent.windows(2) {
        let change = pair[1] - pair[0];
        if change > Decimal::ZERO {
            gain_sum += change;
        } else {
            loss_sum += change.abs();
        }
    }

    let avg_gain = gain_sum / Decimal::from(period);
    let avg_loss = loss_sum / Decimal::from(period);

    if avg_loss.is_zero() {
        return Some(dec!(100));
    }

    let rs = avg_gain / avg_loss;
    let rsi = dec!(100) - (dec!(100) / (dec!(1) + rs));

    Some(rsi)
}

/// Bollinger Bands - returns (lower, middle, upper)
pub fn bollinger_bands(
    prices: &[Decimal],
    period: usize,
    num_std_devs: Decimal,
) -> Option<(Decimal, Decimal, Decimal)> {
    let middle = sma(prices, period)?;
    let std = std_dev(prices, period)?;

    let lower = middle - std * num_std_devs;
    let upper = middle + std * num_std_devs;

    Some((lower, middle, upper))
}

/// Momentum in percent: distance of the last price from the mean of the
/// last `period` prices
pub fn momentum_pct(prices: &[Decimal], period: usize) -> Option<Decimal> {
    let avg = sma(prices, period)?;
    if avg.is_zero() {
        return None;
    }

    let current = *prices.last()?;
    Some(((current - avg) / avg) * dec!(100))
}

/// Relative change of the price `offset` candles back versus the one before
/// it: `offset == 0` is the latest tick
pub fn tick_change(prices: &[Decimal], offset: usize) -> Option<Decimal> {
    if prices.len() < offset + 2 {
        return None;
    }

    let current = prices[prices.len() - 1 - offset];
    let previous = prices[prices.len() - 2 - offset];
    if previous.is_zero() {
        return None;
    }

    Some((current - previous) / previous)
}

/// Population standard deviation of the last `period` close-to-close
/// returns, in percent
pub fn return_volatility_pct(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if prices.len() < period + 1 || period == 0 {
        return None;
    }

    let recent = &prices[prices.len() - period - 1..];
    let mut returns = Vec::with_capacity(period);
    for pair in recent.windows(2) {
        if pair[0].is_zero() {
            return None;
        }
        returns.push((pair[1] - pair[0]) / pair[0] * dec!(100));
    }

    std_dev(&returns, period)
}

/// Check if fast MA crossed above slow MA (golden cross)
pub fn crossed_above(fast_prev: Decimal, fast_curr: Decimal, slow_prev: Decimal, slow_curr: Decimal) -> bool {
    fast_prev <= slow_prev && fast_curr > slow_curr
}

/// Check if fast MA crossed below slow MA (death cross)
pub fn crossed_below(fast_prev: Decimal, fast_curr: Decimal, slow_prev: Decimal, slow_curr: Decimal) -> bool {
    fast_prev >= slow_prev && fast_curr < slow_curr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![dec!(10), dec!(11), dec!(12), dec!(13), dec!(14)];
        let result = sma(&prices, 3);
        assert_eq!(result, Some(dec!(13))); // (12 + 13 + 14) / 3
        assert_eq!(sma(&prices, 6), None);
        assert_eq!(sma(&prices, 0), None);
    }

    #[test]
    fn test_ema_series_matches_prefix_recompute() {
        let prices: Vec<Decimal> = [22, 24, 23, 25, 27, 26, 28, 30, 29, 31]
            .iter()
            .map(|p| Decimal::from(*p))
            .collect();

        let series = ema_series(&prices, 4);
        assert_eq!(series[2], None);
        assert_eq!(series[3], Some(dec!(23.5)));

        for end in 1..=prices.len() {
            assert_eq!(series[end - 1], ema(&prices[..end], 4));
        }
    }

    #[test]
    fn test_rsi_no_losses_is_100() {
        let prices: Vec<Decimal> = (0..20).map(|i| Decimal::from(100 + i)).collect();
        assert_eq!(rsi(&prices, 14), Some(dec!(100)));
    }

    #[test]
    fn test_rsi_simple_average() {
        // changes: +2, -1, +1, -2 -> avg gain 0.75, avg loss 0.75
        let prices = vec![dec!(10), dec!(12), dec!(11), dec!(12), dec!(10)];
        assert_eq!(rsi(&prices, 4), Some(dec!(50)));

        // only the trailing `period` changes count
        let prices = vec![dec!(50), dec!(10), dec!(12), dec!(11), dec!(12), dec!(10)];
        assert_eq!(rsi(&prices, 4), Some(dec!(50)));
    }

    #[test]
    fn test_rsi_bounds() {
        let mut seed: u64 = 7;
        let mut price = dec!(100);
        let mut prices = Vec::new();
        for _ in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let step = Decimal::from((seed >> 33) % 21) - dec!(10);
            price = (price + step / dec!(10)).max(dec!(1));
            prices.push(price);
        }

        for end in 15..=prices.len() {
            let value = rsi(&prices[..end], 14).unwrap();
            assert!(value >= Decimal::ZERO && value <= dec!(100), "rsi {} out of range", value);
        }
    }

    #[test]
    fn test_bollinger_band_order() {
        let prices: Vec<Decimal> = [10, 12, 9, 14, 11, 13, 8, 15, 10, 12]
            .iter()
            .map(|p| Decimal::from(*p))
            .collect();

        for k in [dec!(0), dec!(1), dec!(2.5)] {
            let (lower, middle, upper) = bollinger_bands(&prices, 5, k).unwrap();
            assert!(lower <= middle && middle <= upper);
        }

        let (lower, middle, upper) = bollinger_bands(&prices, 5, dec!(0)).unwrap();
        assert_eq!(lower, middle);
        assert_eq!(upper, middle);
    }

    #[test]
    fn test_std_dev_population() {
        let prices = vec![dec!(2), dec!(4), dec!(4), dec!(4), dec!(5), dec!(5), dec!(7), dec!(9)];
        assert_eq!(std_dev(&prices, 8), Some(dec!(2)));
    }

    #[test]
    fn test_momentum_and_tick() {
        let prices = vec![dec!(96), dec!(100), dec!(100), dec!(100), dec!(104)];
        assert_eq!(momentum_pct(&prices, 5), Some(dec!(4)));
        assert_eq!(tick_change(&prices, 0), Some(dec!(0.04)));
        assert_eq!(tick_change(&prices, 1), Some(dec!(0)));
        assert_eq!(tick_change(&prices[..1], 0), None);
    }

    #[test]
    fn test_zero_price_guards() {
        let prices = vec![dec!(0), dec!(0), dec!(0)];
        assert_eq!(momentum_pct(&prices, 3), None);
        assert_eq!(tick_change(&prices, 0), None);
        assert_eq!(return_volatility_pct(&prices, 2), None);
    }

    #[test]
    fn test_crossed_above() {
        assert!(crossed_above(dec!(9), dec!(11), dec!(10), dec!(10)));
        assert!(!crossed_above(dec!(11), dec!(12), dec!(10), dec!(10)));
        assert!(crossed_below(dec!(10), dec!(9), dec!(10), dec!(10)));
    }
}
