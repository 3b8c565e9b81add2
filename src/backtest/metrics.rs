//! Performance metrics calculation for backtesting

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

/// Performance metrics from a backtest run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    /// Number of BUY executions
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Fraction in [0, 1] of BUYs that were later sold higher
    pub win_rate: f64,

    /// Percent change of the balance
    pub total_return: f64,
    /// Percent below the highest balance seen after a SELL
    pub max_drawdown: f64,
    /// Mean over standard deviation of round-trip returns, not annualized
    pub sharpe_ratio: f64,
}

/// Collects executions during a backtest and calculates final metrics
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    start_balance: Decimal,
    peak_balance: Decimal,
    buy_prices: Vec<Decimal>,
    sell_prices: Vec<Decimal>,
}

impl MetricsCollector {
    pub fn new(start_balance: Decimal) -> Self {
        Self {
            start_balance,
            peak_balance: start_balance,
            buy_prices: Vec::new(),
            sell_prices: Vec::new(),
        }
    }

    pub fn record_buy(&mut self, price: Decimal) {
        self.buy_prices.push(price);
    }

    /// Record a liquidation and the cash balance right after it
    pub fn record_sell(&mut self, price: Decimal, balance: Decimal) {
        self.sell_prices.push(price);
        if balance > self.peak_balance {
            self.peak_balance = balance;
        }
    }

    /// Calculate final metrics
    pub fn calculate(&self, end_balance: Decimal) -> PerformanceMetrics {
        let total_trades = self.buy_prices.len();

        // i-th BUY pairs with i-th SELL
        let round_trips: Vec<(Decimal, Decimal)> = self
            .buy_prices
            .iter()
            .copied()
            .zip(self.sell_prices.iter().copied())
            .collect();

        let winning_trades = round_trips.iter().filter(|(buy, sell)| sell > buy).count();
        let losing_trades = round_trips.len() - winning_trades;

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let total_return = if !self.start_balance.is_zero() {
            ((end_balance - self.start_balance) / self.start_balance)
                .to_f64()
                .unwrap_or(0.0)
                * 100.0
        } else {
            0.0
        };

        let max_drawdown = if !self.peak_balance.is_zero() {
            ((self.peak_balance - end_balance) / self.peak_balance)
                .to_f64()
                .unwrap_or(0.0)
                * 100.0
        } else {
            0.0
        };

        let returns: Vec<f64> = round_trips
            .iter()
            .filter(|(buy, _)| !buy.is_zero())
            .filter_map(|(buy, sell)| (sell / buy - Decimal::ONE).to_f64())
            .collect();

        PerformanceMetrics {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            total_return,
            max_drawdown,
            sharpe_ratio: calculate_sharpe(&returns),
        }
    }
}

/// Calculate Sharpe Ratio from per-trade returns
fn calculate_sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean: f64 = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return 0.0;
    }

    mean / std_dev
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_no_trades() {
        let metrics = MetricsCollector::new(dec!(1000)).calculate(dec!(1000));
        assert_eq!(metrics, PerformanceMetrics::default());
    }

    #[test]
    fn test_pairs_by_position() {
        let mut collector = MetricsCollector::new(dec!(1000));
        collector.record_buy(dec!(10));
        collector.record_sell(dec!(12), dec!(1200));
        collector.record_buy(dec!(12));
        collector.record_sell(dec!(12), dec!(1200));
        collector.record_buy(dec!(12));
        collector.record_sell(dec!(9), dec!(900));

        let metrics = collector.calculate(dec!(900));
        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.winning_trades, 1);
        // flat round trip counts as a loss
        assert_eq!(metrics.losing_trades, 2);
        assert!((metrics.win_rate - 1.0 / 3.0).abs() < 1e-12);
        assert!((metrics.total_return + 10.0).abs() < 1e-9);
        assert!((metrics.max_drawdown - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak_never_below_start() {
        let mut collector = MetricsCollector::new(dec!(1000));
        collector.record_buy(dec!(10));
        collector.record_sell(dec!(8), dec!(800));
        // measured from the starting balance, not the 800 SELL
        assert!((collector.calculate(dec!(800)).max_drawdown - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_sharpe() {
        assert_eq!(calculate_sharpe(&[0.1]), 0.0);
        assert_eq!(calculate_sharpe(&[0.05, 0.05]), 0.0);

        // mean 0.025, population std 0.075
        let sharpe = calculate_sharpe(&[0.1, -0.05]);
        assert!((sharpe - 1.0 / 3.0).abs() < 1e-9);
    }
}
