//! Strategy Comparator
//!
//! Runs multiple strategies on the same data and compares results.

use super::engine::{BacktestConfig, BacktestResult, Backtester};
use crate::data::Candle;
use crate::strategy::Strategy;
use anyhow::{Context, Result};
use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// One strategy's outcome in a comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyComparison {
    pub strategy_name: String,
    pub parameters: serde_json::Value,
    pub result: BacktestResult,
}

/// Runs several strategies over one candle series with identical settings
pub struct StrategyComparator {
    config: BacktestConfig,
}

impl StrategyComparator {
    pub fn new(initial_balance: Decimal) -> Self {
        Self::with_config(BacktestConfig::new(initial_balance))
    }

    pub fn with_config(config: BacktestConfig) -> Self {
        Self { config }
    }

    fn run_one(&self, strategy: &mut dyn Strategy, candles: &[Candle]) -> Result<StrategyComparison> {
        let mut backtester = Backtester::with_config(self.config.clone());
        let result = backtester
            .backtest(strategy, candles)
            .with_context(|| format!("Backtest failed for strategy {}", strategy.name()))?;

        Ok(StrategyComparison {
            strategy_name: strategy.name().to_string(),
            parameters: strategy.parameters(),
            result,
        })
    }

    /// Backtest each strategy in turn. Results keep the input order.
    pub fn compare_strategies(
        &self,
        strategies: &mut [Box<dyn Strategy>],
        candles: &[Candle],
    ) -> Result<Vec<StrategyComparison>> {
        info!(
            "Comparing {} strategies over {} candles",
            strategies.len(),
            candles.len()
        );

        let mut results = Vec::with_capacity(strategies.len());
        for strategy in strategies.iter_mut() {
            let comparison = self.run_one(strategy.as_mut(), candles)?;
            info!(
                "  {}: {} trades, {:.2}% return",
                comparison.strategy_name,
                comparison.result.metrics.total_trades,
                comparison.result.metrics.total_return
            );
            results.push(comparison);
        }

        Ok(results)
    }

    /// Same as [`compare_strategies`](Self::compare_strategies), with one
    /// rayon task per strategy
    pub fn compare_strategies_parallel(
        &self,
        strategies: &mut [Box<dyn Strategy>],
        candles: &[Candle],
    ) -> Result<Vec<StrategyComparison>> {
        info!(
            "Comparing {} strategies over {} candles in parallel",
            strategies.len(),
            candles.len()
        );

        strategies
            .par_iter_mut()
            .map(|strategy| self.run_one(strategy.as_mut(), candles))
            .collect()
    }
}

/// Leaders of a comparison. Ties go to the strategy listed first.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonReport<'a> {
    pub best_by_return: Option<&'a StrategyComparison>,
    pub best_by_win_rate: Option<&'a StrategyComparison>,
    pub most_active: Option<&'a StrategyComparison>,
}

impl<'a> ComparisonReport<'a> {
    pub fn from_results(results: &'a [StrategyComparison]) -> Self {
        Self {
            best_by_return: first_max_by(results, |c| c.result.metrics.total_return),
            best_by_win_rate: first_max_by(results, |c| c.result.metrics.win_rate),
            most_active: first_max_by(results, |c| c.result.metrics.total_trades as f64),
        }
    }
}

/// Maximum by `key`, keeping the earliest element on ties
fn first_max_by<T>(items: &[T], key: impl Fn(&T) -> f64) -> Option<&T> {
    let mut best: Option<(&T, f64)> = None;
    for item in items {
        let value = key(item);
        let replace = match best {
            Some((_, best_value)) => value > best_value,
            None => true,
        };
        if replace {
            best = Some((item, value));
        }
    }
    best.map(|(item, _)| item)
}

#[derive(Debug, Serialize)]
struct ComparisonRow<'a> {
    strategy: &'a str,
    trades: usize,
    win_rate: f64,
    total_return: f64,
    max_drawdown: f64,
    sharpe_ratio: f64,
    final_balance: f64,
}

/// Export results to CSV, one row per strategy
pub fn export_csv(results: &[StrategyComparison], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;

    for comparison in results {
        let m = &comparison.result.metrics;
        writer.serialize(ComparisonRow {
            strategy: &comparison.strategy_name,
            trades: m.total_trades,
            win_rate: m.win_rate,
            total_return: m.total_return,
            max_drawdown: m.max_drawdown,
            sharpe_ratio: m.sharpe_ratio,
            final_balance: comparison.result.final_balance.to_f64().unwrap_or(0.0),
        })?;
    }

    writer.flush().context("Failed to write CSV file")?;
    Ok(())
}
