//! Backtesting module for historical data replay and strategy evaluation

mod comparator;
mod engine;
mod metrics;

pub use comparator::{export_csv, ComparisonReport, StrategyComparator, StrategyComparison};
pub use engine::{BacktestConfig, BacktestResult, Backtester, Trade};
pub use metrics::{MetricsCollector, PerformanceMetrics};
