//! Backtest engine for replaying historical candles through a strategy

use super::metrics::{MetricsCollector, PerformanceMetrics};
use crate::config::{decimal_setting, BacktestSettings};
use crate::data::Candle;
use crate::strategy::{Signal, SignalType, Strategy};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

/// Execution rules for a backtest run
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub initial_balance: Decimal,
    pub min_confidence: f64,
    pub default_start_index: usize,
    pub buy_fraction: Decimal,
    pub min_cash: Decimal,
}

impl BacktestConfig {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            min_confidence: 0.1,
            default_start_index: 20,
            buy_fraction: Decimal::new(95, 2),
            min_cash: Decimal::from(100),
        }
    }

    pub fn from_settings(settings: &BacktestSettings) -> Result<Self> {
        Ok(Self {
            initial_balance: decimal_setting("initial_balance", settings.initial_balance)?,
            min_confidence: settings.min_confidence,
            default_start_index: settings.default_start_index,
            buy_fraction: decimal_setting("buy_fraction", settings.buy_fraction)?,
            min_cash: decimal_setting("min_cash", settings.min_cash)?,
        })
    }
}

/// Record of a trade executed during backtest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub trade_type: SignalType,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub quantity: Decimal,
    pub confidence: f64,
}

/// Result of a backtest run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
}

/// Cash and a single long position
#[derive(Debug, Clone)]
struct Account {
    balance: Decimal,
    position: Decimal,
}

impl Account {
    fn new(initial_balance: Decimal) -> Self {
        Self {
            balance: initial_balance,
            position: Decimal::ZERO,
        }
    }
}

/// Replays candles through a strategy and simulates long-only execution
pub struct Backtester {
    config: BacktestConfig,
    account: Account,
    trades: Vec<Trade>,
    metrics: MetricsCollector,
}

impl Backtester {
    pub fn new(initial_balance: Decimal) -> Self {
        Self::with_config(BacktestConfig::new(initial_balance))
    }

    pub fn with_config(config: BacktestConfig) -> Self {
        let initial_balance = config.initial_balance;
        Self {
            config,
            account: Account::new(initial_balance),
            trades: Vec::new(),
            metrics: MetricsCollector::new(initial_balance),
        }
    }

    /// Cash balance after the last run
    pub fn balance(&self) -> Decimal {
        self.account.balance
    }

    /// Units held after the last run; zero once a run completes
    pub fn position(&self) -> Decimal {
        self.account.position
    }

    fn reset(&mut self) {
        self.account = Account::new(self.config.initial_balance);
        self.trades.clear();
        self.metrics = MetricsCollector::new(self.config.initial_balance);
    }

    /// Index of the first candle handed to the strategy
    fn start_index(&self, strategy: &dyn Strategy) -> usize {
        strategy
            .long_period()
            .unwrap_or(self.config.default_start_index)
    }

    /// Run `strategy` over `candles`, feeding it every prefix from the start
    /// index onward. Any position still open at the end is sold at the last
    /// close.
    pub fn backtest(&mut self, strategy: &mut dyn Strategy, candles: &[Candle]) -> Result<BacktestResult> {
        if candles.is_empty() {
            bail!("cannot backtest {} on an empty candle series", strategy.name());
        }

        self.reset();
        strategy.reset();

        let start = self.start_index(strategy);
        info!(
            "Starting backtest of {} over {} candles (from index {})",
            strategy.name(),
            candles.len(),
            start
        );

        for end in start..candles.len() {
            let signal = strategy.analyze(&candles[..=end]);
            if signal.is_hold() || signal.confidence <= self.config.min_confidence {
                continue;
            }

            match signal.signal_type {
                SignalType::Buy => self.execute_buy(&signal),
                SignalType::Sell => self.execute_sell(&signal),
                SignalType::Hold => {}
            }
        }

        if self.account.position > Decimal::ZERO {
            let last = &candles[candles.len() - 1];
            debug!("Closing open position at final close {}", last.close);
            self.execute_sell(&Signal::new(SignalType::Sell, last, 1.0));
        }

        let result = BacktestResult {
            initial_balance: self.config.initial_balance,
            final_balance: self.account.balance,
            metrics: self.metrics.calculate(self.account.balance),
            trades: self.trades.clone(),
        };

        info!(
            "Backtest of {} complete: {} trades, {:.2}% return, final balance {}",
            strategy.name(),
            result.metrics.total_trades,
            result.metrics.total_return,
            result.final_balance
        );

        Ok(result)
    }

    fn execute_buy(&mut self, signal: &Signal) {
        let account = &mut self.account;
        if account.balance <= self.config.min_cash || account.position > Decimal::ZERO {
            debug!(
                "Ignoring BUY at {}: balance {}, position {}",
                signal.price, account.balance, account.position
            );
            return;
        }
        if signal.price <= Decimal::ZERO {
            debug!("Ignoring BUY at non-positive price {}", signal.price);
            return;
        }

        let quantity = account.balance * self.config.buy_fraction / signal.price;
        let cost = quantity * signal.price;
        account.balance -= cost;
        account.position = quantity;

        debug!("BUY {} @ {} (cost: {})", quantity, signal.price, cost);

        self.metrics.record_buy(signal.price);
        self.trades.push(Trade {
            trade_type: SignalType::Buy,
            price: signal.price,
            timestamp: signal.timestamp,
            quantity,
            confidence: signal.confidence,
        });
    }

    fn execute_sell(&mut self, signal: &Signal) {
        let account = &mut self.account;
        if account.position <= Decimal::ZERO {
            debug!("Ignoring SELL at {}: no position", signal.price);
            return;
        }

        let quantity = account.position;
        let proceeds = quantity * signal.price;
        account.balance += proceeds;
        account.position = Decimal::ZERO;

        debug!(
            "SELL {} @ {} (value: {}, balance: {})",
            quantity, signal.price, proceeds, account.balance
        );

        self.metrics.record_sell(signal.price, account.balance);
        self.trades.push(Trade {
            trade_type: SignalType::Sell,
            price: signal.price,
            timestamp: signal.timestamp,
            quantity,
            confidence: signal.confidence,
        });
    }
}
