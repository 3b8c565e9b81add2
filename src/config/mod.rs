use crate::strategy::{
    BollingerConfig, CrossoverConfig, MACDConfig, RSIConfig, RsiMaComboConfig, ScalpingConfig,
};
use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Convert a float setting to a Decimal, rejecting NaN and infinities
pub fn decimal_setting(name: &str, value: f64) -> Result<Decimal> {
    Decimal::try_from(value).with_context(|| format!("{} is not a finite number: {}", name, value))
}

/// Top-level settings. Every field has a default so an absent file is fine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backtest: BacktestSettings,
    pub strategies: StrategiesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_balance: f64,
    /// Signals at or below this confidence are ignored
    pub min_confidence: f64,
    /// Replay start for strategies without a long moving-average period
    pub default_start_index: usize,
    /// Share of the cash balance spent on each BUY
    pub buy_fraction: f64,
    /// BUYs need strictly more cash than this
    pub min_cash: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_balance: 10000.0,
            min_confidence: 0.1,
            default_start_index: 20,
            buy_fraction: 0.95,
            min_cash: 100.0,
        }
    }
}

/// Per-strategy parameters, keyed by registry name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategiesConfig {
    pub crossover: CrossoverConfig,
    pub rsi: RSIConfig,
    pub bollinger: BollingerConfig,
    pub macd: MACDConfig,
    pub rsi_ma: RsiMaComboConfig,
    pub scalping: ScalpingConfig,
}

impl Config {
    /// Load `config/default.toml` if present, then `BACKTESTER__*`
    /// environment overrides (e.g. `BACKTESTER__BACKTEST__INITIAL_BALANCE`).
    pub fn load() -> Result<Self> {
        Self::build(Self::config_path(), false)
    }

    /// Load an explicit file, which must exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(path.as_ref().to_path_buf(), true)
    }

    fn build(path: PathBuf, required: bool) -> Result<Self> {
        let settings = ConfigLoader::builder()
            .add_source(File::from(path.clone()).required(required))
            .add_source(
                Environment::with_prefix("BACKTESTER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    fn config_path() -> PathBuf {
        let local_config = PathBuf::from("config/default.toml");
        if local_config.exists() {
            return local_config;
        }

        // Fallback to executable directory
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let exe_config = exe_dir.join("config/default.toml");
                if exe_config.exists() {
                    return exe_config;
                }
            }
        }

        local_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backtest.initial_balance, 10000.0);
        assert_eq!(config.backtest.min_confidence, 0.1);
        assert_eq!(config.backtest.default_start_index, 20);
        assert_eq!(config.strategies.crossover.long_period, 20);
        assert_eq!(config.strategies.macd.signal_period, 9);
        assert_eq!(config.strategies.rsi_ma.ma_long, 30);
        assert_eq!(config.strategies.scalping.max_hold_time, 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_toml(
            r#"
            [backtest]
            initial_balance = 2500

            [strategies.crossover]
            short_period = 3

            [strategies.rsi]
            oversold_level = 25.0
            "#,
        );

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.backtest.initial_balance, 2500.0);
        assert_eq!(config.backtest.buy_fraction, 0.95);
        assert_eq!(config.strategies.crossover.short_period, 3);
        assert_eq!(config.strategies.crossover.long_period, 20);
        assert_eq!(config.strategies.rsi.oversold_level, 25.0);
        assert_eq!(config.strategies.rsi.rsi_period, 14);
        assert_eq!(config.strategies.bollinger.period, 20);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(dir.path().join("absent.toml")).is_err());
    }
}
