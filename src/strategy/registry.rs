//! Strategy Registry
//!
//! Factory for creating strategies by name.

use super::base::Strategy;
use super::bollinger::BollingerStrategy;
use super::crossover::CrossoverStrategy;
use super::macd::MACDStrategy;
use super::rsi::RSIStrategy;
use super::rsi_ma_combo::RsiMaComboStrategy;
use super::scalping::ScalpingStrategy;
use crate::config::StrategiesConfig;
use anyhow::{bail, Result};

/// Available strategy names
pub const STRATEGY_NAMES: &[&str] = &["crossover", "rsi", "bollinger", "macd", "rsi_ma", "scalping"];

/// Create a strategy by name. Fails on an unknown name or a setting that
/// does not convert to a price-scale number.
pub fn create_strategy(name: &str, config: &StrategiesConfig) -> Result<Box<dyn Strategy>> {
    let strategy: Box<dyn Strategy> = match name.to_lowercase().as_str() {
        "crossover" | "ma" | "sma" => Box::new(CrossoverStrategy::new(config.crossover.clone())),

        "rsi" => Box::new(RSIStrategy::new(config.rsi.clone())?),

        "bollinger" | "bb" | "bollingerbands" => {
            Box::new(BollingerStrategy::new(config.bollinger.clone())?)
        }

        "macd" => Box::new(MACDStrategy::new(config.macd.clone())),

        "rsi_ma" | "combo" | "rsi_ma_combo" => {
            Box::new(RsiMaComboStrategy::new(config.rsi_ma.clone())?)
        }

        "scalping" | "scalper" => Box::new(ScalpingStrategy::new(config.scalping.clone())?),

        _ => bail!(
            "Unknown strategy '{}'. Available: {}",
            name,
            STRATEGY_NAMES.join(", ")
        ),
    };

    Ok(strategy)
}

/// Get all available strategies
pub fn all_strategies(config: &StrategiesConfig) -> Result<Vec<Box<dyn Strategy>>> {
    STRATEGY_NAMES
        .iter()
        .map(|name| create_strategy(name, config))
        .collect()
}

/// Parse a comma-separated list of strategy names
pub fn parse_strategy_list(list: &str) -> Vec<String> {
    if list.to_lowercase() == "all" {
        return STRATEGY_NAMES.iter().map(|s| s.to_string()).collect();
    }

    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testutil::{assert_latched, random_walk, run_growing};

    #[test]
    fn test_every_name_resolves() {
        let config = StrategiesConfig::default();
        for name in STRATEGY_NAMES {
            assert!(create_strategy(name, &config).is_ok(), "{} missing", name);
        }
        assert!(create_strategy("BB", &config).is_ok());

        let err = create_strategy("nope", &config).err().unwrap();
        assert!(err.to_string().contains("crossover, rsi"));
    }

    #[test]
    fn test_all_strategies_order() {
        let names: Vec<String> = all_strategies(&StrategiesConfig::default())
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(
            names,
            ["Crossover", "RSI", "BollingerBands", "MACD", "RSI_MA_Combo", "Scalping"]
        );
    }

    #[test]
    fn test_parse_strategy_list() {
        assert_eq!(parse_strategy_list(" RSI, macd ,,"), vec!["rsi", "macd"]);
        assert_eq!(parse_strategy_list("all").len(), STRATEGY_NAMES.len());
    }

    #[test]
    fn test_config_reaches_strategy() {
        let mut config = StrategiesConfig::default();
        config.crossover.long_period = 50;
        let strategy = create_strategy("crossover", &config).unwrap();
        assert_eq!(strategy.long_period(), Some(50));
        assert_eq!(strategy.parameters()["long_period"], 50);
    }

    #[test]
    fn test_non_finite_setting_is_an_error() {
        let mut config = StrategiesConfig::default();
        config.rsi.oversold_level = f64::NAN;
        config.bollinger.num_std_devs = f64::INFINITY;
        config.rsi_ma.overbought_level = f64::NEG_INFINITY;
        config.scalping.quick_profit_target = f64::NAN;

        for (name, setting) in [
            ("rsi", "rsi.oversold_level"),
            ("bollinger", "bollinger.num_std_devs"),
            ("rsi_ma", "rsi_ma.overbought_level"),
            ("scalping", "scalping.quick_profit_target"),
        ] {
            let err = create_strategy(name, &config).err().unwrap();
            assert!(err.to_string().contains(setting), "{}: {}", name, err);
        }

        // strategies without float settings are unaffected
        assert!(create_strategy("crossover", &config).is_ok());
        assert!(create_strategy("macd", &config).is_ok());
        assert!(all_strategies(&config).is_err());
    }

    #[test]
    fn test_fresh_instances_are_deterministic() {
        let candles = random_walk(300, 77);
        let config = StrategiesConfig::default();

        for name in STRATEGY_NAMES {
            let mut a = create_strategy(name, &config).unwrap();
            let mut b = create_strategy(name, &config).unwrap();
            let first = run_growing(a.as_mut(), &candles);
            assert_eq!(first, run_growing(b.as_mut(), &candles), "{} diverged", name);
            assert_latched(&first);
        }
    }
}
