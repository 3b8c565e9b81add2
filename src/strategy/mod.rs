pub mod base;
pub mod bollinger;
pub mod crossover;
pub mod indicators;
pub mod macd;
pub mod registry;
pub mod rsi;
pub mod rsi_ma_combo;
pub mod scalping;

#[cfg(test)]
pub mod testutil;

pub use base::{Signal, SignalLatch, SignalType, Strategy};
pub use bollinger::{BollingerConfig, BollingerStrategy};
pub use crossover::{CrossoverConfig, CrossoverStrategy};
pub use macd::{MACDConfig, MACDStrategy};
pub use registry::{all_strategies, create_strategy, parse_strategy_list, STRATEGY_NAMES};
pub use rsi::{RSIConfig, RSIStrategy};
pub use rsi_ma_combo::{RsiMaComboConfig, RsiMaComboStrategy};
pub use scalping::{PositionSide, ScalpingConfig, ScalpingStrategy};
