pub mod backtest;
pub mod config;
pub mod data;
pub mod strategy;

pub use config::Config;
