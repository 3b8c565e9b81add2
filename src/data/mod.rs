pub mod candles;
pub mod loader;

pub use candles::Candle;
pub use loader::{most_recent, CandleSource, CsvCandleSource};
