//! Candle loading from CSV files
//!
//! Rows are `timestamp,open,high,low,close,volume`. The timestamp column
//! accepts either unix milliseconds or an RFC 3339 string.

use super::candles::Candle;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use csv::{Reader, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Anything that can hand the core an ascending candle series
pub trait CandleSource {
    /// Load up to `limit` most recent candles for `symbol`, oldest first
    fn load_candles(&self, symbol: &str, limit: Option<usize>) -> Result<Vec<Candle>>;
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

impl CandleRow {
    fn into_candle(self) -> Result<Candle> {
        Ok(Candle {
            timestamp: parse_timestamp(&self.timestamp)?,
            open: parse_decimal("open", &self.open)?,
            high: parse_decimal("high", &self.high)?,
            low: parse_decimal("low", &self.low)?,
            close: parse_decimal("close", &self.close)?,
            volume: parse_decimal("volume", &self.volume)?,
        })
    }
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .with_context(|| format!("Invalid {} value: {:?}", column, raw))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ms) = raw.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(ms)
            .single()
            .with_context(|| format!("Timestamp out of range: {}", ms));
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp: {:?}", raw))
}

/// Keep only the last `limit` candles of an ascending series
pub fn most_recent(mut candles: Vec<Candle>, limit: Option<usize>) -> Vec<Candle> {
    if let Some(limit) = limit {
        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }
    }
    candles
}

/// Reads candles from `<data_dir>/<symbol>.csv`, where `/` in the symbol
/// becomes `_` (BTC/USD -> BTC_USD.csv).
pub struct CsvCandleSource {
    data_dir: PathBuf,
}

impl CsvCandleSource {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol.replace('/', "_")))
    }

    /// Load every candle in a CSV file, sorted by timestamp
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<Candle>> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open candle file: {:?}", path.as_ref()))?;

        let mut reader = Reader::from_reader(file);
        let mut candles = Vec::new();

        for (line, result) in reader.deserialize::<CandleRow>().enumerate() {
            let row = result.with_context(|| format!("Failed to parse candle row {}", line + 1))?;
            let candle = row.into_candle()?;
            if !candle.is_consistent() {
                bail!("Candle row {} has high/low outside open/close", line + 1);
            }
            candles.push(candle);
        }

        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);

        debug!("Loaded {} candles from {:?}", candles.len(), path.as_ref());
        Ok(candles)
    }

    /// Write candles as CSV with millisecond timestamps
    pub fn save_file<P: AsRef<Path>>(candles: &[Candle], path: P) -> Result<()> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create candle file: {:?}", path.as_ref()))?;

        let mut writer = Writer::from_writer(file);
        writer.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;

        for candle in candles {
            writer.write_record([
                candle.timestamp.timestamp_millis().to_string(),
                candle.open.to_string(),
                candle.high.to_string(),
                candle.low.to_string(),
                candle.close.to_string(),
                candle.volume.to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl CandleSource for CsvCandleSource {
    fn load_candles(&self, symbol: &str, limit: Option<usize>) -> Result<Vec<Candle>> {
        let path = self.path_for(symbol);
        let candles = most_recent(Self::load_file(&path)?, limit);

        info!("{}: {} candles from {:?}", symbol, candles.len(), path);
        Ok(candles)
    }
}
