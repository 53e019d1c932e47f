use crate::models::PriceBar;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Daily bars for one symbol, sorted ascending with unique dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Sorts bars by date, keeps the first bar of any duplicated date and rejects
    /// unusable closes.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Result<Self> {
        let symbol: String = symbol.into();
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(anyhow!("Price series symbol must not be empty"));
        }

        if let Some(bad) = bars
            .iter()
            .find(|bar| !bar.close.is_finite() || bar.close <= 0.0)
        {
            return Err(anyhow!(
                "{} has an invalid close {} on {}",
                symbol,
                bad.close,
                bad.date
            ));
        }

        bars.sort_by(|a, b| a.date.cmp(&b.date));
        let before = bars.len();
        bars.dedup_by(|later, earlier| later.date == earlier.date);
        let dropped = before - bars.len();
        if dropped > 0 {
            warn!(
                "Dropped {} duplicate bar(s) from {} price series",
                dropped, symbol
            );
        }

        Ok(Self { symbol, bars })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open price data at {}", path.display()))?;
        let raw: PriceSeries = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Price data decode failed for {}", path.display()))?;
        let series = Self::new(raw.symbol, raw.bars)?;
        info!(
            "Loaded {} bars for {} from {}",
            series.bars.len(),
            series.symbol,
            path.display()
        );
        Ok(series)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create price data directory {}", parent.display())
                })?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("Unable to create price data file {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write price data to {}", path.display()))?;
        Ok(())
    }

    /// Keeps bars dated within `[start, end]`; either bound may be open.
    pub fn restrict_to_date_range(
        self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        let bars = self
            .bars
            .into_iter()
            .filter(|bar| start.map_or(true, |start| bar.date >= start))
            .filter(|bar| end.map_or(true, |end| bar.date <= end))
            .collect();
        Self {
            symbol: self.symbol,
            bars,
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|bar| bar.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|bar| bar.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, close: f64) -> PriceBar {
        PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, day).unwrap()
    }

    #[test]
    fn sorts_and_dedups_by_date() {
        let series = PriceSeries::new(
            "spy",
            vec![bar(d(3), 103.0), bar(d(1), 101.0), bar(d(3), 999.0), bar(d(2), 102.0)],
        )
        .unwrap();

        assert_eq!(series.symbol, "SPY");
        let closes: Vec<f64> = series.bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![101.0, 102.0, 103.0]);
    }

    #[test]
    fn rejects_non_positive_close() {
        let err = PriceSeries::new("SPY", vec![bar(d(1), 0.0)]).unwrap_err();
        assert!(err.to_string().contains("invalid close"));
        assert!(PriceSeries::new("SPY", vec![bar(d(1), f64::NAN)]).is_err());
    }

    #[test]
    fn restricts_inclusive_date_range() {
        let series = PriceSeries::new(
            "SPY",
            (1..=10).map(|day| bar(d(day), 100.0 + day as f64)).collect(),
        )
        .unwrap();

        let restricted = series.clone().restrict_to_date_range(Some(d(3)), Some(d(5)));
        assert_eq!(restricted.first_date(), Some(d(3)));
        assert_eq!(restricted.last_date(), Some(d(5)));
        assert_eq!(restricted.bars.len(), 3);

        let open_ended = series.restrict_to_date_range(None, Some(d(2)));
        assert_eq!(open_ended.bars.len(), 2);
    }

    #[test]
    fn round_trips_through_json_file() {
        let dir = std::env::temp_dir().join(format!("backtest-price-data-{}", std::process::id()));
        let path = dir.join("spy.json");
        let series = PriceSeries::new("SPY", vec![bar(d(1), 100.0), bar(d(2), 101.5)]).unwrap();

        series.save_to_file(&path).unwrap();
        let loaded = PriceSeries::load_from_file(&path).unwrap();
        assert_eq!(loaded, series);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PriceSeries::load_from_file("/nonexistent/prices.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/prices.json"));
    }
}
