use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::collections::HashMap;

pub const DEFAULT_SYMBOL: &str = "SPY";
pub const DEFAULT_STARTING_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_COMMISSION_RATE: f64 = 0.001;
pub const DEFAULT_START_DATE: &str = "2020-01-01";
pub const DEFAULT_END_DATE: &str = "2024-12-31";

/// Run-wide settings handed to the engine at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: String,
    pub starting_capital: f64,
    pub commission_rate: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            starting_capital: DEFAULT_STARTING_CAPITAL,
            commission_rate: DEFAULT_COMMISSION_RATE,
            start_date: default_date(DEFAULT_START_DATE),
            end_date: default_date(DEFAULT_END_DATE),
        }
    }
}

impl BacktestConfig {
    /// Build a config from `BACKTEST_*` settings, falling back to defaults for missing keys.
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();

        let symbol = optional_setting(settings, "BACKTEST_SYMBOL")
            .map(|value| value.to_uppercase())
            .unwrap_or(defaults.symbol);
        let starting_capital = optional_setting_f64(
            settings,
            "BACKTEST_STARTING_CAPITAL",
            Some(0.0),
            None,
        )?
        .unwrap_or(defaults.starting_capital);
        let commission_rate =
            optional_setting_f64(settings, "BACKTEST_COMMISSION_RATE", Some(0.0), Some(1.0))?
                .unwrap_or(defaults.commission_rate);
        let start_date = optional_setting_date(settings, "BACKTEST_START_DATE")?
            .unwrap_or(defaults.start_date);
        let end_date =
            optional_setting_date(settings, "BACKTEST_END_DATE")?.unwrap_or(defaults.end_date);

        let config = Self {
            symbol,
            starting_capital,
            commission_rate,
            start_date,
            end_date,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(anyhow!("Symbol must not be empty"));
        }
        if !self.starting_capital.is_finite() || self.starting_capital <= 0.0 {
            return Err(anyhow!(
                "Starting capital must be a positive number (value: {})",
                self.starting_capital
            ));
        }
        if !self.commission_rate.is_finite()
            || self.commission_rate < 0.0
            || self.commission_rate >= 1.0
        {
            return Err(anyhow!(
                "Commission rate must be in [0, 1) (value: {})",
                self.commission_rate
            ));
        }
        if self.end_date < self.start_date {
            return Err(anyhow!(
                "End date ({}) must be on or after start date ({})",
                self.end_date,
                self.start_date
            ));
        }
        Ok(())
    }
}

fn default_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or(NaiveDate::MIN)
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        anyhow!(
            "Setting {} must be a date in YYYY-MM-DD format (value: {})",
            key,
            raw
        )
    })
}

fn optional_setting_date(settings: &HashMap<String, String>, key: &str) -> Result<Option<NaiveDate>> {
    optional_setting(settings, key)
        .map(|raw| parse_date(key, raw))
        .transpose()
}

fn optional_setting_f64(
    settings: &HashMap<String, String>,
    key: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<Option<f64>> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(None);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if let Some(min_value) = min {
        if value < min_value {
            return Err(anyhow!(
                "Setting {} must be >= {} (value: {})",
                key,
                min_value,
                raw
            ));
        }
    }
    if let Some(max_value) = max {
        if value > max_value {
            return Err(anyhow!(
                "Setting {} must be <= {} (value: {})",
                key,
                max_value,
                raw
            ));
        }
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn empty_settings_fall_back_to_defaults() {
        let config = BacktestConfig::from_settings_map(&HashMap::new()).unwrap();
        assert_eq!(config, BacktestConfig::default());
        assert_eq!(config.symbol, "SPY");
        assert!((config.starting_capital - 100_000.0).abs() < 1e-9);
    }

    #[test]
    fn reads_overrides_and_uppercases_symbol() {
        let config = BacktestConfig::from_settings_map(&settings(&[
            ("BACKTEST_SYMBOL", " aapl "),
            ("BACKTEST_STARTING_CAPITAL", "25000"),
            ("BACKTEST_COMMISSION_RATE", "0"),
            ("BACKTEST_START_DATE", "2021-03-01"),
            ("BACKTEST_END_DATE", "2021-06-30"),
        ]))
        .unwrap();

        assert_eq!(config.symbol, "AAPL");
        assert!((config.starting_capital - 25_000.0).abs() < 1e-9);
        assert_eq!(config.commission_rate, 0.0);
        assert_eq!(
            config.start_date,
            NaiveDate::from_ymd_opt(2021, 3, 1).unwrap()
        );
    }

    #[test]
    fn rejects_commission_of_one_or_more() {
        let err = BacktestConfig::from_settings_map(&settings(&[(
            "BACKTEST_COMMISSION_RATE",
            "1",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("Commission rate"));
    }

    #[test]
    fn rejects_malformed_dates_and_inverted_ranges() {
        assert!(BacktestConfig::from_settings_map(&settings(&[(
            "BACKTEST_START_DATE",
            "01/02/2020"
        )]))
        .is_err());

        assert!(BacktestConfig::from_settings_map(&settings(&[
            ("BACKTEST_START_DATE", "2022-01-01"),
            ("BACKTEST_END_DATE", "2021-01-01"),
        ]))
        .is_err());
    }

    #[test]
    fn rejects_zero_capital() {
        assert!(BacktestConfig::from_settings_map(&settings(&[(
            "BACKTEST_STARTING_CAPITAL",
            "0"
        )]))
        .is_err());
    }
}
