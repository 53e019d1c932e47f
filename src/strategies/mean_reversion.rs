use crate::indicators;
use crate::models::*;
use crate::param_utils::{get_param_f64, get_param_quantity, get_param_usize_at_least};
use crate::portfolio::Portfolio;
use std::collections::HashMap;

/// Buys when the close sits far below its rolling mean, exits once it recovers.
pub struct MeanReversionStrategy {
    template_id: String,
    symbol: String,
    lookback: usize,
    entry_z: f64,
    exit_z: f64,
    quantity: u64,
}

impl MeanReversionStrategy {
    pub fn new(symbol: &str, parameters: HashMap<String, f64>) -> Self {
        let lookback = get_param_usize_at_least(&parameters, "lookback", 20, 2);
        let entry_z = get_param_f64(&parameters, "entryZ", -2.0);
        let exit_z = get_param_f64(&parameters, "exitZ", 0.0);
        let quantity = get_param_quantity(&parameters, "quantity", 100);
        Self {
            template_id: "mean_reversion".to_string(),
            symbol: symbol.to_string(),
            lookback,
            entry_z,
            exit_z,
            quantity,
        }
    }
}

impl super::Strategy for MeanReversionStrategy {
    fn template_id(&self) -> &str {
        &self.template_id
    }

    fn min_data_points(&self) -> usize {
        self.lookback
    }

    fn on_data(&mut self, history: &[PriceBar], portfolio: &Portfolio) -> Vec<OrderRequest> {
        let n = history.len();
        if n < self.lookback {
            return Vec::new();
        }

        let closes = indicators::closes(history);
        let Some(z) = indicators::zscore_at(&closes, self.lookback, n - 1) else {
            return Vec::new();
        };

        let held = portfolio.position(&self.symbol);
        if z < self.entry_z && held == 0 {
            return vec![OrderRequest::buy(&self.symbol, self.quantity)];
        }
        if z > self.exit_z && held > 0 {
            return vec![OrderRequest::sell(&self.symbol, held.min(self.quantity))];
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use chrono::{Duration, NaiveDate};

    fn bars(prices: &[f64]) -> Vec<PriceBar> {
        let base = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PriceBar {
                date: base + Duration::days(i as i64),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: 1_000.0,
            })
            .collect()
    }

    fn strategy() -> MeanReversionStrategy {
        MeanReversionStrategy::new(
            "SPY",
            HashMap::from([
                ("lookback".to_string(), 5.0),
                ("entryZ".to_string(), -1.5),
                ("quantity".to_string(), 10.0),
            ]),
        )
    }

    #[test]
    fn no_orders_before_lookback_or_on_flat_prices() {
        let mut strategy = strategy();
        let portfolio = Portfolio::new(10_000.0);
        assert!(strategy.on_data(&bars(&[10.0; 4]), &portfolio).is_empty());
        assert!(strategy.on_data(&bars(&[10.0; 8]), &portfolio).is_empty());
    }

    #[test]
    fn buys_on_deep_dip_when_flat() {
        let mut strategy = strategy();
        let portfolio = Portfolio::new(10_000.0);
        let orders = strategy.on_data(&bars(&[10.0, 10.0, 10.0, 10.0, 6.0]), &portfolio);
        assert_eq!(orders, vec![OrderRequest::buy("SPY", 10)]);
    }

    #[test]
    fn exits_above_mean_when_holding() {
        let mut strategy = strategy();
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio
            .apply_order(&OrderRequest::buy("SPY", 10), 6.0, 0.0)
            .unwrap();
        let orders = strategy.on_data(&bars(&[6.0, 7.0, 8.0, 9.0, 11.0]), &portfolio);
        assert_eq!(orders, vec![OrderRequest::sell("SPY", 10)]);
    }
}
