use crate::indicators;
use crate::models::*;
use crate::param_utils::{get_param_quantity, get_param_usize_at_least};
use crate::portfolio::Portfolio;
use std::collections::HashMap;

pub struct SmaCrossoverStrategy {
    template_id: String,
    symbol: String,
    short_window: usize,
    long_window: usize,
    quantity: u64,
}

impl SmaCrossoverStrategy {
    pub fn new(symbol: &str, parameters: HashMap<String, f64>) -> Self {
        let short_window = get_param_usize_at_least(&parameters, "shortWindow", 20, 1);
        let long_window = get_param_usize_at_least(&parameters, "longWindow", 50, 1);
        let quantity = get_param_quantity(&parameters, "quantity", 100);
        Self {
            template_id: "sma_crossover".to_string(),
            symbol: symbol.to_string(),
            short_window,
            long_window,
            quantity,
        }
    }
}

impl super::Strategy for SmaCrossoverStrategy {
    fn template_id(&self) -> &str {
        &self.template_id
    }

    fn min_data_points(&self) -> usize {
        self.short_window.max(self.long_window) + 1
    }

    fn on_data(&mut self, history: &[PriceBar], portfolio: &Portfolio) -> Vec<OrderRequest> {
        let n = history.len();
        // Today's averages plus yesterday's.
        if n < self.min_data_points() {
            return Vec::new();
        }

        let closes = indicators::closes(history);
        let today = n - 1;
        let yesterday = n - 2;
        let (
            Some(short_today),
            Some(short_yesterday),
            Some(long_today),
            Some(long_yesterday),
        ) = (
            indicators::sma_at(&closes, self.short_window, today),
            indicators::sma_at(&closes, self.short_window, yesterday),
            indicators::sma_at(&closes, self.long_window, today),
            indicators::sma_at(&closes, self.long_window, yesterday),
        )
        else {
            return Vec::new();
        };

        let held = portfolio.position(&self.symbol);

        let golden_cross = short_yesterday < long_yesterday && short_today > long_today;
        let death_cross = short_yesterday > long_yesterday && short_today < long_today;

        if golden_cross && held == 0 {
            return vec![OrderRequest::buy(&self.symbol, self.quantity)];
        }
        if death_cross && held > 0 {
            return vec![OrderRequest::sell(&self.symbol, held.min(self.quantity))];
        }

        Vec::new()
    }
}
