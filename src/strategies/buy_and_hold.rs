use crate::models::*;
use crate::param_utils::get_param_f64;
use crate::portfolio::Portfolio;
use std::collections::HashMap;

pub struct BuyAndHoldStrategy {
    template_id: String,
    symbol: String,
    cash_buffer_ratio: f64,
    entered: bool,
}

impl BuyAndHoldStrategy {
    pub fn new(symbol: &str, parameters: HashMap<String, f64>) -> Self {
        // Leaves room for commission so the single entry order is not rejected.
        let cash_buffer_ratio = get_param_f64(&parameters, "cashBufferRatio", 0.01).clamp(0.0, 0.99);
        Self {
            template_id: "buy_and_hold".to_string(),
            symbol: symbol.to_string(),
            cash_buffer_ratio,
            entered: false,
        }
    }
}

impl super::Strategy for BuyAndHoldStrategy {
    fn template_id(&self) -> &str {
        &self.template_id
    }

    fn min_data_points(&self) -> usize {
        1
    }

    fn on_data(&mut self, history: &[PriceBar], portfolio: &Portfolio) -> Vec<OrderRequest> {
        if self.entered || portfolio.position(&self.symbol) > 0 {
            self.entered = true;
            return Vec::new();
        }
        let Some(today) = history.last() else {
            return Vec::new();
        };
        if today.close <= 0.0 {
            return Vec::new();
        }

        let budget = portfolio.cash() * (1.0 - self.cash_buffer_ratio);
        let quantity = (budget / today.close).floor();
        if quantity < 1.0 {
            return Vec::new();
        }
        vec![OrderRequest::buy(&self.symbol, quantity as u64)]
    }
}
