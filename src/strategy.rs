use crate::models::{OrderRequest, PriceBar};
use crate::portfolio::Portfolio;
use anyhow::Result;
use std::collections::HashMap;

/// Decision logic driven once per simulated day.
///
/// `history` is the causal view: every bar up to and including the current day,
/// never anything later. Implementations must not hold on to it between calls.
pub trait Strategy {
    fn template_id(&self) -> &str;
    fn min_data_points(&self) -> usize;
    fn on_data(&mut self, history: &[PriceBar], portfolio: &Portfolio) -> Vec<OrderRequest>;
}

#[path = "strategies/sma_crossover.rs"]
pub mod sma_crossover;

pub use sma_crossover::SmaCrossoverStrategy;

#[path = "strategies/mean_reversion.rs"]
pub mod mean_reversion;

pub use mean_reversion::MeanReversionStrategy;

#[path = "strategies/buy_and_hold.rs"]
pub mod buy_and_hold;

pub use buy_and_hold::BuyAndHoldStrategy;

pub const STRATEGY_TEMPLATES: [&str; 3] = ["sma_crossover", "mean_reversion", "buy_and_hold"];

pub fn create_strategy(
    template_id: &str,
    symbol: &str,
    parameters: HashMap<String, f64>,
) -> Result<Box<dyn Strategy + Send>> {
    match template_id {
        "sma_crossover" => Ok(Box::new(SmaCrossoverStrategy::new(symbol, parameters))),
        "mean_reversion" => Ok(Box::new(MeanReversionStrategy::new(symbol, parameters))),
        "buy_and_hold" => Ok(Box::new(BuyAndHoldStrategy::new(symbol, parameters))),
        _ => Err(anyhow::anyhow!(
            "Unknown strategy template: {} (expected one of {})",
            template_id,
            STRATEGY_TEMPLATES.join(", ")
        )),
    }
}
