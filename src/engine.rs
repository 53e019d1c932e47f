use crate::config::BacktestConfig;
use crate::models::*;
use crate::portfolio::{LedgerError, Portfolio};
use crate::strategy::Strategy;
use log::debug;
use std::collections::HashMap;

/// Day-by-day simulation of one strategy over one symbol's daily bars.
pub struct Engine {
    pub config: BacktestConfig,
}

impl Engine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Replays `bars` in date order, exposing only the bars up to the current day.
    ///
    /// Orders are filled at the current day's close. Rejected orders are dropped;
    /// contract violations (bad prices, non-ascending dates) abort the run.
    pub fn backtest(
        &self,
        strategy: &mut dyn Strategy,
        bars: &[PriceBar],
    ) -> Result<BacktestRun, LedgerError> {
        let symbol = self.config.symbol.as_str();
        let commission_rate = self.config.commission_rate;
        let mut portfolio = Portfolio::new(self.config.starting_capital);
        let mut fills = Vec::new();
        let mut rejected_orders = 0usize;

        for (index, bar) in bars.iter().enumerate() {
            let history = &bars[..=index];
            let orders = strategy.on_data(history, &portfolio);

            for order in orders {
                let outcome = if order.symbol != symbol {
                    Err(LedgerError::UnknownSymbol {
                        requested: order.symbol.clone(),
                        expected: symbol.to_string(),
                    })
                } else {
                    portfolio.apply_order(&order, bar.close, commission_rate)
                };

                match outcome {
                    Ok(commission) => fills.push(ExecutedFill {
                        date: bar.date,
                        symbol: order.symbol,
                        side: order.side,
                        quantity: order.quantity,
                        price: bar.close,
                        commission,
                    }),
                    Err(err) if err.is_order_rejection() => {
                        debug!("{} {} order rejected on {}: {}", order.side, symbol, bar.date, err);
                        rejected_orders += 1;
                    }
                    Err(err) => return Err(err),
                }
            }

            let prices = HashMap::from([(symbol.to_string(), bar.close)]);
            let equity = portfolio.mark_to_market(&prices)?;
            portfolio.record_equity(bar.date, equity)?;
        }

        let (final_cash, positions, equity_curve) = portfolio.into_parts();
        Ok(BacktestRun {
            symbol: symbol.to_string(),
            strategy: strategy.template_id().to_string(),
            starting_capital: self.config.starting_capital,
            final_cash,
            positions,
            equity_curve,
            fills,
            rejected_orders,
        })
    }
}
