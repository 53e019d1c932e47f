use crate::models::{EquityPoint, OrderRequest, OrderSide};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient funds for {symbol}: required {required:.2}, available {available:.2}")]
    InsufficientFunds {
        symbol: String,
        required: f64,
        available: f64,
    },
    #[error("insufficient shares of {symbol}: requested {requested}, held {held}")]
    InsufficientShares {
        symbol: String,
        requested: u64,
        held: u64,
    },
    #[error("order quantity for {0} must be positive")]
    InvalidQuantity(String),
    #[error("order symbol {requested} does not match the simulated series {expected}")]
    UnknownSymbol { requested: String, expected: String },
    #[error("execution price must be positive and finite (value: {0})")]
    InvalidPrice(f64),
    #[error("commission rate must be in [0, 1) (value: {0})")]
    InvalidCommissionRate(f64),
    #[error("no price available for held symbol {0}")]
    MissingPrice(String),
    #[error("equity date {date} is not after the last recorded date {last}")]
    NonMonotonicDate { date: NaiveDate, last: NaiveDate },
}

impl LedgerError {
    /// Order-level failures drop the order; everything else is a wiring bug.
    pub fn is_order_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientFunds { .. }
                | LedgerError::InsufficientShares { .. }
                | LedgerError::InvalidQuantity(_)
                | LedgerError::UnknownSymbol { .. }
        )
    }
}

/// Cash, share counts and the daily equity log of one backtest run.
#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: f64,
    positions: BTreeMap<String, u64>,
    equity_history: Vec<EquityPoint>,
    trade_count: usize,
}

impl Portfolio {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            cash: starting_cash,
            positions: BTreeMap::new(),
            equity_history: Vec::new(),
            trade_count: 0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self, symbol: &str) -> u64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    pub fn positions(&self) -> &BTreeMap<String, u64> {
        &self.positions
    }

    pub fn equity_history(&self) -> &[EquityPoint] {
        &self.equity_history
    }

    pub fn trade_count(&self) -> usize {
        self.trade_count
    }

    /// Execute a market order in full or not at all.
    ///
    /// Returns the commission charged. On error the portfolio is left untouched.
    pub fn apply_order(
        &mut self,
        order: &OrderRequest,
        execution_price: f64,
        commission_rate: f64,
    ) -> Result<f64, LedgerError> {
        if !execution_price.is_finite() || execution_price <= 0.0 {
            return Err(LedgerError::InvalidPrice(execution_price));
        }
        if !commission_rate.is_finite() || !(0.0..1.0).contains(&commission_rate) {
            return Err(LedgerError::InvalidCommissionRate(commission_rate));
        }
        if order.quantity == 0 {
            return Err(LedgerError::InvalidQuantity(order.symbol.clone()));
        }

        let gross = execution_price * order.quantity as f64;
        match order.side {
            OrderSide::Buy => {
                let required = execution_price * order.quantity as f64 * (1.0 + commission_rate);
                if self.cash < required {
                    return Err(LedgerError::InsufficientFunds {
                        symbol: order.symbol.clone(),
                        required,
                        available: self.cash,
                    });
                }
                self.cash -= required;
                *self.positions.entry(order.symbol.clone()).or_insert(0) += order.quantity;
                self.trade_count += 1;
                Ok(required - gross)
            }
            OrderSide::Sell => {
                let held = self.position(&order.symbol);
                if held < order.quantity {
                    return Err(LedgerError::InsufficientShares {
                        symbol: order.symbol.clone(),
                        requested: order.quantity,
                        held,
                    });
                }
                let proceeds = execution_price * order.quantity as f64 * (1.0 - commission_rate);
                self.cash += proceeds;
                let remaining = held - order.quantity;
                if remaining == 0 {
                    self.positions.remove(&order.symbol);
                } else {
                    self.positions.insert(order.symbol.clone(), remaining);
                }
                self.trade_count += 1;
                Ok(gross - proceeds)
            }
        }
    }

    pub fn mark_to_market(&self, prices: &HashMap<String, f64>) -> Result<f64, LedgerError> {
        let mut equity = self.cash;
        for (symbol, shares) in &self.positions {
            let price = prices
                .get(symbol)
                .ok_or_else(|| LedgerError::MissingPrice(symbol.clone()))?;
            equity += *shares as f64 * price;
        }
        Ok(equity)
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) -> Result<(), LedgerError> {
        if let Some(last) = self.equity_history.last() {
            if date <= last.date {
                return Err(LedgerError::NonMonotonicDate {
                    date,
                    last: last.date,
                });
            }
        }
        self.equity_history.push(EquityPoint { date, equity });
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (f64, BTreeMap<String, u64>, Vec<EquityPoint>) {
        (self.cash, self.positions, self.equity_history)
    }
}
