use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A market order for the current simulated day. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
}

impl OrderRequest {
    pub fn buy(symbol: impl Into<String>, quantity: u64) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Buy,
            quantity,
        }
    }

    pub fn sell(symbol: impl Into<String>, quantity: u64) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Sell,
            quantity,
        }
    }
}

/// An accepted order as it hit the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedFill {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
    pub commission: f64,
}

impl ExecutedFill {
    /// Per-share cash impact including commission: cost for buys, proceeds for sells.
    pub fn net_price_per_share(&self) -> f64 {
        if self.quantity == 0 {
            return self.price;
        }
        let per_share_commission = self.commission / self.quantity as f64;
        match self.side {
            OrderSide::Buy => self.price + per_share_commission,
            OrderSide::Sell => self.price - per_share_commission,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRun {
    pub symbol: String,
    pub strategy: String,
    pub starting_capital: f64,
    pub final_cash: f64,
    pub positions: BTreeMap<String, u64>,
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<ExecutedFill>,
    pub rejected_orders: usize,
}

impl BacktestRun {
    pub fn trade_count(&self) -> usize {
        self.fills.len()
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|point| point.equity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub starting_equity: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub total_trades: usize,
    pub completed_round_trips: usize,
    pub win_rate_pct: f64,
    pub buy_and_hold_return_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileSummary {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResult {
    pub simulation_count: usize,
    pub total_return_pct: PercentileSummary,
    pub sharpe_ratio: PercentileSummary,
    pub max_drawdown_pct: PercentileSummary,
    pub probability_of_loss: f64,
    /// One entry per trial, in the order trials were executed.
    pub all_total_returns: Vec<f64>,
}
