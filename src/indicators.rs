use crate::models::PriceBar;
use statrs::statistics::Statistics;

pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|bar| bar.close).collect()
}

/// Mean of the `period` values ending at `index` (inclusive).
pub fn sma_at(prices: &[f64], period: usize, index: usize) -> Option<f64> {
    let window = trailing_window(prices, period, index)?;
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Sample standard deviation of the `period` values ending at `index` (inclusive).
pub fn rolling_std_at(prices: &[f64], period: usize, index: usize) -> Option<f64> {
    if period < 2 {
        return None;
    }
    let window = trailing_window(prices, period, index)?;
    let std_dev = window.iter().std_dev();
    std_dev.is_finite().then_some(std_dev)
}

/// Z-score of the value at `index` against its trailing window.
pub fn zscore_at(prices: &[f64], period: usize, index: usize) -> Option<f64> {
    let mean = sma_at(prices, period, index)?;
    let std_dev = rolling_std_at(prices, period, index)?;
    if std_dev == 0.0 {
        return None;
    }
    Some((prices[index] - mean) / std_dev)
}

fn trailing_window(prices: &[f64], period: usize, index: usize) -> Option<&[f64]> {
    if period == 0 || index >= prices.len() || index + 1 < period {
        return None;
    }
    Some(&prices[index + 1 - period..=index])
}
