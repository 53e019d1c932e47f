use crate::models::*;
use statrs::statistics::Statistics;
use std::collections::{HashMap, VecDeque};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;
const STD_EPSILON: f64 = 1e-12;

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    pub fn summarize(
        equity_curve: &[EquityPoint],
        fills: &[ExecutedFill],
        bars: &[PriceBar],
    ) -> PerformanceReport {
        let equities = equity_values(equity_curve);
        let returns = daily_returns(&equities);
        let (completed_round_trips, winning_round_trips) = Self::round_trip_outcomes(fills);
        let win_rate_pct = if completed_round_trips > 0 {
            winning_round_trips as f64 / completed_round_trips as f64 * 100.0
        } else {
            0.0
        };

        PerformanceReport {
            starting_equity: equities.first().copied().unwrap_or(0.0),
            final_equity: equities.last().copied().unwrap_or(0.0),
            total_return_pct: total_return_pct(&equities),
            annualized_return_pct: Self::annualized_return_pct(equity_curve),
            sharpe_ratio: sharpe_ratio(&returns),
            max_drawdown_pct: max_drawdown_pct(&equities),
            total_trades: fills.len(),
            completed_round_trips,
            win_rate_pct,
            buy_and_hold_return_pct: buy_and_hold_return_pct(bars),
        }
    }

    fn annualized_return_pct(equity_curve: &[EquityPoint]) -> f64 {
        let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
            return 0.0;
        };
        let elapsed_days = (last.date - first.date).num_days();
        if elapsed_days <= 0 || first.equity <= 0.0 {
            return 0.0;
        }

        let total_return_ratio = last.equity / first.equity;
        if total_return_ratio <= 0.0 {
            return -100.0;
        }

        (total_return_ratio.powf(CALENDAR_DAYS_PER_YEAR / elapsed_days as f64) - 1.0) * 100.0
    }

    /// FIFO-matches sold shares against open buy lots per symbol.
    ///
    /// Each slice of a sell matched against one lot counts as a round trip, so a
    /// split exit scores every part. Returns (completed slices, winning slices).
    fn round_trip_outcomes(fills: &[ExecutedFill]) -> (usize, usize) {
        // (remaining shares, net cost per share)
        let mut open_lots: HashMap<&str, VecDeque<(u64, f64)>> = HashMap::new();
        let mut completed = 0usize;
        let mut wins = 0usize;

        for fill in fills {
            match fill.side {
                OrderSide::Buy => {
                    if fill.quantity > 0 {
                        open_lots
                            .entry(fill.symbol.as_str())
                            .or_default()
                            .push_back((fill.quantity, fill.net_price_per_share()));
                    }
                }
                OrderSide::Sell => {
                    let Some(lots) = open_lots.get_mut(fill.symbol.as_str()) else {
                        continue;
                    };
                    let exit_price = fill.net_price_per_share();
                    let mut unmatched = fill.quantity;
                    while unmatched > 0 {
                        let Some(lot) = lots.front_mut() else {
                            break;
                        };
                        let matched = unmatched.min(lot.0);
                        completed += 1;
                        if exit_price > lot.1 {
                            wins += 1;
                        }
                        lot.0 -= matched;
                        unmatched -= matched;
                        if lot.0 == 0 {
                            lots.pop_front();
                        }
                    }
                }
            }
        }

        (completed, wins)
    }
}

pub fn equity_values(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve.iter().map(|point| point.equity).collect()
}

/// Simple returns between consecutive equity values; empty for fewer than two values.
pub fn daily_returns(equities: &[f64]) -> Vec<f64> {
    equities
        .windows(2)
        .map(|window| {
            let prev_value = window[0];
            let curr_value = window[1];
            if prev_value > 0.0 {
                (curr_value - prev_value) / prev_value
            } else {
                0.0
            }
        })
        .collect()
}

pub fn total_return_pct(equities: &[f64]) -> f64 {
    match (equities.first(), equities.last()) {
        (Some(&initial), Some(&last)) if initial > 0.0 => (last - initial) / initial * 100.0,
        _ => 0.0,
    }
}

/// Annualized Sharpe ratio from daily returns, using the sample standard deviation
/// and no risk-free rate.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let std_dev = returns.iter().std_dev();
    if !std_dev.is_finite() || std_dev <= STD_EPSILON {
        return 0.0;
    }
    let mean_return = returns.iter().mean();

    mean_return / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Most negative peak-to-trough decline, as a percentage (always <= 0).
pub fn max_drawdown_pct(equities: &[f64]) -> f64 {
    let Some(&first) = equities.first() else {
        return 0.0;
    };

    let mut peak_value = first;
    let mut max_drawdown = 0.0_f64;
    for &value in equities {
        if value > peak_value {
            peak_value = value;
        } else if peak_value > 0.0 {
            let drawdown = (value - peak_value) / peak_value;
            if drawdown < max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }

    max_drawdown * 100.0
}

pub fn drawdown_series(equity_curve: &[EquityPoint]) -> Vec<EquityPoint> {
    let mut peak_value = f64::NEG_INFINITY;
    equity_curve
        .iter()
        .map(|point| {
            peak_value = peak_value.max(point.equity);
            let drawdown = if peak_value > 0.0 {
                (point.equity - peak_value) / peak_value * 100.0
            } else {
                0.0
            };
            EquityPoint {
                date: point.date,
                equity: drawdown,
            }
        })
        .collect()
}

/// Close-to-close return of the whole series, ignoring commission.
pub fn buy_and_hold_return_pct(bars: &[PriceBar]) -> f64 {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) if first.close > 0.0 => {
            (last.close - first.close) / first.close * 100.0
        }
        _ => 0.0,
    }
}

/// Starting capital scaled by each day's close relative to the first close.
pub fn buy_and_hold_curve(bars: &[PriceBar], starting_capital: f64) -> Vec<EquityPoint> {
    let Some(initial_close) = bars.first().map(|bar| bar.close).filter(|close| *close > 0.0)
    else {
        return Vec::new();
    };
    bars.iter()
        .map(|bar| EquityPoint {
            date: bar.date,
            equity: starting_capital * (bar.close / initial_close),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn date(days_offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(days_offset)
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                date: date(i as i64),
                equity,
            })
            .collect()
    }

    fn fill(symbol: &str, side: OrderSide, price: f64, commission: f64) -> ExecutedFill {
        ExecutedFill {
            date: date(0),
            symbol: symbol.to_string(),
            side,
            quantity: 10,
            price,
            commission,
        }
    }

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: date(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect()
    }

    #[test]
    fn total_return_for_round_trip_scenario() {
        let report = PerformanceCalculator::summarize(
            &curve(&[100_000.0, 100_010.0, 99_990.0, 100_050.0]),
            &[],
            &bars(&[100.0, 101.0, 99.0, 105.0]),
        );

        assert!((report.total_return_pct - 0.05).abs() < 1e-9);
        assert!((report.buy_and_hold_return_pct - 5.0).abs() < 1e-9);
        assert_eq!(report.final_equity, 100_050.0);
    }

    #[test]
    fn annualizes_over_calendar_days() {
        let equity_curve = vec![
            EquityPoint {
                date: date(0),
                equity: 100_000.0,
            },
            EquityPoint {
                date: date(730),
                equity: 121_000.0,
            },
        ];
        let report = PerformanceCalculator::summarize(&equity_curve, &[], &[]);

        let expected = (1.21_f64.powf(365.0 / 730.0) - 1.0) * 100.0;
        assert!((report.annualized_return_pct - expected).abs() < 1e-9);
        assert!((report.annualized_return_pct - 10.0).abs() < 1e-6);
    }

    #[test]
    fn single_point_curve_has_zero_statistics() {
        let report = PerformanceCalculator::summarize(&curve(&[1_000.0]), &[], &[]);
        assert_eq!(report.total_return_pct, 0.0);
        assert_eq!(report.annualized_return_pct, 0.0);
        assert_eq!(report.sharpe_ratio, 0.0);
        assert_eq!(report.max_drawdown_pct, 0.0);
    }

    #[test]
    fn empty_curve_is_all_zero() {
        let report = PerformanceCalculator::summarize(&[], &[], &[]);
        assert_eq!(report.total_return_pct, 0.0);
        assert_eq!(report.max_drawdown_pct, 0.0);
        assert_eq!(report.buy_and_hold_return_pct, 0.0);
    }

    #[test]
    fn sharpe_uses_sample_std_and_sqrt_252() {
        let returns: [f64; 4] = [0.01, -0.005, 0.02, 0.0];
        let mean: f64 = 0.025 / 4.0;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 3.0;
        let expected = mean / variance.sqrt() * 252.0_f64.sqrt();
        assert!((sharpe_ratio(&returns) - expected).abs() < 1e-9);
    }

    #[test]
    fn sharpe_is_zero_for_constant_or_short_returns() {
        assert_eq!(sharpe_ratio(&[]), 0.0);
        assert_eq!(sharpe_ratio(&[0.05]), 0.0);
        assert_eq!(sharpe_ratio(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn max_drawdown_tracks_running_peak() {
        let equities = [100.0, 120.0, 90.0, 130.0, 117.0];
        assert!((max_drawdown_pct(&equities) + 25.0).abs() < 1e-9);
        assert_eq!(max_drawdown_pct(&[100.0, 110.0, 120.0]), 0.0);
        assert_eq!(max_drawdown_pct(&[]), 0.0);
    }

    #[test]
    fn drawdown_series_matches_max_drawdown() {
        let equity_curve = curve(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        let series = drawdown_series(&equity_curve);
        assert_eq!(series.len(), 5);
        assert_eq!(series[1].equity, 0.0);
        assert!((series[2].equity + 25.0).abs() < 1e-9);
        assert!((series[4].equity + 10.0).abs() < 1e-9);
        let min = series.iter().map(|p| p.equity).fold(0.0, f64::min);
        assert!((min - max_drawdown_pct(&equity_values(&equity_curve))).abs() < 1e-12);
    }

    #[test]
    fn daily_returns_skip_non_positive_base() {
        let returns = daily_returns(&[100.0, 110.0, 0.0, 5.0]);
        assert_eq!(returns.len(), 3);
        assert!((returns[0] - 0.1).abs() < 1e-12);
        assert_eq!(returns[2], 0.0);
        assert!(daily_returns(&[100.0]).is_empty());
    }

    #[test]
    fn win_rate_with_one_winning_and_one_losing_round_trip() {
        let fills = vec![
            fill("SPY", OrderSide::Buy, 100.0, 0.0),
            fill("SPY", OrderSide::Sell, 110.0, 0.0),
            fill("SPY", OrderSide::Buy, 110.0, 0.0),
            fill("SPY", OrderSide::Sell, 105.0, 0.0),
        ];
        let report = PerformanceCalculator::summarize(&curve(&[1.0, 1.0]), &fills, &[]);

        assert_eq!(report.completed_round_trips, 2);
        assert_eq!(report.win_rate_pct, 50.0);
        assert_eq!(report.total_trades, 4);
    }

    #[test]
    fn win_rate_pairs_fifo_per_symbol_and_nets_commission() {
        let fills = vec![
            fill("AAA", OrderSide::Buy, 100.0, 0.0),
            fill("BBB", OrderSide::Buy, 50.0, 0.0),
            fill("AAA", OrderSide::Buy, 200.0, 0.0),
            // Closes the AAA buy at 100: gross gain of 0.5/share but commission of 1.0/share.
            fill("AAA", OrderSide::Sell, 100.5, 10.0),
            // Closes BBB at 50 with a profit.
            fill("BBB", OrderSide::Sell, 60.0, 0.0),
            // Sell with no open buy is ignored.
            fill("CCC", OrderSide::Sell, 10.0, 0.0),
        ];
        let report = PerformanceCalculator::summarize(&curve(&[1.0]), &fills, &[]);

        assert_eq!(report.completed_round_trips, 2);
        assert_eq!(report.win_rate_pct, 50.0);
    }

    #[test]
    fn split_exit_scores_each_matched_slice() {
        let mut buy = fill("SPY", OrderSide::Buy, 100.0, 0.0);
        buy.quantity = 10;
        let mut first_exit = fill("SPY", OrderSide::Sell, 110.0, 0.0);
        first_exit.quantity = 5;
        let mut second_exit = fill("SPY", OrderSide::Sell, 90.0, 0.0);
        second_exit.quantity = 5;

        let report = PerformanceCalculator::summarize(
            &curve(&[1.0]),
            &[buy, first_exit, second_exit],
            &[],
        );

        assert_eq!(report.completed_round_trips, 2);
        assert_eq!(report.win_rate_pct, 50.0);
    }

    #[test]
    fn one_sell_spanning_two_lots_is_scored_per_lot() {
        let mut cheap = fill("SPY", OrderSide::Buy, 90.0, 0.0);
        cheap.quantity = 4;
        let mut dear = fill("SPY", OrderSide::Buy, 120.0, 0.0);
        dear.quantity = 6;
        let mut exit = fill("SPY", OrderSide::Sell, 100.0, 0.0);
        exit.quantity = 10;

        let report =
            PerformanceCalculator::summarize(&curve(&[1.0]), &[cheap, dear, exit], &[]);

        assert_eq!(report.completed_round_trips, 2);
        assert_eq!(report.win_rate_pct, 50.0);
    }

    #[test]
    fn win_rate_is_zero_without_round_trips() {
        let fills = vec![fill("SPY", OrderSide::Buy, 100.0, 0.0)];
        let report = PerformanceCalculator::summarize(&curve(&[1.0]), &fills, &[]);
        assert_eq!(report.win_rate_pct, 0.0);
        assert_eq!(report.completed_round_trips, 0);
    }

    #[test]
    fn buy_and_hold_curve_scales_capital() {
        let curve = buy_and_hold_curve(&bars(&[100.0, 110.0, 90.0]), 1_000.0);
        let values: Vec<f64> = curve.iter().map(|p| p.equity).collect();
        assert!((values[1] - 1_100.0).abs() < 1e-9);
        assert!((values[2] - 900.0).abs() < 1e-9);
        assert!(buy_and_hold_curve(&[], 1_000.0).is_empty());
    }
}
