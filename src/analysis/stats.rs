use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics, Statistics};

use crate::error::{require_at_least, require_fraction, ConfigError, CoreError};

/// Per-bar risk-free rate used by the strategy report.
pub const DEFAULT_RISK_FREE: f64 = 0.00001;
/// Right-tail quantile of the tail ratio.
pub const DEFAULT_TAIL_PERCENTILE: f64 = 0.95;
/// Tail ratios are clamped to `[-TAIL_RATIO_LIMIT, TAIL_RATIO_LIMIT]`.
pub const TAIL_RATIO_LIMIT: f64 = 5.0;

/// Span a statistic is computed over at each bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The last `n` bars; null until `n` bars exist.
    Rolling(usize),
    /// Every bar from the first one.
    Expanding,
}

impl Window {
    fn validate(self) -> Result<(), ConfigError> {
        match self {
            Window::Rolling(window) => require_at_least("window", window, 2),
            Window::Expanding => Ok(()),
        }
    }

    /// Apply `stat` to the span ending at every bar.
    fn apply<F>(self, values: &[f64], stat: F) -> Vec<Option<f64>>
    where
        F: Fn(&[f64]) -> Option<f64>,
    {
        (0..values.len())
            .map(|end| match self {
                Window::Rolling(window) if end + 1 < window => None,
                Window::Rolling(window) => stat(&values[end + 1 - window..=end]),
                Window::Expanding => stat(&values[..=end]),
            })
            .collect()
    }
}

/// Log return of the close times the position held on that bar. The first
/// bar has no previous close and returns 0, as does any bar without a
/// position.
pub fn strategy_returns(closes: &[f64], positions: &[i8]) -> Vec<f64> {
    closes
        .iter()
        .enumerate()
        .map(|(idx, &close)| {
            let position = positions.get(idx).copied().unwrap_or(0);
            match idx.checked_sub(1).map(|prev| closes[prev]) {
                Some(prev) if position != 0 && prev > 0.0 && close > 0.0 => (close / prev).ln() * f64::from(position),
                _ => 0.0,
            }
        })
        .collect()
}

/// Compounded return so far: `exp(cumsum(log returns)) - 1`.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(0.0, |sum, &r| {
            *sum += r;
            Some(sum.exp_m1())
        })
        .collect()
}

/// Mean excess return over the population standard deviation.
pub fn sharpe_ratio(returns: &[f64], risk_free: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let std = returns.population_std_dev();
    (std > 0.0).then(|| (returns.mean() - risk_free) / std)
}

/// Final cumulative return over the ulcer index, the root of the summed
/// squared drawdowns from the running peak.
pub fn grit(cumul_returns: &[f64]) -> Option<f64> {
    let last = *cumul_returns.last()?;
    let mut peak = f64::NEG_INFINITY;
    let mut squared = 0.0;
    for &value in cumul_returns {
        peak = peak.max(value);
        squared += (value - peak).powi(2);
    }
    let ulcer = squared.sqrt();
    (ulcer > 0.0).then(|| last / ulcer)
}

/// Sum of winning returns over the absolute sum of losing ones.
pub fn profit_ratio(returns: &[f64]) -> Option<f64> {
    let (profits, losses) = returns.iter().fold((0.0, 0.0), |(profits, losses), &r| {
        if r > 0.0 {
            (profits + r, losses)
        } else {
            (profits, losses + r)
        }
    });
    (losses < 0.0).then(|| profits / losses.abs())
}

/// Right-tail quantile over the absolute left-tail quantile, clamped to
/// `TAIL_RATIO_LIMIT`.
pub fn tail_ratio(returns: &[f64], percentile: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let mut data = Data::new(returns.to_vec());
    let right = data.quantile(percentile);
    let left = data.quantile(1.0 - percentile).abs();
    (left > 0.0).then(|| (right / left).clamp(-TAIL_RATIO_LIMIT, TAIL_RATIO_LIMIT))
}

pub fn common_sense_ratio(returns: &[f64], percentile: f64) -> Option<f64> {
    Some(profit_ratio(returns)? * tail_ratio(returns, percentile)?)
}

pub fn expectancy(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    win_rate * avg_win + (1.0 - win_rate) * avg_loss
}

pub fn sharpe_series(returns: &[f64], window: Window, risk_free: f64) -> Result<Vec<Option<f64>>, CoreError> {
    window.validate()?;
    require_finite("risk_free", risk_free)?;
    Ok(window.apply(returns, |span| sharpe_ratio(span, risk_free)))
}

pub fn grit_series(cumul_returns: &[f64], window: Window) -> Result<Vec<Option<f64>>, CoreError> {
    window.validate()?;
    Ok(window.apply(cumul_returns, grit))
}

pub fn profit_ratio_series(returns: &[f64], window: Window) -> Result<Vec<Option<f64>>, CoreError> {
    window.validate()?;
    Ok(window.apply(returns, profit_ratio))
}

pub fn tail_ratio_series(returns: &[f64], window: Window, percentile: f64) -> Result<Vec<Option<f64>>, CoreError> {
    window.validate()?;
    require_fraction("percentile", percentile)?;
    Ok(window.apply(returns, |span| tail_ratio(span, percentile)))
}

pub fn common_sense_series(returns: &[f64], window: Window, percentile: f64) -> Result<Vec<Option<f64>>, CoreError> {
    window.validate()?;
    require_fraction("percentile", percentile)?;
    Ok(window.apply(returns, |span| common_sense_ratio(span, percentile)))
}

/// Whole-series performance of one position series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub trades: usize,
    pub total_return: f64,
    /// Share of bars in a position that closed with a gain.
    pub win_rate: Option<f64>,
    pub avg_win: Option<f64>,
    pub avg_loss: Option<f64>,
    pub expectancy: Option<f64>,
    pub sharpe: Option<f64>,
    pub grit: Option<f64>,
    pub profit_ratio: Option<f64>,
    pub tail_ratio: Option<f64>,
    pub common_sense_ratio: Option<f64>,
}

/// Summarise strategy log returns. Sharpe and grit use every bar; the
/// win/loss and tail figures use bars with a non-zero return only.
pub fn summarize(returns: &[f64], trades: usize, risk_free: f64) -> PerformanceSummary {
    let cumul = cumulative_returns(returns);
    let active: Vec<f64> = returns.iter().copied().filter(|r| *r != 0.0).collect();
    let wins: Vec<f64> = active.iter().copied().filter(|r| *r > 0.0).collect();
    let losses: Vec<f64> = active.iter().copied().filter(|r| *r < 0.0).collect();

    let win_rate = (!active.is_empty()).then(|| wins.len() as f64 / active.len() as f64);
    let avg_win = (!wins.is_empty()).then(|| wins.as_slice().mean());
    let avg_loss = (!losses.is_empty()).then(|| losses.as_slice().mean());

    PerformanceSummary {
        trades,
        total_return: cumul.last().copied().unwrap_or(0.0),
        win_rate,
        avg_win,
        avg_loss,
        expectancy: win_rate.map(|rate| expectancy(rate, avg_win.unwrap_or(0.0), avg_loss.unwrap_or(0.0))),
        sharpe: sharpe_ratio(returns, risk_free),
        grit: grit(&cumul),
        profit_ratio: profit_ratio(&active),
        tail_ratio: tail_ratio(&active, DEFAULT_TAIL_PERCENTILE),
        common_sense_ratio: common_sense_ratio(&active, DEFAULT_TAIL_PERCENTILE),
    }
}

fn require_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            expected: "a finite number",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn returns_follow_the_position() {
        let closes = [100.0, 110.0, 99.0, 99.0];
        let returns = strategy_returns(&closes, &[1, 1, -1, 0]);
        assert_eq!(returns[0], 0.0);
        assert_close(returns[1], (1.1f64).ln());
        assert_close(returns[2], -(0.9f64).ln());
        assert_eq!(returns[3], 0.0);

        let cumul = cumulative_returns(&returns);
        assert_close(cumul[1], 0.1);
        // Long 100 -> 110, then short 110 -> 99.
        assert_close(cumul[3], 1.1 / 0.9 - 1.0);
    }

    #[test]
    fn sharpe_uses_population_deviation() {
        let returns = [0.01, 0.03];
        assert_close(sharpe_ratio(&returns, 0.0).unwrap(), 2.0);
        assert!(sharpe_ratio(&[0.01, 0.01], 0.0).is_none());
        assert!(sharpe_ratio(&[0.01], 0.0).is_none());
    }

    #[test]
    fn rolling_sharpe_waits_for_a_full_window() {
        let returns = [0.01, 0.03, 0.01, 0.03];
        let out = sharpe_series(&returns, Window::Rolling(2), 0.0).unwrap();
        assert!(out[0].is_none());
        assert_close(out[1].unwrap(), 2.0);
        assert_close(out[3].unwrap(), 2.0);
        assert!(sharpe_series(&returns, Window::Rolling(1), 0.0).unwrap_err().is_configuration());
        assert!(sharpe_series(&returns, Window::Expanding, f64::NAN).unwrap_err().is_configuration());
    }

    #[test]
    fn grit_divides_by_the_ulcer_index() {
        // Drawdowns from the 0.2 peak are 0.1 and 0.0.
        assert_close(grit(&[0.1, 0.2, 0.1, 0.3]).unwrap(), 3.0);
        assert!(grit(&[0.1, 0.2, 0.3]).is_none());
        assert!(grit(&[]).is_none());

        let expanding = grit_series(&[0.1, 0.2, 0.1, 0.3], Window::Expanding).unwrap();
        assert_eq!(expanding[1], None);
        assert_close(expanding[2].unwrap(), 1.0);
    }

    #[test]
    fn profit_ratio_needs_a_loss() {
        assert_close(profit_ratio(&[0.02, -0.01, 0.04, -0.02]).unwrap(), 2.0);
        assert!(profit_ratio(&[0.02, 0.01]).is_none());
    }

    #[test]
    fn symmetric_tails_have_ratio_one() {
        let returns: Vec<f64> = (-10..=10).map(|i| f64::from(i) / 100.0).collect();
        assert_close(tail_ratio(&returns, 0.95).unwrap(), 1.0);
        assert_close(profit_ratio(&returns).unwrap(), 1.0);
        assert_close(common_sense_ratio(&returns, 0.95).unwrap(), 1.0);
    }

    #[test]
    fn tail_ratio_is_clamped() {
        let mut returns = vec![-0.001; 5];
        returns.extend([0.5; 5]);
        assert_eq!(tail_ratio(&returns, 0.95), Some(TAIL_RATIO_LIMIT));
        assert!(tail_ratio_series(&returns, Window::Expanding, 1.5).unwrap_err().is_configuration());
    }

    #[test]
    fn expectancy_weights_wins_and_losses() {
        assert_close(expectancy(0.6, 0.02, -0.01), 0.008);
    }

    #[test]
    fn summary_splits_wins_and_losses() {
        let returns = [0.0, 0.02, -0.01, 0.0, 0.04, -0.01];
        let summary = summarize(&returns, 2, 0.0);
        assert_eq!(summary.trades, 2);
        assert_close(summary.win_rate.unwrap(), 0.5);
        assert_close(summary.avg_win.unwrap(), 0.03);
        assert_close(summary.avg_loss.unwrap(), -0.01);
        assert_close(summary.expectancy.unwrap(), 0.01);
        assert_close(summary.profit_ratio.unwrap(), 3.0);
        assert_close(summary.total_return, 0.04f64.exp_m1());
        assert!(summary.sharpe.unwrap() > 0.0);
    }

    #[test]
    fn flat_positions_summarise_to_nothing() {
        let summary = summarize(&[0.0; 5], 0, DEFAULT_RISK_FREE);
        assert_eq!(summary.total_return, 0.0);
        assert!(summary.win_rate.is_none());
        assert!(summary.expectancy.is_none());
        assert!(summary.sharpe.is_none());
        assert!(summary.grit.is_none());
        assert!(summary.tail_ratio.is_none());
    }
}
