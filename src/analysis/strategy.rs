use serde::Serialize;
use tracing::debug;

use crate::analysis::averages::{bollinger, ma_cross};
use crate::analysis::indicators::IndicatorParams;
use crate::analysis::ranges::{regime_ranges, sign_signal};
use crate::analysis::stats::{cumulative_returns, strategy_returns, summarize, PerformanceSummary};
use crate::data::{Bar, EnhancedRow};
use crate::error::{validate_bars, CoreError};

/// Position rules the report backtests side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Always long.
    Benchmark,
    /// Hold the floor/ceiling regime of the previous bar.
    Regime,
    /// Sign of the fast minus slow SMA, one bar late.
    Crossover,
    /// Fade closes outside the Bollinger bands, one bar late.
    BollingerReversion,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Benchmark,
        StrategyKind::Regime,
        StrategyKind::Crossover,
        StrategyKind::BollingerReversion,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::Benchmark => "benchmark",
            StrategyKind::Regime => "regime",
            StrategyKind::Crossover => "ma_crossover",
            StrategyKind::BollingerReversion => "bollinger_reversion",
        }
    }

    /// Indicator-driven signals open their first run straight out of the
    /// warm-up; that run is not an entry and is dropped.
    fn skips_warm_up(self) -> bool {
        matches!(self, StrategyKind::Crossover | StrategyKind::BollingerReversion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionRow {
    pub bar_number: usize,
    pub close: f64,
    pub signal: i8,
    /// 1-based number of the run this bar belongs to, null when flat.
    pub trade_count: Option<usize>,
    pub returns: f64,
    pub cumul_returns: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRun {
    pub kind: StrategyKind,
    pub positions: Vec<PositionRow>,
    pub summary: PerformanceSummary,
}

/// Turn a raw signal into held positions.
///
/// Every run of constant non-zero sign becomes one trade; bars outside a
/// run are flat. With `skip_warm_up` the first run is left flat too.
pub fn apply_signal(signal: &[Option<i8>], skip_warm_up: bool) -> (Vec<i8>, Vec<Option<usize>>) {
    let mut positions = vec![0i8; signal.len()];
    let mut trades: Vec<Option<usize>> = vec![None; signal.len()];

    let ranges = regime_ranges(signal);
    let kept = ranges.iter().skip(usize::from(skip_warm_up));
    for (number, range) in (1..).zip(kept) {
        for idx in range.start..=range.end {
            positions[idx] = range.signal;
            trades[idx] = Some(number);
        }
    }
    (positions, trades)
}

/// Shift a signal one bar later so a bar trades on what was known at the
/// previous close.
pub fn lag(signal: &[Option<i8>]) -> Vec<Option<i8>> {
    std::iter::once(None)
        .chain(signal.iter().copied())
        .take(signal.len())
        .collect()
}

pub fn benchmark_signal(len: usize) -> Vec<Option<i8>> {
    vec![Some(1); len]
}

/// The regime column, lagged one bar.
pub fn regime_signal(enhanced: &[EnhancedRow]) -> Vec<Option<i8>> {
    let rg: Vec<Option<i8>> = enhanced.iter().map(|row| row.rg).collect();
    lag(&rg)
}

pub fn crossover_signal(closes: &[f64], fast: usize, slow: usize) -> Result<Vec<Option<i8>>, CoreError> {
    let cross = ma_cross(closes, fast, slow)?;
    Ok(lag(&sign_signal(&cross)))
}

/// Short above the upper band, long below the lower band, flat in between.
pub fn bollinger_reversion_signal(closes: &[f64], window: usize, num_std: f64) -> Result<Vec<Option<i8>>, CoreError> {
    let bands = bollinger(closes, window, num_std)?;
    let raw: Vec<Option<i8>> = closes
        .iter()
        .zip(&bands)
        .map(|(&close, band)| {
            band.map(|band| {
                if close > band.upper {
                    -1
                } else if close < band.lower {
                    1
                } else {
                    0
                }
            })
        })
        .collect();
    Ok(lag(&raw))
}

/// Backtest one signal over `bars`.
pub fn run_strategy(
    kind: StrategyKind,
    bars: &[Bar],
    signal: &[Option<i8>],
    risk_free: f64,
) -> Result<StrategyRun, CoreError> {
    validate_bars(bars)?;
    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    let (held, trades) = apply_signal(signal, kind.skips_warm_up());
    let returns = strategy_returns(&closes, &held);
    let cumul = cumulative_returns(&returns);

    let positions: Vec<PositionRow> = bars
        .iter()
        .enumerate()
        .map(|(idx, bar)| PositionRow {
            bar_number: bar.bar_number,
            close: bar.close,
            signal: held.get(idx).copied().unwrap_or(0),
            trade_count: trades.get(idx).copied().flatten(),
            returns: returns[idx],
            cumul_returns: cumul[idx],
        })
        .collect();
    let trade_total = trades.iter().flatten().max().copied().unwrap_or(0);
    let summary = summarize(&returns, trade_total, risk_free);
    debug!(
        strategy = kind.label(),
        trades = trade_total,
        total_return = summary.total_return,
        "strategy evaluated"
    );
    Ok(StrategyRun { kind, positions, summary })
}

/// Backtest every `StrategyKind` on the same bars.
pub fn run_strategies(
    bars: &[Bar],
    enhanced: &[EnhancedRow],
    params: &IndicatorParams,
) -> Result<Vec<StrategyRun>, CoreError> {
    params.validate()?;
    validate_bars(bars)?;
    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();

    StrategyKind::ALL
        .iter()
        .map(|&kind| {
            let signal = match kind {
                StrategyKind::Benchmark => benchmark_signal(bars.len()),
                StrategyKind::Regime => regime_signal(enhanced),
                StrategyKind::Crossover => crossover_signal(&closes, params.fast, params.slow)?,
                StrategyKind::BollingerReversion => {
                    bollinger_reversion_signal(&closes, params.bollinger_window, params.bollinger_std)?
                }
            };
            run_strategy(kind, bars, &signal, params.risk_free)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar::untimed(i, close, close, close, close, 100.0))
            .collect()
    }

    #[test]
    fn runs_become_numbered_trades() {
        let signal = [None, Some(1), Some(1), Some(0), Some(-1), Some(-1), Some(1)];
        let (held, trades) = apply_signal(&signal, false);
        assert_eq!(held, vec![0, 1, 1, 0, -1, -1, 1]);
        assert_eq!(trades, vec![None, Some(1), Some(1), None, Some(2), Some(2), Some(3)]);
    }

    #[test]
    fn warm_up_run_is_left_flat() {
        let signal = [Some(1), Some(1), Some(-1), Some(1)];
        let (held, trades) = apply_signal(&signal, true);
        assert_eq!(held, vec![0, 0, -1, 1]);
        assert_eq!(trades, vec![None, None, Some(1), Some(2)]);
    }

    #[test]
    fn signals_trade_one_bar_late() {
        assert_eq!(lag(&[Some(1), Some(-1), None]), vec![None, Some(1), Some(-1)]);
        assert!(lag(&[]).is_empty());

        let closes = [1.0, 2.0, 3.0, 4.0, 3.0, 2.0, 1.0, 0.5];
        let signal = crossover_signal(&closes, 1, 3).unwrap();
        // The cross turns negative at bar 4 and is traded from bar 5.
        assert_eq!(signal[3], Some(1));
        assert_eq!(signal[4], Some(1));
        assert_eq!(signal[5], Some(-1));
        assert!(crossover_signal(&closes, 3, 1).unwrap_err().is_configuration());
    }

    #[test]
    fn bollinger_fades_the_band_edges() {
        let closes = [10.0, 10.0, 11.0, 9.0, 10.0, 20.0, 10.0, 0.0, 10.0];
        let signal = bollinger_reversion_signal(&closes, 4, 1.0).unwrap();
        assert_eq!(signal[..4], [None, None, None, None]);
        // 20 pierces the upper band at bar 5, 0 the lower band at bar 7.
        assert_eq!(signal[6], Some(-1));
        assert_eq!(signal[8], Some(1));
        assert_eq!(signal[5], Some(0));
    }

    #[test]
    fn benchmark_holds_the_whole_series() {
        let bars = flat_bars(&[100.0, 110.0, 121.0]);
        let run = run_strategy(StrategyKind::Benchmark, &bars, &benchmark_signal(3), 0.0).unwrap();
        assert_eq!(run.summary.trades, 1);
        assert!((run.summary.total_return - 0.21).abs() < 1e-9);
        assert!(run.positions.iter().all(|row| row.signal == 1));
        assert_eq!(run.positions[0].returns, 0.0);
    }

    #[test]
    fn every_strategy_reports_one_row_per_bar() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + 10.0 * (f64::from(i) / 8.0).sin()).collect();
        let bars = flat_bars(&closes);
        let enhanced: Vec<EnhancedRow> = bars.iter().map(EnhancedRow::from).collect();
        let params = IndicatorParams {
            fast: 3,
            slow: 8,
            bollinger_window: 10,
            ..IndicatorParams::default()
        };
        let runs = run_strategies(&bars, &enhanced, &params).unwrap();
        assert_eq!(runs.len(), StrategyKind::ALL.len());
        for run in &runs {
            assert_eq!(run.positions.len(), bars.len());
        }
        // No regime column means no regime trades.
        assert_eq!(runs[1].kind, StrategyKind::Regime);
        assert_eq!(runs[1].summary.trades, 0);
        assert!(runs[2].summary.trades > 1);
    }
}
