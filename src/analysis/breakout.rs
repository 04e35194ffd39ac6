use serde::Serialize;

use crate::analysis::atr::average_true_range;
use crate::analysis::averages::rolling_mean;
use crate::data::Bar;
use crate::error::{require_at_least, require_positive, validate_bars, CoreError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakoutParams {
    pub atr_period: usize,
    pub vol_period: usize,
    pub atr_threshold: f64,
    pub vol_threshold: f64,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        Self {
            atr_period: 14,
            vol_period: 20,
            atr_threshold: 1.2,
            vol_threshold: 1.2,
        }
    }
}

impl BreakoutParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        require_at_least("atr_period", self.atr_period, 1)?;
        require_at_least("vol_period", self.vol_period, 1)?;
        require_positive("atr_threshold", self.atr_threshold)?;
        require_positive("vol_threshold", self.vol_threshold)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakoutRow {
    pub bar_number: usize,
    pub close: f64,
    pub volume: f64,
    pub atr: Option<f64>,
    pub atr_mean: Option<f64>,
    pub vol_mean: Option<f64>,
    pub breakout_signal: i8,
}

/// Flag bars where volatility and volume spike together.
///
/// A bar signals when its ATR is above `atr_threshold` times the rolling
/// mean ATR and its volume is above `vol_threshold` times the rolling mean
/// volume. The signal carries the direction of the close-to-close change.
pub fn atr_volume_breakout(bars: &[Bar], params: &BreakoutParams) -> Result<Vec<BreakoutRow>, CoreError> {
    params.validate()?;
    validate_bars(bars)?;

    let atr = average_true_range(bars, params.atr_period)?;
    let atr_mean = rolling_optional_mean(&atr, params.atr_period);
    let volumes: Vec<f64> = bars.iter().map(|bar| bar.volume).collect();
    let vol_mean = rolling_mean(&volumes, params.vol_period);

    let rows = bars
        .iter()
        .enumerate()
        .map(|(idx, bar)| {
            let atr_spike = matches!((atr[idx], atr_mean[idx]), (Some(a), Some(m)) if a > m * params.atr_threshold);
            let vol_spike = matches!(vol_mean[idx], Some(m) if bar.volume > m * params.vol_threshold);
            let direction = match idx.checked_sub(1).map(|prev| bar.close - bars[prev].close) {
                Some(change) if change > 0.0 => 1,
                Some(change) if change < 0.0 => -1,
                _ => 0,
            };
            BreakoutRow {
                bar_number: bar.bar_number,
                close: bar.close,
                volume: bar.volume,
                atr: atr[idx],
                atr_mean: atr_mean[idx],
                vol_mean: vol_mean[idx],
                breakout_signal: if atr_spike && vol_spike { direction } else { 0 },
            }
        })
        .collect();
    Ok(rows)
}

/// Rolling mean over a series with a null prefix; windows touching a null
/// stay null.
fn rolling_optional_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for end in window.saturating_sub(1)..values.len() {
        let slice = &values[end + 1 - window..=end];
        if let Some(sum) = slice.iter().copied().sum::<Option<f64>>() {
            out[end] = Some(sum / window as f64);
        }
    }
    out
}
