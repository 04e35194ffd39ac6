use crate::analysis::averages::rolling_mean;
use crate::data::Bar;
use crate::error::{require_at_least, CoreError};

/// True range of every bar. The first bar has no previous close and uses
/// its own high-low span.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut true_ranges = Vec::with_capacity(bars.len());
    for (idx, bar) in bars.iter().enumerate() {
        let high_low = bar.high - bar.low;
        let tr = match idx.checked_sub(1).map(|prev| bars[prev].close) {
            Some(prev_close) => {
                let high_close = (bar.high - prev_close).abs();
                let low_close = (bar.low - prev_close).abs();
                high_low.max(high_close).max(low_close)
            }
            None => high_low,
        };
        true_ranges.push(tr.max(0.0));
    }
    true_ranges
}

/// Simple rolling mean of the true range, null for the first `period - 1`
/// bars.
pub fn average_true_range(bars: &[Bar], period: usize) -> Result<Vec<Option<f64>>, CoreError> {
    require_at_least("atr_period", period, 1)?;
    Ok(rolling_mean(&true_range(bars), period))
}
