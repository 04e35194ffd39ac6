use serde::Serialize;
use statrs::statistics::Statistics;

use crate::error::{require_at_least, require_positive, ConfigError, CoreError};

/// Middle, upper and lower Bollinger band for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerBand {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Mean over each full trailing window; `None` until `window` values exist.
pub(crate) fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    let mut sum: f64 = values[..window].iter().sum();
    out[window - 1] = Some(sum / window as f64);
    for idx in window..values.len() {
        sum += values[idx] - values[idx - window];
        out[idx] = Some(sum / window as f64);
    }
    out
}

pub fn sma(values: &[f64], window: usize) -> Result<Vec<Option<f64>>, CoreError> {
    require_at_least("window", window, 1)?;
    Ok(rolling_mean(values, window))
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, seeded with the
/// first value and no bias adjustment.
pub fn ema(values: &[f64], span: usize) -> Result<Vec<f64>, CoreError> {
    require_at_least("span", span, 1)?;
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &value in values {
        let next = match prev {
            Some(prev) => alpha * value + (1.0 - alpha) * prev,
            None => value,
        };
        out.push(next);
        prev = Some(next);
    }
    Ok(out)
}

/// Fast SMA minus slow SMA. Positive while the fast average is on top.
pub fn ma_cross(values: &[f64], fast: usize, slow: usize) -> Result<Vec<Option<f64>>, CoreError> {
    require_at_least("fast", fast, 1)?;
    if fast >= slow {
        return Err(ConfigError::Ordering {
            fast_name: "fast",
            fast,
            slow_name: "slow",
            slow,
        }
        .into());
    }

    let fast_ma = rolling_mean(values, fast);
    let slow_ma = rolling_mean(values, slow);
    Ok(fast_ma
        .into_iter()
        .zip(slow_ma)
        .map(|(fast, slow)| Some(fast? - slow?))
        .collect())
}

/// Rolling mean plus/minus `num_std` sample standard deviations.
pub fn bollinger(values: &[f64], window: usize, num_std: f64) -> Result<Vec<Option<BollingerBand>>, CoreError> {
    require_at_least("window", window, 2)?;
    require_positive("num_std", num_std)?;

    let mut out = vec![None; values.len()];
    for end in window.saturating_sub(1)..values.len() {
        let slice = &values[end + 1 - window..=end];
        let middle = slice.mean();
        let spread = slice.std_dev() * num_std;
        out[end] = Some(BollingerBand {
            middle,
            upper: middle + spread,
            lower: middle - spread,
        });
    }
    Ok(out)
}
