use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::analysis::atr::average_true_range;
use crate::analysis::averages::{bollinger, ema, ma_cross, sma};
use crate::analysis::breakout::BreakoutParams;
use crate::analysis::stats::DEFAULT_RISK_FREE;
use crate::data::Bar;
use crate::error::{require_at_least, require_positive, validate_bars, ConfigError, CoreError};

/// Windows of the indicator overlays and of the strategies built on them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub sma_window: usize,
    pub ema_span: usize,
    pub fast: usize,
    pub slow: usize,
    pub bollinger_window: usize,
    pub bollinger_std: f64,
    pub breakout: BreakoutParams,
    /// Per-bar risk-free rate for the Sharpe ratio.
    pub risk_free: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_window: 20,
            ema_span: 20,
            fast: 20,
            slow: 50,
            bollinger_window: 20,
            bollinger_std: 2.0,
            breakout: BreakoutParams::default(),
            risk_free: DEFAULT_RISK_FREE,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        require_at_least("sma_window", self.sma_window, 1)?;
        require_at_least("ema_span", self.ema_span, 1)?;
        require_at_least("fast", self.fast, 1)?;
        if self.fast >= self.slow {
            return Err(ConfigError::Ordering {
                fast_name: "fast",
                fast: self.fast,
                slow_name: "slow",
                slow: self.slow,
            }
            .into());
        }
        require_at_least("bollinger_window", self.bollinger_window, 2)?;
        require_positive("bollinger_std", self.bollinger_std)?;
        if !self.risk_free.is_finite() {
            return Err(ConfigError::OutOfRange {
                name: "risk_free",
                value: self.risk_free,
                expected: "a finite number",
            }
            .into());
        }
        self.breakout.validate()
    }
}

/// One bar of the moving-average, Bollinger and ATR overlays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub bar_number: usize,
    pub timestamp: Option<DateTime<Tz>>,
    pub close: f64,
    pub sma: Option<f64>,
    pub ema: f64,
    pub ma_cross: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr: Option<f64>,
}

pub fn compute_indicators(bars: &[Bar], params: &IndicatorParams) -> Result<Vec<IndicatorRow>, CoreError> {
    params.validate()?;
    validate_bars(bars)?;

    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    let sma = sma(&closes, params.sma_window)?;
    let ema = ema(&closes, params.ema_span)?;
    let cross = ma_cross(&closes, params.fast, params.slow)?;
    let bands = bollinger(&closes, params.bollinger_window, params.bollinger_std)?;
    let atr = average_true_range(bars, params.breakout.atr_period)?;

    let rows = bars
        .iter()
        .enumerate()
        .map(|(idx, bar)| IndicatorRow {
            bar_number: bar.bar_number,
            timestamp: bar.timestamp,
            close: bar.close,
            sma: sma[idx],
            ema: ema[idx],
            ma_cross: cross[idx],
            bb_middle: bands[idx].map(|band| band.middle),
            bb_upper: bands[idx].map(|band| band.upper),
            bb_lower: bands[idx].map(|band| band.lower),
            atr: atr[idx],
        })
        .collect();
    Ok(rows)
}
