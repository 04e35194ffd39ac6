pub mod atr;
pub mod averages;
pub mod bands;
pub mod breakout;
pub mod indicators;
pub mod peaks;
pub mod ranges;
pub mod regime;
pub mod stats;
pub mod strategy;
pub mod swings;

pub use atr::{average_true_range, true_range};
pub use averages::{bollinger, ema, ma_cross, sma, BollingerBand};
pub use bands::{compute_bands, compute_bands_by_peak, expanding_bands, trading_range_signal};
pub use breakout::{atr_volume_breakout, BreakoutParams, BreakoutRow};
pub use indicators::{compute_indicators, IndicatorParams, IndicatorRow};
pub use peaks::{build_peak_table, major_peaks};
pub use ranges::{regime_ranges, sign_signal, SignalRange};
pub use regime::{classify_regimes, regime_table, RegimeClassification, RetestMode};
pub use stats::{summarize, PerformanceSummary, Window};
pub use strategy::{run_strategies, run_strategy, PositionRow, StrategyKind, StrategyRun};
pub use swings::{annotate, detect_swings, SwingDetection, SwingParams, MAX_SWING_LEVEL};
