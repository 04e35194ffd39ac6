use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use chrono_tz::Tz;

use floor_ceiling_regime::analysis::{BreakoutParams, IndicatorParams, RetestMode, SwingParams};
use floor_ceiling_regime::FloorCeilingParams;

/// Command-line configuration for the floor/ceiling regime tool.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Classify one CSV file and print its regime, floor/ceiling and peaks.
    Analyze(AnalyzeArgs),
    /// Classify every symbol found in a data directory.
    Scan(ScanArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    /// Input CSV file path containing OHLCV data.
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input_path: PathBuf,

    /// Write the regime, band, indicator and strategy tables here as CSV.
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Number of recent peaks to print.
    #[arg(long, default_value_t = 10)]
    pub recent_peaks: usize,

    /// How the trading-range band is anchored.
    #[arg(long, value_enum, default_value_t = BandMode::Peak)]
    pub band_mode: BandMode,

    /// Major peaks per trading-range band segment.
    #[arg(long, default_value_t = 3)]
    pub peak_window: usize,

    /// Window of the rolling band.
    #[arg(long, default_value_t = 63)]
    pub band_window: usize,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    #[command(flatten)]
    pub indicators: IndicatorArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BandMode {
    /// Reset at major peaks.
    Peak,
    /// Last `--band-window` bars.
    Rolling,
    /// Everything since the first bar.
    Expanding,
}

#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Directory holding `<symbol>_<interval>.csv` or `<symbol>.csv` files.
    #[arg(long, value_name = "DIR")]
    pub data_dir: PathBuf,

    /// Comma-separated symbols to scan.
    #[arg(long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Bar interval used to pick the file.
    #[arg(long, default_value = "1d")]
    pub interval: String,

    /// Most recent bars to keep per symbol (0 keeps all).
    #[arg(long, default_value_t = 0)]
    pub bar_count: usize,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Parameters shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct AnalysisArgs {
    /// Minimum swing size as a fraction of the starting price.
    #[arg(long, default_value_t = 0.05)]
    pub distance_pct: f64,

    /// Retracement, as a fraction of the leg, needed to confirm a swing.
    #[arg(long, default_value_t = 0.05)]
    pub retrace_pct: f64,

    /// Bars on each side a level-1 swing must dominate.
    #[arg(long, default_value_t = 63)]
    pub swing_window: usize,

    /// Highest swing level; its swings drive the regime.
    #[arg(long, default_value_t = 3)]
    pub max_level: u8,

    /// Wait for a retest swing before confirming a regime change.
    #[arg(long, action = ArgAction::SetTrue)]
    pub find_retest_swing: bool,

    /// Timezone for naive timestamps in the input.
    #[arg(long, default_value = "America/New_York", value_parser = parse_timezone)]
    pub timezone: Tz,
}

/// Indicator overlays and the strategies backtested on them.
#[derive(Debug, Clone, Args)]
pub struct IndicatorArgs {
    #[arg(long, default_value_t = 20)]
    pub sma_window: usize,

    #[arg(long, default_value_t = 20)]
    pub ema_span: usize,

    /// Fast SMA of the crossover.
    #[arg(long, default_value_t = 20)]
    pub fast: usize,

    /// Slow SMA of the crossover.
    #[arg(long, default_value_t = 50)]
    pub slow: usize,

    #[arg(long, default_value_t = 20)]
    pub bollinger_window: usize,

    /// Band width in standard deviations.
    #[arg(long, default_value_t = 2.0)]
    pub bollinger_std: f64,

    #[arg(long, default_value_t = 14)]
    pub atr_period: usize,

    /// Volume mean window of the breakout filter.
    #[arg(long, default_value_t = 20)]
    pub vol_period: usize,

    /// ATR multiple of its mean that counts as a spike.
    #[arg(long, default_value_t = 1.2)]
    pub atr_threshold: f64,

    /// Volume multiple of its mean that counts as a spike.
    #[arg(long, default_value_t = 1.2)]
    pub vol_threshold: f64,

    /// Per-bar risk-free rate for the Sharpe ratio.
    #[arg(long, default_value_t = 0.00001)]
    pub risk_free: f64,
}

impl IndicatorArgs {
    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            sma_window: self.sma_window,
            ema_span: self.ema_span,
            fast: self.fast,
            slow: self.slow,
            bollinger_window: self.bollinger_window,
            bollinger_std: self.bollinger_std,
            breakout: BreakoutParams {
                atr_period: self.atr_period,
                vol_period: self.vol_period,
                atr_threshold: self.atr_threshold,
                vol_threshold: self.vol_threshold,
            },
            risk_free: self.risk_free,
        }
    }
}

impl AnalysisArgs {
    pub fn floor_ceiling_params(&self) -> FloorCeilingParams {
        FloorCeilingParams {
            swing: SwingParams {
                distance_pct: self.distance_pct,
                retrace_pct: self.retrace_pct,
                swing_window: self.swing_window,
                max_level: self.max_level,
            },
            retest: RetestMode::from_flag(self.find_retest_swing),
        }
    }
}

fn parse_timezone(value: &str) -> Result<Tz, String> {
    value.parse::<Tz>().map_err(|err| format!("unknown timezone '{value}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_symbols_split_on_commas() {
        let config = AppConfig::try_parse_from([
            "floor-ceiling",
            "scan",
            "--data-dir",
            "data",
            "--symbols",
            "BTC,ETH",
            "--find-retest-swing",
        ])
        .unwrap();
        let Command::Scan(args) = config.command else {
            panic!("expected scan");
        };
        assert_eq!(args.symbols, vec!["BTC", "ETH"]);
        let params = args.analysis.floor_ceiling_params();
        assert_eq!(params.retest, RetestMode::Retest);
        assert_eq!(params.swing.max_level, 3);
    }

    #[test]
    fn analyze_defaults_match_the_library() {
        let config = AppConfig::try_parse_from(["floor-ceiling", "analyze", "-i", "x.csv"]).unwrap();
        let Command::Analyze(args) = config.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.band_mode, BandMode::Peak);
        assert_eq!(args.indicators.indicator_params(), IndicatorParams::default());
    }

    #[test]
    fn indicator_windows_are_configurable() {
        let config = AppConfig::try_parse_from([
            "floor-ceiling",
            "analyze",
            "-i",
            "x.csv",
            "--band-mode",
            "expanding",
            "--fast",
            "5",
            "--slow",
            "30",
            "--atr-period",
            "10",
        ])
        .unwrap();
        let Command::Analyze(args) = config.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.band_mode, BandMode::Expanding);
        let params = args.indicators.indicator_params();
        assert_eq!((params.fast, params.slow), (5, 30));
        assert_eq!(params.breakout.atr_period, 10);
    }

    #[test]
    fn rejects_unknown_timezone() {
        let result = AppConfig::try_parse_from(["floor-ceiling", "analyze", "-i", "x.csv", "--timezone", "Mars/Olympus"]);
        assert!(result.is_err());
    }
}
