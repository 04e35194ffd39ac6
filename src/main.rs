mod config;
mod output;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{AnalyzeArgs, AppConfig, BandMode, Command, ScanArgs};
use floor_ceiling_regime::analysis::{
    atr_volume_breakout, compute_bands, compute_bands_by_peak, compute_indicators, expanding_bands, ma_cross,
    regime_ranges, run_strategies, sign_signal,
};
use floor_ceiling_regime::loader::{load_bars_from_csv, CsvDirectory};
use floor_ceiling_regime::scan::scan_symbols;
use floor_ceiling_regime::{run_floor_ceiling, CoreError};
use output::{export_tables, print_report, print_scan, Report};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::parse();
    match &config.command {
        Command::Analyze(args) => analyze(args),
        Command::Scan(args) => scan(args),
    }
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let input_path = &args.input_path;
    if !input_path.exists() {
        bail!("input file {:?} does not exist", input_path);
    }

    let bars = load_bars_from_csv(input_path, args.analysis.timezone)
        .with_context(|| format!("failed to load input data from {:?}", input_path))?;
    if let (Some(first), Some(last)) = (
        bars.first().and_then(|bar| bar.timestamp),
        bars.last().and_then(|bar| bar.timestamp),
    ) {
        info!(
            bars = bars.len(),
            from = %first.format("%Y-%m-%d %H:%M"),
            to = %last.format("%Y-%m-%d %H:%M"),
            "loaded bars"
        );
    }

    let params = args.analysis.floor_ceiling_params();
    let indicator_params = args.indicators.indicator_params();
    if let Err(err) = indicator_params.validate() {
        bail!("invalid configuration: {err}");
    }
    let tables = match run_floor_ceiling(&bars, &params) {
        Ok(tables) => tables,
        Err(err @ CoreError::Config(_)) => bail!("invalid configuration: {err}"),
        Err(err) => return Err(err).context("input series rejected"),
    };
    let bands = match args.band_mode {
        BandMode::Peak => compute_bands_by_peak(&bars, args.peak_window, params.swing.max_level, &tables.peaks),
        BandMode::Rolling => compute_bands(&bars, args.band_window),
        BandMode::Expanding => expanding_bands(&bars, 1),
    }
    .context("invalid band configuration")?;

    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    let indicators = compute_indicators(&bars, &indicator_params)?;
    let breakouts = atr_volume_breakout(&bars, &indicator_params.breakout)?;
    let crossovers = regime_ranges(&sign_signal(&ma_cross(
        &closes,
        indicator_params.fast,
        indicator_params.slow,
    )?));
    let strategies = run_strategies(&bars, &tables.enhanced, &indicator_params)?;

    let report = Report {
        tables: &tables,
        bands: &bands,
        indicators: &indicators,
        breakouts: &breakouts,
        crossovers: &crossovers,
        strategies: &strategies,
    };
    print_report(&report, args.recent_peaks);

    if let Some(dir) = &args.export_dir {
        export_tables(dir, &report)?;
        info!(dir = ?dir, "exported tables");
    }
    Ok(())
}

fn scan(args: &ScanArgs) -> Result<()> {
    let params = args.analysis.floor_ceiling_params();
    params.swing.validate().context("invalid configuration")?;

    let source = CsvDirectory::new(&args.data_dir, args.analysis.timezone);
    let report = scan_symbols(&source, &args.symbols, args.bar_count, &args.interval, &params);
    print_scan(&report);
    Ok(())
}
