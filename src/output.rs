use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use floor_ceiling_regime::analysis::{BreakoutRow, IndicatorRow, PerformanceSummary, SignalRange, StrategyRun};
use floor_ceiling_regime::data::{BandRow, FloorCeiling, LevelType, Peak, RegimeState, SwingKind};
use floor_ceiling_regime::scan::ScanReport;
use floor_ceiling_regime::FloorCeilingTables;

/// Everything one `analyze` run produces.
pub struct Report<'a> {
    pub tables: &'a FloorCeilingTables,
    pub bands: &'a [BandRow],
    pub indicators: &'a [IndicatorRow],
    pub breakouts: &'a [BreakoutRow],
    pub crossovers: &'a [SignalRange],
    pub strategies: &'a [StrategyRun],
}

#[derive(Tabled)]
struct RegimeRow {
    #[tabled(rename = "Start")]
    start: usize,
    #[tabled(rename = "End")]
    end: usize,
    #[tabled(rename = "Bars")]
    bars: usize,
    #[tabled(rename = "Regime")]
    kind: &'static str,
}

#[derive(Tabled)]
struct LevelRow {
    #[tabled(rename = "Level")]
    kind: &'static str,
    #[tabled(rename = "Swing Bar")]
    fc_bar: usize,
    #[tabled(rename = "Price")]
    fc_val: String,
    #[tabled(rename = "Break Bar")]
    rg_ch_bar: usize,
    #[tabled(rename = "Break Close")]
    rg_ch_val: String,
    #[tabled(rename = "Test")]
    test: String,
}

#[derive(Tabled)]
struct PeakRow {
    #[tabled(rename = "Start")]
    start: usize,
    #[tabled(rename = "End")]
    end: usize,
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Lvl")]
    lvl: u8,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Bars")]
    bars: usize,
    #[tabled(rename = "Close")]
    close: String,
    #[tabled(rename = "Regime")]
    regime: &'static str,
    #[tabled(rename = "Last Change")]
    last_change: String,
}

#[derive(Tabled)]
struct PerformanceRow {
    #[tabled(rename = "Strategy")]
    strategy: &'static str,
    #[tabled(rename = "Trades")]
    trades: usize,
    #[tabled(rename = "Return")]
    total_return: String,
    #[tabled(rename = "Win Rate")]
    win_rate: String,
    #[tabled(rename = "Expectancy")]
    expectancy: String,
    #[tabled(rename = "Sharpe")]
    sharpe: String,
    #[tabled(rename = "Grit")]
    grit: String,
    #[tabled(rename = "CSR")]
    common_sense_ratio: String,
}

/// Flat CSV record; the csv writer cannot serialize flattened structs.
#[derive(Serialize)]
struct PerformanceRecord {
    strategy: &'static str,
    trades: usize,
    total_return: f64,
    win_rate: Option<f64>,
    avg_win: Option<f64>,
    avg_loss: Option<f64>,
    expectancy: Option<f64>,
    sharpe: Option<f64>,
    grit: Option<f64>,
    profit_ratio: Option<f64>,
    tail_ratio: Option<f64>,
    common_sense_ratio: Option<f64>,
}

impl PerformanceRecord {
    fn new(strategy: &'static str, summary: &PerformanceSummary) -> Self {
        Self {
            strategy,
            trades: summary.trades,
            total_return: summary.total_return,
            win_rate: summary.win_rate,
            avg_win: summary.avg_win,
            avg_loss: summary.avg_loss,
            expectancy: summary.expectancy,
            sharpe: summary.sharpe,
            grit: summary.grit,
            profit_ratio: summary.profit_ratio,
            tail_ratio: summary.tail_ratio,
            common_sense_ratio: summary.common_sense_ratio,
        }
    }
}

fn level_label(kind: LevelType) -> &'static str {
    match kind {
        LevelType::Floor => "Floor",
        LevelType::Ceiling => "Ceiling",
    }
}

fn swing_label(kind: SwingKind) -> &'static str {
    match kind {
        SwingKind::High => "High",
        SwingKind::Low => "Low",
    }
}

fn print_table<R: Tabled>(rows: Vec<R>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}\n");
}

pub fn print_report(report: &Report, recent_peaks: usize) {
    let (tables, bands) = (report.tables, report.bands);
    println!("\n=== Floor / Ceiling Regime ===\n");
    if let Some(last) = tables.enhanced.last() {
        println!("Bars: {} | Last close: {:.2}", tables.enhanced.len(), last.close);
        if let (Some(floor), Some(ceiling)) = (last.floor, last.ceiling) {
            println!("Floor: {floor:.2} | Ceiling: {ceiling:.2}");
        }
    }
    if let Some(band) = bands.last() {
        if let (Some(lo), Some(hi), Some(signal)) = (band.rolling_min, band.rolling_max, band.tr_signal) {
            println!("Trading range: {lo:.2} to {hi:.2} | Signal bucket {signal}");
        }
    }

    if tables.is_empty() {
        println!("No signal yet: not enough major swings to establish a regime.");
    } else {
        let current = tables.current_regime().unwrap_or(RegimeState::Undefined);
        println!("Current regime: {}\n", current.label());
        print_table(
            tables
                .regimes
                .iter()
                .map(|regime| RegimeRow {
                    start: regime.start,
                    end: regime.end,
                    bars: regime.len(),
                    kind: regime.kind,
                })
                .collect(),
        );
    }

    if !tables.floor_ceiling.is_empty() {
        print_table(tables.floor_ceiling.iter().map(level_row).collect());
    }

    let peaks = tables.recent_peaks(recent_peaks);
    if peaks.is_empty() {
        println!("No peaks detected.");
    } else {
        println!("Recent peaks:");
        print_table(peaks.iter().map(peak_row).collect());
    }

    let breakouts = report.breakouts.iter().filter(|row| row.breakout_signal != 0).count();
    if let Some(last) = report.breakouts.iter().rev().find(|row| row.breakout_signal != 0) {
        println!(
            "ATR/volume breakouts: {breakouts} | last at bar {} ({:+})",
            last.bar_number, last.breakout_signal
        );
    }
    if let Some(last) = report.crossovers.last() {
        println!(
            "MA crossover runs: {} | current {} since bar {}",
            report.crossovers.len(),
            if last.signal > 0 { "fast above slow" } else { "fast below slow" },
            last.start
        );
    }

    if !report.strategies.is_empty() {
        println!("\nStrategy performance:");
        print_table(report.strategies.iter().map(performance_row).collect());
    }
}

fn ratio(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

fn percent(value: Option<f64>) -> String {
    value.map(|v| format!("{:+.2}%", v * 100.0)).unwrap_or_else(|| "-".to_string())
}

fn performance_row(run: &StrategyRun) -> PerformanceRow {
    let summary = &run.summary;
    PerformanceRow {
        strategy: run.kind.label(),
        trades: summary.trades,
        total_return: percent(Some(summary.total_return)),
        win_rate: summary
            .win_rate
            .map(|rate| format!("{:.1}%", rate * 100.0))
            .unwrap_or_else(|| "-".to_string()),
        expectancy: percent(summary.expectancy),
        sharpe: ratio(summary.sharpe),
        grit: ratio(summary.grit),
        common_sense_ratio: ratio(summary.common_sense_ratio),
    }
}

fn level_row(change: &FloorCeiling) -> LevelRow {
    LevelRow {
        kind: level_label(change.kind),
        fc_bar: change.fc_bar,
        fc_val: format!("{:.2}", change.fc_val),
        rg_ch_bar: change.rg_ch_bar,
        rg_ch_val: format!("{:.2}", change.rg_ch_val),
        test: format!("{:+.2}%", change.test * 100.0),
    }
}

fn peak_row(peak: &Peak) -> PeakRow {
    PeakRow {
        start: peak.start,
        end: peak.end,
        kind: swing_label(peak.kind),
        lvl: peak.lvl,
    }
}

pub fn print_scan(report: &ScanReport) {
    println!("\n=== Regime Scan ===\n");
    if report.statuses.is_empty() {
        println!("No symbols classified.");
    } else {
        print_table(
            report
                .statuses
                .iter()
                .map(|status| StatusRow {
                    symbol: status.symbol.clone(),
                    bars: status.bars,
                    close: format!("{:.2}", status.last_close),
                    regime: status.regime.map(RegimeState::label).unwrap_or("no signal yet"),
                    last_change: status
                        .last_change_bar
                        .map(|bar| bar.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect(),
        );
    }
    for failure in &report.failures {
        println!("{}: {}", failure.symbol, failure.reason);
    }
}

/// Write every table of one analysis run as CSV under `dir`.
pub fn export_tables(dir: &Path, report: &Report) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {:?}", dir))?;
    let tables = report.tables;
    write_csv(&dir.join("enhanced.csv"), &tables.enhanced)?;
    write_csv(&dir.join("peaks.csv"), &tables.peaks)?;
    write_csv(&dir.join("regimes.csv"), &tables.regimes)?;
    write_csv(&dir.join("floor_ceiling.csv"), &tables.floor_ceiling)?;
    write_csv(&dir.join("bands.csv"), report.bands)?;
    write_csv(&dir.join("indicators.csv"), report.indicators)?;
    write_csv(&dir.join("breakout.csv"), report.breakouts)?;
    write_csv(&dir.join("ma_cross_ranges.csv"), report.crossovers)?;
    for run in report.strategies {
        write_csv(&dir.join(format!("positions_{}.csv", run.kind.label())), &run.positions)?;
    }
    let performance: Vec<PerformanceRecord> = report
        .strategies
        .iter()
        .map(|run| PerformanceRecord::new(run.kind.label(), &run.summary))
        .collect();
    write_csv(&dir.join("performance.csv"), &performance)?;
    Ok(())
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("failed to create {:?}", path))?;
    for row in rows {
        writer.serialize(row).with_context(|| format!("failed to write {:?}", path))?;
    }
    writer.flush().with_context(|| format!("failed to flush {:?}", path))?;
    Ok(())
}
