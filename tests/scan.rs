use std::fs;
use std::path::Path;

use chrono_tz::UTC;
use floor_ceiling_regime::analysis::SwingParams;
use floor_ceiling_regime::data::RegimeState;
use floor_ceiling_regime::loader::{CsvDirectory, PriceHistory};
use floor_ceiling_regime::scan::scan_symbols;
use floor_ceiling_regime::FloorCeilingParams;
use tempfile::TempDir;

const DAY: i64 = 86_400;
const START: i64 = 1_700_006_400;

fn write_series(dir: &Path, name: &str, closes: impl Iterator<Item = f64>) {
    let rows: String = closes
        .enumerate()
        .map(|(i, close)| {
            format!(
                "{},{:.4},{:.4},{:.4},{:.4},1000\n",
                START + i as i64 * DAY,
                close - 0.05,
                close + 0.05,
                close - 0.05,
                close
            )
        })
        .collect();
    fs::write(dir.join(name), format!("timestamp,open,high,low,close,volume\n{rows}")).unwrap();
}

fn params() -> FloorCeilingParams {
    FloorCeilingParams {
        swing: SwingParams {
            swing_window: 10,
            ..SwingParams::default()
        },
        ..FloorCeilingParams::default()
    }
}

#[test]
fn scans_a_csv_directory() {
    let dir = TempDir::new().unwrap();
    write_series(dir.path(), "UP_1d.csv", (0..400).map(|i| 100.0 + 0.1 * i as f64));
    write_series(dir.path(), "DOWN.csv", (0..400).map(|i| 200.0 - 0.2 * i as f64));
    write_series(dir.path(), "FLAT_1d.csv", std::iter::repeat(50.0).take(400));

    let source = CsvDirectory::new(dir.path(), UTC);
    let symbols: Vec<String> = ["UP", "DOWN", "FLAT", "MISSING"].iter().map(|s| s.to_string()).collect();
    let report = scan_symbols(&source, &symbols, 300, "1d", &params());

    let states: Vec<(&str, Option<RegimeState>, usize)> = report
        .statuses
        .iter()
        .map(|status| (status.symbol.as_str(), status.regime, status.bars))
        .collect();
    assert_eq!(
        states,
        vec![
            ("UP", Some(RegimeState::Up), 300),
            ("DOWN", Some(RegimeState::Down), 300),
            ("FLAT", None, 300),
        ]
    );

    assert!(report.regimes.iter().any(|row| row.symbol == "UP" && row.rg == 1));
    assert!(report.regimes.iter().any(|row| row.symbol == "DOWN" && row.rg == -1));
    assert!(report.regimes.iter().all(|row| row.symbol != "FLAT"));

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].symbol, "MISSING");
}

#[test]
fn price_history_is_renumbered_tail() {
    let dir = TempDir::new().unwrap();
    write_series(dir.path(), "UP_1h.csv", (0..50).map(|i| 10.0 + i as f64));
    let source = CsvDirectory::new(dir.path(), UTC);

    let bars = source.get_price_history("UP", 20, "1h").unwrap();
    assert_eq!(bars.len(), 20);
    assert!(bars.iter().enumerate().all(|(i, bar)| bar.bar_number == i));
    assert_eq!(bars[0].close, 40.0);
    assert_eq!(bars[0].timestamp.unwrap().timestamp(), START + 30 * DAY);
}
