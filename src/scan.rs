use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::data::{Regime, RegimeState};
use crate::error::CoreError;
use crate::loader::{LoaderError, PriceHistory};
use crate::pipeline::{run_floor_ceiling, FloorCeilingParams, FloorCeilingTables};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Regime row tagged with the symbol it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolRegime {
    pub symbol: String,
    pub start: usize,
    pub end: usize,
    pub rg: i8,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl SymbolRegime {
    fn new(symbol: &str, regime: &Regime) -> Self {
        Self {
            symbol: symbol.to_string(),
            start: regime.start,
            end: regime.end,
            rg: regime.rg,
            kind: regime.kind,
        }
    }
}

/// Where a symbol stands on its last bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolStatus {
    pub symbol: String,
    pub bars: usize,
    pub regime: Option<RegimeState>,
    pub last_change_bar: Option<usize>,
    pub last_close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub regimes: Vec<SymbolRegime>,
    pub statuses: Vec<SymbolStatus>,
    pub failures: Vec<SymbolFailure>,
}

/// Run the floor/ceiling pipeline for every symbol on the rayon pool.
///
/// Symbols are independent; one that fails to load or classify is recorded
/// in `failures` and the rest of the scan carries on. Output keeps the order
/// of `symbols`.
pub fn scan_symbols<S>(
    source: &S,
    symbols: &[String],
    bar_count: usize,
    interval: &str,
    params: &FloorCeilingParams,
) -> ScanReport
where
    S: PriceHistory + Sync + ?Sized,
{
    let outcomes: Vec<(&String, Result<(FloorCeilingTables, f64), ScanError>)> = symbols
        .par_iter()
        .map(|symbol| {
            let outcome = source
                .get_price_history(symbol, bar_count, interval)
                .map_err(ScanError::from)
                .and_then(|bars| {
                    let last_close = bars.last().map(|bar| bar.close).unwrap_or(f64::NAN);
                    let tables = run_floor_ceiling(&bars, params)?;
                    Ok((tables, last_close))
                });
            (symbol, outcome)
        })
        .collect();

    let mut report = ScanReport::default();
    for (symbol, outcome) in outcomes {
        match outcome {
            Ok((tables, last_close)) => {
                report
                    .regimes
                    .extend(tables.regimes.iter().map(|regime| SymbolRegime::new(symbol, regime)));
                report.statuses.push(SymbolStatus {
                    symbol: symbol.clone(),
                    bars: tables.enhanced.len(),
                    regime: tables.current_regime(),
                    last_change_bar: tables.floor_ceiling.last().map(|change| change.rg_ch_bar),
                    last_close,
                });
            }
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "skipping symbol");
                report.failures.push(SymbolFailure {
                    symbol: symbol.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        symbols = symbols.len(),
        classified = report.statuses.len(),
        failed = report.failures.len(),
        "scan complete"
    );
    report
}
