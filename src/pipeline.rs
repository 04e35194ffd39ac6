use serde::Serialize;
use tracing::debug;

use crate::analysis::peaks::build_peak_table;
use crate::analysis::regime::{classify_regimes, RetestMode};
use crate::analysis::swings::{detect_swings, SwingParams};
use crate::data::{Bar, EnhancedRow, FloorCeiling, Peak, Regime, RegimeState, Swing};
use crate::error::CoreError;

/// Everything the floor/ceiling run needs; the regime is classified on
/// swings of `swing.max_level`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloorCeilingParams {
    pub swing: SwingParams,
    pub retest: RetestMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorCeilingTables {
    pub swings: Vec<Swing>,
    pub peaks: Vec<Peak>,
    pub regimes: Vec<Regime>,
    pub floor_ceiling: Vec<FloorCeiling>,
    pub enhanced: Vec<EnhancedRow>,
}

impl FloorCeilingTables {
    /// Regime of the last bar, `None` while no regime is established.
    pub fn current_regime(&self) -> Option<RegimeState> {
        self.enhanced.last().and_then(|row| row.rg).map(RegimeState::from_rg)
    }

    /// Empty regime table: the legitimate "no signal yet" outcome.
    pub fn is_empty(&self) -> bool {
        self.regimes.is_empty()
    }

    /// Most recent peaks, newest last.
    pub fn recent_peaks(&self, count: usize) -> &[Peak] {
        let skip = self.peaks.len().saturating_sub(count);
        &self.peaks[skip..]
    }
}

/// Swing detection, peak table and regime classification in one pass.
///
/// The input is only borrowed; every table is freshly allocated, so calling
/// this twice on the same bars yields identical output.
pub fn run_floor_ceiling(bars: &[Bar], params: &FloorCeilingParams) -> Result<FloorCeilingTables, CoreError> {
    let detection = detect_swings(bars, &params.swing)?;
    let peaks = build_peak_table(&detection.swings);
    let classification = classify_regimes(bars, &detection.swings, params.swing.max_level, params.retest)?;

    debug!(
        bars = bars.len(),
        swings = detection.swings.len(),
        peaks = peaks.len(),
        regimes = classification.regimes.len(),
        "floor/ceiling run complete"
    );

    Ok(FloorCeilingTables {
        swings: detection.swings,
        peaks,
        regimes: classification.regimes,
        floor_ceiling: classification.floor_ceiling,
        enhanced: classification.enhanced,
    })
}
