use tracing::debug;

use crate::data::{Bar, EnhancedRow, Swing, SwingKind};
use crate::error::{require_at_least, require_fraction, validate_bars, ConfigError, CoreError};

/// Highest swing level the enhanced table has marker columns for.
pub const MAX_SWING_LEVEL: u8 = 3;

/// Parameters of the multi-level swing detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingParams {
    /// Minimum move of a leg, as a fraction of the price it starts from.
    pub distance_pct: f64,
    /// Minimum pullback from a leg's extreme, as a fraction of the leg,
    /// before the extreme is confirmed.
    pub retrace_pct: f64,
    /// Bars on each side of a level-1 local extremum.
    pub swing_window: usize,
    pub max_level: u8,
}

impl Default for SwingParams {
    fn default() -> Self {
        Self {
            distance_pct: 0.05,
            retrace_pct: 0.05,
            swing_window: 63,
            max_level: MAX_SWING_LEVEL,
        }
    }
}

impl SwingParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_fraction("distance_pct", self.distance_pct)?;
        require_fraction("retrace_pct", self.retrace_pct)?;
        require_at_least("swing_window", self.swing_window, 1)?;
        if self.max_level == 0 || self.max_level > MAX_SWING_LEVEL {
            return Err(ConfigError::OutOfRange {
                name: "max_level",
                value: f64::from(self.max_level),
                expected: "1..=3",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwingDetection {
    /// Swings of every level, ordered by level then bar.
    pub swings: Vec<Swing>,
    /// Copy of the input with `hi*`/`lo*` markers set at swing bars.
    pub annotated: Vec<EnhancedRow>,
}

impl SwingDetection {
    pub fn level(&self, level: u8) -> impl Iterator<Item = &Swing> + '_ {
        self.swings.iter().filter(move |swing| swing.level == level)
    }

    /// Highest level that produced swings, if any.
    pub fn top_level(&self) -> Option<u8> {
        self.swings.iter().map(|swing| swing.level).max()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pivot {
    bar_number: usize,
    price: f64,
    kind: SwingKind,
}

impl Pivot {
    /// True when `self` is a more extreme pivot of the same kind as `other`.
    fn exceeds(&self, other: &Pivot) -> bool {
        match self.kind {
            SwingKind::High => self.price > other.price,
            SwingKind::Low => self.price < other.price,
        }
    }
}

/// Detect swings at levels `1..=max_level`.
///
/// Level 1 scans the bars for local extrema over `swing_window` bars and
/// keeps the ones that survive the distance/retracement confirmation. Each
/// higher level runs the same extremum test and confirmation over the
/// previous level's swings. A level with fewer than two candidates ends the
/// hierarchy; that is an empty result, not an error.
pub fn detect_swings(bars: &[Bar], params: &SwingParams) -> Result<SwingDetection, CoreError> {
    params.validate()?;
    validate_bars(bars)?;

    let mut levels: Vec<Vec<Pivot>> = Vec::new();
    if bars.len() >= params.swing_window.saturating_mul(2) {
        let mut candidates = window_extrema(bars, params.swing_window);
        for level in 1..=params.max_level {
            if candidates.len() < 2 {
                debug!(level, candidates = candidates.len(), "not enough swing candidates");
                break;
            }
            let confirmed = confirm_swings(&candidates, params.distance_pct, params.retrace_pct);
            debug!(level, candidates = candidates.len(), swings = confirmed.len(), "swing level confirmed");
            if confirmed.len() < 2 {
                break;
            }
            candidates = sequence_extrema(&confirmed);
            levels.push(confirmed);
        }
    }

    let swings: Vec<Swing> = levels
        .iter()
        .zip(1u8..)
        .flat_map(|(pivots, level)| {
            pivots.iter().map(move |pivot| Swing {
                bar_number: pivot.bar_number,
                price: pivot.price,
                kind: pivot.kind,
                level,
            })
        })
        .collect();

    let annotated = annotate(bars, &swings);
    Ok(SwingDetection { swings, annotated })
}

/// Copy `bars` into enhanced rows with swing markers filled in.
pub fn annotate(bars: &[Bar], swings: &[Swing]) -> Vec<EnhancedRow> {
    let mut rows: Vec<EnhancedRow> = bars.iter().map(EnhancedRow::from).collect();
    for swing in swings {
        if let Some(slot) = rows
            .get_mut(swing.bar_number)
            .and_then(|row| row.marker_mut(swing.kind, swing.level))
        {
            *slot = Some(swing.price);
        }
    }
    rows
}

/// Level-1 candidates: bars whose high (low) is the extreme of the window
/// `[i - window, i + window]`, clipped at the series edges. Strictly greater
/// (lower) than the left side so a plateau yields its first bar only.
fn window_extrema(bars: &[Bar], window: usize) -> Vec<Pivot> {
    let last = bars.len() - 1;
    let mut pivots = Vec::new();

    for (idx, bar) in bars.iter().enumerate() {
        let left = &bars[idx.saturating_sub(window)..idx];
        let right = &bars[idx + 1..=idx.saturating_add(window).min(last)];

        let is_high = left.iter().all(|b| b.high < bar.high) && right.iter().all(|b| b.high <= bar.high);
        let is_low = left.iter().all(|b| b.low > bar.low) && right.iter().all(|b| b.low >= bar.low);

        let kind = match (is_high, is_low) {
            (true, true) if bar.close >= bar.open => SwingKind::High,
            (true, true) => SwingKind::Low,
            (true, false) => SwingKind::High,
            (false, true) => SwingKind::Low,
            (false, false) => continue,
        };
        let price = match kind {
            SwingKind::High => bar.high,
            SwingKind::Low => bar.low,
        };
        pivots.push(Pivot {
            bar_number: bar.bar_number,
            price,
            kind,
        });
    }

    pivots
}

/// Higher-level candidates: swings that are local extremes among their
/// same-kind neighbours, strict against the previous one.
fn sequence_extrema(swings: &[Pivot]) -> Vec<Pivot> {
    let mut pivots = Vec::new();
    for kind in [SwingKind::High, SwingKind::Low] {
        let same: Vec<&Pivot> = swings.iter().filter(|pivot| pivot.kind == kind).collect();
        for (idx, pivot) in same.iter().enumerate() {
            let beats_prev = idx == 0 || pivot.exceeds(same[idx - 1]);
            let holds_next = same.get(idx + 1).map_or(true, |next| !next.exceeds(pivot));
            if beats_prev && holds_next {
                pivots.push(**pivot);
            }
        }
    }
    pivots.sort_by_key(|pivot| pivot.bar_number);
    pivots
}

/// Alternating swing confirmation over a candidate stream.
///
/// The first candidate anchors the scan. A candidate of the current swing's
/// kind either confirms the pending opposite extreme (distance and
/// retracement both met) or, if it is more extreme, replaces the current
/// swing. Opposite-kind candidates become or extend the pending extreme.
/// The still-open leg at the end is kept when it passes the distance test.
fn confirm_swings(candidates: &[Pivot], distance_pct: f64, retrace_pct: f64) -> Vec<Pivot> {
    let Some((&anchor, rest)) = candidates.split_first() else {
        return Vec::new();
    };

    let mut swings = Vec::new();
    let mut last = anchor;
    let mut pending: Option<Pivot> = None;

    for &candidate in rest {
        if candidate.kind != last.kind {
            pending = match pending {
                Some(extreme) if !candidate.exceeds(&extreme) => Some(extreme),
                _ => Some(candidate),
            };
            continue;
        }

        match pending {
            Some(extreme)
                if leg_qualifies(&last, &extreme, distance_pct)
                    && retraced(&last, &extreme, &candidate, retrace_pct) =>
            {
                push_swing(&mut swings, last);
                last = extreme;
                pending = Some(candidate);
            }
            _ if candidate.exceeds(&last) => {
                last = candidate;
                pending = None;
            }
            _ => {}
        }
    }

    match pending {
        Some(extreme) if leg_qualifies(&last, &extreme, distance_pct) => {
            push_swing(&mut swings, last);
            push_swing(&mut swings, extreme);
        }
        _ if !swings.is_empty() => push_swing(&mut swings, last),
        _ => {}
    }
    swings
}

fn leg_qualifies(from: &Pivot, to: &Pivot, distance_pct: f64) -> bool {
    let base = from.price.abs();
    if base == 0.0 {
        return to.price != from.price;
    }
    (to.price - from.price).abs() / base >= distance_pct
}

/// Pullback from `extreme` to `candidate`, measured against the leg
/// `from -> extreme`.
fn retraced(from: &Pivot, extreme: &Pivot, candidate: &Pivot, retrace_pct: f64) -> bool {
    let leg = (extreme.price - from.price).abs();
    if leg == 0.0 {
        return false;
    }
    let pullback = match extreme.kind {
        SwingKind::High => extreme.price - candidate.price,
        SwingKind::Low => candidate.price - extreme.price,
    };
    pullback / leg >= retrace_pct
}

fn push_swing(swings: &mut Vec<Pivot>, pivot: Pivot) {
    if let Some(last) = swings.last() {
        if last.bar_number == pivot.bar_number && last.kind == pivot.kind {
            return;
        }
    }
    swings.push(pivot);
}
