use tracing::debug;

use crate::analysis::ranges::regime_ranges;
use crate::analysis::swings::annotate;
use crate::data::{Bar, EnhancedRow, FloorCeiling, LevelType, Regime, RegimeState, Swing, SwingKind};
use crate::error::{validate_bars, CoreError};

/// How a break of the active floor/ceiling turns into a regime change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetestMode {
    /// The close that breaks the level flips the regime.
    #[default]
    Breakout,
    /// After the break, wait for a level-1 swing back toward the broken
    /// level; a close back through the level cancels the break.
    Retest,
}

impl RetestMode {
    pub fn from_flag(find_retest_swing: bool) -> Self {
        if find_retest_swing {
            RetestMode::Retest
        } else {
            RetestMode::Breakout
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeClassification {
    pub enhanced: Vec<EnhancedRow>,
    pub regimes: Vec<Regime>,
    pub floor_ceiling: Vec<FloorCeiling>,
}

/// Price level set by a major swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingLevel {
    pub bar_number: usize,
    pub price: f64,
}

/// What the classifier knows at one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarContext {
    pub bar_number: usize,
    pub close: f64,
    /// Latest major low at or before this bar.
    pub floor: Option<SwingLevel>,
    /// Latest major high at or before this bar.
    pub ceiling: Option<SwingLevel>,
    /// Kind of the level-1 swing sitting on this bar, if any.
    pub swing: Option<SwingKind>,
}

/// Regime state machine. `advance` is the single transition function for
/// both retest modes.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeMachine {
    mode: RetestMode,
    state: RegimeState,
    /// Level broken on an earlier bar, awaiting the retest swing.
    pending: Option<SwingLevel>,
}

impl RegimeMachine {
    pub fn new(mode: RetestMode, initial: RegimeState) -> Self {
        Self {
            mode,
            state: initial,
            pending: None,
        }
    }

    pub fn state(&self) -> RegimeState {
        self.state
    }

    #[cfg(test)]
    fn has_pending_break(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed one bar; returns the floor/ceiling record when the regime flips.
    pub fn advance(&mut self, ctx: &BarContext) -> Option<FloorCeiling> {
        let (active, retest_kind) = match self.state {
            RegimeState::Up => (ctx.floor, SwingKind::High),
            RegimeState::Down => (ctx.ceiling, SwingKind::Low),
            RegimeState::Undefined => return None,
        };

        if let Some(pending) = self.pending {
            if !self.breaks(ctx.close, pending.price) {
                self.pending = None;
            } else if ctx.swing == Some(retest_kind) {
                return Some(self.flip(pending, ctx));
            } else {
                return None;
            }
        }

        let level = active?;
        if !self.breaks(ctx.close, level.price) {
            return None;
        }
        match self.mode {
            RetestMode::Breakout => Some(self.flip(level, ctx)),
            RetestMode::Retest => {
                self.pending = Some(level);
                None
            }
        }
    }

    fn breaks(&self, close: f64, level: f64) -> bool {
        match self.state {
            RegimeState::Up => close < level,
            RegimeState::Down => close > level,
            RegimeState::Undefined => false,
        }
    }

    fn flip(&mut self, level: SwingLevel, ctx: &BarContext) -> FloorCeiling {
        let kind = match self.state {
            RegimeState::Down => LevelType::Ceiling,
            _ => LevelType::Floor,
        };
        self.state = match self.state {
            RegimeState::Up => RegimeState::Down,
            RegimeState::Down => RegimeState::Up,
            RegimeState::Undefined => RegimeState::Undefined,
        };
        self.pending = None;

        let test = if level.price != 0.0 {
            (ctx.close - level.price) / level.price
        } else {
            0.0
        };
        FloorCeiling {
            kind,
            fc_bar: level.bar_number,
            fc_val: level.price,
            rg_ch_bar: ctx.bar_number,
            rg_ch_val: ctx.close,
            test,
        }
    }
}

/// Classify every bar into a regime using the swings of `major_level`.
///
/// Bars before the first major swing stay undefined (`rg` null). The first
/// two major swings set the initial direction; afterwards the regime flips
/// when the close breaks the latest major low (in an uptrend) or high (in a
/// downtrend), subject to `mode`. Fewer than two major swings yields empty
/// tables and a null `rg` column.
pub fn classify_regimes(
    bars: &[Bar],
    swings: &[Swing],
    major_level: u8,
    mode: RetestMode,
) -> Result<RegimeClassification, CoreError> {
    validate_bars(bars)?;
    let mut enhanced = annotate(bars, swings);

    let mut major: Vec<&Swing> = swings.iter().filter(|swing| swing.level == major_level).collect();
    major.sort_by_key(|swing| swing.bar_number);
    let (first, second) = match major.as_slice() {
        [first, second, ..] => (*first, *second),
        _ => {
            debug!(major_level, swings = major.len(), "not enough major swings for a regime");
            return Ok(RegimeClassification {
                enhanced,
                regimes: Vec::new(),
                floor_ceiling: Vec::new(),
            });
        }
    };

    let initial = match second.kind {
        SwingKind::High => RegimeState::Up,
        SwingKind::Low => RegimeState::Down,
    };

    let mut level_one: Vec<Option<SwingKind>> = vec![None; bars.len()];
    for swing in swings.iter().filter(|swing| swing.level == 1) {
        if let Some(slot) = level_one.get_mut(swing.bar_number) {
            *slot = Some(swing.kind);
        }
    }

    let mut machine = RegimeMachine::new(mode, initial);
    let mut floor_ceiling = Vec::new();
    let mut floor: Option<SwingLevel> = None;
    let mut ceiling: Option<SwingLevel> = None;
    let mut next_major = 0usize;

    for (bar, row) in bars.iter().zip(enhanced.iter_mut()).skip(first.bar_number) {
        while let Some(swing) = major.get(next_major).filter(|swing| swing.bar_number <= bar.bar_number) {
            let level = SwingLevel {
                bar_number: swing.bar_number,
                price: swing.price,
            };
            match swing.kind {
                SwingKind::High => ceiling = Some(level),
                SwingKind::Low => floor = Some(level),
            }
            next_major += 1;
        }

        let ctx = BarContext {
            bar_number: bar.bar_number,
            close: bar.close,
            floor,
            ceiling,
            swing: level_one[bar.bar_number],
        };
        if let Some(change) = machine.advance(&ctx) {
            debug!(
                bar = change.rg_ch_bar,
                level = change.fc_val,
                kind = ?change.kind,
                "regime change"
            );
            floor_ceiling.push(change);
        }

        row.rg = Some(machine.state().rg());
        row.floor = floor.map(|level| level.price);
        row.ceiling = ceiling.map(|level| level.price);
    }

    let regimes = regime_table(&enhanced);
    Ok(RegimeClassification {
        enhanced,
        regimes,
        floor_ceiling,
    })
}

/// Regime rows from the `rg` column: inclusive runs, plus a leading
/// undefined row covering the warm-up prefix when there is one.
pub fn regime_table(enhanced: &[EnhancedRow]) -> Vec<Regime> {
    let signal: Vec<Option<i8>> = enhanced.iter().map(|row| row.rg).collect();
    let mut regimes: Vec<Regime> = regime_ranges(&signal)
        .into_iter()
        .map(|range| Regime::new(range.start, range.end, RegimeState::from_rg(range.signal)))
        .collect();

    if let Some(first) = regimes.first() {
        if first.start > 0 {
            let prefix = Regime::new(0, first.start - 1, RegimeState::Undefined);
            regimes.insert(0, prefix);
        }
    }
    regimes
}
