use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

/// Single OHLCV bar. `bar_number` is the 0-based position in its series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub bar_number: usize,
    pub timestamp: Option<DateTime<Tz>>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Bar without a timestamp, handy for synthetic series.
    pub fn untimed(bar_number: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            bar_number,
            timestamp: None,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingKind {
    High,
    Low,
}

/// Confirmed local extremum at a given significance level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Swing {
    pub bar_number: usize,
    pub price: f64,
    pub kind: SwingKind,
    pub level: u8,
}

/// Directional leg between two consecutive opposite-kind swings of one level.
/// `kind` is the kind of the swing that ends the leg: `High` for a rising leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Peak {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: SwingKind,
    pub lvl: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegimeState {
    Up,
    Down,
    Undefined,
}

impl RegimeState {
    /// Numeric `rg` value: +1 up, -1 down, 0 undefined.
    pub fn rg(self) -> i8 {
        match self {
            RegimeState::Up => 1,
            RegimeState::Down => -1,
            RegimeState::Undefined => 0,
        }
    }

    pub fn from_rg(rg: i8) -> Self {
        match rg.signum() {
            1 => RegimeState::Up,
            -1 => RegimeState::Down,
            _ => RegimeState::Undefined,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RegimeState::Up => "uptrend",
            RegimeState::Down => "downtrend",
            RegimeState::Undefined => "undefined",
        }
    }
}

/// Maximal inclusive bar range sharing one classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Regime {
    pub start: usize,
    pub end: usize,
    pub rg: i8,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl Regime {
    pub fn new(start: usize, end: usize, state: RegimeState) -> Self {
        Self {
            start,
            end,
            rg: state.rg(),
            kind: state.label(),
        }
    }

    pub fn state(&self) -> RegimeState {
        RegimeState::from_rg(self.rg)
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelType {
    Floor,
    Ceiling,
}

/// Regime change caused by price breaking a floor or ceiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorCeiling {
    #[serde(rename = "type")]
    pub kind: LevelType,
    /// Bar of the swing that set the broken level.
    pub fc_bar: usize,
    pub fc_val: f64,
    pub rg_ch_bar: usize,
    pub rg_ch_val: f64,
    /// Signed size of the break relative to the level.
    pub test: f64,
}

/// Input bar plus every column appended by swing detection and regime
/// classification. Derived columns are `None` where they do not apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedRow {
    pub bar_number: usize,
    pub timestamp: Option<DateTime<Tz>>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub rg: Option<i8>,
    pub floor: Option<f64>,
    pub ceiling: Option<f64>,
    pub hi1: Option<f64>,
    pub lo1: Option<f64>,
    pub hi2: Option<f64>,
    pub lo2: Option<f64>,
    pub hi3: Option<f64>,
    pub lo3: Option<f64>,
}

impl From<&Bar> for EnhancedRow {
    fn from(bar: &Bar) -> Self {
        Self {
            bar_number: bar.bar_number,
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            rg: None,
            floor: None,
            ceiling: None,
            hi1: None,
            lo1: None,
            hi2: None,
            lo2: None,
            hi3: None,
            lo3: None,
        }
    }
}

impl EnhancedRow {
    /// Marker slot for a swing of the given kind and level (levels above 3
    /// have no column).
    pub fn marker_mut(&mut self, kind: SwingKind, level: u8) -> Option<&mut Option<f64>> {
        match (kind, level) {
            (SwingKind::High, 1) => Some(&mut self.hi1),
            (SwingKind::Low, 1) => Some(&mut self.lo1),
            (SwingKind::High, 2) => Some(&mut self.hi2),
            (SwingKind::Low, 2) => Some(&mut self.lo2),
            (SwingKind::High, 3) => Some(&mut self.hi3),
            (SwingKind::Low, 3) => Some(&mut self.lo3),
            _ => None,
        }
    }
}

/// Input bar plus trading-range band columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandRow {
    pub bar_number: usize,
    pub timestamp: Option<DateTime<Tz>>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub rolling_max: Option<f64>,
    pub rolling_min: Option<f64>,
    pub trading_range: Option<f64>,
    pub trading_range_lo_band: Option<f64>,
    pub trading_range_hi_band: Option<f64>,
    pub band_23: Option<f64>,
    pub band_76: Option<f64>,
    pub tr_signal: Option<u8>,
}

impl From<&Bar> for BandRow {
    fn from(bar: &Bar) -> Self {
        Self {
            bar_number: bar.bar_number,
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            rolling_max: None,
            rolling_min: None,
            trading_range: None,
            trading_range_lo_band: None,
            trading_range_hi_band: None,
            band_23: None,
            band_76: None,
            tr_signal: None,
        }
    }
}
