use thiserror::Error;

use crate::data::Bar;

/// Malformed bar series. Fatal: the caller has to fix the data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("bar series is empty")]
    Empty,

    #[error("bar numbers must be 0-based and gap-free: expected {expected} at position {position}, found {found}")]
    BarNumber {
        position: usize,
        expected: usize,
        found: usize,
    },

    #[error("bar {bar_number} has a non-finite {field} value")]
    NonFinite {
        bar_number: usize,
        field: &'static str,
    },

    #[error("bar {bar_number} has high {high} below low {low}")]
    InvertedRange { bar_number: usize, high: f64, low: f64 },
}

/// Invalid numeric parameter supplied at call time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be in {expected}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        value: usize,
        min: usize,
    },

    #[error("{fast_name} ({fast}) must be smaller than {slow_name} ({slow})")]
    Ordering {
        fast_name: &'static str,
        fast: usize,
        slow_name: &'static str,
        slow: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CoreError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, CoreError::Config(_))
    }
}

pub(crate) fn require_fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            expected: "(0, 1)",
        })
    }
}

pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            expected: "(0, inf)",
        })
    }
}

pub(crate) fn require_at_least(name: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooSmall { name, value, min })
    }
}

/// Check that `bars` is non-empty, numbered 0..n without gaps and carries
/// finite prices with `high >= low`.
pub fn validate_bars(bars: &[Bar]) -> Result<(), InputError> {
    if bars.is_empty() {
        return Err(InputError::Empty);
    }

    for (position, bar) in bars.iter().enumerate() {
        if bar.bar_number != position {
            return Err(InputError::BarNumber {
                position,
                expected: position,
                found: bar.bar_number,
            });
        }
        let fields = [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
            ("volume", bar.volume),
        ];
        if let Some(&(field, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(InputError::NonFinite {
                bar_number: bar.bar_number,
                field,
            });
        }
        if bar.high < bar.low {
            return Err(InputError::InvertedRange {
                bar_number: bar.bar_number,
                high: bar.high,
                low: bar.low,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(n: usize, close: f64) -> Bar {
        Bar::untimed(n, close, close, close, close, 1.0)
    }

    #[test]
    fn empty_series_is_rejected() {
        assert_eq!(validate_bars(&[]), Err(InputError::Empty));
    }

    #[test]
    fn gap_in_bar_numbers_is_rejected() {
        let bars = vec![bar(0, 1.0), bar(2, 1.0)];
        assert_eq!(
            validate_bars(&bars),
            Err(InputError::BarNumber {
                position: 1,
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn nan_close_is_rejected() {
        let mut bars = vec![bar(0, 1.0), bar(1, 1.0)];
        bars[1].close = f64::NAN;
        assert!(matches!(
            validate_bars(&bars),
            Err(InputError::NonFinite { field: "close", .. })
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let bars = vec![Bar::untimed(0, 1.0, 0.5, 1.5, 1.0, 1.0)];
        assert!(matches!(
            validate_bars(&bars),
            Err(InputError::InvertedRange { bar_number: 0, .. })
        ));
    }

    #[test]
    fn fraction_bounds_are_exclusive() {
        assert!(require_fraction("distance_pct", 0.05).is_ok());
        assert!(require_fraction("distance_pct", 0.0).is_err());
        assert!(require_fraction("distance_pct", 1.0).is_err());
        assert!(require_fraction("distance_pct", f64::NAN).is_err());
    }

    #[test]
    fn core_error_reports_configuration() {
        let err: CoreError = ConfigError::TooSmall {
            name: "window",
            value: 0,
            min: 1,
        }
        .into();
        assert!(err.is_configuration());
        let err: CoreError = InputError::Empty.into();
        assert!(!err.is_configuration());
    }
}
