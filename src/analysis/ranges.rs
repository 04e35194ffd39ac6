use serde::Serialize;

/// Contiguous run of a non-zero directional signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalRange {
    pub start: usize,
    pub end: usize,
    pub signal: i8,
}

/// Split a signal into inclusive runs of constant direction.
///
/// Only the sign matters. Zero and missing values end a run and are not
/// reported.
pub fn regime_ranges(signal: &[Option<i8>]) -> Vec<SignalRange> {
    let mut ranges: Vec<SignalRange> = Vec::new();
    let mut open: Option<SignalRange> = None;

    for (idx, value) in signal.iter().enumerate() {
        let direction = value.map(i8::signum).unwrap_or(0);
        match open.as_mut() {
            Some(run) if run.signal == direction => run.end = idx,
            _ => {
                ranges.extend(open.take());
                if direction != 0 {
                    open = Some(SignalRange {
                        start: idx,
                        end: idx,
                        signal: direction,
                    });
                }
            }
        }
    }
    ranges.extend(open);
    ranges
}

/// Sign of each value, `None` where the input is missing.
pub fn sign_signal(values: &[Option<f64>]) -> Vec<Option<i8>> {
    values
        .iter()
        .map(|value| {
            value.map(|v| {
                if v > 0.0 {
                    1
                } else if v < 0.0 {
                    -1
                } else {
                    0
                }
            })
        })
        .collect()
}
