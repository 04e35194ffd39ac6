use itertools::Itertools;

use crate::data::{Peak, Swing};

/// Pair consecutive swings of each level into directional legs.
///
/// The result is stably sorted by `end`, then by `lvl`, so finer legs come
/// first when several levels end on the same bar.
pub fn build_peak_table(swings: &[Swing]) -> Vec<Peak> {
    let mut levels: Vec<u8> = swings.iter().map(|swing| swing.level).collect();
    levels.sort_unstable();
    levels.dedup();

    let mut peaks: Vec<Peak> = levels
        .into_iter()
        .flat_map(move |level| {
            swings
                .iter()
                .filter(move |swing| swing.level == level)
                .tuple_windows()
                .filter(|(from, to)| from.kind != to.kind)
                .map(move |(from, to)| Peak {
                    start: from.bar_number,
                    end: to.bar_number,
                    kind: to.kind,
                    lvl: level,
                })
        })
        .collect();

    peaks.sort_by_key(|peak| (peak.end, peak.lvl));
    peaks
}

/// Peaks of `major_level`, ordered by `end`. Empty when detection never
/// reached that level.
pub fn major_peaks(peaks: &[Peak], major_level: u8) -> Vec<Peak> {
    let mut major_peaks: Vec<Peak> = peaks.iter().copied().filter(|peak| peak.lvl == major_level).collect();
    major_peaks.sort_by_key(|peak| peak.end);
    major_peaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SwingKind;

    fn swing(bar_number: usize, price: f64, kind: SwingKind, level: u8) -> Swing {
        Swing {
            bar_number,
            price,
            kind,
            level,
        }
    }

    #[test]
    fn pairs_consecutive_swings_per_level() {
        let swings = vec![
            swing(0, 100.0, SwingKind::Low, 1),
            swing(20, 120.0, SwingKind::High, 1),
            swing(30, 110.0, SwingKind::Low, 1),
            swing(50, 130.0, SwingKind::High, 1),
            swing(0, 100.0, SwingKind::Low, 2),
            swing(50, 130.0, SwingKind::High, 2),
        ];
        let peaks = build_peak_table(&swings);
        assert_eq!(
            peaks,
            vec![
                Peak { start: 0, end: 20, kind: SwingKind::High, lvl: 1 },
                Peak { start: 20, end: 30, kind: SwingKind::Low, lvl: 1 },
                Peak { start: 30, end: 50, kind: SwingKind::High, lvl: 1 },
                Peak { start: 0, end: 50, kind: SwingKind::High, lvl: 2 },
            ]
        );
    }

    #[test]
    fn single_swing_level_has_no_peaks() {
        let swings = vec![
            swing(0, 100.0, SwingKind::Low, 1),
            swing(5, 110.0, SwingKind::High, 1),
            swing(5, 110.0, SwingKind::High, 2),
        ];
        let peaks = build_peak_table(&swings);
        assert_eq!(peaks.len(), 1);
        assert!(peaks.iter().all(|peak| peak.lvl == 1));
    }

    #[test]
    fn ends_are_non_decreasing() {
        let swings = vec![
            swing(3, 1.0, SwingKind::High, 2),
            swing(9, 0.5, SwingKind::Low, 2),
            swing(0, 0.8, SwingKind::Low, 1),
            swing(3, 1.0, SwingKind::High, 1),
            swing(6, 0.7, SwingKind::Low, 1),
            swing(8, 0.9, SwingKind::High, 1),
            swing(9, 0.5, SwingKind::Low, 1),
        ];
        let peaks = build_peak_table(&swings);
        assert!(peaks.windows(2).all(|pair| pair[0].end <= pair[1].end));
        let at_nine: Vec<u8> = peaks.iter().filter(|p| p.end == 9).map(|p| p.lvl).collect();
        assert_eq!(at_nine, vec![1, 2]);
    }

    #[test]
    fn major_peaks_use_the_configured_level() {
        let peaks = vec![
            Peak { start: 0, end: 20, kind: SwingKind::High, lvl: 1 },
            Peak { start: 0, end: 50, kind: SwingKind::High, lvl: 3 },
            Peak { start: 50, end: 80, kind: SwingKind::Low, lvl: 3 },
        ];
        let major = major_peaks(&peaks, 3);
        assert_eq!(major.len(), 2);
        assert!(major.iter().all(|peak| peak.lvl == 3));
        assert!(major_peaks(&[], 3).is_empty());
    }

    #[test]
    fn lower_levels_are_never_major() {
        let peaks = vec![
            Peak { start: 0, end: 20, kind: SwingKind::High, lvl: 1 },
            Peak { start: 0, end: 50, kind: SwingKind::High, lvl: 2 },
        ];
        assert!(major_peaks(&peaks, 3).is_empty());
        assert_eq!(major_peaks(&peaks, 2).len(), 1);
    }
}
