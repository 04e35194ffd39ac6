use tracing::debug;

use crate::analysis::peaks::major_peaks;
use crate::data::{Bar, BandRow, Peak};
use crate::error::{require_at_least, validate_bars, CoreError};

/// Band fractions of the trading range, measured up from the minimum.
/// Downstream signal thresholds depend on these exact values.
pub const BAND_23_PCT: f64 = 0.23;
pub const HI_BAND_PCT: f64 = 0.40;
pub const LO_BAND_PCT: f64 = 0.61;
pub const BAND_76_PCT: f64 = 0.76;

/// Rolling max/min of the close over `window` bars with the fixed bands.
/// The first `window - 1` rows are warm-up and stay null.
pub fn compute_bands(bars: &[Bar], window: usize) -> Result<Vec<BandRow>, CoreError> {
    require_at_least("window", window, 1)?;
    validate_bars(bars)?;

    let mut rows: Vec<BandRow> = bars.iter().map(BandRow::from).collect();
    for end in window.saturating_sub(1)..bars.len() {
        let slice = &bars[end + 1 - window..=end];
        let (max, min) = close_extremes(slice);
        fill_band(&mut rows[end], max, min);
    }
    Ok(rows)
}

/// Expanding max/min of the close from the first bar, null until
/// `min_periods` bars have been seen.
pub fn expanding_bands(bars: &[Bar], min_periods: usize) -> Result<Vec<BandRow>, CoreError> {
    require_at_least("min_periods", min_periods, 1)?;
    validate_bars(bars)?;

    let mut rows: Vec<BandRow> = bars.iter().map(BandRow::from).collect();
    expand_from(bars, &mut rows, 0, 0, bars.len() - 1, min_periods);
    Ok(rows)
}

/// Bands that reset at major peaks.
///
/// Major peaks are the legs of `peaks` at `major_level`, ordered by `end`.
/// Segment `k` (for `k >= peak_window - 1`) covers bars
/// `major[k].end ..= major[k + 1].end - 1`, the last one running to the final
/// bar. Inside a segment the max/min expand from the earliest `start` among
/// `major[k + 1 - peak_window ..= k]`. Bars before the first segment are
/// warm-up. With fewer major peaks than `peak_window` the whole series gets
/// one expanding band.
pub fn compute_bands_by_peak(
    bars: &[Bar],
    peak_window: usize,
    major_level: u8,
    peaks: &[Peak],
) -> Result<Vec<BandRow>, CoreError> {
    require_at_least("peak_window", peak_window, 1)?;
    validate_bars(bars)?;

    let last_bar = bars.len() - 1;
    let major: Vec<Peak> = major_peaks(peaks, major_level)
        .into_iter()
        .filter(|peak| peak.end <= last_bar && peak.start <= peak.end)
        .collect();
    if major.len() < peak_window {
        debug!(major = major.len(), peak_window, "falling back to a global expanding band");
        return expanding_bands(bars, 1);
    }

    let mut rows: Vec<BandRow> = bars.iter().map(BandRow::from).collect();
    for k in peak_window - 1..major.len() {
        let anchor = major[k + 1 - peak_window..=k]
            .iter()
            .map(|peak| peak.start)
            .min()
            .unwrap_or(major[k].start);
        let segment_start = major[k].end;
        let segment_end = match major.get(k + 1) {
            Some(next) => next.end.saturating_sub(1).max(segment_start),
            None => last_bar,
        };
        expand_from(bars, &mut rows, anchor, segment_start, segment_end, 1);
    }
    Ok(rows)
}

/// Ordinal position of `close` within the band: 0 below the 23% band up to
/// 4 above the 76% band. `None` while the band is in warm-up.
pub fn trading_range_signal(row: &BandRow) -> Option<u8> {
    let (band_23, hi_band, lo_band, band_76) = (
        row.band_23?,
        row.trading_range_hi_band?,
        row.trading_range_lo_band?,
        row.band_76?,
    );
    let close = row.close;
    let bucket = if close <= band_23 {
        0
    } else if close <= hi_band {
        1
    } else if close <= lo_band {
        2
    } else if close <= band_76 {
        3
    } else {
        4
    };
    Some(bucket)
}

/// Fill rows `from..=to` with max/min of the close over `anchor..=row`.
/// Rows with fewer than `min_periods` bars since the anchor stay null.
fn expand_from(bars: &[Bar], rows: &mut [BandRow], anchor: usize, from: usize, to: usize, min_periods: usize) {
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    for idx in anchor..=to {
        let close = bars[idx].close;
        max = max.max(close);
        min = min.min(close);
        if idx >= from && idx + 1 - anchor >= min_periods {
            fill_band(&mut rows[idx], max, min);
        }
    }
}

fn close_extremes(bars: &[Bar]) -> (f64, f64) {
    bars.iter().fold((f64::NEG_INFINITY, f64::INFINITY), |(max, min), bar| {
        (max.max(bar.close), min.min(bar.close))
    })
}

fn fill_band(row: &mut BandRow, max: f64, min: f64) {
    let range = max - min;
    row.rolling_max = Some(max);
    row.rolling_min = Some(min);
    row.trading_range = Some(range);
    row.trading_range_lo_band = Some(min + range * LO_BAND_PCT);
    row.trading_range_hi_band = Some(min + range * HI_BAND_PCT);
    row.band_23 = Some(min + range * BAND_23_PCT);
    row.band_76 = Some(min + range * BAND_76_PCT);
    row.tr_signal = trading_range_signal(row);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SwingKind;

    fn flat_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar::untimed(i, close, close, close, close, 100.0))
            .collect()
    }

    fn peak(start: usize, end: usize, lvl: u8) -> Peak {
        Peak {
            start,
            end,
            kind: SwingKind::High,
            lvl,
        }
    }

    const CLOSES: [f64; 10] = [10.0, 12.0, 11.0, 15.0, 14.0, 13.0, 16.0, 18.0, 17.0, 20.0];

    #[test]
    fn rolling_bands_match_fixed_fractions_exactly() {
        let rows = compute_bands(&flat_bars(&CLOSES), 4).unwrap();
        assert!(rows[..3].iter().all(|row| row.rolling_max.is_none() && row.tr_signal.is_none()));

        // Window 11, 15, 14, 13 at bar 5.
        let row = &rows[5];
        assert_eq!(row.rolling_max, Some(15.0));
        assert_eq!(row.rolling_min, Some(11.0));
        assert_eq!(row.trading_range, Some(4.0));
        assert_eq!(row.band_23, Some(11.0 + 4.0 * 0.23));
        assert_eq!(row.trading_range_hi_band, Some(11.0 + 4.0 * 0.40));
        assert_eq!(row.trading_range_lo_band, Some(11.0 + 4.0 * 0.61));
        assert_eq!(row.band_76, Some(11.0 + 4.0 * 0.76));
        // 13 sits between the 40% (12.6) and 61% (13.44) bands.
        assert_eq!(row.tr_signal, Some(2));

        let again = compute_bands(&flat_bars(&CLOSES), 4).unwrap();
        assert_eq!(rows, again);
    }

    #[test]
    fn signal_buckets_cover_the_range() {
        let bars = flat_bars(&[0.0, 100.0, 10.0, 30.0, 50.0, 70.0, 90.0]);
        let rows = compute_bands(&bars, 2).unwrap();
        assert_eq!(rows[1].tr_signal, Some(4));

        // Expanding keeps the 0..100 range fixed from bar 1 on.
        let rows = expanding_bands(&bars, 1).unwrap();
        let signals: Vec<Option<u8>> = rows.iter().skip(2).map(|row| row.tr_signal).collect();
        assert_eq!(signals, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn window_larger_than_series_is_all_warm_up() {
        let rows = compute_bands(&flat_bars(&CLOSES), 50).unwrap();
        assert_eq!(rows.len(), CLOSES.len());
        assert!(rows.iter().all(|row| row.rolling_min.is_none()));
    }

    #[test]
    fn zero_window_is_a_configuration_error() {
        assert!(compute_bands(&flat_bars(&CLOSES), 0).unwrap_err().is_configuration());
        assert!(compute_bands_by_peak(&flat_bars(&CLOSES), 0, 3, &[])
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn peak_segments_tile_the_series() {
        let bars = flat_bars(&CLOSES);
        let peaks = vec![peak(0, 1, 3), peak(1, 3, 3), peak(3, 5, 3), peak(5, 7, 3), peak(0, 2, 1)];
        let rows = compute_bands_by_peak(&bars, 2, 3, &peaks).unwrap();

        // Warm-up runs up to the end of the second major peak.
        assert!(rows[..3].iter().all(|row| row.rolling_max.is_none()));
        assert!(rows[3..].iter().all(|row| row.rolling_max.is_some()));

        // Segment 1: bars 3..=4 anchored at bar 0.
        assert_eq!(rows[3].rolling_min, Some(10.0));
        assert_eq!(rows[4].rolling_max, Some(15.0));
        // Segment 2: bars 5..=6 anchored at bar 1.
        assert_eq!(rows[5].rolling_min, Some(11.0));
        assert_eq!(rows[6].rolling_max, Some(16.0));
        // Segment 3: bars 7..=9 anchored at bar 3.
        assert_eq!(rows[7].rolling_min, Some(13.0));
        assert_eq!(rows[9].rolling_max, Some(20.0));

        for row in rows.iter().filter(|row| row.rolling_max.is_some()) {
            assert!(row.rolling_min.unwrap() <= row.close && row.close <= row.rolling_max.unwrap());
        }
    }

    #[test]
    fn band_widens_inside_a_segment() {
        let bars = flat_bars(&CLOSES);
        let peaks = vec![peak(0, 2, 3), peak(2, 4, 3)];
        let rows = compute_bands_by_peak(&bars, 1, 3, &peaks).unwrap();
        let ranges: Vec<f64> = rows[4..].iter().map(|row| row.trading_range.unwrap()).collect();
        assert!(ranges.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn too_few_major_peaks_fall_back_to_one_expanding_band() {
        let bars = flat_bars(&CLOSES);
        let rows = compute_bands_by_peak(&bars, 3, 3, &[peak(0, 4, 3)]).unwrap();
        assert_eq!(rows[0].rolling_max, Some(10.0));
        assert_eq!(rows[9].rolling_min, Some(10.0));
        assert_eq!(rows[9].rolling_max, Some(20.0));
    }

    #[test]
    fn peaks_below_the_major_level_do_not_segment() {
        let bars = flat_bars(&CLOSES);
        let peaks = vec![peak(0, 3, 2), peak(3, 5, 2), peak(5, 9, 2), peak(0, 2, 1)];
        let rows = compute_bands_by_peak(&bars, 2, 3, &peaks).unwrap();
        assert_eq!(rows, expanding_bands(&bars, 1).unwrap());
        assert!(rows.iter().all(|row| row.rolling_min == Some(10.0)));

        let segmented = compute_bands_by_peak(&bars, 2, 2, &peaks).unwrap();
        assert!(segmented[0].rolling_min.is_none());
    }
}
