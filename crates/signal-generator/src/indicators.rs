//! Turtle-specific indicators: ATR as a plain mean of true ranges, and rolling
//! channel highs/lows. These are deliberately separate from a general-purpose
//! Wilder-smoothed ATR — the Turtle "N" is the simple mean the original system
//! used, and mixing the two would silently change every stop distance.

use trading_core::Bar;

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// True range for bar `i` against the prior close. `i` must be >= 1.
fn true_range(bars: &[Bar], i: usize) -> f64 {
    let hi = bars[i].high;
    let lo = bars[i].low;
    let prev_close = bars[i - 1].close;
    finite_or(
        (hi - lo).max((hi - prev_close).abs()).max((lo - prev_close).abs()),
        0.0,
    )
}

/// ATR(period) as the mean of the last `period` true ranges, matching the
/// Turtle trading system's definition of "N". Returns `None` if there aren't
/// enough bars to compute even one true range.
pub fn atr_simple_mean(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }
    let true_ranges: Vec<f64> = (1..bars.len()).map(|i| true_range(bars, i)).collect();
    if true_ranges.is_empty() {
        return None;
    }
    let window = true_ranges.len().min(period);
    let slice = &true_ranges[true_ranges.len() - window..];
    Some(slice.iter().sum::<f64>() / slice.len() as f64)
}

/// Highest high over the last `period` bars (inclusive of the most recent).
pub fn highest_high(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    let window = bars.len().min(period);
    bars[bars.len() - window..]
        .iter()
        .map(|b| b.high)
        .fold(None, |acc, h| Some(acc.map_or(h, |a: f64| a.max(h))))
}

/// Lowest low over the last `period` bars.
pub fn lowest_low(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    let window = bars.len().min(period);
    bars[bars.len() - window..]
        .iter()
        .map(|b| b.low)
        .fold(None, |acc, l| Some(acc.map_or(l, |a: f64| a.min(l))))
}

pub fn sma(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < period || period == 0 {
        return None;
    }
    let window = &bars[bars.len() - period..];
    Some(window.iter().map(|b| b.close).sum::<f64>() / period as f64)
}

pub fn volume_average(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    let window = bars.len().min(period);
    let slice = &bars[bars.len() - window..];
    Some(slice.iter().map(|b| b.volume as f64).sum::<f64>() / slice.len() as f64)
}

/// `(price - high_N days ago) / atr`, used as the breakout-strength input to
/// both the score hint and the scorer.
pub fn breakout_strength(price: f64, reference: f64, atr: f64, long: bool) -> f64 {
    if atr <= 0.0 {
        return 0.0;
    }
    let raw = if long {
        (price - reference) / atr
    } else {
        (reference - price) / atr
    };
    raw.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(h: f64, l: f64, c: f64) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open: c,
            high: h,
            low: l,
            close: c,
            volume: 1_000_000,
        }
    }

    #[test]
    fn atr_is_simple_mean_not_wilder_smoothed() {
        let bars = vec![
            bar(100.0, 98.0, 99.0),
            bar(101.0, 99.0, 100.0),
            bar(103.0, 100.0, 102.0),
        ];
        // TR2 = max(101-99, |101-99|, |99-99|) = 2
        // TR3 = max(103-100, |103-100|, |100-100|) = 3
        let atr = atr_simple_mean(&bars, 20).unwrap();
        assert!((atr - 2.5).abs() < 1e-9);
    }

    #[test]
    fn channel_picks_extremes_over_window() {
        let bars = vec![bar(100.0, 90.0, 95.0), bar(110.0, 95.0, 105.0), bar(105.0, 92.0, 100.0)];
        assert_eq!(highest_high(&bars, 20), Some(110.0));
        assert_eq!(lowest_low(&bars, 20), Some(90.0));
    }

    #[test]
    fn breakout_strength_is_zero_below_threshold() {
        assert_eq!(breakout_strength(449.0, 450.0, 5.0, true), 0.0);
        assert!(breakout_strength(460.0, 450.0, 5.0, true) > 0.0);
    }

    #[test]
    fn insufficient_bars_returns_none() {
        assert_eq!(atr_simple_mean(&[], 20), None);
        assert_eq!(atr_simple_mean(&[bar(1.0, 1.0, 1.0)], 20), None);
    }
}
