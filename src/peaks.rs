//! Peak detection over a spectrum.
//!
//! [`PeakDetector`] is the seam the event builder talks to. The shipped
//! implementation, [`CwtPeakDetector`], finds peaks as ridge lines of a
//! continuous wavelet transform (Ricker wavelet), which keeps narrow
//! interferers and ignores slow baseline ripple.

use std::collections::BTreeSet;
use std::f64::consts::PI;

/// Default wavelet widths searched, half-open: `1..7`.
pub const DEFAULT_SCALE_RANGE: (usize, usize) = (1, 7);

/// Default ridge continuity: maximum column drift and allowed gap, in rows.
pub const DEFAULT_RIDGE_RANGE: (usize, usize) = (4, 4);

/// Finds peak positions in a sequence of values.
///
/// Implementations return indices into `values`, strictly ascending and each
/// `< values.len()`. The result may be empty and must be deterministic.
pub trait PeakDetector {
    fn detect_peaks(
        &self,
        values: &[f64],
        threshold: f64,
        scale_range: (usize, usize),
        ridge_range: (usize, usize),
    ) -> Vec<usize>;
}

/// Continuous-wavelet-transform ridge-line peak finder.
///
/// * widths `scale_range.0 .. scale_range.1` (a single width if empty)
/// * a ridge may drift `ridge_range.0` samples between adjacent widths and
///   skip up to `ridge_range.1` widths without a maximum
/// * ridges spanning fewer than half the widths are discarded
/// * peaks whose value is below `threshold` are discarded
#[derive(Debug, Clone, Copy, Default)]
pub struct CwtPeakDetector;

impl PeakDetector for CwtPeakDetector {
    fn detect_peaks(
        &self,
        values: &[f64],
        threshold: f64,
        scale_range: (usize, usize),
        ridge_range: (usize, usize),
    ) -> Vec<usize> {
        if values.is_empty() {
            return Vec::new();
        }

        let widths = widths(scale_range);
        let baseline = median(values);
        let centred: Vec<f64> = values.iter().map(|v| v - baseline).collect();

        let rows: Vec<Vec<f64>> = widths
            .iter()
            .map(|&w| convolve_same(&centred, &ricker(kernel_len(w, values.len()), w as f64)))
            .collect();

        let min_rows = widths.len().div_ceil(2);
        let peaks: BTreeSet<usize> = trace_ridges(&rows, ridge_range.0, ridge_range.1)
            .into_iter()
            .filter(|ridge| ridge.rows >= min_rows)
            .map(|ridge| ridge.col)
            .filter(|&col| col < values.len() && values[col] >= threshold)
            .collect();

        peaks.into_iter().collect()
    }
}

fn widths(scale_range: (usize, usize)) -> Vec<usize> {
    let (lo, hi) = scale_range;
    let lo = lo.max(1);
    if hi <= lo {
        vec![lo]
    } else {
        (lo..hi).collect()
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Ten widths of support, capped by the signal and kept odd so the wavelet
/// has a centre sample.
fn kernel_len(width: usize, signal_len: usize) -> usize {
    let len = (10 * width).min(signal_len).max(1);
    if len % 2 == 0 {
        len - 1
    } else {
        len
    }
}

/// Ricker ("Mexican hat") wavelet sampled at `points` positions.
fn ricker(points: usize, a: f64) -> Vec<f64> {
    let amp = 2.0 / ((3.0 * a).sqrt() * PI.powf(0.25));
    let wsq = a * a;
    let centre = (points as f64 - 1.0) / 2.0;
    (0..points)
        .map(|i| {
            let x = i as f64 - centre;
            let xsq = x * x;
            amp * (1.0 - xsq / wsq) * (-xsq / (2.0 * wsq)).exp()
        })
        .collect()
}

/// Convolution with zero padding, output the same length as `signal`.
/// `kernel` is symmetric with odd length.
fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let half = kernel.len() / 2;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, k)| {
                    let s = (i + j).checked_sub(half)?;
                    signal.get(s).map(|v| v * k)
                })
                .sum()
        })
        .collect()
}

/// Positive local maxima of one CWT row, ascending.
fn local_maxima(row: &[f64]) -> Vec<usize> {
    (0..row.len())
        .filter(|&i| {
            let v = row[i];
            v > 0.0 && (i == 0 || v > row[i - 1]) && (i + 1 == row.len() || v >= row[i + 1])
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ridge {
    /// Column at the smallest width reached so far.
    col: usize,
    /// Rows in which the ridge had a maximum.
    rows: usize,
    /// Consecutive rows without a maximum.
    gap: usize,
}

/// Follow maxima from the widest row down to the narrowest.
fn trace_ridges(rows: &[Vec<f64>], max_drift: usize, max_gap: usize) -> Vec<Ridge> {
    let mut active: Vec<Ridge> = Vec::new();
    let mut finished: Vec<Ridge> = Vec::new();

    for row in rows.iter().rev() {
        let maxima = local_maxima(row);
        let mut taken = vec![false; maxima.len()];

        for ridge in active.iter_mut() {
            let nearest = maxima
                .iter()
                .enumerate()
                .filter(|(k, _)| !taken[*k])
                .map(|(k, &col)| (k, col.abs_diff(ridge.col)))
                .filter(|&(_, drift)| drift <= max_drift)
                .min_by_key(|&(_, drift)| drift);

            match nearest {
                Some((k, _)) => {
                    taken[k] = true;
                    ridge.col = maxima[k];
                    ridge.rows += 1;
                    ridge.gap = 0;
                }
                None => ridge.gap += 1,
            }
        }

        let (closed, open): (Vec<Ridge>, Vec<Ridge>) =
            active.into_iter().partition(|ridge| ridge.gap > max_gap);
        finished.extend(closed);
        active = open;

        active.extend(
            maxima
                .iter()
                .zip(&taken)
                .filter(|(_, t)| !**t)
                .map(|(&col, _)| Ridge { col, rows: 1, gap: 0 }),
        );
    }

    finished.extend(active);
    finished
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(values: &[f64], threshold: f64) -> Vec<usize> {
        CwtPeakDetector.detect_peaks(values, threshold, DEFAULT_SCALE_RANGE, DEFAULT_RIDGE_RANGE)
    }

    fn spikes(len: usize, floor: f64, spikes: &[(usize, f64)]) -> Vec<f64> {
        let mut v = vec![floor; len];
        for &(i, level) in spikes {
            v[i] = level;
        }
        v
    }

    #[test]
    fn test_empty_input() {
        assert!(detect(&[], f64::NEG_INFINITY).is_empty());
    }

    #[test]
    fn test_flat_spectrum_has_no_peaks() {
        assert!(detect(&[-90.0; 50], f64::NEG_INFINITY).is_empty());
    }

    #[test]
    fn test_single_spike_on_floor() {
        let v = spikes(64, -90.0, &[(30, -40.0)]);
        assert_eq!(detect(&v, -60.0), vec![30]);
    }

    #[test]
    fn test_threshold_discards_weak_peaks() {
        let v = spikes(64, -90.0, &[(20, -40.0), (45, -70.0)]);
        assert_eq!(detect(&v, f64::NEG_INFINITY), vec![20, 45]);
        assert_eq!(detect(&v, -60.0), vec![20]);
        assert!(detect(&v, -10.0).is_empty());
    }

    #[test]
    fn test_gaussian_peak_centre() {
        let v: Vec<f64> = (0..128)
            .map(|i| (-((i as f64 - 50.0).powi(2)) / 18.0).exp())
            .collect();
        assert_eq!(detect(&v, 0.5), vec![50]);
    }

    #[test]
    fn test_output_sorted_in_bounds_and_deterministic() {
        let v: Vec<f64> = (0..300)
            .map(|i| {
                let x = i as f64;
                -85.0 + 3.0 * (x * 0.37).sin() + 2.0 * (x * 1.91).cos() + if i % 41 == 7 { 25.0 } else { 0.0 }
            })
            .collect();
        let a = detect(&v, f64::NEG_INFINITY);
        let b = detect(&v, f64::NEG_INFINITY);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(a.iter().all(|&i| i < v.len()));
    }

    #[test]
    fn test_short_signal_caps_kernel() {
        let v = [0.0, 5.0, 0.0];
        assert_eq!(detect(&v, 1.0), vec![1]);
    }

    #[test]
    fn test_widths_degenerate_range() {
        assert_eq!(widths((1, 7)), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(widths((4, 4)), vec![4]);
        assert_eq!(widths((0, 2)), vec![1]);
    }

    #[test]
    fn test_ricker_centre_is_maximum() {
        let w = ricker(9, 1.0);
        let centre = w[4];
        assert!(w.iter().all(|&x| x <= centre));
        assert!((w[3] - w[5]).abs() < 1e-12);
    }
}
