//! Cumulative/efficiency transform.

use crate::hist::Histogram;

/// Derive the normalized running-integral distribution of `hist`.
///
/// Bin *i* of the result holds `integral(1..=i) / integral(1..=N)`; its
/// error is the quadrature-propagated error of that partial integral,
/// scaled by the same normalization. For non-negative inputs the result is
/// non-decreasing and its final bin equals 1.
///
/// A zero total integral yields a structurally valid all-zero distribution
/// so that consumers never have to special-case it.
pub fn cumulative(hist: &Histogram) -> Histogram {
    let mut out = hist.clone();
    let (total, _) = hist.integral();

    if total == 0.0 {
        out.content.iter_mut().for_each(|c| *c = 0.0);
        out.error.iter_mut().for_each(|e| *e = 0.0);
        return out;
    }

    let mut running = 0.0;
    let mut sumw2 = 0.0;
    for i in 0..hist.n_bins() {
        running += hist.content[i];
        sumw2 += hist.error[i] * hist.error[i];
        out.content[i] = running / total;
        out.error[i] = sumw2.sqrt() / total.abs();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_is_monotone_and_ends_at_one() {
        let h = Histogram::new(
            "h",
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![1.0, 0.0, 2.0, 1.0],
            vec![1.0, 0.0, 1.4, 1.0],
        )
        .expect("hist");

        let c = cumulative(&h);

        for w in c.content.windows(2) {
            assert!(w[1] >= w[0]);
        }
        assert!((c.content[3] - 1.0).abs() < 1e-12);
        assert!((c.content[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn cumulative_error_tracks_partial_integral() {
        let h = Histogram::new("h", vec![0.0, 1.0, 2.0], vec![3.0, 1.0], vec![3.0, 4.0])
            .expect("hist");

        let c = cumulative(&h);

        assert!((c.error[0] - 3.0 / 4.0).abs() < 1e-12);
        assert!((c.error[1] - 5.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn zero_total_integral_yields_all_zero_output() {
        let h = Histogram::uniform("empty", 5, 0.0, 5.0).expect("hist");
        let c = cumulative(&h);

        assert_eq!(c.n_bins(), 5);
        assert!(c.content.iter().all(|c| *c == 0.0));
        assert!(c.error.iter().all(|e| *e == 0.0));
    }
}
