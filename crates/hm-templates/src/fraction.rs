//! Fraction fitting: relative background normalizations from data shape.
//!
//! The fitter is a narrow contract over an external numerical solver. The
//! production implementation solves the non-negative least-squares problem
//! `min || sum_i f_i * bg_i - data ||` with an active-set iteration, so a
//! returned fraction rescales its background template directly (fractions
//! need not sum to 1).

use hm_core::Histogram;
use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Fits fractional normalizations of background templates to data.
pub trait FractionFitter {
    /// Fit one fraction per background, aligned with the input order.
    ///
    /// All distributions must share the data's binning and `backgrounds`
    /// must be non-empty. Fractions are non-negative; non-convergence is
    /// reported as [`Error::FitConvergence`], never silently defaulted.
    fn fit(&self, data: &Histogram, backgrounds: &[&Histogram]) -> Result<Vec<f64>>;
}

/// Non-negative least-squares fitter on the bin contents.
pub struct LeastSquaresFitter {
    /// Active-set iteration cap; each iteration drops one background.
    pub max_iterations: usize,
}

impl Default for LeastSquaresFitter {
    fn default() -> Self {
        Self { max_iterations: 64 }
    }
}

impl FractionFitter for LeastSquaresFitter {
    fn fit(&self, data: &Histogram, backgrounds: &[&Histogram]) -> Result<Vec<f64>> {
        if backgrounds.is_empty() {
            return Err(Error::FitConvergence("no backgrounds to fit".into()));
        }
        for bg in backgrounds {
            if !data.same_binning(bg) {
                return Err(hm_core::Error::BinningMismatch(format!(
                    "fit: '{}' does not share the data binning",
                    bg.name
                ))
                .into());
            }
        }

        let n_bins = data.n_bins();
        let k = backgrounds.len();

        let a = DMatrix::from_fn(n_bins, k, |bin, col| backgrounds[col].content[bin]);
        let d = DVector::from_iterator(n_bins, data.content.iter().copied());

        let ata = a.transpose() * &a;
        let atd = a.transpose() * &d;

        // Active-set NNLS: solve the unconstrained normal equations on the
        // active columns, drop the most negative fraction, repeat.
        let mut active: Vec<usize> = (0..k).collect();
        for _ in 0..self.max_iterations {
            if active.is_empty() {
                return Err(Error::FitConvergence(
                    "no background retains a non-negative fraction".into(),
                ));
            }

            let sub_ata = DMatrix::from_fn(active.len(), active.len(), |r, c| {
                ata[(active[r], active[c])]
            });
            let sub_atd = DVector::from_fn(active.len(), |r, _| atd[active[r]]);

            let solution = sub_ata
                .cholesky()
                .map(|ch| ch.solve(&sub_atd))
                .ok_or_else(|| Error::FitConvergence("singular normal matrix".into()))?;

            if solution.iter().any(|f| !f.is_finite()) {
                return Err(Error::FitConvergence("non-finite fraction".into()));
            }

            const TOL: f64 = 1e-12;
            if solution.iter().all(|f| *f >= -TOL) {
                let mut fractions = vec![0.0; k];
                for (slot, f) in active.iter().zip(solution.iter()) {
                    fractions[*slot] = f.max(0.0);
                }
                return Ok(fractions);
            }

            let worst = solution
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.total_cmp(b))
                .map(|(i, _)| i)
                .unwrap_or(0);
            active.remove(worst);
        }

        Err(Error::FitConvergence("active-set iteration limit reached".into()))
    }
}
