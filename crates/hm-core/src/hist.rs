//! 1-D binned distribution with per-bin statistical errors.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Absolute tolerance used when comparing bin edges.
const EDGE_TOL: f64 = 1e-9;

/// A 1-D binned distribution.
///
/// Binning (bin count and edges) is fixed at construction. All bin-wise
/// arithmetic requires operands to share the same binning; rebinning is an
/// explicit operation, never an implicit coercion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    /// Histogram name.
    pub name: String,
    /// Display title.
    pub title: String,
    /// Axis unit label (e.g. "GeV/c").
    pub units: String,
    /// Bin edges (length = n_bins + 1, strictly increasing).
    pub bin_edges: Vec<f64>,
    /// Bin contents (length = n_bins).
    pub content: Vec<f64>,
    /// Per-bin statistical errors (length = n_bins, each >= 0).
    pub error: Vec<f64>,
}

impl Histogram {
    /// Create a histogram from edges, contents and errors.
    ///
    /// Fails with [`Error::Validation`] if the shapes are inconsistent,
    /// edges are not strictly increasing, or any error is negative or
    /// non-finite.
    pub fn new(
        name: impl Into<String>,
        bin_edges: Vec<f64>,
        content: Vec<f64>,
        error: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();

        if bin_edges.len() < 2 {
            return Err(Error::Validation(format!(
                "histogram '{}' needs at least one bin ({} edges given)",
                name,
                bin_edges.len()
            )));
        }
        if content.len() != bin_edges.len() - 1 || error.len() != content.len() {
            return Err(Error::Validation(format!(
                "histogram '{}' shape mismatch: {} edges, {} contents, {} errors",
                name,
                bin_edges.len(),
                content.len(),
                error.len()
            )));
        }
        if bin_edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Validation(format!(
                "histogram '{}' edges are not strictly increasing",
                name
            )));
        }
        if error.iter().any(|e| !e.is_finite() || *e < 0.0) {
            return Err(Error::Validation(format!(
                "histogram '{}' has a negative or non-finite error",
                name
            )));
        }

        Ok(Self { name, title: String::new(), units: String::new(), bin_edges, content, error })
    }

    /// Create an empty histogram with `n_bins` uniform bins on `[lo, hi)`.
    pub fn uniform(name: impl Into<String>, n_bins: usize, lo: f64, hi: f64) -> Result<Self> {
        if n_bins == 0 || hi <= lo {
            return Err(Error::Validation("uniform binning requires n_bins > 0 and hi > lo".into()));
        }
        let width = (hi - lo) / n_bins as f64;
        let bin_edges: Vec<f64> = (0..=n_bins).map(|i| lo + i as f64 * width).collect();
        Self::new(name, bin_edges, vec![0.0; n_bins], vec![0.0; n_bins])
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.content.len()
    }

    /// Whether `other` shares this histogram's binning (within tolerance).
    pub fn same_binning(&self, other: &Histogram) -> bool {
        self.bin_edges.len() == other.bin_edges.len()
            && self
                .bin_edges
                .iter()
                .zip(&other.bin_edges)
                .all(|(a, b)| (a - b).abs() <= EDGE_TOL)
    }

    fn require_same_binning(&self, other: &Histogram, op: &str) -> Result<()> {
        if !self.same_binning(other) {
            return Err(Error::BinningMismatch(format!(
                "{}: '{}' ({} bins) vs '{}' ({} bins)",
                op,
                self.name,
                self.n_bins(),
                other.name,
                other.n_bins()
            )));
        }
        Ok(())
    }

    /// Bin-wise sum: contents add, errors combine in quadrature.
    pub fn add(&mut self, other: &Histogram) -> Result<()> {
        self.require_same_binning(other, "add")?;
        for i in 0..self.content.len() {
            self.content[i] += other.content[i];
            self.error[i] = self.error[i].hypot(other.error[i]);
        }
        Ok(())
    }

    /// Scale contents and errors by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for c in &mut self.content {
            *c *= factor;
        }
        for e in &mut self.error {
            *e *= factor.abs();
        }
    }

    /// Scale by a factor that itself carries an uncertainty.
    ///
    /// Error propagates as for a product:
    /// `e' = sqrt((content * factor_error)^2 + (error * factor)^2)`.
    pub fn scale_with_error(&mut self, factor: f64, factor_error: f64) {
        for i in 0..self.content.len() {
            self.error[i] = (self.content[i] * factor_error).hypot(self.error[i] * factor);
            self.content[i] *= factor;
        }
    }

    /// Merge groups of `ngroup` consecutive bins into one.
    ///
    /// Contents sum, errors combine in quadrature. Fails with
    /// [`Error::Rebin`] when `ngroup` does not evenly divide the bin count.
    pub fn rebin(&self, ngroup: usize) -> Result<Histogram> {
        if ngroup == 0 || self.n_bins() % ngroup != 0 {
            return Err(Error::Rebin(format!(
                "'{}': cannot merge {} bins in groups of {}",
                self.name,
                self.n_bins(),
                ngroup
            )));
        }
        let edges: Vec<f64> = self.bin_edges.iter().step_by(ngroup).copied().collect();
        self.rebin_to(&edges)
    }

    /// Redistribute contents onto `new_edges`, which must be a coarsening
    /// of the original edges (every new edge coincides with an old edge).
    pub fn rebin_to(&self, new_edges: &[f64]) -> Result<Histogram> {
        if new_edges.len() < 2
            || (new_edges[0] - self.bin_edges[0]).abs() > EDGE_TOL
            || (new_edges[new_edges.len() - 1] - self.bin_edges[self.bin_edges.len() - 1]).abs()
                > EDGE_TOL
        {
            return Err(Error::Rebin(format!(
                "'{}': new edges must span the original axis",
                self.name
            )));
        }

        let n_new = new_edges.len() - 1;
        let mut content = vec![0.0; n_new];
        let mut sumw2 = vec![0.0; n_new];

        let mut old = 0;
        for (i, hi) in new_edges[1..].iter().enumerate() {
            while old < self.n_bins() && self.bin_edges[old + 1] <= hi + EDGE_TOL {
                content[i] += self.content[old];
                sumw2[i] += self.error[old] * self.error[old];
                old += 1;
            }
            if (self.bin_edges[old] - hi).abs() > EDGE_TOL {
                return Err(Error::Rebin(format!(
                    "'{}': edge {} is not a boundary of the original binning",
                    self.name, hi
                )));
            }
        }

        let mut out = Histogram::new(
            self.name.clone(),
            new_edges.to_vec(),
            content,
            sumw2.iter().map(|w| w.sqrt()).collect(),
        )?;
        out.title = self.title.clone();
        out.units = self.units.clone();
        Ok(out)
    }

    /// Summed content and quadrature-summed error over the full axis.
    pub fn integral(&self) -> (f64, f64) {
        // Full range is always valid.
        self.integral_range(1, self.n_bins()).unwrap_or((0.0, 0.0))
    }

    /// Summed content and quadrature-summed error over bins `lo..=hi`
    /// (1-based, inclusive).
    pub fn integral_range(&self, lo: usize, hi: usize) -> Result<(f64, f64)> {
        if lo < 1 || hi > self.n_bins() || lo > hi {
            return Err(Error::Validation(format!(
                "'{}': integral range {}..={} outside 1..={}",
                self.name,
                lo,
                hi,
                self.n_bins()
            )));
        }
        let value: f64 = self.content[lo - 1..hi].iter().sum();
        let sumw2: f64 = self.error[lo - 1..hi].iter().map(|e| e * e).sum();
        Ok((value, sumw2.sqrt()))
    }

    /// Bin-wise ratio `self / other` with standard ratio error propagation.
    ///
    /// Bins where the denominator is zero get content 0 and error 0; no
    /// NaN is ever produced.
    pub fn divide(&self, other: &Histogram) -> Result<Histogram> {
        self.require_same_binning(other, "divide")?;

        let mut out = self.clone();
        for i in 0..out.content.len() {
            let (a, b) = (self.content[i], other.content[i]);
            if b == 0.0 {
                out.content[i] = 0.0;
                out.error[i] = 0.0;
                continue;
            }
            let (ea, eb) = (self.error[i], other.error[i]);
            out.content[i] = a / b;
            out.error[i] = (ea * b).hypot(eb * a) / (b * b);
        }
        Ok(out)
    }

    /// Largest bin content.
    pub fn max_content(&self) -> f64 {
        self.content.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}
