//! On-disk record schema.

use hm_core::Histogram;
use serde::{Deserialize, Serialize};

/// One stored distribution.
///
/// Errors are persisted as sum-of-weights-squared per bin, the way
/// histogramming frameworks store them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistRecord {
    /// Display title.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Axis unit label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub units: String,
    /// Bin edges (length = n_bins + 1).
    pub bin_edges: Vec<f64>,
    /// Bin contents.
    pub content: Vec<f64>,
    /// Sum of weights squared per bin.
    pub sumw2: Vec<f64>,
}

impl HistRecord {
    /// Build a record from a histogram.
    pub fn from_histogram(hist: &Histogram) -> Self {
        Self {
            title: hist.title.clone(),
            units: hist.units.clone(),
            bin_edges: hist.bin_edges.clone(),
            content: hist.content.clone(),
            sumw2: hist.error.iter().map(|e| e * e).collect(),
        }
    }

    /// Materialize the record as a histogram named `name`.
    pub fn to_histogram(&self, name: &str) -> hm_core::Result<Histogram> {
        let mut hist = Histogram::new(
            name,
            self.bin_edges.clone(),
            self.content.clone(),
            self.sumw2.iter().map(|w| w.sqrt()).collect(),
        )?;
        hist.title = self.title.clone();
        hist.units = self.units.clone();
        Ok(hist)
    }
}
