//! Mapping raw component scores into `[0, 1]`.
//!
//! Reference normalization looks at one value at a time. Min-max needs the
//! whole column of a run, so [`normalize_column`] always works on a batch.

use storage_siting_scoring_models::Normalization;

/// `raw / reference`, clamped to `[0, 1]`.
#[must_use]
pub fn by_reference(raw: f64, reference: f64) -> f64 {
    if !raw.is_finite() || !reference.is_finite() || reference <= 0.0 {
        return 0.0;
    }
    (raw / reference).clamp(0.0, 1.0)
}

/// Observed range of a column of raw values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxRange {
    /// Smallest raw value.
    pub min: f64,
    /// Largest raw value.
    pub max: f64,
}

impl MinMaxRange {
    /// Range of the finite values in `values`, or `None` if there are none.
    #[must_use]
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| {
                Some(range.map_or(Self { min: v, max: v }, |r: Self| Self {
                    min: r.min.min(v),
                    max: r.max.max(v),
                }))
            })
    }

    /// Position of `raw` within the range.
    ///
    /// A collapsed range (every value equal) maps positive values to 1.0
    /// and everything else to 0.0.
    #[must_use]
    pub fn normalize(&self, raw: f64) -> f64 {
        if !raw.is_finite() {
            return 0.0;
        }
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            return if raw > 0.0 { 1.0 } else { 0.0 };
        }
        ((raw - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Normalizes a column of raw values with one rule.
#[must_use]
pub fn normalize_column(raws: &[f64], normalization: Normalization) -> Vec<f64> {
    match normalization {
        Normalization::Reference { value } => {
            raws.iter().map(|&raw| by_reference(raw, value)).collect()
        }
        Normalization::MinMax => MinMaxRange::of(raws.iter().copied()).map_or_else(
            || vec![0.0; raws.len()],
            |range| raws.iter().map(|&raw| range.normalize(raw)).collect(),
        ),
    }
}
