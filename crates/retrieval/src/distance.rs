//! Distance engine.
//!
//! A store uses exactly one [`DistanceMetric`] for its whole lifetime. The
//! metric is recorded when a durable store is created, and reopening it
//! under another metric is refused, since rankings computed under different
//! metrics are not comparable.
//!
//! Both metrics accumulate in `f64`, strictly left to right, so a given pair
//! of vectors always produces the same `f32` result. Callers must pass
//! vectors that were checked by [`crate::validator::VectorValidator`]; the
//! functions here assume equal lengths.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The dissimilarity function applied to every (query, chunk) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in `[0, 2]`. Ignores magnitude.
    #[default]
    Cosine,

    /// `||a - b||_2`, in `[0, inf)`.
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length. Never negative.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            other => Err(format!(
                "unknown distance metric '{}'; supported: cosine, euclidean",
                other
            )),
        }
    }
}

/// Cosine distance. A zero vector has no direction and sits at distance 1
/// (orthogonal) from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    // Rounding can push |similarity| marginally past 1.
    (1.0 - similarity).clamp(0.0, 2.0) as f32
}

/// Euclidean (L2) distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum();

    sum.sqrt() as f32
}
