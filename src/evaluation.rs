//! The evaluation record: one quality judgment for one photograph.

use serde::{Deserialize, Serialize};

/// Highest value any score can take.
pub const MAX_SCORE: u8 = 100;

/// A quality judgment for a single photograph.
///
/// All five scores are always present together. `total_score` is assigned by
/// the scorer on its own and is not derived from the four axes, and
/// `is_worth_keeping` is independent of every score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Framing and subject placement (0-100).
    pub composition_score: u8,
    /// Exposure and quality of light (0-100).
    pub lighting_score: u8,
    /// Focus, noise and sharpness (0-100).
    pub technical_score: u8,
    /// Mood and creative impact (0-100).
    pub artistic_score: u8,
    /// Overall score (0-100).
    pub total_score: u8,
    /// Keep/discard verdict.
    pub is_worth_keeping: bool,
    /// Short rationale from the scorer.
    pub feedback: String,
}

impl EvaluationResult {
    /// Build a record whose four axes all carry the same value.
    ///
    /// This is the shape a sidecar decodes to, since the individual axes are
    /// never persisted.
    #[must_use]
    pub fn uniform(total_score: u8, is_worth_keeping: bool, feedback: impl Into<String>) -> Self {
        let total_score = clamp_score(total_score);
        Self {
            composition_score: total_score,
            lighting_score: total_score,
            technical_score: total_score,
            artistic_score: total_score,
            total_score,
            is_worth_keeping,
            feedback: feedback.into(),
        }
    }

    /// Copy of this record with every score clamped to [0, 100].
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            composition_score: clamp_score(self.composition_score),
            lighting_score: clamp_score(self.lighting_score),
            technical_score: clamp_score(self.technical_score),
            artistic_score: clamp_score(self.artistic_score),
            total_score: clamp_score(self.total_score),
            is_worth_keeping: self.is_worth_keeping,
            feedback: self.feedback.clone(),
        }
    }

    /// The four axis scores in display order.
    #[must_use]
    pub fn axes(&self) -> [(&'static str, u8); 4] {
        [
            ("composition", self.composition_score),
            ("lighting", self.lighting_score),
            ("technical", self.technical_score),
            ("artistic", self.artistic_score),
        ]
    }
}

/// Clamp a score to the valid range.
#[must_use]
pub fn clamp_score(score: u8) -> u8 {
    score.min(MAX_SCORE)
}

/// Convert a score reported by a remote scorer into the valid range.
///
/// Fractional values are rounded half away from zero, negatives become 0 and
/// anything above 100 becomes 100. NaN is treated as 0.
#[must_use]
pub fn normalize_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, f64::from(MAX_SCORE)) as u8
}
