//! Sidecar codec: evaluation records to and from XMP.
//!
//! Third-party photo managers only understand a 0-5 star rating, a
//! keep/reject label and a free-text description, so the mapping is lossy:
//!
//! - **encode**: `rating = round(total / 20)` (half away from zero, clamped
//!   to 0-5), `label = Select | Reject`, `description = "Score: {total}/100.
//!   {feedback}"`.
//! - **decode**: `total = min(100, rating * 20)`, copied into all four axis
//!   scores. `is_worth_keeping` is true only for the labels `Select` and
//!   `Portfolio`. A leading `Score: N/100. ` is stripped from the
//!   description to recover the feedback.
//!
//! Decoding is not the inverse of encoding: a total of 49 encodes to rating
//! 2 and decodes back to 40. Only the verdict is preserved exactly; the total
//! comes back within one rating step.
//!
//! ```rust,ignore
//! use photo_critic::sidecar;
//!
//! let xmp = sidecar::encode(&evaluation);
//! let restored = sidecar::decode(&xmp).expect("valid packet");
//! assert_eq!(restored.is_worth_keeping, evaluation.is_worth_keeping);
//! ```

pub mod xmp;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::evaluation::{EvaluationResult, clamp_score};

/// Extension used for sidecar files.
pub const SIDECAR_EXTENSION: &str = "xmp";

/// Keyword added to every sidecar written by this crate.
pub const PRODUCT_TAG: &str = "photo-critic";

/// Label written for photos worth keeping.
pub const LABEL_SELECT: &str = "Select";

/// Label written for photos to discard.
pub const LABEL_REJECT: &str = "Reject";

/// Legacy keep label, accepted on read but never written.
pub const LABEL_PORTFOLIO: &str = "Portfolio";

/// Highest star rating.
pub const MAX_RATING: u8 = 5;

/// Score points represented by one rating step.
pub const POINTS_PER_STAR: u8 = 20;

static SCORE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Score: [0-9]+/100\. ").expect("valid regex"));

/// The three culling properties (plus keywords) as stored in a sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarDocument {
    /// Star rating. Written as 0-5; values read from foreign files may be
    /// larger.
    pub rating: u8,
    /// Culling label.
    pub label: String,
    /// Human-readable description.
    pub description: String,
    /// `dc:subject` keywords.
    pub subjects: Vec<String>,
}

impl SidecarDocument {
    /// Build the document for an evaluation.
    ///
    /// Scores are clamped to [0, 100] first; the caller's values are not
    /// trusted.
    #[must_use]
    pub fn from_evaluation(evaluation: &EvaluationResult) -> Self {
        let total = clamp_score(evaluation.total_score);
        let label = if evaluation.is_worth_keeping {
            LABEL_SELECT
        } else {
            LABEL_REJECT
        };

        Self {
            rating: rating_for_score(total),
            label: label.to_string(),
            description: format!("Score: {total}/100. {}", evaluation.feedback),
            subjects: vec![PRODUCT_TAG.to_string(), label.to_string()],
        }
    }

    /// Parse an XMP packet, filling absent properties with defaults.
    ///
    /// Returns `None` when the text is not an XMP packet at all.
    pub fn parse(text: &str) -> Option<Self> {
        let fields = xmp::read(text)?;

        let rating = match fields.rating.as_deref() {
            Some(raw) => parse_rating(raw),
            None => {
                tracing::debug!("sidecar has no rating, using 0");
                0
            }
        };
        if fields.label.is_none() {
            tracing::debug!("sidecar has no label, treating as not kept");
        }

        Some(Self {
            rating,
            label: fields.label.unwrap_or_default(),
            description: fields.description.unwrap_or_default(),
            subjects: fields.subjects,
        })
    }

    /// Serialize as an XMP packet.
    #[must_use]
    pub fn to_xmp(&self) -> String {
        xmp::write(self)
    }

    /// Reconstruct an evaluation from the stored properties.
    ///
    /// The four axis scores are not stored, so each is set to the
    /// reconstructed total.
    #[must_use]
    pub fn to_evaluation(&self) -> EvaluationResult {
        EvaluationResult::uniform(
            score_for_rating(self.rating),
            is_keep_label(&self.label),
            strip_score_prefix(&self.description),
        )
    }
}

/// Encode an evaluation as XMP text.
#[must_use]
pub fn encode(evaluation: &EvaluationResult) -> String {
    SidecarDocument::from_evaluation(evaluation).to_xmp()
}

/// Decode XMP text into an evaluation.
///
/// Returns `None` when the text is not an XMP packet, so callers can tell
/// "unreadable sidecar" apart from a sidecar with missing properties (which
/// decodes with defaults).
#[must_use]
pub fn decode(text: &str) -> Option<EvaluationResult> {
    SidecarDocument::parse(text).map(|doc| doc.to_evaluation())
}

/// Decode raw sidecar bytes. Invalid UTF-8 counts as unreadable.
#[must_use]
pub fn decode_bytes(bytes: &[u8]) -> Option<EvaluationResult> {
    let text = std::str::from_utf8(bytes).ok()?;
    decode(text)
}

/// Star rating for a 0-100 score: `round(score / 20)`, halves rounded up.
#[must_use]
pub fn rating_for_score(score: u8) -> u8 {
    let score = u16::from(clamp_score(score));
    let half = u16::from(POINTS_PER_STAR / 2);
    ((score + half) / u16::from(POINTS_PER_STAR)).min(u16::from(MAX_RATING)) as u8
}

/// Score reconstructed from a star rating: `min(100, rating * 20)`.
#[must_use]
pub fn score_for_rating(rating: u8) -> u8 {
    clamp_score(rating.saturating_mul(POINTS_PER_STAR))
}

/// Whether a label marks the photo as worth keeping.
///
/// Exactly `Select` and `Portfolio` do; every other value, including the
/// empty label and unknown third-party labels, does not.
#[must_use]
pub fn is_keep_label(label: &str) -> bool {
    label == LABEL_SELECT || label == LABEL_PORTFOLIO
}

/// Remove a leading `Score: N/100. ` from a description.
#[must_use]
pub fn strip_score_prefix(description: &str) -> &str {
    match SCORE_PREFIX.find(description) {
        Some(m) => &description[m.end()..],
        None => description,
    }
}

/// Sidecar file name for an image file name: `name.ext` becomes `name.xmp`.
///
/// Only the last extension is replaced. A leading dot does not start an
/// extension.
#[must_use]
pub fn sidecar_file_name(image_name: &str) -> String {
    let stem = match image_name.rfind('.') {
        Some(0) | None => image_name,
        Some(idx) => &image_name[..idx],
    };
    format!("{stem}.{SIDECAR_EXTENSION}")
}

/// Parse rating text. Unparsable values become 0, negatives (such as the
/// `-1` some tools write for rejected photos) become 0.
fn parse_rating(raw: &str) -> u8 {
    let raw = raw.trim();
    let value = raw
        .parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.round() as i64));

    match value {
        Some(v) => v.clamp(0, i64::from(u8::MAX)) as u8,
        None => {
            tracing::debug!(rating = raw, "unparsable sidecar rating, using 0");
            0
        }
    }
}
