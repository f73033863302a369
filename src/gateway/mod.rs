//! Scoring gateway: the external service that judges photos.
//!
//! The crate never scores images itself. A [`ScoringGateway`] receives image
//! bytes and returns [`EvaluationResult`]s, either for one photo or
//! comparatively for a burst. Embedders can plug in any provider; two are
//! included:
//!
//! - [`CallbackGateway`]: wraps closures, for tests and custom providers
//! - [`GeminiGateway`]: Google Gemini `generateContent` (feature `gemini`)
//!
//! Failures must surface as errors. A gateway never substitutes a
//! zero-score record for a failed call.

#[cfg(feature = "gemini")]
pub mod gemini;
pub mod prompt;
pub mod response;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::evaluation::EvaluationResult;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiGateway};

/// Image extensions the gateways accept, with their media types.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("avif", "image/avif"),
];

/// One image handed to a gateway.
#[derive(Clone)]
pub struct ImagePayload {
    /// File name, used as the key of burst results.
    pub name: String,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `image/jpeg`.
    pub media_type: String,
}

impl ImagePayload {
    /// Create a payload, inferring the media type from the file name.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let media_type = media_type_for_path(Path::new(&name))
            .ok_or_else(|| Error::UnsupportedFormat(name.clone()))?
            .to_string();
        Ok(Self {
            name,
            bytes,
            media_type,
        })
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .field("media_type", &self.media_type)
            .finish()
    }
}

/// A provider that scores photos.
///
/// Implementations are shared across worker threads, hence `Send + Sync`.
pub trait ScoringGateway: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Score a single photo.
    fn evaluate(&self, image: &ImagePayload) -> Result<EvaluationResult>;

    /// Score a burst comparatively.
    ///
    /// On success the map holds exactly one entry per input name.
    fn evaluate_group(&self, images: &[ImagePayload]) -> Result<HashMap<String, EvaluationResult>>;
}

/// Single-image callback type.
pub type EvaluateFn = Box<dyn Fn(&ImagePayload) -> Result<EvaluationResult> + Send + Sync>;

/// Burst callback type.
pub type EvaluateGroupFn =
    Box<dyn Fn(&[ImagePayload]) -> Result<HashMap<String, EvaluationResult>> + Send + Sync>;

/// Gateway backed by caller-supplied closures.
///
/// Without a group callback, bursts are scored one image at a time.
///
/// ```rust,ignore
/// use photo_critic::gateway::CallbackGateway;
///
/// let gateway = CallbackGateway::new("local-model", Box::new(|image| {
///     my_model.score(&image.bytes)
/// }));
/// ```
pub struct CallbackGateway {
    name: String,
    evaluate: EvaluateFn,
    evaluate_group: Option<EvaluateGroupFn>,
}

impl CallbackGateway {
    /// Create a gateway from a single-image callback.
    #[must_use]
    pub fn new(name: &str, evaluate: EvaluateFn) -> Self {
        Self {
            name: name.to_string(),
            evaluate,
            evaluate_group: None,
        }
    }

    /// Add a dedicated burst callback.
    #[must_use]
    pub fn with_group(mut self, evaluate_group: EvaluateGroupFn) -> Self {
        self.evaluate_group = Some(evaluate_group);
        self
    }
}

impl ScoringGateway for CallbackGateway {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, image: &ImagePayload) -> Result<EvaluationResult> {
        (self.evaluate)(image).map(|result| result.clamped())
    }

    fn evaluate_group(&self, images: &[ImagePayload]) -> Result<HashMap<String, EvaluationResult>> {
        let results = match &self.evaluate_group {
            Some(group) => group(images)?,
            None => images
                .iter()
                .map(|image| Ok((image.name.clone(), (self.evaluate)(image)?)))
                .collect::<Result<HashMap<_, _>>>()?,
        };

        let names: Vec<&str> = images.iter().map(|image| image.name.as_str()).collect();
        response::check_group_names(&names, &results)?;

        Ok(results
            .into_iter()
            .map(|(name, result)| (name, result.clamped()))
            .collect())
    }
}

/// Media type for an image path, from its extension (case-insensitive).
#[must_use]
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    MEDIA_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, media_type)| *media_type)
}

/// Whether a path looks like an image a gateway can score.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    media_type_for_path(path).is_some()
}
