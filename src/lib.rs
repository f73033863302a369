//! # photo-critic
//!
//! Photo culling library: scores photographs with a vision model and stores
//! the verdicts as XMP sidecars that other photo tools can read.
//!
//! This library provides an **API-first design** where the scoring backend is
//! a [`ScoringGateway`] (a remote model, or caller-supplied callbacks), and
//! this library handles sidecar encoding, folder access and batch reports.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use photo_critic::{CallbackGateway, DirStore, ReviewConfig, ReviewSession};
//!
//! let gateway = CallbackGateway::new("my-model", Box::new(|image| {
//!     // Your scoring logic here
//!     Ok(evaluation)
//! }));
//!
//! let config = ReviewConfig::builder().jobs(4).report_dir("./reports").build();
//! let session = ReviewSession::new(
//!     config,
//!     Arc::new(gateway),
//!     Arc::new(DirStore::allow_all("./shoot")),
//! );
//!
//! let verdict = session.evaluate_photo("IMG_0042.jpg")?;
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`evaluation`]: The evaluation record
//! - [`sidecar`]: XMP sidecar encoding and decoding
//! - [`gateway`]: Scoring backends
//! - [`store`]: Permission-checked folder access
//! - [`library`]: Photos of a folder and their stored verdicts
//! - [`session`]: Evaluation of single photos, batches and bursts
//! - [`report`]: Batch reports (JSON, CSV)
//! - [`stats`]: Score statistics

pub mod error;
pub mod evaluation;
pub mod gateway;
pub mod library;
pub mod report;
pub mod session;
pub mod sidecar;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use error::{Error, Result};
pub use evaluation::EvaluationResult;
pub use gateway::{CallbackGateway, ImagePayload, ScoringGateway};
#[cfg(feature = "gemini")]
pub use gateway::{GeminiConfig, GeminiGateway};
pub use library::{LibrarySummary, Photo, PhotoLibrary, SidecarStatus};
pub use report::{BatchReport, EvaluationState, PhotoOutcome};
pub use session::{ReviewConfig, ReviewSession};
pub use sidecar::{decode, encode, sidecar_file_name};
pub use stats::ScoreSummary;
pub use store::{Access, DirStore, PermissionMode, SidecarStore};
