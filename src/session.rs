//! Review session: scores photos through a gateway and saves the verdicts.
//!
//! [`ReviewSession`] is the main entry point. It ties a [`ScoringGateway`] to
//! a [`SidecarStore`] and guarantees that for each photo only the most recent
//! evaluation reaches disk.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::evaluation::EvaluationResult;
use crate::gateway::{ImagePayload, ScoringGateway};
use crate::library::{self, PhotoLibrary, SidecarStatus};
use crate::report::{BatchReport, EvaluationState, PhotoOutcome};
use crate::sidecar;
use crate::store::{Access, SidecarStore};

/// Configuration for a review session.
#[derive(Debug, Clone, Default)]
pub struct ReviewConfig {
    /// Worker threads for batches. 0 lets rayon pick.
    pub jobs: usize,

    /// Leave photos that already carry a readable verdict alone.
    pub skip_evaluated: bool,

    /// Directory for batch reports (JSON, CSV). No reports when unset.
    pub report_dir: Option<PathBuf>,
}

impl ReviewConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder::default()
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug, Default)]
pub struct ReviewConfigBuilder {
    jobs: Option<usize>,
    skip_evaluated: bool,
    report_dir: Option<PathBuf>,
}

impl ReviewConfigBuilder {
    /// Set the number of worker threads.
    #[must_use]
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Skip photos that already have a verdict.
    #[must_use]
    pub fn skip_evaluated(mut self, skip: bool) -> Self {
        self.skip_evaluated = skip;
        self
    }

    /// Set the report output directory.
    #[must_use]
    pub fn report_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(path.into());
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ReviewConfig {
        ReviewConfig {
            jobs: self.jobs.unwrap_or(0),
            skip_evaluated: self.skip_evaluated,
            report_dir: self.report_dir,
        }
    }
}

/// Evaluations currently running, keyed by photo name.
///
/// Each call takes a ticket; only the holder of the latest ticket for a name
/// may write that photo's sidecar. Writes of one photo are serialized through
/// its write lock; writes of different photos do not wait for each other.
#[derive(Debug, Default)]
struct InFlight {
    current: HashMap<String, u64>,
    write_locks: HashMap<String, Arc<Mutex<()>>>,
    next_ticket: u64,
}

impl InFlight {
    fn begin(&mut self, name: &str) -> u64 {
        self.next_ticket += 1;
        if self
            .current
            .insert(name.to_string(), self.next_ticket)
            .is_some()
        {
            tracing::debug!(image = name, "superseding running evaluation");
        }
        self.next_ticket
    }

    fn is_current(&self, name: &str, ticket: u64) -> bool {
        self.current.get(name) == Some(&ticket)
    }

    fn release(&mut self, name: &str, ticket: u64) {
        if self.is_current(name, ticket) {
            self.current.remove(name);
        }
    }

    fn cancel(&mut self, name: &str) -> bool {
        self.current.remove(name).is_some()
    }

    fn write_lock(&mut self, name: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.write_locks.entry(name.to_string()).or_default())
    }

    /// Drop the write lock of a photo once nobody holds a handle to it.
    fn forget_write_lock(&mut self, name: &str) {
        if self
            .write_locks
            .get(name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            self.write_locks.remove(name);
        }
    }
}

/// Scores photos and persists the verdicts as sidecars.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use photo_critic::{DirStore, ReviewConfig, ReviewSession};
///
/// let config = ReviewConfig::builder().jobs(4).skip_evaluated(true).build();
/// let store = Arc::new(DirStore::allow_all("./shoot"));
/// let session = ReviewSession::new(config, gateway, store);
///
/// let report = session.evaluate_folder()?;
/// println!("kept {} of {}", report.kept().len(), report.outcomes.len());
/// ```
pub struct ReviewSession {
    config: ReviewConfig,
    gateway: Arc<dyn ScoringGateway>,
    store: Arc<dyn SidecarStore>,
    in_flight: Mutex<InFlight>,
}

impl ReviewSession {
    /// Create a new review session.
    #[must_use]
    pub fn new(
        config: ReviewConfig,
        gateway: Arc<dyn ScoringGateway>,
        store: Arc<dyn SidecarStore>,
    ) -> Self {
        Self {
            config,
            gateway,
            store,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Store the session reads from and writes to.
    #[must_use]
    pub fn store(&self) -> &dyn SidecarStore {
        self.store.as_ref()
    }

    fn registry(&self) -> Result<MutexGuard<'_, InFlight>> {
        self.in_flight
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("in-flight registry poisoned")))
    }

    /// Score one photo and save its sidecar.
    ///
    /// If another evaluation of the same photo starts before this one
    /// finishes, or [`cancel`](Self::cancel) is called, this call returns
    /// [`Error::Superseded`] and writes nothing.
    pub fn evaluate_photo(&self, name: &str) -> Result<EvaluationResult> {
        self.store.request_permission(Access::ReadWrite)?;

        let ticket = self.registry()?.begin(name);
        let started = Instant::now();
        let outcome = library::load_payload(self.store.as_ref(), name)
            .and_then(|payload| self.gateway.evaluate(&payload));

        let evaluation = self.commit(name, ticket, || {
            let evaluation = outcome?;
            self.save(name, &evaluation)?;
            Ok(evaluation)
        })?;

        tracing::info!(
            image = name,
            gateway = self.gateway.name(),
            score = evaluation.total_score,
            keep = evaluation.is_worth_keeping,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "photo evaluated"
        );
        Ok(evaluation)
    }

    /// Run `write` if `ticket` is still the latest one for `name`, and retire it.
    ///
    /// The ticket is checked while the photo's write lock is held, so a newer
    /// evaluation that starts afterwards writes after this one. The registry
    /// itself is only locked briefly and never while waiting for a write lock.
    fn commit<T>(&self, name: &str, ticket: u64, write: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.registry()?.write_lock(name);
        let result = match lock.lock() {
            Ok(_guard) => {
                let current = {
                    let mut in_flight = self.registry()?;
                    let current = in_flight.is_current(name, ticket);
                    in_flight.release(name, ticket);
                    current
                };
                if current {
                    write()
                } else {
                    tracing::debug!(image = name, "dropping superseded result");
                    Err(Error::Superseded(name.to_string()))
                }
            }
            Err(_) => Err(Error::Io(std::io::Error::other("sidecar write lock poisoned"))),
        };
        drop(lock);
        self.registry()?.forget_write_lock(name);
        result
    }

    /// Drop the running evaluation of a photo, if any.
    ///
    /// The sidecar on disk is left as it is. Returns whether an evaluation
    /// was running.
    pub fn cancel(&self, name: &str) -> Result<bool> {
        let cancelled = self.registry()?.cancel(name);
        if cancelled {
            tracing::info!(image = name, "evaluation cancelled");
        }
        Ok(cancelled)
    }

    /// Evaluate photos independently and in parallel.
    ///
    /// Permission is requested once for the whole batch; a denial fails the
    /// batch before anything is read or written. After that, every photo
    /// gets its own outcome and failures never abort the others.
    pub fn evaluate_batch(&self, names: &[String]) -> Result<BatchReport> {
        self.store.request_permission(Access::ReadWrite)?;

        let mut report = BatchReport::new(self.store.root());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()?;

        tracing::info!(
            photos = names.len(),
            threads = pool.current_num_threads(),
            gateway = self.gateway.name(),
            "starting batch"
        );

        report.outcomes = pool.install(|| {
            names
                .par_iter()
                .map(|name| PhotoOutcome::new(name.as_str(), self.batch_state(name)))
                .collect()
        });
        report.finish();

        tracing::info!(
            kept = report.kept().len(),
            rejected = report.rejected().len(),
            failed = report.failed().len(),
            skipped = report.count("skipped"),
            "batch finished"
        );
        Ok(report)
    }

    /// Evaluate every photo in the folder.
    pub fn evaluate_folder(&self) -> Result<BatchReport> {
        let library = PhotoLibrary::open(self.store.as_ref())?;
        let names: Vec<String> = library.photos.into_iter().map(|photo| photo.name).collect();
        self.evaluate_batch(&names)
    }

    fn batch_state(&self, name: &str) -> EvaluationState {
        if self.config.skip_evaluated && matches!(self.load(name), Ok(SidecarStatus::Present(_))) {
            tracing::debug!(image = name, "already evaluated, skipping");
            return EvaluationState::Skipped;
        }

        match self.evaluate_photo(name) {
            Ok(evaluation) => EvaluationState::Evaluated(evaluation),
            Err(Error::Superseded(_)) => EvaluationState::Superseded,
            Err(e) => {
                tracing::warn!(image = name, "evaluation failed: {e}");
                EvaluationState::Failed(e.to_string())
            }
        }
    }

    /// Evaluate near-duplicate photos comparatively in one gateway call.
    ///
    /// Reading the photos and the gateway call succeed or fail as a whole.
    /// Saving is per photo: one failed write does not affect the others.
    /// A name listed more than once is evaluated once.
    pub fn evaluate_burst(&self, names: &[String]) -> Result<BatchReport> {
        self.store.request_permission(Access::ReadWrite)?;

        let listed = names.len();
        let mut seen = HashSet::new();
        let names: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect();
        if names.len() < listed {
            tracing::debug!(duplicates = listed - names.len(), "ignoring repeated names in burst");
        }

        let mut report = BatchReport::new(self.store.root());
        let tickets: Vec<u64> = {
            let mut in_flight = self.registry()?;
            names.iter().map(|name| in_flight.begin(name)).collect()
        };

        let results = names
            .iter()
            .map(|name| library::load_payload(self.store.as_ref(), name))
            .collect::<Result<Vec<ImagePayload>>>()
            .and_then(|payloads| self.gateway.evaluate_group(&payloads));

        let mut results = match results {
            Ok(results) => results,
            Err(e) => {
                let mut in_flight = self.registry()?;
                for (name, ticket) in names.iter().zip(&tickets) {
                    in_flight.release(name, *ticket);
                }
                return Err(e);
            }
        };

        for (name, ticket) in names.iter().zip(tickets) {
            let saved = self.commit(name, ticket, || {
                let evaluation = results
                    .remove(*name)
                    .ok_or_else(|| Error::GatewayResponse("no result returned".to_string()))?;
                self.save(name, &evaluation)?;
                Ok(evaluation)
            });
            let state = match saved {
                Ok(evaluation) => EvaluationState::Evaluated(evaluation),
                Err(Error::Superseded(_)) => EvaluationState::Superseded,
                Err(e) => {
                    tracing::warn!(image = %name, "could not save verdict: {e}");
                    EvaluationState::Failed(e.to_string())
                }
            };
            report.outcomes.push(PhotoOutcome::new(*name, state));
        }
        report.finish();

        tracing::info!(
            photos = names.len(),
            kept = report.kept().len(),
            gateway = self.gateway.name(),
            "burst evaluated"
        );
        Ok(report)
    }

    /// Stored verdict of one photo.
    pub fn load(&self, name: &str) -> Result<SidecarStatus> {
        library::load_sidecar(self.store.as_ref(), name)
    }

    /// Write a batch report to the configured report directory.
    ///
    /// Returns the JSON and CSV paths, or `None` when no directory is set.
    pub fn write_report(&self, report: &BatchReport) -> Result<Option<(PathBuf, PathBuf)>> {
        let Some(dir) = &self.config.report_dir else {
            return Ok(None);
        };
        let json = report.write_json(dir)?;
        let csv = report.write_csv(dir)?;
        tracing::info!(json = %json.display(), csv = %csv.display(), "report written");
        Ok(Some((json, csv)))
    }

    fn save(&self, name: &str, evaluation: &EvaluationResult) -> Result<()> {
        let sidecar_name = sidecar::sidecar_file_name(name);
        self.store
            .write(&sidecar_name, sidecar::encode(evaluation).as_bytes())?;
        tracing::debug!(
            image = name,
            rating = sidecar::rating_for_score(evaluation.total_score),
            "sidecar saved"
        );
        Ok(())
    }
}
