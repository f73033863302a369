//! Batch outcome reports.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::evaluation::EvaluationResult;
use crate::stats::ScoreSummary;

/// How one photo fared in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum EvaluationState {
    /// Scored and the sidecar written.
    Evaluated(EvaluationResult),
    /// Scoring or saving failed.
    Failed(String),
    /// A newer evaluation of the same photo replaced this one.
    Superseded,
    /// Not attempted because a verdict already existed.
    Skipped,
}

impl EvaluationState {
    /// Short name used in CSV output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Evaluated(_) => "evaluated",
            Self::Failed(_) => "failed",
            Self::Superseded => "superseded",
            Self::Skipped => "skipped",
        }
    }

    /// The evaluation, for evaluated photos.
    #[must_use]
    pub fn evaluation(&self) -> Option<&EvaluationResult> {
        match self {
            Self::Evaluated(evaluation) => Some(evaluation),
            _ => None,
        }
    }
}

/// Outcome for one photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoOutcome {
    /// Photo file name.
    pub name: String,
    /// What happened.
    #[serde(flatten)]
    pub state: EvaluationState,
}

impl PhotoOutcome {
    /// Create an outcome.
    #[must_use]
    pub fn new(name: impl Into<String>, state: EvaluationState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }
}

/// Results of evaluating a set of photos in one folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Folder the photos live in.
    pub folder: PathBuf,

    /// When the run started.
    #[serde(with = "chrono_serde")]
    pub started_at: DateTime<Utc>,

    /// When the run finished.
    #[serde(with = "chrono_serde")]
    pub finished_at: DateTime<Utc>,

    /// One entry per requested photo, in request order.
    pub outcomes: Vec<PhotoOutcome>,
}

impl BatchReport {
    /// Start an empty report now.
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            folder: folder.into(),
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
        }
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Outcome for a photo.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&PhotoOutcome> {
        self.outcomes.iter().find(|outcome| outcome.name == name)
    }

    fn evaluated(&self) -> impl Iterator<Item = (&str, &EvaluationResult)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| Some((outcome.name.as_str(), outcome.state.evaluation()?)))
    }

    /// Photos evaluated as worth keeping.
    #[must_use]
    pub fn kept(&self) -> Vec<&str> {
        self.evaluated()
            .filter(|(_, evaluation)| evaluation.is_worth_keeping)
            .map(|(name, _)| name)
            .collect()
    }

    /// Photos evaluated for discard.
    #[must_use]
    pub fn rejected(&self) -> Vec<&str> {
        self.evaluated()
            .filter(|(_, evaluation)| !evaluation.is_worth_keeping)
            .map(|(name, _)| name)
            .collect()
    }

    /// Photos whose evaluation failed, with the reason.
    #[must_use]
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.state {
                EvaluationState::Failed(reason) => Some((outcome.name.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Number of outcomes in a given state.
    #[must_use]
    pub fn count(&self, code: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state.code() == code)
            .count()
    }

    /// Statistics over the total scores of evaluated photos.
    #[must_use]
    pub fn score_summary(&self) -> Option<ScoreSummary> {
        let scores: Vec<u8> = self
            .evaluated()
            .map(|(_, evaluation)| evaluation.total_score)
            .collect();
        ScoreSummary::compute(&scores)
    }

    /// Base name for report files, derived from the start time.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("review-{}", self.started_at.format("%Y%m%dT%H%M%SZ"))
    }

    /// Write the report as pretty JSON into `dir`. Returns the file path.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(format!("{}.json", self.file_stem()));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        Ok(path)
    }

    /// Write one CSV row per photo into `dir`. Returns the file path.
    pub fn write_csv(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(format!("{}.csv", self.file_stem()));
        let mut wtr = csv::Writer::from_path(&path)?;

        wtr.write_record([
            "image",
            "state",
            "total",
            "composition",
            "lighting",
            "technical",
            "artistic",
            "keep",
            "detail",
        ])?;

        for outcome in &self.outcomes {
            let detail = match &outcome.state {
                EvaluationState::Evaluated(evaluation) => evaluation.feedback.as_str(),
                EvaluationState::Failed(reason) => reason.as_str(),
                EvaluationState::Superseded | EvaluationState::Skipped => "",
            };
            let scores = outcome.state.evaluation().map(|evaluation| {
                [
                    evaluation.total_score.to_string(),
                    evaluation.composition_score.to_string(),
                    evaluation.lighting_score.to_string(),
                    evaluation.technical_score.to_string(),
                    evaluation.artistic_score.to_string(),
                    evaluation.is_worth_keeping.to_string(),
                ]
            });
            let [total, composition, lighting, technical, artistic, keep] =
                scores.unwrap_or_default();

            wtr.write_record([
                outcome.name.as_str(),
                outcome.state.code(),
                &total,
                &composition,
                &lighting,
                &technical,
                &artistic,
                &keep,
                detail,
            ])?;
        }

        wtr.flush()?;
        Ok(path)
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BatchReport {
        let mut report = BatchReport::new("/photos/2024-06-01");
        report.outcomes = vec![
            PhotoOutcome::new(
                "a.jpg",
                EvaluationState::Evaluated(EvaluationResult::uniform(85, true, "Sharp, well lit.")),
            ),
            PhotoOutcome::new(
                "b.jpg",
                EvaluationState::Evaluated(EvaluationResult::uniform(30, false, "Missed focus.")),
            ),
            PhotoOutcome::new("c.jpg", EvaluationState::Failed("quota exceeded".to_string())),
            PhotoOutcome::new("d.jpg", EvaluationState::Skipped),
        ];
        report.finish();
        report
    }

    #[test]
    fn test_partitions() {
        let report = sample();
        assert_eq!(report.kept(), vec!["a.jpg"]);
        assert_eq!(report.rejected(), vec!["b.jpg"]);
        assert_eq!(report.failed(), vec![("c.jpg", "quota exceeded")]);
        assert_eq!(report.count("skipped"), 1);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn test_score_summary() {
        let summary = sample().score_summary().unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.min, 30);
        assert_eq!(summary.max, 85);

        assert!(BatchReport::new("/tmp").score_summary().is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample();
        let path = report.write_json(dir.path()).unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\"state\": \"failed\""));
        assert!(text.contains("\"totalScore\": 85"));

        let parsed: BatchReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.outcomes, report.outcomes);
        assert_eq!(parsed.started_at.timestamp(), report.started_at.timestamp());
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample().write_csv(dir.path()).unwrap();

        let mut rdr = csv::Reader::from_path(path).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[0][0], "a.jpg");
        assert_eq!(&rows[0][2], "85");
        assert_eq!(&rows[0][7], "true");
        assert_eq!(&rows[2][1], "failed");
        assert_eq!(&rows[2][8], "quota exceeded");
        assert_eq!(&rows[3][2], "");
    }
}
