//! Parsing of model responses into evaluation records.
//!
//! Models are asked for bare JSON but sometimes wrap it in a Markdown code
//! fence; the fence is removed before parsing. Every field is required and
//! scores are rounded and clamped into 0-100.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::evaluation::{EvaluationResult, normalize_score};

/// Evaluation as the model writes it. Scores may arrive as floats.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvaluation {
    pub composition_score: f64,
    pub lighting_score: f64,
    pub technical_score: f64,
    pub artistic_score: f64,
    pub total_score: f64,
    pub is_worth_keeping: bool,
    pub feedback: String,
}

impl From<RawEvaluation> for EvaluationResult {
    fn from(raw: RawEvaluation) -> Self {
        Self {
            composition_score: normalize_score(raw.composition_score),
            lighting_score: normalize_score(raw.lighting_score),
            technical_score: normalize_score(raw.technical_score),
            artistic_score: normalize_score(raw.artistic_score),
            total_score: normalize_score(raw.total_score),
            is_worth_keeping: raw.is_worth_keeping,
            feedback: raw.feedback.trim().to_string(),
        }
    }
}

/// One element of a burst response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub file_name: String,
    pub evaluation: RawEvaluation,
}

/// Parse a single-image response.
pub fn parse_single(text: &str) -> Result<EvaluationResult> {
    let raw: RawEvaluation = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| Error::GatewayResponse(format!("invalid evaluation JSON: {e}")))?;
    Ok(raw.into())
}

/// Parse a burst response and check it covers exactly the requested names.
pub fn parse_group(text: &str, names: &[&str]) -> Result<HashMap<String, EvaluationResult>> {
    let entries: Vec<GroupEntry> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| Error::GatewayResponse(format!("invalid burst JSON: {e}")))?;

    let mut results = HashMap::with_capacity(entries.len());
    for entry in entries {
        if results.contains_key(&entry.file_name) {
            return Err(Error::GatewayResponse(format!(
                "duplicate entry for {}",
                entry.file_name
            )));
        }
        results.insert(entry.file_name, entry.evaluation.into());
    }

    check_group_names(names, &results)?;
    Ok(results)
}

/// Check that a burst result has one entry per requested name and nothing else.
pub fn check_group_names(
    names: &[&str],
    results: &HashMap<String, EvaluationResult>,
) -> Result<()> {
    let requested: HashSet<&str> = names.iter().copied().collect();

    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| !results.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(Error::GatewayResponse(format!(
            "no result for {}",
            missing.join(", ")
        )));
    }

    let mut unknown: Vec<&str> = results
        .keys()
        .map(String::as_str)
        .filter(|name| !requested.contains(name))
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(Error::GatewayResponse(format!(
            "result for unknown file {}",
            unknown.join(", ")
        )));
    }

    Ok(())
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
