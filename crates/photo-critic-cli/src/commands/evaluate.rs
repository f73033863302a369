//! Scoring commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use photo_critic::{BatchReport, EvaluationState, ReviewConfig, ReviewSession};

use super::{Options, gateway, open_store};

pub fn run(
    dir: &Path,
    names: Vec<String>,
    skip_evaluated: bool,
    jobs: usize,
    report_dir: Option<PathBuf>,
    options: &Options,
) -> Result<()> {
    let mut config = ReviewConfig::builder()
        .jobs(jobs)
        .skip_evaluated(skip_evaluated);
    if let Some(report_dir) = report_dir {
        config = config.report_dir(report_dir);
    }

    let session = ReviewSession::new(
        config.build(),
        gateway(options)?,
        Arc::new(open_store(dir, options)),
    );

    let report = if names.is_empty() {
        session.evaluate_folder()
    } else {
        session.evaluate_batch(&names)
    }
    .with_context(|| format!("Failed to evaluate photos in {}", dir.display()))?;

    print_report(&report);

    if let Some((json, csv)) = session
        .write_report(&report)
        .context("Failed to write report")?
    {
        println!("Report: {} and {}", json.display(), csv.display());
    }

    Ok(())
}

pub fn burst(dir: &Path, names: Vec<String>, options: &Options) -> Result<()> {
    let session = ReviewSession::new(
        ReviewConfig::default(),
        gateway(options)?,
        Arc::new(open_store(dir, options)),
    );

    let report = session
        .evaluate_burst(&names)
        .with_context(|| format!("Failed to evaluate burst of {} photos", names.len()))?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &BatchReport) {
    for outcome in &report.outcomes {
        match &outcome.state {
            EvaluationState::Evaluated(evaluation) => println!(
                "{:<32} {:>3}/100  {:<6}  {}",
                outcome.name,
                evaluation.total_score,
                if evaluation.is_worth_keeping { "keep" } else { "reject" },
                evaluation.feedback
            ),
            EvaluationState::Failed(reason) => println!("{:<32} failed: {reason}", outcome.name),
            EvaluationState::Superseded => println!("{:<32} superseded", outcome.name),
            EvaluationState::Skipped => println!("{:<32} skipped", outcome.name),
        }
    }

    println!();
    println!(
        "Kept {}, rejected {}, failed {}, skipped {}",
        report.kept().len(),
        report.rejected().len(),
        report.failed().len(),
        report.count("skipped"),
    );
    if let Some(summary) = report.score_summary() {
        println!(
            "Scores: mean {:.1}, median {:.1}, range {}-{}",
            summary.mean, summary.median, summary.min, summary.max
        );
    }
    let elapsed = report.finished_at - report.started_at;
    tracing::debug!(elapsed_ms = elapsed.num_milliseconds(), "run finished");
}
