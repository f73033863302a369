//! Folder listing commands.

use std::path::Path;

use anyhow::{Context, Result};
use photo_critic::{LibrarySummary, Photo, PhotoLibrary, SidecarStatus, SidecarStore};
use serde::Serialize;

use super::{Options, open_store};

#[derive(Serialize)]
struct ScanOutput<'a> {
    photos: &'a [Photo],
    summary: LibrarySummary,
}

pub fn run(dir: &Path, json: bool, options: &Options) -> Result<()> {
    let store = open_store(dir, options);
    let library = PhotoLibrary::open(&store)
        .with_context(|| format!("Failed to list photos in {}", dir.display()))?;
    let summary = library.summary();

    if json {
        let output = ScanOutput {
            photos: &library.photos,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for photo in &library.photos {
        println!("{}", format_row(photo));
    }

    println!();
    println!("Photos: {}", summary.photos);
    println!("  Evaluated: {} ({} keep, {} reject)", summary.evaluated, summary.kept, summary.rejected);
    if summary.malformed > 0 {
        println!("  Unreadable sidecars: {}", summary.malformed);
    }

    Ok(())
}

pub fn show(dir: &Path, name: &str, options: &Options) -> Result<()> {
    let store = open_store(dir, options);
    store.request_permission(photo_critic::Access::Read)?;
    if store.read(name)?.is_none() {
        anyhow::bail!("No photo named {name} in {}", dir.display());
    }

    let status = photo_critic::library::load_sidecar(&store, name)
        .with_context(|| format!("Failed to read the sidecar of {name}"))?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn format_row(photo: &Photo) -> String {
    match &photo.sidecar {
        SidecarStatus::Present(evaluation) => format!(
            "{:<32} {:>3}/100  {:<6}  {}",
            photo.name,
            evaluation.total_score,
            if evaluation.is_worth_keeping { "keep" } else { "reject" },
            evaluation.feedback
        ),
        SidecarStatus::Malformed => format!("{:<32} unreadable sidecar", photo.name),
        SidecarStatus::Missing => format!("{:<32} -", photo.name),
    }
}
