//! End-to-end review of a photo folder through the public API.

use std::fs;
use std::sync::Arc;

use photo_critic::{
    CallbackGateway, DirStore, EvaluationResult, EvaluationState, PhotoLibrary, ReviewConfig,
    ReviewSession, SidecarStatus,
};

/// Sidecar written by another photo tool: properties as attributes, a
/// portfolio label and no description.
const FOREIGN_SIDECAR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:ns0="http://ns.adobe.com/xap/1.0/"
        ns0:Rating="4"
        ns0:Label="Portfolio"/>
  </rdf:RDF>
</x:xmpmeta>"#;

fn gateway() -> CallbackGateway {
    CallbackGateway::new(
        "fixture",
        Box::new(|image| {
            let total = match image.name.as_str() {
                "sunset.jpg" => 93,
                "blurry.jpg" => 18,
                _ => 50,
            };
            Ok(EvaluationResult {
                composition_score: total,
                lighting_score: total,
                technical_score: total,
                artistic_score: total,
                total_score: total,
                is_worth_keeping: total >= 50,
                feedback: format!("Scored {} for {}.", total, image.name),
            })
        }),
    )
}

#[test]
fn test_review_folder() {
    let dir = tempfile::tempdir().unwrap();
    let reports = tempfile::tempdir().unwrap();
    for name in ["sunset.jpg", "blurry.jpg", "street.png", "archive.jpg"] {
        fs::write(dir.path().join(name), name.as_bytes()).unwrap();
    }
    fs::write(dir.path().join("archive.xmp"), FOREIGN_SIDECAR).unwrap();
    fs::write(dir.path().join(".hidden.jpg"), b"skip me").unwrap();

    let store = Arc::new(DirStore::allow_all(dir.path()));
    let library = PhotoLibrary::open(store.as_ref()).unwrap();
    assert_eq!(library.len(), 4);

    let archived = library.get("archive.jpg").unwrap();
    let SidecarStatus::Present(previous) = &archived.sidecar else {
        panic!("foreign sidecar not decoded");
    };
    assert_eq!(previous.total_score, 80);
    assert!(previous.is_worth_keeping);
    assert_eq!(previous.feedback, "");

    let config = ReviewConfig::builder()
        .jobs(2)
        .skip_evaluated(true)
        .report_dir(reports.path())
        .build();
    let session = ReviewSession::new(config, Arc::new(gateway()), store.clone());

    let report = session.evaluate_folder().unwrap();
    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(
        report.outcome("archive.jpg").unwrap().state,
        EvaluationState::Skipped
    );
    assert_eq!(report.kept(), vec!["street.png", "sunset.jpg"]);
    assert_eq!(report.rejected(), vec!["blurry.jpg"]);
    assert!(report.failed().is_empty());

    let reloaded = PhotoLibrary::open(store.as_ref()).unwrap();
    let summary = reloaded.summary();
    assert_eq!(summary.evaluated, 4);
    assert_eq!(summary.kept, 3);
    assert_eq!(summary.rejected, 1);

    let sunset = reloaded.get("sunset.jpg").unwrap().sidecar.evaluation().unwrap();
    assert_eq!(sunset.total_score, 100);
    assert_eq!(sunset.feedback, "Scored 93 for sunset.jpg.");
    let blurry = reloaded.get("blurry.jpg").unwrap().sidecar.evaluation().unwrap();
    assert_eq!(blurry.total_score, 20);

    let (json, csv) = session.write_report(&report).unwrap().unwrap();
    assert!(fs::read_to_string(json).unwrap().contains("\"skipped\""));
    assert_eq!(fs::read_to_string(csv).unwrap().lines().count(), 5);
}

#[test]
fn test_cull_rejected_photos() {
    let dir = tempfile::tempdir().unwrap();
    let keep_dir = tempfile::tempdir().unwrap();
    for name in ["sunset.jpg", "blurry.jpg"] {
        fs::write(dir.path().join(name), name.as_bytes()).unwrap();
    }

    let store = Arc::new(DirStore::allow_all(dir.path()));
    let keepers = DirStore::allow_all(keep_dir.path());
    let session = ReviewSession::new(ReviewConfig::default(), Arc::new(gateway()), store.clone());
    session.evaluate_folder().unwrap();

    let mut library = PhotoLibrary::open(store.as_ref()).unwrap();
    library.move_photo(store.as_ref(), "sunset.jpg", &keepers).unwrap();
    library.delete_photo(store.as_ref(), "blurry.jpg").unwrap();

    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    let moved = PhotoLibrary::open(&keepers).unwrap();
    assert_eq!(moved.len(), 1);
    assert!(moved.photos[0].sidecar.evaluation().unwrap().is_worth_keeping);
}
