//! Photo library: the images of one folder and their stored verdicts.
//!
//! Photos are identified by file name only. File contents are read through
//! the [`SidecarStore`] when needed, so a [`Photo`] is plain data that can be
//! cloned, serialized and sent across threads.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::evaluation::EvaluationResult;
use crate::gateway::{ImagePayload, media_type_for_path};
use crate::sidecar::{self, SIDECAR_EXTENSION};
use crate::store::{Access, SidecarStore};

/// What the sidecar of a photo holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "evaluation", rename_all = "snake_case")]
pub enum SidecarStatus {
    /// No sidecar file.
    Missing,
    /// A sidecar exists but is not a readable XMP packet.
    Malformed,
    /// A decoded verdict.
    Present(EvaluationResult),
}

impl SidecarStatus {
    /// The stored evaluation, if any.
    #[must_use]
    pub fn evaluation(&self) -> Option<&EvaluationResult> {
        match self {
            Self::Present(evaluation) => Some(evaluation),
            _ => None,
        }
    }

    /// Whether a usable verdict is stored.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// One image in a folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    /// File name within the folder.
    pub name: String,
    /// MIME type inferred from the extension.
    pub media_type: String,
    /// Size in bytes.
    pub file_size: u64,
    /// Last modification time.
    pub modified: Option<DateTime<Utc>>,
    /// Stored verdict.
    pub sidecar: SidecarStatus,
}

impl Photo {
    /// Name of this photo's sidecar file.
    #[must_use]
    pub fn sidecar_name(&self) -> String {
        sidecar::sidecar_file_name(&self.name)
    }
}

/// Counts over a library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySummary {
    /// Number of photos.
    pub photos: usize,
    /// Photos with a readable verdict.
    pub evaluated: usize,
    /// Evaluated photos marked worth keeping.
    pub kept: usize,
    /// Evaluated photos marked for discard.
    pub rejected: usize,
    /// Photos whose sidecar could not be read.
    pub malformed: usize,
}

/// The photos of one folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoLibrary {
    /// Photos sorted by file name.
    pub photos: Vec<Photo>,
}

impl PhotoLibrary {
    /// List a folder and load the sidecar of every photo.
    ///
    /// An unreadable sidecar never fails the listing; the photo is reported
    /// as [`SidecarStatus::Malformed`].
    pub fn open(store: &dyn SidecarStore) -> Result<Self> {
        store.request_permission(Access::Read)?;

        let mut photos = Vec::new();
        for entry in store.list()? {
            let Some(media_type) = media_type_for_path(Path::new(&entry.name)) else {
                continue;
            };
            let sidecar = match load_sidecar(store, &entry.name) {
                Ok(status) => status,
                Err(e @ Error::PermissionDenied { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(image = %entry.name, "could not read sidecar, treating photo as unevaluated: {e}");
                    SidecarStatus::Malformed
                }
            };
            photos.push(Photo {
                name: entry.name,
                media_type: media_type.to_string(),
                file_size: entry.size,
                modified: entry.modified,
                sidecar,
            });
        }

        tracing::info!(
            folder = %store.root().display(),
            photos = photos.len(),
            "library opened"
        );
        Ok(Self { photos })
    }

    /// Number of photos.
    #[must_use]
    pub fn len(&self) -> usize {
        self.photos.len()
    }

    /// Whether the folder holds no photos.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Look a photo up by file name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Photo> {
        self.photos.iter().find(|photo| photo.name == name)
    }

    /// Photos without a readable verdict.
    #[must_use]
    pub fn unevaluated(&self) -> Vec<&Photo> {
        self.photos
            .iter()
            .filter(|photo| !photo.sidecar.is_evaluated())
            .collect()
    }

    /// Count photos by verdict.
    #[must_use]
    pub fn summary(&self) -> LibrarySummary {
        let mut summary = LibrarySummary {
            photos: self.photos.len(),
            ..LibrarySummary::default()
        };
        for photo in &self.photos {
            match &photo.sidecar {
                SidecarStatus::Present(evaluation) => {
                    summary.evaluated += 1;
                    if evaluation.is_worth_keeping {
                        summary.kept += 1;
                    } else {
                        summary.rejected += 1;
                    }
                }
                SidecarStatus::Malformed => summary.malformed += 1,
                SidecarStatus::Missing => {}
            }
        }
        summary
    }

    /// Delete a photo and its sidecar.
    ///
    /// The image deletion decides the outcome. Failing to delete the sidecar
    /// afterwards is only logged.
    pub fn delete_photo(&mut self, store: &dyn SidecarStore, name: &str) -> Result<()> {
        store.request_permission(Access::ReadWrite)?;

        if !store.delete(name)? {
            return Err(Error::PhotoNotFound(name.to_string()));
        }
        tracing::info!(image = name, "photo deleted");
        remove_sidecar_best_effort(store, name);

        self.photos.retain(|photo| photo.name != name);
        Ok(())
    }

    /// Move a photo and its sidecar to another folder.
    ///
    /// The sidecar is copied byte for byte. Nothing in the destination is
    /// overwritten, and a move within one folder is refused. If copying
    /// fails, or the original cannot be removed, the copies are deleted
    /// again and the source is left as it was. Failing to remove the old
    /// sidecar at the end is only logged.
    pub fn move_photo(
        &mut self,
        store: &dyn SidecarStore,
        name: &str,
        destination: &dyn SidecarStore,
    ) -> Result<()> {
        store.request_permission(Access::ReadWrite)?;
        destination.request_permission(Access::ReadWrite)?;

        if media_type_for_path(Path::new(name)).is_none() {
            return Err(Error::UnsupportedFormat(name.to_string()));
        }
        if is_same_folder(store.root(), destination.root())? {
            return Err(Error::SameFolder(destination.root().to_path_buf()));
        }

        let bytes = store
            .read(name)?
            .ok_or_else(|| Error::PhotoNotFound(name.to_string()))?;
        let sidecar_name = sidecar::sidecar_file_name(name);
        let sidecar_bytes = store.read(&sidecar_name)?;

        for target in [name, sidecar_name.as_str()] {
            if destination.exists(target)? {
                return Err(Error::AlreadyExists(target.to_string()));
            }
        }

        destination.write(name, &bytes)?;
        if let Some(sidecar_bytes) = &sidecar_bytes {
            if let Err(e) = destination.write(&sidecar_name, sidecar_bytes) {
                discard_copy(destination, name);
                return Err(e);
            }
        }

        if let Err(e) = store.delete(name) {
            discard_copy(destination, name);
            return Err(e);
        }
        remove_sidecar_best_effort(store, name);

        tracing::info!(
            image = name,
            to = %destination.root().display(),
            "photo moved"
        );
        self.photos.retain(|photo| photo.name != name);
        Ok(())
    }
}

fn is_same_folder(a: &Path, b: &Path) -> Result<bool> {
    Ok(std::fs::canonicalize(a)? == std::fs::canonicalize(b)?)
}

/// Remove a half-finished copy from the destination of a move.
fn discard_copy(destination: &dyn SidecarStore, image_name: &str) {
    if let Err(e) = destination.delete(image_name) {
        tracing::warn!(image = image_name, "could not remove copied photo: {e}");
    }
    remove_sidecar_best_effort(destination, image_name);
}

/// Read and decode the sidecar of an image.
pub fn load_sidecar(store: &dyn SidecarStore, image_name: &str) -> Result<SidecarStatus> {
    let sidecar_name = sidecar::sidecar_file_name(image_name);
    let Some(bytes) = store.read(&sidecar_name)? else {
        return Ok(SidecarStatus::Missing);
    };

    match sidecar::decode_bytes(&bytes) {
        Some(evaluation) => Ok(SidecarStatus::Present(evaluation)),
        None => {
            tracing::warn!(sidecar = %sidecar_name, "unreadable sidecar, treating photo as unevaluated");
            Ok(SidecarStatus::Malformed)
        }
    }
}

/// Read a photo for scoring.
pub fn load_payload(store: &dyn SidecarStore, name: &str) -> Result<ImagePayload> {
    if Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SIDECAR_EXTENSION))
    {
        return Err(Error::UnsupportedFormat(name.to_string()));
    }
    let bytes = store
        .read(name)?
        .ok_or_else(|| Error::PhotoNotFound(name.to_string()))?;
    ImagePayload::new(name, bytes)
}

fn remove_sidecar_best_effort(store: &dyn SidecarStore, image_name: &str) {
    let sidecar_name = sidecar::sidecar_file_name(image_name);
    match store.delete(&sidecar_name) {
        Ok(true) => tracing::debug!(sidecar = %sidecar_name, "sidecar removed"),
        Ok(false) => {}
        Err(e) => tracing::warn!(sidecar = %sidecar_name, "could not remove sidecar: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DirStore, StoreEntry};
    use std::fs;

    fn verdict(total: u8, keep: bool) -> EvaluationResult {
        EvaluationResult::uniform(total, keep, "ok")
    }

    fn folder() -> (tempfile::TempDir, DirStore) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"jpeg-a").unwrap();
        fs::write(dir.path().join("b.png"), b"png-b").unwrap();
        fs::write(dir.path().join("c.heic"), b"heic-c").unwrap();
        fs::write(dir.path().join("notes.txt"), b"text").unwrap();
        fs::write(dir.path().join("a.xmp"), sidecar::encode(&verdict(80, true))).unwrap();
        fs::write(dir.path().join("b.xmp"), b"\x00\x01 garbage").unwrap();
        let store = DirStore::allow_all(dir.path());
        (dir, store)
    }

    #[test]
    fn test_open_reads_statuses() {
        let (_dir, store) = folder();
        let library = PhotoLibrary::open(&store).unwrap();

        let names: Vec<&str> = library.photos.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.heic"]);

        assert_eq!(library.get("a.jpg").unwrap().sidecar, SidecarStatus::Present(verdict(80, true)));
        assert_eq!(library.get("b.png").unwrap().sidecar, SidecarStatus::Malformed);
        assert_eq!(library.get("c.heic").unwrap().sidecar, SidecarStatus::Missing);
        assert_eq!(library.get("c.heic").unwrap().media_type, "image/heic");
    }

    #[test]
    fn test_summary_and_unevaluated() {
        let (_dir, store) = folder();
        let library = PhotoLibrary::open(&store).unwrap();
        let summary = library.summary();
        assert_eq!(
            summary,
            LibrarySummary {
                photos: 3,
                evaluated: 1,
                kept: 1,
                rejected: 0,
                malformed: 1,
            }
        );
        assert_eq!(library.unevaluated().len(), 2);
    }

    #[test]
    fn test_delete_photo_removes_sidecar() {
        let (dir, store) = folder();
        let mut library = PhotoLibrary::open(&store).unwrap();

        library.delete_photo(&store, "a.jpg").unwrap();
        assert!(!dir.path().join("a.jpg").exists());
        assert!(!dir.path().join("a.xmp").exists());
        assert!(library.get("a.jpg").is_none());
    }

    #[test]
    fn test_delete_photo_without_sidecar_succeeds() {
        let (dir, store) = folder();
        let mut library = PhotoLibrary::open(&store).unwrap();

        library.delete_photo(&store, "c.heic").unwrap();
        assert!(!dir.path().join("c.heic").exists());
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn test_delete_missing_photo() {
        let (_dir, store) = folder();
        let mut library = PhotoLibrary::open(&store).unwrap();
        assert!(matches!(
            library.delete_photo(&store, "zzz.jpg"),
            Err(Error::PhotoNotFound(_))
        ));
    }

    #[test]
    fn test_open_survives_unreadable_sidecar() {
        let (dir, store) = folder();
        fs::create_dir(dir.path().join("c.xmp")).unwrap();

        let library = PhotoLibrary::open(&store).unwrap();
        assert_eq!(library.len(), 3);
        assert_eq!(library.get("c.heic").unwrap().sidecar, SidecarStatus::Malformed);
        assert!(library.get("a.jpg").unwrap().sidecar.is_evaluated());
    }

    #[test]
    fn test_move_photo_carries_verdict() {
        let (dir, store) = folder();
        let target = tempfile::tempdir().unwrap();
        let target_store = DirStore::allow_all(target.path());
        let mut library = PhotoLibrary::open(&store).unwrap();
        let original = fs::read(dir.path().join("a.xmp")).unwrap();

        library.move_photo(&store, "a.jpg", &target_store).unwrap();

        assert!(!dir.path().join("a.jpg").exists());
        assert!(!dir.path().join("a.xmp").exists());
        assert_eq!(fs::read(target.path().join("a.jpg")).unwrap(), b"jpeg-a");
        assert_eq!(fs::read(target.path().join("a.xmp")).unwrap(), original);
        assert!(library.get("a.jpg").is_none());
    }

    #[test]
    fn test_move_photo_keeps_sidecar_bytes() {
        let (dir, store) = folder();
        let sidecar = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:xmp="http://ns.adobe.com/xap/1.0/"
        xmlns:lr="http://ns.adobe.com/lightroom/1.0/"
        xmp:Rating="4" xmp:Label="Portfolio" lr:hierarchicalSubject="Trips|Alps">
      <dc:description xmlns:dc="http://purl.org/dc/elements/1.1/">
        <rdf:Alt><rdf:li xml:lang="x-default">Score: 72/100 - Nice ridge.</rdf:li></rdf:Alt>
      </dc:description>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>"#;
        fs::write(dir.path().join("a.xmp"), sidecar).unwrap();
        let target = tempfile::tempdir().unwrap();
        let target_store = DirStore::allow_all(target.path());
        let mut library = PhotoLibrary::open(&store).unwrap();

        library.move_photo(&store, "a.jpg", &target_store).unwrap();
        assert_eq!(fs::read_to_string(target.path().join("a.xmp")).unwrap(), sidecar);
    }

    #[test]
    fn test_move_photo_without_verdict() {
        let (_dir, store) = folder();
        let target = tempfile::tempdir().unwrap();
        let target_store = DirStore::allow_all(target.path());
        let mut library = PhotoLibrary::open(&store).unwrap();

        library.move_photo(&store, "c.heic", &target_store).unwrap();
        assert!(target.path().join("c.heic").exists());
        assert!(!target.path().join("c.xmp").exists());

        library.move_photo(&store, "b.png", &target_store).unwrap();
        assert_eq!(fs::read(target.path().join("b.xmp")).unwrap(), b"\x00\x01 garbage");
    }

    #[test]
    fn test_move_to_same_folder_is_refused() {
        let (dir, store) = folder();
        let same = DirStore::allow_all(dir.path().join("."));
        let mut library = PhotoLibrary::open(&store).unwrap();

        assert!(matches!(
            library.move_photo(&store, "a.jpg", &same),
            Err(Error::SameFolder(_))
        ));
        assert_eq!(fs::read(dir.path().join("a.jpg")).unwrap(), b"jpeg-a");
        assert!(dir.path().join("a.xmp").exists());
        assert!(library.get("a.jpg").is_some());
    }

    #[test]
    fn test_move_does_not_overwrite() {
        let (dir, store) = folder();
        let target = tempfile::tempdir().unwrap();
        let target_store = DirStore::allow_all(target.path());
        fs::write(target.path().join("a.jpg"), b"other").unwrap();
        fs::write(target.path().join("b.xmp"), b"other sidecar").unwrap();
        let mut library = PhotoLibrary::open(&store).unwrap();

        assert!(matches!(
            library.move_photo(&store, "a.jpg", &target_store),
            Err(Error::AlreadyExists(name)) if name == "a.jpg"
        ));
        assert!(matches!(
            library.move_photo(&store, "b.png", &target_store),
            Err(Error::AlreadyExists(name)) if name == "b.xmp"
        ));

        assert_eq!(fs::read(target.path().join("a.jpg")).unwrap(), b"other");
        assert_eq!(fs::read(target.path().join("b.xmp")).unwrap(), b"other sidecar");
        assert!(!target.path().join("b.png").exists());
        assert!(dir.path().join("a.jpg").exists());
        assert!(dir.path().join("b.png").exists());
    }

    /// Directory store that cannot write sidecars.
    struct SidecarWritesFail(DirStore);

    impl SidecarStore for SidecarWritesFail {
        fn root(&self) -> &Path {
            self.0.root()
        }

        fn request_permission(&self, access: Access) -> Result<()> {
            self.0.request_permission(access)
        }

        fn list(&self) -> Result<Vec<StoreEntry>> {
            self.0.list()
        }

        fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
            self.0.read(name)
        }

        fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
            if name.ends_with(".xmp") {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.0.write(name, bytes)
        }

        fn delete(&self, name: &str) -> Result<bool> {
            self.0.delete(name)
        }
    }

    #[test]
    fn test_failed_move_leaves_source_intact() {
        let (dir, store) = folder();
        let target = tempfile::tempdir().unwrap();
        let target_store = SidecarWritesFail(DirStore::allow_all(target.path()));
        let mut library = PhotoLibrary::open(&store).unwrap();

        assert!(matches!(
            library.move_photo(&store, "a.jpg", &target_store),
            Err(Error::Io(_))
        ));
        assert!(!target.path().join("a.jpg").exists());
        assert!(!target.path().join("a.xmp").exists());
        assert_eq!(fs::read(dir.path().join("a.jpg")).unwrap(), b"jpeg-a");
        assert!(dir.path().join("a.xmp").exists());
        assert!(library.get("a.jpg").is_some());
    }

    #[test]
    fn test_load_payload() {
        let (_dir, store) = folder();
        let payload = load_payload(&store, "b.png").unwrap();
        assert_eq!(payload.bytes, b"png-b");
        assert_eq!(payload.media_type, "image/png");
        assert!(matches!(load_payload(&store, "a.xmp"), Err(Error::UnsupportedFormat(_))));
        assert!(matches!(load_payload(&store, "x.jpg"), Err(Error::PhotoNotFound(_))));
    }
}
