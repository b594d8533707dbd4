//! On-disk enrollment collection: one still image per identity, the file
//! stem being the display name.

use crate::provider::{EmbeddingProvider, ProviderError};
use crate::store::{IdentityStore, LoadReport, StoreError};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("invalid enrollment name {0:?}")]
    InvalidName(String),
    #[error("an identity named {0:?} is already enrolled")]
    DuplicateName(String),
    #[error("enrollment storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to encode enrollment image {path}: {source}")]
    Image {
        path: String,
        source: image::ImageError,
    },
    #[error("no face detected in enrollment image for {0:?}")]
    NoFaceDetected(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<StoreError> for EnrollError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NoFaceDetected(name) => EnrollError::NoFaceDetected(name),
            StoreError::Provider(e) => EnrollError::Provider(e),
        }
    }
}

/// Result of a successful [`enroll`].
#[derive(Debug)]
pub struct Enrolled {
    pub name: String,
    pub path: PathBuf,
    /// Freshly rebuilt store including the new identity.
    pub store: IdentityStore,
    pub report: LoadReport,
}

/// One enrollment image on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Enrollment images that were read successfully, plus the ones that were not.
#[derive(Debug, Default)]
pub struct EnrollmentImages {
    pub images: Vec<(String, RgbImage)>,
    pub unreadable: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct EnrollmentDir {
    root: PathBuf,
}

impl EnrollmentDir {
    /// Open (and create if missing) the enrollment directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EnrollError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| EnrollError::StorageUnavailable {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Image entries sorted by file name.
    pub fn entries(&self) -> Result<Vec<EnrollmentEntry>, EnrollError> {
        let read_dir = std::fs::read_dir(&self.root).map_err(|e| self.unavailable(e))?;

        let mut entries: Vec<EnrollmentEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_extension(path))
            .filter_map(|path| {
                let name = path.file_stem()?.to_str()?.to_string();
                Some(EnrollmentEntry { name, path })
            })
            .collect();
        entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(entries)
    }

    /// Decode every enrollment image. Unreadable files are reported, not fatal.
    pub fn load_images(&self) -> Result<EnrollmentImages, EnrollError> {
        let mut out = EnrollmentImages::default();
        for entry in self.entries()? {
            match image::open(&entry.path) {
                Ok(img) => out.images.push((entry.name, img.to_rgb8())),
                Err(e) => {
                    tracing::warn!(path = %entry.path.display(), error = %e, "unreadable enrollment image; skipping");
                    out.unreadable.push(entry.path);
                }
            }
        }
        Ok(out)
    }

    pub fn contains(&self, name: &str) -> Result<bool, EnrollError> {
        Ok(self.entries()?.iter().any(|e| e.name == name))
    }

    /// Write `image` as the enrollment image for `name`.
    ///
    /// An existing enrollment under the same name is rejected unless
    /// `replace` is set, in which case every image for that name is removed
    /// first.
    pub fn save(&self, name: &str, image: &RgbImage, replace: bool) -> Result<PathBuf, EnrollError> {
        let existing: Vec<EnrollmentEntry> = self.entries()?.into_iter().filter(|e| e.name == name).collect();
        if !existing.is_empty() {
            if !replace {
                return Err(EnrollError::DuplicateName(name.to_string()));
            }
            for entry in &existing {
                std::fs::remove_file(&entry.path).map_err(|e| self.unavailable(e))?;
            }
            tracing::info!(name, replaced = existing.len(), "replacing existing enrollment");
        }

        let path = self.root.join(format!("{name}.jpg"));
        image.save(&path).map_err(|source| EnrollError::Image {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(name, path = %path.display(), "enrollment image saved");
        Ok(path)
    }

    fn unavailable(&self, source: std::io::Error) -> EnrollError {
        EnrollError::StorageUnavailable {
            path: self.root.display().to_string(),
            source,
        }
    }
}

/// Decode every enrollment image and encode the whole collection into a new
/// store.
pub fn rebuild_store<P>(dir: &EnrollmentDir, provider: &mut P) -> Result<(IdentityStore, LoadReport), EnrollError>
where
    P: EmbeddingProvider + ?Sized,
{
    let loaded = dir.load_images()?;
    let (store, mut report) = IdentityStore::load(loaded.images, provider);
    report.skipped.extend(loaded.unreadable.iter().map(|p| p.display().to_string()));
    Ok((store, report))
}

/// Enroll `image` under `name`.
///
/// The image must contain at least one face before anything is written. On
/// success the store is rebuilt from the whole directory so the caller can
/// publish it wholesale.
pub fn enroll<P>(
    dir: &EnrollmentDir,
    name: &str,
    image: &RgbImage,
    replace: bool,
    provider: &mut P,
) -> Result<Enrolled, EnrollError>
where
    P: EmbeddingProvider + ?Sized,
{
    let name = validate_name(name)?;
    if !replace && dir.contains(name)? {
        return Err(EnrollError::DuplicateName(name.to_string()));
    }

    IdentityStore::add(name, image, provider)?;
    let path = dir.save(name, image, replace)?;
    let (store, report) = rebuild_store(dir, provider)?;

    Ok(Enrolled {
        name: name.to_string(),
        path,
        store,
        report,
    })
}

/// Check that `name` can be used both as a file stem and as a log field.
pub fn validate_name(name: &str) -> Result<&str, EnrollError> {
    let trimmed = name.trim();
    let bad = trimmed.is_empty()
        || trimmed.starts_with('.')
        || trimmed.chars().any(|c| matches!(c, '/' | '\\' | ',' | '\0') || c.is_control());
    if bad {
        return Err(EnrollError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{face_image, FakeProvider};
    use image::Rgb;

    fn img() -> RgbImage {
        RgbImage::from_pixel(8, 8, Rgb([120, 30, 200]))
    }

    #[test]
    fn test_entries_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let enroll = EnrollmentDir::open(dir.path()).unwrap();
        img().save(dir.path().join("zoe.png")).unwrap();
        img().save(dir.path().join("adam.jpg")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let names: Vec<String> = enroll.entries().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["adam", "zoe"]);
    }

    #[test]
    fn test_save_rejects_duplicate_unless_replace() {
        let dir = tempfile::tempdir().unwrap();
        let enroll = EnrollmentDir::open(dir.path()).unwrap();
        enroll.save("Alice", &img(), false).unwrap();

        let err = enroll.save("Alice", &img(), false).unwrap_err();
        assert!(matches!(err, EnrollError::DuplicateName(n) if n == "Alice"));

        img().save(dir.path().join("Alice.png")).unwrap();
        enroll.save("Alice", &img(), true).unwrap();
        let entries = enroll.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, dir.path().join("Alice.jpg"));
    }

    #[test]
    fn test_load_images_reports_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let enroll = EnrollmentDir::open(dir.path()).unwrap();
        enroll.save("Alice", &img(), false).unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not an image").unwrap();

        let loaded = enroll.load_images().unwrap();
        assert_eq!(loaded.images.len(), 1);
        assert_eq!(loaded.images[0].0, "Alice");
        assert_eq!(loaded.images[0].1.dimensions(), (8, 8));
        assert_eq!(loaded.unreadable, vec![dir.path().join("broken.png")]);
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/db");
        EnrollmentDir::open(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_enroll_requires_face_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let enroll_dir = EnrollmentDir::open(dir.path()).unwrap();
        let mut provider = FakeProvider::default();

        let err = enroll(&enroll_dir, "Alice", &face_image(0, 50), false, &mut provider).unwrap_err();
        assert!(matches!(err, EnrollError::NoFaceDetected(n) if n == "Alice"));
        assert!(enroll_dir.entries().unwrap().is_empty());
    }

    #[test]
    fn test_enroll_rebuilds_store() {
        let dir = tempfile::tempdir().unwrap();
        let enroll_dir = EnrollmentDir::open(dir.path()).unwrap();
        let mut provider = FakeProvider::default();

        enroll(&enroll_dir, "Alice", &face_image(1, 50), false, &mut provider).unwrap();
        let done = enroll(&enroll_dir, " Bob ", &face_image(1, 150), false, &mut provider).unwrap();

        assert_eq!(done.name, "Bob");
        assert_eq!(done.path, dir.path().join("Bob.jpg"));
        assert_eq!(done.store.names().collect::<Vec<_>>(), vec!["Alice", "Bob"]);
        assert_eq!(done.report.registered, 2);
    }

    #[test]
    fn test_enroll_duplicate_name() {
        let dir = tempfile::tempdir().unwrap();
        let enroll_dir = EnrollmentDir::open(dir.path()).unwrap();
        let mut provider = FakeProvider::default();
        enroll(&enroll_dir, "Alice", &face_image(1, 50), false, &mut provider).unwrap();
        let calls = provider.calls.len();

        let err = enroll(&enroll_dir, "Alice", &face_image(1, 90), false, &mut provider).unwrap_err();
        assert!(matches!(err, EnrollError::DuplicateName(n) if n == "Alice"));
        assert_eq!(provider.calls.len(), calls, "duplicate is rejected before encoding");

        let done = enroll(&enroll_dir, "Alice", &face_image(1, 90), true, &mut provider).unwrap();
        assert_eq!(done.store.len(), 1);
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Alice Smith ").unwrap(), "Alice Smith");
        for bad in ["", "   ", "../x", "a/b", "a\\b", "Doe, Jane", ".hidden", "a\nb"] {
            assert!(validate_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
