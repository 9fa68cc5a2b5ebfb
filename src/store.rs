//! Model bundle persistence
//!
//! A bundle lives in one directory holding three entries: the two ensembles
//! (bincode, so every `f64` round-trips exactly) and a JSON metrics document.
//! Saving writes a complete staging directory next to the target and swaps it
//! in with two renames, so a subsequent `load` sees either the old or the new
//! bundle, never a mix. Between the two renames the target is briefly absent
//! and a `load` racing the swap fails with `ArtifactNotFound`.
//!
//! If the swap and the restore of the previous bundle both fail, the previous
//! bundle is left in its `.bundle-retired-*` directory beside the target.

use crate::bundle::ModelBundle;
use crate::error::{Error, Result};
use crate::evaluation::EvaluationMetrics;
use crate::models::{RandomForest, Target};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, warn};

pub const BOARDING_ENTRY: &str = "boarding_model.bin";
pub const ALIGHTING_ENTRY: &str = "alighting_model.bin";
pub const METRICS_ENTRY: &str = "metrics.json";

const PREVIOUS: &str = "previous";

/// Bundle storage rooted at one directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether all three entries are present
    pub fn exists(&self) -> bool {
        [BOARDING_ENTRY, ALIGHTING_ENTRY, METRICS_ENTRY]
            .iter()
            .all(|entry| self.root.join(entry).is_file())
    }

    pub fn save(&self, bundle: &ModelBundle) -> Result<()> {
        save(bundle, &self.root)
    }

    pub fn load(&self) -> Result<ModelBundle> {
        load(&self.root)
    }
}

/// Write `bundle` to the directory `location`, replacing any previous bundle
pub fn save<P: AsRef<Path>>(bundle: &ModelBundle, location: P) -> Result<()> {
    let target = location.as_ref();
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".bundle-staging-")
        .tempdir_in(&parent)?;

    write_entry(
        staging.path(),
        BOARDING_ENTRY,
        &encode_model(bundle.boarding(), BOARDING_ENTRY)?,
    )?;
    write_entry(
        staging.path(),
        ALIGHTING_ENTRY,
        &encode_model(bundle.alighting(), ALIGHTING_ENTRY)?,
    )?;
    write_entry(
        staging.path(),
        METRICS_ENTRY,
        &serde_json::to_vec_pretty(&bundle.metrics())?,
    )?;

    if target.exists() {
        let retired = tempfile::Builder::new()
            .prefix(".bundle-retired-")
            .tempdir_in(&parent)?;

        fs::rename(target, retired.path().join(PREVIOUS))?;
        if let Err(e) = fs::rename(staging.path(), target) {
            warn!(error = %e, "bundle swap failed, restoring previous bundle");
            return Err(restore_previous(retired, target, e));
        }
        // `retired` is removed on drop
    } else {
        fs::rename(staging.path(), target)?;
    }

    info!(path = %target.display(), "model bundle saved");
    Ok(())
}

/// Move the retired bundle back to `target` after a failed swap.
///
/// The retired directory is detached from its guard first, so the previous
/// bundle survives on disk when the restore fails too.
fn restore_previous(retired: TempDir, target: &Path, swap_err: io::Error) -> Error {
    let kept = retired.into_path();
    let previous = kept.join(PREVIOUS);

    match fs::rename(&previous, target) {
        Ok(()) => {
            if let Err(e) = fs::remove_dir(&kept) {
                warn!(error = %e, path = %kept.display(), "could not remove retired directory");
            }
            swap_err.into()
        }
        Err(restore_err) => {
            warn!(
                error = %restore_err,
                path = %previous.display(),
                "previous bundle could not be restored, kept on disk"
            );
            Error::Io(io::Error::new(
                restore_err.kind(),
                format!(
                    "bundle swap failed ({}) and restore failed ({}); previous bundle kept at {}",
                    swap_err,
                    restore_err,
                    previous.display()
                ),
            ))
        }
    }
}

/// Read the bundle stored in the directory `location`
pub fn load<P: AsRef<Path>>(location: P) -> Result<ModelBundle> {
    let dir = location.as_ref();

    let boarding_bytes = read_entry(dir, BOARDING_ENTRY)?;
    let alighting_bytes = read_entry(dir, ALIGHTING_ENTRY)?;
    let metrics_bytes = read_entry(dir, METRICS_ENTRY)?;

    let boarding = decode_model(&boarding_bytes, BOARDING_ENTRY, Target::Boarding)?;
    let alighting = decode_model(&alighting_bytes, ALIGHTING_ENTRY, Target::Alighting)?;

    let metrics: Option<EvaluationMetrics> =
        serde_json::from_slice(&metrics_bytes).map_err(|e| corrupt(METRICS_ENTRY, e))?;
    if let Some(m) = &metrics {
        m.validate().map_err(|e| corrupt(METRICS_ENTRY, e))?;
    }

    info!(path = %dir.display(), "model bundle loaded");
    Ok(ModelBundle::new(boarding, alighting, metrics))
}

fn encode_model(model: &RandomForest, entry: &'static str) -> Result<Vec<u8>> {
    bincode::serialize(model).map_err(|e| corrupt(entry, e))
}

fn decode_model(bytes: &[u8], entry: &'static str, expected: Target) -> Result<RandomForest> {
    let model: RandomForest = bincode::deserialize(bytes).map_err(|e| corrupt(entry, e))?;
    model.validate().map_err(|e| corrupt(entry, e))?;

    if model.target() != expected {
        return Err(corrupt(
            entry,
            format!("holds the {} model, expected {}", model.target(), expected),
        ));
    }
    Ok(model)
}

fn write_entry(dir: &Path, entry: &str, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(dir.join(entry))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn read_entry(dir: &Path, entry: &'static str) -> Result<Vec<u8>> {
    let path = dir.join(entry);
    fs::read(&path).map_err(|_| Error::ArtifactNotFound { entry, path })
}

fn corrupt(entry: &'static str, reason: impl ToString) -> Error {
    Error::ArtifactCorrupt {
        entry,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForestConfig;
    use tempfile::tempdir;

    fn tiny_forest(target: Target) -> RandomForest {
        let rows: Vec<[f64; 7]> = (0..20)
            .map(|i| [i as f64 % 4.0, i as f64, 0.0, 0.0, 20.0, 0.5, 5.0])
            .collect();
        let ys: Vec<f64> = (0..20).map(|i| (i % 4) as f64 * 3.0).collect();

        let mut forest = RandomForest::new(
            target,
            ForestConfig {
                n_trees: 3,
                ..Default::default()
            },
        );
        forest.fit(&rows, &ys).unwrap();
        forest
    }

    fn bundle() -> ModelBundle {
        ModelBundle::new(
            tiny_forest(Target::Boarding),
            tiny_forest(Target::Alighting),
            None,
        )
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"));
        assert!(!store.exists());

        let original = bundle();
        store.save(&original).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_save_replaces_existing_bundle() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"));

        store.save(&bundle()).unwrap();
        store.save(&bundle()).unwrap();
        assert!(store.load().is_ok());

        // no staging or retired directories left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("models")]);
    }

    #[test]
    fn test_missing_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models");
        save(&bundle(), &path).unwrap();
        fs::remove_file(path.join(METRICS_ENTRY)).unwrap();

        match load(&path) {
            Err(Error::ArtifactNotFound { entry, .. }) => assert_eq!(entry, METRICS_ENTRY),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let err = load(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_corrupt_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models");
        save(&bundle(), &path).unwrap();
        fs::write(path.join(ALIGHTING_ENTRY), b"not a forest").unwrap();

        match load(&path) {
            Err(Error::ArtifactCorrupt { entry, .. }) => assert_eq!(entry, ALIGHTING_ENTRY),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_swapped_models_are_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models");
        save(&bundle(), &path).unwrap();
        fs::copy(path.join(BOARDING_ENTRY), path.join(ALIGHTING_ENTRY)).unwrap();

        assert!(matches!(
            load(&path),
            Err(Error::ArtifactCorrupt {
                entry: ALIGHTING_ENTRY,
                ..
            })
        ));
    }

    #[test]
    fn test_corrupt_metrics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models");
        save(&bundle(), &path).unwrap();
        fs::write(path.join(METRICS_ENTRY), br#"{"boarding": 1}"#).unwrap();

        assert!(matches!(
            load(&path),
            Err(Error::ArtifactCorrupt {
                entry: METRICS_ENTRY,
                ..
            })
        ));
    }

    fn retired_with_marker(parent: &Path) -> TempDir {
        let retired = tempfile::Builder::new()
            .prefix(".bundle-retired-")
            .tempdir_in(parent)
            .unwrap();
        let previous = retired.path().join(PREVIOUS);
        fs::create_dir(&previous).unwrap();
        fs::write(previous.join(METRICS_ENTRY), b"null").unwrap();
        retired
    }

    fn swap_error() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "swap rename failed")
    }

    #[test]
    fn test_restore_puts_previous_bundle_back() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("models");
        let retired = retired_with_marker(dir.path());

        let err = restore_previous(retired, &target, swap_error());
        assert!(err.to_string().contains("swap rename failed"));
        assert!(target.join(METRICS_ENTRY).is_file());

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("models")]);
    }

    #[test]
    fn test_failed_restore_keeps_previous_bundle() {
        let dir = tempdir().unwrap();
        // parent of the target does not exist, so the restore rename fails
        let target = dir.path().join("gone").join("models");
        let retired = retired_with_marker(dir.path());
        let retired_path = retired.path().to_path_buf();

        let err = restore_previous(retired, &target, swap_error());
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("previous bundle kept at"));

        assert!(!target.exists());
        assert!(retired_path.join(PREVIOUS).join(METRICS_ENTRY).is_file());
    }
}
