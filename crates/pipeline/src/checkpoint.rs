// crates/pipeline/src/checkpoint.rs
//! Durable run-progress checkpoints.
//!
//! One JSON file per upload id, written via temp-then-rename so a crash
//! mid-write never corrupts the previous checkpoint. Saving is best-effort
//! from the driver's point of view: a failed write logs a warning and the
//! run continues.

use std::path::{Path, PathBuf};

use nomenorm_types::Checkpoint;

pub struct CheckpointManager {
    dir: PathBuf,
    enabled: bool,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn path_for(&self, upload_id: &str) -> PathBuf {
        self.dir
            .join(format!("checkpoint_{}.json", sanitize(upload_id)))
    }

    /// Load the live checkpoint for an upload, if any. A corrupt file is
    /// treated as absent (and logged): the run simply starts over.
    pub fn load(&self, upload_id: &str) -> Option<Checkpoint> {
        if !self.enabled {
            return None;
        }
        let path = self.path_for(upload_id);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(checkpoint) => Some(checkpoint),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "corrupt checkpoint ignored");
                None
            }
        }
    }

    /// Serialize and persist via temp-then-rename.
    pub fn save(&self, checkpoint: &Checkpoint) -> std::io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&checkpoint.upload_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Remove the checkpoint after a successful run. Best-effort.
    pub fn delete(&self, upload_id: &str) {
        if !self.enabled {
            return;
        }
        let path = self.path_for(upload_id);
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "failed to delete checkpoint");
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn sanitize(upload_id: &str) -> String {
    upload_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let manager = CheckpointManager::new(tmp.path(), true);

        let mut checkpoint = Checkpoint::new("upload-7", 100, 25);
        checkpoint.processed_count = 50;
        checkpoint.last_processed_id = 123;
        manager.save(&checkpoint).expect("save");

        let loaded = manager.load("upload-7").expect("load");
        assert_eq!(loaded, checkpoint);
        // No stray temp file left behind
        assert!(!manager.path_for("upload-7").with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_missing_is_none() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let manager = CheckpointManager::new(tmp.path(), true);
        assert!(manager.load("never-saved").is_none());
    }

    #[test]
    fn test_corrupt_file_ignored() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let manager = CheckpointManager::new(tmp.path(), true);
        std::fs::create_dir_all(tmp.path()).unwrap();
        std::fs::write(manager.path_for("bad"), "{{{not json").unwrap();
        assert!(manager.load("bad").is_none());
    }

    #[test]
    fn test_delete() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let manager = CheckpointManager::new(tmp.path(), true);
        let checkpoint = Checkpoint::new("done", 10, 5);
        manager.save(&checkpoint).expect("save");
        assert!(manager.path_for("done").exists());
        manager.delete("done");
        assert!(!manager.path_for("done").exists());
        // Deleting again is fine
        manager.delete("done");
    }

    #[test]
    fn test_disabled_manager_is_noop() {
        let manager = CheckpointManager::disabled();
        let checkpoint = Checkpoint::new("x", 10, 5);
        manager.save(&checkpoint).expect("noop save");
        assert!(manager.load("x").is_none());
    }

    #[test]
    fn test_upload_id_sanitized() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let manager = CheckpointManager::new(tmp.path(), true);
        let path = manager.path_for("../../etc/passwd");
        assert!(path.starts_with(tmp.path()));
        assert!(!path.to_string_lossy().contains(".."));
    }
}
