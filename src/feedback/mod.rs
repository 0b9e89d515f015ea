use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::{FlaviaError, StoreError};
use crate::model::FeedbackEntry;
use crate::store::FileLocks;

pub const FEEDBACK_FILE: &str = "feedback.jsonl";

/// Append-only JSON-lines log of ratings. Nothing in generation reads it.
#[derive(Debug, Clone)]
pub struct FeedbackRecorder {
    path: PathBuf,
    locks: FileLocks,
}

impl FeedbackRecorder {
    pub fn new(path: impl Into<PathBuf>, locks: FileLocks) -> Self {
        Self { path: path.into(), locks }
    }

    /// Recorder writing `feedback.jsonl` under the personal data directory.
    pub fn in_dir(dir: &Path, locks: FileLocks) -> Self {
        Self::new(dir.join(FEEDBACK_FILE), locks)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, entry: &FeedbackEntry) -> Result<(), FlaviaError> {
        if !(1..=5).contains(&entry.rating) {
            return Err(FlaviaError::InvalidRequest(format!(
                "rating must be 1-5, got {}",
                entry.rating
            )));
        }
        if entry.recipe_id.trim().is_empty() {
            return Err(FlaviaError::InvalidRequest("recipe id is empty".into()));
        }

        let werr = |source| StoreError::Write { path: self.path.clone(), source };
        let mut line = serde_json::to_string(entry)
            .map_err(|source| StoreError::Encode { path: self.path.clone(), source })?;
        line.push('\n');

        let lock = self.locks.for_path(&self.path);
        let _guard = lock.lock();
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs_err::create_dir_all(dir).map_err(werr)?;
        }
        let mut file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(werr)?;
        file.write_all(line.as_bytes()).map_err(werr)?;
        info!(recipe = %entry.recipe_id, rating = entry.rating, "feedback recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let rec = FeedbackRecorder::in_dir(dir.path(), FileLocks::default());
        rec.record(&FeedbackEntry::new("ginger-pork", 5, "great")).unwrap();
        rec.record(&FeedbackEntry::new("okra-soup", 2, "")).unwrap();

        let text = std::fs::read_to_string(rec.path()).unwrap();
        let entries: Vec<FeedbackEntry> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].recipe_id, "ginger-pork");
        assert_eq!(entries[1].rating, 2);
    }

    #[test]
    fn out_of_range_rating_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let rec = FeedbackRecorder::in_dir(dir.path(), FileLocks::default());
        for rating in [0, 6] {
            let err = rec.record(&FeedbackEntry::new("x", rating, "")).unwrap_err();
            assert!(matches!(err, FlaviaError::InvalidRequest(_)));
        }
        assert!(!rec.path().exists());
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let rec = FeedbackRecorder::in_dir(dir.path(), FileLocks::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let rec = rec.clone();
                std::thread::spawn(move || {
                    let comment = "x".repeat(2_000);
                    rec.record(&FeedbackEntry::new(format!("r{i}"), 4, comment)).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let text = std::fs::read_to_string(rec.path()).unwrap();
        assert_eq!(text.lines().count(), 8);
        for l in text.lines() {
            serde_json::from_str::<FeedbackEntry>(l).unwrap();
        }
    }
}
