//! Persistent counters for actions the oracle asked for but nobody implements.
//!
//! The log is the only state shared across subjects. Every increment is
//! written through to disk immediately (temp file + rename), so a crash loses
//! at most the increment that was in flight.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// File name of the log inside the output directory.
pub const MISSING_LOG_FILE: &str = "missing_functions.json";

/// Process-scoped `action name -> cumulative invocation count` map.
#[derive(Debug, Clone, Default)]
pub struct MissingActionLog {
    path: Option<PathBuf>,
    counts: BTreeMap<String, u64>,
}

impl MissingActionLog {
    /// A log that only lives in memory. Used when no output directory exists.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load counters from `path`. A missing file starts empty; an unreadable
    /// or corrupt one is reported and also starts empty rather than failing the run.
    pub fn load(path: &Path) -> Self {
        let counts = match read_counts(path) {
            Ok(counts) => counts,
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "could not load missing action log");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), entries = counts.len(), "missing action log loaded");
        Self {
            path: Some(path.to_path_buf()),
            counts,
        }
    }

    /// Count one more request for `name` and persist immediately.
    ///
    /// The in-memory count is updated even when the write fails; the error is
    /// returned so the caller can report it.
    pub fn record(&mut self, name: &str) -> Result<u64> {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        self.flush()?;
        Ok(count)
    }

    /// Write all counters to disk, merged with whatever the file holds now.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut merged = match read_counts(path) {
            Ok(on_disk) => on_disk,
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "overwriting unreadable missing action log");
                BTreeMap::new()
            }
        };
        for (name, count) in &self.counts {
            let entry = merged.entry(name.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }
        let mut buf = serde_json::to_string_pretty(&merged).context("serialize missing action log")?;
        buf.push('\n');
        write_atomic(path, &buf)
    }

    /// Forget every counter and delete the backing file.
    pub fn clear(&mut self) -> Result<()> {
        self.counts.clear();
        if let Some(path) = &self.path
            && path.exists()
        {
            fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
        }
        Ok(())
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn read_counts(path: &Path) -> Result<BTreeMap<String, u64>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let counts = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(counts)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("missing action log path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp missing action log {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace missing action log {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_writes_through_on_every_increment() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(MISSING_LOG_FILE);
        let mut log = MissingActionLog::load(&path);

        for expected in 1..=3 {
            assert_eq!(log.record("search_crunchbase").expect("record"), expected);
            let reloaded = MissingActionLog::load(&path);
            assert_eq!(reloaded.count("search_crunchbase"), expected);
        }
    }

    #[test]
    fn load_continues_from_persisted_counts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(MISSING_LOG_FILE);
        fs::write(&path, "{\n  \"search_news\": 4\n}\n").expect("seed");

        let mut log = MissingActionLog::load(&path);
        log.record("search_news").expect("record");
        log.record("search_linkedin").expect("record");

        let contents = fs::read_to_string(&path).expect("read");
        let on_disk: BTreeMap<String, u64> = serde_json::from_str(&contents).expect("parse");
        assert_eq!(on_disk["search_news"], 5);
        assert_eq!(on_disk["search_linkedin"], 1);
    }

    #[test]
    fn flush_keeps_entries_written_by_someone_else() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(MISSING_LOG_FILE);
        let mut log = MissingActionLog::load(&path);
        fs::write(&path, "{\"from_another_run\": 2}").expect("external write");

        log.record("mine").expect("record");

        let reloaded = MissingActionLog::load(&path);
        assert_eq!(reloaded.count("from_another_run"), 2);
        assert_eq!(reloaded.count("mine"), 1);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(MISSING_LOG_FILE);
        fs::write(&path, "not json").expect("seed");

        let mut log = MissingActionLog::load(&path);
        assert!(log.counts().is_empty());
        assert_eq!(log.record("x").expect("record"), 1);
    }

    #[test]
    fn clear_removes_file_and_counts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(MISSING_LOG_FILE);
        let mut log = MissingActionLog::load(&path);
        log.record("x").expect("record");

        log.clear().expect("clear");
        assert!(!path.exists());
        assert_eq!(log.count("x"), 0);
    }

    #[test]
    fn in_memory_log_never_touches_disk() {
        let mut log = MissingActionLog::in_memory();
        assert_eq!(log.record("x").expect("record"), 1);
        assert_eq!(log.path(), None);
    }
}
