//! JSON-backed store for categories learned with the persistent variant of
//! the learning tag.
//!
//! Writes are atomic (temp file + rename) and each write first snapshots
//! the previous file to a timestamped `.bak`, pruned to `max_backups`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pattern::CategoryRecord;

pub const DEFAULT_MAX_BACKUPS: usize = 5;
const STORE_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCategory {
    pub category: CategoryRecord,
    pub learned_at: String,
    pub source: String,
    pub version: String,
    pub checksum: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreFile {
    pub categories: Vec<StoredCategory>,
    pub last_updated: String,
    pub version: String,
    pub total_learned: u64,
}

/// Content checksum over the full category triple plus template.
pub fn checksum(record: &CategoryRecord) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(record.pattern.as_bytes());
    hasher.update(b"\n");
    hasher.update(record.that.as_bytes());
    hasher.update(b"\n");
    hasher.update(record.topic.as_bytes());
    hasher.update(b"\n");
    hasher.update(record.template.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

#[derive(Debug, Clone)]
pub struct PersistentStore {
    path: PathBuf,
    max_backups: usize,
}

impl PersistentStore {
    pub fn new<P: Into<PathBuf>>(path: P, max_backups: usize) -> Self {
        Self {
            path: path.into(),
            max_backups,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all persisted records. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<CategoryRecord>> {
        let file = self.read_file()?;
        Ok(file.categories.into_iter().map(|s| s.category).collect())
    }

    /// Add (or replace, by triple-key) one learned record.
    pub fn append(&self, record: &CategoryRecord, source: &str, now: DateTime<Utc>) -> Result<()> {
        let mut file = self.read_file()?;
        let key = triple_of(record);
        file.categories.retain(|s| triple_of(&s.category) != key);
        file.categories.push(StoredCategory {
            checksum: checksum(record),
            category: record.clone(),
            learned_at: now.to_rfc3339(),
            source: source.to_string(),
            version: STORE_VERSION.to_string(),
        });
        file.total_learned += 1;
        self.write_atomic(&mut file, now)
    }

    /// Remove every record whose pattern equals `pattern_key`.
    pub fn remove(&self, pattern_key: &str, now: DateTime<Utc>) -> Result<usize> {
        let mut file = self.read_file()?;
        let before = file.categories.len();
        file.categories.retain(|s| s.category.pattern != pattern_key);
        let removed = before - file.categories.len();
        if removed > 0 {
            self.write_atomic(&mut file, now)?;
        }
        Ok(removed)
    }

    fn read_file(&self) -> Result<StoreFile> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt learning store at {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreFile::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    fn write_atomic(&self, file: &mut StoreFile, now: DateTime<Utc>) -> Result<()> {
        file.last_updated = now.to_rfc3339();
        file.version = STORE_VERSION.to_string();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        self.snapshot_backup(now)?;

        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(file).context("serializing learning store")?;
        fs::write(&tmp, payload).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    /// Copy the current file aside before overwriting, keeping at most
    /// `max_backups` snapshots (oldest pruned first).
    fn snapshot_backup(&self, now: DateTime<Utc>) -> Result<()> {
        if self.max_backups == 0 || !self.path.exists() {
            return Ok(());
        }
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("learned");
        let backup_name = format!("{stem}.{}.bak", now.format("%Y%m%dT%H%M%S%.3f"));
        let backup_path = self.path.with_file_name(&backup_name);
        fs::copy(&self.path, &backup_path)
            .with_context(|| format!("backing up to {}", backup_path.display()))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let prefix = format!("{stem}.");
        let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.extension().and_then(|s| s.to_str()) == Some("bak")
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        backups.sort();
        while backups.len() > self.max_backups {
            let oldest = backups.remove(0);
            let _ = fs::remove_file(oldest);
        }
        Ok(())
    }
}

fn triple_of(record: &CategoryRecord) -> (String, String, String) {
    (
        record.pattern.clone(),
        record.that.clone(),
        record.topic.clone(),
    )
}
