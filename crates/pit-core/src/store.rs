use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PitConfig;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access store: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse store document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("The index is locked by another pit process")]
    Locked,
}

/// A named resource attached to a project, actionable via `open`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pit {
    pub id: u64,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A tracked directory with a stable id and owned pits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
    pub active: bool,
    #[serde(default)]
    pub pits: Vec<Pit>,
    /// Next pit id; persisted so pit ids are never reused within the project.
    #[serde(default = "default_next_id")]
    pub next_pit_id: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl Project {
    pub fn allocate_pit_id(&mut self) -> u64 {
        let id = self.next_pit_id;
        self.next_pit_id += 1;
        id
    }

    pub fn pit(&self, id: u64) -> Option<&Pit> {
        self.pits.iter().find(|pit| pit.id == id)
    }

    pub fn pit_mut(&mut self, id: u64) -> Option<&mut Pit> {
        self.pits.iter_mut().find(|pit| pit.id == id)
    }
}

/// The full store document: every project with its nested pits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Database {
    #[serde(default = "default_store_version")]
    pub version: u32,
    /// Next project id; never decremented, so ids are never reused within a
    /// store generation.
    #[serde(default = "default_next_id")]
    pub next_project_id: u64,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            version: default_store_version(),
            next_project_id: default_next_id(),
            projects: Vec::new(),
        }
    }
}

impl Database {
    pub fn allocate_project_id(&mut self) -> u64 {
        let id = self.next_project_id;
        self.next_project_id += 1;
        id
    }

    pub fn project(&self, id: u64) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    pub fn project_mut(&mut self, id: u64) -> Option<&mut Project> {
        self.projects.iter_mut().find(|project| project.id == id)
    }
}

fn default_store_version() -> u32 {
    1
}

fn default_next_id() -> u64 {
    1
}

pub fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Exclusive advisory lock on the store, released on drop.
#[derive(Debug)]
pub struct StoreGuard {
    file: File,
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Durable mapping of project records to disk. Mutations go through
/// `lock()` + `load()` + `save()` as one logical transaction; reads may skip
/// the lock and tolerate concurrent change.
pub struct Store {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl Store {
    pub fn new(path: PathBuf, lock_path: PathBuf, lock_timeout: Duration) -> Self {
        Self {
            path,
            lock_path,
            lock_timeout,
        }
    }

    pub fn open(config: &PitConfig) -> Self {
        Self::new(
            config.store_path(),
            config.lock_path(),
            Duration::from_millis(config.lock_timeout_ms),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires the exclusive store lock, waiting up to the configured
    /// timeout before failing with `StoreError::Locked`.
    pub fn lock(&self) -> Result<StoreGuard, StoreError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)?;
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("acquired store lock at {}", self.lock_path.display());
                    return Ok(StoreGuard { file });
                }
                Err(err)
                    if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {}
                Err(err) => return Err(StoreError::Io(err)),
            }
            if Instant::now() >= deadline {
                return Err(StoreError::Locked);
            }
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }
    }

    /// Missing store file means an empty database, not an error.
    pub fn load(&self) -> Result<Database, StoreError> {
        if !self.path.exists() {
            return Ok(Database::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes the full document to a sibling temp file, then renames it over
    /// the target so readers never observe a partial write.
    pub fn save(&self, db: &Database) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(db)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("saved {} projects to {}", db.projects.len(), self.path.display());
        Ok(())
    }
}
