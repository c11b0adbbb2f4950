//! On-disk state: the single-slot credential pair and the draft problem.
//!
//! Both files are plain JSON in the planner's data directory. The credential
//! slot holds at most one token pair per machine; writing the same pair twice
//! (duplicate login callback delivery) produces identical file content, so
//! the write is idempotent by construction.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{Credential, Problem, Solution};

/// The persisted credential slot.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the stored pair, or `None` when no login has been persisted.
    /// An unreadable or malformed file is treated as empty: the session
    /// manager will simply fall back to unauthenticated.
    pub fn load(&self) -> Option<Credential> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding malformed credential file");
                None
            }
        }
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        write_json(&self.path, credential)
    }

    /// Removes the slot. Already-absent is fine.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// The in-progress problem and its last solution, carried between CLI
/// invocations so `cut add`, `optimize`, and `show` operate on the same
/// state a long-lived UI would hold in memory.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Draft {
    pub problem: Problem,
    #[serde(default)]
    pub solution: Option<Solution>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            problem: Problem::default(),
            solution: None,
        }
    }
}

impl Draft {
    /// Loads the draft, seeding a fresh default when none exists yet.
    /// A malformed draft file is an error the user should see rather than
    /// silently losing their edits to a re-seed.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
