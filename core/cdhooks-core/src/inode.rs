//! Filesystem-identity guard for per-directory scripts.
//!
//! Scripts are keyed by path, so a directory that is deleted and recreated (or
//! a different checkout cloned to the same place) would silently inherit them.
//! The guard records the directory's `<dev>:<ino>` token on first visit and
//! refuses to run scripts once the token changes.
//!
//! # Record States
//!
//! ```text
//! missing    → record current token, proceed
//! token == current → proceed (record untouched)
//! token != current → blocked (record untouched, user must act)
//! "disabled" → proceed forever for this directory
//! ```
//!
//! A directory that does not exist is not blocked; absence is handled by the
//! executor, this guard only protects against identity mismatch.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::diagnostics::Diagnostic;
use crate::error::{CdhooksError, Result};
use crate::path_stack::AbsolutePath;
use crate::script::ScriptKind;
use crate::storage::StorageConfig;

/// Literal record content that permanently disables the check for a directory.
pub const DISABLED_SENTINEL: &str = "disabled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InodeRecord {
    Token(String),
    Disabled,
}

impl InodeRecord {
    fn parse(content: &str) -> Option<Self> {
        match content.trim() {
            "" => None,
            DISABLED_SENTINEL => Some(InodeRecord::Disabled),
            token => Some(InodeRecord::Token(token.to_string())),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            InodeRecord::Token(token) => token,
            InodeRecord::Disabled => DISABLED_SENTINEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InodeVerdict {
    Proceed,
    Blocked { diagnostic: Diagnostic },
}

impl InodeVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, InodeVerdict::Blocked { .. })
    }
}

/// Snapshot for `cdhooks inode status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeStatus {
    pub record_path: PathBuf,
    pub record: Option<InodeRecord>,
    pub current: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InodeGuard {
    storage: StorageConfig,
    enabled: bool,
}

impl InodeGuard {
    pub fn new(storage: StorageConfig, enabled: bool) -> Self {
        Self { storage, enabled }
    }

    pub fn check(&self, dir: &AbsolutePath) -> InodeVerdict {
        if !self.enabled {
            return InodeVerdict::Proceed;
        }

        let current = match identity_token(dir.as_path()) {
            Some(token) => token,
            None => {
                debug!(dir = %dir, "No identity token (missing directory), skipping inode check");
                return InodeVerdict::Proceed;
            }
        };

        let record_path = self.storage.inode_path(dir);
        match read_record(&record_path) {
            None => {
                if let Err(e) = write_record(&record_path, &InodeRecord::Token(current.clone())) {
                    warn!(dir = %dir, error = %e, "Failed to record inode");
                } else {
                    debug!(dir = %dir, token = %current, "Recorded inode");
                }
                InodeVerdict::Proceed
            }
            Some(InodeRecord::Disabled) => InodeVerdict::Proceed,
            Some(InodeRecord::Token(recorded)) if recorded == current => InodeVerdict::Proceed,
            Some(InodeRecord::Token(recorded)) => {
                warn!(dir = %dir, recorded = %recorded, current = %current, "Inode mismatch");
                InodeVerdict::Blocked {
                    diagnostic: self.mismatch_diagnostic(dir, &recorded, &current, &record_path),
                }
            }
        }
    }

    pub fn status(&self, dir: &AbsolutePath) -> InodeStatus {
        let record_path = self.storage.inode_path(dir);
        InodeStatus {
            record: read_record(&record_path),
            current: identity_token(dir.as_path()),
            record_path,
        }
    }

    /// Deletes the record so the next visit re-arms the check.
    /// Returns `false` when there was nothing to delete.
    pub fn reset(&self, dir: &AbsolutePath) -> Result<bool> {
        let record_path = self.storage.inode_path(dir);
        match fs_err::remove_file(&record_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CdhooksError::io("removing inode record", e)),
        }
    }

    pub fn disable(&self, dir: &AbsolutePath) -> Result<()> {
        write_record(&self.storage.inode_path(dir), &InodeRecord::Disabled)
    }

    fn mismatch_diagnostic(
        &self,
        dir: &AbsolutePath,
        recorded: &str,
        current: &str,
        record_path: &Path,
    ) -> Diagnostic {
        let scripts = stored_scripts(&self.storage, dir);
        let listing = if scripts.is_empty() {
            "  (none found)".to_string()
        } else {
            scripts
                .iter()
                .map(|p| format!("  {}", p.display()))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Diagnostic::blocking(format!(
            "{dir} is not the directory its scripts were written for \
             (recorded inode {recorded}, found {current}); its scripts were skipped.\n\
             Stored scripts:\n{listing}\n\
             Review them, then either:\n  \
             cdhooks inode reset {dir}     (or: rm '{record}') to re-arm the check\n  \
             cdhooks inode disable {dir}   (or: echo {sentinel} > '{record}') to stop checking this directory",
            record = record_path.display(),
            sentinel = DISABLED_SENTINEL,
        ))
    }
}

/// Script files currently stored for `dir`, mirrored tree first, then legacy.
pub fn stored_scripts(storage: &StorageConfig, dir: &AbsolutePath) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(storage.mirrored_scripts_dir(dir))
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    for kind in ScriptKind::ALL {
        let legacy = StorageConfig::legacy_script_path(dir, kind);
        if legacy.is_file() {
            found.push(legacy);
        }
    }
    found
}

#[cfg(unix)]
pub fn identity_token(path: &Path) -> Option<String> {
    use std::os::unix::fs::MetadataExt;

    let metadata = std::fs::metadata(path).ok()?;
    metadata
        .is_dir()
        .then(|| format!("{}:{}", metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
pub fn identity_token(_path: &Path) -> Option<String> {
    None
}

fn read_record(path: &Path) -> Option<InodeRecord> {
    let content = std::fs::read_to_string(path).ok()?;
    InodeRecord::parse(&content)
}

fn write_record(path: &Path, record: &InodeRecord) -> Result<()> {
    let parent = path.parent().ok_or_else(|| CdhooksError::InvalidPath {
        path: path.display().to_string(),
        reason: "inode record has no parent directory".to_string(),
    })?;
    fs_err::create_dir_all(parent).map_err(|e| CdhooksError::io("creating inode dir", e))?;

    let mut temp_file =
        NamedTempFile::new_in(parent).map_err(|e| CdhooksError::io("inode temp file", e))?;
    writeln!(temp_file, "{}", record.as_str())
        .map_err(|e| CdhooksError::io("writing inode record", e))?;
    temp_file
        .persist(path)
        .map_err(|e| CdhooksError::io("persisting inode record", e.error))?;
    Ok(())
}
