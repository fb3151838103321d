//! Storage configuration and path management for cdhooks.
//!
//! All on-disk locations are derived from a single base directory:
//!
//! ```text
//! ~/.cdhooks/
//! ├── scripts/<mirrored>/{enter.sh,leave.sh}   current-format scripts
//! ├── inodes/<mirrored>.inode                   inode guard records
//! ├── sessions/<id>.json                        per-shell session state
//! ├── templates/                                template subsystem (external)
//! ├── archive/                                  pre-upgrade originals (external)
//! └── logs/                                     tracing output
//! ```
//!
//! `<mirrored>` is the target directory's path without its leading `/`, so
//! `/home/u/src` maps to `scripts/home/u/src/`. Root maps to `scripts/` itself.
//!
//! Legacy scripts live inside the target directory as `.enter.sh` / `.leave.sh`.

use std::path::{Path, PathBuf};

use crate::error::{CdhooksError, Result};
use crate::path_stack::AbsolutePath;
use crate::script::ScriptKind;

/// Environment variable that overrides the base directory.
pub const HOME_ENV: &str = "CDHOOKS_HOME";

const DEFAULT_DIR_NAME: &str = ".cdhooks";
const INODE_EXTENSION: &str = "inode";

/// Central configuration for all cdhooks storage paths.
///
/// Production code uses [`StorageConfig::resolve`], which honors `CDHOOKS_HOME`.
/// Tests use [`StorageConfig::with_root`] for isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the base directory from `CDHOOKS_HOME`, falling back to `~/.cdhooks`.
    pub fn resolve() -> Result<Self> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(custom) = lookup(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(custom)));
        }
        let home = dirs::home_dir().ok_or(CdhooksError::HomeDirNotFound)?;
        Ok(Self::with_root(home.join(DEFAULT_DIR_NAME)))
    }

    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn inodes_dir(&self) -> PathBuf {
        self.root.join("inodes")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Per-Directory Paths
    // ─────────────────────────────────────────────────────────────────────────────

    /// Mirrored script directory for a target directory.
    /// Example: /home/u/src -> ~/.cdhooks/scripts/home/u/src
    pub fn mirrored_scripts_dir(&self, dir: &AbsolutePath) -> PathBuf {
        Self::mirror_under(&self.scripts_dir(), dir)
    }

    /// Current-format script for a directory.
    /// Example: ~/.cdhooks/scripts/home/u/src/enter.sh
    pub fn script_path(&self, dir: &AbsolutePath, kind: ScriptKind) -> PathBuf {
        self.mirrored_scripts_dir(dir).join(kind.file_name())
    }

    /// Legacy script stored inside the target directory itself.
    /// Example: /home/u/src/.enter.sh
    pub fn legacy_script_path(dir: &AbsolutePath, kind: ScriptKind) -> PathBuf {
        dir.as_path().join(kind.legacy_file_name())
    }

    /// Inode record for a directory.
    /// Example: ~/.cdhooks/inodes/home/u/src.inode, root -> ~/.cdhooks/inodes/.inode
    pub fn inode_path(&self, dir: &AbsolutePath) -> PathBuf {
        if dir.is_root() {
            return self.inodes_dir().join(format!(".{}", INODE_EXTENSION));
        }
        let mirrored = Self::mirror_under(&self.inodes_dir(), dir);
        let mut file_name = mirrored
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".");
        file_name.push(INODE_EXTENSION);
        mirrored.with_file_name(file_name)
    }

    /// Session state file for a shell session.
    pub fn session_file(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.json", session_id))
    }

    fn mirror_under(base: &Path, dir: &AbsolutePath) -> PathBuf {
        dir.segments().fold(base.to_path_buf(), |acc, seg| acc.join(seg))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directory Creation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Ensures the root directory and standard subdirectories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.root)?;
        fs_err::create_dir_all(self.scripts_dir())?;
        fs_err::create_dir_all(self.inodes_dir())?;
        fs_err::create_dir_all(self.sessions_dir())?;
        fs_err::create_dir_all(self.templates_dir())?;
        fs_err::create_dir_all(self.archive_dir())?;
        Ok(())
    }
}
