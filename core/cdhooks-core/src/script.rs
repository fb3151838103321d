//! Locating and running one directory's enter or leave script.
//!
//! # Resolution Order
//!
//! 1. A legacy in-directory script (`<dir>/.enter.sh`) is handled per
//!    [`LegacyPolicy`]. First contact with a legacy script whose mirrored tree
//!    does not exist yet triggers the layout upgrade collaborator first. The
//!    upgrade creates that tree, so it runs once per directory.
//! 2. A current-format script (`scripts/<mirrored>/enter.sh`) runs if the
//!    inode guard agrees.
//!
//! `run-legacy` makes the legacy script authoritative and skips step 2.
//! `auto-migrate` moves it into the current script and then falls through to
//! step 2. `warn-only` leaves it alone and still runs step 2.
//!
//! # Execution Contract
//!
//! Every `__PATH__` in the script text becomes the directory's literal path.
//! The text is then handed to a [`ScriptEvaluator`] along with the caller's
//! positional arguments and the directory as working directory. The session
//! id travels with it, so a `cdhooks` call made from inside a script lands on
//! the same session and sees its running guard.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{LegacyPolicy, AUTOMIGRATE_ENV, LEGACY_ENV};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{CdhooksError, Result};
use crate::hooks::HookQueue;
use crate::inode::{InodeGuard, InodeVerdict};
use crate::path_stack::AbsolutePath;
use crate::storage::StorageConfig;

/// Token replaced by the directory's path before a script runs.
pub const PATH_PLACEHOLDER: &str = "__PATH__";

/// Set for leave scripts run by [`ShellEvaluator`]; each line appended to this
/// file becomes a one-shot leave hook.
pub const LEAVE_HOOKS_ENV: &str = "CDHOOKS_LEAVE_HOOKS";
pub const DIR_ENV: &str = "CDHOOKS_DIR";
/// Session id of the transition running the script.
pub const SESSION_ENV: &str = "CDHOOKS_SESSION";
pub const KIND_ENV: &str = "CDHOOKS_KIND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Enter,
    Leave,
}

impl ScriptKind {
    pub const ALL: [ScriptKind; 2] = [ScriptKind::Enter, ScriptKind::Leave];

    pub fn file_name(self) -> &'static str {
        match self {
            ScriptKind::Enter => "enter.sh",
            ScriptKind::Leave => "leave.sh",
        }
    }

    pub fn legacy_file_name(self) -> &'static str {
        match self {
            ScriptKind::Enter => ".enter.sh",
            ScriptKind::Leave => ".leave.sh",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScriptKind::Enter => "enter",
            ScriptKind::Leave => "leave",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptSource {
    Current,
    Legacy,
}

/// Fully prepared script, ready for an evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub dir: AbsolutePath,
    pub kind: ScriptKind,
    pub source: ScriptSource,
    pub script_path: PathBuf,
    pub session: String,
    /// Script text after placeholder substitution.
    pub text: String,
    pub args: Vec<String>,
}

/// Runs prepared script text. Leave scripts may register hooks on `hooks`.
pub trait ScriptEvaluator {
    /// Returns the exit code, `None` when terminated by a signal. Problems
    /// after the script has exited go to `diagnostics`, not the error.
    fn evaluate(
        &self,
        invocation: &ScriptInvocation,
        hooks: &mut HookQueue,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<i32>>;
}

/// Runs scripts with `<shell> -c <text> cdhooks <args..>` in the script's directory.
#[derive(Debug, Clone)]
pub struct ShellEvaluator {
    shell: String,
}

impl ShellEvaluator {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    fn collect_leave_hooks(
        &self,
        hook_file: &Path,
        invocation: &ScriptInvocation,
        hooks: &mut HookQueue,
    ) -> Result<()> {
        let content = fs_err::read_to_string(hook_file)
            .map_err(|e| CdhooksError::io("reading leave hooks", e))?;

        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let shell = self.shell.clone();
            let workdir = invocation.dir.as_path().to_path_buf();
            let session = invocation.session.clone();
            let command = line.to_string();
            hooks.register(line, move || {
                run_hook_command(&shell, &workdir, &session, &command)
            })?;
        }
        Ok(())
    }
}

impl ScriptEvaluator for ShellEvaluator {
    fn evaluate(
        &self,
        invocation: &ScriptInvocation,
        hooks: &mut HookQueue,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<i32>> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&invocation.text)
            .arg("cdhooks")
            .args(&invocation.args)
            .current_dir(invocation.dir.as_path())
            .env(DIR_ENV, invocation.dir.as_str())
            .env(KIND_ENV, invocation.kind.as_str())
            .env(SESSION_ENV, &invocation.session);

        let hook_file = if invocation.kind == ScriptKind::Leave {
            let file = tempfile::Builder::new()
                .prefix("cdhooks-leave-")
                .tempfile()
                .map_err(|e| CdhooksError::io("creating leave hook file", e))?;
            cmd.env(LEAVE_HOOKS_ENV, file.path());
            Some(file)
        } else {
            cmd.env_remove(LEAVE_HOOKS_ENV);
            None
        };

        let status = cmd.status().map_err(|e| CdhooksError::CommandFailed {
            command: format!("{} -c <{} script>", self.shell, invocation.kind),
            details: e.to_string(),
        })?;

        if let Some(file) = hook_file {
            if let Err(e) = self.collect_leave_hooks(file.path(), invocation, hooks) {
                warn!(dir = %invocation.dir, error = %e, "Could not collect leave hooks");
                diagnostics.push(Diagnostic::warning(format!(
                    "leave hooks for {} were not registered: {}",
                    invocation.dir, e
                )));
            }
        }

        Ok(status.code())
    }
}

fn run_hook_command(
    shell: &str,
    workdir: &Path,
    session: &str,
    command: &str,
) -> std::result::Result<(), String> {
    let status = Command::new(shell)
        .arg("-c")
        .arg(command)
        .current_dir(workdir)
        .env(SESSION_ENV, session)
        .env_remove(LEAVE_HOOKS_ENV)
        .status()
        .map_err(|e| format!("failed to start: {}", e))?;
    if status.success() {
        Ok(())
    } else {
        Err(match status.code() {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        })
    }
}

/// On-disk layout upgrade, triggered on first legacy contact with `dir`.
///
/// The runner treats a missing mirrored tree for `dir` as first contact, so an
/// upgrader that leaves it missing runs again on the next visit.
pub trait LayoutUpgrader {
    fn upgrade(&self, storage: &StorageConfig, dir: &AbsolutePath) -> Result<()>;
}

/// Creates the standard base-directory layout and the directory's mirrored tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsureLayout;

impl LayoutUpgrader for EnsureLayout {
    fn upgrade(&self, storage: &StorageConfig, dir: &AbsolutePath) -> Result<()> {
        storage
            .ensure_dirs()
            .map_err(|e| CdhooksError::io("creating base layout", e))?;
        fs_err::create_dir_all(storage.mirrored_scripts_dir(dir))
            .map_err(|e| CdhooksError::io("creating script dir", e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyAction {
    Ran,
    Migrated,
    MigrationFailed,
    Warned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Execution {
    NoScript,
    Ran {
        source: ScriptSource,
        exit_code: Option<i32>,
    },
    Failed {
        source: ScriptSource,
        reason: String,
    },
    Blocked,
}

impl Execution {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            Execution::NoScript
                | Execution::Ran {
                    exit_code: Some(0),
                    ..
                }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptReport {
    pub legacy: Option<LegacyAction>,
    pub execution: Execution,
}

pub fn substitute_placeholder(text: &str, dir: &AbsolutePath) -> String {
    text.replace(PATH_PLACEHOLDER, dir.as_str())
}

pub struct ScriptRunner {
    storage: StorageConfig,
    policy: LegacyPolicy,
    guard: InodeGuard,
    evaluator: Box<dyn ScriptEvaluator>,
    upgrader: Box<dyn LayoutUpgrader>,
}

impl fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("storage", &self.storage)
            .field("policy", &self.policy)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl ScriptRunner {
    pub fn new(
        storage: StorageConfig,
        policy: LegacyPolicy,
        guard: InodeGuard,
        evaluator: Box<dyn ScriptEvaluator>,
        upgrader: Box<dyn LayoutUpgrader>,
    ) -> Self {
        Self {
            storage,
            policy,
            guard,
            evaluator,
            upgrader,
        }
    }

    pub fn guard(&self) -> &InodeGuard {
        &self.guard
    }

    pub fn run(
        &self,
        dir: &AbsolutePath,
        kind: ScriptKind,
        session: &str,
        args: &[String],
        hooks: &mut HookQueue,
        diagnostics: &mut Diagnostics,
    ) -> ScriptReport {
        let legacy_path = StorageConfig::legacy_script_path(dir, kind);
        let mut legacy = None;

        if legacy_path.is_file() {
            if !self.storage.mirrored_scripts_dir(dir).exists() {
                debug!(dir = %dir, "First legacy contact, upgrading layout");
                if let Err(e) = self.upgrader.upgrade(&self.storage, dir) {
                    warn!(error = %e, "Layout upgrade failed");
                    diagnostics.push(Diagnostic::warning(format!("layout upgrade failed: {}", e)));
                }
            }

            match self.policy {
                LegacyPolicy::RunLegacy => {
                    let execution = self.execute(
                        dir,
                        kind,
                        ScriptSource::Legacy,
                        &legacy_path,
                        session,
                        args,
                        hooks,
                        diagnostics,
                    );
                    return ScriptReport {
                        legacy: Some(LegacyAction::Ran),
                        execution,
                    };
                }
                LegacyPolicy::AutoMigrate => {
                    legacy = Some(self.migrate(dir, kind, &legacy_path, diagnostics));
                }
                LegacyPolicy::WarnOnly => {
                    diagnostics.push(self.legacy_warning(dir, kind, &legacy_path));
                    legacy = Some(LegacyAction::Warned);
                }
            }
        }

        let current_path = self.storage.script_path(dir, kind);
        if !current_path.is_file() {
            return ScriptReport {
                legacy,
                execution: Execution::NoScript,
            };
        }

        if let InodeVerdict::Blocked { diagnostic } = self.guard.check(dir) {
            diagnostics.push(diagnostic);
            return ScriptReport {
                legacy,
                execution: Execution::Blocked,
            };
        }

        let execution = self.execute(
            dir,
            kind,
            ScriptSource::Current,
            &current_path,
            session,
            args,
            hooks,
            diagnostics,
        );
        ScriptReport { legacy, execution }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        dir: &AbsolutePath,
        kind: ScriptKind,
        source: ScriptSource,
        script_path: &Path,
        session: &str,
        args: &[String],
        hooks: &mut HookQueue,
        diagnostics: &mut Diagnostics,
    ) -> Execution {
        let content = match fs_err::read_to_string(script_path) {
            Ok(content) => content,
            Err(e) => {
                diagnostics.push(Diagnostic::warning(format!(
                    "cannot read {} script for {}: {}",
                    kind, dir, e
                )));
                return Execution::Failed {
                    source,
                    reason: e.to_string(),
                };
            }
        };

        let invocation = ScriptInvocation {
            dir: dir.clone(),
            kind,
            source,
            script_path: script_path.to_path_buf(),
            session: session.to_string(),
            text: substitute_placeholder(&content, dir),
            args: args.to_vec(),
        };

        info!(dir = %dir, kind = %kind, ?source, "Running script");
        match self.evaluator.evaluate(&invocation, hooks, diagnostics) {
            Ok(Some(0)) => Execution::Ran {
                source,
                exit_code: Some(0),
            },
            Ok(exit_code) => {
                let status = exit_code
                    .map(|c| format!("status {}", c))
                    .unwrap_or_else(|| "a signal".to_string());
                diagnostics.push(Diagnostic::warning(format!(
                    "{} script for {} exited with {}",
                    kind, dir, status
                )));
                Execution::Ran { source, exit_code }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::warning(format!(
                    "{} script for {} failed: {}",
                    kind, dir, e
                )));
                Execution::Failed {
                    source,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Appends the legacy script to the current one, then deletes the legacy file.
    /// Each half is reported on its own; nothing is retried or rolled back.
    fn migrate(
        &self,
        dir: &AbsolutePath,
        kind: ScriptKind,
        legacy_path: &Path,
        diagnostics: &mut Diagnostics,
    ) -> LegacyAction {
        let current_path = self.storage.script_path(dir, kind);

        if let Err(e) = append_script(legacy_path, &current_path) {
            warn!(dir = %dir, error = %e, "Legacy migration append failed");
            diagnostics.push(Diagnostic::warning(format!(
                "could not migrate {} into {}: {}",
                legacy_path.display(),
                current_path.display(),
                e
            )));
            return LegacyAction::MigrationFailed;
        }

        if let Err(e) = fs_err::remove_file(legacy_path) {
            warn!(dir = %dir, error = %e, "Legacy migration delete failed");
            diagnostics.push(Diagnostic::warning(format!(
                "migrated {} into {} but could not delete it: {}; remove it by hand",
                legacy_path.display(),
                current_path.display(),
                e
            )));
            return LegacyAction::MigrationFailed;
        }

        diagnostics.push(Diagnostic::info(format!(
            "migrated {} to {}",
            legacy_path.display(),
            current_path.display()
        )));
        LegacyAction::Migrated
    }

    fn legacy_warning(&self, dir: &AbsolutePath, kind: ScriptKind, legacy_path: &Path) -> Diagnostic {
        let current_path = self.storage.script_path(dir, kind);
        let mirrored = self.storage.mirrored_scripts_dir(dir);
        Diagnostic::warning(format!(
            "found legacy {kind} script {legacy} (not run). To migrate it:\n  \
             mkdir -p '{mirrored}' && cat '{legacy}' >> '{current}' && rm '{legacy}'\n\
             or set {auto}=1 to migrate automatically, or {run}=1 to run legacy scripts in place (unsafe)",
            legacy = legacy_path.display(),
            mirrored = mirrored.display(),
            current = current_path.display(),
            auto = AUTOMIGRATE_ENV,
            run = LEGACY_ENV,
        ))
    }
}

fn append_script(legacy_path: &Path, current_path: &Path) -> Result<()> {
    let content =
        fs_err::read_to_string(legacy_path).map_err(|e| CdhooksError::io("reading legacy script", e))?;

    if let Some(parent) = current_path.parent() {
        fs_err::create_dir_all(parent).map_err(|e| CdhooksError::io("creating script dir", e))?;
    }

    let needs_separator = std::fs::read(current_path)
        .map(|existing| !existing.is_empty() && !existing.ends_with(b"\n"))
        .unwrap_or(false);

    let mut file = fs_err::OpenOptions::new()
        .create(true)
        .append(true)
        .open(current_path)
        .map_err(|e| CdhooksError::io("opening current script", e))?;
    if needs_separator {
        file.write_all(b"\n")
            .map_err(|e| CdhooksError::io("appending to current script", e))?;
    }
    file.write_all(content.as_bytes())
        .map_err(|e| CdhooksError::io("appending to current script", e))?;
    Ok(())
}
