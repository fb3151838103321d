//! # cdhooks-core
//!
//! Directory transition engine: runs per-directory leave and enter scripts
//! whenever a shell session moves between directories.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. One transition runs to completion.
//! - **Not thread-safe**: Session state is threaded explicitly through calls
//!   as a [`SessionContext`]; callers provide their own synchronization.
//! - **Graceful degradation**: Missing or corrupt state files load as defaults.
//!   Per-directory failures become [`Diagnostic`]s, never aborted transitions.
//! - **Injected collaborators**: Session storage, script evaluation, navigation
//!   and layout upgrades are traits supplied to [`TransitionEngine::builder`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cdhooks_core::{
//!     AbsolutePath, EngineConfig, FileSessionStore, StorageConfig, TransitionEngine,
//!     TransitionMode,
//! };
//!
//! let storage = StorageConfig::resolve()?;
//! let engine = TransitionEngine::builder()
//!     .storage(storage.clone())
//!     .config(EngineConfig::from_env())
//!     .session_store(FileSessionStore::new(storage))
//!     .build()?;
//!
//! let mut ctx = engine.load_session("4242")?;
//! let report = engine.transition(
//!     &mut ctx,
//!     &"/home/u/src/a".parse()?,
//!     &"/home/u/src/b".parse()?,
//!     TransitionMode::Normal,
//! )?;
//! for diagnostic in report.diagnostics.visible(engine.config().quiet) {
//!     eprintln!("{diagnostic}");
//! }
//! ```

// Public modules
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod inode;
pub mod path_stack;
pub mod plan;
pub mod script;
pub mod session;
pub mod shell;
pub mod storage;
pub mod trigger;

#[cfg(test)]
mod testing;

// Re-export commonly used items at crate root
pub use config::{is_truthy, EngineConfig, LegacyPolicy};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use engine::{
    Navigator, ProcessNavigator, SkipReason, StepReport, StepStatus, TransitionEngine,
    TransitionEngineBuilder, TransitionMode, TransitionReport, VirtualNavigator,
};
pub use error::{CdhooksError, Result};
pub use hooks::{HookOutcome, HookQueue};
pub use inode::{InodeGuard, InodeRecord, InodeStatus, InodeVerdict};
pub use path_stack::{AbsolutePath, PathStack};
pub use plan::{plan, plan_exit, plan_reenter, TransitionPlan};
pub use script::{
    EnsureLayout, Execution, LayoutUpgrader, LegacyAction, ScriptEvaluator, ScriptInvocation,
    ScriptKind, ScriptReport, ScriptSource, ShellEvaluator,
};
pub use session::{
    FileSessionStore, GuardState, InMemorySessionStore, SessionContext, SessionState,
    SessionStore,
};
pub use shell::{posix_quote, Shell};
pub use storage::StorageConfig;
pub use trigger::{navigate, on_exit, on_prompt, on_start, NavigationOp};
