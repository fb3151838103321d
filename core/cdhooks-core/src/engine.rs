//! The transition executor.
//!
//! ```text
//! transition(ctx, from, to, mode)
//!   │
//!   ├─ guard: Idle → Running        (duplicate trigger → skipped, no effects)
//!   ├─ plan:  reducer / reenter / exit
//!   ├─ leave each dir, deepest first
//!   │     chdir → leave script → drain hook queue
//!   ├─ enter each dir, shallowest first
//!   │     chdir → enter script
//!   ├─ chdir to `to` (unless it vanished)
//!   └─ guard: Running → Idle        (always, then persisted)
//! ```
//!
//! Nothing that happens to a single directory aborts the transition. Missing
//! directories, blocked scripts and failing scripts or hooks all become
//! diagnostics on the report.

use std::cell::RefCell;
use std::fmt;
use std::io;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{CdhooksError, Result};
use crate::inode::InodeGuard;
use crate::path_stack::AbsolutePath;
use crate::plan::{plan, plan_exit, plan_reenter, TransitionPlan};
use crate::script::{
    EnsureLayout, LayoutUpgrader, ScriptEvaluator, ScriptKind, ScriptReport, ScriptRunner,
    ShellEvaluator,
};
use crate::session::{SessionContext, SessionStore};
use crate::storage::StorageConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Navigation
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of the "active filesystem location".
pub trait Navigator {
    fn change_dir(&self, dir: &AbsolutePath) -> io::Result<()>;
    fn current_dir(&self) -> io::Result<AbsolutePath>;
}

/// Changes the working directory of this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessNavigator;

impl Navigator for ProcessNavigator {
    fn change_dir(&self, dir: &AbsolutePath) -> io::Result<()> {
        std::env::set_current_dir(dir.as_path())
    }

    fn current_dir(&self) -> io::Result<AbsolutePath> {
        let cwd = std::env::current_dir()?;
        AbsolutePath::from_path(&cwd).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Tracks a location without touching the process working directory.
///
/// Used when the real `cd` happens in a parent shell, and in tests. Changing
/// to a directory that does not exist fails like the real thing.
#[derive(Debug)]
pub struct VirtualNavigator {
    current: RefCell<AbsolutePath>,
    history: RefCell<Vec<AbsolutePath>>,
}

impl VirtualNavigator {
    pub fn new(start: AbsolutePath) -> Self {
        Self {
            current: RefCell::new(start),
            history: RefCell::new(Vec::new()),
        }
    }

    /// Every successful change, in order.
    pub fn history(&self) -> Vec<AbsolutePath> {
        self.history.borrow().clone()
    }
}

impl Default for VirtualNavigator {
    fn default() -> Self {
        Self::new(AbsolutePath::root())
    }
}

impl Navigator for VirtualNavigator {
    fn change_dir(&self, dir: &AbsolutePath) -> io::Result<()> {
        if !dir.as_path().is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", dir),
            ));
        }
        *self.current.borrow_mut() = dir.clone();
        self.history.borrow_mut().push(dir.clone());
        Ok(())
    }

    fn current_dir(&self) -> io::Result<AbsolutePath> {
        Ok(self.current.borrow().clone())
    }
}

impl<N: Navigator + ?Sized> Navigator for std::rc::Rc<N> {
    fn change_dir(&self, dir: &AbsolutePath) -> io::Result<()> {
        (**self).change_dir(dir)
    }

    fn current_dir(&self) -> io::Result<AbsolutePath> {
        (**self).current_dir()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionMode {
    #[default]
    Normal,
    /// Session is terminating: leave up to root, enter nothing.
    ExitOnly,
    /// Leave and enter `to` itself even when nothing changed.
    Reenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another transition already holds this session.
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// Directory is gone; its script step was skipped.
    DirectoryMissing,
    Completed {
        script: ScriptReport,
        hooks_run: usize,
        hooks_failed: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub dir: AbsolutePath,
    pub kind: ScriptKind,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionReport {
    pub plan: TransitionPlan,
    pub steps: Vec<StepReport>,
    /// Where the navigator was left, `None` when the destination vanished.
    pub final_location: Option<AbsolutePath>,
    pub skipped: Option<SkipReason>,
    pub diagnostics: Diagnostics,
}

impl TransitionReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn was_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

pub struct TransitionEngine {
    storage: StorageConfig,
    config: EngineConfig,
    store: Box<dyn SessionStore>,
    runner: ScriptRunner,
    navigator: Box<dyn Navigator>,
}

impl fmt::Debug for TransitionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("storage", &self.storage)
            .field("config", &self.config)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct TransitionEngineBuilder {
    storage: Option<StorageConfig>,
    config: Option<EngineConfig>,
    store: Option<Box<dyn SessionStore>>,
    evaluator: Option<Box<dyn ScriptEvaluator>>,
    navigator: Option<Box<dyn Navigator>>,
    upgrader: Option<Box<dyn LayoutUpgrader>>,
}

impl TransitionEngineBuilder {
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn session_store(mut self, store: impl SessionStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn evaluator(mut self, evaluator: impl ScriptEvaluator + 'static) -> Self {
        self.evaluator = Some(Box::new(evaluator));
        self
    }

    pub fn navigator(mut self, navigator: impl Navigator + 'static) -> Self {
        self.navigator = Some(Box::new(navigator));
        self
    }

    pub fn upgrader(mut self, upgrader: impl LayoutUpgrader + 'static) -> Self {
        self.upgrader = Some(Box::new(upgrader));
        self
    }

    /// Fails with `MissingDependency` when no session store was supplied.
    pub fn build(self) -> Result<TransitionEngine> {
        let store = self
            .store
            .ok_or_else(|| CdhooksError::missing_dependency("session store"))?;
        let storage = match self.storage {
            Some(storage) => storage,
            None => StorageConfig::resolve()?,
        };
        let config = self.config.unwrap_or_default();

        let evaluator = self
            .evaluator
            .unwrap_or_else(|| Box::new(ShellEvaluator::new(config.shell.clone())));
        let upgrader = self.upgrader.unwrap_or_else(|| Box::new(EnsureLayout));
        let guard = InodeGuard::new(storage.clone(), config.inode_check);
        let runner = ScriptRunner::new(
            storage.clone(),
            config.legacy_policy,
            guard,
            evaluator,
            upgrader,
        );

        Ok(TransitionEngine {
            storage,
            config,
            store,
            runner,
            navigator: self.navigator.unwrap_or_else(|| Box::new(ProcessNavigator)),
        })
    }
}

impl TransitionEngine {
    pub fn builder() -> TransitionEngineBuilder {
        TransitionEngineBuilder::default()
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    pub fn inode_guard(&self) -> &InodeGuard {
        self.runner.guard()
    }

    pub fn load_session(&self, id: impl Into<String>) -> Result<SessionContext> {
        SessionContext::load(self.store.as_ref(), id)
    }

    pub fn transition(
        &self,
        ctx: &mut SessionContext,
        from: &AbsolutePath,
        to: &AbsolutePath,
        mode: TransitionMode,
    ) -> Result<TransitionReport> {
        self.transition_with_args(ctx, from, to, mode, &[])
    }

    /// Like [`transition`](Self::transition), forwarding `args` to every script.
    pub fn transition_with_args(
        &self,
        ctx: &mut SessionContext,
        from: &AbsolutePath,
        to: &AbsolutePath,
        mode: TransitionMode,
        args: &[String],
    ) -> Result<TransitionReport> {
        // A transition in another process for this session is only visible on disk.
        let persisted = self.store.load(&ctx.id)?;
        if persisted.is_running() && !ctx.state.is_running() {
            ctx.state.guard = persisted.guard;
        }

        if !ctx.state.begin_transition(std::process::id()) {
            debug!(session = %ctx.id, from = %from, to = %to, "Transition already running, ignoring trigger");
            return Ok(TransitionReport::skipped(SkipReason::AlreadyRunning));
        }

        if let Err(e) = self.store.save(&ctx.id, &ctx.state) {
            ctx.state.end_transition();
            return Err(e);
        }

        let mut report = self.execute(ctx, from, to, mode, args);

        ctx.state.last_location = Some(to.clone());
        if mode == TransitionMode::ExitOnly {
            ctx.state.exited = true;
        }
        ctx.state.end_transition();
        // The scripts already ran; their report outranks a failed save.
        if let Err(e) = self.store.save(&ctx.id, &ctx.state) {
            warn!(session = %ctx.id, error = %e, "Failed to save session after transition");
            report.diagnostics.push(Diagnostic::warning(format!(
                "could not save session state: {}",
                e
            )));
        }

        Ok(report)
    }

    fn execute(
        &self,
        ctx: &mut SessionContext,
        from: &AbsolutePath,
        to: &AbsolutePath,
        mode: TransitionMode,
        args: &[String],
    ) -> TransitionReport {
        let plan = match mode {
            TransitionMode::Normal => plan(from, to),
            TransitionMode::ExitOnly => plan_exit(from),
            TransitionMode::Reenter => plan_reenter(to),
        };
        info!(
            session = %ctx.id,
            from = %from,
            to = %to,
            ?mode,
            leave = plan.leave.len(),
            enter = plan.enter.len(),
            "Transition"
        );

        ctx.hooks.reset();
        let mut diagnostics = Diagnostics::default();
        let mut steps = Vec::with_capacity(plan.leave.len() + plan.enter.len());

        for dir in &plan.leave {
            steps.push(self.leave_step(ctx, dir, args, &mut diagnostics));
        }
        for dir in &plan.enter {
            steps.push(self.enter_step(ctx, dir, args, &mut diagnostics));
        }

        let final_location = self.restore(to, &mut diagnostics);

        TransitionReport {
            plan,
            steps,
            final_location,
            skipped: None,
            diagnostics,
        }
    }

    fn leave_step(
        &self,
        ctx: &mut SessionContext,
        dir: &AbsolutePath,
        args: &[String],
        diagnostics: &mut Diagnostics,
    ) -> StepReport {
        if !self.activate(dir, ScriptKind::Leave, diagnostics) {
            return StepReport {
                dir: dir.clone(),
                kind: ScriptKind::Leave,
                status: StepStatus::DirectoryMissing,
            };
        }

        ctx.hooks.begin_leave(dir);
        let script = self
            .runner
            .run(dir, ScriptKind::Leave, &ctx.id, args, &mut ctx.hooks, diagnostics);
        ctx.hooks.end_leave();

        let outcomes = ctx.hooks.drain(dir);
        let mut hooks_failed = 0;
        for outcome in &outcomes {
            if let Err(reason) = &outcome.result {
                hooks_failed += 1;
                warn!(dir = %dir, hook = %outcome.label, %reason, "Leave hook failed");
                diagnostics.push(Diagnostic::warning(format!(
                    "leave hook `{}` for {} failed: {}",
                    outcome.label, dir, reason
                )));
            }
        }

        StepReport {
            dir: dir.clone(),
            kind: ScriptKind::Leave,
            status: StepStatus::Completed {
                script,
                hooks_run: outcomes.len(),
                hooks_failed,
            },
        }
    }

    fn enter_step(
        &self,
        ctx: &mut SessionContext,
        dir: &AbsolutePath,
        args: &[String],
        diagnostics: &mut Diagnostics,
    ) -> StepReport {
        if !self.activate(dir, ScriptKind::Enter, diagnostics) {
            return StepReport {
                dir: dir.clone(),
                kind: ScriptKind::Enter,
                status: StepStatus::DirectoryMissing,
            };
        }

        let script = self
            .runner
            .run(dir, ScriptKind::Enter, &ctx.id, args, &mut ctx.hooks, diagnostics);
        StepReport {
            dir: dir.clone(),
            kind: ScriptKind::Enter,
            status: StepStatus::Completed {
                script,
                hooks_run: 0,
                hooks_failed: 0,
            },
        }
    }

    /// Makes `dir` the active location. `false` means skip its script step.
    fn activate(&self, dir: &AbsolutePath, kind: ScriptKind, diagnostics: &mut Diagnostics) -> bool {
        match self.navigator.change_dir(dir) {
            Ok(()) => true,
            Err(e) => {
                debug!(dir = %dir, error = %e, "Directory unavailable, skipping");
                diagnostics.push(Diagnostic::info(format!(
                    "{} no longer exists; skipped its {} script",
                    dir, kind
                )));
                false
            }
        }
    }

    fn restore(&self, to: &AbsolutePath, diagnostics: &mut Diagnostics) -> Option<AbsolutePath> {
        match self.navigator.change_dir(to) {
            Ok(()) => Some(to.clone()),
            Err(e) => {
                warn!(dir = %to, error = %e, "Destination vanished during transition");
                diagnostics.push(Diagnostic::warning(format!(
                    "destination {} no longer exists",
                    to
                )));
                None
            }
        }
    }
}
