//! Trigger adapters: the three ways a transition gets started.
//!
//! - [`navigate`]: an explicit `cd` / `pushd` / `popd`. The OS change happens
//!   first; if it fails nothing else does.
//! - [`on_prompt`]: the automatic hook after each prompt or directory change.
//!   Skips when the location has not moved since the last transition.
//! - [`on_exit`]: session termination. Leaves everything up to root once.
//!
//! [`on_start`] clears whatever an earlier shell with the same id left behind.

use std::io;

use tracing::debug;

use crate::engine::{TransitionEngine, TransitionMode, TransitionReport};
use crate::error::{CdhooksError, Result};
use crate::path_stack::AbsolutePath;
use crate::session::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOp {
    Change(AbsolutePath),
    /// Saves the current location on the session's directory stack first.
    Push(AbsolutePath),
    /// Returns to the most recently pushed location.
    Pop,
}

pub fn navigate(
    engine: &TransitionEngine,
    ctx: &mut SessionContext,
    op: NavigationOp,
    args: &[String],
) -> Result<TransitionReport> {
    let navigator = engine.navigator();
    let from = navigator
        .current_dir()
        .map_err(|e| CdhooksError::io("reading current directory", e))?;

    let to = match op {
        NavigationOp::Change(target) => {
            change(engine, &target)?;
            target
        }
        NavigationOp::Push(target) => {
            change(engine, &target)?;
            ctx.state.dir_stack.push(from.clone());
            target
        }
        NavigationOp::Pop => {
            let target = ctx.state.dir_stack.last().cloned().ok_or_else(|| {
                CdhooksError::NavigationFailure {
                    path: from.as_path().to_path_buf(),
                    source: io::Error::other("directory stack empty"),
                }
            })?;
            change(engine, &target)?;
            ctx.state.dir_stack.pop();
            target
        }
    };

    engine.transition_with_args(ctx, &from, &to, TransitionMode::Normal, args)
}

fn change(engine: &TransitionEngine, target: &AbsolutePath) -> Result<()> {
    engine
        .navigator()
        .change_dir(target)
        .map_err(|source| CdhooksError::NavigationFailure {
            path: target.as_path().to_path_buf(),
            source,
        })
}

/// Returns `None` when `cwd` is where the last transition already ended.
pub fn on_prompt(
    engine: &TransitionEngine,
    ctx: &mut SessionContext,
    cwd: &AbsolutePath,
) -> Result<Option<TransitionReport>> {
    if ctx.state.last_location.as_ref() == Some(cwd) {
        debug!(session = %ctx.id, cwd = %cwd, "Location unchanged, no transition");
        return Ok(None);
    }

    let from = ctx
        .state
        .last_location
        .clone()
        .unwrap_or_else(AbsolutePath::root);
    engine
        .transition(ctx, &from, cwd, TransitionMode::Normal)
        .map(Some)
}

/// Runs the exit transition at most once, then forgets the session.
pub fn on_exit(
    engine: &TransitionEngine,
    ctx: &mut SessionContext,
    cwd: &AbsolutePath,
) -> Result<Option<TransitionReport>> {
    if ctx.state.exited {
        debug!(session = %ctx.id, "Session already exited");
        return Ok(None);
    }

    let report = engine.transition(ctx, cwd, &AbsolutePath::root(), TransitionMode::ExitOnly)?;
    if !report.was_skipped() {
        engine.store().remove(&ctx.id)?;
    }
    Ok(Some(report))
}

/// Fresh session for a shell that is just starting.
pub fn on_start(engine: &TransitionEngine, id: impl Into<String>) -> Result<SessionContext> {
    let ctx = SessionContext::new(id);
    engine.store().remove(&ctx.id)?;
    Ok(ctx)
}
