//! One-shot callbacks registered by a leave script and run right after it.
//!
//! The queue only accepts registrations while a leave script is executing
//! (the executor brackets each leave step with `begin_leave`/`end_leave`).
//! Entries are captured closures, so nothing is re-parsed at drain time.

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::error::{CdhooksError, Result};
use crate::path_stack::AbsolutePath;

pub type LeaveHook = Box<dyn FnOnce() -> std::result::Result<(), String>>;

struct QueuedHook {
    label: String,
    run: LeaveHook,
}

/// Result of running one drained hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    pub dir: AbsolutePath,
    pub label: String,
    pub result: std::result::Result<(), String>,
}

#[derive(Default)]
pub struct HookQueue {
    leaving: Option<AbsolutePath>,
    entries: VecDeque<QueuedHook>,
}

impl fmt::Debug for HookQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookQueue")
            .field("leaving", &self.leaving)
            .field(
                "entries",
                &self.entries.iter().map(|e| &e.label).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl HookQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory whose leave script is currently executing, if any.
    pub fn leaving(&self) -> Option<&AbsolutePath> {
        self.leaving.as_ref()
    }

    pub fn register<F>(&mut self, label: impl Into<String>, hook: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<(), String> + 'static,
    {
        if self.leaving.is_none() {
            return Err(CdhooksError::HookOutsideLeave);
        }
        let label = label.into();
        debug!(label = %label, "Registered leave hook");
        self.entries.push_back(QueuedHook {
            label,
            run: Box::new(hook),
        });
        Ok(())
    }

    /// Runs and removes every queued hook in registration order.
    ///
    /// Hooks registered while draining are not accepted: the leave window is
    /// already closed by the time the executor drains.
    pub fn drain(&mut self, dir: &AbsolutePath) -> Vec<HookOutcome> {
        let mut outcomes = Vec::with_capacity(self.entries.len());
        while let Some(entry) = self.entries.pop_front() {
            let result = (entry.run)();
            outcomes.push(HookOutcome {
                dir: dir.clone(),
                label: entry.label,
                result,
            });
        }
        outcomes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops queued hooks without running them and closes any open leave window.
    pub fn reset(&mut self) {
        self.leaving = None;
        self.entries.clear();
    }

    pub(crate) fn begin_leave(&mut self, dir: &AbsolutePath) {
        self.leaving = Some(dir.clone());
    }

    pub(crate) fn end_leave(&mut self) {
        self.leaving = None;
    }
}
