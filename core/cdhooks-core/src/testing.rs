//! Test doubles shared by unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::hooks::HookQueue;
use crate::path_stack::AbsolutePath;
use crate::script::{ScriptEvaluator, ScriptInvocation, ScriptKind};

#[derive(Default)]
struct Recorded {
    calls: Vec<ScriptInvocation>,
    events: Vec<String>,
    exits: HashMap<(AbsolutePath, ScriptKind), Option<i32>>,
    hooks: HashMap<AbsolutePath, Vec<(String, bool)>>,
}

/// Records invocations instead of running them. Clones share state.
#[derive(Clone, Default)]
pub struct RecordingEvaluator {
    inner: Rc<RefCell<Recorded>>,
}

impl RecordingEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ScriptInvocation> {
        self.inner.borrow().calls.clone()
    }

    /// `"enter <dir>"`, `"leave <dir>"` and `"hook <label>"` in execution order.
    pub fn events(&self) -> Vec<String> {
        self.inner.borrow().events.clone()
    }

    pub fn set_exit(&self, dir: &AbsolutePath, kind: ScriptKind, code: Option<i32>) {
        self.inner
            .borrow_mut()
            .exits
            .insert((dir.clone(), kind), code);
    }

    /// The leave script of `dir` will register a hook named `label`.
    pub fn register_hook_on(&self, dir: &AbsolutePath, label: &str) {
        self.queue_hook(dir, label, true);
    }

    pub fn register_failing_hook_on(&self, dir: &AbsolutePath, label: &str) {
        self.queue_hook(dir, label, false);
    }

    fn queue_hook(&self, dir: &AbsolutePath, label: &str, succeeds: bool) {
        self.inner
            .borrow_mut()
            .hooks
            .entry(dir.clone())
            .or_default()
            .push((label.to_string(), succeeds));
    }
}

impl ScriptEvaluator for RecordingEvaluator {
    fn evaluate(
        &self,
        invocation: &ScriptInvocation,
        hooks: &mut HookQueue,
        _diagnostics: &mut Diagnostics,
    ) -> Result<Option<i32>> {
        let (exit, planned) = {
            let mut recorded = self.inner.borrow_mut();
            recorded.calls.push(invocation.clone());
            recorded
                .events
                .push(format!("{} {}", invocation.kind, invocation.dir));
            let exit = recorded
                .exits
                .get(&(invocation.dir.clone(), invocation.kind))
                .copied()
                .unwrap_or(Some(0));
            let planned = if invocation.kind == ScriptKind::Leave {
                recorded.hooks.get(&invocation.dir).cloned().unwrap_or_default()
            } else {
                Vec::new()
            };
            (exit, planned)
        };

        for (label, succeeds) in planned {
            let inner = Rc::clone(&self.inner);
            let event = format!("hook {}", label);
            hooks.register(label, move || {
                inner.borrow_mut().events.push(event);
                if succeeds {
                    Ok(())
                } else {
                    Err("exited with status 1".to_string())
                }
            })?;
        }
        Ok(exit)
    }
}
