//! Common-ancestor reduction of two path stacks into a transition plan.
//!
//! ```text
//! from  /a/b/c   stack [/a/b/c, /a/b, /a, /]
//! to    /a/x     stack [/a/x, /a, /]
//!                       shared tail [/a, /] is dropped from both
//! leave [/a/b/c, /a/b]          deepest first
//! enter [/a/x]                  shallowest first
//! ```
//!
//! The common ancestor is never part of either list. The only way a directory
//! appears in both lists is a forced re-enter ([`plan_reenter`]).

use serde::Serialize;

use crate::path_stack::{AbsolutePath, PathStack};

/// Ordered directories to leave and to enter for one transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionPlan {
    /// Deepest first, starting at the old location.
    pub leave: Vec<AbsolutePath>,
    /// Shallowest first, ending at the new location.
    pub enter: Vec<AbsolutePath>,
}

impl TransitionPlan {
    pub fn is_empty(&self) -> bool {
        self.leave.is_empty() && self.enter.is_empty()
    }
}

/// Drops the shared root-most tail of both stacks.
///
/// What is left of `from` is the leave list as-is; what is left of `to` is
/// reversed so that entering walks down from the common ancestor.
pub fn reduce(from: PathStack, to: PathStack) -> TransitionPlan {
    let mut leave = from.into_vec();
    let mut enter = to.into_vec();

    while let (Some(a), Some(b)) = (leave.last(), enter.last()) {
        if a != b {
            break;
        }
        leave.pop();
        enter.pop();
    }

    enter.reverse();
    TransitionPlan { leave, enter }
}

/// Plan for an ordinary navigation. Identical endpoints yield an empty plan.
pub fn plan(from: &AbsolutePath, to: &AbsolutePath) -> TransitionPlan {
    reduce(PathStack::build(from), PathStack::build(to))
}

/// Plan that leaves and re-enters `dir` itself.
///
/// Routed through the parent so the reducer produces `[dir]` on both sides
/// instead of collapsing to a no-op.
pub fn plan_reenter(dir: &AbsolutePath) -> TransitionPlan {
    match dir.parent() {
        Some(parent) => TransitionPlan {
            leave: plan(dir, &parent).leave,
            enter: plan(&parent, dir).enter,
        },
        None => TransitionPlan {
            leave: vec![dir.clone()],
            enter: vec![dir.clone()],
        },
    }
}

/// Plan for a terminating session: leave everything up to root, enter nothing.
pub fn plan_exit(from: &AbsolutePath) -> TransitionPlan {
    TransitionPlan {
        leave: plan(from, &AbsolutePath::root()).leave,
        enter: Vec::new(),
    }
}
