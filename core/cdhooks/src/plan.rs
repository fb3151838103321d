//! `cdhooks plan`: show a transition plan without running scripts.

use cdhooks_core::{plan, plan_exit, plan_reenter, AbsolutePath, CdhooksError, Result, TransitionPlan};

pub fn run(from: &str, to: Option<&str>, reenter: bool, exit: bool, json: bool) -> Result<()> {
    let from = AbsolutePath::parse(from)?;
    let to = match to {
        Some(raw) => AbsolutePath::parse(raw)?,
        None => AbsolutePath::root(),
    };

    let plan = if exit {
        plan_exit(&from)
    } else if reenter {
        plan_reenter(&to)
    } else {
        plan(&from, &to)
    };

    if json {
        let rendered = serde_json::to_string_pretty(&plan).map_err(|e| CdhooksError::Json {
            context: "serializing plan".to_string(),
            source: e,
        })?;
        println!("{}", rendered);
    } else {
        print!("{}", render(&plan));
    }
    Ok(())
}

fn render(plan: &TransitionPlan) -> String {
    let mut out = String::new();
    for (label, dirs) in [("leave", &plan.leave), ("enter", &plan.enter)] {
        out.push_str(label);
        out.push_str(":\n");
        for dir in dirs {
            out.push_str("  ");
            out.push_str(dir.as_str());
            out.push('\n');
        }
    }
    out
}
