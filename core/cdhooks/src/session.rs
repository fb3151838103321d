//! Transition triggers coming from the shell.
//!
//! The shell has already changed directory by the time these run, so the
//! engine only walks the plan; this process's own working directory follows
//! along so each script starts in its directory.
//!
//! ## Usage
//!
//! ```bash
//! cdhooks transition --session $$ --from "$OLDPWD" --to "$PWD"
//! cdhooks prompt --session $$ --cwd "$PWD"
//! cdhooks exit --session $$ --cwd "$PWD"
//! ```

use cdhooks_core::script::SESSION_ENV;
use cdhooks_core::{
    on_exit, on_prompt, on_start, AbsolutePath, EngineConfig, FileSessionStore, ProcessNavigator,
    Result, StorageConfig, TransitionEngine, TransitionMode, TransitionReport,
};

pub fn transition(
    from: &str,
    to: &str,
    session: Option<String>,
    reenter: bool,
    args: &[String],
) -> Result<()> {
    let from = AbsolutePath::parse(from)?;
    let to = AbsolutePath::parse(to)?;
    let mode = if reenter {
        TransitionMode::Reenter
    } else {
        TransitionMode::Normal
    };

    let engine = build_engine()?;
    let mut ctx = engine.load_session(session_id(session))?;
    let report = engine.transition_with_args(&mut ctx, &from, &to, mode, args)?;
    print_diagnostics(&engine, &report);
    Ok(())
}

pub fn prompt(cwd: &str, session: Option<String>) -> Result<()> {
    let cwd = AbsolutePath::parse(cwd)?;
    let engine = build_engine()?;
    let mut ctx = engine.load_session(session_id(session))?;
    if let Some(report) = on_prompt(&engine, &mut ctx, &cwd)? {
        print_diagnostics(&engine, &report);
    }
    Ok(())
}

pub fn exit(cwd: &str, session: Option<String>) -> Result<()> {
    let cwd = AbsolutePath::parse(cwd)?;
    let engine = build_engine()?;
    let mut ctx = engine.load_session(session_id(session))?;
    if let Some(report) = on_exit(&engine, &mut ctx, &cwd)? {
        print_diagnostics(&engine, &report);
    }
    Ok(())
}

pub fn start(session: Option<String>) -> Result<()> {
    let engine = build_engine()?;
    on_start(&engine, session_id(session))?;
    Ok(())
}

fn build_engine() -> Result<TransitionEngine> {
    let storage = StorageConfig::resolve()?;
    TransitionEngine::builder()
        .storage(storage.clone())
        .config(EngineConfig::from_env())
        .session_store(FileSessionStore::new(storage))
        .navigator(ProcessNavigator)
        .build()
}

fn print_diagnostics(engine: &TransitionEngine, report: &TransitionReport) {
    for diagnostic in report.diagnostics.visible(engine.config().quiet) {
        eprintln!("{}", diagnostic);
    }
}

/// `--session`, then the session of the script we were started from, then
/// the shell that invoked us.
fn session_id(explicit: Option<String>) -> String {
    pick_session_id(explicit, std::env::var(SESSION_ENV).ok())
        .unwrap_or_else(|| unsafe { libc::getppid() }.to_string())
}

fn pick_session_id(explicit: Option<String>, inherited: Option<String>) -> Option<String> {
    explicit
        .into_iter()
        .chain(inherited)
        .find(|id| !id.trim().is_empty())
}
