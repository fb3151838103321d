//! `cdhooks inode`: the remediation commands named by a blocked transition.

use cdhooks_core::inode::stored_scripts;
use cdhooks_core::{
    AbsolutePath, CdhooksError, InodeGuard, InodeRecord, InodeStatus, Result, StorageConfig,
};

pub fn status(dir: Option<&str>) -> Result<()> {
    let (storage, dir) = resolve(dir)?;
    let guard = InodeGuard::new(storage.clone(), true);
    print!("{}", render_status(&dir, &guard.status(&dir)));

    let scripts = stored_scripts(&storage, &dir);
    if !scripts.is_empty() {
        println!("scripts:");
        for script in scripts {
            println!("  {}", script.display());
        }
    }
    Ok(())
}

pub fn reset(dir: Option<&str>) -> Result<()> {
    let (storage, dir) = resolve(dir)?;
    if InodeGuard::new(storage, true).reset(&dir)? {
        println!("Reset inode record for {}", dir);
    } else {
        println!("No inode record for {}", dir);
    }
    Ok(())
}

pub fn disable(dir: Option<&str>) -> Result<()> {
    let (storage, dir) = resolve(dir)?;
    InodeGuard::new(storage, true).disable(&dir)?;
    println!("Inode check disabled for {}", dir);
    Ok(())
}

fn resolve(dir: Option<&str>) -> Result<(StorageConfig, AbsolutePath)> {
    let storage = StorageConfig::resolve()?;
    let dir = match dir {
        Some(raw) if raw.starts_with('/') => AbsolutePath::parse(raw)?,
        Some(raw) => {
            let cwd = current_dir()?;
            AbsolutePath::from_path(&cwd.join(raw))?
        }
        None => AbsolutePath::from_path(&current_dir()?)?,
    };
    Ok((storage, dir))
}

fn current_dir() -> Result<std::path::PathBuf> {
    std::env::current_dir().map_err(|e| CdhooksError::io("reading current directory", e))
}

fn render_status(dir: &AbsolutePath, status: &InodeStatus) -> String {
    let record = match &status.record {
        Some(InodeRecord::Token(token)) => token.as_str(),
        Some(InodeRecord::Disabled) => "disabled",
        None => "none",
    };
    let current = status.current.as_deref().unwrap_or("missing");
    let state = match (&status.record, &status.current) {
        (Some(InodeRecord::Disabled), _) => "disabled",
        (None, _) => "unrecorded",
        (Some(_), None) => "directory missing",
        (Some(InodeRecord::Token(token)), Some(current)) if token == current => "ok",
        (Some(InodeRecord::Token(_)), Some(_)) => "mismatch (scripts blocked)",
    };

    format!(
        "directory: {}\nrecord: {} ({})\ncurrent: {}\nstate: {}\n",
        dir,
        record,
        status.record_path.display(),
        current,
        state
    )
}
