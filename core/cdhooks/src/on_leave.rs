//! `cdhooks on-leave`: queue a one-shot hook from inside a leave script.
//!
//! The evaluator exports `CDHOOKS_LEAVE_HOOKS` only while a leave script runs.
//! Each line written there becomes one hook, run in order right after the
//! script exits.
//!
//! ```bash
//! # in ~/.cdhooks/scripts/home/u/project/leave.sh
//! cdhooks on-leave 'docker compose down'
//! cdhooks on-leave rm -f "$TMPDIR/project.lock"
//! ```

use std::io::Write;

use cdhooks_core::script::LEAVE_HOOKS_ENV;
use cdhooks_core::{posix_quote, CdhooksError, Result};

pub fn run(command: &[String]) -> Result<()> {
    let hook_file = std::env::var_os(LEAVE_HOOKS_ENV)
        .filter(|value| !value.is_empty())
        .ok_or(CdhooksError::HookOutsideLeave)?;

    let line = hook_line(command)?;
    let mut file = fs_err::OpenOptions::new()
        .append(true)
        .open(&hook_file)
        .map_err(|e| CdhooksError::io("opening leave hook file", e))?;
    writeln!(file, "{}", line).map_err(|e| CdhooksError::io("writing leave hook", e))?;

    tracing::debug!(hook = %line, "Queued leave hook");
    Ok(())
}

/// One argument is shell code as written; several are quoted word by word.
fn hook_line(command: &[String]) -> Result<String> {
    let line = match command {
        [single] => single.clone(),
        words => words
            .iter()
            .map(|word| posix_quote(word))
            .collect::<Vec<_>>()
            .join(" "),
    };

    if line.contains('\n') {
        return Err(CdhooksError::CommandFailed {
            command: line,
            details: "leave hooks must fit on one line".to_string(),
        });
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn single_argument_is_kept_verbatim() {
        assert_eq!(
            hook_line(&words(&["echo bye > /tmp/x"])).unwrap(),
            "echo bye > /tmp/x"
        );
    }

    #[test]
    fn multiple_arguments_are_quoted() {
        assert_eq!(
            hook_line(&words(&["rm", "-f", "my file"])).unwrap(),
            "'rm' '-f' 'my file'"
        );
    }

    #[test]
    fn multiline_hooks_are_rejected() {
        assert!(hook_line(&words(&["echo a\necho b"])).is_err());
    }
}
