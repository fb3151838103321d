//! User-facing diagnostics produced during a transition.
//!
//! Kept separate from `tracing` output: logs go to a file, diagnostics go to
//! the user's terminal. Quiet mode keeps only [`Severity::Blocking`].

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    /// Script execution was refused; shown even in quiet mode.
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Blocking,
            message: message.into(),
        }
    }

    pub fn is_visible(&self, quiet: bool) -> bool {
        !quiet || self.severity == Severity::Blocking
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Info => "cdhooks",
            Severity::Warning => "cdhooks: warning",
            Severity::Blocking => "cdhooks: blocked",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

/// Ordered diagnostics for one transition, filtered by quiet mode at render time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn visible(&self, quiet: bool) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.is_visible(quiet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_keeps_only_blocking() {
        let mut diags = Diagnostics::default();
        diags.push(Diagnostic::info("gone"));
        diags.push(Diagnostic::warning("legacy"));
        diags.push(Diagnostic::blocking("inode"));

        let quiet: Vec<_> = diags.visible(true).collect();
        assert_eq!(quiet.len(), 1);
        assert_eq!(quiet[0].severity, Severity::Blocking);
        assert_eq!(diags.visible(false).count(), 3);
    }

    #[test]
    fn display_prefixes_severity() {
        assert_eq!(
            Diagnostic::warning("legacy script").to_string(),
            "cdhooks: warning: legacy script"
        );
    }
}
