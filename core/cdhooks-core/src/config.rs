//! Engine configuration from environment flags.
//!
//! | variable              | effect                                        |
//! |-----------------------|-----------------------------------------------|
//! | `CDHOOKS_QUIET`       | drop info and warning diagnostics             |
//! | `CDHOOKS_LEGACY`      | run legacy in-directory scripts as-is         |
//! | `CDHOOKS_AUTOMIGRATE` | move legacy scripts into the mirrored tree    |
//! | `CDHOOKS_NO_INODE`    | inode guard always proceeds                   |
//! | `CDHOOKS_SHELL`       | interpreter used for scripts (default `sh`)   |

use serde::{Deserialize, Serialize};

pub const QUIET_ENV: &str = "CDHOOKS_QUIET";
pub const LEGACY_ENV: &str = "CDHOOKS_LEGACY";
pub const AUTOMIGRATE_ENV: &str = "CDHOOKS_AUTOMIGRATE";
pub const NO_INODE_ENV: &str = "CDHOOKS_NO_INODE";
pub const SHELL_ENV: &str = "CDHOOKS_SHELL";

const DEFAULT_SHELL: &str = "sh";

/// What to do when a script is found at the legacy in-directory location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyPolicy {
    /// Execute it directly. Bypasses the inode guard.
    RunLegacy,
    /// Append it to the current-format script and delete the legacy file.
    AutoMigrate,
    /// Explain how to migrate; neither run nor touch it.
    #[default]
    WarnOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub quiet: bool,
    pub legacy_policy: LegacyPolicy,
    pub inode_check: bool,
    pub shell: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiet: false,
            legacy_policy: LegacyPolicy::WarnOnly,
            inode_check: true,
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. `CDHOOKS_LEGACY` beats
    /// `CDHOOKS_AUTOMIGRATE` when both are set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).map(|v| is_truthy(&v)).unwrap_or(false);

        let legacy_policy = if flag(LEGACY_ENV) {
            LegacyPolicy::RunLegacy
        } else if flag(AUTOMIGRATE_ENV) {
            LegacyPolicy::AutoMigrate
        } else {
            LegacyPolicy::WarnOnly
        };

        Self {
            quiet: flag(QUIET_ENV),
            legacy_policy,
            inode_check: !flag(NO_INODE_ENV),
            shell: lookup(SHELL_ENV)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
        }
    }
}

pub fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> EngineConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_to_warn_only_with_inode_check() {
        let config = from(&[]);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn legacy_flag_enables_run_legacy() {
        assert_eq!(
            from(&[(LEGACY_ENV, "1")]).legacy_policy,
            LegacyPolicy::RunLegacy
        );
    }

    #[test]
    fn automigrate_flag_enables_auto_migrate() {
        assert_eq!(
            from(&[(AUTOMIGRATE_ENV, "yes")]).legacy_policy,
            LegacyPolicy::AutoMigrate
        );
    }

    #[test]
    fn run_legacy_wins_over_automigrate() {
        let config = from(&[(LEGACY_ENV, "true"), (AUTOMIGRATE_ENV, "true")]);
        assert_eq!(config.legacy_policy, LegacyPolicy::RunLegacy);
    }

    #[test]
    fn falsy_values_are_ignored() {
        let config = from(&[(QUIET_ENV, "0"), (NO_INODE_ENV, "no")]);
        assert!(!config.quiet);
        assert!(config.inode_check);
    }

    #[test]
    fn quiet_and_no_inode() {
        let config = from(&[(QUIET_ENV, "1"), (NO_INODE_ENV, "1")]);
        assert!(config.quiet);
        assert!(!config.inode_check);
    }

    #[test]
    fn custom_shell() {
        assert_eq!(from(&[(SHELL_ENV, "bash")]).shell, "bash");
        assert_eq!(from(&[(SHELL_ENV, "  ")]).shell, "sh");
    }
}
