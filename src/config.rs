use std::time::Duration;

/// Directory prefixes for scratch state
pub const WORKTREE_PREFIX: &str = "temper-";
pub const LOG_PREFIX: &str = "temper-logs-";

/// Behavior constants
pub const DEFAULT_JOBS: usize = 5;
pub const DEFAULT_BOOT_TIMEOUT_SECS: u64 = 60;
pub const SHORT_REV_LEN: usize = 12;
pub const FAILURE_TAIL_LINES: usize = 20;

/// Build configurations checked for new warnings
pub const WARN_CONFIGS: [ConfigKind; 2] = [ConfigKind::Allmodconfig, ConfigKind::Allyesconfig];

/// The five fixed roles of a run, in report order
pub const ROLES: [Role; 5] = [
    Role::BaselineAllmodconfig,
    Role::BaselineAllyesconfig,
    Role::CandidateAllmodconfig,
    Role::CandidateAllyesconfig,
    Role::Boot,
];

/// A kernel configuration whose warnings are diffed between revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKind {
    Allmodconfig,
    Allyesconfig,
}

impl ConfigKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKind::Allmodconfig => "allmodconfig",
            ConfigKind::Allyesconfig => "allyesconfig",
        }
    }
}

impl std::fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One worktree/job slot. Baseline roles check out the baseline revision,
/// the rest check out HEAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    BaselineAllmodconfig,
    BaselineAllyesconfig,
    CandidateAllmodconfig,
    CandidateAllyesconfig,
    Boot,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::BaselineAllmodconfig => "baseline-allmodconfig",
            Role::BaselineAllyesconfig => "baseline-allyesconfig",
            Role::CandidateAllmodconfig => "candidate-allmodconfig",
            Role::CandidateAllyesconfig => "candidate-allyesconfig",
            Role::Boot => "boot",
        }
    }

    /// The warning config this role builds, if any.
    pub fn config(self) -> Option<ConfigKind> {
        match self {
            Role::BaselineAllmodconfig | Role::CandidateAllmodconfig => {
                Some(ConfigKind::Allmodconfig)
            }
            Role::BaselineAllyesconfig | Role::CandidateAllyesconfig => {
                Some(ConfigKind::Allyesconfig)
            }
            Role::Boot => None,
        }
    }

    pub fn is_baseline(self) -> bool {
        matches!(self, Role::BaselineAllmodconfig | Role::BaselineAllyesconfig)
    }

    pub fn baseline_for(config: ConfigKind) -> Role {
        match config {
            ConfigKind::Allmodconfig => Role::BaselineAllmodconfig,
            ConfigKind::Allyesconfig => Role::BaselineAllyesconfig,
        }
    }

    pub fn candidate_for(config: ConfigKind) -> Role {
        match config {
            ConfigKind::Allmodconfig => Role::CandidateAllmodconfig,
            ConfigKind::Allyesconfig => Role::CandidateAllyesconfig,
        }
    }

    /// Log file path relative to the run's log directory.
    pub fn log_rel(self) -> &'static str {
        match self {
            Role::BaselineAllmodconfig => "baseline/allmodconfig.log",
            Role::BaselineAllyesconfig => "baseline/allyesconfig.log",
            Role::CandidateAllmodconfig => "candidate/allmodconfig.log",
            Role::CandidateAllyesconfig => "candidate/allyesconfig.log",
            Role::Boot => "candidate/defconfig-boot.log",
        }
    }
}

/// Run configuration (from CLI flags)
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Max jobs running at once
    pub jobs: usize,
    /// How long the boot VM may take before it is killed
    pub boot_timeout: Duration,
    /// Key warnings by file, line, and message instead of file and message
    pub strict_lines: bool,
    /// Keep the log directory even when the run is clean
    pub keep_logs: bool,
}

impl RunConfig {
    pub fn new(jobs: usize, boot_timeout_secs: u64, strict_lines: bool, keep_logs: bool) -> Self {
        Self {
            jobs,
            boot_timeout: Duration::from_secs(boot_timeout_secs),
            strict_lines,
            keep_logs,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_JOBS, DEFAULT_BOOT_TIMEOUT_SECS, false, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_cover_both_sides_of_each_config() {
        for config in WARN_CONFIGS {
            let baseline = Role::baseline_for(config);
            let candidate = Role::candidate_for(config);
            assert!(baseline.is_baseline());
            assert!(!candidate.is_baseline());
            assert_eq!(baseline.config(), Some(config));
            assert_eq!(candidate.config(), Some(config));
        }
        assert_eq!(Role::Boot.config(), None);
        assert!(!Role::Boot.is_baseline());
    }

    #[test]
    fn log_paths_are_distinct() {
        let mut paths: Vec<&str> = ROLES.iter().map(|r| r.log_rel()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), ROLES.len());
    }

    #[test]
    fn baseline_logs_live_under_baseline_dir() {
        for role in ROLES {
            if role.is_baseline() {
                assert!(role.log_rel().starts_with("baseline/"));
            } else {
                assert!(role.log_rel().starts_with("candidate/"));
            }
        }
    }
}
