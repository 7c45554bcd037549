use crate::boot::BootResult;
use crate::config::{ConfigKind, Role};
use crate::diff::DiffResult;

/// Final verdict for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    NewWarnings,
    BootFailure,
    BuildFailure,
    LintFailure,
}

impl Verdict {
    /// Exit code contract: 0 clean, 1 regression, 2 could-not-check.
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Clean => 0,
            Verdict::NewWarnings | Verdict::BootFailure => 1,
            Verdict::BuildFailure | Verdict::LintFailure => 2,
        }
    }
}

/// Per-configuration outcome fed to the aggregator.
#[derive(Debug, Clone)]
pub enum ConfigOutcome {
    /// Both sides built; the diff stands.
    Diffed(DiffResult),
    /// One side never produced a comparable log.
    Failed {
        config: ConfigKind,
        role: Role,
        reason: String,
    },
}

/// Everything the final report needs, assembled after all jobs settle.
#[derive(Debug)]
pub struct Report {
    pub baseline_short: String,
    pub commit_count: u64,
    pub configs: Vec<ConfigOutcome>,
    pub boot: BootResult,
    pub verdict: Verdict,
}

/// Fold dimension outcomes into a verdict. Build trouble outranks new
/// warnings, which outrank a boot failure; a failed lint gate outranks
/// everything because nothing else was checked.
pub fn aggregate(
    baseline_short: &str,
    commit_count: u64,
    configs: Vec<ConfigOutcome>,
    boot: BootResult,
    lint_passed: bool,
) -> Report {
    let any_build_failed = configs
        .iter()
        .any(|c| matches!(c, ConfigOutcome::Failed { .. }));
    let any_new_warnings = configs.iter().any(|c| match c {
        ConfigOutcome::Diffed(diff) => !diff.is_clean(),
        ConfigOutcome::Failed { .. } => false,
    });

    let verdict = if !lint_passed {
        Verdict::LintFailure
    } else if any_build_failed {
        Verdict::BuildFailure
    } else if any_new_warnings {
        Verdict::NewWarnings
    } else if !boot.succeeded {
        Verdict::BootFailure
    } else {
        Verdict::Clean
    };

    Report {
        baseline_short: baseline_short.to_string(),
        commit_count,
        configs,
        boot,
        verdict,
    }
}

impl Report {
    /// Render the pasteable blurb. Every dimension is listed whatever
    /// the verdict; stdout is reserved for exactly this text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if self.commit_count > 1 {
            out.push_str(&format!(
                "This patch and those between it and {} were tested by:\n",
                self.baseline_short
            ));
        } else {
            out.push_str("This patch was tested by:\n");
        }

        for outcome in &self.configs {
            match outcome {
                ConfigOutcome::Diffed(diff) => self.render_diff(&mut out, diff),
                ConfigOutcome::Failed {
                    config,
                    role,
                    reason,
                } => {
                    out.push_str(&format!(
                        "- Building with {config}: build failed ({}: {reason})\n",
                        role.label()
                    ));
                }
            }
        }

        if self.boot.succeeded {
            out.push_str("- Booting defconfig kernel via vng: OK\n");
            if let Some(uname) = &self.boot.uname {
                out.push_str(&format!("  uname -a: {uname}\n"));
            }
        } else {
            out.push_str("- Booting defconfig kernel via vng: FAILED\n");
        }

        out
    }

    fn render_diff(&self, out: &mut String, diff: &DiffResult) {
        let fixed = if diff.removed.is_empty() {
            String::new()
        } else {
            format!(" (also fixed {} warning(s))", diff.removed.len())
        };

        if diff.is_clean() {
            out.push_str(&format!(
                "- Building with {}: no new warnings (compared to {}){fixed}\n",
                diff.config, self.baseline_short
            ));
        } else {
            out.push_str(&format!(
                "- Building with {}: {} new warning(s) (compared to {}){fixed}\n",
                diff.config,
                diff.added.len(),
                self.baseline_short
            ));
            for warning in &diff.added {
                for line in warning.raw.lines() {
                    out.push_str(&format!("    {line}\n"));
                }
            }
        }
    }
}
