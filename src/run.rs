use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::sync::watch;

use crate::boot::{self, BootResult};
use crate::checkpatch;
use crate::config::{
    ConfigKind, Role, RunConfig, FAILURE_TAIL_LINES, LOG_PREFIX, ROLES, SHORT_REV_LEN,
    WARN_CONFIGS,
};
use crate::diff;
use crate::error::TemperError;
use crate::git;
use crate::job::{self, BuildJob, JobOutcome, JobStatus};
use crate::report::{self, ConfigOutcome, Report, Verdict};
use crate::scheduler;
use crate::tui;
use crate::warnings::{self, MatchPolicy};
use crate::worktree::{self, Provision, Worktree, WorktreeManager};

/// Everything a run needs, resolved once during preflight.
pub struct RunContext {
    pub kernel_dir: PathBuf,
    pub baseline: String,
    pub baseline_short: String,
    pub head: String,
    pub commit_count: u64,
    pub log_dir: PathBuf,
    pub policy: MatchPolicy,
    pub config: RunConfig,
}

/// Drive the whole pipeline. Returns the process exit code; hard errors
/// (environment problems, not verdicts) bubble up instead.
pub async fn execute(
    baseline_arg: &str,
    kernel_dir: &Path,
    config: RunConfig,
) -> Result<i32, TemperError> {
    tui::show_banner();
    let mut interrupt = interrupt_watcher();

    let ctx = preflight(baseline_arg, kernel_dir, config).await?;

    tui::header("lint");
    let lint = checkpatch::run(&ctx.kernel_dir, &ctx.baseline).await?;
    if !lint.passed {
        eprintln!("{}", lint.output.trim_end());
        tui::status_line("✗", tui::WARM, "checkpatch rejected the series");
        let _ = std::fs::remove_dir(&ctx.log_dir);
        return Ok(Verdict::LintFailure.exit_code());
    }
    tui::status_line("✓", tui::BRIGHT, "checkpatch clean");

    if *interrupt.borrow() {
        tui::status_line("✗", tui::WARM, "interrupted");
        let _ = std::fs::remove_dir(&ctx.log_dir);
        return Ok(130);
    }

    tui::header("provision");
    let manager = WorktreeManager::new(&ctx.kernel_dir);
    let requests = worktree::plan(&ctx.baseline, &ctx.head);
    let spinner = tui::spinner("adding worktrees...");
    let provisions = manager.provision(&requests, &mut interrupt).await;
    spinner.finish_and_clear();

    let mut trees: Vec<Worktree> = Vec::new();
    let mut unprovisioned: Vec<JobOutcome> = Vec::new();
    for provision in provisions {
        match provision {
            Provision::Ready(tree) => {
                let rev: String = tree.rev.chars().take(SHORT_REV_LEN).collect();
                tui::status_line(
                    "✓",
                    tui::BRIGHT,
                    &format!("{} @{rev} → {}", tree.role.label(), tree.path.display()),
                );
                trees.push(tree);
            }
            Provision::Failed { role, reason } => {
                tui::status_line("✗", tui::WARM, &format!("{}: {reason}", role.label()));
                unprovisioned.push(JobOutcome::skipped(
                    role,
                    ctx.log_dir.join(role.log_rel()),
                    format!("worktree provisioning failed: {reason}"),
                ));
            }
        }
    }

    if *interrupt.borrow() {
        tui::status_line("✗", tui::WARM, "interrupted, tearing down");
        manager.teardown(&trees).await;
        let _ = std::fs::remove_dir(&ctx.log_dir);
        return Ok(130);
    }

    if trees.is_empty() {
        let _ = std::fs::remove_dir(&ctx.log_dir);
        return Err(TemperError::NothingProvisioned(ROLES.len()));
    }

    // Teardown must run whatever happens past this point.
    let outcome = drive(&ctx, &trees, unprovisioned, &mut interrupt).await;
    manager.teardown(&trees).await;

    match outcome {
        Ok(code) => {
            finish_logs(&ctx, code != 0 || ctx.config.keep_logs);
            Ok(code)
        }
        Err(e) => {
            finish_logs(&ctx, true);
            Err(e)
        }
    }
}

/// Latch the first Ctrl-C into a flag. The flag is checked between
/// phases and between checkouts; the build/boot barrier selects on it.
fn interrupt_watcher() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(true);
            }
            // No handler installed; park so the sender stays alive.
            Err(_) => std::future::pending::<()>().await,
        }
    });
    rx
}

/// Build/boot phase plus reporting. Interrupt resolves to exit code 130.
async fn drive(
    ctx: &RunContext,
    trees: &[Worktree],
    unprovisioned: Vec<JobOutcome>,
    interrupt: &mut watch::Receiver<bool>,
) -> Result<i32, TemperError> {
    tui::header("build + boot");
    let jobs: Vec<BuildJob> = trees
        .iter()
        .map(|tree| job::for_role(tree.role, &tree.path, &ctx.log_dir, ctx.config.boot_timeout))
        .collect();

    let mut outcomes = tokio::select! {
        biased;
        _ = interrupt.changed() => {
            tui::status_line("✗", tui::WARM, "interrupted, tearing down");
            return Ok(130);
        }
        outcomes = scheduler::run_all(jobs, ctx.config.jobs) => outcomes,
    };

    outcomes.extend(unprovisioned);
    outcomes.sort_by_key(|o| o.role);

    let report = assemble(ctx, &outcomes)?;
    print!("{}", report.render());

    print_failure_tails(&outcomes);
    summarize(&report);
    Ok(report.verdict.exit_code())
}

async fn preflight(
    baseline_arg: &str,
    kernel_dir: &Path,
    config: RunConfig,
) -> Result<RunContext, TemperError> {
    tui::header("preflight");

    let kernel_dir = std::fs::canonicalize(kernel_dir)
        .map_err(|e| TemperError::Preflight(format!("{}: {e}", kernel_dir.display())))?;

    let vng = tokio::process::Command::new("vng")
        .arg("--version")
        .output()
        .await;
    let vng_version = match vng {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string(),
        _ => {
            return Err(TemperError::Preflight(
                "virtme-ng (vng) not found in PATH".to_string(),
            ))
        }
    };
    tui::status_line("✓", tui::BRIGHT, &format!("vng {vng_version}"));

    if !git::is_repo(&kernel_dir).await {
        return Err(TemperError::Preflight(format!(
            "{} is not a git repository",
            kernel_dir.display()
        )));
    }
    if !git::tree_is_clean(&kernel_dir).await? {
        return Err(TemperError::Preflight(
            "working tree is dirty, commit or stash first".to_string(),
        ));
    }

    let baseline = git::rev_parse(&kernel_dir, baseline_arg).await?;
    let head = git::rev_parse(&kernel_dir, "HEAD").await?;
    if baseline == head {
        return Err(TemperError::Preflight(
            "baseline is HEAD, nothing to check".to_string(),
        ));
    }
    let baseline_short = git::short_rev(&kernel_dir, &baseline).await?;
    let head_short = git::short_rev(&kernel_dir, &head).await?;
    let commit_count = git::commit_count(&kernel_dir, &baseline, &head).await?;
    tui::status_line(
        "✓",
        tui::BRIGHT,
        &format!("{commit_count} commit(s): {baseline_short} → {head_short}"),
    );

    let log_dir = tempfile::Builder::new()
        .prefix(LOG_PREFIX)
        .tempdir()
        .map_err(|e| TemperError::Preflight(format!("log directory: {e}")))?
        .keep();
    tui::status_line("•", tui::COLD, &format!("logs: {}", log_dir.display()));

    let policy = if config.strict_lines {
        MatchPolicy::FileLineMessage
    } else {
        MatchPolicy::FileMessage
    };

    Ok(RunContext {
        kernel_dir,
        baseline,
        baseline_short,
        head,
        commit_count,
        log_dir,
        policy,
        config,
    })
}

/// Turn settled job outcomes into the report. Warning extraction happens
/// here, from the logs the jobs left behind.
fn assemble(ctx: &RunContext, outcomes: &[JobOutcome]) -> Result<Report, TemperError> {
    let mut configs = Vec::with_capacity(WARN_CONFIGS.len());
    for config in WARN_CONFIGS {
        configs.push(config_outcome(ctx, config, outcomes)?);
    }
    let boot = boot_outcome(outcomes)?;
    Ok(report::aggregate(
        &ctx.baseline_short,
        ctx.commit_count,
        configs,
        boot,
        true,
    ))
}

fn find(outcomes: &[JobOutcome], role: Role) -> Option<&JobOutcome> {
    outcomes.iter().find(|o| o.role == role)
}

fn config_outcome(
    ctx: &RunContext,
    config: ConfigKind,
    outcomes: &[JobOutcome],
) -> Result<ConfigOutcome, TemperError> {
    let roles = [Role::baseline_for(config), Role::candidate_for(config)];
    let mut logs = Vec::with_capacity(roles.len());
    for role in roles {
        let Some(outcome) = find(outcomes, role) else {
            return Ok(ConfigOutcome::Failed {
                config,
                role,
                reason: "job never ran".to_string(),
            });
        };
        if !outcome.ok() {
            return Ok(ConfigOutcome::Failed {
                config,
                role,
                reason: failure_reason(&outcome.status),
            });
        }
        logs.push(outcome.log_path.clone());
    }

    let baseline = warnings::extract_file(&logs[0], ctx.policy)?;
    let candidate = warnings::extract_file(&logs[1], ctx.policy)?;
    Ok(ConfigOutcome::Diffed(diff::diff(
        config, &baseline, &candidate,
    )))
}

fn boot_outcome(outcomes: &[JobOutcome]) -> Result<BootResult, TemperError> {
    let Some(outcome) = find(outcomes, Role::Boot) else {
        return Ok(BootResult::failed());
    };
    if !outcome.ok() {
        return Ok(BootResult::failed());
    }
    boot::verify_file(&outcome.log_path)
}

fn failure_reason(status: &JobStatus) -> String {
    match status {
        JobStatus::Succeeded => "ok".to_string(),
        JobStatus::Failed { step, code } => format!("{step} (exit {code})"),
        JobStatus::Skipped { reason } => reason.clone(),
    }
}

fn summarize(report: &Report) {
    eprintln!();
    match report.verdict {
        Verdict::Clean => tui::status_line("█", tui::PURE, "clean: no new warnings, boot OK"),
        Verdict::NewWarnings => tui::status_line("✗", tui::WARM, "new warnings introduced"),
        Verdict::BootFailure => {
            tui::status_line("✗", tui::WARM, "defconfig kernel failed to boot")
        }
        Verdict::BuildFailure => tui::status_line("✗", tui::WARM, "build failure"),
        Verdict::LintFailure => {
            tui::status_line("✗", tui::WARM, "checkpatch rejected the series")
        }
    }
}

fn finish_logs(ctx: &RunContext, keep: bool) {
    if keep {
        tui::status_line("•", tui::COLD, &format!("logs kept at {}", ctx.log_dir.display()));
    } else {
        let _ = std::fs::remove_dir_all(&ctx.log_dir);
    }
}

/// Last lines of each failed job's log, for context without spelunking.
fn print_failure_tails(outcomes: &[JobOutcome]) {
    for outcome in outcomes {
        if !matches!(outcome.status, JobStatus::Failed { .. }) {
            continue;
        }
        let Ok(tail) = tail_lines(&outcome.log_path, FAILURE_TAIL_LINES) else {
            continue;
        };
        if tail.is_empty() {
            continue;
        }
        eprintln!();
        tui::status_line("✗", tui::WARM, &format!("{} log tail:", outcome.role.label()));
        for line in &tail {
            eprintln!("  \x1b[90m{line}\x1b[0m");
        }
    }
}

/// Read at most the final 8 KiB of a file and return its last `n` lines.
fn tail_lines(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    const WINDOW: u64 = 8 * 1024;
    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(WINDOW);
    file.seek(SeekFrom::Start(start))?;
    let mut bytes = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut bytes)?;
    let text = String::from_utf8_lossy(&bytes);
    let mut lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
    // Drop the first line when the window starts mid-line.
    if start > 0 && !lines.is_empty() {
        lines.remove(0);
    }
    let keep = lines.len().saturating_sub(n);
    Ok(lines.split_off(keep))
}
