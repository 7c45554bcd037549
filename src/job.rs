use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use crate::config::{ConfigKind, Role};

/// What a job runs once its tree is ready.
#[derive(Debug, Clone)]
pub enum JobKind {
    /// Full-config build whose log feeds the warning diff.
    Build(ConfigKind),
    /// Defconfig build, then a vng boot with a hard timeout.
    Boot { timeout: Duration },
}

impl JobKind {
    /// Commands run in order; the first failure ends the job. The boot
    /// command itself is separate because it carries the timeout.
    fn steps(&self) -> Vec<Vec<String>> {
        match self {
            JobKind::Build(config) => vec![
                argv(&["vng", "--clean"]),
                argv(&["make", config.as_str()]),
                argv(&["./scripts/config", "-d", "WERROR"]),
                argv(&["make", "olddefconfig"]),
                argv(&["vng", "--build", "--skip-config", "KCFLAGS=-Wno-error"]),
            ],
            JobKind::Boot { .. } => vec![
                argv(&["vng", "--clean"]),
                argv(&["vng", "--build", "KCFLAGS=-Wno-error"]),
            ],
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn boot_argv(workdir: &Path) -> Vec<String> {
    vec![
        "vng".to_string(),
        "-r".to_string(),
        workdir.display().to_string(),
        "--append".to_string(),
        "panic=-1".to_string(),
        "-e".to_string(),
        "uname -a".to_string(),
    ]
}

/// One unit of scheduled work, bound to a worktree and a log file.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub role: Role,
    pub kind: JobKind,
    pub workdir: PathBuf,
    pub log_path: PathBuf,
}

/// Job for a provisioned role: what it builds and where it logs.
pub fn for_role(role: Role, workdir: &Path, log_dir: &Path, boot_timeout: Duration) -> BuildJob {
    let kind = match role.config() {
        Some(config) => JobKind::Build(config),
        None => JobKind::Boot {
            timeout: boot_timeout,
        },
    };
    BuildJob {
        role,
        kind,
        workdir: workdir.to_path_buf(),
        log_path: log_dir.join(role.log_rel()),
    }
}

/// Terminal job state. `Skipped` marks roles whose tree never came up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed { step: String, code: i32 },
    Skipped { reason: String },
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub role: Role,
    pub status: JobStatus,
    pub elapsed: Duration,
    pub log_path: PathBuf,
}

impl JobOutcome {
    pub fn ok(&self) -> bool {
        self.status == JobStatus::Succeeded
    }

    pub fn skipped(role: Role, log_path: PathBuf, reason: String) -> Self {
        Self {
            role,
            status: JobStatus::Skipped { reason },
            elapsed: Duration::ZERO,
            log_path,
        }
    }
}

impl BuildJob {
    /// Run all steps, appending their combined output to the log file.
    /// Anything that goes wrong becomes a failed status, never a panic.
    pub async fn run(self) -> JobOutcome {
        let started = Instant::now();
        let status = self.run_inner().await;
        JobOutcome {
            role: self.role,
            status,
            elapsed: started.elapsed(),
            log_path: self.log_path,
        }
    }

    async fn run_inner(&self) -> JobStatus {
        use std::io::Write;

        let mut log = match open_log(&self.log_path) {
            Ok(file) => file,
            Err(e) => {
                return JobStatus::Failed {
                    step: format!("open {}: {e}", self.log_path.display()),
                    code: -1,
                }
            }
        };
        let _ = writeln!(log, "# role: {}", self.role.label());
        let _ = writeln!(log, "# worktree: {}", self.workdir.display());

        for step in self.kind.steps() {
            let status = run_command(&mut log, &self.workdir, &step, None).await;
            if status != JobStatus::Succeeded {
                return status;
            }
        }

        if let JobKind::Boot { timeout } = &self.kind {
            let boot = boot_argv(&self.workdir);
            let status = run_command(&mut log, &self.workdir, &boot, Some(*timeout)).await;
            if status != JobStatus::Succeeded {
                return status;
            }
        }

        JobStatus::Succeeded
    }
}

/// Append-mode log handle; children inherit it for stdout and stderr so
/// their writes interleave in arrival order.
fn open_log(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

async fn run_command(
    log: &mut std::fs::File,
    workdir: &Path,
    argv: &[String],
    timeout: Option<Duration>,
) -> JobStatus {
    use std::io::Write;

    let cmd_line = argv.join(" ");
    if let Err(e) = writeln!(log, "# cmd: {cmd_line}") {
        return JobStatus::Failed {
            step: format!("write log: {e}"),
            code: -1,
        };
    }

    let (stdout, stderr) = match (log.try_clone(), log.try_clone()) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            return JobStatus::Failed {
                step: format!("clone log handle: {e}"),
                code: -1,
            }
        }
    };

    let mut child = match tokio::process::Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            let _ = writeln!(log, "# error: {e}");
            return JobStatus::Failed {
                step: format!("{cmd_line}: {e}"),
                code: -1,
            };
        }
    };

    let waited = match timeout {
        None => child.wait().await,
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(waited) => waited,
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                let _ = writeln!(log, "# timed out after {}s", limit.as_secs());
                return JobStatus::Failed {
                    step: format!("{cmd_line} (timed out after {}s)", limit.as_secs()),
                    code: -1,
                };
            }
        },
    };

    match waited {
        Ok(status) if status.success() => JobStatus::Succeeded,
        Ok(status) => {
            let code = status.code().unwrap_or(-1);
            let _ = writeln!(log, "# exit: {code}");
            JobStatus::Failed {
                step: cmd_line,
                code,
            }
        }
        Err(e) => JobStatus::Failed {
            step: format!("{cmd_line}: wait: {e}"),
            code: -1,
        },
    }
}
