use std::path::{Path, PathBuf};

use tokio::sync::watch;

use crate::config::{Role, ROLES, WORKTREE_PREFIX};
use crate::tui;

/// One isolated checkout, bound to a role for the whole run.
#[derive(Debug, Clone)]
pub struct Worktree {
    pub role: Role,
    pub rev: String,
    pub path: PathBuf,
}

/// Per-role provisioning result. A failure carries its reason so the
/// run can mark that role failed without blocking the siblings.
#[derive(Debug)]
pub enum Provision {
    Ready(Worktree),
    Failed { role: Role, reason: String },
}

/// The five fixed roles with the revision each one checks out.
pub fn plan(baseline_rev: &str, head_rev: &str) -> Vec<(Role, String)> {
    ROLES
        .iter()
        .map(|role| {
            let rev = if role.is_baseline() {
                baseline_rev
            } else {
                head_rev
            };
            (*role, rev.to_string())
        })
        .collect()
}

pub struct WorktreeManager {
    kernel_dir: PathBuf,
    /// Scratch trees land here, on the same filesystem as the main tree.
    parent: PathBuf,
}

impl WorktreeManager {
    pub fn new(kernel_dir: &Path) -> Self {
        let parent = match kernel_dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => kernel_dir.to_path_buf(),
        };
        Self {
            kernel_dir: kernel_dir.to_path_buf(),
            parent,
        }
    }

    /// Provision every planned role. Order is preserved; failures do not
    /// stop the rest. An interrupt stops before the next checkout; the
    /// one in flight completes so its tree is recorded for teardown.
    pub async fn provision(
        &self,
        plan: &[(Role, String)],
        interrupt: &mut watch::Receiver<bool>,
    ) -> Vec<Provision> {
        let mut out = Vec::with_capacity(plan.len());
        for (role, rev) in plan {
            if *interrupt.borrow() {
                break;
            }
            out.push(self.provision_one(*role, rev).await);
        }
        out
    }

    /// Detached checkout of `rev` in a fresh directory beside the tree.
    pub async fn provision_one(&self, role: Role, rev: &str) -> Provision {
        let dir = match tempfile::Builder::new()
            .prefix(WORKTREE_PREFIX)
            .tempdir_in(&self.parent)
        {
            Ok(dir) => dir,
            Err(e) => {
                return Provision::Failed {
                    role,
                    reason: format!("tempdir in {}: {e}", self.parent.display()),
                }
            }
        };
        let path = dir.keep();

        let output = tokio::process::Command::new("git")
            .args(["worktree", "add", "--detach"])
            .arg(&path)
            .arg(rev)
            .current_dir(&self.kernel_dir)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => Provision::Ready(Worktree {
                role,
                rev: rev.to_string(),
                path,
            }),
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let _ = std::fs::remove_dir_all(&path);
                Provision::Failed {
                    role,
                    reason: format!("worktree add: {}", stderr.trim()),
                }
            }
            Err(e) => {
                let _ = std::fs::remove_dir_all(&path);
                Provision::Failed {
                    role,
                    reason: format!("spawn git: {e}"),
                }
            }
        }
    }

    /// Best-effort removal of every provisioned tree, then a prune pass
    /// so the main repository forgets them.
    pub async fn teardown(&self, trees: &[Worktree]) {
        for tree in trees {
            let _ = tokio::process::Command::new("git")
                .args(["worktree", "remove", "--force"])
                .arg(&tree.path)
                .current_dir(&self.kernel_dir)
                .output()
                .await;
            let _ = std::fs::remove_dir_all(&tree.path);
            if tree.path.exists() {
                tui::status_line(
                    "⚠",
                    tui::BRIGHT,
                    &format!("failed to remove worktree: {}", tree.path.display()),
                );
            }
        }
        let _ = tokio::process::Command::new("git")
            .args(["worktree", "prune"])
            .current_dir(&self.kernel_dir)
            .output()
            .await;
    }
}
