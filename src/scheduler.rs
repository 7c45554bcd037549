use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Role;
use crate::job::{BuildJob, JobOutcome, JobStatus};
use crate::tui;

/// Run every job to completion, at most `limit` at a time. Jobs finish
/// in whatever order they finish; the returned list is re-sorted into
/// role order. A panicked task becomes a failed outcome for its role.
pub async fn run_all(jobs: Vec<BuildJob>, limit: usize) -> Vec<JobOutcome> {
    let limit = limit.max(1);
    let semaphore = Arc::new(Semaphore::new(limit));
    let mut set = JoinSet::new();
    let mut spawned: HashMap<tokio::task::Id, (Role, PathBuf)> = HashMap::new();

    for job in jobs {
        let role = job.role;
        let log_path = job.log_path.clone();
        let semaphore = Arc::clone(&semaphore);
        let handle = set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            tui::stamped_line("⚒", tui::HOT, &format!("{} started", role.label()));
            job.run().await
        });
        spawned.insert(handle.id(), (role, log_path));
    }

    let mut outcomes = Vec::with_capacity(spawned.len());
    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((_, outcome)) => {
                announce(&outcome);
                outcomes.push(outcome);
            }
            Err(e) => {
                if let Some((role, log_path)) = spawned.get(&e.id()).cloned() {
                    let outcome = JobOutcome {
                        role,
                        status: JobStatus::Failed {
                            step: format!("job panicked: {e}"),
                            code: -1,
                        },
                        elapsed: Duration::ZERO,
                        log_path,
                    };
                    announce(&outcome);
                    outcomes.push(outcome);
                } else {
                    eprintln!("  \x1b[31m✗\x1b[0m job panicked: {e}");
                }
            }
        }
    }

    outcomes.sort_by_key(|o| o.role);
    outcomes
}

fn announce(outcome: &JobOutcome) {
    let took = tui::format_elapsed(outcome.elapsed.as_secs());
    let label = outcome.role.label();
    match &outcome.status {
        JobStatus::Succeeded => {
            tui::stamped_line("✓", tui::BRIGHT, &format!("{label} ({took})"));
        }
        JobStatus::Failed { step, code } => {
            let what = tui::truncate(step, 60);
            tui::stamped_line(
                "✗",
                tui::WARM,
                &format!("{label}: {what} (exit {code}, {took})"),
            );
        }
        JobStatus::Skipped { reason } => {
            tui::stamped_line("⊘", tui::COLD, &format!("{label}: {reason}"));
        }
    }
}
