use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;

use crate::error::TemperError;

/// What the lint gate decided. `output` carries checkpatch's own text.
#[derive(Debug)]
pub struct LintOutcome {
    pub passed: bool,
    pub output: String,
}

/// Gate the series through checkpatch before any tree is provisioned.
/// The whole range is exported with `git format-patch --stdout` and fed
/// to `scripts/checkpatch.pl -` on stdin.
pub async fn run(kernel_dir: &Path, baseline: &str) -> Result<LintOutcome, TemperError> {
    let script = kernel_dir.join("scripts/checkpatch.pl");
    if !script.is_file() {
        return Err(TemperError::Checkpatch(format!(
            "{} not found (is this a kernel tree?)",
            script.display()
        )));
    }

    let range = format!("{baseline}..HEAD");
    let patch = tokio::process::Command::new("git")
        .args(["format-patch", "--stdout", &range])
        .current_dir(kernel_dir)
        .output()
        .await
        .map_err(|e| TemperError::Checkpatch(format!("git format-patch: {e}")))?;
    if !patch.status.success() {
        let stderr = String::from_utf8_lossy(&patch.stderr);
        return Err(TemperError::Checkpatch(format!(
            "git format-patch {range} failed: {}",
            stderr.trim()
        )));
    }

    let mut child = tokio::process::Command::new(&script)
        .arg("-")
        .current_dir(kernel_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TemperError::Checkpatch(format!("{}: {e}", script.display())))?;

    // Feed the patch while draining output, or a large series deadlocks.
    let stdin = child.stdin.take();
    let feed = async {
        if let Some(mut pipe) = stdin {
            let _ = pipe.write_all(&patch.stdout).await;
        }
    };
    let (_, out) = tokio::join!(feed, child.wait_with_output());
    let out = out?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    let stderr = String::from_utf8_lossy(&out.stderr);
    Ok(LintOutcome {
        passed: out.status.success(),
        output: format!("{stdout}{stderr}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testutil::{commit_change, init_repo};
    use std::os::unix::fs::PermissionsExt;

    fn install_checkpatch(dir: &Path, body: &str) {
        let scripts = dir.join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        let path = scripts.join("checkpatch.pl");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn clean_series_passes() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        install_checkpatch(dir.path(), "#!/bin/sh\ncat > /dev/null\necho total: 0 errors\nexit 0\n");
        commit_change(dir.path(), "driver.c", "int x;\n", "add driver");

        let outcome = run(dir.path(), "HEAD~1").await.unwrap();
        assert!(outcome.passed);
        assert!(outcome.output.contains("total: 0 errors"));
    }

    #[tokio::test]
    async fn findings_fail_the_gate_with_output() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        install_checkpatch(
            dir.path(),
            "#!/bin/sh\ncat > /dev/null\necho 'ERROR: trailing whitespace'\nexit 1\n",
        );
        commit_change(dir.path(), "driver.c", "int x; \n", "add driver");

        let outcome = run(dir.path(), "HEAD~1").await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.output.contains("trailing whitespace"));
    }

    #[tokio::test]
    async fn missing_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let err = run(dir.path(), "HEAD").await;
        assert!(matches!(err, Err(TemperError::Checkpatch(_))));
    }

    #[tokio::test]
    async fn script_sees_the_exported_range() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        // Fails unless the patch text mentions the marker file.
        install_checkpatch(
            dir.path(),
            "#!/bin/sh\ngrep -q marker-file.c && exit 0\nexit 1\n",
        );
        commit_change(dir.path(), "marker-file.c", "int y;\n", "add marker");

        let outcome = run(dir.path(), "HEAD~1").await.unwrap();
        assert!(outcome.passed);
    }
}
