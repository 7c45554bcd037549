use std::path::Path;

use crate::config::SHORT_REV_LEN;
use crate::error::TemperError;

/// Run git in `dir` and return trimmed stdout. Non-zero exit is an error.
pub async fn git(dir: &Path, args: &[&str]) -> Result<String, TemperError> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| TemperError::Git(format!("spawn failed: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TemperError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Exit-status-only variant for commands where non-zero is an answer,
/// not an error.
async fn git_status(dir: &Path, args: &[&str]) -> Result<bool, TemperError> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| TemperError::Git(format!("spawn failed: {e}")))?;
    Ok(output.status.success())
}

pub async fn is_repo(dir: &Path) -> bool {
    git_status(dir, &["rev-parse", "--git-dir"])
        .await
        .unwrap_or(false)
}

/// No unstaged or staged changes.
pub async fn tree_is_clean(dir: &Path) -> Result<bool, TemperError> {
    Ok(git_status(dir, &["diff", "--quiet"]).await?
        && git_status(dir, &["diff", "--cached", "--quiet"]).await?)
}

/// Resolve a revision to its full commit id.
pub async fn rev_parse(dir: &Path, rev: &str) -> Result<String, TemperError> {
    git(dir, &["rev-parse", "--verify", &format!("{rev}^{{commit}}")]).await
}

pub async fn short_rev(dir: &Path, rev: &str) -> Result<String, TemperError> {
    let len = format!("--short={SHORT_REV_LEN}");
    git(dir, &["rev-parse", &len, rev]).await
}

/// Commits on `base..head`.
pub async fn commit_count(dir: &Path, base: &str, head: &str) -> Result<u64, TemperError> {
    let range = format!("{base}..{head}");
    let out = git(dir, &["rev-list", "--count", &range]).await?;
    out.parse()
        .map_err(|_| TemperError::Git(format!("rev-list --count returned {out:?}")))
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::Path;
    use std::process::Command;

    /// Minimal repo fixture: configured identity plus one commit.
    pub fn init_repo(dir: &Path) {
        run(dir, &["git", "init", "-q"]);
        run(dir, &["git", "config", "user.email", "temper@example.com"]);
        run(dir, &["git", "config", "user.name", "temper"]);
        std::fs::write(dir.join("README.md"), "fixture\n").unwrap();
        run(dir, &["git", "add", "."]);
        run(dir, &["git", "commit", "-q", "-m", "init"]);
    }

    pub fn commit_change(dir: &Path, file: &str, content: &str, msg: &str) {
        std::fs::write(dir.join(file), content).unwrap();
        run(dir, &["git", "add", "."]);
        run(dir, &["git", "commit", "-q", "-m", msg]);
    }

    pub fn run(dir: &Path, args: &[&str]) {
        let out = Command::new(args[0])
            .args(&args[1..])
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "command failed: {:?}\nstdout:{}\nstderr:{}",
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[tokio::test]
    async fn resolves_revisions_and_counts_commits() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_change(dir.path(), "a.txt", "one\n", "first");
        commit_change(dir.path(), "b.txt", "two\n", "second");

        let head = rev_parse(dir.path(), "HEAD").await.unwrap();
        assert_eq!(head.len(), 40);

        let short = short_rev(dir.path(), "HEAD").await.unwrap();
        assert!(head.starts_with(&short));
        assert!(short.len() >= SHORT_REV_LEN);

        let count = commit_count(dir.path(), "HEAD~2", "HEAD").await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn bad_revision_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let err = rev_parse(dir.path(), "does-not-exist").await;
        assert!(matches!(err, Err(TemperError::Git(_))));
    }

    #[tokio::test]
    async fn repo_and_cleanliness_checks() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        assert!(is_repo(dir.path()).await);
        assert!(tree_is_clean(dir.path()).await.unwrap());

        std::fs::write(dir.path().join("README.md"), "dirty\n").unwrap();
        assert!(!tree_is_clean(dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn non_repo_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_repo(dir.path()).await);
    }
}
