use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemperError {
    #[error("preflight failed: {0}")]
    Preflight(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("checkpatch unavailable: {0}")]
    Checkpatch(String),

    #[error("all {0} worktrees failed to provision")]
    NothingProvisioned(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
