use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "temper",
    about = "Temper a kernel series: lint, build, diff warnings, boot.",
    version,
    author
)]
pub struct Cli {
    /// Baseline revision the series is compared against
    pub baseline: String,

    /// Kernel repository (defaults to the current directory)
    #[arg(default_value = ".")]
    pub kernel_dir: PathBuf,

    /// Max build/boot jobs running at once
    #[arg(long, default_value_t = crate::config::DEFAULT_JOBS)]
    pub jobs: usize,

    /// Seconds the boot VM may take before it is killed
    #[arg(long, default_value_t = crate::config::DEFAULT_BOOT_TIMEOUT_SECS)]
    pub boot_timeout: u64,

    /// Treat warnings on different lines of the same file as different
    #[arg(long)]
    pub strict_lines: bool,

    /// Keep the log directory even when the run is clean
    #[arg(long)]
    pub keep_logs: bool,
}
