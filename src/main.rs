mod boot;
mod checkpatch;
mod cli;
mod config;
mod diff;
mod error;
mod git;
mod job;
mod report;
mod run;
mod scheduler;
mod tui;
mod warnings;
mod worktree;

use clap::Parser;

use cli::Cli;
use config::RunConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = RunConfig::new(cli.jobs, cli.boot_timeout, cli.strict_lines, cli.keep_logs);

    match run::execute(&cli.baseline, &cli.kernel_dir, config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("\n  \x1b[31m✗\x1b[0m {e}\n");
            std::process::exit(2);
        }
    }
}
