use anyhow::{Context, Result};
use dlsort::cli::{self, Args, run_cli};
use dlsort::config::EnginePaths;
use dlsort::engine::SortEngine;
use dlsort::output::OutputFormatter;
use std::process::ExitCode;

mod logging;

fn main() -> ExitCode {
    let args = cli::parse();
    logging::init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let paths = match args.dir {
        Some(dir) => EnginePaths::for_current_user_watching(dir),
        None => EnginePaths::for_current_user(),
    }
    .context("Unable to determine per-user locations")?;

    let engine = SortEngine::new(paths).context("Unable to start the sorting engine")?;
    run_cli(args.command, &engine)
}
