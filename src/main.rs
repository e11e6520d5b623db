// src/main.rs

use std::process::ExitCode;

use dagrun::{cli, config, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("dagrun error: {err:?}");
            ExitCode::from(1)
        }
    }
}

/// Returns whether the run completed without failures.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    let cfg = config::load_and_validate(&args.config)?;
    logging::init_logging(args.log_level, &cfg.logging)?;
    let summary = run(&args, &cfg).await?;
    Ok(summary.is_success())
}
