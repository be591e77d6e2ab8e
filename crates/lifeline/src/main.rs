use anyhow::Result;
use clap::Parser;
use lifeline_core::errors::LifelineError;

mod cli;
mod commands;
mod ui;

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = cli::Cli::parse();

    match parsed.dispatch().await {
        Ok(()) => Ok(()),
        Err(err) => {
            // Configuration problems (missing credentials, bad config file) exit with 2
            if let Some(lifeline_error) = err.downcast_ref::<LifelineError>() {
                if matches!(lifeline_error, LifelineError::Config(_)) {
                    eprintln!("Error: {}", lifeline_error);
                    std::process::exit(2);
                }
            }

            Err(err)
        }
    }
}
