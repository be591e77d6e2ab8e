//! CLI definition and dispatch

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lifeline_core::config::{Credentials, RunConfig};
use lifeline_core::redaction::add_global_secret;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::debug;

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

/// Run-configuration overrides shared by every subcommand.
///
/// Flags win over the configuration file and `LIFELINE_*` variables.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Location (subdomain) to install the app at
    #[arg(long)]
    pub location: Option<String>,

    /// W3C WebDriver endpoint
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Run the browser headless
    #[arg(long)]
    pub headless: bool,

    /// Platform management command line
    #[arg(long)]
    pub platform_cli: Option<String>,

    /// Data-plane client command line
    #[arg(long)]
    pub data_plane_cli: Option<String>,

    /// Upper bound for every UI wait, in milliseconds
    #[arg(long)]
    pub wait_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(location) = &self.location {
            config.location = location.clone();
        }
        if let Some(url) = &self.webdriver_url {
            config.webdriver_url = url.clone();
        }
        if self.headless {
            config.headless = true;
        }
        if let Some(cli) = &self.platform_cli {
            config.platform_cli = cli.clone();
        }
        if let Some(cli) = &self.data_plane_cli {
            config.data_plane_cli = cli.clone();
        }
        if let Some(ms) = self.wait_timeout_ms {
            config.wait_timeout_ms = ms;
        }
    }
}

/// End-to-end lifecycle tests for a hosted file-sharing app
#[derive(Debug, Parser)]
#[command(name = "lifeline")]
#[command(about = "End-to-end lifecycle tests for a hosted file-sharing app")]
#[command(
    long_about = "Installs the app on a hosting platform, exercises it through its admin UI, \
its data-plane CLI and plain HTTP, then backs it up, restores, relocates, updates and \
uninstalls it, verifying observable state after every mutation."
)]
#[command(version)]
pub struct Cli {
    /// Log format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// TOML run configuration file
    #[arg(long, global = true, env = "LIFELINE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full lifecycle sequence
    Run {
        #[command(flatten)]
        overrides: ConfigOverrides,

        /// Report format written to stdout
        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,

        /// Keep the materialized fixture directory after the run
        #[arg(long)]
        keep_fixtures: bool,
    },

    /// Print the stages and steps of a run and check their ordering
    Plan {
        #[command(flatten)]
        overrides: ConfigOverrides,

        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Resolve the app installed at the configured location
    Resolve {
        #[command(flatten)]
        overrides: ConfigOverrides,

        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
}

impl Cli {
    /// Initialize logging, then run the selected subcommand
    pub async fn dispatch(self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None,
        };

        let mut log_level = match self.log_level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        let stderr_is_tty = std::io::stderr().is_terminal();
        let json_format = matches!(log_format, Some("json"));
        let spinner_eligible =
            matches!(self.command, Commands::Run { .. }) && stderr_is_tty && !json_format;

        if std::env::var_os(lifeline_core::logging::LOG_FILTER_ENV).is_none()
            && std::env::var_os("RUST_LOG").is_none()
        {
            // The spinner owns stderr; keep logging quiet under it
            if spinner_eligible {
                log_level = "warn";
            }
            std::env::set_var(
                "RUST_LOG",
                format!("lifeline={},lifeline_core={}", log_level, log_level),
            );
        }
        lifeline_core::logging::init(log_format)?;
        debug!("CLI initialized with log level: {}", log_level);

        match self.command {
            Commands::Run {
                overrides,
                output,
                keep_fixtures,
            } => {
                // Credentials come first: nothing is spawned or connected without them
                let credentials = Credentials::from_env()?;
                add_global_secret(&credentials.password);

                let config = load_config(self.config.as_deref(), &overrides)?;
                crate::commands::run::execute(crate::commands::run::RunArgs {
                    config,
                    credentials,
                    output,
                    keep_fixtures,
                    spinner: spinner_eligible,
                })
                .await
            }
            Commands::Plan { overrides, output } => {
                let config = load_config(self.config.as_deref(), &overrides)?;
                crate::commands::plan::execute(&config, output)
            }
            Commands::Resolve { overrides, output } => {
                let config = load_config(self.config.as_deref(), &overrides)?;
                crate::commands::resolve::execute(&config, output).await
            }
        }
    }
}

fn load_config(path: Option<&std::path::Path>, overrides: &ConfigOverrides) -> Result<RunConfig> {
    let mut config = RunConfig::load(path)?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}
