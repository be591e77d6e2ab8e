//! Platform management client
//!
//! Thin typed wrapper over the platform CLI (`cloudron` by default). Every
//! mutation is a blocking invocation that must exit successfully; the two
//! read operations (`inspect`, `backup list --raw`) parse JSON output.

use crate::config::RunConfig;
use crate::errors::{ProcessError, Result};
use crate::process::{CommandRunner, CommandSpec};
use crate::redaction::redact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

/// One installed app as reported by `inspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    pub id: String,
    pub location: String,
    pub fqdn: String,
}

#[derive(Debug, Deserialize)]
struct Inspection {
    #[serde(default)]
    apps: Vec<AppRecord>,
}

/// One entry of `backup list --raw`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    #[serde(default, rename = "creationTime", alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Client for the platform management CLI
#[derive(Clone)]
pub struct PlatformClient {
    runner: Arc<dyn CommandRunner>,
    base: CommandSpec,
    workdir: Option<PathBuf>,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base", &self.base.to_string())
            .field("workdir", &self.workdir)
            .finish()
    }
}

impl PlatformClient {
    pub fn new(runner: Arc<dyn CommandRunner>, base: CommandSpec, workdir: Option<PathBuf>) -> Self {
        Self {
            runner,
            base,
            workdir,
        }
    }

    /// Client for the configured platform command line
    pub fn from_config(runner: Arc<dyn CommandRunner>, config: &RunConfig) -> Result<Self> {
        Ok(Self::new(
            runner,
            CommandSpec::parse(&config.platform_cli)?,
            config.platform_workdir.clone(),
        ))
    }

    fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base
            .clone()
            .args(args)
            .current_dir(self.workdir.as_deref())
    }

    async fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = self.command(args);
        Ok(self.runner.run(&spec).await?.stdout)
    }

    /// Run a mutation and surface what the CLI printed
    async fn run_logged<I, S>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stdout = self.run(args).await?;
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            info!("{}: {}", self.base.program, redact(line.trim_end()));
        }
        Ok(())
    }

    /// All installed apps
    #[instrument(skip(self))]
    pub async fn inspect(&self) -> Result<Vec<AppRecord>> {
        let stdout = self.run(["inspect"]).await?;
        let inspection: Inspection =
            serde_json::from_str(&stdout).map_err(|e| ProcessError::Output {
                command: self.command(["inspect"]).to_string(),
                message: format!("invalid inspect JSON: {}", e),
            })?;
        Ok(inspection.apps)
    }

    /// Install at `location`, from the marketplace when `marketplace_id` is given
    /// and from the local package otherwise
    #[instrument(skip(self))]
    pub async fn install(&self, location: &str, marketplace_id: Option<&str>) -> Result<()> {
        let mut args = vec!["install".to_string()];
        if let Some(id) = marketplace_id {
            args.push("--appstore-id".to_string());
            args.push(id.to_string());
        }
        args.push("--location".to_string());
        args.push(location.to_string());
        self.run_logged(args).await?;
        info!("Installed app at location {}", location);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn uninstall(&self, app_id: &str) -> Result<()> {
        self.run_logged(["uninstall", "--app", app_id]).await?;
        info!("Uninstalled app {}", app_id);
        Ok(())
    }

    /// Move the app to a new location; its identity is kept
    #[instrument(skip(self))]
    pub async fn configure(&self, app_id: &str, location: &str) -> Result<()> {
        self.run_logged(["configure", "--location", location, "--app", app_id])
            .await?;
        info!("Moved app {} to location {}", app_id, location);
        Ok(())
    }

    /// Update in place; the platform addresses the app by location here
    #[instrument(skip(self))]
    pub async fn update(&self, location: &str) -> Result<()> {
        self.run_logged(["update", "--app", location]).await?;
        info!("Updated app at location {}", location);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn backup_create(&self, app_id: &str) -> Result<()> {
        self.run_logged(["backup", "create", "--app", app_id]).await?;
        info!("Created backup of app {}", app_id);
        Ok(())
    }

    /// Backups of the app in the order the platform reports them
    #[instrument(skip(self))]
    pub async fn backup_list(&self, app_id: &str) -> Result<Vec<BackupRecord>> {
        let args = ["backup", "list", "--raw", "--app", app_id];
        let stdout = self.run(args).await?;
        serde_json::from_str(&stdout).map_err(|e| {
            ProcessError::Output {
                command: self.command(args).to_string(),
                message: format!("invalid backup list JSON: {}", e),
            }
            .into()
        })
    }

    #[instrument(skip(self))]
    pub async fn restore(&self, app_id: &str, backup_id: &str) -> Result<()> {
        self.run_logged(["restore", "--backup", backup_id, "--app", app_id])
            .await?;
        info!("Restored app {} from backup {}", app_id, backup_id);
        Ok(())
    }
}
