//! Data-plane file operations
//!
//! Wraps the data-plane CLI (`surfer` by default): login, upload, listing and
//! deletion. Listings are parsed into [`Listing`] values so presence checks
//! compare whole entries instead of searching raw output.

use crate::config::{Credentials, RunConfig};
use crate::errors::{AssertionError, Result};
use crate::process::{CommandRunner, CommandSpec};
use crate::redaction::add_global_secret;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Parsed output of a `get` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Remote directory that was listed (`/` for the root)
    pub scope: String,
    pub entries: Vec<String>,
    /// Unparsed output, kept for error messages
    pub raw: String,
}

impl Listing {
    /// One entry per non-empty line. Directories keep their trailing `/`.
    pub fn parse(scope: &str, raw: &str) -> Self {
        let entries = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            scope: scope.to_string(),
            entries,
            raw: raw.to_string(),
        }
    }

    /// Whether an entry is exactly `name`.
    ///
    /// Lines carrying extra columns (size, date) match on their last
    /// whitespace-separated field.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| {
            entry == name || entry.split_whitespace().next_back() == Some(name)
        })
    }

    pub fn require_entry(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Ok(());
        }
        Err(AssertionError::MissingEntry {
            scope: self.scope.clone(),
            entry: name.to_string(),
            listing: self.raw.clone(),
        }
        .into())
    }

    pub fn require_absent(&self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Ok(());
        }
        Err(AssertionError::UnexpectedEntry {
            scope: self.scope.clone(),
            entry: name.to_string(),
            listing: self.raw.clone(),
        }
        .into())
    }
}

/// Client for the data-plane CLI
#[derive(Clone)]
pub struct DataPlaneClient {
    runner: Arc<dyn CommandRunner>,
    base: CommandSpec,
}

impl std::fmt::Debug for DataPlaneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPlaneClient")
            .field("base", &self.base.to_string())
            .finish()
    }
}

impl DataPlaneClient {
    pub fn new(runner: Arc<dyn CommandRunner>, base: CommandSpec) -> Self {
        Self { runner, base }
    }

    pub fn from_config(runner: Arc<dyn CommandRunner>, config: &RunConfig) -> Result<Self> {
        Ok(Self::new(runner, CommandSpec::parse(&config.data_plane_cli)?))
    }

    async fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = self.base.clone().args(args);
        Ok(self.runner.run(&spec).await?.stdout)
    }

    /// Authenticate the CLI against the app at `fqdn`
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, fqdn: &str, credentials: &Credentials) -> Result<()> {
        add_global_secret(&credentials.password);
        self.run([
            "login",
            fqdn,
            "--username",
            credentials.username.as_str(),
            "--password",
            credentials.password.as_str(),
        ])
        .await?;
        info!("Data-plane CLI logged in to {}", fqdn);
        Ok(())
    }

    /// Upload a local file or directory into `remote_dir`
    #[instrument(skip(self))]
    pub async fn put(&self, local: &Path, remote_dir: &str) -> Result<()> {
        let local = local.display().to_string();
        self.run(["put", local.as_str(), remote_dir]).await?;
        Ok(())
    }

    /// List the root, or `remote` when given
    #[instrument(skip(self))]
    pub async fn get(&self, remote: Option<&str>) -> Result<Listing> {
        let mut args = vec!["get"];
        args.extend(remote);
        let stdout = self.run(args).await?;
        let listing = Listing::parse(remote.unwrap_or("/"), &stdout);
        debug!("Listing of {}: {:?}", listing.scope, listing.entries);
        Ok(listing)
    }

    /// Delete a remote file, or a folder and its contents when `recursive`
    #[instrument(skip(self))]
    pub async fn del(&self, name: &str, recursive: bool) -> Result<()> {
        let mut args = vec!["del"];
        if recursive {
            args.push("--recursive");
        }
        args.push(name);
        self.run(args).await?;
        Ok(())
    }
}
