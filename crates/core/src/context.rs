//! Run context
//!
//! Everything a lifecycle step reads or writes travels in one [`RunContext`]:
//! configuration, credentials, collaborator clients, the browser session, and
//! the mutable run data (current app handle, selected backup, the handle the
//! app had before it was relocated).

use crate::assertions::Assertions;
use crate::auth::AuthFlow;
use crate::browser::Browser;
use crate::config::{Credentials, RunConfig};
use crate::dataplane::DataPlaneClient;
use crate::errors::{PreconditionError, Result};
use crate::fixtures::FixtureSet;
use crate::http::HttpProbe;
use crate::platform::{BackupRecord, PlatformClient};
use crate::process::CommandRunner;
use crate::resolver::AppHandle;
use crate::wait::WaitConfig;
use std::sync::Arc;

pub struct RunContext {
    pub config: RunConfig,
    pub credentials: Credentials,
    pub platform: PlatformClient,
    pub dataplane: DataPlaneClient,
    pub browser: Arc<dyn Browser>,
    pub http: Arc<dyn HttpProbe>,
    pub fixtures: FixtureSet,
    pub wait: WaitConfig,
    handle: Option<AppHandle>,
    backup: Option<BackupRecord>,
    relocated_from: Option<AppHandle>,
}

impl RunContext {
    /// Build the context, deriving both CLI clients from `config`
    pub fn from_config(
        config: RunConfig,
        credentials: Credentials,
        runner: Arc<dyn CommandRunner>,
        browser: Arc<dyn Browser>,
        http: Arc<dyn HttpProbe>,
        fixtures: FixtureSet,
    ) -> Result<Self> {
        let platform = PlatformClient::from_config(runner.clone(), &config)?;
        let dataplane = DataPlaneClient::from_config(runner, &config)?;
        Ok(Self {
            wait: WaitConfig::from_config(&config),
            config,
            credentials,
            platform,
            dataplane,
            browser,
            http,
            fixtures,
            handle: None,
            backup: None,
            relocated_from: None,
        })
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// Current app handle; fails until one has been resolved
    pub fn handle(&self) -> Result<&AppHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| PreconditionError::Unresolved.into())
    }

    pub fn current_handle(&self) -> Option<&AppHandle> {
        self.handle.as_ref()
    }

    pub fn set_handle(&mut self, handle: AppHandle) {
        self.handle = Some(handle);
    }

    /// Forget the handle after a mutation that invalidates it
    pub fn clear_handle(&mut self) -> Option<AppHandle> {
        self.handle.take()
    }

    pub fn backup(&self) -> Result<&BackupRecord> {
        self.backup
            .as_ref()
            .ok_or_else(|| PreconditionError::NoBackupSelected.into())
    }

    pub fn select_backup(&mut self, backup: BackupRecord) {
        self.backup = Some(backup);
    }

    pub fn remember_relocation_origin(&mut self, handle: AppHandle) {
        self.relocated_from = Some(handle);
    }

    /// Handle the app had before the last relocation
    pub fn relocation_origin(&self) -> Result<&AppHandle> {
        self.relocated_from
            .as_ref()
            .ok_or_else(|| PreconditionError::Unresolved.into())
    }

    pub fn admin_url(&self) -> Result<String> {
        Ok(self
            .handle()?
            .url(&self.config.scheme, &self.config.admin_path))
    }

    pub fn auth(&self) -> AuthFlow<'_> {
        AuthFlow::new(self.browser.as_ref(), &self.config.selectors, self.wait)
    }

    pub fn assertions(&self) -> Result<Assertions<'_>> {
        Ok(Assertions {
            browser: self.browser.as_ref(),
            http: self.http.as_ref(),
            dataplane: &self.dataplane,
            handle: self.handle()?,
            wait: self.wait,
            scheme: &self.config.scheme,
            admin_path: &self.config.admin_path,
        })
    }
}
