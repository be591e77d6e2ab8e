//! Lifecycle script
//!
//! The orchestrator is an ordered list of stages, each made of steps. Every
//! step runs one [`Action`] against the [`RunContext`]. Actions declare the
//! [`Requirement`]s they need from the [`RunState`] and the effect they have
//! on it, which makes ordering mistakes detectable before anything runs
//! ([`LifecycleScript::validate`]) and again while running.
//!
//! Execution is strictly sequential and fail-fast: the first failing step
//! aborts the run and every later step is reported as skipped.

use crate::assertions;
use crate::browser::SessionGuard;
use crate::config::RunConfig;
use crate::context::RunContext;
use crate::errors::{LifelineError, PreconditionError, Result};
use crate::fixtures::{INDEX_FILE, TEXT_FILE};
use crate::progress::{next_event_id, now_millis, ProgressEmitter, ProgressEvent};
use crate::report::{FailureReport, RunReport, StageReport, Status, StepReport};
use crate::resolver;
use chrono::Utc;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Remote directory fixtures are uploaded into
const UPLOAD_DIR: &str = "/";

/// Whether the app exists and whether its handle is current
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Absent,
    /// Installed, but the handle is missing or stale
    Installed,
    Resolved,
}

/// Address the app is reachable at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Original,
    Relocated,
}

/// Abstract state of a run, tracked alongside the real context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunState {
    pub deployment: Deployment,
    pub site: Site,
    pub ui_logged_in: bool,
    /// Address the data-plane CLI is logged in to
    pub cli_site: Option<Site>,
    pub backup_selected: bool,
    /// The browser shows `about:blank`
    pub browser_parked: bool,
}

impl RunState {
    pub fn initial() -> Self {
        Self {
            deployment: Deployment::Absent,
            site: Site::Original,
            ui_logged_in: false,
            cli_site: None,
            backup_selected: false,
            browser_parked: true,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deployment = match self.deployment {
            Deployment::Absent => "absent",
            Deployment::Installed => "installed",
            Deployment::Resolved => "resolved",
        };
        let site = |s: Site| match s {
            Site::Original => "original",
            Site::Relocated => "relocated",
        };
        write!(
            f,
            "deployment={} site={} ui={} cli={} backup={} browser={}",
            deployment,
            site(self.site),
            if self.ui_logged_in { "logged-in" } else { "logged-out" },
            self.cli_site.map(site).unwrap_or("none"),
            if self.backup_selected { "selected" } else { "none" },
            if self.browser_parked { "parked" } else { "on-app" },
        )
    }
}

/// Condition over [`RunState`] an action needs before it may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    NoDeployment,
    Deployed,
    Resolved,
    UiSession,
    /// CLI logged in to the address the app currently has
    CliSession,
    BackupSelected,
    BrowserParked,
}

impl Requirement {
    pub fn holds(&self, state: &RunState) -> bool {
        match self {
            Requirement::NoDeployment => state.deployment == Deployment::Absent,
            Requirement::Deployed => state.deployment != Deployment::Absent,
            Requirement::Resolved => state.deployment == Deployment::Resolved,
            Requirement::UiSession => {
                state.deployment == Deployment::Resolved && state.ui_logged_in
            }
            Requirement::CliSession => {
                state.deployment == Deployment::Resolved && state.cli_site == Some(state.site)
            }
            Requirement::BackupSelected => state.backup_selected,
            Requirement::BrowserParked => state.browser_parked,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Requirement::NoDeployment => "no deployment",
            Requirement::Deployed => "an installed app",
            Requirement::Resolved => "a resolved app handle",
            Requirement::UiSession => "a UI session",
            Requirement::CliSession => "a CLI session for the current address",
            Requirement::BackupSelected => "a selected backup",
            Requirement::BrowserParked => "a parked browser",
        };
        f.write_str(text)
    }
}

/// Fixture an action works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixture {
    IndexFile,
    TextFile,
    Folder,
}

/// One lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    InstallFromMarketplace,
    ResolveHandle,
    UiLogin,
    UiLogout,
    CliLogin,
    Upload(Fixture),
    VerifyListed(Fixture),
    VerifyServed(Fixture),
    VerifyIndexServed,
    DeleteFile(Fixture),
    VerifyGone(Fixture),
    /// The data-plane root listing no longer holds the fixture
    VerifyNotListed(Fixture),
    VerifyFolderPresent,
    DeleteFolder,
    VerifyFolderGone,
    CreateBackup,
    SelectLatestBackup,
    Uninstall,
    Restore,
    /// Navigate to `about:blank` so no wait polls a hostname that is going away
    ParkBrowser { clear_cookies: bool },
    Relocate,
    VerifyRelocated,
    Update,
}

impl Action {
    pub fn requirements(&self) -> &'static [Requirement] {
        use Requirement::*;
        match self {
            Action::Install | Action::InstallFromMarketplace => &[NoDeployment],
            Action::ResolveHandle => &[Deployed],
            Action::UiLogin | Action::CliLogin => &[Resolved],
            Action::UiLogout => &[Resolved, UiSession],
            Action::VerifyListed(_) => &[UiSession, CliSession],
            Action::VerifyServed(_) | Action::VerifyIndexServed | Action::VerifyGone(_) => {
                &[Resolved]
            }
            Action::Upload(_)
            | Action::DeleteFile(_)
            | Action::VerifyNotListed(_)
            | Action::VerifyFolderPresent
            | Action::DeleteFolder
            | Action::VerifyFolderGone => &[CliSession],
            Action::CreateBackup | Action::SelectLatestBackup => &[Resolved],
            Action::Uninstall | Action::Relocate => &[Resolved, BrowserParked],
            Action::Restore => &[Resolved, BackupSelected],
            Action::ParkBrowser { .. } => &[],
            Action::VerifyRelocated | Action::Update => &[Resolved],
        }
    }

    /// State after this action succeeded in `state`
    pub fn apply(&self, state: &mut RunState) {
        match self {
            Action::Install | Action::InstallFromMarketplace => {
                state.deployment = Deployment::Installed;
                state.site = Site::Original;
                state.ui_logged_in = false;
            }
            Action::ResolveHandle => state.deployment = Deployment::Resolved,
            Action::UiLogin => {
                state.ui_logged_in = true;
                state.browser_parked = false;
            }
            Action::UiLogout => {
                state.ui_logged_in = false;
                state.browser_parked = false;
            }
            Action::CliLogin => state.cli_site = Some(state.site),
            Action::VerifyListed(_) | Action::VerifyServed(_) | Action::VerifyIndexServed => {
                state.browser_parked = false;
            }
            Action::SelectLatestBackup => state.backup_selected = true,
            Action::Uninstall => {
                state.deployment = Deployment::Absent;
                state.ui_logged_in = false;
            }
            Action::Restore | Action::Update => state.ui_logged_in = false,
            Action::ParkBrowser { clear_cookies } => {
                state.browser_parked = true;
                if *clear_cookies {
                    state.ui_logged_in = false;
                }
            }
            Action::Relocate => {
                state.deployment = Deployment::Installed;
                state.site = Site::Relocated;
                state.ui_logged_in = false;
            }
            Action::Upload(_)
            | Action::DeleteFile(_)
            | Action::VerifyGone(_)
            | Action::VerifyNotListed(_)
            | Action::VerifyFolderPresent
            | Action::DeleteFolder
            | Action::VerifyFolderGone
            | Action::CreateBackup
            | Action::VerifyRelocated => {}
        }
    }

    /// First unmet requirement in `state`
    pub fn unmet(&self, state: &RunState) -> Option<Requirement> {
        self.requirements()
            .iter()
            .copied()
            .find(|requirement| !requirement.holds(state))
    }

    /// Carry out the action
    pub async fn perform(&self, ctx: &mut RunContext) -> Result<()> {
        match self {
            Action::Install => {
                ctx.platform.install(&ctx.config.location, None).await?;
                ctx.clear_handle();
            }
            Action::InstallFromMarketplace => {
                ctx.platform
                    .install(&ctx.config.location, Some(&ctx.config.marketplace_id))
                    .await?;
                ctx.clear_handle();
            }
            Action::ResolveHandle => {
                let handle = resolver::resolve(&ctx.platform, &ctx.config.location).await?;
                ctx.set_handle(handle);
            }
            Action::UiLogin => {
                let url = ctx.admin_url()?;
                ctx.auth().login(&url, &ctx.credentials).await?;
            }
            Action::UiLogout => {
                let url = ctx.admin_url()?;
                ctx.auth().logout(&url).await?;
            }
            Action::CliLogin => {
                let fqdn = ctx.handle()?.fqdn.clone();
                ctx.dataplane.login(&fqdn, &ctx.credentials).await?;
            }
            Action::Upload(fixture) => {
                let local = match fixture {
                    Fixture::IndexFile => ctx.fixtures.index_file(),
                    Fixture::TextFile => ctx.fixtures.text_file(),
                    Fixture::Folder => ctx.fixtures.folder().to_path_buf(),
                };
                ctx.dataplane.put(&local, UPLOAD_DIR).await?;
            }
            Action::VerifyListed(fixture) => {
                let name = remote_name(ctx, *fixture);
                let assertions = ctx.assertions()?;
                assertions.file_is_listed(&name).await?;
                assertions.file_is_listed_by_cli(&name).await?;
            }
            Action::VerifyServed(fixture) => {
                ctx.assertions()?
                    .file_is_served_at(&remote_name(ctx, *fixture), ctx.fixtures.text())
                    .await?;
            }
            Action::VerifyIndexServed => {
                ctx.assertions()?
                    .index_is_served(ctx.fixtures.text())
                    .await?;
            }
            Action::DeleteFile(fixture) => {
                ctx.dataplane
                    .del(&remote_name(ctx, *fixture), false)
                    .await?;
            }
            Action::VerifyGone(fixture) => {
                ctx.assertions()?
                    .file_is_gone(&remote_name(ctx, *fixture))
                    .await?;
            }
            Action::VerifyNotListed(fixture) => {
                ctx.assertions()?
                    .file_is_unlisted_by_cli(&remote_name(ctx, *fixture))
                    .await?;
            }
            Action::VerifyFolderPresent => {
                ctx.assertions()?
                    .folder_exists(ctx.fixtures.folder_name(), TEXT_FILE)
                    .await?;
            }
            Action::DeleteFolder => {
                ctx.dataplane
                    .del(ctx.fixtures.folder_name(), true)
                    .await?;
            }
            Action::VerifyFolderGone => {
                ctx.assertions()?
                    .folder_is_gone(ctx.fixtures.folder_name(), TEXT_FILE)
                    .await?;
            }
            Action::CreateBackup => {
                let id = ctx.handle()?.id.clone();
                ctx.platform.backup_create(&id).await?;
            }
            Action::SelectLatestBackup => {
                let id = ctx.handle()?.id.clone();
                let backups = ctx.platform.backup_list(&id).await?;
                let newest_reported = backups
                    .iter()
                    .filter_map(|b| b.created_at)
                    .max();
                let latest = backups
                    .into_iter()
                    .next()
                    .ok_or(PreconditionError::NoBackups { app_id: id })?;
                if latest.created_at.is_some() && latest.created_at < newest_reported {
                    debug!(
                        "Backup {} is listed first but is not the newest by timestamp",
                        latest.id
                    );
                }
                info!("Selected backup {}", latest.id);
                ctx.select_backup(latest);
            }
            Action::Uninstall => {
                let id = ctx.handle()?.id.clone();
                ctx.platform.uninstall(&id).await?;
                ctx.clear_handle();
            }
            Action::Restore => {
                let id = ctx.handle()?.id.clone();
                let backup = ctx.backup()?.id.clone();
                ctx.platform.restore(&id, &backup).await?;
            }
            Action::ParkBrowser { clear_cookies } => {
                if *clear_cookies {
                    ctx.browser.clear_cookies().await?;
                }
                ctx.browser.navigate("about:blank").await?;
            }
            Action::Relocate => {
                let before = ctx.handle()?.clone();
                let target = ctx.config.relocated_location();
                ctx.platform.configure(&before.id, &target).await?;
                ctx.remember_relocation_origin(before);
                ctx.clear_handle();
            }
            Action::VerifyRelocated => {
                assertions::relocated(
                    ctx.relocation_origin()?,
                    ctx.handle()?,
                    &ctx.config.relocated_location(),
                )?;
            }
            Action::Update => {
                let location = ctx.handle()?.location.clone();
                ctx.platform.update(&location).await?;
            }
        }
        Ok(())
    }
}

fn remote_name(ctx: &RunContext, fixture: Fixture) -> String {
    match fixture {
        Fixture::IndexFile => INDEX_FILE.to_string(),
        Fixture::TextFile => TEXT_FILE.to_string(),
        Fixture::Folder => ctx.fixtures.folder_name().to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub action: Action,
}

impl Step {
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Stage {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

/// Ordered stages of a lifecycle run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleScript {
    stages: Vec<Stage>,
}

impl LifecycleScript {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The full install → backup → restore → relocate → update → uninstall sequence
    pub fn standard(config: &RunConfig) -> Self {
        use Action::*;
        use Fixture::*;

        let folder = format!("{}/", config.fixture_folder);
        let listed = |f: &str| format!("{} is listed", f);
        let served = |f: &str| format!("{} is served", f);

        let install = Stage::new(
            "install",
            vec![
                Step::new(format!("install app at '{}'", config.location), Install),
                Step::new("resolve app handle", ResolveHandle),
            ],
        );
        let login = Stage::new(
            "login",
            vec![
                Step::new("log in (UI)", UiLogin),
                Step::new("log in (CLI)", CliLogin),
            ],
        );
        let upload_index = Stage::new(
            "upload-index",
            vec![
                Step::new(format!("upload {}", INDEX_FILE), Upload(IndexFile)),
                Step::new(listed(INDEX_FILE), VerifyListed(IndexFile)),
                Step::new(served(INDEX_FILE), VerifyServed(IndexFile)),
                Step::new("index is served at app root", VerifyIndexServed),
            ],
        );
        let delete_file = Stage::new(
            "delete-file",
            vec![
                Step::new(format!("upload {}", TEXT_FILE), Upload(TextFile)),
                Step::new(listed(TEXT_FILE), VerifyListed(TextFile)),
                Step::new(format!("delete {} (CLI)", TEXT_FILE), DeleteFile(TextFile)),
                Step::new(format!("{} is gone", TEXT_FILE), VerifyGone(TextFile)),
                Step::new(
                    format!("{} is no longer listed", TEXT_FILE),
                    VerifyNotListed(TextFile),
                ),
            ],
        );
        let upload_folder = Stage::new(
            "upload-folder",
            vec![
                Step::new(format!("upload folder {}", folder), Upload(Folder)),
                Step::new(format!("folder {} exists", folder), VerifyFolderPresent),
            ],
        );
        let logout = || Step::new("log out (UI)", UiLogout);
        let backup = Stage::new(
            "backup",
            vec![
                Step::new("create backup", CreateBackup),
                Step::new("select latest backup", SelectLatestBackup),
            ],
        );
        let restore = Stage::new(
            "restore",
            vec![
                Step::new("park browser", ParkBrowser { clear_cookies: false }),
                Step::new("uninstall app", Uninstall),
                Step::new(format!("reinstall app at '{}'", config.location), Install),
                Step::new("resolve app handle", ResolveHandle),
                Step::new("restore from backup", Restore),
            ],
        );
        let verify_restore = Stage::new(
            "verify-restore",
            vec![
                Step::new("log in (UI)", UiLogin),
                Step::new(listed(INDEX_FILE), VerifyListed(IndexFile)),
                Step::new(served(INDEX_FILE), VerifyServed(IndexFile)),
                Step::new("index is served at app root", VerifyIndexServed),
                Step::new(format!("{} is still gone", TEXT_FILE), VerifyGone(TextFile)),
                Step::new(
                    format!("{} is still unlisted", TEXT_FILE),
                    VerifyNotListed(TextFile),
                ),
                Step::new(format!("folder {} exists", folder), VerifyFolderPresent),
                logout(),
            ],
        );
        let relocate = Stage::new(
            "relocate",
            vec![
                Step::new("park browser", ParkBrowser { clear_cookies: true }),
                Step::new(
                    format!("move app to '{}'", config.relocated_location()),
                    Relocate,
                ),
                Step::new("resolve app handle", ResolveHandle),
                Step::new("app kept its identity", VerifyRelocated),
            ],
        );
        let verify_relocation = Stage::new(
            "verify-relocation",
            vec![
                Step::new("log in (UI)", UiLogin),
                Step::new("log in (CLI)", CliLogin),
                Step::new(listed(INDEX_FILE), VerifyListed(IndexFile)),
                Step::new(served(INDEX_FILE), VerifyServed(IndexFile)),
                Step::new("index is served at app root", VerifyIndexServed),
                Step::new(format!("folder {} exists", folder), VerifyFolderPresent),
                Step::new(format!("delete folder {} (CLI)", folder), DeleteFolder),
                Step::new(format!("folder {} is gone", folder), VerifyFolderGone),
                logout(),
            ],
        );
        let uninstall = Stage::new(
            "uninstall",
            vec![
                Step::new("park browser", ParkBrowser { clear_cookies: false }),
                Step::new("uninstall app", Uninstall),
            ],
        );
        let marketplace_install = Stage::new(
            "marketplace-install",
            vec![
                Step::new(
                    format!("install {} from marketplace", config.marketplace_id),
                    InstallFromMarketplace,
                ),
                Step::new("resolve app handle", ResolveHandle),
                Step::new("log in (UI)", UiLogin),
                Step::new("log in (CLI)", CliLogin),
                Step::new(format!("upload {}", INDEX_FILE), Upload(IndexFile)),
                Step::new(listed(INDEX_FILE), VerifyListed(IndexFile)),
                Step::new(served(INDEX_FILE), VerifyServed(IndexFile)),
                Step::new("index is served at app root", VerifyIndexServed),
                logout(),
            ],
        );
        let update = Stage::new(
            "update",
            vec![
                Step::new("update app", Update),
                Step::new("log in (UI)", UiLogin),
                Step::new(listed(INDEX_FILE), VerifyListed(IndexFile)),
                Step::new(served(INDEX_FILE), VerifyServed(IndexFile)),
                Step::new("index is served at app root", VerifyIndexServed),
                logout(),
            ],
        );
        let final_uninstall = Stage::new(
            "final-uninstall",
            vec![
                Step::new("park browser", ParkBrowser { clear_cookies: false }),
                Step::new("uninstall app", Uninstall),
            ],
        );

        Self::new(vec![
            install,
            login,
            upload_index,
            delete_file,
            upload_folder,
            Stage::new("logout", vec![logout()]),
            backup,
            restore,
            verify_restore,
            relocate,
            verify_relocation,
            uninstall,
            marketplace_install,
            update,
            final_uninstall,
        ])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.steps.len()).sum()
    }

    /// Walk the script from the initial state and reject the first step whose
    /// requirements would not hold
    pub fn validate(&self) -> Result<RunState> {
        let mut state = RunState::initial();
        for stage in &self.stages {
            for step in &stage.steps {
                check(step, &state)?;
                step.action.apply(&mut state);
            }
        }
        Ok(state)
    }

    /// Run every stage in order, stopping at the first failure
    pub async fn run(
        &self,
        ctx: &mut RunContext,
        emitter: &mut dyn ProgressEmitter,
    ) -> RunReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut state = RunState::initial();
        let mut failure: Option<FailureReport> = None;
        let mut stages = Vec::with_capacity(self.stages.len());

        emit(
            emitter,
            ProgressEvent::RunBegin {
                id: next_event_id(),
                timestamp: now_millis(),
                stages: self.stages.len(),
                steps: self.step_count(),
            },
        );

        for (position, stage) in self.stages.iter().enumerate() {
            let index = position + 1;
            if failure.is_some() {
                stages.push(skipped_stage(index, stage));
                continue;
            }

            let span = info_span!("stage", index, name = %stage.name);
            let report = self
                .run_stage(index, stage, ctx, &mut state, emitter, &mut failure)
                .instrument(span)
                .await;
            stages.push(report);
        }

        let success = failure.is_none();
        let duration_ms = started.elapsed().as_millis() as u64;
        emit(
            emitter,
            ProgressEvent::RunEnd {
                id: next_event_id(),
                timestamp: now_millis(),
                duration_ms,
                success,
            },
        );
        if success {
            info!("Lifecycle run passed in {} ms", duration_ms);
        }

        RunReport {
            success,
            started_at,
            duration_ms,
            stages,
            failure,
            final_handle: ctx.current_handle().cloned(),
            release_error: None,
        }
    }

    /// Run the script and release the browser session afterwards, whatever
    /// the outcome
    pub async fn run_scoped(
        &self,
        guard: SessionGuard,
        ctx: &mut RunContext,
        emitter: &mut dyn ProgressEmitter,
    ) -> RunReport {
        let mut report = self.run(ctx, emitter).await;
        if let Err(e) = guard.close().await {
            warn!("Failed to release browser session: {}", e);
            report.release_error = Some(e.to_string());
            report.success = false;
        }
        report
    }

    async fn run_stage(
        &self,
        index: usize,
        stage: &Stage,
        ctx: &mut RunContext,
        state: &mut RunState,
        emitter: &mut dyn ProgressEmitter,
        failure: &mut Option<FailureReport>,
    ) -> StageReport {
        info!("Stage {}: {}", index, stage.name);
        emit(
            emitter,
            ProgressEvent::StageBegin {
                id: next_event_id(),
                timestamp: now_millis(),
                index,
                name: stage.name.clone(),
            },
        );

        let started = Instant::now();
        let mut steps = Vec::with_capacity(stage.steps.len());
        for step in &stage.steps {
            if failure.is_some() {
                steps.push(StepReport {
                    name: step.name.clone(),
                    status: Status::Skipped,
                    duration_ms: 0,
                });
                continue;
            }

            let step_started = Instant::now();
            let outcome = match check(step, state) {
                Ok(()) => step.action.perform(ctx).await,
                Err(e) => Err(e),
            };
            let duration_ms = step_started.elapsed().as_millis() as u64;

            let status = match outcome {
                Ok(()) => {
                    step.action.apply(state);
                    debug!("Step '{}' passed in {} ms; {}", step.name, duration_ms, state);
                    Status::Passed
                }
                Err(e) => {
                    error!("Step '{}' failed: {}", step.name, e);
                    *failure = Some(failure_report(stage, step, &e));
                    Status::Failed
                }
            };
            emit(
                emitter,
                ProgressEvent::StepEnd {
                    id: next_event_id(),
                    timestamp: now_millis(),
                    stage: stage.name.clone(),
                    step: step.name.clone(),
                    duration_ms,
                    success: status == Status::Passed,
                },
            );
            steps.push(StepReport {
                name: step.name.clone(),
                status,
                duration_ms,
            });
        }

        let success = failure.is_none();
        let duration_ms = started.elapsed().as_millis() as u64;
        emit(
            emitter,
            ProgressEvent::StageEnd {
                id: next_event_id(),
                timestamp: now_millis(),
                index,
                name: stage.name.clone(),
                duration_ms,
                success,
            },
        );

        StageReport {
            index,
            name: stage.name.clone(),
            status: if success { Status::Passed } else { Status::Failed },
            duration_ms,
            steps,
        }
    }
}

fn check(step: &Step, state: &RunState) -> Result<()> {
    match step.action.unmet(state) {
        Some(requirement) => Err(PreconditionError::OutOfOrder {
            step: step.name.clone(),
            required: requirement.to_string(),
            actual: state.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

fn skipped_stage(index: usize, stage: &Stage) -> StageReport {
    StageReport {
        index,
        name: stage.name.clone(),
        status: Status::Skipped,
        duration_ms: 0,
        steps: stage
            .steps
            .iter()
            .map(|step| StepReport {
                name: step.name.clone(),
                status: Status::Skipped,
                duration_ms: 0,
            })
            .collect(),
    }
}

fn failure_report(stage: &Stage, step: &Step, error: &LifelineError) -> FailureReport {
    FailureReport {
        stage: stage.name.clone(),
        step: step.name.clone(),
        kind: error.kind().to_string(),
        message: error.to_string(),
    }
}

fn emit(emitter: &mut dyn ProgressEmitter, event: ProgressEvent) {
    if let Err(e) = emitter.emit(&event) {
        warn!("Failed to emit progress event: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> LifecycleScript {
        LifecycleScript::standard(&RunConfig::default())
    }

    #[test]
    fn test_standard_script_shape() {
        let script = script();
        let names: Vec<&str> = script.stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "install",
                "login",
                "upload-index",
                "delete-file",
                "upload-folder",
                "logout",
                "backup",
                "restore",
                "verify-restore",
                "relocate",
                "verify-relocation",
                "uninstall",
                "marketplace-install",
                "update",
                "final-uninstall",
            ]
        );
        assert_eq!(
            script.stages()[9].steps[1].name,
            "move app to 'test2'"
        );
    }

    #[test]
    fn test_standard_script_is_valid_and_ends_uninstalled() {
        let end = script().validate().unwrap();
        assert_eq!(end.deployment, Deployment::Absent);
        assert!(!end.ui_logged_in);
    }

    #[test]
    fn test_upload_before_cli_login_is_rejected() {
        let script = LifecycleScript::new(vec![Stage::new(
            "broken",
            vec![
                Step::new("install", Action::Install),
                Step::new("resolve", Action::ResolveHandle),
                Step::new("upload index.html", Action::Upload(Fixture::IndexFile)),
            ],
        )]);
        let err = script.validate().unwrap_err();
        match err {
            LifelineError::Precondition(PreconditionError::OutOfOrder { step, required, .. }) => {
                assert_eq!(step, "upload index.html");
                assert_eq!(required, "a CLI session for the current address");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_relocation_invalidates_cli_session_and_handle() {
        let mut state = RunState::initial();
        for action in [
            Action::Install,
            Action::ResolveHandle,
            Action::CliLogin,
            Action::ParkBrowser { clear_cookies: true },
            Action::Relocate,
        ] {
            assert!(action.unmet(&state).is_none(), "{action:?} in {state}");
            action.apply(&mut state);
        }
        assert_eq!(
            Action::VerifyFolderPresent.unmet(&state),
            Some(Requirement::CliSession)
        );
        Action::ResolveHandle.apply(&mut state);
        assert_eq!(
            Action::Upload(Fixture::Folder).unmet(&state),
            Some(Requirement::CliSession)
        );
        Action::CliLogin.apply(&mut state);
        assert!(Action::Upload(Fixture::Folder).unmet(&state).is_none());
    }

    #[test]
    fn test_uninstall_requires_parked_browser() {
        let mut state = RunState::initial();
        Action::Install.apply(&mut state);
        Action::ResolveHandle.apply(&mut state);
        Action::UiLogin.apply(&mut state);
        assert_eq!(
            Action::Uninstall.unmet(&state),
            Some(Requirement::BrowserParked)
        );
    }

    #[test]
    fn test_restore_requires_selected_backup() {
        let mut state = RunState::initial();
        Action::Install.apply(&mut state);
        Action::ResolveHandle.apply(&mut state);
        assert_eq!(
            Action::Restore.unmet(&state),
            Some(Requirement::BackupSelected)
        );
    }

    #[test]
    fn test_double_install_is_rejected() {
        let mut state = RunState::initial();
        Action::Install.apply(&mut state);
        assert_eq!(
            Action::InstallFromMarketplace.unmet(&state),
            Some(Requirement::NoDeployment)
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            RunState::initial().to_string(),
            "deployment=absent site=original ui=logged-out cli=none backup=none browser=parked"
        );
    }
}
