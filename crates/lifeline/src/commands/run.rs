//! `lifeline run`: the full lifecycle sequence against live collaborators

use crate::cli::OutputFormat;
use crate::ui::spinner::SpinnerEmitter;
use crate::ui::summary;
use anyhow::{bail, Context, Result};
use lifeline_core::browser::webdriver::{WebDriverBrowser, WebDriverOptions};
use lifeline_core::browser::{Browser, SessionGuard};
use lifeline_core::config::{Credentials, RunConfig};
use lifeline_core::context::RunContext;
use lifeline_core::fixtures::FixtureSet;
use lifeline_core::http::ReqwestProbe;
use lifeline_core::process::SystemRunner;
use lifeline_core::progress::{ProgressEmitter, SilentEmitter};
use lifeline_core::script::LifecycleScript;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Inputs of `lifeline run`, resolved by the CLI layer
#[derive(Debug)]
pub struct RunArgs {
    pub config: RunConfig,
    pub credentials: Credentials,
    pub output: OutputFormat,
    pub keep_fixtures: bool,
    /// Render progress with a spinner on stderr
    pub spinner: bool,
}

#[instrument(skip_all, fields(location = %args.config.location))]
pub async fn execute(args: RunArgs) -> Result<()> {
    let RunArgs {
        config,
        credentials,
        output,
        keep_fixtures,
        spinner,
    } = args;

    let script = LifecycleScript::standard(&config);
    script.validate()?;

    let fixtures_dir = tempfile::Builder::new()
        .prefix("lifeline-fixtures-")
        .tempdir()
        .context("Failed to create fixture directory")?;
    let fixtures = FixtureSet::materialize(
        fixtures_dir.path(),
        &config.fixture_folder,
        &config.fixture_text,
    )?;

    let http = Arc::new(ReqwestProbe::new(config.http_timeout())?);
    let browser: Arc<dyn Browser> =
        Arc::new(WebDriverBrowser::connect(&WebDriverOptions::from_config(&config)).await?);
    let guard = SessionGuard::new(browser.clone());
    let mut ctx = match RunContext::from_config(
        config,
        credentials,
        Arc::new(SystemRunner),
        browser,
        http,
        fixtures,
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            if let Err(release_error) = guard.close().await {
                warn!("Failed to release browser session: {}", release_error);
            }
            return Err(e.into());
        }
    };

    let mut emitter: Box<dyn ProgressEmitter> = if spinner {
        Box::new(SpinnerEmitter::new())
    } else {
        Box::new(SilentEmitter)
    };
    let report = script.run_scoped(guard, &mut ctx, emitter.as_mut()).await;
    drop(emitter);

    if keep_fixtures {
        let kept = fixtures_dir.into_path();
        info!("Fixtures kept at {}", kept.display());
    }

    match output {
        OutputFormat::Json => println!("{}", summary::render_json(&report)),
        OutputFormat::Text => print!("{}", summary::render_text(&report)),
    }

    if !report.success {
        match &report.failure {
            Some(failure) => bail!(
                "Lifecycle run failed at stage '{}', step '{}'",
                failure.stage,
                failure.step
            ),
            None => bail!("Lifecycle run failed"),
        }
    }
    Ok(())
}
