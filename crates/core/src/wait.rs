//! Bounded polling waits on UI conditions
//!
//! A wait polls the browser until an element is present (or present and
//! visible) or the configured timeout elapses. Timing out is the only way a
//! wait ends unsuccessfully; browser errors other than a stale element
//! reference propagate immediately.

use crate::browser::{Browser, ElementRef, Locator};
use crate::config::RunConfig;
use crate::errors::{LifelineError, Result, WaitError};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

/// Observable condition a wait polls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// The element exists in the page
    Present,
    /// The element exists and is rendered visibly
    Visible,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Present => write!(f, "present"),
            Condition::Visible => write!(f, "visible"),
        }
    }
}

/// Timeout and poll interval applied to every wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WaitConfig {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            timeout: config.wait_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    fn timed_out(&self, locator: &Locator, condition: Condition) -> LifelineError {
        WaitError::Timeout {
            locator: locator.to_string(),
            condition: condition.to_string(),
            timeout_ms: self.timeout.as_millis() as u64,
        }
        .into()
    }
}

fn is_stale(error: &LifelineError) -> bool {
    matches!(error, LifelineError::Browser(e) if e.is_stale())
}

/// Wait until `locator` satisfies `condition` and return the element.
///
/// `Visible` first waits for presence, then for visibility; each phase gets
/// the full timeout.
#[instrument(skip_all, fields(locator = %locator, condition = %condition))]
pub async fn wait_for(
    browser: &dyn Browser,
    locator: &Locator,
    condition: Condition,
    config: &WaitConfig,
) -> Result<ElementRef> {
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut element = loop {
        if let Some(element) = browser.find_element(locator).await? {
            break element;
        }
        if Instant::now() >= deadline {
            return Err(config.timed_out(locator, Condition::Present));
        }
        trace!("{} not present yet", locator);
        tokio::time::sleep(config.poll_interval).await;
    };

    if condition == Condition::Visible {
        let deadline = Instant::now() + config.timeout;
        loop {
            match browser.is_displayed(&element).await {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) if is_stale(&e) => {
                    // The page re-rendered; look the element up again
                    if let Some(fresh) = browser.find_element(locator).await? {
                        element = fresh;
                    }
                }
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(config.timed_out(locator, Condition::Visible));
            }
            tokio::time::sleep(config.poll_interval).await;
        }
    }

    debug!(
        "{} is {} after {} ms",
        locator,
        condition,
        started.elapsed().as_millis()
    );
    Ok(element)
}
