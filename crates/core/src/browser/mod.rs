//! Browser automation capability
//!
//! The orchestrator consumes a browser through the [`Browser`] trait: navigate,
//! clear cookies, locate, inspect visibility, type and click. The production
//! implementation speaks the W3C WebDriver wire protocol ([`webdriver`]); tests
//! use [`mock::MockBrowser`].
//!
//! A run holds exactly one session. [`SessionGuard`] binds its release to the
//! run so it is quit once, whether the run passed or failed.

pub mod mock;
pub mod webdriver;

use crate::errors::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub use webdriver::WebDriverBrowser;

/// Declarative reference to a UI element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    /// Element with the given `id` attribute
    Id(String),
    /// Any element whose own text node equals the given string
    Text(String),
    /// Raw XPath expression
    XPath(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text(text.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    /// WebDriver location strategy and selector for this locator
    pub fn to_webdriver(&self) -> (&'static str, String) {
        match self {
            Locator::Id(id) => (
                "css selector",
                format!("*[id=\"{}\"]", id.replace('\\', "\\\\").replace('"', "\\\"")),
            ),
            Locator::Text(text) => ("xpath", format!("//*[text()={}]", xpath_literal(text))),
            Locator::XPath(expr) => ("xpath", expr.clone()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "id '{}'", id),
            Locator::Text(text) => write!(f, "text '{}'", text),
            Locator::XPath(expr) => write!(f, "xpath '{}'", expr),
        }
    }
}

/// Quote a string as an XPath 1.0 literal; XPath has no escape sequences.
fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{}\"", part))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

/// Opaque handle to an element found in the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    id: String,
}

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Browser automation capability consumed by the orchestrator
#[async_trait::async_trait]
pub trait Browser: Send + Sync {
    /// Load `url` in the current window
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Delete every cookie visible to the current session
    async fn clear_cookies(&self) -> Result<()>;

    /// Locate the first element matching `locator`; `None` when nothing matches
    async fn find_element(&self, locator: &Locator) -> Result<Option<ElementRef>>;

    /// Whether the element is rendered visibly
    async fn is_displayed(&self, element: &ElementRef) -> Result<bool>;

    /// Type `text` into the element
    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()>;

    /// Click the element
    async fn click(&self, element: &ElementRef) -> Result<()>;

    /// End the session and release the browser process
    async fn quit(&self) -> Result<()>;
}

/// Owns the release of the run's single browser session.
///
/// Call [`SessionGuard::close`] once the run is over. A guard dropped without
/// being closed (a panic, an early return) schedules the release on the current
/// tokio runtime instead.
pub struct SessionGuard {
    browser: Option<Arc<dyn Browser>>,
}

impl SessionGuard {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self {
            browser: Some(browser),
        }
    }

    /// Shared handle to the guarded browser
    pub fn browser(&self) -> Result<Arc<dyn Browser>> {
        self.browser
            .clone()
            .ok_or_else(|| BrowserError::Closed.into())
    }

    /// Quit the browser session
    pub async fn close(mut self) -> Result<()> {
        match self.browser.take() {
            Some(browser) => {
                debug!("Releasing browser session");
                browser.quit().await
            }
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(browser) = self.browser.take() else {
            return;
        };
        warn!("Browser session guard dropped without close; releasing in background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = browser.quit().await {
                        warn!("Background browser release failed: {}", e);
                    }
                });
            }
            Err(_) => warn!("No async runtime available; browser session may leak"),
        }
    }
}

/// Run `body` with a browser session that is released afterwards, whatever
/// `body` returned.
///
/// A release failure is reported only when `body` itself succeeded; otherwise
/// the body's error wins and the release failure is logged.
pub async fn with_session<T, F, Fut>(browser: Arc<dyn Browser>, body: F) -> Result<T>
where
    F: FnOnce(Arc<dyn Browser>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let guard = SessionGuard::new(browser.clone());
    let outcome = body(browser).await;
    let released = guard.close().await;
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_error)) => Err(release_error),
        (Err(error), Err(release_error)) => {
            warn!("Browser release failed after error: {}", release_error);
            Err(error)
        }
        (Err(error), Ok(())) => Err(error),
    }
}
