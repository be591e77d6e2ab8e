//! W3C WebDriver client
//!
//! Talks to a WebDriver endpoint (chromedriver by default) over its JSON wire
//! protocol. Only the commands the lifecycle flows need are implemented.

use super::{Browser, ElementRef, Locator};
use crate::config::RunConfig;
use crate::errors::{BrowserError, LifelineError, Result};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Key under which W3C drivers return element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Connection and window settings for a WebDriver session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebDriverOptions {
    pub endpoint: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub request_timeout: Duration,
}

impl WebDriverOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            endpoint: config.webdriver_url.clone(),
            headless: config.headless,
            window_width: config.window_width,
            window_height: config.window_height,
            request_timeout: config.http_timeout(),
        }
    }

    /// New-session payload requesting Chrome
    pub fn capabilities(&self) -> Value {
        let mut args = vec![format!(
            "--window-size={},{}",
            self.window_width, self.window_height
        )];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

/// Browser session driven through a WebDriver endpoint
#[derive(Debug)]
pub struct WebDriverBrowser {
    client: reqwest::Client,
    endpoint: String,
    session_id: Mutex<Option<String>>,
}

impl WebDriverBrowser {
    /// Open a new session and size its window
    #[instrument(skip(options), fields(endpoint = %options.endpoint))]
    pub async fn connect(options: &WebDriverOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| BrowserError::Transport(e.to_string()))?;

        let mut browser = Self {
            client,
            endpoint: options.endpoint.trim_end_matches('/').to_string(),
            session_id: Mutex::new(None),
        };

        let created = browser
            .command(Method::POST, "/session", Some(options.capabilities()))
            .await?;
        let session_id = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Malformed("new session without sessionId".to_string()))?
            .to_string();
        debug!("WebDriver session {} created", session_id);
        browser.session_id = Mutex::new(Some(session_id));

        let rect = json!({ "width": options.window_width, "height": options.window_height });
        let path = browser.session_path("/window/rect")?;
        if let Err(e) = browser.command(Method::POST, &path, Some(rect)).await {
            // No guard owns the session yet; release it here
            if let Err(quit_error) = browser.quit().await {
                warn!("Failed to release WebDriver session after setup error: {}", quit_error);
            }
            return Err(e);
        }

        Ok(browser)
    }

    /// Identifier of the live session, if not yet quit
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|id| id.clone())
    }

    fn session_path(&self, suffix: &str) -> Result<String> {
        let id = self.session_id().ok_or(BrowserError::Closed)?;
        Ok(format!("/session/{}{}", id, suffix))
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.endpoint, path);
        debug!("WebDriver {} {}", method, path);

        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BrowserError::Transport(format!("{} {}: {}", method, url, e)))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| BrowserError::Malformed(format!("{} {}: {}", method, path, e)))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        let reported_error = value.get("error").and_then(Value::as_str);
        if !status.is_success() || reported_error.is_some() {
            return Err(BrowserError::Protocol {
                error: reported_error
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("http {}", status.as_u16())),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }
            .into());
        }
        Ok(value)
    }

    async fn element_command(
        &self,
        method: Method,
        element: &ElementRef,
        suffix: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let path = self.session_path(&format!("/element/{}{}", element.id(), suffix))?;
        self.command(method, &path, body).await
    }
}

#[async_trait::async_trait]
impl Browser for WebDriverBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let path = self.session_path("/url")?;
        self.command(Method::POST, &path, Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn clear_cookies(&self) -> Result<()> {
        let path = self.session_path("/cookie")?;
        self.command(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> Result<Option<ElementRef>> {
        let (using, value) = locator.to_webdriver();
        let path = self.session_path("/element")?;
        let found = match self
            .command(
                Method::POST,
                &path,
                Some(json!({ "using": using, "value": value })),
            )
            .await
        {
            Ok(found) => found,
            Err(LifelineError::Browser(BrowserError::Protocol { error, .. }))
                if error == "no such element" =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let id = found
            .get(ELEMENT_KEY)
            .or_else(|| found.get("ELEMENT"))
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Malformed(format!("element reference missing: {}", found)))?;
        Ok(Some(ElementRef::new(id)))
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool> {
        let value = self
            .element_command(Method::GET, element, "/displayed", None)
            .await?;
        value.as_bool().ok_or_else(|| {
            BrowserError::Malformed(format!("displayed is not a boolean: {}", value)).into()
        })
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.element_command(
            Method::POST,
            element,
            "/value",
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.element_command(Method::POST, element, "/click", Some(json!({})))
            .await?;
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        let Some(id) = self.session_id.lock().ok().and_then(|mut id| id.take()) else {
            return Ok(());
        };
        debug!("Deleting WebDriver session {}", id);
        self.command(Method::DELETE, &format!("/session/{}", id), None)
            .await?;
        Ok(())
    }
}
