//! Run configuration
//!
//! Resolution order, lowest precedence first:
//! 1. Built-in defaults ([`RunConfig::default`])
//! 2. Optional TOML file (`--config`)
//! 3. `LIFELINE_*` environment variables
//! 4. CLI flags (applied by the binary)
//!
//! Credentials are never read from the file; they come only from the
//! `USERNAME` and `PASSWORD` environment variables.

use crate::browser::Locator;
use crate::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Environment variable holding the admin username
pub const USERNAME_ENV: &str = "USERNAME";
/// Environment variable holding the admin password
pub const PASSWORD_ENV: &str = "PASSWORD";

/// Admin credentials shared by the UI login and the data-plane login
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read `USERNAME` and `PASSWORD` from the process environment.
    ///
    /// Both must be present and non-empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Credentials::from_env`] with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| -> Result<String> {
            match lookup(name) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(ConfigError::MissingEnv {
                    name: name.to_string(),
                }
                .into()),
            }
        };
        Ok(Self {
            username: read(USERNAME_ENV)?,
            password: read(PASSWORD_ENV)?,
        })
    }
}

/// Element locators for the admin UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiSelectors {
    /// Username field on the login form; its presence means "logged out"
    pub username_input: Locator,
    pub password_input: Locator,
    pub login_button: Locator,
    /// Menu button; its presence means "logged in"
    pub menu_button: Locator,
    /// Logout entry inside the menu
    pub logout_item: Locator,
}

impl Default for UiSelectors {
    fn default() -> Self {
        Self {
            username_input: Locator::id("usernameInput"),
            password_input: Locator::id("passwordInput"),
            login_button: Locator::id("loginButton"),
            menu_button: Locator::id("burgerMenuButton"),
            logout_item: Locator::xpath(r#"//span[text() = "Logout"]"#),
        }
    }
}

/// Complete configuration of a lifecycle run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Location (subdomain) the app is installed at; also the resolution prefix
    pub location: String,
    /// Suffix appended to `location` by the relocation stage
    pub relocation_suffix: String,
    /// Marketplace identifier used by the fresh-install stage
    pub marketplace_id: String,
    /// Platform management command line (may include arguments)
    pub platform_cli: String,
    /// Working directory for platform commands (the app package checkout)
    pub platform_workdir: Option<PathBuf>,
    /// Data-plane client command line (may include arguments)
    pub data_plane_cli: String,
    /// W3C WebDriver endpoint
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// URL scheme used to reach the app
    pub scheme: String,
    /// Path of the admin UI
    pub admin_path: String,
    /// Upper bound for every UI wait
    pub wait_timeout_ms: u64,
    /// Delay between two polls of a UI condition
    pub poll_interval_ms: u64,
    /// Timeout for direct HTTP probes
    pub http_timeout_ms: u64,
    /// Text written into the fixture files and expected back from the app
    pub fixture_text: String,
    /// Name of the fixture folder uploaded by the folder stage
    pub fixture_folder: String,
    pub selectors: UiSelectors,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            location: "test".to_string(),
            relocation_suffix: "2".to_string(),
            marketplace_id: "io.cloudron.surfer".to_string(),
            platform_cli: "cloudron".to_string(),
            platform_workdir: None,
            data_plane_cli: "surfer".to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
            window_width: 1280,
            window_height: 1024,
            scheme: "https".to_string(),
            admin_path: "/_admin".to_string(),
            wait_timeout_ms: 10_000,
            poll_interval_ms: 100,
            http_timeout_ms: 30_000,
            fixture_text: "test".to_string(),
            fixture_folder: "test".to_string(),
            selectors: UiSelectors::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration: defaults, then the optional file, then the environment
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading run configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            crate::errors::LifelineError::Config(ConfigError::Parsing { message, .. }) => {
                ConfigError::Parsing {
                    path: path.display().to_string(),
                    message,
                }
                .into()
            }
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ConfigError::Parsing {
                path: "<inline>".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Apply `LIFELINE_*` overrides using the given variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LIFELINE_LOCATION") {
            self.location = v;
        }
        if let Some(v) = lookup("LIFELINE_MARKETPLACE_ID") {
            self.marketplace_id = v;
        }
        if let Some(v) = lookup("LIFELINE_PLATFORM_CLI") {
            self.platform_cli = v;
        }
        if let Some(v) = lookup("LIFELINE_DATA_PLANE_CLI") {
            self.data_plane_cli = v;
        }
        if let Some(v) = lookup("LIFELINE_WEBDRIVER_URL") {
            self.webdriver_url = v;
        }
        if let Some(v) = lookup("LIFELINE_HEADLESS") {
            self.headless = parse_bool("LIFELINE_HEADLESS", &v)?;
        }
        if let Some(v) = lookup("LIFELINE_WAIT_TIMEOUT_MS") {
            self.wait_timeout_ms = parse_u64("LIFELINE_WAIT_TIMEOUT_MS", &v)?;
        }
        Ok(())
    }

    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> Result<()> {
            Err(ConfigError::Validation {
                message: message.to_string(),
            }
            .into())
        };

        if self.location.is_empty() {
            return invalid("location must not be empty");
        }
        if self.relocation_suffix.is_empty() {
            return invalid("relocation_suffix must not be empty");
        }
        if self.wait_timeout_ms == 0 {
            return invalid("wait_timeout_ms must be greater than zero");
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be greater than zero");
        }
        if self.fixture_folder.is_empty() || self.fixture_folder.contains('/') {
            return invalid("fixture_folder must be a single path component");
        }
        if !self.admin_path.starts_with('/') {
            return invalid("admin_path must start with '/'");
        }
        for (name, line) in [
            ("platform_cli", &self.platform_cli),
            ("data_plane_cli", &self.data_plane_cli),
        ] {
            match shell_words::split(line) {
                Ok(words) if !words.is_empty() => {}
                Ok(_) => return invalid(&format!("{} must not be empty", name)),
                Err(e) => {
                    return invalid(&format!("{} is not a valid command line: {}", name, e))
                }
            }
        }
        Ok(())
    }

    /// Location the relocation stage moves the app to
    pub fn relocated_location(&self) -> String {
        format!("{}{}", self.location, self.relocation_suffix)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Validation {
            message: format!("{} must be a boolean, got '{}'", name, value),
        }
        .into()),
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        ConfigError::Validation {
            message: format!("{} must be a non-negative integer, got '{}'", name, value),
        }
        .into()
    })
}
