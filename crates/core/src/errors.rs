//! Error types and handling
//!
//! The taxonomy mirrors the failure classes of a lifecycle run: precondition,
//! timeout, external process, assertion, browser and configuration failures.
//! Each class has its own enum, and all of them are wrapped in [`LifelineError`]
//! for unified propagation. Every failure is fatal for the run; nothing in this
//! module models recovery.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is absent or empty
    #[error("{name} env var needs to be set")]
    MissingEnv { name: String },

    /// Configuration file parsing error
    #[error("Failed to parse configuration file {path}: {message}")]
    Parsing { path: String, message: String },

    /// Configuration validation error
    #[error("Configuration validation error: {message}")]
    Validation { message: String },

    /// Configuration file I/O error
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),
}

/// Violated preconditions: the deployment or the run is not in the state a step requires
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// Resolution expected exactly one deployment for the location prefix
    #[error("Expected exactly one app with location prefix '{prefix}', found {found}")]
    AppCount { prefix: String, found: usize },

    /// A step needs an app handle but none has been resolved yet
    #[error("No app handle has been resolved yet")]
    Unresolved,

    /// A step needs a backup record but none has been selected
    #[error("No backup has been selected")]
    NoBackupSelected,

    /// The backup listing returned no records
    #[error("Backup listing for app {app_id} is empty")]
    NoBackups { app_id: String },

    /// A step was scheduled in a state that does not satisfy its declared requirement
    #[error("Step '{step}' requires {required}, but the run is in state {actual}")]
    OutOfOrder {
        step: String,
        required: String,
        actual: String,
    },
}

/// Bounded wait failures
#[derive(Error, Debug)]
pub enum WaitError {
    /// The condition did not hold before the deadline
    #[error("Timed out after {timeout_ms} ms waiting for {locator} to be {condition}")]
    Timeout {
        locator: String,
        condition: String,
        timeout_ms: u64,
    },
}

/// External command failures
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The program could not be started
    #[error("Failed to spawn '{command}': {message}")]
    Spawn { command: String, message: String },

    /// The program exited unsuccessfully
    #[error("Command '{command}' failed with exit code {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The program succeeded but printed something we could not interpret
    #[error("Unexpected output from '{command}': {message}")]
    Output { command: String, message: String },

    /// A configured command line is empty or cannot be split into words
    #[error("Invalid command line '{command}': {message}")]
    InvalidCommandLine { command: String, message: String },

    /// The blocking task running the command was cancelled or panicked
    #[error("Task join error: {0}")]
    Join(String),
}

/// Observable outcome differs from the expected one
#[derive(Error, Debug)]
pub enum AssertionError {
    /// HTTP status mismatch
    #[error("Expected HTTP {expected} from {url}, got {actual}")]
    Status {
        url: String,
        expected: u16,
        actual: u16,
    },

    /// A listing was expected to contain an entry
    #[error("Expected listing of '{scope}' to contain '{entry}', got:\n{listing}")]
    MissingEntry {
        scope: String,
        entry: String,
        listing: String,
    },

    /// A listing was expected not to contain an entry
    #[error("Expected listing of '{scope}' not to contain '{entry}', got:\n{listing}")]
    UnexpectedEntry {
        scope: String,
        entry: String,
        listing: String,
    },

    /// Any other observed value differs from the expected one
    #[error("Expected {what} to be '{expected}', got '{actual}'")]
    Mismatch {
        what: String,
        expected: String,
        actual: String,
    },
}

/// Browser automation failures
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Transport-level failure talking to the WebDriver endpoint
    #[error("WebDriver transport error: {0}")]
    Transport(String),

    /// The WebDriver endpoint reported a protocol error
    #[error("WebDriver error '{error}': {message}")]
    Protocol { error: String, message: String },

    /// The endpoint answered with a payload we could not interpret
    #[error("Malformed WebDriver response: {0}")]
    Malformed(String),

    /// The session has already been released
    #[error("Browser session is closed")]
    Closed,
}

impl BrowserError {
    /// The element handle outlived the page it was found on
    pub fn is_stale(&self) -> bool {
        matches!(self, BrowserError::Protocol { error, .. } if error == "stale element reference")
    }
}

/// Direct HTTP probe failures (not status mismatches, which are assertions)
#[derive(Error, Debug)]
pub enum HttpError {
    /// The request could not be completed
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum LifelineError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Precondition violations
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// Wait timeouts
    #[error("Wait failed: {0}")]
    Wait(#[from] WaitError),

    /// External command failures
    #[error("External command error: {0}")]
    Process(#[from] ProcessError),

    /// Assertion failures
    #[error("Assertion failed: {0}")]
    Assertion(#[from] AssertionError),

    /// Browser automation failures
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// HTTP probe failures
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Local filesystem failures (fixture materialization)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LifelineError {
    /// Short machine-friendly name of the failure class
    pub fn kind(&self) -> &'static str {
        match self {
            LifelineError::Config(_) => "config",
            LifelineError::Precondition(_) => "precondition",
            LifelineError::Wait(_) => "timeout",
            LifelineError::Process(_) => "process",
            LifelineError::Assertion(_) => "assertion",
            LifelineError::Browser(_) => "browser",
            LifelineError::Http(_) => "http",
            LifelineError::Io(_) => "io",
        }
    }
}

/// Convenience type alias for Results with LifelineError
pub type Result<T> = std::result::Result<T, LifelineError>;
