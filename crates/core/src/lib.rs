//! Core library for the lifeline lifecycle test orchestrator
//!
//! This crate contains the orchestrator (ordered lifecycle stages over an
//! explicit run state), the collaborators it drives (platform CLI, data-plane
//! CLI, WebDriver browser, HTTP probe), and the shared configuration, logging,
//! redaction and error handling.

pub mod assertions;
pub mod auth;
pub mod browser;
pub mod config;
pub mod context;
pub mod dataplane;
pub mod errors;
pub mod fixtures;
pub mod http;
pub mod logging;
pub mod platform;
pub mod process;
pub mod progress;
pub mod redaction;
pub mod report;
pub mod resolver;
pub mod script;
pub mod wait;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
