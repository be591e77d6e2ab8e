//! App handle resolution
//!
//! Identity and address of the app under test are re-read from the platform
//! after every mutation that may change them. Apps are matched by location
//! prefix, so after a relocation from `test` to `test2` the original prefix
//! still finds the app.

use crate::errors::{PreconditionError, Result};
use crate::platform::{AppRecord, PlatformClient};
use serde::Serialize;
use tracing::{info, instrument};

/// Snapshot of the deployment's identity and address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppHandle {
    pub id: String,
    pub location: String,
    pub fqdn: String,
}

impl AppHandle {
    /// URL of `path` on the app, e.g. `https://test.example.com/_admin`
    pub fn url(&self, scheme: &str, path: &str) -> String {
        if path.is_empty() {
            format!("{}://{}", scheme, self.fqdn)
        } else if path.starts_with('/') {
            format!("{}://{}{}", scheme, self.fqdn, path)
        } else {
            format!("{}://{}/{}", scheme, self.fqdn, path)
        }
    }
}

impl From<AppRecord> for AppHandle {
    fn from(record: AppRecord) -> Self {
        Self {
            id: record.id,
            location: record.location,
            fqdn: record.fqdn,
        }
    }
}

/// The single app whose location starts with `prefix`
pub fn select_unique(apps: Vec<AppRecord>, prefix: &str) -> Result<AppHandle> {
    let mut matching: Vec<AppRecord> = apps
        .into_iter()
        .filter(|app| app.location.starts_with(prefix))
        .collect();
    if matching.len() != 1 {
        return Err(PreconditionError::AppCount {
            prefix: prefix.to_string(),
            found: matching.len(),
        }
        .into());
    }
    Ok(matching.remove(0).into())
}

/// Query the platform and resolve the app for `prefix`
#[instrument(skip(platform))]
pub async fn resolve(platform: &PlatformClient, prefix: &str) -> Result<AppHandle> {
    let handle = select_unique(platform.inspect().await?, prefix)?;
    info!(
        "Resolved app {} at {} ({})",
        handle.id, handle.fqdn, handle.location
    );
    Ok(handle)
}
