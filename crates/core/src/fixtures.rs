//! Fixture files uploaded through the data plane
//!
//! The run writes its fixtures into a scratch directory so it does not depend
//! on files shipped next to the binary. The layout mirrors what the folder
//! upload expects: `<base>/<folder>/index.html` and `<base>/<folder>/test.txt`.

use crate::errors::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Served as the app's index page
pub const INDEX_FILE: &str = "index.html";
/// Uploaded, deleted, and expected to stay deleted
pub const TEXT_FILE: &str = "test.txt";

/// Materialized fixture files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSet {
    folder: PathBuf,
    folder_name: String,
    text: String,
}

impl FixtureSet {
    /// Write the fixtures below `base_dir`
    pub fn materialize(base_dir: &Path, folder_name: &str, text: &str) -> Result<Self> {
        let folder = base_dir.join(folder_name);
        fs::create_dir_all(&folder)?;
        fs::write(folder.join(INDEX_FILE), index_document(text))?;
        fs::write(folder.join(TEXT_FILE), text)?;
        debug!("Fixtures written to {}", folder.display());
        Ok(Self {
            folder,
            folder_name: folder_name.to_string(),
            text: text.to_string(),
        })
    }

    pub fn index_file(&self) -> PathBuf {
        self.folder.join(INDEX_FILE)
    }

    pub fn text_file(&self) -> PathBuf {
        self.folder.join(TEXT_FILE)
    }

    /// Local folder holding both files
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Name the folder has once uploaded
    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    /// Text every fixture renders
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn index_document(text: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><body>{}</body></html>\n",
        escape_html(text)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
