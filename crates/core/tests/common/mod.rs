//! Shared test helpers for core integration tests.
//!
//! [`Cloud`] simulates the whole environment a lifecycle run talks to: the
//! platform CLI, the data-plane CLI, the admin UI rendered into a mock
//! browser, and plain HTTP fetches. All four views share one world, so a file
//! uploaded through the CLI shows up in the UI and answers 200 over HTTP.

#![allow(dead_code)]

use lifeline_core::browser::mock::{MockBrowser, MockElement, PageModel};
use lifeline_core::browser::{Browser, Locator};
use lifeline_core::config::{Credentials, RunConfig, UiSelectors};
use lifeline_core::context::RunContext;
use lifeline_core::errors::{ProcessError, Result};
use lifeline_core::fixtures::FixtureSet;
use lifeline_core::http::HttpProbe;
use lifeline_core::process::{CommandOutput, CommandRunner, CommandSpec};
use lifeline_core::wait::WaitConfig;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "integration-secret-77";
pub const DOMAIN: &str = "example.com";

#[derive(Debug, Clone)]
struct App {
    id: String,
    location: String,
    files: BTreeMap<String, String>,
    /// Deleted paths the data plane still lists
    ghosts: BTreeSet<String>,
}

impl App {
    fn fqdn(&self) -> String {
        format!("{}.{}", self.location, DOMAIN)
    }

    fn listed_paths(&self) -> impl Iterator<Item = &str> {
        self.files
            .keys()
            .map(String::as_str)
            .chain(self.ghosts.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone)]
struct Backup {
    id: String,
    app_id: String,
    sequence: u32,
    files: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct World {
    apps: Vec<App>,
    /// Most recent first
    backups: Vec<Backup>,
    next_id: u32,
    cli_fqdn: Option<String>,
    ui_sessions: HashSet<String>,
    menu_open: bool,
    typed_username: Option<String>,
    typed_password: Option<String>,
    commands: Vec<String>,
    restore_resurrects_deleted: bool,
    stale_listing_after_delete: bool,
}

impl World {
    fn app_by_fqdn(&self, fqdn: &str) -> Option<&App> {
        self.apps.iter().find(|app| app.fqdn() == fqdn)
    }

    fn app_by_fqdn_mut(&mut self, fqdn: &str) -> Option<&mut App> {
        self.apps.iter_mut().find(|app| app.fqdn() == fqdn)
    }

    fn app_by_id_mut(&mut self, id: &str) -> Option<&mut App> {
        self.apps.iter_mut().find(|app| app.id == id)
    }
}

/// Simulated platform, data plane, admin UI and web server
#[derive(Debug, Default)]
pub struct Cloud {
    world: Mutex<World>,
}

impl Cloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Environment that already hosts an unrelated app at `location`
    pub fn with_foreign_app(location: &str) -> Arc<Self> {
        let cloud = Self::default();
        {
            let mut world = cloud.world.lock().unwrap();
            world.apps.push(App {
                id: "foreign".to_string(),
                location: location.to_string(),
                files: BTreeMap::new(),
                ghosts: BTreeSet::new(),
            });
        }
        Arc::new(cloud)
    }

    /// Environment whose restore brings back files deleted before the backup
    pub fn with_leaky_restore() -> Arc<Self> {
        let cloud = Self::default();
        cloud.world.lock().unwrap().restore_resurrects_deleted = true;
        Arc::new(cloud)
    }

    /// Environment whose data plane keeps listing files after deleting them
    pub fn with_stale_listing() -> Arc<Self> {
        let cloud = Self::default();
        cloud.world.lock().unwrap().stale_listing_after_delete = true;
        Arc::new(cloud)
    }

    /// Every command run so far, program included
    pub fn commands(&self) -> Vec<String> {
        self.world.lock().unwrap().commands.clone()
    }

    pub fn app_count(&self) -> usize {
        self.world.lock().unwrap().apps.len()
    }

    fn platform(&self, world: &mut World, args: &[String]) -> std::result::Result<String, String> {
        let words: Vec<&str> = args.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["inspect"] => {
                let apps: Vec<_> = world
                    .apps
                    .iter()
                    .map(|app| {
                        json!({
                            "id": app.id,
                            "location": app.location,
                            "fqdn": app.fqdn(),
                            "installationState": "installed",
                        })
                    })
                    .collect();
                Ok(json!({ "apps": apps }).to_string())
            }
            ["install", rest @ ..] => {
                let location = flag(rest, "--location").ok_or("missing --location")?;
                if world.apps.iter().any(|app| app.location == location) {
                    return Err(format!("location {} is in use", location));
                }
                world.next_id += 1;
                let id = format!("app-{}", world.next_id);
                world.apps.push(App {
                    id,
                    location: location.to_string(),
                    files: BTreeMap::new(),
                    ghosts: BTreeSet::new(),
                });
                Ok(String::new())
            }
            ["uninstall", "--app", id] => {
                let before = world.apps.len();
                world.apps.retain(|app| app.id != *id);
                if world.apps.len() == before {
                    return Err(format!("no app {}", id));
                }
                Ok(String::new())
            }
            ["configure", "--location", location, "--app", id] => {
                let app = world.app_by_id_mut(id).ok_or("no such app")?;
                app.location = location.to_string();
                Ok(String::new())
            }
            ["update", "--app", location] => {
                if !world.apps.iter().any(|app| app.location == *location) {
                    return Err(format!("no app at {}", location));
                }
                Ok(String::new())
            }
            ["backup", "create", "--app", id] => {
                let files = world
                    .app_by_id_mut(id)
                    .ok_or("no such app")?
                    .files
                    .clone();
                world.next_id += 1;
                let sequence = world.next_id;
                world.backups.insert(
                    0,
                    Backup {
                        id: format!("backup-{}", sequence),
                        app_id: id.to_string(),
                        sequence,
                        files,
                    },
                );
                Ok(String::new())
            }
            ["backup", "list", "--raw", "--app", id] => {
                let backups: Vec<_> = world
                    .backups
                    .iter()
                    .filter(|b| b.app_id == *id)
                    .map(|b| {
                        json!({
                            "id": b.id,
                            "creationTime": format!("2024-05-01T10:00:{:02}Z", b.sequence % 60),
                        })
                    })
                    .collect();
                Ok(serde_json::Value::Array(backups).to_string())
            }
            ["restore", "--backup", backup, "--app", id] => {
                let mut files = world
                    .backups
                    .iter()
                    .find(|b| b.id == *backup)
                    .ok_or("no such backup")?
                    .files
                    .clone();
                if world.restore_resurrects_deleted {
                    files.insert("test.txt".to_string(), "test".to_string());
                }
                world.app_by_id_mut(id).ok_or("no such app")?.files = files;
                Ok(String::new())
            }
            other => Err(format!("unsupported platform command {:?}", other)),
        }
    }

    fn data_plane(&self, world: &mut World, args: &[String]) -> std::result::Result<String, String> {
        let words: Vec<&str> = args.iter().map(String::as_str).collect();
        if let ["login", fqdn, "--username", user, "--password", password] = words.as_slice() {
            if world.app_by_fqdn(fqdn).is_none() {
                return Err(format!("cannot reach {}", fqdn));
            }
            if *user != USERNAME || *password != PASSWORD {
                return Err("invalid credentials".to_string());
            }
            world.cli_fqdn = Some(fqdn.to_string());
            return Ok("Login successful".to_string());
        }

        let fqdn = world.cli_fqdn.clone().ok_or("not logged in")?;
        let stale_listing = world.stale_listing_after_delete;
        let app = world
            .app_by_fqdn_mut(&fqdn)
            .ok_or_else(|| format!("cannot reach {}", fqdn))?;
        match words.as_slice() {
            ["put", local, "/"] => {
                upload(&mut app.files, Path::new(local)).map_err(|e| e.to_string())?;
                Ok(String::new())
            }
            ["get"] => Ok(listing(app.listed_paths(), "")),
            ["get", dir] => Ok(listing(app.listed_paths(), dir)),
            ["del", "--recursive", name] => {
                let prefix = format!("{}/", name);
                let before = app.files.len();
                app.files
                    .retain(|path, _| path != name && !path.starts_with(&prefix));
                if app.files.len() == before {
                    return Err(format!("{} not found", name));
                }
                Ok(String::new())
            }
            ["del", name] => {
                if app.files.remove(*name).is_none() {
                    return Err(format!("{} not found", name));
                }
                if stale_listing {
                    app.ghosts.insert(name.to_string());
                }
                Ok(String::new())
            }
            other => Err(format!("unsupported data-plane command {:?}", other)),
        }
    }
}

fn flag<'a>(words: &[&'a str], name: &str) -> Option<&'a str> {
    words
        .iter()
        .position(|w| *w == name)
        .and_then(|i| words.get(i + 1).copied())
}

fn upload(files: &mut BTreeMap<String, String>, local: &Path) -> std::io::Result<()> {
    let name = local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if local.is_dir() {
        for entry in std::fs::read_dir(local)? {
            let entry = entry?;
            let content = std::fs::read_to_string(entry.path())?;
            files.insert(
                format!("{}/{}", name, entry.file_name().to_string_lossy()),
                content,
            );
        }
    } else {
        files.insert(name, std::fs::read_to_string(local)?);
    }
    Ok(())
}

/// Entries directly below `dir`, one per line, directories with a trailing `/`
fn listing<'a>(paths: impl Iterator<Item = &'a str>, dir: &str) -> String {
    let prefix = if dir.is_empty() || dir == "/" {
        String::new()
    } else {
        format!("{}/", dir.trim_end_matches('/'))
    };
    let entries: BTreeSet<String> = paths
        .filter_map(|path| path.strip_prefix(prefix.as_str()))
        .map(|rest| match rest.split_once('/') {
            Some((folder, _)) => format!("{}/", folder),
            None => rest.to_string(),
        })
        .collect();
    entries.into_iter().map(|e| e + "\n").collect()
}

/// Text a browser would render for a served file
fn rendered_text(content: &str) -> String {
    match (content.find("<body>"), content.find("</body>")) {
        (Some(start), Some(end)) if start < end => content[start + 6..end].to_string(),
        _ => content.to_string(),
    }
}

fn split_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("https://")?;
    Some(match rest.split_once('/') {
        Some((host, path)) => (host, path),
        None => (rest, ""),
    })
}

#[async_trait::async_trait]
impl CommandRunner for Cloud {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut world = self.world.lock().unwrap();
        world.commands.push(spec.command_line());
        let outcome = match spec.program.as_str() {
            "cloudron" => self.platform(&mut world, &spec.args),
            "surfer" => self.data_plane(&mut world, &spec.args),
            other => Err(format!("{}: command not found", other)),
        };
        outcome
            .map(|stdout| CommandOutput {
                stdout,
                stderr: String::new(),
            })
            .map_err(|stderr| {
                ProcessError::Failed {
                    command: spec.to_string(),
                    code: Some(1),
                    stderr,
                }
                .into()
            })
    }
}

impl PageModel for Cloud {
    fn render(&self, url: &str) -> Vec<MockElement> {
        let selectors = UiSelectors::default();
        let world = self.world.lock().unwrap();
        let Some((host, path)) = split_url(url) else {
            return vec![];
        };
        let Some(app) = world.app_by_fqdn(host) else {
            return vec![];
        };

        match path {
            "_admin" => {
                if !world.ui_sessions.contains(host) {
                    return vec![
                        MockElement::visible(selectors.username_input),
                        MockElement::visible(selectors.password_input),
                        MockElement::visible(selectors.login_button),
                    ];
                }
                let mut elements = vec![MockElement::visible(selectors.menu_button)];
                if world.menu_open {
                    elements.push(MockElement::visible(selectors.logout_item));
                }
                let names: BTreeSet<&str> = app
                    .files
                    .keys()
                    .map(|path| path.split('/').next().unwrap_or(path))
                    .collect();
                elements.extend(
                    names
                        .into_iter()
                        .map(|name| MockElement::visible(Locator::text(name))),
                );
                elements
            }
            "" => app
                .files
                .get("index.html")
                .map(|content| vec![MockElement::visible(Locator::text(rendered_text(content)))])
                .unwrap_or_default(),
            file => app
                .files
                .get(file)
                .map(|content| vec![MockElement::visible(Locator::text(rendered_text(content)))])
                .unwrap_or_default(),
        }
    }

    fn click(&self, url: &str, locator: &Locator) -> Option<String> {
        let selectors = UiSelectors::default();
        let mut world = self.world.lock().unwrap();
        let host = split_url(url)?.0.to_string();
        if *locator == selectors.login_button {
            let valid = world.typed_username.as_deref() == Some(USERNAME)
                && world.typed_password.as_deref() == Some(PASSWORD);
            world.typed_username = None;
            world.typed_password = None;
            if valid {
                world.ui_sessions.insert(host);
            }
        } else if *locator == selectors.menu_button {
            world.menu_open = true;
        } else if *locator == selectors.logout_item {
            world.ui_sessions.remove(&host);
            world.menu_open = false;
        }
        None
    }

    fn type_text(&self, _url: &str, locator: &Locator, text: &str) {
        let selectors = UiSelectors::default();
        let mut world = self.world.lock().unwrap();
        if *locator == selectors.username_input {
            world.typed_username = Some(text.to_string());
        } else if *locator == selectors.password_input {
            world.typed_password = Some(text.to_string());
        }
    }

    fn clear_cookies(&self) {
        let mut world = self.world.lock().unwrap();
        world.ui_sessions.clear();
        world.menu_open = false;
    }
}

#[async_trait::async_trait]
impl HttpProbe for Cloud {
    async fn status(&self, url: &str) -> Result<u16> {
        let world = self.world.lock().unwrap();
        let served = split_url(url)
            .and_then(|(host, path)| {
                world
                    .app_by_fqdn(host)
                    .map(|app| app.files.contains_key(path))
            })
            .unwrap_or(false);
        Ok(if served { 200 } else { 404 })
    }
}

/// Everything one simulated run needs
pub struct Harness {
    pub cloud: Arc<Cloud>,
    pub browser: Arc<MockBrowser>,
    pub ctx: RunContext,
    _fixtures_dir: TempDir,
}

pub fn fast_wait() -> WaitConfig {
    WaitConfig {
        timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(5),
    }
}

pub fn harness(cloud: Arc<Cloud>) -> Harness {
    harness_with_credentials(cloud, Credentials::new(USERNAME, PASSWORD))
}

pub fn harness_with_credentials(cloud: Arc<Cloud>, credentials: Credentials) -> Harness {
    let config = RunConfig::default();
    let dir = tempfile::tempdir().unwrap();
    let fixtures =
        FixtureSet::materialize(dir.path(), &config.fixture_folder, &config.fixture_text).unwrap();
    let browser = Arc::new(MockBrowser::new(cloud.clone()));
    let ctx = RunContext::from_config(
        config,
        credentials,
        cloud.clone(),
        browser.clone() as Arc<dyn Browser>,
        cloud.clone(),
        fixtures,
    )
    .unwrap()
    .with_wait(fast_wait());
    Harness {
        cloud,
        browser,
        ctx,
        _fixtures_dir: dir,
    }
}
