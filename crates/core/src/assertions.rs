//! Postcondition checks
//!
//! UI checks navigate and wait for the expected text node; HTTP checks probe
//! the resource directly; listing checks go through the data-plane CLI. Every
//! failed check is fatal for the run.

use crate::browser::{Browser, Locator};
use crate::dataplane::DataPlaneClient;
use crate::errors::{AssertionError, LifelineError, ProcessError, Result};
use crate::http::HttpProbe;
use crate::resolver::AppHandle;
use crate::wait::{wait_for, Condition, WaitConfig};
use tracing::{debug, instrument};

/// Checks against one resolved app
pub struct Assertions<'a> {
    pub browser: &'a dyn Browser,
    pub http: &'a dyn HttpProbe,
    pub dataplane: &'a DataPlaneClient,
    pub handle: &'a AppHandle,
    pub wait: WaitConfig,
    pub scheme: &'a str,
    pub admin_path: &'a str,
}

impl<'a> Assertions<'a> {
    async fn page_shows(&self, url: &str, text: &str) -> Result<()> {
        self.browser.navigate(url).await?;
        wait_for(
            self.browser,
            &Locator::text(text),
            Condition::Visible,
            &self.wait,
        )
        .await?;
        debug!("{} shows '{}'", url, text);
        Ok(())
    }

    /// The admin UI lists a file called `name`
    #[instrument(skip(self))]
    pub async fn file_is_listed(&self, name: &str) -> Result<()> {
        let url = self.handle.url(self.scheme, self.admin_path);
        self.page_shows(&url, name).await
    }

    /// The data-plane root listing holds `name`
    #[instrument(skip(self))]
    pub async fn file_is_listed_by_cli(&self, name: &str) -> Result<()> {
        self.dataplane.get(None).await?.require_entry(name)
    }

    /// The data-plane root listing does not hold `name`
    #[instrument(skip(self))]
    pub async fn file_is_unlisted_by_cli(&self, name: &str) -> Result<()> {
        self.dataplane.get(None).await?.require_absent(name)
    }

    /// The file at `path` renders `expected_text`
    #[instrument(skip(self))]
    pub async fn file_is_served_at(&self, path: &str, expected_text: &str) -> Result<()> {
        let url = self.handle.url(self.scheme, path);
        self.page_shows(&url, expected_text).await
    }

    /// The app root renders `expected_text`
    #[instrument(skip(self))]
    pub async fn index_is_served(&self, expected_text: &str) -> Result<()> {
        let url = self.handle.url(self.scheme, "");
        self.page_shows(&url, expected_text).await
    }

    /// A direct fetch of `name` answers 404
    #[instrument(skip(self))]
    pub async fn file_is_gone(&self, name: &str) -> Result<()> {
        let url = self.handle.url(self.scheme, name);
        let status = self.http.status(&url).await?;
        if status != 404 {
            return Err(AssertionError::Status {
                url,
                expected: 404,
                actual: status,
            }
            .into());
        }
        Ok(())
    }

    /// The root listing holds `folder/` and the folder listing holds `member`
    #[instrument(skip(self))]
    pub async fn folder_exists(&self, folder: &str, member: &str) -> Result<()> {
        let folder_entry = folder_entry(folder);
        self.dataplane
            .get(None)
            .await?
            .require_entry(&folder_entry)?;
        self.dataplane
            .get(Some(&folder_entry))
            .await?
            .require_entry(member)
    }

    /// The root listing no longer holds `folder/`, and `member` is not listed
    /// under it. A scoped listing the data plane refuses counts as empty.
    #[instrument(skip(self))]
    pub async fn folder_is_gone(&self, folder: &str, member: &str) -> Result<()> {
        let folder_entry = folder_entry(folder);
        self.dataplane
            .get(None)
            .await?
            .require_absent(&folder_entry)?;
        match self.dataplane.get(Some(&folder_entry)).await {
            Ok(listing) => listing.require_absent(member),
            Err(LifelineError::Process(ProcessError::Failed { .. })) => {
                debug!("{} cannot be listed any more", folder_entry);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn folder_entry(folder: &str) -> String {
    format!("{}/", folder.trim_end_matches('/'))
}

/// A relocation kept the app's identity and moved it to `expected_location`
pub fn relocated(before: &AppHandle, after: &AppHandle, expected_location: &str) -> Result<()> {
    if after.id != before.id {
        return Err(AssertionError::Mismatch {
            what: "app id after relocation".to_string(),
            expected: before.id.clone(),
            actual: after.id.clone(),
        }
        .into());
    }
    if after.location != expected_location {
        return Err(AssertionError::Mismatch {
            what: "app location after relocation".to_string(),
            expected: expected_location.to_string(),
            actual: after.location.clone(),
        }
        .into());
    }
    if after.fqdn == before.fqdn {
        return Err(AssertionError::Mismatch {
            what: "app address after relocation".to_string(),
            expected: format!("anything but {}", before.fqdn),
            actual: after.fqdn.clone(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::{MockBrowser, MockElement, StaticPages};
    use crate::http::mock::MockHttpProbe;
    use crate::process::mock::MockRunner;
    use crate::process::CommandSpec;
    use std::sync::Arc;
    use std::time::Duration;

    fn handle(id: &str, location: &str) -> AppHandle {
        AppHandle {
            id: id.to_string(),
            location: location.to_string(),
            fqdn: format!("{}.example.com", location),
        }
    }

    fn fast() -> WaitConfig {
        WaitConfig {
            timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(5),
        }
    }

    struct Fixture {
        browser: MockBrowser,
        http: MockHttpProbe,
        dataplane: DataPlaneClient,
        handle: AppHandle,
    }

    impl Fixture {
        fn new(runner: MockRunner) -> Self {
            let pages = StaticPages::new()
                .with_page(
                    "https://test.example.com/_admin",
                    vec![MockElement::visible(Locator::text("index.html"))],
                )
                .with_page(
                    "https://test.example.com/index.html",
                    vec![MockElement::visible(Locator::text("test"))],
                )
                .with_page(
                    "https://test.example.com",
                    vec![MockElement::visible(Locator::text("test"))],
                );
            Self {
                browser: MockBrowser::new(pages),
                http: MockHttpProbe::new().with_status("https://test.example.com/index.html", 200),
                dataplane: DataPlaneClient::new(Arc::new(runner), CommandSpec::new("surfer")),
                handle: handle("a1", "test"),
            }
        }

        fn assertions(&self) -> Assertions<'_> {
            Assertions {
                browser: &self.browser,
                http: &self.http,
                dataplane: &self.dataplane,
                handle: &self.handle,
                wait: fast(),
                scheme: "https",
                admin_path: "/_admin",
            }
        }
    }

    #[tokio::test]
    async fn test_ui_checks() {
        let fixture = Fixture::new(MockRunner::new());
        let check = fixture.assertions();
        check.file_is_listed("index.html").await.unwrap();
        check.file_is_served_at("index.html", "test").await.unwrap();
        check.index_is_served("test").await.unwrap();
        assert!(check.file_is_listed("test.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_file_is_gone() {
        let fixture = Fixture::new(MockRunner::new());
        let check = fixture.assertions();
        check.file_is_gone("test.txt").await.unwrap();

        let err = check.file_is_gone("index.html").await.unwrap_err();
        assert!(matches!(
            err,
            LifelineError::Assertion(AssertionError::Status {
                expected: 404,
                actual: 200,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_folder_checks() {
        let runner = MockRunner::new()
            .with_stdout("get", "index.html\ntest/\n")
            .with_stdout("get test/", "index.html\ntest.txt\n");
        let fixture = Fixture::new(runner);
        let check = fixture.assertions();
        check.folder_exists("test", "test.txt").await.unwrap();
        assert!(check.folder_exists("test", "missing.txt").await.is_err());
        assert!(check.folder_is_gone("test", "test.txt").await.is_err());
        check.folder_is_gone("other", "test.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_folder_gone_requires_member_gone() {
        let runner = MockRunner::new()
            .with_stdout("get", "index.html\n")
            .with_stdout("get test/", "test.txt\n");
        let fixture = Fixture::new(runner);
        let err = fixture
            .assertions()
            .folder_is_gone("test", "test.txt")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifelineError::Assertion(AssertionError::UnexpectedEntry { ref entry, .. })
                if entry == "test.txt"
        ));

        let runner = MockRunner::new()
            .with_stdout("get", "index.html\n")
            .with_failure("get test/", 1, "test/ not found");
        let fixture = Fixture::new(runner);
        fixture
            .assertions()
            .folder_is_gone("test", "test.txt")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cli_unlisted_check() {
        let runner = MockRunner::new().with_stdout("get", "index.html\ntest.txt\n");
        let fixture = Fixture::new(runner);
        let check = fixture.assertions();
        check.file_is_unlisted_by_cli("test.tx").await.unwrap();
        assert!(matches!(
            check.file_is_unlisted_by_cli("test.txt").await,
            Err(LifelineError::Assertion(AssertionError::UnexpectedEntry { .. }))
        ));
    }

    #[tokio::test]
    async fn test_cli_listing_check_is_exact() {
        let runner = MockRunner::new().with_stdout("get", "index.html.bak\ntest/\n");
        let fixture = Fixture::new(runner);
        let check = fixture.assertions();
        assert!(matches!(
            check.file_is_listed_by_cli("index.html").await,
            Err(LifelineError::Assertion(AssertionError::MissingEntry { .. }))
        ));
        check.file_is_listed_by_cli("index.html.bak").await.unwrap();
    }

    #[test]
    fn test_relocated() {
        let before = handle("a1", "test");
        let mut after = handle("a1", "test2");
        relocated(&before, &after, "test2").unwrap();

        after.id = "a9".to_string();
        let err = relocated(&before, &after, "test2").unwrap_err();
        assert!(err.to_string().contains("app id after relocation"));

        assert!(relocated(&before, &before, "test").is_err());
    }
}
