//! Admin UI login and logout
//!
//! Both procedures end by waiting for the element that proves the new state:
//! the menu button after login, the username field after logout.

use crate::browser::Browser;
use crate::config::{Credentials, UiSelectors};
use crate::errors::Result;
use crate::wait::{wait_for, Condition, WaitConfig};
use tracing::{info, instrument};

/// Login and logout against the admin UI
pub struct AuthFlow<'a> {
    browser: &'a dyn Browser,
    selectors: &'a UiSelectors,
    wait: WaitConfig,
}

impl<'a> AuthFlow<'a> {
    pub fn new(browser: &'a dyn Browser, selectors: &'a UiSelectors, wait: WaitConfig) -> Self {
        Self {
            browser,
            selectors,
            wait,
        }
    }

    /// Log in from a clean cookie jar
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, admin_url: &str, credentials: &Credentials) -> Result<()> {
        self.browser.clear_cookies().await?;
        self.browser.navigate(admin_url).await?;

        let username = wait_for(
            self.browser,
            &self.selectors.username_input,
            Condition::Visible,
            &self.wait,
        )
        .await?;
        self.browser
            .send_keys(&username, &credentials.username)
            .await?;

        let password = wait_for(
            self.browser,
            &self.selectors.password_input,
            Condition::Present,
            &self.wait,
        )
        .await?;
        self.browser
            .send_keys(&password, &credentials.password)
            .await?;

        let button = wait_for(
            self.browser,
            &self.selectors.login_button,
            Condition::Present,
            &self.wait,
        )
        .await?;
        self.browser.click(&button).await?;

        wait_for(
            self.browser,
            &self.selectors.menu_button,
            Condition::Visible,
            &self.wait,
        )
        .await?;
        info!("Logged in to {}", admin_url);
        Ok(())
    }

    /// Log out through the menu
    #[instrument(skip(self))]
    pub async fn logout(&self, admin_url: &str) -> Result<()> {
        self.browser.navigate(admin_url).await?;

        let menu = wait_for(
            self.browser,
            &self.selectors.menu_button,
            Condition::Visible,
            &self.wait,
        )
        .await?;
        self.browser.click(&menu).await?;

        // The menu animates open; the entry is clickable once displayed
        let logout = wait_for(
            self.browser,
            &self.selectors.logout_item,
            Condition::Visible,
            &self.wait,
        )
        .await?;
        self.browser.click(&logout).await?;

        wait_for(
            self.browser,
            &self.selectors.username_input,
            Condition::Visible,
            &self.wait,
        )
        .await?;
        info!("Logged out of {}", admin_url);
        Ok(())
    }
}
