//! Mock browser for testing UI flows
//!
//! [`MockBrowser`] renders pages from a [`PageModel`]: every lookup asks the
//! model which elements the current URL shows, so a model backed by shared
//! state can react to clicks, typing and cookie clearing the way a real
//! application would. [`StaticPages`] is the simplest model, a fixed map from
//! URL to elements.

use super::{Browser, ElementRef, Locator};
use crate::errors::{BrowserError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One element as rendered by a page model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    pub locator: Locator,
    pub displayed: bool,
}

impl MockElement {
    pub fn visible(locator: Locator) -> Self {
        Self {
            locator,
            displayed: true,
        }
    }

    pub fn hidden(locator: Locator) -> Self {
        Self {
            locator,
            displayed: false,
        }
    }
}

/// Source of rendered pages for [`MockBrowser`]
pub trait PageModel: Send + Sync {
    /// Elements shown at `url` right now
    fn render(&self, url: &str) -> Vec<MockElement>;

    /// React to a click; returning a URL navigates there
    fn click(&self, _url: &str, _locator: &Locator) -> Option<String> {
        None
    }

    /// React to typing into an element
    fn type_text(&self, _url: &str, _locator: &Locator, _text: &str) {}

    /// React to cookies being cleared
    fn clear_cookies(&self) {}
}

impl<T: PageModel + ?Sized> PageModel for Arc<T> {
    fn render(&self, url: &str) -> Vec<MockElement> {
        (**self).render(url)
    }

    fn click(&self, url: &str, locator: &Locator) -> Option<String> {
        (**self).click(url, locator)
    }

    fn type_text(&self, url: &str, locator: &Locator, text: &str) {
        (**self).type_text(url, locator, text)
    }

    fn clear_cookies(&self) {
        (**self).clear_cookies()
    }
}

/// Fixed URL → elements map
#[derive(Debug, Clone, Default)]
pub struct StaticPages {
    pages: HashMap<String, Vec<MockElement>>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, elements: Vec<MockElement>) -> Self {
        self.pages.insert(url.to_string(), elements);
        self
    }
}

impl PageModel for StaticPages {
    fn render(&self, url: &str) -> Vec<MockElement> {
        self.pages.get(url).cloned().unwrap_or_default()
    }
}

/// Calls recorded by [`MockBrowser`], in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBrowserCall {
    Navigate(String),
    ClearCookies,
    Click(Locator),
    SendKeys(Locator, String),
    Quit,
}

/// Browser double driven by a [`PageModel`]
pub struct MockBrowser {
    model: Box<dyn PageModel>,
    current_url: Mutex<String>,
    elements: Mutex<HashMap<String, Locator>>,
    next_element: AtomicUsize,
    history: Mutex<Vec<MockBrowserCall>>,
    quits: AtomicUsize,
}

impl MockBrowser {
    pub fn new(model: impl PageModel + 'static) -> Self {
        Self {
            model: Box::new(model),
            current_url: Mutex::new("about:blank".to_string()),
            elements: Mutex::new(HashMap::new()),
            next_element: AtomicUsize::new(1),
            history: Mutex::new(Vec::new()),
            quits: AtomicUsize::new(0),
        }
    }

    /// URL currently loaded
    pub fn current_url(&self) -> String {
        self.current_url.lock().unwrap().clone()
    }

    /// Recorded calls, oldest first
    pub fn history(&self) -> Vec<MockBrowserCall> {
        self.history.lock().unwrap().clone()
    }

    /// Number of times the session was quit
    pub fn quit_count(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    fn record(&self, call: MockBrowserCall) {
        self.history.lock().unwrap().push(call);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.quit_count() > 0 {
            return Err(BrowserError::Closed.into());
        }
        Ok(())
    }

    /// Locator behind an element handle, provided it is still rendered
    fn resolve(&self, element: &ElementRef) -> Result<(String, MockElement)> {
        let locator = self
            .elements
            .lock()
            .unwrap()
            .get(element.id())
            .cloned()
            .ok_or_else(|| BrowserError::Protocol {
                error: "stale element reference".to_string(),
                message: format!("element {} belongs to a previous page", element.id()),
            })?;
        let url = self.current_url();
        self.model
            .render(&url)
            .into_iter()
            .find(|e| e.locator == locator)
            .map(|e| (url, e))
            .ok_or_else(|| {
                BrowserError::Protocol {
                    error: "stale element reference".to_string(),
                    message: format!("{} is no longer attached", locator),
                }
                .into()
            })
    }
}

#[async_trait::async_trait]
impl Browser for MockBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.record(MockBrowserCall::Navigate(url.to_string()));
        *self.current_url.lock().unwrap() = url.to_string();
        self.elements.lock().unwrap().clear();
        Ok(())
    }

    async fn clear_cookies(&self) -> Result<()> {
        self.ensure_open()?;
        self.record(MockBrowserCall::ClearCookies);
        self.model.clear_cookies();
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> Result<Option<ElementRef>> {
        self.ensure_open()?;
        let url = self.current_url();
        let found = self
            .model
            .render(&url)
            .into_iter()
            .any(|e| &e.locator == locator);
        if !found {
            return Ok(None);
        }
        let id = format!("el-{}", self.next_element.fetch_add(1, Ordering::SeqCst));
        self.elements
            .lock()
            .unwrap()
            .insert(id.clone(), locator.clone());
        Ok(Some(ElementRef::new(id)))
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool> {
        self.ensure_open()?;
        let (_, rendered) = self.resolve(element)?;
        Ok(rendered.displayed)
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.ensure_open()?;
        let (url, rendered) = self.resolve(element)?;
        self.record(MockBrowserCall::SendKeys(
            rendered.locator.clone(),
            text.to_string(),
        ));
        self.model.type_text(&url, &rendered.locator, text);
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.ensure_open()?;
        let (url, rendered) = self.resolve(element)?;
        if !rendered.displayed {
            return Err(BrowserError::Protocol {
                error: "element not interactable".to_string(),
                message: format!("{} is not displayed", rendered.locator),
            }
            .into());
        }
        self.record(MockBrowserCall::Click(rendered.locator.clone()));
        if let Some(next) = self.model.click(&url, &rendered.locator) {
            *self.current_url.lock().unwrap() = next;
            self.elements.lock().unwrap().clear();
        }
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        self.record(MockBrowserCall::Quit);
        self.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
