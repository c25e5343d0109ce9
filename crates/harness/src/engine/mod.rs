// Engine - the browser automation capability the harness consumes
//
// The harness does not speak any browser protocol itself. Everything it needs
// from a browser is expressed by three traits:
// - BrowserLauncher: starts a browser session
// - BrowserDriver: owns pages inside that session
// - PageDriver: element queries, state queries, raw interactions and the
//   browser state of the page (cookies, web storage, screenshots)
//
// Page objects never talk to a PageDriver directly; they go through
// ActionExecutor so every interaction shares the same wait/log behaviour.

#[cfg(feature = "playwright")]
pub mod playwright;

use crate::config::BrowserKind;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque reference to an element, issued by the engine.
///
/// Mirrors protocol object GUIDs: the harness never interprets the id, it only
/// hands it back to the engine that issued it. A reference may go stale when
/// the page re-renders, so it is re-validated on every use.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    guid: Arc<str>,
}

impl ElementRef {
    /// Creates a reference from an engine-issued id.
    pub fn new(guid: impl Into<Arc<str>>) -> Self {
        Self { guid: guid.into() }
    }

    /// The engine-issued id.
    pub fn guid(&self) -> &str {
        &self.guid
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementRef").field(&&*self.guid).finish()
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle:{}", self.guid)
    }
}

/// Element states the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    Visible,
    Enabled,
    Editable,
    Checked,
}

/// Element box in main-frame CSS pixels relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the box.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Select option variant
///
/// Represents different ways to select an option in a `<select>` element.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectOption {
    /// Select by option value attribute
    Value(String),
    /// Select by option label (visible text)
    Label(String),
    /// Select by option index (0-based)
    Index(usize),
}

impl fmt::Display for SelectOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectOption::Value(v) => write!(f, "value={}", v),
            SelectOption::Label(l) => write!(f, "label={}", l),
            SelectOption::Index(i) => write!(f, "index={}", i),
        }
    }
}

// Plain strings select by value
impl From<&str> for SelectOption {
    fn from(value: &str) -> Self {
        SelectOption::Value(value.to_string())
    }
}

impl From<String> for SelectOption {
    fn from(value: String) -> Self {
        SelectOption::Value(value)
    }
}

/// Mouse button for click actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// Left mouse button (default)
    #[default]
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}

/// A browser cookie.
///
/// Serialized in the camelCase shape browsers use for storage state, so a
/// cookie list round-trips through saved state files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Use a leading dot to match subdomains, e.g. ".example.com"
    pub domain: String,
    pub path: String,
    /// Unix timestamp in seconds; `None` for session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    /// "Strict", "Lax" or "None"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl Cookie {
    /// A session cookie for `domain` with path "/".
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn expires(mut self, expires: f64) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn same_site(mut self, same_site: impl Into<String>) -> Self {
        self.same_site = Some(same_site.into());
        self
    }
}

/// Options for launching a browser session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub browser: BrowserKind,
    pub headless: bool,
    pub slow_mo_ms: u64,
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync + 'static {
    async fn launch(&self, request: &LaunchRequest) -> Result<Arc<dyn BrowserDriver>>;
}

/// A running browser session.
#[async_trait]
pub trait BrowserDriver: Send + Sync + 'static {
    /// Browser name, e.g. "chromium".
    fn name(&self) -> String;

    /// Browser version string.
    fn version(&self) -> String;

    async fn new_page(&self) -> Result<Arc<dyn PageDriver>>;

    async fn close(&self) -> Result<()>;
}

/// A single page (tab) of a browser session.
///
/// Methods taking an [`ElementRef`] return [`crate::Error::ElementDetached`] when
/// the element is no longer in the document.
#[async_trait]
pub trait PageDriver: Send + Sync + 'static {
    /// Returns the first element matching the selector, or None if not found.
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>>;

    /// Whether the referenced element is still attached to the document.
    async fn is_attached(&self, element: &ElementRef) -> Result<bool>;

    async fn element_state(&self, element: &ElementRef, state: ElementState) -> Result<bool>;

    async fn click(
        &self,
        element: &ElementRef,
        button: MouseButton,
        click_count: u32,
    ) -> Result<()>;

    async fn fill(&self, element: &ElementRef, text: &str) -> Result<()>;

    async fn hover(&self, element: &ElementRef) -> Result<()>;

    async fn inner_text(&self, element: &ElementRef) -> Result<String>;

    async fn get_attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>>;

    async fn input_value(&self, element: &ElementRef) -> Result<String>;

    /// Returns the values of the options that are now selected.
    async fn select_option(
        &self,
        element: &ElementRef,
        option: &SelectOption,
    ) -> Result<Vec<String>>;

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<()>;

    async fn bounding_box(&self, element: &ElementRef) -> Result<Option<BoundingBox>>;

    async fn mouse_move(&self, x: f64, y: f64) -> Result<()>;

    async fn mouse_down(&self, button: MouseButton) -> Result<()>;

    async fn mouse_up(&self, button: MouseButton) -> Result<()>;

    async fn goto(&self, url: &str) -> Result<()>;

    async fn url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Adds cookies to the browser context the page belongs to.
    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()>;

    /// Cookies of the page's browser context.
    async fn cookies(&self) -> Result<Vec<Cookie>>;

    async fn clear_cookies(&self) -> Result<()>;

    async fn clear_local_storage(&self) -> Result<()>;

    async fn clear_session_storage(&self) -> Result<()>;

    /// PNG image of the viewport, or of the whole scrollable page.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;
}
