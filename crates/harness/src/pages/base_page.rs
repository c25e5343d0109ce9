// BasePage - navigation and the common interactions page objects build on
//
// Page objects never touch the engine directly; every call goes through the
// ActionExecutor so waits, retries and logging behave the same everywhere.

use crate::action::{ActionExecutor, WaitState};
use crate::error::{Error, Result};
use url::Url;

/// Shared behaviour of every page object.
#[derive(Debug, Clone)]
pub struct BasePage {
    actions: ActionExecutor,
    base_url: Option<Url>,
}

impl BasePage {
    pub fn new(actions: ActionExecutor) -> Self {
        Self {
            actions,
            base_url: None,
        }
    }

    /// Sets the URL relative paths are resolved against.
    ///
    /// The base URL is treated as a directory: `https://host/app` and
    /// `https://host/app/` both resolve `login` to `https://host/app/login`.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let mut parsed = Url::parse(base_url).map_err(|e| {
            Error::InvalidArgument(format!("Invalid base URL '{}': {}", base_url, e))
        })?;
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        self.base_url = Some(parsed);
        Ok(self)
    }

    pub fn actions(&self) -> &ActionExecutor {
        &self.actions
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Absolute form of `path`.
    ///
    /// Absolute URLs pass through unchanged; anything else is joined onto the
    /// base URL.
    pub fn resolve_url(&self, path: &str) -> Result<String> {
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute.into());
        }
        let base = self.base_url.as_ref().ok_or_else(|| {
            Error::InvalidArgument(format!("Relative URL '{}' needs a base URL", path))
        })?;
        base.join(path).map(String::from).map_err(|e| {
            Error::InvalidArgument(format!("Cannot join '{}' onto {}: {}", path, base, e))
        })
    }

    /// Navigates to `path`, relative to the base URL unless absolute.
    pub async fn navigate(&self, path: &str) -> Result<()> {
        let url = self.resolve_url(path)?;
        self.actions.navigate(&url, None).await
    }

    pub async fn wait_for_element(&self, selector: &str) -> Result<()> {
        self.actions
            .wait_for(selector, WaitState::Visible, None)
            .await
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        self.actions.click(selector, None).await
    }

    pub async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.actions.type_into(selector, text, None).await
    }

    pub async fn get_text(&self, selector: &str) -> Result<String> {
        self.actions.read_text(selector, None).await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.actions.url().await
    }

    pub async fn title(&self) -> Result<String> {
        self.actions.title().await
    }
}
