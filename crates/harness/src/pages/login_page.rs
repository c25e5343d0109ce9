// LoginPage - the login form

use super::BasePage;
use crate::action::{ActionOptions, WaitState};
use crate::error::{Error, Result};
use std::ops::Deref;
use std::time::Duration;

pub const USERNAME_FIELD: &str = "#username";
pub const PASSWORD_FIELD: &str = "#password";
pub const LOGIN_BUTTON: &str = "#login-button";
pub const ACCEPT_COOKIES_BUTTON: &str = "#accept-cookies";

/// Path of the login form relative to the base URL.
///
/// No leading slash, so a base URL with a path prefix keeps it.
pub const LOGIN_PATH: &str = "login";

// The consent banner is optional; don't wait the full action timeout for it
const COOKIE_BANNER_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct LoginPage {
    base: BasePage,
}

impl LoginPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub async fn navigate_to_login_page(&self) -> Result<()> {
        self.navigate(LOGIN_PATH).await
    }

    /// Dismisses the cookie consent banner if one shows up.
    ///
    /// Returns whether a banner was accepted.
    pub async fn accept_cookies(&self) -> Result<bool> {
        let options = ActionOptions::with_timeout(COOKIE_BANNER_TIMEOUT);
        match self
            .actions()
            .wait_for(ACCEPT_COOKIES_BUTTON, WaitState::Visible, Some(options))
            .await
        {
            Ok(()) => {
                self.click(ACCEPT_COOKIES_BUTTON).await?;
                Ok(true)
            }
            Err(Error::ElementNotFound { .. }) | Err(Error::Timeout(_)) => {
                tracing::debug!("No cookie banner to accept");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.type_text(USERNAME_FIELD, username).await?;
        self.type_text(PASSWORD_FIELD, password).await?;
        self.click(LOGIN_BUTTON).await
    }
}

impl Deref for LoginPage {
    type Target = BasePage;

    fn deref(&self) -> &BasePage {
        &self.base
    }
}
