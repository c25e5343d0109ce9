// DashboardPage - landing page after a successful login

use super::BasePage;
use crate::error::Result;
use std::ops::Deref;

pub const WELCOME_MESSAGE: &str = ".welcome-message";
pub const FLASH_MESSAGE: &str = "#flash";

#[derive(Debug, Clone)]
pub struct DashboardPage {
    base: BasePage,
}

impl DashboardPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub async fn welcome_message(&self) -> Result<String> {
        self.get_text(WELCOME_MESSAGE).await
    }

    /// Flash banner shown after login, e.g. "You logged into a secure area!".
    pub async fn flash_message(&self) -> Result<String> {
        self.get_text(FLASH_MESSAGE).await
    }
}

impl Deref for DashboardPage {
    type Target = BasePage;

    fn deref(&self) -> &BasePage {
        &self.base
    }
}
