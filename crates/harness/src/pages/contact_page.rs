// ContactPage - contact form

use super::BasePage;
use crate::error::Result;
use std::ops::Deref;

pub const NAME_FIELD: &str = "#name";
pub const EMAIL_FIELD: &str = "#email";
pub const MESSAGE_FIELD: &str = "#message";
pub const SUBMIT_BUTTON: &str = "#submit-button";
pub const SUCCESS_MESSAGE: &str = ".success-message";

#[derive(Debug, Clone)]
pub struct ContactPage {
    base: BasePage,
}

impl ContactPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub async fn fill_contact_form(&self, name: &str, email: &str, message: &str) -> Result<()> {
        self.type_text(NAME_FIELD, name).await?;
        self.type_text(EMAIL_FIELD, email).await?;
        self.type_text(MESSAGE_FIELD, message).await
    }

    pub async fn submit_form(&self) -> Result<()> {
        self.click(SUBMIT_BUTTON).await
    }

    pub async fn success_message(&self) -> Result<String> {
        self.get_text(SUCCESS_MESSAGE).await
    }
}

impl Deref for ContactPage {
    type Target = BasePage;

    fn deref(&self) -> &BasePage {
        &self.base
    }
}
