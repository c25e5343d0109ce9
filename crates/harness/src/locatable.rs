// Locatable - selector-or-handle element address
//
// Resolved to a live element at the moment of use and never cached across
// actions: a re-render may replace the node a previous lookup returned.

use crate::engine::{ElementRef, PageDriver};
use crate::error::Result;
use std::fmt;

/// Address of a UI element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locatable {
    /// CSS (or engine-specific) selector, resolved to its first match
    BySelector(String),
    /// Element reference obtained earlier from the engine
    ByHandle(ElementRef),
}

impl Locatable {
    /// Resolves this address to a live element.
    ///
    /// Returns `Ok(None)` when the selector matches nothing or the handle is no
    /// longer attached to the document.
    pub async fn resolve(&self, page: &dyn PageDriver) -> Result<Option<ElementRef>> {
        match self {
            Locatable::BySelector(selector) => page.query_selector(selector).await,
            Locatable::ByHandle(handle) => {
                if page.is_attached(handle).await? {
                    Ok(Some(handle.clone()))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Returns the selector if this is a selector address.
    pub fn selector(&self) -> Option<&str> {
        match self {
            Locatable::BySelector(selector) => Some(selector),
            Locatable::ByHandle(_) => None,
        }
    }
}

impl fmt::Display for Locatable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locatable::BySelector(selector) => f.write_str(selector),
            Locatable::ByHandle(handle) => write!(f, "{}", handle),
        }
    }
}

impl From<&str> for Locatable {
    fn from(selector: &str) -> Self {
        Locatable::BySelector(selector.to_string())
    }
}

impl From<String> for Locatable {
    fn from(selector: String) -> Self {
        Locatable::BySelector(selector)
    }
}

impl From<&String> for Locatable {
    fn from(selector: &String) -> Self {
        Locatable::BySelector(selector.clone())
    }
}

impl From<ElementRef> for Locatable {
    fn from(handle: ElementRef) -> Self {
        Locatable::ByHandle(handle)
    }
}

impl From<&ElementRef> for Locatable {
    fn from(handle: &ElementRef) -> Self {
        Locatable::ByHandle(handle.clone())
    }
}

impl From<&Locatable> for Locatable {
    fn from(target: &Locatable) -> Self {
        target.clone()
    }
}
