// Action options for ActionExecutor operations
//
// Provides per-call overrides of the executor's wait policy plus the
// click-specific settings, in the builder style of the Playwright bindings.

use crate::engine::MouseButton;
use std::time::Duration;

/// Options shared by every action.
///
/// See: <https://playwright.dev/docs/actionability>
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    /// Maximum time to wait for the precondition; falls back to the executor default
    pub timeout: Option<Duration>,
    /// Skip the visibility precondition (the element must still be present)
    pub force: Option<bool>,
}

impl ActionOptions {
    /// Create a new builder for ActionOptions
    pub fn builder() -> ActionOptionsBuilder {
        ActionOptionsBuilder::default()
    }

    /// Shorthand for options that only override the timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            force: None,
        }
    }
}

/// Builder for ActionOptions
#[derive(Debug, Clone, Default)]
pub struct ActionOptionsBuilder {
    timeout: Option<Duration>,
    force: Option<bool>,
}

impl ActionOptionsBuilder {
    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bypass the visibility and editability preconditions
    pub fn force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    /// Build the ActionOptions
    pub fn build(self) -> ActionOptions {
        ActionOptions {
            timeout: self.timeout,
            force: self.force,
        }
    }
}

/// Click options
///
/// # Example
///
/// ```ignore
/// use playwright_harness::{ClickOptions, MouseButton};
/// use std::time::Duration;
///
/// let options = ClickOptions::builder()
///     .button(MouseButton::Right)
///     .timeout(Duration::from_secs(5))
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClickOptions {
    /// Mouse button to click (left, right, middle)
    pub button: Option<MouseButton>,
    /// Wait/force settings
    pub action: ActionOptions,
}

impl ClickOptions {
    /// Create a new builder for ClickOptions
    pub fn builder() -> ClickOptionsBuilder {
        ClickOptionsBuilder::default()
    }
}

impl From<ActionOptions> for ClickOptions {
    fn from(action: ActionOptions) -> Self {
        Self {
            button: None,
            action,
        }
    }
}

/// Builder for ClickOptions
#[derive(Debug, Clone, Default)]
pub struct ClickOptionsBuilder {
    button: Option<MouseButton>,
    action: ActionOptionsBuilder,
}

impl ClickOptionsBuilder {
    /// Set the mouse button
    pub fn button(mut self, button: MouseButton) -> Self {
        self.button = Some(button);
        self
    }

    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.action = self.action.timeout(timeout);
        self
    }

    /// Bypass the visibility and editability preconditions
    pub fn force(mut self, force: bool) -> Self {
        self.action = self.action.force(force);
        self
    }

    /// Build the ClickOptions
    pub fn build(self) -> ClickOptions {
        ClickOptions {
            button: self.button,
            action: self.action.build(),
        }
    }
}

/// States `ActionExecutor::wait_for` can wait for.
///
/// See: <https://playwright.dev/docs/api/class-locator#locator-wait-for>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitState {
    /// Present in the document
    Attached,
    /// Not present in the document
    Detached,
    /// Present and visible
    #[default]
    Visible,
    /// Absent or not visible
    Hidden,
}
