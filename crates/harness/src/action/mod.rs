// ActionExecutor - resilient single interactions with auto-waiting
//
// Every operation follows the same shape:
// 1. Resolve the Locatable to a live element (re-resolved on every poll)
// 2. Wait until the element meets the operation's precondition or time runs out
// 3. Perform the interaction exactly once
// 4. Log the outcome (debug on success, error on failure)
//
// Only the precondition is retried. If the engine rejects the interaction itself
// the error is surfaced as InteractionError without a second attempt.
//
// Failure classification:
// - ElementNotFound: the address never resolved within the timeout
// - Timeout: the element was found but never met the precondition
// - InteractionError: the engine rejected the interaction
//
// Page-level operations (navigation, cookies, storage, screenshots) have no
// element to wait for; they are bounded by the same timeout and fail with
// Timeout when the engine does not answer in time.

mod expect;
mod options;

pub use expect::Expectation;
pub use options::{
    ActionOptions, ActionOptionsBuilder, ClickOptions, ClickOptionsBuilder, WaitState,
};

use crate::config::HarnessConfig;
use crate::engine::{Cookie, ElementRef, ElementState, MouseButton, PageDriver, SelectOption};
use crate::error::{Error, Result};
use crate::locatable::Locatable;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Operations performed by [`ActionExecutor`], used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Click,
    DoubleClick,
    Type,
    Clear,
    ReadText,
    ReadAttribute,
    ReadValue,
    Hover,
    SelectOption,
    DragAndDrop,
    ScrollIntoView,
    WaitFor,
    Navigate,
    SetCookie,
    GetCookies,
    ClearCookies,
    ClearLocalStorage,
    ClearSessionStorage,
    Screenshot,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::DoubleClick => "double_click",
            Action::Type => "type",
            Action::Clear => "clear",
            Action::ReadText => "read_text",
            Action::ReadAttribute => "read_attribute",
            Action::ReadValue => "read_value",
            Action::Hover => "hover",
            Action::SelectOption => "select_option",
            Action::DragAndDrop => "drag_and_drop",
            Action::ScrollIntoView => "scroll_into_view",
            Action::WaitFor => "wait_for",
            Action::Navigate => "navigate",
            Action::SetCookie => "set_cookie",
            Action::GetCookies => "get_cookies",
            Action::ClearCookies => "clear_cookies",
            Action::ClearLocalStorage => "clear_local_storage",
            Action::ClearSessionStorage => "clear_session_storage",
            Action::Screenshot => "screenshot",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an element must satisfy before an action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precondition {
    Present,
    Visible,
    /// Visible and accepting input
    Editable,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::Present => f.write_str("present"),
            Precondition::Visible => f.write_str("visible"),
            Precondition::Editable => f.write_str("editable"),
        }
    }
}

/// Performs interactions on one page with visibility waiting and bounded retry.
///
/// Cheap to clone; clones share the page.
///
/// # Example
///
/// ```ignore
/// use playwright_harness::{ActionExecutor, Locatable};
///
/// let actions = ActionExecutor::new(page);
/// actions.type_into("#username", "tomsmith", None).await?;
/// actions.click("#login-button", None).await?;
/// let banner = actions.read_text(".flash", None).await?;
/// ```
#[derive(Clone)]
pub struct ActionExecutor {
    page: Arc<dyn PageDriver>,
    timeout: Duration,
    poll_interval: Duration,
    assertion_timeout: Duration,
}

impl ActionExecutor {
    /// Creates an executor with the default wait policy.
    pub fn new(page: Arc<dyn PageDriver>) -> Self {
        Self::from_config(page, &HarnessConfig::default())
    }

    /// Creates an executor using the config's action/assertion timeouts.
    pub fn from_config(page: Arc<dyn PageDriver>, config: &HarnessConfig) -> Self {
        Self {
            page,
            timeout: config.action_timeout,
            poll_interval: config.poll_interval,
            assertion_timeout: config.assertion_timeout,
        }
    }

    /// Sets the default precondition timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the interval between precondition checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the default timeout of expectations created by [`Self::expect`].
    pub fn with_assertion_timeout(mut self, timeout: Duration) -> Self {
        self.assertion_timeout = timeout;
        self
    }

    pub fn page(&self) -> &Arc<dyn PageDriver> {
        &self.page
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Clicks the element once it is visible.
    pub async fn click(
        &self,
        target: impl Into<Locatable>,
        options: Option<ClickOptions>,
    ) -> Result<()> {
        self.click_n(Action::Click, target.into(), options.unwrap_or_default(), 1)
            .await
    }

    /// Double clicks the element once it is visible.
    pub async fn double_click(
        &self,
        target: impl Into<Locatable>,
        options: Option<ClickOptions>,
    ) -> Result<()> {
        self.click_n(
            Action::DoubleClick,
            target.into(),
            options.unwrap_or_default(),
            2,
        )
        .await
    }

    async fn click_n(
        &self,
        action: Action,
        target: Locatable,
        options: ClickOptions,
        click_count: u32,
    ) -> Result<()> {
        let button = options.button.unwrap_or_default();
        self.instrumented(action, &target.to_string(), async {
            let element = self.acquire(&target, &options.action, Precondition::Visible).await?;
            self.page
                .click(&element, button, click_count)
                .await
                .map_err(|e| interaction(action, &target, e))
        })
        .await
    }

    /// Replaces the content of an input field with `text`.
    ///
    /// Waits until the field is visible and editable, so inputs that are
    /// disabled until the page finishes loading are handled.
    pub async fn type_into(
        &self,
        target: impl Into<Locatable>,
        text: &str,
        options: Option<ActionOptions>,
    ) -> Result<()> {
        self.fill(Action::Type, target.into(), text, options.unwrap_or_default())
            .await
    }

    /// Clears an input field.
    pub async fn clear(
        &self,
        target: impl Into<Locatable>,
        options: Option<ActionOptions>,
    ) -> Result<()> {
        self.fill(Action::Clear, target.into(), "", options.unwrap_or_default())
            .await
    }

    async fn fill(
        &self,
        action: Action,
        target: Locatable,
        text: &str,
        options: ActionOptions,
    ) -> Result<()> {
        self.instrumented(action, &target.to_string(), async {
            let element = self
                .acquire(&target, &options, Precondition::Editable)
                .await?;
            self.page
                .fill(&element, text)
                .await
                .map_err(|e| interaction(action, &target, e))
        })
        .await
    }

    /// Returns the rendered text of the element once it is present.
    pub async fn read_text(
        &self,
        target: impl Into<Locatable>,
        options: Option<ActionOptions>,
    ) -> Result<String> {
        let target = target.into();
        let options = options.unwrap_or_default();
        self.instrumented(Action::ReadText, &target.to_string(), async {
            let element = self.acquire(&target, &options, Precondition::Present).await?;
            self.page
                .inner_text(&element)
                .await
                .map_err(|e| interaction(Action::ReadText, &target, e))
        })
        .await
    }

    /// Returns an attribute of the element once it is present.
    pub async fn read_attribute(
        &self,
        target: impl Into<Locatable>,
        name: &str,
        options: Option<ActionOptions>,
    ) -> Result<Option<String>> {
        let target = target.into();
        let options = options.unwrap_or_default();
        self.instrumented(Action::ReadAttribute, &target.to_string(), async {
            let element = self.acquire(&target, &options, Precondition::Present).await?;
            self.page
                .get_attribute(&element, name)
                .await
                .map_err(|e| interaction(Action::ReadAttribute, &target, e))
        })
        .await
    }

    /// Returns the value of an input, textarea or select element.
    pub async fn read_input_value(
        &self,
        target: impl Into<Locatable>,
        options: Option<ActionOptions>,
    ) -> Result<String> {
        let target = target.into();
        let options = options.unwrap_or_default();
        self.instrumented(Action::ReadValue, &target.to_string(), async {
            let element = self.acquire(&target, &options, Precondition::Present).await?;
            self.page
                .input_value(&element)
                .await
                .map_err(|e| interaction(Action::ReadValue, &target, e))
        })
        .await
    }

    /// Moves the pointer over the element once it is visible.
    pub async fn hover(
        &self,
        target: impl Into<Locatable>,
        options: Option<ActionOptions>,
    ) -> Result<()> {
        let target = target.into();
        let options = options.unwrap_or_default();
        self.instrumented(Action::Hover, &target.to_string(), async {
            let element = self.acquire(&target, &options, Precondition::Visible).await?;
            self.page
                .hover(&element)
                .await
                .map_err(|e| interaction(Action::Hover, &target, e))
        })
        .await
    }

    /// Selects an option of a `<select>` element.
    ///
    /// Returns the values that are selected afterwards.
    pub async fn select_option(
        &self,
        target: impl Into<Locatable>,
        option: impl Into<SelectOption>,
        options: Option<ActionOptions>,
    ) -> Result<Vec<String>> {
        let target = target.into();
        let option = option.into();
        let options = options.unwrap_or_default();
        self.instrumented(Action::SelectOption, &target.to_string(), async {
            let element = self.acquire(&target, &options, Precondition::Visible).await?;
            self.page
                .select_option(&element, &option)
                .await
                .map_err(|e| interaction(Action::SelectOption, &target, e))
        })
        .await
    }

    /// Scrolls the element into the viewport once it is present.
    pub async fn scroll_into_view(
        &self,
        target: impl Into<Locatable>,
        options: Option<ActionOptions>,
    ) -> Result<()> {
        let target = target.into();
        let options = options.unwrap_or_default();
        self.instrumented(Action::ScrollIntoView, &target.to_string(), async {
            let element = self.acquire(&target, &options, Precondition::Present).await?;
            self.page
                .scroll_into_view(&element)
                .await
                .map_err(|e| interaction(Action::ScrollIntoView, &target, e))
        })
        .await
    }

    /// Drags `source` onto `target` with synthesized pointer events.
    ///
    /// Both elements must become visible. The pointer moves to the source
    /// center, presses, moves to the target center and releases.
    pub async fn drag_and_drop(
        &self,
        source: impl Into<Locatable>,
        target: impl Into<Locatable>,
        options: Option<ActionOptions>,
    ) -> Result<()> {
        let source = source.into();
        let target = target.into();
        let options = options.unwrap_or_default();
        let label = format!("{} -> {}", source, target);
        self.instrumented(Action::DragAndDrop, &label, async {
            let from = self.acquire(&source, &options, Precondition::Visible).await?;
            let to = self.acquire(&target, &options, Precondition::Visible).await?;

            let from_box = self.bounding_box(&source, &from).await?;
            let to_box = self.bounding_box(&target, &to).await?;
            let (from_x, from_y) = from_box.center();
            let (to_x, to_y) = to_box.center();

            let button = MouseButton::Left;
            let page = &self.page;
            async {
                page.mouse_move(from_x, from_y).await?;
                page.mouse_down(button).await?;
                page.mouse_move(to_x, to_y).await?;
                page.mouse_up(button).await
            }
            .await
            .map_err(|e| interaction(Action::DragAndDrop, &source, e))
        })
        .await
    }

    async fn bounding_box(
        &self,
        target: &Locatable,
        element: &ElementRef,
    ) -> Result<crate::engine::BoundingBox> {
        self.page
            .bounding_box(element)
            .await
            .map_err(|e| interaction(Action::DragAndDrop, target, e))?
            .ok_or_else(|| Error::InteractionError {
                action: Action::DragAndDrop.to_string(),
                target: target.to_string(),
                message: "element has no bounding box".to_string(),
            })
    }

    /// Waits until the element reaches `state`.
    pub async fn wait_for(
        &self,
        target: impl Into<Locatable>,
        state: WaitState,
        options: Option<ActionOptions>,
    ) -> Result<()> {
        let target = target.into();
        let timeout = self.timeout_for(options.as_ref());
        self.instrumented(Action::WaitFor, &target.to_string(), async {
            match state {
                WaitState::Attached => self
                    .wait_until(&target, Precondition::Present, timeout)
                    .await
                    .map(|_| ()),
                WaitState::Visible => self
                    .wait_until(&target, Precondition::Visible, timeout)
                    .await
                    .map(|_| ()),
                WaitState::Detached => self.wait_until_gone(&target, false, timeout).await,
                WaitState::Hidden => self.wait_until_gone(&target, true, timeout).await,
            }
        })
        .await
    }

    /// Navigates the page, failing with `Timeout` when navigation overruns.
    pub async fn navigate(&self, url: &str, options: Option<ActionOptions>) -> Result<()> {
        let timeout = self.timeout_for(options.as_ref());
        self.instrumented(Action::Navigate, url, async {
            match tokio::time::timeout(timeout, self.page.goto(url)).await {
                Ok(result) => result.map_err(|e| interaction(Action::Navigate, &url, e)),
                Err(_) => Err(Error::Timeout(format!(
                    "navigation to '{}' did not finish within {:?}",
                    url, timeout
                ))),
            }
        })
        .await
    }

    /// Adds a cookie to the page's browser context.
    pub async fn set_cookie(&self, cookie: &Cookie, options: Option<ActionOptions>) -> Result<()> {
        let label = format!("cookie:{}", cookie.name);
        self.page_operation(
            Action::SetCookie,
            &label,
            options,
            self.page.add_cookies(std::slice::from_ref(cookie)),
        )
        .await
    }

    /// Cookies of the page's browser context.
    pub async fn get_cookies(&self, options: Option<ActionOptions>) -> Result<Vec<Cookie>> {
        self.page_operation(Action::GetCookies, "context", options, self.page.cookies())
            .await
    }

    /// Removes every cookie of the page's browser context.
    pub async fn clear_cookies(&self, options: Option<ActionOptions>) -> Result<()> {
        self.page_operation(
            Action::ClearCookies,
            "context",
            options,
            self.page.clear_cookies(),
        )
        .await
    }

    /// Clears `localStorage` of the current origin.
    pub async fn clear_local_storage(&self, options: Option<ActionOptions>) -> Result<()> {
        self.page_operation(
            Action::ClearLocalStorage,
            "page",
            options,
            self.page.clear_local_storage(),
        )
        .await
    }

    /// Clears `sessionStorage` of the current origin.
    pub async fn clear_session_storage(&self, options: Option<ActionOptions>) -> Result<()> {
        self.page_operation(
            Action::ClearSessionStorage,
            "page",
            options,
            self.page.clear_session_storage(),
        )
        .await
    }

    /// Captures the page as PNG and writes it to `path`.
    ///
    /// Missing parent directories are created. Returns the image bytes.
    pub async fn take_screenshot(
        &self,
        path: impl AsRef<Path>,
        full_page: bool,
        options: Option<ActionOptions>,
    ) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let label = path.display().to_string();
        self.page_operation(Action::Screenshot, &label, options, async {
            let bytes = self.page.screenshot(full_page).await?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, &bytes).await?;
            Ok(bytes)
        })
        .await
    }

    /// Current page title.
    pub async fn title(&self) -> Result<String> {
        self.page.title().await
    }

    /// Current page URL.
    pub async fn url(&self) -> Result<String> {
        self.page.url().await
    }

    /// Creates an auto-retrying expectation for the element.
    pub fn expect(&self, target: impl Into<Locatable>) -> Expectation {
        Expectation::new(self.clone(), target.into(), self.assertion_timeout)
    }

    fn timeout_for(&self, options: Option<&ActionOptions>) -> Duration {
        options.and_then(|o| o.timeout).unwrap_or(self.timeout)
    }

    /// Runs a page-level operation under the action timeout and logs it.
    async fn page_operation<T, F>(
        &self,
        action: Action,
        label: &str,
        options: Option<ActionOptions>,
        operation: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.timeout_for(options.as_ref());
        self.instrumented(action, label, async {
            match tokio::time::timeout(timeout, operation).await {
                Ok(result) => result.map_err(|e| interaction(action, &label, e)),
                Err(_) => Err(Error::Timeout(format!(
                    "{} on '{}' did not finish within {:?}",
                    action, label, timeout
                ))),
            }
        })
        .await
    }

    /// Waits for `precondition`; `force` reduces it to presence.
    async fn acquire(
        &self,
        target: &Locatable,
        options: &ActionOptions,
        precondition: Precondition,
    ) -> Result<ElementRef> {
        let precondition = if options.force.unwrap_or(false) {
            Precondition::Present
        } else {
            precondition
        };
        self.wait_until(target, precondition, self.timeout_for(Some(options)))
            .await
    }

    /// Polls until the target resolves and satisfies `precondition`.
    async fn wait_until(
        &self,
        target: &Locatable,
        precondition: Precondition,
        timeout: Duration,
    ) -> Result<ElementRef> {
        let start = Instant::now();
        let mut found = false;

        loop {
            if let Some(element) = target.resolve(self.page.as_ref()).await? {
                found = true;
                match self.satisfies(&element, precondition).await {
                    Ok(true) => return Ok(element),
                    Ok(false) => {}
                    // Replaced between resolve and the state check; resolve again next round
                    Err(Error::ElementDetached(_)) => {}
                    Err(e) => return Err(e),
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(if found {
                    Error::Timeout(format!(
                        "element '{}' was found but not {} after {:?}",
                        target, precondition, timeout
                    ))
                } else {
                    Error::ElementNotFound {
                        target: target.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    }
                });
            }

            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Polls until the target is absent (or, with `hidden_ok`, not visible).
    async fn wait_until_gone(
        &self,
        target: &Locatable,
        hidden_ok: bool,
        timeout: Duration,
    ) -> Result<()> {
        let start = Instant::now();

        loop {
            let gone = match target.resolve(self.page.as_ref()).await? {
                None => true,
                Some(element) if hidden_ok => {
                    match self.page.element_state(&element, ElementState::Visible).await {
                        Ok(visible) => !visible,
                        Err(Error::ElementDetached(_)) => true,
                        Err(e) => return Err(e),
                    }
                }
                Some(_) => false,
            };
            if gone {
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(Error::Timeout(format!(
                    "element '{}' was still {} after {:?}",
                    target,
                    if hidden_ok { "visible" } else { "attached" },
                    timeout
                )));
            }

            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    async fn satisfies(&self, element: &ElementRef, precondition: Precondition) -> Result<bool> {
        match precondition {
            Precondition::Present => Ok(true),
            Precondition::Visible => {
                self.page
                    .element_state(element, ElementState::Visible)
                    .await
            }
            Precondition::Editable => {
                let visible = self
                    .page
                    .element_state(element, ElementState::Visible)
                    .await?;
                Ok(visible
                    && self
                        .page
                        .element_state(element, ElementState::Editable)
                        .await?)
            }
        }
    }

    /// Runs one action and emits its log entry.
    async fn instrumented<T, F>(&self, action: Action, target: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = operation.await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::debug!(action = %action, target, elapsed_ms, "Action succeeded"),
            Err(e) => {
                tracing::error!(action = %action, target, elapsed_ms, error = %e, "Action failed")
            }
        }
        result
    }
}

impl fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("assertion_timeout", &self.assertion_timeout)
            .finish()
    }
}

/// Wraps an engine failure during the interaction step.
fn interaction(action: Action, target: &dyn fmt::Display, error: Error) -> Error {
    match error {
        Error::InteractionError { .. } => error,
        other => Error::InteractionError {
            action: action.to_string(),
            target: target.to_string(),
            message: other.to_string(),
        },
    }
}
