// Engine adapter over the playwright-rs bindings
//
// Element references are selector-backed: the reference id is the CSS selector
// that found the element, and every operation re-targets its first match with
// a fresh Locator. An element counts as attached while its selector matches.
//
// Bounding boxes and scroll-into-view go through `Page::evaluate` with
// `document.querySelector`, so they need plain CSS selectors.
//
// Cookies live on the page's BrowserContext. The bindings have no
// clearCookies call, so clearing re-adds every cookie already expired.

use super::{
    BoundingBox, BrowserDriver, BrowserLauncher, Cookie, ElementRef, ElementState, LaunchRequest,
    MouseButton, PageDriver, SelectOption,
};
use crate::config::BrowserKind;
use crate::error::{Error, Result};
use async_trait::async_trait;
use playwright_rs::protocol::{MouseButton as PwMouseButton, MouseOptions};
use playwright_rs::{
    Browser, BrowserContext, ClickOptions, LaunchOptions, Locator, Page, Playwright,
    ScreenshotOptions, ScreenshotType,
};
use std::sync::Arc;

const BOUNDING_BOX_SCRIPT: &str = "(selector) => {
    const el = document.querySelector(selector);
    if (!el) return null;
    const r = el.getBoundingClientRect();
    return { x: r.x, y: r.y, width: r.width, height: r.height };
}";

const SCROLL_INTO_VIEW_SCRIPT: &str = "(selector) => {
    const el = document.querySelector(selector);
    if (!el) return false;
    el.scrollIntoView({ block: 'center', inline: 'center' });
    return true;
}";

/// Maps binding errors into the harness taxonomy.
fn engine_error(err: playwright_rs::Error) -> Error {
    match err {
        playwright_rs::Error::ElementNotFound(msg) => Error::ElementDetached(msg),
        playwright_rs::Error::Timeout(msg) => Error::Timeout(msg),
        other => Error::Engine(other.to_string()),
    }
}

fn pw_button(button: MouseButton) -> PwMouseButton {
    match button {
        MouseButton::Left => PwMouseButton::Left,
        MouseButton::Right => PwMouseButton::Right,
        MouseButton::Middle => PwMouseButton::Middle,
    }
}

// Session cookies carry expires = -1 on the wire
const SESSION_EXPIRES: f64 = -1.0;
// Any timestamp in the past removes the cookie
const EXPIRED: f64 = 1.0;

fn pw_cookie(cookie: &Cookie) -> playwright_rs::Cookie {
    playwright_rs::Cookie {
        name: cookie.name.clone(),
        value: cookie.value.clone(),
        domain: cookie.domain.clone(),
        path: cookie.path.clone(),
        expires: cookie.expires.unwrap_or(SESSION_EXPIRES),
        http_only: cookie.http_only,
        secure: cookie.secure,
        same_site: cookie.same_site.clone(),
    }
}

fn from_pw_cookie(cookie: playwright_rs::Cookie) -> Cookie {
    Cookie {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires: (cookie.expires >= 0.0).then_some(cookie.expires),
        http_only: cookie.http_only,
        secure: cookie.secure,
        same_site: cookie.same_site,
    }
}

fn pw_option(option: &SelectOption) -> playwright_rs::SelectOption {
    match option {
        SelectOption::Value(v) => playwright_rs::SelectOption::Value(v.clone()),
        SelectOption::Label(l) => playwright_rs::SelectOption::Label(l.clone()),
        SelectOption::Index(i) => playwright_rs::SelectOption::Index(*i),
    }
}

/// Launches browsers through a Playwright server owned by the launcher.
pub struct PlaywrightLauncher {
    playwright: Playwright,
}

impl PlaywrightLauncher {
    /// Starts the Playwright server.
    pub async fn start() -> Result<Self> {
        let playwright = Playwright::launch().await.map_err(engine_error)?;
        Ok(Self { playwright })
    }

    /// Stops the Playwright server.
    pub async fn shutdown(&self) -> Result<()> {
        self.playwright.shutdown().await.map_err(engine_error)
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<Arc<dyn BrowserDriver>> {
        let browser_type = match request.browser {
            BrowserKind::Chromium => self.playwright.chromium(),
            BrowserKind::Firefox => self.playwright.firefox(),
            BrowserKind::Webkit => self.playwright.webkit(),
        };
        let options = LaunchOptions::new()
            .headless(request.headless)
            .slow_mo(request.slow_mo_ms as f64);
        let browser = browser_type
            .launch_with_options(options)
            .await
            .map_err(engine_error)?;
        Ok(Arc::new(PlaywrightBrowser { browser }))
    }
}

/// A launched Playwright browser.
pub struct PlaywrightBrowser {
    browser: Browser,
}

#[async_trait]
impl BrowserDriver for PlaywrightBrowser {
    fn name(&self) -> String {
        self.browser.name().to_string()
    }

    fn version(&self) -> String {
        self.browser.version().to_string()
    }

    async fn new_page(&self) -> Result<Arc<dyn PageDriver>> {
        let page = self.browser.new_page().await.map_err(engine_error)?;
        Ok(Arc::new(PlaywrightPage { page }))
    }

    async fn close(&self) -> Result<()> {
        self.browser.close().await.map_err(engine_error)
    }
}

/// A Playwright page.
pub struct PlaywrightPage {
    page: Page,
}

impl PlaywrightPage {
    async fn first(&self, element: &ElementRef) -> Locator {
        self.page.locator(element.guid()).await.first()
    }

    fn context(&self) -> Result<BrowserContext> {
        self.page.context().map_err(engine_error)
    }

    async fn context_cookies(&self) -> Result<Vec<playwright_rs::Cookie>> {
        let state = self
            .context()?
            .storage_state()
            .await
            .map_err(engine_error)?;
        Ok(state.cookies)
    }

    /// First match of the element's selector, or ElementDetached when gone.
    async fn attached(&self, element: &ElementRef) -> Result<Locator> {
        let locator = self.first(element).await;
        if locator.count().await.map_err(engine_error)? == 0 {
            return Err(Error::ElementDetached(element.guid().to_string()));
        }
        Ok(locator)
    }
}

#[async_trait]
impl PageDriver for PlaywrightPage {
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>> {
        let count = self
            .page
            .locator(selector)
            .await
            .count()
            .await
            .map_err(engine_error)?;
        Ok((count > 0).then(|| ElementRef::new(selector)))
    }

    async fn is_attached(&self, element: &ElementRef) -> Result<bool> {
        let count = self.first(element).await.count().await.map_err(engine_error)?;
        Ok(count > 0)
    }

    async fn element_state(&self, element: &ElementRef, state: ElementState) -> Result<bool> {
        let locator = self.attached(element).await?;
        let answer = match state {
            ElementState::Visible => locator.is_visible().await,
            ElementState::Enabled => locator.is_enabled().await,
            ElementState::Editable => locator.is_editable().await,
            ElementState::Checked => locator.is_checked().await,
        };
        answer.map_err(engine_error)
    }

    async fn click(
        &self,
        element: &ElementRef,
        button: MouseButton,
        click_count: u32,
    ) -> Result<()> {
        let locator = self.attached(element).await?;
        let options = ClickOptions::builder()
            .button(pw_button(button))
            .click_count(click_count)
            .build();
        locator.click(Some(options)).await.map_err(engine_error)
    }

    async fn fill(&self, element: &ElementRef, text: &str) -> Result<()> {
        let locator = self.attached(element).await?;
        locator.fill(text, None).await.map_err(engine_error)
    }

    async fn hover(&self, element: &ElementRef) -> Result<()> {
        let locator = self.attached(element).await?;
        locator.hover(None).await.map_err(engine_error)
    }

    async fn inner_text(&self, element: &ElementRef) -> Result<String> {
        let locator = self.attached(element).await?;
        locator.inner_text().await.map_err(engine_error)
    }

    async fn get_attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        let locator = self.attached(element).await?;
        locator.get_attribute(name).await.map_err(engine_error)
    }

    async fn input_value(&self, element: &ElementRef) -> Result<String> {
        let locator = self.attached(element).await?;
        locator.input_value(None).await.map_err(engine_error)
    }

    async fn select_option(
        &self,
        element: &ElementRef,
        option: &SelectOption,
    ) -> Result<Vec<String>> {
        let locator = self.attached(element).await?;
        locator
            .select_option(pw_option(option), None)
            .await
            .map_err(engine_error)
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<()> {
        let selector = element.guid().to_string();
        let found: bool = self
            .page
            .evaluate(SCROLL_INTO_VIEW_SCRIPT, Some(&selector))
            .await
            .map_err(engine_error)?;
        if found {
            Ok(())
        } else {
            Err(Error::ElementDetached(selector))
        }
    }

    async fn bounding_box(&self, element: &ElementRef) -> Result<Option<BoundingBox>> {
        let selector = element.guid().to_string();
        self.page
            .evaluate(BOUNDING_BOX_SCRIPT, Some(&selector))
            .await
            .map_err(engine_error)
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<()> {
        self.page
            .mouse()
            .move_to(x.round() as i32, y.round() as i32, None)
            .await
            .map_err(engine_error)
    }

    async fn mouse_down(&self, button: MouseButton) -> Result<()> {
        let options = MouseOptions::builder().button(pw_button(button)).build();
        self.page
            .mouse()
            .down(Some(options))
            .await
            .map_err(engine_error)
    }

    async fn mouse_up(&self, button: MouseButton) -> Result<()> {
        let options = MouseOptions::builder().button(pw_button(button)).build();
        self.page
            .mouse()
            .up(Some(options))
            .await
            .map_err(engine_error)
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url, None).await.map_err(engine_error)?;
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.page.url())
    }

    async fn title(&self) -> Result<String> {
        self.page.title().await.map_err(engine_error)
    }

    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        let cookies: Vec<_> = cookies.iter().map(pw_cookie).collect();
        self.context()?
            .add_cookies(&cookies)
            .await
            .map_err(engine_error)
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        let cookies = self.context_cookies().await?;
        Ok(cookies.into_iter().map(from_pw_cookie).collect())
    }

    async fn clear_cookies(&self) -> Result<()> {
        let expired: Vec<_> = self
            .context_cookies()
            .await?
            .into_iter()
            .map(|cookie| playwright_rs::Cookie {
                expires: EXPIRED,
                ..cookie
            })
            .collect();
        if expired.is_empty() {
            return Ok(());
        }
        self.context()?
            .add_cookies(&expired)
            .await
            .map_err(engine_error)
    }

    async fn clear_local_storage(&self) -> Result<()> {
        self.page
            .evaluate_expression("window.localStorage.clear()")
            .await
            .map_err(engine_error)
    }

    async fn clear_session_storage(&self) -> Result<()> {
        self.page
            .evaluate_expression("window.sessionStorage.clear()")
            .await
            .map_err(engine_error)
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        let options = ScreenshotOptions::builder()
            .screenshot_type(ScreenshotType::Png)
            .full_page(full_page)
            .build();
        self.page
            .screenshot(Some(options))
            .await
            .map_err(engine_error)
    }

    async fn close(&self) -> Result<()> {
        self.page.close().await.map_err(engine_error)
    }
}
