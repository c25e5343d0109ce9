// Shared test support
//
// - init_tracing(): fmt subscriber honouring RUST_LOG
// - LogCapture: in-memory layer for asserting on emitted log events
// - FakeLauncher / FakeBrowser / FakePage: scriptable engine with an event log,
//   cookies and web storage
//
// Element timing uses tokio's clock, so tests under `start_paused = true`
// observe delays without sleeping for real.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use playwright_harness::{
    BoundingBox, BrowserDriver, BrowserLauncher, Cookie, ElementRef, ElementState, Error,
    LaunchRequest, MouseButton, PageDriver, Result, SelectOption,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber once per test binary.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Log capture
// ============================================================================

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Layer that keeps every event in memory.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Captures events on the current thread until the guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// First event whose message starts with `prefix`.
    pub fn find(&self, prefix: &str) -> Option<CapturedEvent> {
        self.events
            .lock()
            .iter()
            .find(|e| e.message.starts_with(prefix))
            .cloned()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}

// ============================================================================
// Event log
// ============================================================================

/// Ordered record of everything the fake engine was asked to do.
#[derive(Clone, Default)]
pub struct Events {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Events {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().iter().any(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }

    /// Entries starting with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == entry)
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.lock().iter()).finish()
    }
}

// ============================================================================
// Fake page
// ============================================================================

/// A scripted element. Builder-style setters mirror the states a page can put
/// an element in.
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub visible: bool,
    pub enabled: bool,
    pub editable: bool,
    pub checked: bool,
    pub text: String,
    pub value: String,
    pub attributes: HashMap<String, String>,
    pub bounding_box: Option<BoundingBox>,
    pub present_from: Option<Instant>,
    pub present_until: Option<Instant>,
    pub visible_from: Option<Instant>,
    pub reject: Option<String>,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self {
            visible: true,
            enabled: true,
            editable: true,
            checked: false,
            text: String::new(),
            value: String::new(),
            attributes: HashMap::new(),
            bounding_box: Some(BoundingBox::new(0.0, 0.0, 100.0, 20.0)),
            present_from: None,
            present_until: None,
            visible_from: None,
            reject: None,
        }
    }
}

impl FakeElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn at(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounding_box = Some(BoundingBox::new(x, y, width, height));
        self
    }

    pub fn without_box(mut self) -> Self {
        self.bounding_box = None;
        self
    }

    /// Not in the document until `delay` has passed.
    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.present_from = Some(Instant::now() + delay);
        self
    }

    /// Removed from the document once `delay` has passed.
    pub fn disappears_after(mut self, delay: Duration) -> Self {
        self.present_until = Some(Instant::now() + delay);
        self
    }

    /// Present but not visible until `delay` has passed.
    pub fn visible_after(mut self, delay: Duration) -> Self {
        self.visible_from = Some(Instant::now() + delay);
        self
    }

    /// Interactions fail with an engine error carrying `message`.
    pub fn rejecting(mut self, message: &str) -> Self {
        self.reject = Some(message.to_string());
        self
    }

    fn is_present(&self) -> bool {
        let now = Instant::now();
        self.present_from.is_none_or(|from| now >= from)
            && self.present_until.is_none_or(|until| now < until)
    }

    fn is_visible(&self) -> bool {
        self.visible && self.visible_from.is_none_or(|from| Instant::now() >= from)
    }
}

type Hook = Arc<dyn Fn(&FakePage) + Send + Sync>;

/// PNG signature; the fake's screenshots are just this header plus a marker.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// In-memory page. Element references are the selectors that found them.
pub struct FakePage {
    events: Events,
    elements: Mutex<HashMap<String, FakeElement>>,
    url: Mutex<String>,
    title: Mutex<String>,
    goto_delay: Mutex<Option<Duration>>,
    click_hooks: Mutex<HashMap<String, Hook>>,
    lookups: AtomicUsize,
    cookies: Mutex<Vec<Cookie>>,
    local_storage: Mutex<BTreeMap<String, String>>,
    session_storage: Mutex<BTreeMap<String, String>>,
    state_delay: Mutex<Option<Duration>>,
}

impl FakePage {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            elements: Mutex::new(HashMap::new()),
            url: Mutex::new("about:blank".to_string()),
            title: Mutex::new(String::new()),
            goto_delay: Mutex::new(None),
            click_hooks: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
            cookies: Mutex::new(Vec::new()),
            local_storage: Mutex::new(BTreeMap::new()),
            session_storage: Mutex::new(BTreeMap::new()),
            state_delay: Mutex::new(None),
        }
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    pub fn add(&self, selector: &str, element: FakeElement) {
        self.elements.lock().insert(selector.to_string(), element);
    }

    pub fn remove(&self, selector: &str) {
        self.elements.lock().remove(selector);
    }

    pub fn element(&self, selector: &str) -> Option<FakeElement> {
        self.elements.lock().get(selector).cloned()
    }

    pub fn set_title(&self, title: &str) {
        *self.title.lock() = title.to_string();
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock() = url.to_string();
    }

    /// Navigation takes `delay` before it completes.
    pub fn delay_goto(&self, delay: Duration) {
        *self.goto_delay.lock() = Some(delay);
    }

    /// Runs `hook` after every successful click on `selector`.
    pub fn on_click<F>(&self, selector: &str, hook: F)
    where
        F: Fn(&FakePage) + Send + Sync + 'static,
    {
        self.click_hooks
            .lock()
            .insert(selector.to_string(), Arc::new(hook));
    }

    /// Cookie, storage and screenshot calls take `delay` before they answer.
    pub fn delay_browser_state(&self, delay: Duration) {
        *self.state_delay.lock() = Some(delay);
    }

    pub fn set_local_storage(&self, key: &str, value: &str) {
        self.local_storage
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    pub fn local_storage(&self) -> BTreeMap<String, String> {
        self.local_storage.lock().clone()
    }

    pub fn set_session_storage(&self, key: &str, value: &str) {
        self.session_storage
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    pub fn session_storage(&self) -> BTreeMap<String, String> {
        self.session_storage.lock().clone()
    }

    /// Number of selector lookups so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// The live element behind `handle`, or ElementDetached.
    fn live(&self, handle: &ElementRef) -> Result<FakeElement> {
        self.elements
            .lock()
            .get(handle.guid())
            .filter(|e| e.is_present())
            .cloned()
            .ok_or_else(|| Error::ElementDetached(handle.guid().to_string()))
    }

    async fn browser_state_delay(&self) {
        let delay = *self.state_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Web storage is denied on documents without an origin, as in browsers.
    fn storage_access(&self, storage: &str) -> Result<()> {
        if self.url.lock().starts_with("about:") {
            return Err(Error::Engine(format!(
                "SecurityError: Failed to read the '{}' property from 'Window': \
                 Access is denied for this document.",
                storage
            )));
        }
        Ok(())
    }

    /// Like `live`, but fails with the element's rejection after logging the attempt.
    fn interactable(&self, handle: &ElementRef, attempt: String) -> Result<FakeElement> {
        let element = self.live(handle)?;
        self.events.push(attempt);
        match &element.reject {
            Some(message) => Err(Error::Engine(message.clone())),
            None => Ok(element),
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let found = self
            .elements
            .lock()
            .get(selector)
            .is_some_and(FakeElement::is_present);
        Ok(found.then(|| ElementRef::new(selector)))
    }

    async fn is_attached(&self, element: &ElementRef) -> Result<bool> {
        Ok(self.live(element).is_ok())
    }

    async fn element_state(&self, element: &ElementRef, state: ElementState) -> Result<bool> {
        let element = self.live(element)?;
        Ok(match state {
            ElementState::Visible => element.is_visible(),
            ElementState::Enabled => element.enabled,
            ElementState::Editable => element.enabled && element.editable,
            ElementState::Checked => element.checked,
        })
    }

    async fn click(
        &self,
        element: &ElementRef,
        button: MouseButton,
        click_count: u32,
    ) -> Result<()> {
        self.interactable(
            element,
            format!("click {} {:?} x{}", element.guid(), button, click_count),
        )?;
        let hook = self.click_hooks.lock().get(element.guid()).cloned();
        if let Some(hook) = hook {
            hook(self);
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, text: &str) -> Result<()> {
        let current = self.interactable(element, format!("fill {} {}", element.guid(), text))?;
        if !(current.enabled && current.editable) {
            return Err(Error::Engine("Element is not editable".to_string()));
        }
        if let Some(stored) = self.elements.lock().get_mut(element.guid()) {
            stored.value = text.to_string();
        }
        Ok(())
    }

    async fn hover(&self, element: &ElementRef) -> Result<()> {
        self.interactable(element, format!("hover {}", element.guid()))?;
        Ok(())
    }

    async fn inner_text(&self, element: &ElementRef) -> Result<String> {
        Ok(self.live(element)?.text)
    }

    async fn get_attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        Ok(self.live(element)?.attributes.get(name).cloned())
    }

    async fn input_value(&self, element: &ElementRef) -> Result<String> {
        Ok(self.live(element)?.value)
    }

    async fn select_option(
        &self,
        element: &ElementRef,
        option: &SelectOption,
    ) -> Result<Vec<String>> {
        self.interactable(element, format!("select {} {}", element.guid(), option))?;
        let selected = match option {
            SelectOption::Value(value) => value.clone(),
            SelectOption::Label(label) => label.to_lowercase(),
            SelectOption::Index(index) => index.to_string(),
        };
        if let Some(stored) = self.elements.lock().get_mut(element.guid()) {
            stored.value = selected.clone();
        }
        Ok(vec![selected])
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<()> {
        self.interactable(element, format!("scroll {}", element.guid()))?;
        Ok(())
    }

    async fn bounding_box(&self, element: &ElementRef) -> Result<Option<BoundingBox>> {
        Ok(self.live(element)?.bounding_box)
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<()> {
        self.events.push(format!("mouse_move {},{}", x, y));
        Ok(())
    }

    async fn mouse_down(&self, button: MouseButton) -> Result<()> {
        self.events.push(format!("mouse_down {:?}", button));
        Ok(())
    }

    async fn mouse_up(&self, button: MouseButton) -> Result<()> {
        self.events.push(format!("mouse_up {:?}", button));
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let delay = *self.goto_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.events.push(format!("goto {}", url));
        self.set_url(url);
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.url.lock().clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.title.lock().clone())
    }

    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        self.browser_state_delay().await;
        let mut jar = self.cookies.lock();
        for cookie in cookies {
            self.events.push(format!("add cookie {}", cookie.name));
            jar.retain(|c| {
                !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path)
            });
            jar.push(cookie.clone());
        }
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        self.browser_state_delay().await;
        Ok(self.cookies.lock().clone())
    }

    async fn clear_cookies(&self) -> Result<()> {
        self.browser_state_delay().await;
        self.events.push("clear cookies");
        self.cookies.lock().clear();
        Ok(())
    }

    async fn clear_local_storage(&self) -> Result<()> {
        self.browser_state_delay().await;
        self.storage_access("localStorage")?;
        self.events.push("clear localStorage");
        self.local_storage.lock().clear();
        Ok(())
    }

    async fn clear_session_storage(&self) -> Result<()> {
        self.browser_state_delay().await;
        self.storage_access("sessionStorage")?;
        self.events.push("clear sessionStorage");
        self.session_storage.lock().clear();
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        self.browser_state_delay().await;
        self.events.push(format!("screenshot full_page={}", full_page));
        let mut image = PNG_SIGNATURE.to_vec();
        image.extend_from_slice(if full_page { b"full" } else { b"view" });
        Ok(image)
    }

    async fn close(&self) -> Result<()> {
        self.events.push("close page");
        Ok(())
    }
}

// ============================================================================
// Fake browser and launcher
// ============================================================================

pub struct FakeBrowser {
    page: Arc<FakePage>,
    events: Events,
    fail_close: bool,
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    fn name(&self) -> String {
        "chromium".to_string()
    }

    fn version(&self) -> String {
        "0.0.0-fake".to_string()
    }

    async fn new_page(&self) -> Result<Arc<dyn PageDriver>> {
        self.events.push("new page");
        Ok(self.page.clone())
    }

    async fn close(&self) -> Result<()> {
        self.events.push("close browser");
        if self.fail_close {
            return Err(Error::Engine("browser process already exited".to_string()));
        }
        Ok(())
    }
}

/// Launches FakeBrowsers that all hand out the same page.
pub struct FakeLauncher {
    page: Arc<FakePage>,
    events: Events,
    launch_error: Option<String>,
    fail_close: bool,
    launches: AtomicUsize,
    requests: Mutex<Vec<LaunchRequest>>,
}

impl FakeLauncher {
    pub fn new(page: Arc<FakePage>) -> Self {
        let events = page.events().clone();
        Self {
            page,
            events,
            launch_error: None,
            fail_close: false,
            launches: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every launch fails with an engine error.
    pub fn failing(mut self, message: &str) -> Self {
        self.launch_error = Some(message.to_string());
        self
    }

    /// Launched browsers fail to close.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<Arc<dyn BrowserDriver>> {
        self.requests.lock().push(request.clone());
        if let Some(message) = &self.launch_error {
            return Err(Error::Engine(message.clone()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.events.push(format!("launch {}", request.browser));
        Ok(Arc::new(FakeBrowser {
            page: self.page.clone(),
            events: self.events.clone(),
            fail_close: self.fail_close,
        }))
    }
}

/// A fresh page with its own event log.
pub fn fake_page() -> Arc<FakePage> {
    Arc::new(FakePage::new(Events::default()))
}
