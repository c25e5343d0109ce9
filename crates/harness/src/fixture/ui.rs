// Standard UI fixture set
//
// browser -> page -> actions -> loginPage / dashboardPage / contactPage
//
// `browser` and `page` close their resources on teardown; the others have no
// teardown of their own. The test's ledger is available as `ledger`.

use super::registry::FixtureRegistry;
use crate::action::ActionExecutor;
use crate::config::HarnessConfig;
use crate::engine::{BrowserDriver, BrowserLauncher, PageDriver};
use crate::error::Result;
use crate::pages::{BasePage, ContactPage, DashboardPage, LoginPage};
use std::sync::Arc;

pub const BROWSER: &str = "browser";
pub const PAGE: &str = "page";
pub const ACTIONS: &str = "actions";
pub const LOGIN_PAGE: &str = "loginPage";
pub const DASHBOARD_PAGE: &str = "dashboardPage";
pub const CONTACT_PAGE: &str = "contactPage";

/// Registers the standard UI fixtures.
///
/// Fixture types: `browser` is `Arc<dyn BrowserDriver>`, `page` is
/// `Arc<dyn PageDriver>`, `actions` is [`ActionExecutor`], and the page
/// objects are [`LoginPage`], [`DashboardPage`] and [`ContactPage`].
///
/// # Example
///
/// ```ignore
/// let mut registry = FixtureRegistry::from_config(&config);
/// register_ui_fixtures(&mut registry, launcher, config)?;
/// registry.validate()?;
/// ```
pub fn register_ui_fixtures(
    registry: &mut FixtureRegistry,
    launcher: Arc<dyn BrowserLauncher>,
    config: HarnessConfig,
) -> Result<()> {
    let config = Arc::new(config);

    let request = config.launch_request();
    registry.register(BROWSER, &[], move |_deps, supply| {
        let launcher = Arc::clone(&launcher);
        let request = request.clone();
        async move {
            let browser = launcher.launch(&request).await?;
            tracing::info!(
                browser = %browser.name(),
                version = %browser.version(),
                headless = request.headless,
                "Browser launched"
            );
            let browser = supply.provide(browser).await;
            browser.close().await?;
            Ok(())
        }
    })?;

    registry.register(PAGE, &[BROWSER], |deps, supply| async move {
        let browser = deps.get::<Arc<dyn BrowserDriver>>(BROWSER)?;
        let page = browser.new_page().await?;
        let page = supply.provide(page).await;
        page.close().await?;
        Ok(())
    })?;

    let actions_config = Arc::clone(&config);
    registry.register(ACTIONS, &[PAGE], move |deps, supply| {
        let config = Arc::clone(&actions_config);
        async move {
            let page = deps.get::<Arc<dyn PageDriver>>(PAGE)?;
            let actions = ActionExecutor::from_config(Arc::clone(&page), &config);
            supply.provide(actions).await;
            Ok(())
        }
    })?;

    register_page_object(registry, LOGIN_PAGE, &config, LoginPage::new)?;
    register_page_object(registry, DASHBOARD_PAGE, &config, DashboardPage::new)?;
    register_page_object(registry, CONTACT_PAGE, &config, ContactPage::new)?;
    Ok(())
}

fn register_page_object<P>(
    registry: &mut FixtureRegistry,
    name: &str,
    config: &Arc<HarnessConfig>,
    build: fn(BasePage) -> P,
) -> Result<()>
where
    P: Send + Sync + 'static,
{
    let config = Arc::clone(config);
    registry.register(name, &[ACTIONS], move |deps, supply| {
        let config = Arc::clone(&config);
        async move {
            let actions = deps.get::<ActionExecutor>(ACTIONS)?;
            let mut base = BasePage::new(ActionExecutor::clone(&actions));
            if let Some(base_url) = &config.base_url {
                base = base.with_base_url(base_url)?;
            }
            supply.provide(build(base)).await;
            Ok(())
        }
    })
}
