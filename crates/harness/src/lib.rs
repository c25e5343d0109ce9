//! playwright-harness: fixtures, resilient actions and hard/soft assertions for browser tests
//!
//! The harness sits between a test runner and a browser automation engine:
//!
//! - [`FixtureRegistry`] / [`FixtureSession`]: named per-test resources built
//!   lazily in dependency order and torn down in reverse order, always.
//! - [`ActionExecutor`]: single interactions that wait for their element to
//!   be present/visible, with bounded polling and structured logs.
//! - [`AssertionLedger`]: hard assertions abort the test; soft assertions are
//!   collected and fail the test once, at the end, with every message.
//!
//! The engine itself is reached through the traits in [`engine`]. Enable the
//! `playwright` feature for the adapter backed by the `playwright-rs` bindings.
//!
//! # Examples
//!
//! ## Running a test with the standard UI fixtures
//!
//! ```ignore
//! use playwright_harness::{
//!     Check, Environment, FixtureRegistry, HarnessConfig, LoginPage, DashboardPage,
//!     register_ui_fixtures, run_test,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let env = Environment::load("environment", None)?;
//!     let config = HarnessConfig::from_environment(&env)?;
//!
//!     let mut registry = FixtureRegistry::from_config(&config);
//!     register_ui_fixtures(&mut registry, launcher(), config)?;
//!     registry.validate()?;
//!     let registry = Arc::new(registry);
//!
//!     let report = run_test(&registry, "successful login", &["loginPage", "dashboardPage"], |ctx| async move {
//!         let login = ctx.fixture::<LoginPage>("loginPage").await?;
//!         login.navigate_to_login_page().await?;
//!         login.accept_cookies().await?;
//!         login.login(env.get("VALID_USERNAME")?, env.get("VALID_PASSWORD")?).await?;
//!
//!         let dashboard = ctx.fixture::<DashboardPage>("dashboardPage").await?;
//!         let url = dashboard.current_url().await?;
//!         ctx.assert_soft(Check::equals(url.as_str(), env.get("SUCCESSFULL_LOGIN_URL")?), "login URL");
//!
//!         let message = dashboard.flash_message().await?;
//!         ctx.assert_hard(Check::contains(&message, "You logged into a secure area!"), "welcome message")
//!     })
//!     .await;
//!
//!     println!("{}", report.to_json()?);
//!     report.into_result()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Custom fixtures
//!
//! ```ignore
//! use playwright_harness::FixtureRegistry;
//!
//! let mut registry = FixtureRegistry::new();
//! registry.register("apiToken", &["baseUrl"], |deps, supply| async move {
//!     let base_url = deps.get::<String>("baseUrl")?;
//!     let token = login_over_http(&base_url).await?;
//!     let token = supply.provide(token).await;
//!     // Runs at teardown, after every dependent fixture is gone
//!     logout_over_http(&base_url, &token).await?;
//!     Ok(())
//! })?;
//! ```

pub mod action;
pub mod assertion;
pub mod config;
pub mod engine;
mod error;
pub mod fixture;
pub mod locatable;
pub mod pages;
pub mod runner;

// Re-export error types
pub use error::{BoxError, Error, Result};

// Re-export configuration
pub use config::{
    BrowserKind, DEFAULT_ASSERTION_TIMEOUT, DEFAULT_ENVIRONMENT, DEFAULT_POLL_INTERVAL,
    DEFAULT_TIMEOUT_MS, Environment, HarnessConfig,
};

// Re-export the fixture graph
pub use fixture::ui::register_ui_fixtures;
pub use fixture::{
    Dependencies, FixtureDescriptor, FixtureRegistry, FixtureSession, FixtureState, Instance,
    LEDGER_FIXTURE, Supply,
};

// Re-export actions and element addressing
pub use action::{Action, ActionExecutor, ActionOptions, ClickOptions, Expectation, WaitState};
pub use locatable::Locatable;

// Re-export assertions
pub use assertion::{
    AssertionKind, AssertionLedger, AssertionRecord, Check, Comparison, Outcome,
    SoftFailureReport,
};

// Re-export engine types
pub use engine::{
    BoundingBox, BrowserDriver, BrowserLauncher, Cookie, ElementRef, ElementState, LaunchRequest,
    MouseButton, PageDriver, SelectOption,
};

// Re-export page objects
pub use pages::{BasePage, ContactPage, DashboardPage, LoginPage};

// Re-export the runner boundary
pub use runner::{TestContext, TestReport, Verdict, run_test};
