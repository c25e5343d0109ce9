// Runner boundary - one scoped test execution
//
// run_test brackets a test body with its fixture session and ledger:
// 1. open a session (which owns a fresh ledger)
// 2. resolve the declared fixtures; a failure skips the body
// 3. run the body, catching panics and enforcing the optional test timeout
// 4. tear down every constructed fixture, whatever happened before
// 5. decide the verdict: the first failure dominates, then a hard failure the
//    body swallowed, then the aggregated soft failures
//
// Teardown failures are reported next to the verdict and never change it.

use crate::assertion::{AssertionLedger, AssertionRecord, Check, SoftFailureReport};
use crate::error::{Error, Result, panic_message};
use crate::fixture::{FixtureRegistry, FixtureSession, Instance};
use futures_util::FutureExt;
use serde::{Serialize, Serializer};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Handle a test body uses to reach its fixtures and ledger.
#[derive(Debug, Clone)]
pub struct TestContext {
    session: Arc<FixtureSession>,
}

impl TestContext {
    pub fn test_name(&self) -> &str {
        self.session.test_name()
    }

    /// Resolves a fixture (constructing it on first use) as `T`.
    pub async fn fixture<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.session.get::<T>(name).await
    }

    /// Resolves a fixture without downcasting.
    pub async fn instance(&self, name: &str) -> Result<Instance> {
        self.session.resolve(name).await
    }

    pub fn ledger(&self) -> &Arc<AssertionLedger> {
        self.session.ledger()
    }

    /// Shorthand for `ledger().assert_hard(..)`.
    pub fn assert_hard(&self, check: Check, message: impl Into<String>) -> Result<()> {
        self.ledger().assert_hard(check, message)
    }

    /// Shorthand for `ledger().assert_soft(..)`.
    pub fn assert_soft(&self, check: Check, message: impl Into<String>) -> bool {
        self.ledger().assert_soft(check, message)
    }

    pub fn session(&self) -> &FixtureSession {
        &self.session
    }
}

/// Final state of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Passed,
    Failed,
}

/// Result of one [`run_test`] call, ready for reporters.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub name: String,
    pub verdict: Verdict,
    /// The failure that decided the verdict
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<Error>,
    /// Soft failures recorded during the test, also when another error dominated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_failures: Option<SoftFailureReport>,
    /// Teardown failures (warnings; they never change the verdict)
    #[serde(serialize_with = "serialize_errors")]
    pub teardown_warnings: Vec<Error>,
    pub records: Vec<AssertionRecord>,
    #[serde(rename = "durationMs", serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    pub fn failed(&self) -> bool {
        self.verdict == Verdict::Failed
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Machine-readable form of the report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Converts the verdict into a `Result`, e.g. to fail a `#[tokio::test]`.
    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<Error>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_errors<S: Serializer>(
    errors: &[Error],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

fn serialize_duration_ms<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Runs one test body inside its own fixture session.
///
/// `declared` fixtures are resolved before the body starts; the body may
/// resolve more through its [`TestContext`]. Teardown always runs.
///
/// # Example
///
/// ```ignore
/// let report = run_test(&registry, "successful login", &["loginPage"], |ctx| async move {
///     let login = ctx.fixture::<LoginPage>("loginPage").await?;
///     login.navigate_to_login_page().await?;
///     login.login("tomsmith", "SuperSecretPassword!").await?;
///     ctx.assert_hard(Check::contains(login.current_url().await?, "/secure"), "landed on secure area")
/// })
/// .await;
/// report.into_result()?;
/// ```
pub async fn run_test<F, Fut>(
    registry: &Arc<FixtureRegistry>,
    name: &str,
    declared: &[&str],
    body: F,
) -> TestReport
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let start = Instant::now();
    let session = Arc::new(registry.session(name));
    let context = TestContext {
        session: Arc::clone(&session),
    };
    tracing::info!(test = %name, fixtures = ?declared, "Test started");

    let mut outcome = Ok(());
    for fixture in declared {
        if let Err(err) = session.resolve(fixture).await {
            outcome = Err(err);
            break;
        }
    }
    if outcome.is_ok() {
        outcome = run_body(body, context, registry.test_timeout()).await;
    }

    let teardown_warnings = session.teardown_all().await;
    let ledger = session.ledger();

    // A hard failure the body caught still fails the test
    if outcome.is_ok() {
        if let Some(record) = ledger.hard_failure() {
            outcome = Err(Error::HardAssertionFailure {
                message: record.message,
                actual: record.actual,
                expected: record.expected,
            });
        }
    }
    if outcome.is_ok() {
        outcome = ledger.finalize();
    }
    let soft_failures = ledger.soft_failure_report();

    let duration = start.elapsed();
    let report = TestReport {
        name: name.to_string(),
        verdict: if outcome.is_ok() {
            Verdict::Passed
        } else {
            Verdict::Failed
        },
        error: outcome.err(),
        soft_failures,
        teardown_warnings,
        records: ledger.records(),
        duration,
    };

    let duration_ms = duration.as_millis() as u64;
    match &report.error {
        None => tracing::info!(test = %name, duration_ms, "Test passed"),
        Some(err) => tracing::error!(test = %name, duration_ms, error = %err, "Test failed"),
    }
    report
}

async fn run_body<F, Fut>(body: F, context: TestContext, timeout: Option<Duration>) -> Result<()>
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| body(context))) {
        Ok(future) => AssertUnwindSafe(future).catch_unwind(),
        Err(payload) => return Err(Error::TestPanicked(panic_message(payload.as_ref()))),
    };

    let caught = match timeout {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(caught) => caught,
            Err(_) => {
                return Err(Error::Timeout(format!(
                    "test body did not finish within {:?}",
                    limit
                )));
            }
        },
        None => future.await,
    };
    caught.unwrap_or_else(|payload| Err(Error::TestPanicked(panic_message(payload.as_ref()))))
}
