// Integration tests for the runner boundary (run_test)
//
// Tests cover:
// - Passing tests and fixture teardown after every outcome
// - Soft failures aggregate and fail the test once, at the end
// - Hard failures abort the body, also when the body swallows the error
// - Panics and test timeouts inside the body
// - Fixture failures skip the body
// - Teardown failures are warnings, never verdicts
// - JSON reports

mod common;

use common::Events;
use playwright_harness::{
    AssertionLedger, BoxError, Check, Error, FixtureRegistry, LEDGER_FIXTURE, Verdict, run_test,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// `browser` and `page` fixtures that log setup and teardown.
fn registry_with(events: &Events) -> FixtureRegistry {
    let mut registry = FixtureRegistry::new();
    for (name, deps) in [("browser", &[][..]), ("page", &["browser"][..])] {
        let events = events.clone();
        let fixture = name.to_string();
        registry
            .register(name, deps, move |_deps, supply| {
                let events = events.clone();
                let fixture = fixture.clone();
                async move {
                    events.push(format!("setup {}", fixture));
                    supply.provide(fixture.clone()).await;
                    events.push(format!("teardown {}", fixture));
                    Ok(())
                }
            })
            .expect("Failed to register fixture");
    }
    registry
}

// ============================================================================
// Verdicts
// ============================================================================

#[tokio::test]
async fn test_passing_test_tears_down_fixtures() {
    common::init_tracing();
    let events = Events::default();
    let registry = Arc::new(registry_with(&events));

    let report = run_test(&registry, "passing", &["page"], |ctx| async move {
        let page = ctx.fixture::<String>("page").await?;
        ctx.assert_hard(Check::equals(page.as_str(), "page"), "page fixture")?;
        ctx.assert_soft(Check::contains("Hello World", "World"), "greeting");
        Ok(())
    })
    .await;

    assert!(report.passed(), "unexpected failure: {:?}", report.error());
    assert_eq!(report.verdict, Verdict::Passed);
    assert_eq!(report.records.len(), 2);
    assert!(report.soft_failures.is_none());
    assert_eq!(
        events.snapshot(),
        vec![
            "setup browser",
            "setup page",
            "teardown page",
            "teardown browser"
        ]
    );
    report.into_result().expect("passed");
}

#[tokio::test]
async fn test_soft_failures_aggregate_at_the_end() {
    common::init_tracing();
    let events = Events::default();
    let registry = Arc::new(registry_with(&events));
    let reached_end = Arc::new(AtomicBool::new(false));

    let reached = reached_end.clone();
    let report = run_test(&registry, "soft", &[], |ctx| async move {
        ctx.assert_soft(Check::equals(201, 200), "status code");
        ctx.assert_soft(Check::contains("John Doe", "Jane"), "user name");
        ctx.assert_soft(Check::is_true(true), "flag");
        reached.store(true, Ordering::SeqCst);
        Ok(())
    })
    .await;

    assert!(reached_end.load(Ordering::SeqCst), "soft failures must not abort");
    assert!(report.failed());
    match report.error() {
        Some(Error::AggregatedSoftAssertionFailure(aggregate)) => {
            assert_eq!(aggregate.messages(), vec!["status code", "user name"]);
            assert_eq!(aggregate.test_name, "soft");
        }
        other => panic!("Expected AggregatedSoftAssertionFailure, got {:?}", other),
    }
    assert_eq!(
        report.soft_failures.as_ref().map(|r| r.failures.len()),
        Some(2)
    );
}

#[tokio::test]
async fn test_hard_failure_aborts_the_body() {
    common::init_tracing();
    let events = Events::default();
    let registry = Arc::new(registry_with(&events));
    let reached_end = Arc::new(AtomicBool::new(false));

    let reached = reached_end.clone();
    let report = run_test(&registry, "hard", &["page"], |ctx| async move {
        ctx.assert_soft(Check::equals("a", "b"), "soft before hard");
        ctx.assert_hard(
            Check::contains("Your username is invalid!", "secure area"),
            "login banner",
        )?;
        reached.store(true, Ordering::SeqCst);
        Ok(())
    })
    .await;

    assert!(!reached_end.load(Ordering::SeqCst));
    match report.error() {
        Some(Error::HardAssertionFailure {
            message,
            actual,
            expected,
        }) => {
            assert_eq!(message, "login banner");
            assert_eq!(actual, "Your username is invalid!");
            assert_eq!(expected, "secure area");
        }
        other => panic!("Expected HardAssertionFailure, got {:?}", other),
    }
    // The soft failure is still reported next to the hard one
    assert_eq!(
        report.soft_failures.as_ref().map(|r| r.messages().len()),
        Some(1)
    );
    assert!(events.contains("teardown browser"));
}

#[tokio::test]
async fn test_swallowed_hard_failure_still_fails() {
    common::init_tracing();
    let registry = Arc::new(FixtureRegistry::new());

    let report = run_test(&registry, "swallowed", &[], |ctx| async move {
        let _ = ctx.assert_hard(Check::equals(1, 2), "numbers match");
        Ok(())
    })
    .await;

    assert!(matches!(
        report.error(),
        Some(Error::HardAssertionFailure { message, .. }) if message == "numbers match"
    ));
}

#[tokio::test]
async fn test_body_error_dominates_soft_failures() {
    common::init_tracing();
    let registry = Arc::new(FixtureRegistry::new());

    let report = run_test(&registry, "body error", &[], |ctx| async move {
        ctx.assert_soft(Check::is_false(true), "flag off");
        Err(Error::ElementNotFound {
            target: "#login-button".to_string(),
            timeout_ms: 30_000,
        })
    })
    .await;

    assert!(matches!(report.error(), Some(Error::ElementNotFound { .. })));
    assert!(report.soft_failures.is_some());
}

// ============================================================================
// Panics, timeouts and fixture failures
// ============================================================================

#[tokio::test]
async fn test_panicking_body_still_tears_down() {
    common::init_tracing();
    let events = Events::default();
    let registry = Arc::new(registry_with(&events));

    let report = run_test(&registry, "panic", &["page"], |ctx| async move {
        let page = ctx.fixture::<String>("page").await?;
        if page.as_str() == "page" {
            panic!("unexpected dialog");
        }
        Ok(())
    })
    .await;

    assert!(matches!(
        report.error(),
        Some(Error::TestPanicked(msg)) if msg == "unexpected dialog"
    ));
    assert!(events.contains("teardown page"));
    assert!(events.contains("teardown browser"));
}

#[tokio::test(start_paused = true)]
async fn test_body_timeout() {
    common::init_tracing();
    let events = Events::default();
    let registry = Arc::new(registry_with(&events).with_test_timeout(Duration::from_secs(10)));

    let report = run_test(&registry, "slow", &["browser"], |_ctx| async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    })
    .await;

    assert!(matches!(
        report.error(),
        Some(Error::Timeout(msg)) if msg.contains("test body did not finish within 10s")
    ));
    assert!(report.duration >= Duration::from_secs(10));
    assert!(report.duration < Duration::from_secs(3600));
    assert!(events.contains("teardown browser"));
}

#[tokio::test]
async fn test_fixture_failure_skips_the_body() {
    common::init_tracing();
    let events = Events::default();
    let mut registry = registry_with(&events);
    registry
        .register("loginPage", &["page"], |_deps, _supply| async move {
            Err::<(), BoxError>("base URL unreachable".into())
        })
        .expect("Failed to register loginPage");
    let registry = Arc::new(registry);
    let body_ran = Arc::new(AtomicBool::new(false));

    let ran = body_ran.clone();
    let report = run_test(&registry, "fixture failure", &["loginPage"], |_ctx| async move {
        ran.store(true, Ordering::SeqCst);
        Ok(())
    })
    .await;

    assert!(!body_ran.load(Ordering::SeqCst));
    assert!(matches!(
        report.error(),
        Some(Error::FactoryError { fixture, .. }) if fixture == "loginPage"
    ));
    assert_eq!(
        events.matching("teardown"),
        vec!["teardown page", "teardown browser"]
    );
}

#[tokio::test]
async fn test_teardown_failure_is_a_warning() {
    common::init_tracing();
    let mut registry = FixtureRegistry::new();
    registry
        .register("tracing", &[], |_deps, supply| async move {
            supply.provide(()).await;
            Err::<(), BoxError>("trace upload failed".into())
        })
        .expect("Failed to register tracing");
    let registry = Arc::new(registry);

    let report = run_test(&registry, "teardown warning", &["tracing"], |_ctx| async move {
        Ok(())
    })
    .await;

    assert!(report.passed());
    assert_eq!(report.teardown_warnings.len(), 1);
    assert!(matches!(
        &report.teardown_warnings[0],
        Error::TeardownFailed { fixture, .. } if fixture == "tracing"
    ));
}

// ============================================================================
// Ledger fixture and reports
// ============================================================================

#[tokio::test]
async fn test_fixture_assertions_share_the_test_ledger() {
    common::init_tracing();
    let mut registry = FixtureRegistry::new();
    registry
        .register("seededUser", &[LEDGER_FIXTURE], |deps, supply| async move {
            let ledger = deps.get::<AssertionLedger>(LEDGER_FIXTURE)?;
            ledger.assert_soft(Check::equals(409, 201), "user created");
            supply.provide(String::from("john@example.com")).await;
            Ok(())
        })
        .expect("Failed to register seededUser");
    let registry = Arc::new(registry);

    let report = run_test(&registry, "shared ledger", &["seededUser"], |ctx| async move {
        let ledger = ctx.fixture::<AssertionLedger>(LEDGER_FIXTURE).await?;
        assert!(Arc::ptr_eq(&ledger, ctx.ledger()));
        ctx.assert_soft(Check::contains("john@example.com", "@"), "email");
        Ok(())
    })
    .await;

    assert!(report.failed());
    assert_eq!(report.records.len(), 2);
    assert_eq!(
        report.soft_failures.as_ref().map(|r| r.messages()),
        Some(vec!["user created"])
    );
}

#[tokio::test]
async fn test_report_serializes_to_json() {
    common::init_tracing();
    let registry = Arc::new(FixtureRegistry::new());

    let report = run_test(&registry, "json report", &[], |ctx| async move {
        ctx.assert_soft(Check::equals("Jane", "John Doe"), "name");
        Ok(())
    })
    .await;

    let json = report.to_json().expect("Failed to serialize report");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

    assert_eq!(value["name"], "json report");
    assert_eq!(value["verdict"], "failed");
    assert!(
        value["error"]
            .as_str()
            .expect("error is a string")
            .contains("1 soft assertion(s) failed in 'json report'")
    );
    assert_eq!(value["softFailures"]["failures"][0]["message"], "name");
    assert_eq!(value["records"][0]["kind"], "soft");
    assert!(value["teardownWarnings"].as_array().expect("array").is_empty());
    assert!(value["durationMs"].is_u64());
}
