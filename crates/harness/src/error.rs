// Error types for playwright-harness

use crate::assertion::SoftFailureReport;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by user-supplied fixture factories.
///
/// Any error type converts into it with `?`, including `anyhow::Error`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while composing fixtures, driving the page, or asserting.
#[derive(Debug, Error)]
pub enum Error {
    /// A fixture with this name was already registered
    #[error("Fixture conflict: '{0}' is already registered")]
    FixtureConflict(String),

    /// A fixture (or a declared dependency) is not registered
    #[error("Unknown fixture '{name}'{}", required_by.as_ref().map(|r| format!(" (required by '{}')", r)).unwrap_or_default())]
    UnknownFixture {
        name: String,
        required_by: Option<String>,
    },

    /// Resolution revisited a fixture that is still being resolved
    ///
    /// The path lists every fixture on the cycle, ending with the repeated name.
    #[error("Cyclic fixture dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// The user-supplied factory failed before supplying its instance
    #[error("Fixture '{fixture}' factory failed: {source}")]
    FactoryError {
        fixture: String,
        #[source]
        source: BoxError,
    },

    /// The factory returned without ever calling `Supply::provide`
    #[error("Fixture '{0}' factory returned without supplying an instance")]
    FixtureNotSupplied(String),

    /// A fixture instance was requested as a type it does not have
    #[error("Fixture '{name}' is not of type {expected}")]
    FixtureTypeMismatch { name: String, expected: &'static str },

    /// Teardown logic of a fixture failed (reported as a warning)
    #[error("Teardown of fixture '{fixture}' failed: {source}")]
    TeardownFailed {
        fixture: String,
        #[source]
        source: BoxError,
    },

    /// Element not found by selector
    ///
    /// The selector never resolved to an element within the timeout.
    #[error("Element not found: '{target}' did not resolve within {timeout_ms}ms")]
    ElementNotFound { target: String, timeout_ms: u64 },

    /// Timeout waiting for operation
    ///
    /// Contains context about what timed out: an element that exists but never
    /// met its precondition, a navigation, or a fixture factory.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The engine rejected an interaction on a resolved element
    #[error("{action} on '{target}' failed: {message}")]
    InteractionError {
        action: String,
        target: String,
        message: String,
    },

    /// The element handle no longer points at a node in the document
    #[error("Element detached: {0}")]
    ElementDetached(String),

    /// Error reported by the automation engine
    #[error("Engine error: {0}")]
    Engine(String),

    /// A hard assertion failed; the test aborts
    #[error("Hard assertion failed: {message} (actual: {actual}, expected: {expected})")]
    HardAssertionFailure {
        message: String,
        actual: String,
        expected: String,
    },

    /// One or more soft assertions failed during the test
    #[error("{0}")]
    AggregatedSoftAssertionFailure(SoftFailureReport),

    /// The ledger already recorded a hard failure and accepts no more records
    #[error("Assertion ledger is sealed after hard failure: {0}")]
    LedgerSealed(String),

    /// The test body panicked
    #[error("Test body panicked: {0}")]
    TestPanicked(String),

    /// A required configuration value is missing
    #[error("Configuration value '{0}' is not set")]
    MissingConfig(String),

    /// Invalid argument provided to method
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error with additional context
    #[error("{0}: {1}")]
    Context(String, #[source] Box<Error>),
}

impl Error {
    /// Adds context to the error
    pub fn context(self, msg: impl Into<String>) -> Self {
        Error::Context(msg.into(), Box::new(self))
    }

    /// Whether this error belongs to the fixture layer.
    pub fn is_fixture_error(&self) -> bool {
        matches!(
            self.root(),
            Error::FixtureConflict(_)
                | Error::UnknownFixture { .. }
                | Error::CyclicDependency { .. }
                | Error::FactoryError { .. }
                | Error::FixtureNotSupplied(_)
                | Error::FixtureTypeMismatch { .. }
        )
    }

    /// Whether this error is an assertion failure (hard or aggregated soft).
    pub fn is_assertion_failure(&self) -> bool {
        matches!(
            self.root(),
            Error::HardAssertionFailure { .. } | Error::AggregatedSoftAssertionFailure(_)
        )
    }

    /// Strips `Context` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context(_, inner) => inner.root(),
            other => other,
        }
    }
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
