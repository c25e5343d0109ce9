// Assertions - typed comparisons, hard/soft semantics and the per-test ledger
//
// A Check is an evaluated comparison: both sides are captured as text and the
// outcome is fixed when the Check is built. The ledger decides what a failing
// Check means:
// - hard: record it, seal the ledger and return an aborting error
// - soft: record it and carry on; finalize() reports every soft failure at once
//
// Element checks (visible, enabled, attribute, ...) are produced by
// `Expectation` in the action layer, which polls the page before settling.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

/// Kind of comparison a [`Check`] performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparison {
    Equals,
    NotEquals,
    /// Case-sensitive substring containment
    Contains,
    /// Regular expression match
    Matches,
    IsTrue,
    IsFalse,
    /// Value is present (not null/undefined)
    IsSome,
    /// Value is absent
    IsNone,
    /// Every key of the expected JSON object equals the actual value at that key
    JsonSubset,
    Visible,
    Hidden,
    Attached,
    Enabled,
    Disabled,
    Editable,
    /// Exact (trimmed) element text
    Text,
    /// Element text contains a substring
    ContainsText,
    /// Attribute value equality; holds the attribute name
    Attribute(String),
    /// Input value equality
    Value,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Equals => f.write_str("equal"),
            Comparison::NotEquals => f.write_str("not equal"),
            Comparison::Contains => f.write_str("contain"),
            Comparison::Matches => f.write_str("match"),
            Comparison::IsTrue => f.write_str("be true"),
            Comparison::IsFalse => f.write_str("be false"),
            Comparison::IsSome => f.write_str("be defined"),
            Comparison::IsNone => f.write_str("be null"),
            Comparison::JsonSubset => f.write_str("contain JSON"),
            Comparison::Visible => f.write_str("be visible"),
            Comparison::Hidden => f.write_str("be hidden"),
            Comparison::Attached => f.write_str("be attached"),
            Comparison::Enabled => f.write_str("be enabled"),
            Comparison::Disabled => f.write_str("be disabled"),
            Comparison::Editable => f.write_str("be editable"),
            Comparison::Text => f.write_str("have text"),
            Comparison::ContainsText => f.write_str("contain text"),
            Comparison::Attribute(name) => write!(f, "have attribute '{}'", name),
            Comparison::Value => f.write_str("have value"),
        }
    }
}

impl Comparison {
    /// Element state comparisons carry no expected value of their own.
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            Comparison::Visible
                | Comparison::Hidden
                | Comparison::Attached
                | Comparison::Enabled
                | Comparison::Disabled
                | Comparison::Editable
        )
    }
}

/// An evaluated comparison, ready to be recorded by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    comparison: Comparison,
    /// Element the check observed, for element checks
    subject: Option<String>,
    negated: bool,
    actual: String,
    expected: String,
    passed: bool,
    detail: Option<String>,
}

impl Check {
    /// `actual == expected`. Both sides must have the same type.
    pub fn equals<T: PartialEq + fmt::Debug>(actual: T, expected: T) -> Self {
        let passed = actual == expected;
        Self::evaluated(
            Comparison::Equals,
            format!("{:?}", actual),
            format!("{:?}", expected),
            passed,
        )
    }

    /// `actual != expected`. Both sides must have the same type.
    pub fn not_equals<T: PartialEq + fmt::Debug>(actual: T, expected: T) -> Self {
        let passed = actual != expected;
        Self::evaluated(
            Comparison::NotEquals,
            format!("{:?}", actual),
            format!("{:?}", expected),
            passed,
        )
    }

    /// Case-sensitive substring check.
    pub fn contains(actual: impl AsRef<str>, expected: impl AsRef<str>) -> Self {
        let (actual, expected) = (actual.as_ref(), expected.as_ref());
        Self::evaluated(
            Comparison::Contains,
            actual.to_string(),
            expected.to_string(),
            actual.contains(expected),
        )
    }

    /// Regex match against `pattern`.
    pub fn matches(actual: impl AsRef<str>, pattern: &str) -> Result<Self> {
        let re = regex::Regex::new(pattern)
            .map_err(|e| Error::InvalidArgument(format!("Invalid regex: {}", e)))?;
        let actual = actual.as_ref();
        Ok(Self::evaluated(
            Comparison::Matches,
            actual.to_string(),
            pattern.to_string(),
            re.is_match(actual),
        ))
    }

    pub fn is_true(actual: bool) -> Self {
        Self::evaluated(Comparison::IsTrue, actual.to_string(), "true".into(), actual)
    }

    pub fn is_false(actual: bool) -> Self {
        Self::evaluated(Comparison::IsFalse, actual.to_string(), "false".into(), !actual)
    }

    pub fn is_some<T: fmt::Debug>(actual: &Option<T>) -> Self {
        Self::evaluated(
            Comparison::IsSome,
            format!("{:?}", actual),
            "Some(_)".into(),
            actual.is_some(),
        )
    }

    pub fn is_none<T: fmt::Debug>(actual: &Option<T>) -> Self {
        Self::evaluated(
            Comparison::IsNone,
            format!("{:?}", actual),
            "None".into(),
            actual.is_none(),
        )
    }

    /// Every key of `expected` must be present in `actual` with an equal value.
    ///
    /// Both sides must be JSON objects; anything else fails the check. The
    /// detail lists every mismatching key.
    pub fn json_subset(actual: &serde_json::Value, expected: &serde_json::Value) -> Self {
        let mut check = Self::evaluated(
            Comparison::JsonSubset,
            actual.to_string(),
            expected.to_string(),
            false,
        );
        let (Some(actual_map), Some(expected_map)) = (actual.as_object(), expected.as_object())
        else {
            check.detail = Some("both actual and expected must be JSON objects".into());
            return check;
        };

        let mismatches: Vec<String> = expected_map
            .iter()
            .filter(|(key, value)| actual_map.get(*key) != Some(*value))
            .map(|(key, value)| {
                let found = actual_map
                    .get(key)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "<missing>".into());
                format!("key '{}': expected {}, but was {}", key, value, found)
            })
            .collect();

        check.passed = mismatches.is_empty();
        if !check.passed {
            check.detail = Some(mismatches.join("; "));
        }
        check
    }

    /// A check whose outcome was observed on the page.
    pub(crate) fn observed(
        subject: String,
        comparison: Comparison,
        negated: bool,
        actual: String,
        expected: String,
        passed: bool,
    ) -> Self {
        Self {
            comparison,
            subject: Some(subject),
            negated,
            actual,
            expected,
            passed,
            detail: None,
        }
    }

    fn evaluated(comparison: Comparison, actual: String, expected: String, passed: bool) -> Self {
        Self {
            comparison,
            subject: None,
            negated: false,
            actual,
            expected,
            passed,
            detail: None,
        }
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn actual(&self) -> &str {
        &self.actual
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Human-readable description, used when the caller supplies no message.
    pub fn describe(&self) -> String {
        let not = if self.negated { "NOT " } else { "" };
        let mut text = match &self.subject {
            Some(subject) if self.comparison.is_state() => format!(
                "expected element '{}' {}to {}, but was {}",
                subject, not, self.comparison, self.actual
            ),
            Some(subject) => format!(
                "expected element '{}' {}to {} {:?}, but was {:?}",
                subject, not, self.comparison, self.expected, self.actual
            ),
            None => format!(
                "expected {} {}to {} {}",
                self.actual, not, self.comparison, self.expected
            ),
        };
        if let Some(detail) = &self.detail {
            text.push_str(&format!(" ({})", detail));
        }
        text
    }
}

/// Hard assertions abort the test; soft ones are deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionKind {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

/// One recorded assertion. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionRecord {
    pub kind: AssertionKind,
    pub comparison: Comparison,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub negated: bool,
    pub actual: String,
    pub expected: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub outcome: Outcome,
    pub timestamp: SystemTime,
}

impl AssertionRecord {
    fn new(kind: AssertionKind, check: Check, message: String) -> Self {
        let message = if message.is_empty() {
            check.describe()
        } else {
            message
        };
        Self {
            kind,
            outcome: if check.passed {
                Outcome::Pass
            } else {
                Outcome::Fail
            },
            comparison: check.comparison,
            subject: check.subject,
            negated: check.negated,
            actual: check.actual,
            expected: check.expected,
            message,
            detail: check.detail,
            timestamp: SystemTime::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Fail
    }
}

/// Every soft failure of one test, in the order they were recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftFailureReport {
    pub test_name: String,
    pub failures: Vec<AssertionRecord>,
}

impl SoftFailureReport {
    /// Failure messages in recorded order.
    pub fn messages(&self) -> Vec<&str> {
        self.failures.iter().map(|r| r.message.as_str()).collect()
    }
}

impl fmt::Display for SoftFailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} soft assertion(s) failed in '{}':",
            self.failures.len(),
            self.test_name
        )?;
        for (index, record) in self.failures.iter().enumerate() {
            write!(
                f,
                "\n  {}) {} (actual: {}, expected: {}{})",
                index + 1,
                record.message,
                record.actual,
                if record.negated { "not " } else { "" },
                record.expected
            )?;
            if let Some(detail) = &record.detail {
                write!(f, " [{}]", detail)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<AssertionRecord>,
    /// Message of the hard failure that sealed the ledger
    sealed: Option<String>,
    finalized: bool,
}

/// Ordered record of every assertion made during one test.
///
/// Shared by reference between the test body and page objects; one ledger per
/// test, never reused.
#[derive(Debug)]
pub struct AssertionLedger {
    test_name: String,
    state: Mutex<LedgerState>,
}

impl AssertionLedger {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Records `check`; a failure seals the ledger and returns
    /// [`Error::HardAssertionFailure`] carrying `message`.
    ///
    /// After a hard failure nothing more is recorded and every further
    /// assertion returns [`Error::LedgerSealed`].
    pub fn assert_hard(&self, check: Check, message: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.sealed {
            return Err(Error::LedgerSealed(reason.clone()));
        }

        let record = AssertionRecord::new(AssertionKind::Hard, check, message.into());
        if !record.is_failure() {
            tracing::debug!(
                test = %self.test_name,
                comparison = %record.comparison,
                message = %record.message,
                "Hard assertion passed"
            );
            state.records.push(record);
            return Ok(());
        }

        tracing::error!(
            test = %self.test_name,
            comparison = %record.comparison,
            actual = %record.actual,
            expected = %record.expected,
            "Assertion failed: {}",
            record.message
        );
        let err = Error::HardAssertionFailure {
            message: record.message.clone(),
            actual: record.actual.clone(),
            expected: record.expected.clone(),
        };
        state.sealed = Some(record.message.clone());
        state.records.push(record);
        Err(err)
    }

    /// Records `check` and returns whether it passed. Never aborts.
    ///
    /// Ignored (with a warning) once the ledger is sealed by a hard failure.
    pub fn assert_soft(&self, check: Check, message: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        let passed = check.passed;
        if state.sealed.is_some() {
            tracing::warn!(test = %self.test_name, "Soft assertion after hard failure ignored");
            return passed;
        }

        let record = AssertionRecord::new(AssertionKind::Soft, check, message.into());
        if passed {
            tracing::debug!(
                test = %self.test_name,
                comparison = %record.comparison,
                message = %record.message,
                "Soft assertion passed"
            );
        } else {
            tracing::warn!(
                test = %self.test_name,
                comparison = %record.comparison,
                actual = %record.actual,
                expected = %record.expected,
                "Soft assertion failed: {}",
                record.message
            );
        }
        state.records.push(record);
        passed
    }

    /// Fails with [`Error::AggregatedSoftAssertionFailure`] when any soft
    /// assertion failed.
    ///
    /// Only the first call decides; later calls return `Ok(())`. A sealed ledger
    /// finalizes to `Ok(())` because its hard failure already decided the test.
    pub fn finalize(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.finalized {
            return Ok(());
        }
        state.finalized = true;
        if state.sealed.is_some() {
            return Ok(());
        }
        match Self::report_from(&self.test_name, &state.records) {
            Some(report) => Err(Error::AggregatedSoftAssertionFailure(report)),
            None => Ok(()),
        }
    }

    /// Soft failures recorded so far, or None when there are none.
    pub fn soft_failure_report(&self) -> Option<SoftFailureReport> {
        let state = self.state.lock();
        Self::report_from(&self.test_name, &state.records)
    }

    /// Snapshot of every record in order.
    pub fn records(&self) -> Vec<AssertionRecord> {
        self.state.lock().records.clone()
    }

    /// The hard failure that sealed the ledger, if any.
    pub fn hard_failure(&self) -> Option<AssertionRecord> {
        let state = self.state.lock();
        state.sealed.as_ref()?;
        state
            .records
            .iter()
            .rev()
            .find(|r| r.kind == AssertionKind::Hard && r.is_failure())
            .cloned()
    }

    pub fn is_sealed(&self) -> bool {
        self.state.lock().sealed.is_some()
    }

    pub fn is_finalized(&self) -> bool {
        self.state.lock().finalized
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn report_from(test_name: &str, records: &[AssertionRecord]) -> Option<SoftFailureReport> {
        let failures: Vec<AssertionRecord> = records
            .iter()
            .filter(|r| r.kind == AssertionKind::Soft && r.is_failure())
            .cloned()
            .collect();
        if failures.is_empty() {
            None
        } else {
            Some(SoftFailureReport {
                test_name: test_name.to_string(),
                failures,
            })
        }
    }
}
