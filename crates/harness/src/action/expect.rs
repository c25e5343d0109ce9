// Expectation - auto-retrying element checks
//
// Polls an element observation until it matches or the timeout expires and
// then settles into a Check for the AssertionLedger. A missing element is an
// observation like any other ("absent"), so `to_be_hidden` passes for elements
// that were never rendered. Only engine faults surface as errors.

use super::ActionExecutor;
use crate::assertion::{Check, Comparison};
use crate::engine::{ElementState, PageDriver};
use crate::error::{Error, Result};
use crate::locatable::Locatable;
use std::time::Duration;
use tokio::time::Instant;

const ABSENT: &str = "<absent>";

/// What an expectation reads from the element on every poll.
#[derive(Debug, Clone)]
enum Property {
    State(ElementState),
    Attached,
    Text,
    Attribute(String),
    Value,
}

/// Expectation for one element, created by [`ActionExecutor::expect`].
///
/// # Example
///
/// ```ignore
/// let check = actions.expect(".flash").to_contain_text("secure area").await?;
/// ledger.assert_soft(check, "login banner");
/// ```
pub struct Expectation {
    executor: ActionExecutor,
    target: Locatable,
    timeout: Duration,
    poll_interval: Duration,
    negate: bool,
}

impl Expectation {
    pub(crate) fn new(executor: ActionExecutor, target: Locatable, timeout: Duration) -> Self {
        let poll_interval = executor.poll_interval();
        Self {
            executor,
            target,
            timeout,
            poll_interval,
            negate: false,
        }
    }

    /// Sets a custom timeout for this expectation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets a custom poll interval for this expectation
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Negates the expectation
    ///
    /// Note: We intentionally use `.not()` method instead of implementing `std::ops::Not`
    /// to match Playwright's API across all language bindings.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub async fn to_be_visible(self) -> Result<Check> {
        self.settle(Property::State(ElementState::Visible), false, Comparison::Visible, "visible")
            .await
    }

    pub async fn to_be_hidden(self) -> Result<Check> {
        self.settle(Property::State(ElementState::Visible), true, Comparison::Hidden, "hidden")
            .await
    }

    pub async fn to_be_attached(self) -> Result<Check> {
        self.settle(Property::Attached, false, Comparison::Attached, "attached")
            .await
    }

    pub async fn to_be_enabled(self) -> Result<Check> {
        self.settle(Property::State(ElementState::Enabled), false, Comparison::Enabled, "enabled")
            .await
    }

    pub async fn to_be_disabled(self) -> Result<Check> {
        self.settle(Property::State(ElementState::Enabled), true, Comparison::Disabled, "disabled")
            .await
    }

    pub async fn to_be_editable(self) -> Result<Check> {
        self.settle(
            Property::State(ElementState::Editable),
            false,
            Comparison::Editable,
            "editable",
        )
        .await
    }

    /// Trimmed element text equals `expected`.
    pub async fn to_have_text(self, expected: &str) -> Result<Check> {
        let wanted = expected.trim().to_string();
        self.settle_value(Property::Text, Comparison::Text, expected, move |text| {
            text.trim() == wanted
        })
        .await
    }

    /// Element text contains `expected` (case-sensitive).
    pub async fn to_contain_text(self, expected: &str) -> Result<Check> {
        let wanted = expected.to_string();
        self.settle_value(Property::Text, Comparison::ContainsText, expected, move |text| {
            text.contains(&wanted)
        })
        .await
    }

    pub async fn to_have_attribute(self, name: &str, expected: &str) -> Result<Check> {
        let wanted = expected.to_string();
        self.settle_value(
            Property::Attribute(name.to_string()),
            Comparison::Attribute(name.to_string()),
            expected,
            move |value| value == wanted,
        )
        .await
    }

    pub async fn to_have_value(self, expected: &str) -> Result<Check> {
        let wanted = expected.to_string();
        self.settle_value(Property::Value, Comparison::Value, expected, move |value| {
            value == wanted
        })
        .await
    }

    /// State expectations: the observation itself is the outcome, optionally inverted.
    async fn settle(
        self,
        property: Property,
        invert: bool,
        comparison: Comparison,
        expected: &str,
    ) -> Result<Check> {
        // Only hidden accepts an element that is not there
        let absent_passes = comparison == Comparison::Hidden;
        self.poll(property, comparison, expected, move |observed| {
            let holds = if observed.present {
                observed.holds != invert
            } else {
                absent_passes
            };
            (holds, observed.label)
        })
        .await
    }

    /// Value expectations: `matches` decides on the observed text. Absent never matches.
    async fn settle_value<F>(
        self,
        property: Property,
        comparison: Comparison,
        expected: &str,
        matches: F,
    ) -> Result<Check>
    where
        F: Fn(&str) -> bool,
    {
        self.poll(property, comparison, expected, move |observed| {
            let holds = observed.holds && matches(&observed.label);
            (holds, observed.label)
        })
        .await
    }

    async fn poll<F>(
        self,
        property: Property,
        comparison: Comparison,
        expected: &str,
        evaluate: F,
    ) -> Result<Check>
    where
        F: Fn(Observation) -> (bool, String),
    {
        let start = Instant::now();

        loop {
            let observation = self.observe(&property).await?;
            let (holds, actual) = evaluate(observation);
            let passed = holds != self.negate;

            let elapsed = start.elapsed();
            if passed || elapsed >= self.timeout {
                tracing::debug!(
                    target_element = %self.target,
                    comparison = %comparison,
                    passed,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Expectation settled"
                );
                return Ok(Check::observed(
                    self.target.to_string(),
                    comparison,
                    self.negate,
                    actual,
                    expected.to_string(),
                    passed,
                ));
            }

            tokio::time::sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }

    async fn observe(&self, property: &Property) -> Result<Observation> {
        let page: &dyn PageDriver = self.executor.page().as_ref();
        let Some(element) = self.target.resolve(page).await? else {
            return Ok(Observation::absent(property));
        };

        let observed = match property {
            Property::Attached => Ok(Observation::new(true, "attached")),
            Property::State(state) => page
                .element_state(&element, *state)
                .await
                .map(|holds| Observation::new(holds, state_label(*state, holds))),
            Property::Text => page
                .inner_text(&element)
                .await
                .map(|text| Observation::new(true, text)),
            Property::Attribute(name) => page.get_attribute(&element, name).await.map(|value| {
                match value {
                    Some(value) => Observation::new(true, value),
                    None => Observation::new(false, "<none>"),
                }
            }),
            Property::Value => page
                .input_value(&element)
                .await
                .map(|value| Observation::new(true, value)),
        };

        match observed {
            Err(Error::ElementDetached(_)) => Ok(Observation::absent(property)),
            other => other,
        }
    }
}

/// One poll of the element: whether the observed property holds, and what was seen.
struct Observation {
    present: bool,
    holds: bool,
    label: String,
}

impl Observation {
    fn new(holds: bool, label: impl Into<String>) -> Self {
        Self {
            present: true,
            holds,
            label: label.into(),
        }
    }

    fn absent(property: &Property) -> Self {
        let label = match property {
            Property::Attached => "detached",
            _ => ABSENT,
        };
        Self {
            present: false,
            holds: false,
            label: label.to_string(),
        }
    }
}

fn state_label(state: ElementState, holds: bool) -> &'static str {
    match (state, holds) {
        (ElementState::Visible, true) => "visible",
        (ElementState::Visible, false) => "hidden",
        (ElementState::Enabled, true) => "enabled",
        (ElementState::Enabled, false) => "disabled",
        (ElementState::Editable, true) => "editable",
        (ElementState::Editable, false) => "read-only",
        (ElementState::Checked, true) => "checked",
        (ElementState::Checked, false) => "unchecked",
    }
}
