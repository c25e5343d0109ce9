// FixtureSession - per-test resolution, memoization and teardown
//
// One session per test execution. Fixtures are constructed lazily in
// dependency order and memoized by name, so resolving the same name twice
// returns the same Arc. Teardown runs in exact reverse construction order.
//
// Factories are driven on the calling task: the factory future is polled until
// it fills its supply slot, then parked (still pending on its release signal)
// until teardown resumes it. Nothing is spawned, so a test stays sequential.
//
// State per fixture: Unresolved -> Resolving -> Resolved -> TornDown. A factory
// failure returns the fixture to Unresolved.

use super::registry::{FixtureRegistry, LEDGER_FIXTURE};
use super::supply::{Dependencies, Instance, InstanceSlot, Supply, downcast};
use crate::assertion::AssertionLedger;
use crate::error::{BoxError, Error, Result, panic_message};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::Poll;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Lifecycle of one fixture within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    Unresolved,
    Resolving,
    Resolved,
    TornDown,
}

type Continuation = BoxFuture<'static, std::result::Result<(), BoxError>>;

/// A constructed fixture waiting for teardown.
struct Constructed {
    name: String,
    release: oneshot::Sender<()>,
    continuation: Continuation,
}

#[derive(Default)]
struct SessionState {
    instances: HashMap<String, Instance>,
    states: HashMap<String, FixtureState>,
    /// Construction order
    constructed: Vec<Constructed>,
    order: Vec<String>,
    torn_down: bool,
}

/// Fixture instances of one test execution.
///
/// Created by [`FixtureRegistry::session`]. Never shared between tests.
pub struct FixtureSession {
    registry: Arc<FixtureRegistry>,
    test_name: String,
    ledger: Arc<AssertionLedger>,
    state: Mutex<SessionState>,
    // Serializes resolution and teardown across awaits
    gate: tokio::sync::Mutex<()>,
}

impl FixtureSession {
    pub(crate) fn new(registry: Arc<FixtureRegistry>, test_name: String) -> Self {
        let ledger = Arc::new(AssertionLedger::new(test_name.clone()));
        Self {
            registry,
            test_name,
            ledger,
            state: Mutex::new(SessionState::default()),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// The test's assertion ledger (also resolvable as the `ledger` fixture).
    pub fn ledger(&self) -> &Arc<AssertionLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<FixtureRegistry> {
        &self.registry
    }

    /// Resolves `name`, constructing it and any unresolved dependencies first.
    ///
    /// Returns the memoized instance when the fixture is already resolved.
    /// On failure every fixture constructed so far stays registered for
    /// teardown.
    pub async fn resolve(&self, name: &str) -> Result<Instance> {
        if name == LEDGER_FIXTURE {
            return Ok(self.ledger_instance());
        }

        let _gate = self.gate.lock().await;
        let memoized = self.lookup(name)?;
        if let Some(instance) = memoized {
            return Ok(instance);
        }

        let plan = self.registry.plan(name)?;
        for fixture in &plan {
            let resolved = self.lookup(fixture)?.is_some();
            if !resolved {
                self.construct(fixture).await?;
            }
        }

        self.lookup(name)?.ok_or_else(|| Error::UnknownFixture {
            name: name.to_string(),
            required_by: None,
        })
    }

    /// Resolves `name` and downcasts it to `T`.
    pub async fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let instance = self.resolve(name).await?;
        downcast(name, instance)
    }

    /// Current lifecycle state of `name`.
    pub fn state(&self, name: &str) -> FixtureState {
        if name == LEDGER_FIXTURE {
            return FixtureState::Resolved;
        }
        self.state
            .lock()
            .states
            .get(name)
            .copied()
            .unwrap_or(FixtureState::Unresolved)
    }

    /// Names of constructed fixtures in construction order.
    pub fn construction_order(&self) -> Vec<String> {
        self.state.lock().order.clone()
    }

    /// Whether [`Self::teardown_all`] has run.
    pub fn is_torn_down(&self) -> bool {
        self.state.lock().torn_down
    }

    /// Tears down every constructed fixture in reverse construction order.
    ///
    /// Best effort: a failing or overrunning teardown is logged and returned as
    /// `TeardownFailed`, and the remaining teardowns still run. Calling this
    /// again is a no-op. The session rejects further resolution afterwards.
    pub async fn teardown_all(&self) -> Vec<Error> {
        let _gate = self.gate.lock().await;
        let constructed = {
            let mut state = self.state.lock();
            state.torn_down = true;
            std::mem::take(&mut state.constructed)
        };

        let timeout = self.registry.teardown_timeout();
        let mut failures = Vec::new();
        for entry in constructed.into_iter().rev() {
            let Constructed {
                name,
                release,
                continuation,
            } = entry;
            let start = Instant::now();

            // The factory may already be gone (e.g. it panicked after supplying)
            let _ = release.send(());
            let outcome = tokio::time::timeout(timeout, continuation).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(source)) => Some(source),
                Err(_) => Some(BoxError::from(format!(
                    "teardown did not finish within {:?}",
                    timeout
                ))),
            };
            match failure {
                None => tracing::debug!(
                    test = %self.test_name,
                    fixture = %name,
                    elapsed_ms,
                    "Fixture torn down"
                ),
                Some(source) => {
                    tracing::warn!(
                        test = %self.test_name,
                        fixture = %name,
                        elapsed_ms,
                        error = %source,
                        "Fixture teardown failed"
                    );
                    failures.push(Error::TeardownFailed {
                        fixture: name.clone(),
                        source,
                    });
                }
            }

            let mut state = self.state.lock();
            state.instances.remove(&name);
            state.states.insert(name, FixtureState::TornDown);
        }
        failures
    }

    fn ledger_instance(&self) -> Instance {
        self.ledger.clone()
    }

    fn lookup(&self, name: &str) -> Result<Option<Instance>> {
        let state = self.state.lock();
        if state.torn_down {
            return Err(Error::InvalidArgument(format!(
                "fixture session of '{}' is already torn down",
                self.test_name
            )));
        }
        Ok(state.instances.get(name).cloned())
    }

    /// Collects the already-resolved dependencies of `name`.
    fn dependencies_of(&self, name: &str, declared: &[String]) -> Result<Dependencies> {
        let state = self.state.lock();
        let mut values = HashMap::with_capacity(declared.len());
        for dependency in declared {
            let instance = if dependency == LEDGER_FIXTURE {
                self.ledger_instance()
            } else {
                state
                    .instances
                    .get(dependency)
                    .cloned()
                    .ok_or_else(|| Error::UnknownFixture {
                        name: dependency.clone(),
                        required_by: Some(name.to_string()),
                    })?
            };
            values.insert(dependency.clone(), instance);
        }
        Ok(Dependencies::new(name, values))
    }

    fn set_state(&self, name: &str, fixture_state: FixtureState) {
        self.state
            .lock()
            .states
            .insert(name.to_string(), fixture_state);
    }

    /// Runs the factory of `name` until it supplies its instance.
    async fn construct(&self, name: &str) -> Result<()> {
        let descriptor = self
            .registry
            .descriptor(name)
            .ok_or_else(|| Error::UnknownFixture {
                name: name.to_string(),
                required_by: None,
            })?;
        let deps = self.dependencies_of(name, descriptor.dependencies())?;
        self.set_state(name, FixtureState::Resolving);
        let start = Instant::now();

        let slot: InstanceSlot = Arc::new(Mutex::new(None));
        let (release, released) = oneshot::channel();
        let supply = Supply::new(name, Arc::clone(&slot), released);
        let factory = descriptor.factory();
        let mut continuation: Continuation = AssertUnwindSafe(factory(deps, supply))
            .catch_unwind()
            .map(|outcome| {
                outcome.unwrap_or_else(|payload| {
                    Err(BoxError::from(format!(
                        "factory panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                })
            })
            .boxed();

        // Ready(None): supplied and parked; Ready(Some(..)): factory finished early
        let supplied = std::future::poll_fn(|cx| match continuation.as_mut().poll(cx) {
            Poll::Ready(result) => Poll::Ready(Some(result)),
            Poll::Pending if slot.lock().is_some() => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        });
        let timeout = self.registry.fixture_timeout();
        let step = tokio::time::timeout(timeout, supplied).await;

        let failure = match step {
            Ok(None) => None,
            Ok(Some(Ok(()))) => Some(Error::FixtureNotSupplied(name.to_string())),
            Ok(Some(Err(source))) => Some(Error::FactoryError {
                fixture: name.to_string(),
                source,
            }),
            Err(_) => Some(Error::Timeout(format!(
                "fixture '{}' was not supplied within {:?}",
                name, timeout
            ))),
        };
        if let Some(err) = failure {
            self.state.lock().states.remove(name);
            tracing::error!(
                test = %self.test_name,
                fixture = %name,
                error = %err,
                "Fixture construction failed"
            );
            return Err(err);
        }

        let instance = slot
            .lock()
            .take()
            .ok_or_else(|| Error::FixtureNotSupplied(name.to_string()))?;
        let mut state = self.state.lock();
        state.instances.insert(name.to_string(), instance);
        state
            .states
            .insert(name.to_string(), FixtureState::Resolved);
        state.order.push(name.to_string());
        state.constructed.push(Constructed {
            name: name.to_string(),
            release,
            continuation,
        });
        tracing::debug!(
            test = %self.test_name,
            fixture = %name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fixture constructed"
        );
        Ok(())
    }
}

impl Drop for FixtureSession {
    fn drop(&mut self) {
        let pending = self.state.get_mut().constructed.len();
        if pending > 0 {
            tracing::warn!(
                test = %self.test_name,
                pending,
                "Fixture session dropped without teardown; teardown logic will not run"
            );
        }
    }
}

impl fmt::Debug for FixtureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureSession")
            .field("test_name", &self.test_name)
            .field("constructed", &self.construction_order())
            .finish()
    }
}
