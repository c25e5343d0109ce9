// FixtureRegistry - named fixture descriptors and their dependency graph
//
// Descriptors are registered once per suite and are immutable afterwards. The
// registry itself never constructs anything: each test opens a FixtureSession
// which resolves and memoizes instances for that test only.
//
// Resolution planning is a depth-first walk that tracks the names currently
// being visited. Meeting one of them again is a cycle; the reported path runs
// from the first occurrence to the repeated name.

use super::session::FixtureSession;
use super::supply::{Dependencies, Supply};
use crate::config::{DEFAULT_TIMEOUT_MS, HarnessConfig};
use crate::error::{BoxError, Error, Result};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Name of the built-in fixture holding the test's AssertionLedger.
pub const LEDGER_FIXTURE: &str = "ledger";

/// Type-erased fixture factory.
pub type FixtureFactory = Arc<
    dyn Fn(Dependencies, Supply) -> BoxFuture<'static, std::result::Result<(), BoxError>>
        + Send
        + Sync,
>;

/// A registered fixture: its name, declared dependencies and factory.
#[derive(Clone)]
pub struct FixtureDescriptor {
    name: String,
    dependencies: Vec<String>,
    factory: FixtureFactory,
}

impl FixtureDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn factory(&self) -> &FixtureFactory {
        &self.factory
    }
}

impl fmt::Debug for FixtureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Suite-wide set of fixture descriptors.
///
/// # Example
///
/// ```ignore
/// use playwright_harness::FixtureRegistry;
/// use std::sync::Arc;
///
/// let mut registry = FixtureRegistry::new();
/// registry.register("baseUrl", &[], |_deps, supply| async move {
///     supply.provide(String::from("https://the-internet.herokuapp.com")).await;
///     Ok(())
/// })?;
/// let registry = Arc::new(registry);
/// let session = registry.session("smoke");
/// let url = session.get::<String>("baseUrl").await?;
/// ```
pub struct FixtureRegistry {
    descriptors: BTreeMap<String, FixtureDescriptor>,
    fixture_timeout: Duration,
    teardown_timeout: Duration,
    test_timeout: Option<Duration>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: BTreeMap::new(),
            fixture_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            teardown_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            test_timeout: None,
        }
    }

    /// Creates a registry with the config's fixture, teardown and test timeouts.
    pub fn from_config(config: &HarnessConfig) -> Self {
        let registry = Self::new()
            .with_fixture_timeout(config.fixture_timeout)
            .with_teardown_timeout(config.teardown_timeout);
        match config.test_timeout {
            Some(timeout) => registry.with_test_timeout(timeout),
            None => registry,
        }
    }

    /// Maximum time a factory may take to supply its instance.
    pub fn with_fixture_timeout(mut self, timeout: Duration) -> Self {
        self.fixture_timeout = timeout;
        self
    }

    /// Maximum time one fixture's teardown may take.
    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    /// Limit for a whole test body run through [`crate::runner::run_test`].
    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = Some(timeout);
        self
    }

    pub fn fixture_timeout(&self) -> Duration {
        self.fixture_timeout
    }

    pub fn teardown_timeout(&self) -> Duration {
        self.teardown_timeout
    }

    pub fn test_timeout(&self) -> Option<Duration> {
        self.test_timeout
    }

    /// Registers a fixture.
    ///
    /// The factory receives the resolved dependencies and a [`Supply`]; it must
    /// call `supply.provide(..)` exactly once. Code after that await runs as
    /// teardown. Dependencies need not be registered yet; they are checked by
    /// [`Self::validate`] or at first resolution.
    ///
    /// Fails with `FixtureConflict` if `name` is taken (including the built-in
    /// `ledger`).
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        dependencies: &[&str],
        factory: F,
    ) -> Result<()>
    where
        F: Fn(Dependencies, Supply) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        let name = name.into();
        if name == LEDGER_FIXTURE || self.descriptors.contains_key(&name) {
            return Err(Error::FixtureConflict(name));
        }

        let erased: FixtureFactory =
            Arc::new(move |deps: Dependencies, supply: Supply| factory(deps, supply).boxed());
        let descriptor = FixtureDescriptor {
            name: name.clone(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            factory: erased,
        };
        tracing::debug!(
            fixture = %name,
            dependencies = ?descriptor.dependencies,
            "Fixture registered"
        );
        self.descriptors.insert(name, descriptor);
        Ok(())
    }

    /// Registers a dependency-free fixture that supplies a clone of `value`
    /// and has no teardown.
    pub fn register_value<T>(&mut self, name: impl Into<String>, value: T) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.register(name, &[], move |_deps, supply| {
            let value = value.clone();
            async move {
                supply.provide(value).await;
                Ok(())
            }
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        name == LEDGER_FIXTURE || self.descriptors.contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&FixtureDescriptor> {
        self.descriptors.get(name)
    }

    /// Registered fixture names in sorted order (the built-in `ledger` excluded).
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Checks the whole graph for unknown dependencies and cycles.
    ///
    /// Running this before any test executes surfaces configuration errors up
    /// front instead of at first resolution.
    pub fn validate(&self) -> Result<()> {
        for name in self.descriptors.keys() {
            self.plan(name)?;
        }
        Ok(())
    }

    /// Opens a per-test session over this registry.
    pub fn session(self: &Arc<Self>, test_name: impl Into<String>) -> FixtureSession {
        FixtureSession::new(Arc::clone(self), test_name.into())
    }

    /// Construction order for `root`: every dependency before its dependents,
    /// `root` last. The built-in ledger never appears.
    pub(crate) fn plan(&self, root: &str) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut visiting = Vec::new();
        self.visit(root, None, &mut visiting, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        required_by: Option<&str>,
        visiting: &mut Vec<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if name == LEDGER_FIXTURE || done.contains(name) {
            return Ok(());
        }
        if let Some(start) = visiting.iter().position(|n| n == name) {
            let mut path = visiting[start..].to_vec();
            path.push(name.to_string());
            return Err(Error::CyclicDependency { path });
        }
        let descriptor = self.descriptors.get(name).ok_or_else(|| Error::UnknownFixture {
            name: name.to_string(),
            required_by: required_by.map(str::to_string),
        })?;

        visiting.push(name.to_string());
        for dependency in &descriptor.dependencies {
            self.visit(dependency, Some(name), visiting, done, order)?;
        }
        visiting.pop();

        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }
}

impl Default for FixtureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FixtureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureRegistry")
            .field("fixtures", &self.names())
            .field("fixture_timeout", &self.fixture_timeout)
            .field("teardown_timeout", &self.teardown_timeout)
            .field("test_timeout", &self.test_timeout)
            .finish()
    }
}
