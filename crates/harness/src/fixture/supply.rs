// Supply continuation and resolved-dependency record handed to factories
//
// A factory receives its dependencies and a single-use Supply. Calling
// `provide(value).await` hands the instance to the session and suspends the
// factory until the session tears the fixture down; everything after the
// await is the fixture's teardown.
//
//     registry.register("page", &["browser"], |deps, supply| async move {
//         let browser = deps.get::<Arc<dyn BrowserDriver>>("browser")?;
//         let page = browser.new_page().await?;
//         supply.provide(page.clone()).await;
//         page.close().await?;
//         Ok(())
//     })?;

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// A realized fixture value, type-erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Slot the factory fills when it supplies its instance.
pub(crate) type InstanceSlot = Arc<Mutex<Option<Instance>>>;

/// Single-use continuation through which a factory supplies its instance.
///
/// Consumed by [`Supply::provide`], so a factory cannot supply twice.
pub struct Supply {
    fixture: String,
    slot: InstanceSlot,
    release: oneshot::Receiver<()>,
}

impl Supply {
    pub(crate) fn new(fixture: &str, slot: InstanceSlot, release: oneshot::Receiver<()>) -> Self {
        Self {
            fixture: fixture.to_string(),
            slot,
            release,
        }
    }

    /// Name of the fixture being constructed.
    pub fn fixture(&self) -> &str {
        &self.fixture
    }

    /// Hands `value` to dependents and waits until the fixture is torn down.
    ///
    /// Returns the shared instance so teardown code can still use it.
    pub async fn provide<T: Any + Send + Sync>(self, value: T) -> Arc<T> {
        self.provide_shared(Arc::new(value)).await
    }

    /// Like [`Supply::provide`] for a value that is already shared.
    pub async fn provide_shared<T: Any + Send + Sync>(self, value: Arc<T>) -> Arc<T> {
        let instance: Instance = value.clone();
        *self.slot.lock() = Some(instance);
        // The session dropping its sender also releases the factory
        let _ = self.release.await;
        value
    }
}

impl fmt::Debug for Supply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supply")
            .field("fixture", &self.fixture)
            .finish()
    }
}

/// Resolved dependency instances of the fixture being constructed.
#[derive(Clone)]
pub struct Dependencies {
    fixture: String,
    values: HashMap<String, Instance>,
}

impl Dependencies {
    pub(crate) fn new(fixture: &str, values: HashMap<String, Instance>) -> Self {
        Self {
            fixture: fixture.to_string(),
            values,
        }
    }

    /// Returns the dependency `name` as `T`.
    ///
    /// Fails with `UnknownFixture` when `name` was not declared as a dependency
    /// and with `FixtureTypeMismatch` when it holds another type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let instance = self.instance(name).ok_or_else(|| Error::UnknownFixture {
            name: name.to_string(),
            required_by: Some(self.fixture.clone()),
        })?;
        downcast(name, instance)
    }

    /// The type-erased dependency `name`.
    pub fn instance(&self, name: &str) -> Option<Instance> {
        self.values.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Dependencies")
            .field("fixture", &self.fixture)
            .field("names", &names)
            .finish()
    }
}

/// Downcasts a fixture instance, naming the fixture on mismatch.
pub(crate) fn downcast<T: Any + Send + Sync>(name: &str, instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| Error::FixtureTypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
}
