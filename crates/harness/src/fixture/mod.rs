// Fixture graph - scoped per-test resources with guaranteed teardown
//
// - registry: suite-wide descriptors, dependency planning, validation
// - session: per-test construction, memoization and reverse-order teardown
// - supply: the supply-then-continue bracket handed to factories
// - ui: the standard browser -> page -> actions -> page object fixtures

pub mod registry;
pub mod session;
pub mod supply;
pub mod ui;

pub use registry::{FixtureDescriptor, FixtureFactory, FixtureRegistry, LEDGER_FIXTURE};
pub use session::{FixtureSession, FixtureState};
pub use supply::{Dependencies, Instance, Supply};
