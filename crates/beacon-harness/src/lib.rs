//! One behavioural contract, two ways to satisfy it.
//!
//! [`TestHarness`] is what use-case tests are written against.
//! [`SimulatedHarness`] wires both services to in-memory adapters inside
//! the test process; [`NetworkedHarness`] drives real HTTP endpoints backed
//! by MySQL and Redis. [`LocalDeployment`] boots the latter from
//! containers.

pub mod deployment;
pub mod error;
pub mod harness;
pub mod networked;
pub mod simulated;

pub use deployment::LocalDeployment;
pub use error::{HarnessError, HarnessResult};
pub use harness::TestHarness;
pub use networked::{NetworkedConfig, NetworkedHarness};
pub use simulated::SimulatedHarness;
