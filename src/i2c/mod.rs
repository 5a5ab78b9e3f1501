// Licensed under the Apache-2.0 license

//! Two-wire bus drivers.
//!
//! Both bus roles are implemented against narrow hardware traits so they run
//! unchanged on silicon and under test:
//!
//! - [`master`]: polling controller driver for the bridge board
//! - [`slave`]: interrupt-driven responder for sensor nodes built on a
//!   shift-register peripheral (feature `i2c_target`)

pub mod common;
pub mod master;
#[cfg(feature = "i2c_target")]
pub mod slave;
pub mod traits;

pub use common::{MasterConfig, MasterConfigBuilder, TransferError};
pub use master::MasterEngine;
#[cfg(feature = "i2c_target")]
pub use slave::{SlaveEngine, SlaveHandle, SlaveQueues};
