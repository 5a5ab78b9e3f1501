// Licensed under the Apache-2.0 license

//! On-target self tests. Each suite reports per-case results over a console
//! and can also run on the host under `cargo test`.

#[cfg(feature = "i2c_target")]
pub mod loopback_test;
