#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod channel;
pub mod events;
pub mod processors;
pub mod provider;
pub mod stats;
pub mod store;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
