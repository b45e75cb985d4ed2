//! MAYA companion core.
//!
//! Keeps a wallet session, polls agent telemetry, synchronizes funding
//! proposals and relays continue/terminate decisions to the MAYA core.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod model;
pub mod proposals;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod telemetry;
pub mod wallet;

pub use error::{Error, Result};
pub use runtime::MayaRuntime;
