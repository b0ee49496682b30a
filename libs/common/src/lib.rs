//! Shared building blocks for VME bridge hosts
//!
//! - logging bootstrap (`tracing-subscriber`, rolling files)
//! - layered configuration loading (`figment`)
//! - hex helpers for payload diagnostics

pub mod config;
pub mod error;
pub mod hex;
pub mod logging;

pub use error::{Error, Result};
pub use logging::LogConfig;
