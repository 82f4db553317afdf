//! # medialink Common Library
//!
//! Shared code for the medialink crates:
//! - Common error type
//! - Engine configuration loading (TOML, environment, platform defaults)
//! - Tracing initialization

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Backend, EngineConfig};
pub use error::{Error, Result};
