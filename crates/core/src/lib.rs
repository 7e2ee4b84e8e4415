//! Core utilities shared by every crate of the triangle renderer.
//!
//! This crate provides foundational types and utilities:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Configuration loading

mod config;
mod error;
mod logging;
mod timer;

pub use config::{AppConfig, CONFIG_FILE, DebugConfig, ShaderConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, env_filter, init_logging};
pub use timer::Timer;
