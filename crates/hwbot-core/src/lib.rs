//! # hwbot core
//! Shared error taxonomy, data model, trait seams and configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::HwBotConfig;
pub use error::{HwBotError, Result};
