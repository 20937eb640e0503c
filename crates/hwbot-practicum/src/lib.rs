//! # hwbot Practicum
//!
//! Status Fetcher for the Yandex Practicum homework review API.
//! `PracticumClient` implements [`StatusSource`] and is the only thing the
//! poll loop needs from this crate.

pub mod client;
pub mod response;

pub use client::PracticumClient;

use hwbot_core::config::HwBotConfig;
use hwbot_core::error::Result;
use hwbot_core::traits::StatusSource;

/// Create the status source from configuration.
pub fn create_source(config: &HwBotConfig) -> Result<Box<dyn StatusSource>> {
    Ok(Box::new(PracticumClient::new(&config.practicum)?))
}
