//! # hwbot Channels
//! Outbound notification delivery and inbound chat commands.
//!
//! Only Telegram is supported: one bot, one chat.

pub mod telegram;

pub use telegram::TelegramChannel;
