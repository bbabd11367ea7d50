//! Core workflow for the classified-ad bot.
//!
//! This crate is framework-agnostic. Telegram lives behind the
//! `MessagingPort` trait, implemented in the adapter crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod flow;
pub mod logging;
pub mod membership;
pub mod messaging;
pub mod moderation;
pub mod registry;
pub mod submission;
pub mod texts;
pub mod utils;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
