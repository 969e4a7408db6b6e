//! Core domain + application logic for the reading-list bot.
//!
//! This crate is framework-agnostic. Telegram and the SQL database live behind
//! ports (traits) implemented in adapter crates.

pub mod backlog;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod memory;
pub mod messaging;
pub mod models;
pub mod ports;
pub mod reminders;
pub mod replies;
pub mod scheduler;

pub use errors::{Error, Result};
