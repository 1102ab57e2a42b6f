//! Shared utilities: logging setup and timestamp handling.

pub mod logger;
pub mod time;
