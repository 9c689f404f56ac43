//! Sysovo client: REST store, configuration and logging for the board
//! engine, plus the `sysovo-board` command.

pub mod cli;
pub mod config;
pub mod http;
pub mod log_bridge;

pub use config::{ClientConfig, ConfigError};
pub use http::HttpBoardApi;
