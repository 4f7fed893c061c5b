//! SQLite persistence and TOML configuration for fixed-slot tables.

pub mod config;
pub mod error;
pub mod schema;
pub mod store;

pub use config::{load_config, parse_config, to_toml};
pub use error::{Result, StoreError};
pub use store::{DatasetInfo, RunInfo, SqliteSink, Store};
