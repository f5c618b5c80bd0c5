//! # braid-config
//!
//! Configuration system for the Braid runtime. Reads from `braid.toml` and
//! environment variables — in that precedence order.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::BraidConfig;
pub use schema::{ConfigWarning, ServicesConfig, WarningSeverity};
