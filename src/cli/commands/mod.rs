//! CLI command implementations

pub mod config;
pub mod state;

pub use config::execute as config;
pub use state::execute as state;
