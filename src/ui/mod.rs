//! Terminal output for the operator CLI
//!
//! Uses `cliclack` log lines on an interactive terminal and falls back to
//! plain bracketed prefixes when piped or running under CI.

mod context;
mod output;

pub use context::UiContext;
pub use output::{field, heading, status_field, step_ok, step_ok_detail, step_warn_hint};
