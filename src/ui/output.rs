//! Output helpers shared by CLI commands

use super::context::UiContext;
use crate::cache::DecryptionStatus;
use console::{style, Style};

/// Title line above a block of fields
pub fn heading(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{}", title);
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        println!("[OK] {}", message);
    }
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(format!("{} ({})", message, style(detail).dim())).ok();
    } else {
        println!("[OK] {} ({})", message, detail);
    }
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(format!("{} - {}", message, style(hint).dim())).ok();
    } else {
        println!("[WARN] {} - {}", message, hint);
    }
}

/// Indented `key: value` line
pub fn field(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Field line for a decryption status, coloured by state
pub fn status_field(ctx: &UiContext, key: &str, status: DecryptionStatus) {
    if !ctx.use_fancy_output() {
        println!("  {}: {}", key, status);
        return;
    }

    let colour = match status {
        DecryptionStatus::Complete => Style::new().green(),
        DecryptionStatus::InProgress => Style::new().cyan(),
        DecryptionStatus::Error => Style::new().red(),
        DecryptionStatus::Cleared => Style::new().dim(),
    };
    println!("  {}: {}", style(key).dim(), colour.apply_to(status.as_str()));
}
