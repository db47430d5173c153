//! State command - inspect or reset persisted cache cells

use crate::cache::cells::slots;
use crate::cache::{reset_cells, CacheKey, DecryptionStatus};
use crate::cli::args::{SlotArgs, StateAction, StateArgs};
use crate::error::VaultCacheResult;
use crate::state::{FileStateStore, StateCell, StateStore};
use crate::ui::{self, UiContext};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Execute the state command against the store rooted at `state_dir`
pub async fn execute(args: StateArgs, state_dir: &Path) -> VaultCacheResult<()> {
    debug!("Opening state store at {}", state_dir.display());
    let store = Arc::new(FileStateStore::open(state_dir).await?);

    match args.action {
        StateAction::Show { slot, json } => show(&store, &slot, json).await,
        StateAction::Clear { slot } => clear(store.as_ref(), &slot).await,
    }
}

async fn show(store: &Arc<FileStateStore>, args: &SlotArgs, json: bool) -> VaultCacheResult<()> {
    let key = CacheKey::new(&args.area, &args.name)?;
    let (value_slot, status_slot) = slots(&key, &args.user);

    let value = store.get(&value_slot).await?;
    let status_store: Arc<dyn StateStore> = store.clone();
    let status = StateCell::<DecryptionStatus>::new(status_store, status_slot)
        .get()
        .await?
        .unwrap_or_default();

    if json {
        let raw = value.value.as_deref().cloned().unwrap_or(Value::Null);
        println!("{}", serde_json::to_string_pretty(&raw)?);
        return Ok(());
    }

    let records = match value.value.as_deref() {
        Some(Value::Object(map)) => map.len().to_string(),
        _ => "none".to_string(),
    };
    let updated = store
        .read_file(&value_slot)
        .await?
        .map(|file| file.updated_at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());

    let ctx = UiContext::detect();
    ui::heading(&ctx, &key.to_string());
    ui::field(&ctx, "user", &args.user);
    ui::status_field(&ctx, "status", status);
    ui::field(&ctx, "revision", &value.revision.to_string());
    ui::field(&ctx, "records", &records);
    ui::field(&ctx, "updated", &updated);
    Ok(())
}

async fn clear(store: &FileStateStore, args: &SlotArgs) -> VaultCacheResult<()> {
    let key = CacheKey::new(&args.area, &args.name)?;
    reset_cells(store, &key, &args.user).await?;
    info!("Reset cache {} for user {}", key, args.user);

    let ctx = UiContext::detect();
    ui::step_ok_detail(&ctx, "Cache cleared", &format!("{} for {}", key, args.user));
    Ok(())
}
