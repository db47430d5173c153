//! Record contracts and the id-keyed record map

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// Stable record identifier
pub type RecordId = String;

/// All records currently known for one user, keyed by id.
///
/// `Option<RecordMap<T>>` is used wherever "not loaded / cleared" (`None`)
/// must be distinguished from "loaded, zero records" (empty map).
pub type RecordMap<T> = HashMap<RecordId, T>;

/// Any entity with a stable, unique identifier
pub trait Record {
    fn id(&self) -> &str;
}

/// Encrypted records fed into a cache
pub trait InputRecord: Record + Clone + Send + Sync + 'static {}

impl<T> InputRecord for T where T: Record + Clone + Send + Sync + 'static {}

/// Decrypted records produced by a cache and persisted in its value cell
pub trait OutputRecord:
    Record + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> OutputRecord for T where
    T: Record + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Build a record map from records, keyed by their ids.
///
/// Later records win when ids repeat.
pub fn record_map<T: Record>(records: impl IntoIterator<Item = T>) -> RecordMap<T> {
    records
        .into_iter()
        .map(|record| (record.id().to_string(), record))
        .collect()
}
