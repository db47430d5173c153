//! Decrypted-record cache
//!
//! Turns a stream of encrypted record maps into a persisted map of decrypted
//! records, re-decrypting only the records that changed.
//!
//! # Cells
//!
//! Every cache owns two slots in the state store, scoped per user:
//!
//! | Slot | Contents |
//! |------|----------|
//! | `<name>` | `RecordMap<O>` or null |
//! | `<name>_status` | `DecryptionStatus` |
//!
//! # Status
//!
//! | Status | Meaning |
//! |--------|---------|
//! | in_progress | A pass is running |
//! | complete | The value matches the latest processed input |
//! | error | The last pass failed |
//! | cleared | Nothing decrypted, or explicitly cleared |

pub mod cells;
pub mod decryptor;
pub mod definition;
pub mod handle;
pub mod input;
pub mod local;
pub mod provider;
pub mod record;
pub mod registry;
pub mod selector;
pub mod status;
pub mod subscription;

pub use cells::reset_cells;
pub use decryptor::Decryptor;
pub use definition::{CacheDefinition, CacheKey, DEFAULT_CLEANUP_DELAY};
pub use handle::VaultCache;
pub use input::{EncryptedInput, InputSnapshot};
pub use local::LocalVaultCache;
pub use provider::{ExecutionContext, VaultCacheProvider};
pub use record::{record_map, InputRecord, OutputRecord, Record, RecordId, RecordMap};
pub use registry::{CacheHandle, CacheRegistry};
pub use selector::{merge_decrypted, select, AlwaysUpdate, Selection, ShouldUpdate};
pub use status::{DecryptionStatus, StatusEvent};
pub use subscription::CacheSubscription;
