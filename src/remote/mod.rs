//! Remote decryption mode
//!
//! The decryption owner lives in a privileged context. Proxies send
//! correlated requests over a message channel and read results from cells
//! mirrored into their own context.
//!
//! | Side | Type | Role |
//! |------|------|------|
//! | proxy | `RemoteVaultCache` | `VaultCache` without key material |
//! | proxy | `RemoteClient` | pending-request table, timeouts |
//! | owner | `VaultStateResponder` | runs requests against local caches |

pub mod channel;
pub mod client;
pub mod protocol;
pub mod proxy;
pub mod responder;

pub use channel::{message_channel, ChannelSink, MessageSink};
pub use client::{RemoteClient, DEFAULT_REMOTE_TIMEOUT};
pub use protocol::{UpdateVaultStateFinished, UpdateVaultStateRequest, VaultMessage, VaultStateAction};
pub use proxy::RemoteVaultCache;
pub use responder::VaultStateResponder;
