use serde::{Deserialize, Serialize};

/// Stored in redb as bincode-encoded bytes, keyed by the record id.
///
/// `encrypted`, `iv` and `salt` are the client's base64 blobs, stored and
/// returned verbatim — the server never interprets them and holds no key
/// that could. Only `consumed` is server-owned state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretRecord {
    /// Client-side AES-GCM ciphertext, base64.
    pub encrypted: String,
    /// Client-side AES-GCM nonce, base64.
    pub iv: String,
    /// Client-side key-derivation salt, base64.
    pub salt: String,
    /// Flips to true exactly once, at the moment of the first successful
    /// read. Never observed false again after a caller got the payload.
    pub consumed: bool,
    /// Unix timestamp (seconds) when the record was created.
    pub created_at: i64,
    /// Unix timestamp (seconds) of the consuming read, for retention sweeps.
    pub consumed_at: Option<i64>,
}

impl SecretRecord {
    /// True once the record is logically dead and old enough to garbage
    /// collect. Unconsumed records are never swept.
    pub fn sweepable(&self, now: i64, retention_secs: i64) -> bool {
        match (self.consumed, self.consumed_at) {
            (true, Some(at)) => now >= at + retention_secs,
            (true, None) => true, // consumed pre-timestamping; safe to drop
            _ => false,
        }
    }
}
