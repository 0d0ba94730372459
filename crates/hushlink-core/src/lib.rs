//! hushlink-core: client-side protocol for one-time encrypted secret links.
//!
//! A sender encrypts a secret locally, stores only ciphertext on the server,
//! and shares a link whose `#fragment` carries the decryption key. The server
//! never sees plaintext or key material; the fragment is never transmitted.
//!
//! Key schedule:
//! ```text
//! randomKey (256-bit, CSPRNG)
//!   └── combinedKeyInput = randomKey                      (no passphrase)
//!       combinedKeyInput = randomKey XOR PBKDF2(passphrase, passphraseSalt,
//!                                               200k, 256) (with passphrase)
//!         └── AES-256-GCM key = PBKDF2(combinedKeyInput, aesSalt, 150k, 256)
//! ```
//! Both the link and the passphrase are required to reconstruct the key when
//! a passphrase was set; either alone is insufficient.

pub mod cipher;
pub mod error;
pub mod exchange;
pub mod fragment;
pub mod kdf;
pub mod keys;
pub mod transport;

pub use cipher::{decrypt, encrypt, EncryptedEnvelope};
pub use error::Error;
pub use exchange::{
    create_link, fetch_secret, open_link, parse_link, CreatedLink, RetrievedSecret, SecretOptions,
    MAX_DECRYPT_ATTEMPTS,
};
pub use fragment::{decode_fragment, encode_fragment};
pub use kdf::{derive_bits, random_bytes};
pub use keys::{compose, recompose, CombinedKeyInput, ComposedKey, KeyMaterial};
pub use transport::{SecretTransport, WireEnvelope};

/// Size of the random link key in bytes (256-bit).
pub const KEY_LEN: usize = 32;

/// Size of an AES-GCM nonce in bytes (96-bit).
pub const NONCE_LEN: usize = 12;

/// Size of the per-secret AES key-derivation salt in bytes.
pub const KDF_SALT_LEN: usize = 16;

/// Size of the passphrase-strengthening salt in bytes (128-bit).
pub const PASSPHRASE_SALT_LEN: usize = 16;

/// PBKDF2 iteration count for the AES key-derivation path.
pub const AES_KDF_ITERATIONS: u32 = 150_000;

/// PBKDF2 iteration count for the passphrase-strengthening path.
/// Higher than the AES path: passphrases carry far less entropy.
pub const PASSPHRASE_KDF_ITERATIONS: u32 = 200_000;

/// Minimum accepted passphrase length, enforced at the orchestration boundary.
pub const MIN_PASSPHRASE_LEN: usize = 6;
