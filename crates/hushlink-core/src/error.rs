use thiserror::Error;

/// Protocol error taxonomy.
///
/// Every failure a caller can observe maps to exactly one variant; the
/// orchestrator turns each into a single user-facing message and never leaks
/// internal detail (no raw storage errors, no "wrong passphrase vs corrupted
/// ciphertext" distinction).
#[derive(Debug, Error)]
pub enum Error {
    /// The platform secure RNG could not be reached. Fatal, never retried.
    #[error("secure random generator unavailable")]
    EntropyUnavailable,

    /// AES-GCM tag verification failed: wrong key material, wrong passphrase,
    /// or tampered ciphertext. Deliberately indistinguishable.
    #[error("cannot decrypt: incorrect passphrase or corrupted link")]
    AuthenticationFailed,

    /// The secret was sealed with a passphrase but none was supplied.
    #[error("a passphrase is required to decrypt this secret")]
    MissingPassphrase,

    /// The URL fragment is missing the key field, or declares a passphrase
    /// without carrying its salt, or contains undecodable material.
    #[error("the link is missing or carries malformed key material")]
    MalformedKeyFragment,

    /// No record exists for this identifier.
    #[error("this secret does not exist or has expired")]
    NotFound,

    /// The record was already consumed by an earlier read.
    #[error("this secret has already been viewed and is gone")]
    AlreadyConsumed,

    /// The storage collaborator failed. Safe to retry `put` (each attempt
    /// mints a fresh id); never blindly retried for consumption.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The secret to share was empty after trimming.
    #[error("the secret must not be empty")]
    EmptySecret,

    /// The supplied passphrase is shorter than the policy minimum.
    #[error("passphrase must be at least {min} characters")]
    PassphraseTooShort { min: usize },

    /// All local decrypt attempts for a fetched envelope were used up.
    #[error("too many failed passphrase attempts")]
    AttemptsExhausted,
}
