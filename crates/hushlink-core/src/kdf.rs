//! Random and key-derivation primitives: OS CSPRNG draws and
//! PBKDF2-HMAC-SHA256. Stateless; safe to call concurrently across secrets.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::Error;

/// Draw `n` cryptographically secure random bytes from the OS.
pub fn random_bytes(n: usize) -> Result<Vec<u8>, Error> {
    let mut bytes = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| Error::EntropyUnavailable)?;
    Ok(bytes)
}

/// Fill a fixed-size buffer with secure random bytes.
pub fn fill_random(buf: &mut [u8]) -> Result<(), Error> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|_| Error::EntropyUnavailable)
}

/// Derive `out.len()` pseudorandom bytes from `secret_input` and `salt` via
/// PBKDF2-HMAC-SHA256.
///
/// Deterministic for identical inputs — the recipient re-derives the same
/// key from the salts stored alongside the ciphertext. The salt must be
/// unique per secret; uniqueness is the caller's job.
pub fn derive_bits(secret_input: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) {
    pbkdf2_hmac::<Sha256>(secret_input, salt, iterations, out);
}
