//! Authenticated payload encryption: PBKDF2-derived AES-256-GCM.
//!
//! Every call draws a fresh random nonce and KDF salt — never derived or
//! counter-based. Reusing either under the same key breaks GCM.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use zeroize::Zeroize;

use crate::kdf::{derive_bits, fill_random};
use crate::keys::CombinedKeyInput;
use crate::{Error, AES_KDF_ITERATIONS, KDF_SALT_LEN, KEY_LEN, NONCE_LEN};

/// Ciphertext plus the public parameters needed to decrypt it.
///
/// `salt` is the AES key-derivation salt — distinct from the passphrase
/// salt, which travels in the link fragment instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// AES-256-GCM ciphertext with appended tag.
    pub ciphertext: Vec<u8>,
    /// Per-encryption random 96-bit nonce.
    pub nonce: [u8; NONCE_LEN],
    /// Per-encryption random KDF salt.
    pub salt: [u8; KDF_SALT_LEN],
}

/// Encrypt `plaintext` under the composed key input.
pub fn encrypt(plaintext: &[u8], combined: &CombinedKeyInput) -> Result<EncryptedEnvelope, Error> {
    encrypt_with_iterations(plaintext, combined, AES_KDF_ITERATIONS)
}

/// Decrypt an envelope under the composed key input.
///
/// Fails with [`Error::AuthenticationFailed`] on any tag mismatch — wrong
/// key material, wrong passphrase, or tampering. Callers must present all
/// three identically.
pub fn decrypt(envelope: &EncryptedEnvelope, combined: &CombinedKeyInput) -> Result<Vec<u8>, Error> {
    decrypt_with_iterations(envelope, combined, AES_KDF_ITERATIONS)
}

fn derive_aes_key(combined: &CombinedKeyInput, salt: &[u8; KDF_SALT_LEN], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    derive_bits(combined.as_bytes(), salt, iterations, &mut key);
    key
}

pub(crate) fn encrypt_with_iterations(
    plaintext: &[u8],
    combined: &CombinedKeyInput,
    iterations: u32,
) -> Result<EncryptedEnvelope, Error> {
    let mut salt = [0u8; KDF_SALT_LEN];
    fill_random(&mut salt)?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    fill_random(&mut nonce_bytes)?;

    let mut key = derive_aes_key(combined, &salt, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let result = cipher.encrypt(Nonce::from_slice(&nonce_bytes), plaintext);
    key.zeroize();

    // aes-gcm only fails on absurd plaintext lengths; still, never panic.
    let ciphertext = result.map_err(|_| Error::AuthenticationFailed)?;

    Ok(EncryptedEnvelope {
        ciphertext,
        nonce: nonce_bytes,
        salt,
    })
}

pub(crate) fn decrypt_with_iterations(
    envelope: &EncryptedEnvelope,
    combined: &CombinedKeyInput,
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let mut key = derive_aes_key(combined, &envelope.salt, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let result = cipher.decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice());
    key.zeroize();
    result.map_err(|_| Error::AuthenticationFailed)
}
