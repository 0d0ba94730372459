//! Key material composition: binds the random link key to an optional
//! passphrase so that both factors are required to decrypt.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::kdf::{derive_bits, fill_random};
use crate::{Error, KEY_LEN, PASSPHRASE_KDF_ITERATIONS, PASSPHRASE_SALT_LEN};

/// The out-of-band key material carried in the URL fragment.
///
/// Client-only: never persisted, never sent to the server. Losing the
/// `random_key` (or the passphrase salt, when set) makes the ciphertext
/// permanently unrecoverable — there is no escrow.
#[derive(Clone, ZeroizeOnDrop)]
pub struct KeyMaterial {
    /// 256-bit random value, the primary secret.
    pub random_key: [u8; KEY_LEN],
    /// Random 128-bit salt, present only when a passphrase is used.
    pub passphrase_salt: Option<[u8; PASSPHRASE_SALT_LEN]>,
    /// Whether a passphrase is required to decrypt.
    #[zeroize(skip)]
    pub requires_passphrase: bool,
    /// Optional hint attached to the link. NOT secret: anyone holding the
    /// link can read it, which weakens the passphrase factor if the hint is
    /// too specific.
    #[zeroize(skip)]
    pub hint: Option<String>,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("random_key", &"[REDACTED]")
            .field("requires_passphrase", &self.requires_passphrase)
            .field("hint", &self.hint)
            .finish()
    }
}

/// The actual input to the AES key derivation. Zeroized on drop.
#[derive(Clone)]
pub struct CombinedKeyInput(pub(crate) [u8; KEY_LEN]);

impl CombinedKeyInput {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for CombinedKeyInput {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for CombinedKeyInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CombinedKeyInput([REDACTED])")
    }
}

/// Output of [`compose`]: the link material plus the derived key input.
pub struct ComposedKey {
    pub material: KeyMaterial,
    pub combined: CombinedKeyInput,
}

/// Build fresh key material for a new secret.
///
/// Without a passphrase the combined input is the random key itself. With
/// one, the passphrase is stretched through PBKDF2 and XORed into the random
/// key, so possessing only the link or only the passphrase is insufficient.
/// Passphrase length policy is enforced by the orchestrator, not here.
pub fn compose(passphrase: Option<&str>) -> Result<ComposedKey, Error> {
    let mut random_key = [0u8; KEY_LEN];
    fill_random(&mut random_key)?;

    match passphrase {
        None => Ok(ComposedKey {
            material: KeyMaterial {
                random_key,
                passphrase_salt: None,
                requires_passphrase: false,
                hint: None,
            },
            combined: CombinedKeyInput(random_key),
        }),
        Some(phrase) => {
            let mut salt = [0u8; PASSPHRASE_SALT_LEN];
            fill_random(&mut salt)?;
            let combined = combine(&random_key, phrase, &salt);
            Ok(ComposedKey {
                material: KeyMaterial {
                    random_key,
                    passphrase_salt: Some(salt),
                    requires_passphrase: true,
                    hint: None,
                },
                combined,
            })
        }
    }
}

/// Recipient-side inverse of [`compose`]: rebuild the combined key input
/// from link material and the user-supplied passphrase.
///
/// Fails with `MissingPassphrase` when the material declares a passphrase
/// and none was given. A *wrong* passphrase is not detectable here — it
/// surfaces later as `AuthenticationFailed` from the cipher.
pub fn recompose(material: &KeyMaterial, passphrase: Option<&str>) -> Result<CombinedKeyInput, Error> {
    if !material.requires_passphrase {
        return Ok(CombinedKeyInput(material.random_key));
    }
    let phrase = passphrase.ok_or(Error::MissingPassphrase)?;
    // decode_fragment guarantees the salt is present when pp=1.
    let salt = material.passphrase_salt.ok_or(Error::MalformedKeyFragment)?;
    Ok(combine(&material.random_key, phrase, &salt))
}

fn combine(
    random_key: &[u8; KEY_LEN],
    passphrase: &str,
    salt: &[u8; PASSPHRASE_SALT_LEN],
) -> CombinedKeyInput {
    let mut passphrase_bits = [0u8; KEY_LEN];
    derive_bits(
        passphrase.as_bytes(),
        salt,
        PASSPHRASE_KDF_ITERATIONS,
        &mut passphrase_bits,
    );

    let mut combined = [0u8; KEY_LEN];
    for (out, (a, b)) in combined
        .iter_mut()
        .zip(random_key.iter().zip(passphrase_bits.iter()))
    {
        *out = a ^ b;
    }
    passphrase_bits.zeroize();
    CombinedKeyInput(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_without_passphrase_uses_random_key() {
        let composed = compose(None).unwrap();
        assert!(!composed.material.requires_passphrase);
        assert!(composed.material.passphrase_salt.is_none());
        assert_eq!(composed.combined.as_bytes(), &composed.material.random_key);
    }

    #[test]
    fn compose_with_passphrase_diverges_from_random_key() {
        let composed = compose(Some("correcthorse")).unwrap();
        assert!(composed.material.requires_passphrase);
        assert!(composed.material.passphrase_salt.is_some());
        assert_ne!(composed.combined.as_bytes(), &composed.material.random_key);
    }

    #[test]
    fn recompose_round_trips() {
        let composed = compose(Some("correcthorse")).unwrap();
        let rebuilt = recompose(&composed.material, Some("correcthorse")).unwrap();
        assert_eq!(rebuilt.as_bytes(), composed.combined.as_bytes());
    }

    #[test]
    fn recompose_without_required_passphrase_fails() {
        let composed = compose(Some("correcthorse")).unwrap();
        assert!(matches!(
            recompose(&composed.material, None),
            Err(Error::MissingPassphrase)
        ));
    }

    #[test]
    fn recompose_wrong_passphrase_gives_different_key() {
        let composed = compose(Some("correcthorse")).unwrap();
        let wrong = recompose(&composed.material, Some("wrong")).unwrap();
        assert_ne!(wrong.as_bytes(), composed.combined.as_bytes());
    }

    #[test]
    fn xor_composition_requires_both_factors() {
        let composed = compose(Some("correcthorse")).unwrap();
        // Knowing only the random key (the link) is necessary but not
        // sufficient: the combined input differs from it.
        assert_ne!(composed.combined.as_bytes(), &composed.material.random_key);
        // Knowing only the passphrase with a fresh random key gives yet
        // another value.
        let other = compose(Some("correcthorse")).unwrap();
        assert_ne!(other.combined.as_bytes(), composed.combined.as_bytes());
    }
}
