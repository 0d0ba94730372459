//! Wire representation of envelopes and the storage collaborator seam.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::cipher::EncryptedEnvelope;
use crate::{Error, KDF_SALT_LEN, NONCE_LEN};

/// The JSON body exchanged with the server: `{encrypted, iv, salt}`,
/// all base64. The server stores and returns these verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireEnvelope {
    pub encrypted: String,
    pub iv: String,
    pub salt: String,
}

impl WireEnvelope {
    pub fn from_envelope(envelope: &EncryptedEnvelope) -> Self {
        Self {
            encrypted: STANDARD.encode(&envelope.ciphertext),
            iv: STANDARD.encode(envelope.nonce),
            salt: STANDARD.encode(envelope.salt),
        }
    }

    /// Decode back into raw envelope form. A server echoing corrupted or
    /// truncated fields surfaces as `AuthenticationFailed` — the caller
    /// cannot distinguish transport corruption from tampering anyway.
    pub fn to_envelope(&self) -> Result<EncryptedEnvelope, Error> {
        let ciphertext = STANDARD
            .decode(&self.encrypted)
            .map_err(|_| Error::AuthenticationFailed)?;
        let nonce: [u8; NONCE_LEN] = STANDARD
            .decode(&self.iv)
            .map_err(|_| Error::AuthenticationFailed)?
            .try_into()
            .map_err(|_| Error::AuthenticationFailed)?;
        let salt: [u8; KDF_SALT_LEN] = STANDARD
            .decode(&self.salt)
            .map_err(|_| Error::AuthenticationFailed)?
            .try_into()
            .map_err(|_| Error::AuthenticationFailed)?;
        Ok(EncryptedEnvelope {
            ciphertext,
            nonce,
            salt,
        })
    }
}

/// The storage-submission / storage-retrieval collaborator.
///
/// `store` returns the record's retrieval URL (sans fragment). `fetch`
/// consumes: the first successful call for an id is the only one that will
/// ever return the envelope, so implementations must not retry it blindly —
/// a retry after a transient failure could double-consume. Retrying `store`
/// is always safe; each attempt mints an unrelated fresh id.
///
/// Both operations are plain futures: dropping one cancels the request, and
/// a cancelled call must never apply its result afterwards.
pub trait SecretTransport {
    fn store(
        &self,
        envelope: &WireEnvelope,
    ) -> impl std::future::Future<Output = Result<String, Error>> + Send;

    fn fetch(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<WireEnvelope, Error>> + Send;
}
