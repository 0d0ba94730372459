//! Exchange orchestrator: sequences the create and retrieve paths and maps
//! every failure onto exactly one taxonomy variant.

use tracing::debug;

use crate::cipher::{decrypt, encrypt, EncryptedEnvelope};
use crate::fragment::{decode_fragment, encode_fragment};
use crate::keys::{compose, recompose, KeyMaterial};
use crate::transport::{SecretTransport, WireEnvelope};
use crate::{Error, MIN_PASSPHRASE_LEN};

/// How many local decrypt attempts a fetched envelope allows. The envelope
/// is consumed server-side on first fetch; retries run purely against the
/// client-cached copy and never touch the server again.
pub const MAX_DECRYPT_ATTEMPTS: u32 = 3;

/// Options for sealing a new secret.
#[derive(Debug, Default, Clone)]
pub struct SecretOptions {
    pub passphrase: Option<String>,
    pub hint: Option<String>,
}

/// A freshly minted shareable link.
#[derive(Debug, Clone)]
pub struct CreatedLink {
    /// Full URL including the `#` key fragment.
    pub url: String,
    pub requires_passphrase: bool,
}

/// Create path: validate → compose → encrypt → store → assemble link.
pub async fn create_link<T: SecretTransport>(
    transport: &T,
    secret: &str,
    options: &SecretOptions,
) -> Result<CreatedLink, Error> {
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(Error::EmptySecret);
    }
    if let Some(phrase) = options.passphrase.as_deref() {
        if phrase.chars().count() < MIN_PASSPHRASE_LEN {
            return Err(Error::PassphraseTooShort {
                min: MIN_PASSPHRASE_LEN,
            });
        }
    }

    let mut composed = compose(options.passphrase.as_deref())?;
    composed.material.hint = options.hint.clone().filter(|h| !h.trim().is_empty());

    let envelope = encrypt(secret.as_bytes(), &composed.combined)?;
    let wire = WireEnvelope::from_envelope(&envelope);

    let base_url = transport.store(&wire).await?;
    debug!(requires_passphrase = composed.material.requires_passphrase, "secret stored");

    let url = format!("{}#{}", base_url, encode_fragment(&composed.material));
    Ok(CreatedLink {
        url,
        requires_passphrase: composed.material.requires_passphrase,
    })
}

/// Split a shareable link into the record id and the fragment key material.
///
/// The id is the path segment after `/secret/`; the fragment follows `#`.
/// A link without a fragment cannot ever be decrypted, so it is rejected up
/// front with `MalformedKeyFragment` rather than wasting the single read.
pub fn parse_link(url: &str) -> Result<(String, KeyMaterial), Error> {
    let (location, fragment) = url.split_once('#').ok_or(Error::MalformedKeyFragment)?;
    let material = decode_fragment(fragment)?;

    let id = location
        .split_once("/secret/")
        .map(|(_, rest)| rest)
        .and_then(|rest| rest.split(['/', '?']).next())
        .filter(|id| !id.is_empty())
        .ok_or(Error::NotFound)?;

    Ok((id.to_owned(), material))
}

/// A consumed envelope held client-side for the decrypt-retry window.
///
/// Fetching already burned the record; a wrong passphrase here does not
/// re-trigger consumption.
pub struct RetrievedSecret {
    envelope: EncryptedEnvelope,
    material: KeyMaterial,
    attempts_remaining: u32,
}

impl RetrievedSecret {
    pub fn requires_passphrase(&self) -> bool {
        self.material.requires_passphrase
    }

    /// The sender's hint, if any. Visible to anyone holding the link.
    pub fn hint(&self) -> Option<&str> {
        self.material.hint.as_deref()
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    /// Attempt decryption against the cached envelope.
    ///
    /// `MissingPassphrase` does not spend an attempt; a failed tag check
    /// does. Once attempts are exhausted every further call fails with
    /// `AttemptsExhausted`.
    pub fn reveal(&mut self, passphrase: Option<&str>) -> Result<String, Error> {
        if self.attempts_remaining == 0 {
            return Err(Error::AttemptsExhausted);
        }

        let combined = recompose(&self.material, passphrase)?;
        match decrypt(&self.envelope, &combined) {
            Ok(plaintext) => {
                // The plaintext was UTF-8 when sealed; anything else means
                // the envelope was substituted wholesale.
                String::from_utf8(plaintext).map_err(|_| Error::AuthenticationFailed)
            }
            Err(Error::AuthenticationFailed) => {
                self.attempts_remaining -= 1;
                debug!(
                    attempts_remaining = self.attempts_remaining,
                    "decrypt attempt failed"
                );
                Err(Error::AuthenticationFailed)
            }
            Err(other) => Err(other),
        }
    }
}

/// Retrieve path, first half: consume the record and cache the envelope.
///
/// This performs the one and only `fetch` for the id. Callers gate on
/// [`RetrievedSecret::requires_passphrase`] before asking for input.
pub async fn fetch_secret<T: SecretTransport>(
    transport: &T,
    id: &str,
    material: KeyMaterial,
) -> Result<RetrievedSecret, Error> {
    let wire = transport.fetch(id).await?;
    let envelope = wire.to_envelope()?;
    Ok(RetrievedSecret {
        envelope,
        material,
        attempts_remaining: MAX_DECRYPT_ATTEMPTS,
    })
}

/// One-shot convenience: parse, fetch and decrypt in a single call.
///
/// Suitable when the passphrase is already known (CLI flags, tests). An
/// interactive caller should use [`parse_link`] + [`fetch_secret`] and loop
/// on [`RetrievedSecret::reveal`] instead.
pub async fn open_link<T: SecretTransport>(
    transport: &T,
    url: &str,
    passphrase: Option<&str>,
) -> Result<String, Error> {
    let (id, material) = parse_link(url)?;
    let mut retrieved = fetch_secret(transport, &id, material).await?;
    retrieved.reveal(passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-process stand-in for the HTTP collaborator, with the server's
    /// consume-once behavior.
    #[derive(Default)]
    struct MockTransport {
        records: Mutex<HashMap<String, (WireEnvelope, bool)>>,
        fetches: AtomicUsize,
    }

    impl MockTransport {
        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl SecretTransport for MockTransport {
        async fn store(&self, envelope: &WireEnvelope) -> Result<String, Error> {
            let mut records = self.records.lock().unwrap();
            let id = format!("{:032x}", records.len() + 1);
            records.insert(id.clone(), (envelope.clone(), false));
            Ok(format!("https://example.test/secret/{id}"))
        }

        async fn fetch(&self, id: &str) -> Result<WireEnvelope, Error> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut records = self.records.lock().unwrap();
            match records.get_mut(id) {
                None => Err(Error::NotFound),
                Some((_, consumed)) if *consumed => Err(Error::AlreadyConsumed),
                Some((envelope, consumed)) => {
                    *consumed = true;
                    Ok(envelope.clone())
                }
            }
        }
    }

    #[tokio::test]
    async fn store_fetch_once_then_gone() {
        let transport = MockTransport::default();
        let created = create_link(&transport, "launch code: 42", &SecretOptions::default())
            .await
            .unwrap();

        let plaintext = open_link(&transport, &created.url, None).await.unwrap();
        assert_eq!(plaintext, "launch code: 42");

        assert!(matches!(
            open_link(&transport, &created.url, None).await,
            Err(Error::AlreadyConsumed)
        ));
    }

    #[tokio::test]
    async fn wrong_passphrase_retries_without_refetching() {
        let transport = MockTransport::default();
        let options = SecretOptions {
            passphrase: Some("correcthorse".into()),
            hint: None,
        };
        let created = create_link(&transport, "bank pin", &options).await.unwrap();
        assert!(created.requires_passphrase);

        let (id, material) = parse_link(&created.url).unwrap();
        let mut retrieved = fetch_secret(&transport, &id, material).await.unwrap();
        assert!(retrieved.requires_passphrase());

        assert!(matches!(
            retrieved.reveal(Some("wrong")),
            Err(Error::AuthenticationFailed)
        ));
        assert_eq!(retrieved.reveal(Some("correcthorse")).unwrap(), "bank pin");

        // The single fetch happened up front; retries never re-consumed.
        assert_eq!(transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn missing_passphrase_is_rejected_without_spending_attempts() {
        let transport = MockTransport::default();
        let options = SecretOptions {
            passphrase: Some("correcthorse".into()),
            hint: None,
        };
        let created = create_link(&transport, "hush", &options).await.unwrap();

        let (id, material) = parse_link(&created.url).unwrap();
        let mut retrieved = fetch_secret(&transport, &id, material).await.unwrap();

        assert!(matches!(
            retrieved.reveal(None),
            Err(Error::MissingPassphrase)
        ));
        assert_eq!(retrieved.attempts_remaining(), MAX_DECRYPT_ATTEMPTS);
        assert_eq!(retrieved.reveal(Some("correcthorse")).unwrap(), "hush");
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let transport = MockTransport::default();
        let options = SecretOptions {
            passphrase: Some("correcthorse".into()),
            hint: None,
        };
        let created = create_link(&transport, "sealed", &options).await.unwrap();

        let (id, material) = parse_link(&created.url).unwrap();
        let mut retrieved = fetch_secret(&transport, &id, material).await.unwrap();

        for _ in 0..MAX_DECRYPT_ATTEMPTS {
            assert!(matches!(
                retrieved.reveal(Some("nope-1")),
                Err(Error::AuthenticationFailed)
            ));
        }
        // Even the correct passphrase is refused once exhausted.
        assert!(matches!(
            retrieved.reveal(Some("correcthorse")),
            Err(Error::AttemptsExhausted)
        ));
    }

    #[tokio::test]
    async fn empty_secret_is_rejected_before_any_network_call() {
        let transport = MockTransport::default();
        assert!(matches!(
            create_link(&transport, "   \n ", &SecretOptions::default()).await,
            Err(Error::EmptySecret)
        ));
        assert!(transport.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_passphrase_is_rejected() {
        let transport = MockTransport::default();
        let options = SecretOptions {
            passphrase: Some("abc".into()),
            hint: None,
        };
        assert!(matches!(
            create_link(&transport, "secret", &options).await,
            Err(Error::PassphraseTooShort { min: 6 })
        ));
    }

    #[tokio::test]
    async fn hint_survives_the_link() {
        let transport = MockTransport::default();
        let options = SecretOptions {
            passphrase: Some("correcthorse".into()),
            hint: Some("our first pet".into()),
        };
        let created = create_link(&transport, "secret", &options).await.unwrap();

        let (id, material) = parse_link(&created.url).unwrap();
        assert_eq!(material.hint.as_deref(), Some("our first pet"));
        let retrieved = fetch_secret(&transport, &id, material).await.unwrap();
        assert_eq!(retrieved.hint(), Some("our first pet"));
    }

    #[tokio::test]
    async fn link_without_fragment_fails_fast() {
        let transport = MockTransport::default();
        let created = create_link(&transport, "secret", &SecretOptions::default())
            .await
            .unwrap();
        let stripped = created.url.split('#').next().unwrap();

        assert!(matches!(
            open_link(&transport, stripped, None).await,
            Err(Error::MalformedKeyFragment)
        ));
        // Failing fast must not have consumed the record.
        assert_eq!(transport.fetch_count(), 0);
        assert_eq!(
            open_link(&transport, &created.url, None).await.unwrap(),
            "secret"
        );
    }

    #[test]
    fn parse_link_extracts_id() {
        let material = compose(None).unwrap().material;
        let fragment = encode_fragment(&material);
        let url = format!("https://host.example/secret/deadbeef01#{fragment}");
        let (id, _) = parse_link(&url).unwrap();
        assert_eq!(id, "deadbeef01");
    }

    #[test]
    fn parse_link_rejects_missing_id() {
        let material = compose(None).unwrap().material;
        let fragment = encode_fragment(&material);
        assert!(matches!(
            parse_link(&format!("https://host.example/other/x#{fragment}")),
            Err(Error::NotFound)
        ));
    }
}
