//! HTTP implementation of the storage collaborator.

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use hushlink_core::{Error, SecretTransport, WireEnvelope};

pub struct HttpTransport {
    client: Client,
    base: String,
}

impl HttpTransport {
    pub fn new(server: &str) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base: server.trim_end_matches('/').to_owned(),
        })
    }
}

impl SecretTransport for HttpTransport {
    async fn store(&self, envelope: &WireEnvelope) -> Result<String, Error> {
        let resp = self
            .client
            .post(format!("{}/api/store-secret", self.base))
            .json(envelope)
            .send()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let status = resp.status();
        let json: Value = resp
            .json()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        if !status.is_success() {
            let msg = json["error"].as_str().unwrap_or("store rejected").to_owned();
            return Err(Error::StorageUnavailable(msg));
        }

        json["link"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| Error::StorageUnavailable("server returned no link".into()))
    }

    // This is the consuming read: a transport-level failure here is NOT
    // retried — the server may already have flipped the record, and a retry
    // would read as AlreadyConsumed anyway.
    async fn fetch(&self, id: &str) -> Result<WireEnvelope, Error> {
        let resp = self
            .client
            .get(format!("{}/secret/{}", self.base, id))
            .send()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound),
            StatusCode::GONE => Err(Error::AlreadyConsumed),
            status if status.is_success() => resp
                .json::<WireEnvelope>()
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string())),
            status => Err(Error::StorageUnavailable(format!(
                "server returned {status}"
            ))),
        }
    }
}
