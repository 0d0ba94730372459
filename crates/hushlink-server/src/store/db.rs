use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use redb::{Database, ReadableTable, TableDefinition};
use tokio::time;
use tracing::{debug, info, warn};

use super::model::SecretRecord;

const SECRETS: TableDefinition<&str, &[u8]> = TableDefinition::new("secrets");

/// Result of a consumption attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsumeResult {
    /// First read: the stored blobs, with the record now marked consumed.
    Consumed(SecretRecord),
    /// A previous read already took the payload.
    AlreadyConsumed,
    /// No record for this id.
    NotFound,
}

/// Thread-safe handle to the redb store.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).context("open redb database")?;

        let write_txn = db.begin_write()?;
        write_txn.open_table(SECRETS)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Allocate a fresh unguessable id — 128 bits of OS randomness, hex.
    fn generate_id() -> Result<String> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("draw id randomness")?;
        Ok(hex::encode(bytes))
    }

    /// Persist a new envelope and return its id.
    ///
    /// Idempotent under retries in the only way that matters: each call
    /// mints a fresh id, so a duplicate submission is an unrelated record,
    /// never a reused one.
    pub fn put(&self, encrypted: &str, iv: &str, salt: &str) -> Result<String> {
        let id = Self::generate_id()?;
        let record = SecretRecord {
            encrypted: encrypted.to_owned(),
            iv: iv.to_owned(),
            salt: salt.to_owned(),
            consumed: false,
            created_at: Self::now(),
            consumed_at: None,
        };

        let bytes = encode(&record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SECRETS)?;
            table.insert(id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;

        debug!(id = %id, "stored secret");
        Ok(id)
    }

    /// Read a record's payload and mark it consumed, as one atomic unit.
    ///
    /// The read-check-and-flip runs inside a single redb write transaction;
    /// write transactions are serialized, so of two racing calls exactly one
    /// observes `consumed == false`. Never a separate read then write.
    pub fn consume_once(&self, id: &str) -> Result<ConsumeResult> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(SECRETS)?;

            // Clone the raw bytes so the AccessGuard's borrow of `table`
            // ends before the insert below.
            let raw_bytes: Option<Vec<u8>> = table.get(id)?.map(|guard| guard.value().to_vec());

            match raw_bytes {
                None => ConsumeResult::NotFound,
                Some(bytes) => {
                    let mut record = decode(&bytes)?;
                    if record.consumed {
                        ConsumeResult::AlreadyConsumed
                    } else {
                        record.consumed = true;
                        record.consumed_at = Some(Self::now());
                        let updated = encode(&record)?;
                        table.insert(id, updated.as_slice())?;
                        debug!(id = %id, "consumed secret");
                        ConsumeResult::Consumed(record)
                    }
                }
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    /// Remove consumed records older than `retention_secs`. Returns the
    /// number removed. Unconsumed records are left untouched — there is no
    /// expiry state in this design.
    pub fn prune_consumed(&self, retention_secs: i64) -> Result<usize> {
        let now = Self::now();

        // Collect sweepable ids in a read pass first.
        let dead_ids: Vec<String> = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(SECRETS)?;
            let mut ids = Vec::new();
            for item in table.iter()? {
                let (k, v) = item?;
                let record = decode(v.value())?;
                if record.sweepable(now, retention_secs) {
                    ids.push(k.value().to_owned());
                }
            }
            ids
        };

        if dead_ids.is_empty() {
            return Ok(0);
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SECRETS)?;
            for id in &dead_ids {
                table.remove(id.as_str())?;
            }
        }
        write_txn.commit()?;

        let removed = dead_ids.len();
        info!(removed, "pruned consumed secrets");
        Ok(removed)
    }

    /// Spawn a background Tokio task that garbage-collects consumed records
    /// every `interval`.
    pub fn spawn_sweep(self, interval: Duration, retention_secs: i64) {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await; // skip first immediate tick
            loop {
                ticker.tick().await;
                if let Err(e) = self.prune_consumed(retention_secs) {
                    warn!(error = %e, "background sweep error");
                }
            }
        });
    }
}

fn encode(record: &SecretRecord) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(record, bincode::config::standard()).context("bincode encode")
}

fn decode(bytes: &[u8]) -> Result<SecretRecord> {
    let (record, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .context("bincode decode")?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_store() -> (Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = Store::open(&path).unwrap();
        (store, dir)
    }

    #[test]
    fn put_assigns_unique_unguessable_ids() {
        let (s, _dir) = make_store();
        let a = s.put("ZW5j", "aXY=", "c2FsdA==").unwrap();
        let b = s.put("ZW5j", "aXY=", "c2FsdA==").unwrap();
        assert_eq!(a.len(), 32); // 16 random bytes, hex
        assert_ne!(a, b);
    }

    #[test]
    fn consume_returns_blobs_verbatim_once() {
        let (s, _dir) = make_store();
        let id = s.put("ZW5jcnlwdGVk", "bm9uY2U=", "c2FsdA==").unwrap();

        match s.consume_once(&id).unwrap() {
            ConsumeResult::Consumed(record) => {
                assert_eq!(record.encrypted, "ZW5jcnlwdGVk");
                assert_eq!(record.iv, "bm9uY2U=");
                assert_eq!(record.salt, "c2FsdA==");
                assert!(record.consumed);
                assert!(record.consumed_at.is_some());
            }
            other => panic!("expected Consumed, got {other:?}"),
        }

        assert_eq!(
            s.consume_once(&id).unwrap(),
            ConsumeResult::AlreadyConsumed
        );
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (s, _dir) = make_store();
        assert_eq!(
            s.consume_once("00000000000000000000000000000000").unwrap(),
            ConsumeResult::NotFound
        );
    }

    #[test]
    fn concurrent_consumers_exactly_one_success() {
        let (s, _dir) = make_store();
        let id = s.put("ZW5j", "aXY=", "c2FsdA==").unwrap();

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let store = s.clone();
                let id = id.clone();
                std::thread::spawn(move || store.consume_once(&id).unwrap())
            })
            .collect();

        let mut successes = 0;
        let mut already = 0;
        for handle in threads {
            match handle.join().unwrap() {
                ConsumeResult::Consumed(_) => successes += 1,
                ConsumeResult::AlreadyConsumed => already += 1,
                ConsumeResult::NotFound => panic!("record vanished"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(already, 15);

        // And every later call keeps failing.
        assert_eq!(
            s.consume_once(&id).unwrap(),
            ConsumeResult::AlreadyConsumed
        );
    }

    #[test]
    fn prune_removes_only_aged_consumed_records() {
        let (s, _dir) = make_store();
        let live = s.put("YQ==", "YQ==", "YQ==").unwrap();
        let dead = s.put("YQ==", "YQ==", "YQ==").unwrap();
        s.consume_once(&dead).unwrap();

        // retention 0: consumed records are immediately sweepable.
        assert_eq!(s.prune_consumed(0).unwrap(), 1);

        // The unconsumed record survived and is still readable.
        assert!(matches!(
            s.consume_once(&live).unwrap(),
            ConsumeResult::Consumed(_)
        ));
        // The swept record now reads as gone entirely.
        assert_eq!(s.consume_once(&dead).unwrap(), ConsumeResult::NotFound);
    }

    #[test]
    fn prune_respects_retention_window() {
        let (s, _dir) = make_store();
        let id = s.put("YQ==", "YQ==", "YQ==").unwrap();
        s.consume_once(&id).unwrap();

        // A generous retention keeps the tombstone around.
        assert_eq!(s.prune_consumed(86_400).unwrap(), 0);
        assert_eq!(
            s.consume_once(&id).unwrap(),
            ConsumeResult::AlreadyConsumed
        );
    }
}
