//! Persisted stake-transaction annotations.
//!
//! The chain does not record which transaction created a stake position,
//! so the engine keeps a small wallet-scoped map of stake start timestamp
//! to transaction hash. The map is best-effort: storage failures are
//! logged and swallowed, never surfaced to callers.

use std::collections::HashMap;

use alloy_primitives::Address;

/// Minimal key/value seam so the index never hard-codes a backend.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

fn storage_dir() -> String {
    let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home_dir}/.stakeboard")
}

fn ensure_storage_dir(dir: &str) -> bool {
    match std::fs::create_dir_all(dir) {
        Ok(_) => true,
        Err(e) => {
            log::error!("failed to create storage directory {}: {}", dir, e);
            false
        }
    }
}

/// One file per key under the storage directory.
pub struct FileKvStore {
    dir: String,
}

impl FileKvStore {
    pub fn new() -> Self {
        Self {
            dir: storage_dir(),
        }
    }

    pub fn with_dir(dir: &str) -> Self {
        Self {
            dir: dir.to_string(),
        }
    }

    fn path_for(&self, key: &str) -> String {
        // Keys carry a namespace colon; keep filenames portable.
        let file = key.replace(':', "_");
        format!("{}/{}.json", self.dir, file)
    }
}

impl Default for FileKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) {
        if !ensure_storage_dir(&self.dir) {
            return;
        }
        let path = self.path_for(key);
        if let Err(e) = std::fs::write(&path, value) {
            log::error!("failed to write {}: {}", path, e);
        }
    }
}

/// Wallet-scoped map of stake start timestamp (decimal string) to the
/// transaction hash that created the position.
pub struct TxIndex<S: KvStore> {
    store: S,
}

impl<S: KvStore> TxIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn key_for(wallet: Address) -> String {
        format!("stake_txs:0x{}", hex::encode(wallet.as_slice()))
    }

    /// All recorded annotations for a wallet. Unknown wallets and
    /// unparseable payloads both yield an empty map.
    pub fn load(&self, wallet: Address) -> HashMap<String, String> {
        let raw = match self.store.get(&Self::key_for(wallet)) {
            Some(raw) => raw,
            None => return HashMap::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                log::warn!("discarding unreadable tx index for {}: {}", wallet, e);
                HashMap::new()
            }
        }
    }

    /// Annotate one stake with its transaction hash. Read-modify-write so
    /// existing entries survive; duplicate timestamps overwrite.
    pub fn record(&self, wallet: Address, start_timestamp: u64, tx_hash: &str) {
        let mut map = self.load(wallet);
        map.insert(start_timestamp.to_string(), tx_hash.to_string());
        match serde_json::to_string(&map) {
            Ok(raw) => self.store.set(&Self::key_for(wallet), &raw),
            Err(e) => log::error!("failed to serialize tx index for {}: {}", wallet, e),
        }
    }

    /// Hash of the transaction that created the stake starting at
    /// `start_timestamp`, if one was recorded.
    pub fn lookup(&self, wallet: Address, start_timestamp: u64) -> Option<String> {
        self.load(wallet).remove(&start_timestamp.to_string())
    }
}
