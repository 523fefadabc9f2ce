// Channel registry: which channel each guild wants notices in
//
// The persisted mapping is held as one authoritative in-memory copy
// mutated and flushed under a lock, so concurrent registrations from
// different guilds cannot lose each other's writes.

use crate::errors::StorageError;
use crate::storage::JsonStore;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Persisted mapping from guild id to the channel registered for
/// notifications. At most one channel per guild; last write wins.
pub struct ChannelRegistry {
    store: JsonStore,
    entries: Mutex<HashMap<String, String>>,
}

impl ChannelRegistry {
    /// Load the registry from its backing store. Malformed content is
    /// a degraded start, not a fatal one: the registry begins empty
    /// and the next successful upsert repairs the file.
    pub fn open(store: JsonStore) -> Self {
        let entries = match store.load_map() {
            Ok(map) => {
                info!(
                    path = %store.path().display(),
                    guilds = map.len(),
                    "Channel registry loaded"
                );
                map
            }
            Err(e) => {
                error!(
                    path = %store.path().display(),
                    error = %e,
                    "Failed to load channel registry, starting empty"
                );
                HashMap::new()
            }
        };

        Self {
            store,
            entries: Mutex::new(entries),
        }
    }

    /// Snapshot of the current mapping.
    pub async fn read(&self) -> HashMap<String, String> {
        self.entries.lock().await.clone()
    }

    /// Register (or re-register) a guild's notification channel and
    /// flush the full mapping to the backing store.
    pub async fn upsert(&self, guild_id: &str, channel_id: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        entries.insert(guild_id.to_string(), channel_id.to_string());
        self.store.persist_map(&entries)?;
        info!(
            guild_id = %guild_id,
            channel_id = %channel_id,
            "Channel registered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry_in(dir: &std::path::Path) -> ChannelRegistry {
        let store = JsonStore::open(dir.join("channels.json")).unwrap();
        ChannelRegistry::open(store)
    }

    #[tokio::test]
    async fn test_upsert_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let registry = registry_in(dir.path());

        registry.upsert("guild-1", "chan-a").await.unwrap();

        let map = registry.read().await;
        assert_eq!(map.get("guild-1").map(String::as_str), Some("chan-a"));
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let dir = tempdir().unwrap();
        let registry = registry_in(dir.path());

        registry.upsert("guild-1", "chan-a").await.unwrap();
        registry.upsert("guild-1", "chan-b").await.unwrap();

        let map = registry.read().await;
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("guild-1").map(String::as_str), Some("chan-b"));
    }

    #[tokio::test]
    async fn test_upsert_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let registry = registry_in(dir.path());
            registry.upsert("guild-1", "chan-a").await.unwrap();
            registry.upsert("guild-2", "chan-b").await.unwrap();
        }

        let reopened = registry_in(dir.path());
        let map = reopened.read().await;
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("guild-2").map(String::as_str), Some("chan-b"));
    }

    #[tokio::test]
    async fn test_malformed_store_starts_empty_without_panicking() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(&path, b"{{{ definitely not json").unwrap();

        let registry = ChannelRegistry::open(JsonStore::open(&path).unwrap());
        assert!(registry.read().await.is_empty());

        // A later upsert repairs the file.
        registry.upsert("guild-1", "chan-a").await.unwrap();
        let reopened = ChannelRegistry::open(JsonStore::open(&path).unwrap());
        assert_eq!(reopened.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_from_different_guilds_all_survive() {
        use std::sync::Arc;

        let dir = tempdir().unwrap();
        let registry = Arc::new(registry_in(dir.path()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .upsert(&format!("guild-{i}"), &format!("chan-{i}"))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.read().await.len(), 16);
    }
}
