// Connector registry: one pooled connector per connection signature.
//
// Repeated calls against the same physical connection reuse one connector
// (and therefore one pool) instead of reconnecting. Unlike a grow-forever
// cache, eviction is explicit: LRU when the registry is full, plus idle
// expiry driven by the caller; evicted and replaced connectors are closed
// so pools do not leak.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::models::ConnectionConfig;
use crate::services::database::{create_connector, DataConnector};

struct RegistryEntry {
    connector: Arc<dyn DataConnector>,
    instance_id: String,
    last_used: Instant,
}

pub struct ConnectorRegistry {
    entries: Arc<RwLock<HashMap<String, RegistryEntry>>>,
    settings: EngineSettings,
}

impl ConnectorRegistry {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            settings,
        }
    }

    /// Get or create the connector for this connection signature.
    /// Safe to call concurrently; first-time creation is double-checked so
    /// racing callers end up sharing one instance.
    pub async fn get_or_create(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn DataConnector>, EngineError> {
        let signature = config.signature();

        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(&signature) {
                entry.last_used = Instant::now();
                tracing::debug!(
                    "Reusing connector {} for {}",
                    entry.instance_id,
                    config.masked()
                );
                return Ok(entry.connector.clone());
            }
        }

        // Connect outside the lock; pool construction may take a while.
        let connector = create_connector(config, &self.settings).await?;
        let instance_id = uuid::Uuid::new_v4().to_string();

        let mut evicted = Vec::new();
        let winner = {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(&signature) {
                // Another task created it while we were connecting.
                entry.last_used = Instant::now();
                evicted.push(connector);
                entry.connector.clone()
            } else {
                while entries.len() >= self.settings.registry_max_entries.max(1) {
                    let oldest = entries
                        .iter()
                        .min_by_key(|(_, entry)| entry.last_used)
                        .map(|(key, _)| key.clone());
                    match oldest {
                        Some(key) => {
                            if let Some(entry) = entries.remove(&key) {
                                tracing::info!(
                                    "Evicting least recently used connector {}",
                                    entry.instance_id
                                );
                                evicted.push(entry.connector);
                            }
                        }
                        None => break,
                    }
                }

                tracing::info!(
                    "Created {} connector {} for {}",
                    config.engine.as_str(),
                    instance_id,
                    config.masked()
                );
                entries.insert(
                    signature,
                    RegistryEntry {
                        connector: connector.clone(),
                        instance_id,
                        last_used: Instant::now(),
                    },
                );
                connector
            }
        };

        for connector in evicted {
            if let Err(e) = connector.close().await {
                tracing::warn!("Failed to close evicted connector: {}", e);
            }
        }

        Ok(winner)
    }

    /// Close and drop connectors idle longer than the configured expiry.
    /// Returns the number of evicted entries.
    pub async fn evict_idle(&self) -> usize {
        let max_idle = Duration::from_secs(self.settings.registry_idle_secs);
        let mut evicted = Vec::new();

        {
            let mut entries = self.entries.write().await;
            let expired: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.last_used.elapsed() >= max_idle)
                .map(|(key, _)| key.clone())
                .collect();
            for key in expired {
                if let Some(entry) = entries.remove(&key) {
                    tracing::info!("Evicting idle connector {}", entry.instance_id);
                    evicted.push(entry.connector);
                }
            }
        }

        let count = evicted.len();
        for connector in evicted {
            if let Err(e) = connector.close().await {
                tracing::warn!("Failed to close idle connector: {}", e);
            }
        }
        count
    }

    /// Close and drop the connector for one connection, if cached.
    pub async fn remove(&self, config: &ConnectionConfig) -> bool {
        let removed = {
            let mut entries = self.entries.write().await;
            entries.remove(&config.signature())
        };
        match removed {
            Some(entry) => {
                if let Err(e) = entry.connector.close().await {
                    tracing::warn!("Failed to close removed connector: {}", e);
                }
                true
            }
            None => false,
        }
    }

    /// Drain the registry, closing every cached connector. For shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<RegistryEntry> = {
            let mut entries = self.entries.write().await;
            entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            if let Err(e) = entry.connector.close().await {
                tracing::warn!("Failed to close connector {}: {}", entry.instance_id, e);
            }
        }
        if count > 0 {
            tracing::info!("Closed {} cached connectors", count);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::EngineType;

    // Elasticsearch and ClickHouse connectors build an HTTP client without
    // touching the network, so they make good registry test subjects.
    fn config(host: &str, cache_key: Option<&str>) -> ConnectionConfig {
        ConnectionConfig {
            engine: EngineType::Elasticsearch,
            host: host.to_string(),
            port: 9200,
            database: "default".to_string(),
            username: String::new(),
            password: None,
            cache_key: cache_key.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_same_signature_reuses_connector() {
        let registry = ConnectorRegistry::default();
        let a = registry.get_or_create(&config("es1", None)).await.unwrap();
        let b = registry.get_or_create(&config("es1", None)).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_key_disambiguates_entries() {
        let registry = ConnectorRegistry::default();
        registry
            .get_or_create(&config("es1", Some("tenant-1")))
            .await
            .unwrap();
        registry
            .get_or_create(&config("es1", Some("tenant-2")))
            .await
            .unwrap();
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_lru_eviction_at_capacity() {
        let settings = EngineSettings {
            registry_max_entries: 2,
            ..EngineSettings::default()
        };
        let registry = ConnectorRegistry::new(settings);

        let first = config("es1", None);
        registry.get_or_create(&first).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.get_or_create(&config("es2", None)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Touch the first entry so the second becomes the LRU victim.
        registry.get_or_create(&first).await.unwrap();
        registry.get_or_create(&config("es3", None)).await.unwrap();

        assert_eq!(registry.len().await, 2);
        let snapshot = registry.entries.read().await;
        assert!(snapshot.contains_key(&first.signature()));
        assert!(!snapshot.contains_key(&config("es2", None).signature()));
    }

    #[tokio::test]
    async fn test_idle_eviction_and_close_all() {
        let settings = EngineSettings {
            registry_idle_secs: 0,
            ..EngineSettings::default()
        };
        let registry = ConnectorRegistry::new(settings);
        registry.get_or_create(&config("es1", None)).await.unwrap();
        registry.get_or_create(&config("es2", None)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(registry.evict_idle().await, 2);
        assert_eq!(registry.len().await, 0);

        registry.get_or_create(&config("es1", None)).await.unwrap();
        registry.close_all().await;
        assert_eq!(registry.len().await, 0);
    }

    #[test]
    fn test_remove_missing_entry() {
        let registry = ConnectorRegistry::default();
        let removed = tokio_test::block_on(registry.remove(&config("es1", None)));
        assert!(!removed);
    }
}
