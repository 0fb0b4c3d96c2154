use std::{collections::HashMap, sync::{Arc, RwLock}};

use tracing::debug;

use crate::{client::{ClientError, OrganizationService}, metadata::{EntityMetadata, MetadataTable, ResolutionError}};

/// Where entity definitions come from.
pub trait MetadataSource: Send + Sync {
    fn entity_metadata(&self, logical_name: &str) -> Result<EntityMetadata, ClientError>;
}

impl<T: OrganizationService + ?Sized> MetadataSource for T {
    fn entity_metadata(&self, logical_name: &str) -> Result<EntityMetadata, ClientError> {
        self.retrieve_entity_metadata(logical_name)
    }
}

/// Reads entity definitions through a shared client handle.
struct ServiceSource(Arc<dyn OrganizationService>);

impl MetadataSource for ServiceSource {
    fn entity_metadata(&self, logical_name: &str) -> Result<EntityMetadata, ClientError> {
        self.0.retrieve_entity_metadata(logical_name)
    }
}

/// Session-scoped, read-mostly cache of entity metadata.
///
/// Each entity is fetched from the source the first time it is requested. Two threads
/// missing at the same time may both fetch; the first insert wins and the other result
/// is dropped, so readers never see a partially populated entry.
pub struct AttributeMetadataCache {
    source: Arc<dyn MetadataSource>,
    entries: RwLock<HashMap<String, Arc<EntityMetadata>>>,
}

impl AttributeMetadataCache {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self { source, entries: RwLock::new(HashMap::new()) }
    }

    pub fn for_service(service: Arc<dyn OrganizationService>) -> Self {
        Self::new(Arc::new(ServiceSource(service)))
    }

    pub fn get(&self, logical_name: &str) -> Result<Arc<EntityMetadata>, ResolutionError> {
        if let Some(table) = MetadataTable::from_name(logical_name) {
            return Ok(table.metadata());
        }

        let key = logical_name.to_ascii_lowercase();
        if let Some(cached) = self.cached(&key) {
            return Ok(cached);
        }

        debug!(entity = %key, "loading entity metadata");
        let metadata = self.source.entity_metadata(&key).map_err(|e| match e {
            ClientError::UnknownEntity(name) => ResolutionError::UnknownEntity(name),
            other => ResolutionError::Source { entity: key.clone(), source: other },
        })?;

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Ok(entries.entry(key).or_insert_with(|| Arc::new(metadata)).clone())
    }

    pub fn cached(&self, logical_name: &str) -> Option<Arc<EntityMetadata>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&logical_name.to_ascii_lowercase()).cloned()
    }

    pub fn invalidate(&self, logical_name: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&logical_name.to_ascii_lowercase());
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

    use crate::{client::ClientError, metadata::{AttributeMetadataCache, EntityMetadata, MetadataSource, ResolutionError}};

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl MetadataSource for CountingSource {
        fn entity_metadata(&self, logical_name: &str) -> Result<EntityMetadata, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match logical_name {
                "account" => Ok(EntityMetadata::new("account", "accountid")),
                other => Err(ClientError::UnknownEntity(other.to_string())),
            }
        }
    }

    #[test]
    fn populates_once_per_entity() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let cache = AttributeMetadataCache::new(source.clone());

        let a = cache.get("account").unwrap();
        let b = cache.get("Account").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        cache.invalidate("account");
        assert!(cache.is_empty());
        cache.get("account").unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unknown_entities_are_resolution_errors() {
        let cache = AttributeMetadataCache::new(Arc::new(CountingSource { calls: AtomicUsize::new(0) }));
        assert_eq!(cache.get("nothing").unwrap_err(), ResolutionError::UnknownEntity("nothing".into()));
        assert!(cache.cached("nothing").is_none());
    }

    #[test]
    fn metadata_tables_bypass_the_source() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let cache = AttributeMetadataCache::new(source.clone());
        let entity = cache.get("entity").unwrap();
        assert!(entity.attribute("logicalname").is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
