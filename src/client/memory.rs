use std::{collections::HashMap, fs, path::Path, sync::RwLock};

use tracing::debug;
use uuid::Uuid;

use crate::{
    client::{ClientError, Entity, EntityCollection, EntityReference, OrganizationService, Value},
    fetch::{FetchEvaluator, FetchXml, DEFAULT_PAGE_SIZE},
    metadata::{AttributeMetadata, AttributeType, EntityMetadata, OptionSetMetadata},
};

/// The platform refuses aggregate queries over more records than this.
pub const AGGREGATE_RECORD_LIMIT: usize = 50_000;

/// In-process stand-in for the data platform, holding tables, metadata and option sets.
pub struct MemoryOrganizationService {
    tables: RwLock<HashMap<String, Vec<Entity>>>,
    metadata: RwLock<HashMap<String, EntityMetadata>>,
    option_sets: RwLock<Vec<OptionSetMetadata>>,
    page_size: usize,
    aggregate_limit: Option<usize>,
}

impl Default for MemoryOrganizationService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrganizationService {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
            option_sets: RwLock::new(vec![]),
            page_size: DEFAULT_PAGE_SIZE,
            aggregate_limit: Some(AGGREGATE_RECORD_LIMIT),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_aggregate_limit(mut self, limit: Option<usize>) -> Self {
        self.aggregate_limit = limit;
        self
    }

    /// Registers an entity and gives it an empty table.
    pub fn with_entity(self, metadata: EntityMetadata) -> Self {
        self.register_entity(metadata);
        self
    }

    pub fn with_option_set(self, option_set: OptionSetMetadata) -> Self {
        self.option_sets.write().unwrap_or_else(|e| e.into_inner()).push(option_set);
        self
    }

    pub fn register_entity(&self, metadata: EntityMetadata) {
        let name = metadata.logical_name.clone();
        self.tables.write().unwrap_or_else(|e| e.into_inner()).entry(name.clone()).or_default();
        self.metadata.write().unwrap_or_else(|e| e.into_inner()).insert(name, metadata);
    }

    /// Snapshot of every record in a table.
    pub fn records(&self, logical_name: &str) -> Vec<Entity> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.get(logical_name).cloned().unwrap_or_default()
    }

    pub fn record(&self, logical_name: &str, id: Uuid) -> Option<Entity> {
        self.records(logical_name).into_iter().find(|e| e.id == Some(id))
    }

    fn primary_id(&self, logical_name: &str) -> Result<String, ClientError> {
        let metadata = self.metadata.read().unwrap_or_else(|e| e.into_inner());
        metadata
            .get(logical_name)
            .map(|m| m.primary_id_attribute.clone())
            .ok_or_else(|| ClientError::UnknownEntity(logical_name.to_string()))
    }

    /// Loads records from a JSON array of objects, converting each property with the
    /// attribute's metadata. Returns the number of records added.
    pub fn load_from_json(&self, logical_name: &str, json: serde_json::Value) -> Result<usize, ClientError> {
        let serde_json::Value::Array(items) = json else {
            return Err(ClientError::Fault(format!("Seed data for {} is not a JSON array", logical_name)));
        };
        let metadata = {
            let all = self.metadata.read().unwrap_or_else(|e| e.into_inner());
            all.get(logical_name).cloned().ok_or_else(|| ClientError::UnknownEntity(logical_name.to_string()))?
        };

        let mut added = 0;
        for item in items {
            let serde_json::Value::Object(fields) = item else {
                return Err(ClientError::Fault(format!("Seed data for {} must contain objects", logical_name)));
            };
            let mut entity = Entity::new(logical_name);
            for (key, value) in fields {
                let attribute = metadata.attribute(&key).ok_or_else(|| {
                    ClientError::Fault(format!("{} is not an attribute of {}", key, logical_name))
                })?;
                entity.insert(&attribute.logical_name, coerce_json(&value, attribute)?);
            }
            entity.id = entity.get(&metadata.primary_id_attribute).as_guid();
            self.create(&entity)?;
            added += 1;
        }
        debug!(entity = logical_name, added, "loaded seed records");
        Ok(added)
    }

    pub fn load_from_file(&self, logical_name: &str, path: impl AsRef<Path>) -> Result<usize, ClientError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ClientError::Fault(format!("Could not read {}: {}", path.display(), e)))?;
        let json = serde_json::from_str::<serde_json::Value>(&content)
            .map_err(|e| ClientError::Fault(format!("{} does not contain valid JSON: {}", path.display(), e)))?;
        self.load_from_json(logical_name, json)
    }
}

fn coerce_json(value: &serde_json::Value, attribute: &AttributeMetadata) -> Result<Value, ClientError> {
    use serde_json::Value as Json;

    let invalid = || {
        ClientError::Fault(format!("{} is not a valid {} value for {}", value, attribute.attribute_type.as_str(), attribute.logical_name))
    };

    Ok(match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().ok_or_else(invalid)?),
        },
        Json::Object(reference) => {
            let logical_name = reference.get("logicalname").and_then(Json::as_str).ok_or_else(invalid)?;
            let id = reference.get("id").and_then(Json::as_str).and_then(|s| Uuid::parse_str(s).ok()).ok_or_else(invalid)?;
            Value::EntityReference(EntityReference::new(logical_name, id))
        }
        Json::String(s) => match attribute.attribute_type {
            AttributeType::DateTime => Value::DateTime(Value::parse_datetime(s).ok_or_else(invalid)?),
            AttributeType::Uniqueidentifier => Value::Guid(Uuid::parse_str(s).map_err(|_| invalid())?),
            t if t.is_lookup() => {
                let target = attribute.targets.first().ok_or_else(invalid)?;
                Value::EntityReference(EntityReference::new(target, Uuid::parse_str(s).map_err(|_| invalid())?))
            }
            _ => Value::String(s.clone()),
        },
        Json::Array(_) => return Err(invalid()),
    })
}

impl OrganizationService for MemoryOrganizationService {
    fn retrieve_multiple(&self, fetch: &FetchXml) -> Result<EntityCollection, ClientError> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        FetchEvaluator::new(&tables)
            .with_page_size(self.page_size)
            .with_aggregate_limit(self.aggregate_limit)
            .execute(fetch)
    }

    fn create(&self, entity: &Entity) -> Result<Uuid, ClientError> {
        let primary_id = self.primary_id(&entity.logical_name)?;
        let id = entity.id.or_else(|| entity.get(&primary_id).as_guid()).unwrap_or_else(Uuid::new_v4);

        let mut record = entity.clone();
        record.id = Some(id);
        record.insert(&primary_id, Value::Guid(id));

        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(entity.logical_name.clone()).or_default().push(record);
        Ok(id)
    }

    fn update(&self, entity: &Entity) -> Result<(), ClientError> {
        let not_found = || ClientError::NotFound { entity: entity.logical_name.clone(), id: entity.id.unwrap_or_default() };
        let id = entity.id.ok_or_else(not_found)?;

        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let record = tables
            .get_mut(&entity.logical_name)
            .and_then(|t| t.iter_mut().find(|r| r.id == Some(id)))
            .ok_or_else(not_found)?;
        for (key, value) in &entity.attributes {
            record.insert(key, value.clone());
        }
        Ok(())
    }

    fn delete(&self, logical_name: &str, id: Uuid) -> Result<(), ClientError> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let table = tables.get_mut(logical_name).ok_or_else(|| ClientError::UnknownEntity(logical_name.to_string()))?;
        let before = table.len();
        table.retain(|r| r.id != Some(id));
        if table.len() == before {
            return Err(ClientError::NotFound { entity: logical_name.to_string(), id });
        }
        Ok(())
    }

    fn bulk_delete(&self, fetch: &FetchXml) -> Result<Uuid, ClientError> {
        let ids: Vec<Uuid> = {
            let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
            let mut all = fetch.clone();
            all.top = None;
            all.page = None;
            all.count = None;
            FetchEvaluator::new(&tables)
                .with_page_size(usize::MAX)
                .execute(&all)?
                .entities
                .iter()
                .filter_map(|e| e.id)
                .collect()
        };

        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        if let Some(table) = tables.get_mut(&fetch.entity.name) {
            table.retain(|r| !r.id.is_some_and(|id| ids.contains(&id)));
        }
        let job_id = Uuid::new_v4();
        debug!(entity = %fetch.entity.name, records = ids.len(), job = %job_id, "bulk delete completed");
        Ok(job_id)
    }

    fn retrieve_entity_metadata(&self, logical_name: &str) -> Result<EntityMetadata, ClientError> {
        let metadata = self.metadata.read().unwrap_or_else(|e| e.into_inner());
        metadata
            .get(&logical_name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ClientError::UnknownEntity(logical_name.to_string()))
    }

    fn retrieve_all_entity_metadata(&self) -> Result<Vec<EntityMetadata>, ClientError> {
        let metadata = self.metadata.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<EntityMetadata> = metadata.values().cloned().collect();
        all.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));
        Ok(all)
    }

    fn retrieve_all_option_sets(&self) -> Result<Vec<OptionSetMetadata>, ClientError> {
        Ok(self.option_sets.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}
