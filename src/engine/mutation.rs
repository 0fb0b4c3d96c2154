use std::collections::HashSet;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    client::{ClientError, Entity, EntityReference, OrganizationService, Value},
    engine::{
        executor::{begin, finish},
        DeleteQuery, ExecutionError, FetchQuery, QueryExecutionOptions, QueryResult, QueryState, UpdateQuery,
    },
    extensions::{Eval, Row},
    metadata::{AttributeMetadata, AttributeMetadataCache, AttributeType},
};

/// Runs the record selection of an UPDATE / DELETE and returns its rows.
fn select(source: &mut FetchQuery, client: &dyn OrganizationService, options: &dyn QueryExecutionOptions) -> Result<Vec<Entity>, ExecutionError> {
    source.execute(client, options)?;
    match &source.state {
        QueryState::Completed(QueryResult::Entities(collection)) => Ok(collection.entities.clone()),
        other => Err(ExecutionError::InvalidState(other.to_string())),
    }
}

/// Ids of the selected records, each once, in retrieval order. Rows where an outer join
/// found no target record are skipped.
fn record_ids(rows: &[Entity], id_column: &str) -> Result<Vec<(Uuid, Row)>, ExecutionError> {
    let mut seen = HashSet::new();
    let mut out = vec![];
    for row in rows {
        let row = Row::new(row.clone());
        let id = match row.get(id_column) {
            Value::Null => continue,
            value => value
                .as_guid()
                .ok_or_else(|| ClientError::Fault(format!("Selected record has an invalid {} value", id_column)))?,
        };
        if seen.insert(id) {
            out.push((id, row));
        }
    }
    Ok(out)
}

/// Applies `change` to every item, batch by batch. Stops at the first failure without
/// undoing what was already applied.
fn run_batches<T>(
    items: &[T],
    options: &dyn QueryExecutionOptions,
    describe: impl Fn(usize, usize) -> String,
    mut change: impl FnMut(&T) -> Result<(), ClientError>,
) -> Result<usize, ExecutionError> {
    let mut applied = 0;
    for batch in items.chunks(options.batch_size().max(1)) {
        if options.cancelled() {
            return Err(ExecutionError::Cancelled { applied });
        }
        for item in batch {
            if let Err(source) = change(item) {
                if applied == 0 {
                    return Err(source.into());
                }
                warn!(applied, error = %source, "mutation stopped part way through");
                return Err(ExecutionError::PartialMutation { applied, source });
            }
            applied += 1;
        }
        debug!(applied, total = items.len(), "mutation batch complete");
        options.progress(&describe(applied, items.len()));
    }
    Ok(applied)
}

/// Converts a computed value into the shape the attribute stores.
pub(crate) fn convert_value(value: Value, attribute: &AttributeMetadata) -> Value {
    let kind = attribute.attribute_type;
    match value {
        Value::Guid(id) if kind.is_lookup() => match attribute.targets.first() {
            Some(target) => Value::EntityReference(EntityReference::new(target, id)),
            None => Value::Guid(id),
        },
        Value::String(s) if kind.is_lookup() || kind == AttributeType::Uniqueidentifier => {
            match (Uuid::parse_str(&s), attribute.targets.first()) {
                (Ok(id), Some(target)) if kind.is_lookup() => Value::EntityReference(EntityReference::new(target, id)),
                (Ok(id), _) => Value::Guid(id),
                (Err(_), _) => Value::String(s),
            }
        }
        Value::String(s) if kind == AttributeType::DateTime => match Value::parse_datetime(&s) {
            Some(d) => Value::DateTime(d),
            None => Value::String(s),
        },
        Value::Int(i) if kind == AttributeType::Boolean => Value::Bool(i != 0),
        Value::Int(i) if matches!(kind, AttributeType::Double | AttributeType::Decimal | AttributeType::Money) => Value::Float(i as f64),
        other => other,
    }
}

impl UpdateQuery {
    pub fn execute(
        &mut self,
        client: &dyn OrganizationService,
        metadata: &AttributeMetadataCache,
        options: &dyn QueryExecutionOptions,
    ) -> Result<(), ExecutionError> {
        begin(&mut self.state)?;
        let outcome = self.run(client, metadata, options);
        finish(&mut self.state, outcome)
    }

    fn run(
        &mut self,
        client: &dyn OrganizationService,
        metadata: &AttributeMetadataCache,
        options: &dyn QueryExecutionOptions,
    ) -> Result<QueryResult, ExecutionError> {
        if !self.has_where && options.block_update_without_where() {
            return Err(ExecutionError::GuardRejection { operation: "UPDATE".into() });
        }
        let target = metadata.get(&self.entity_name)?;

        let rows = select(&mut self.source, client, options)?;
        let records = record_ids(&rows, &self.id_column)?;
        if records.is_empty() {
            return Ok(QueryResult::Affected { count: 0, message: format!("No {} records to update", self.entity_name) });
        }
        if !options.confirm_update(records.len(), &target) {
            return Ok(QueryResult::Affected { count: 0, message: "Update cancelled by user".into() });
        }

        let mut changes = Vec::with_capacity(records.len());
        for (id, row) in &records {
            let mut entity = Entity::with_id(&self.entity_name, *id);
            for update in &self.updates {
                let value = Eval::eval_scalar(&update.value, row)?;
                let value = match target.attribute(&update.attribute) {
                    Some(attribute) => convert_value(value, attribute),
                    None => value,
                };
                entity.insert(&update.attribute, value);
            }
            changes.push(entity);
        }

        let name = self.entity_name.clone();
        let count = run_batches(
            &changes,
            options,
            |done, total| format!("Updated {} of {} {} records", done, total, name),
            |entity| client.update(entity),
        )?;
        Ok(QueryResult::Affected { count, message: format!("{} {} records updated", count, self.entity_name) })
    }
}

impl DeleteQuery {
    pub fn execute(
        &mut self,
        client: &dyn OrganizationService,
        metadata: &AttributeMetadataCache,
        options: &dyn QueryExecutionOptions,
    ) -> Result<(), ExecutionError> {
        begin(&mut self.state)?;
        let outcome = self.run(client, metadata, options);
        finish(&mut self.state, outcome)
    }

    /// Bulk delete hands the whole selection to the platform, so the selection must be
    /// exactly the fetch and must return the deleted table's records.
    pub fn can_bulk_delete(&self) -> bool {
        self.target_is_root && self.source.extensions.is_empty()
    }

    fn run(
        &mut self,
        client: &dyn OrganizationService,
        metadata: &AttributeMetadataCache,
        options: &dyn QueryExecutionOptions,
    ) -> Result<QueryResult, ExecutionError> {
        if !self.has_where && options.block_delete_without_where() {
            return Err(ExecutionError::GuardRejection { operation: "DELETE".into() });
        }
        let target = metadata.get(&self.entity_name)?;

        let rows = select(&mut self.source, client, options)?;
        let records = record_ids(&rows, &self.id_column)?;
        if records.is_empty() {
            return Ok(QueryResult::Affected { count: 0, message: format!("No {} records to delete", self.entity_name) });
        }
        if !options.confirm_delete(records.len(), &target) {
            return Ok(QueryResult::Affected { count: 0, message: "Delete cancelled by user".into() });
        }

        if options.use_bulk_delete() && self.can_bulk_delete() {
            let job = client.bulk_delete(&self.source.fetch)?;
            debug!(%job, entity = %self.entity_name, "bulk delete submitted");
            return Ok(QueryResult::Affected {
                count: records.len(),
                message: format!("Bulk delete job {} started for {} {} records", job, records.len(), self.entity_name),
            });
        }

        let name = self.entity_name.clone();
        let count = run_batches(
            &records,
            options,
            |done, total| format!("Deleted {} of {} {} records", done, total, name),
            |(id, _)| client.delete(&self.entity_name, *id),
        )?;
        Ok(QueryResult::Affected { count, message: format!("{} {} records deleted", count, self.entity_name) })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use uuid::Uuid;

    use crate::{
        client::{ClientError, Entity, EntityCollection, EntityReference, MemoryOrganizationService, OrganizationService, Value},
        engine::{mutation::convert_value, ExecutionError, ExecutionSettings, QueryResult, QueryState},
        fetch::FetchXml,
        metadata::{AttributeMetadata, AttributeType, EntityMetadata, OptionSetMetadata},
        translator::_tests::fixtures,
    };

    /// Delegates to a memory service but fails every change after the first `allowed`.
    struct FailingService {
        inner: MemoryOrganizationService,
        allowed: usize,
        changes: AtomicUsize,
    }

    impl FailingService {
        fn change(&self) -> Result<(), ClientError> {
            if self.changes.fetch_add(1, Ordering::SeqCst) >= self.allowed {
                return Err(ClientError::Fault("Service unavailable".into()));
            }
            Ok(())
        }
    }

    impl OrganizationService for FailingService {
        fn retrieve_multiple(&self, fetch: &FetchXml) -> Result<EntityCollection, ClientError> {
            self.inner.retrieve_multiple(fetch)
        }

        fn create(&self, entity: &Entity) -> Result<Uuid, ClientError> {
            self.inner.create(entity)
        }

        fn update(&self, entity: &Entity) -> Result<(), ClientError> {
            self.change()?;
            self.inner.update(entity)
        }

        fn delete(&self, logical_name: &str, id: Uuid) -> Result<(), ClientError> {
            self.change()?;
            self.inner.delete(logical_name, id)
        }

        fn bulk_delete(&self, fetch: &FetchXml) -> Result<Uuid, ClientError> {
            self.inner.bulk_delete(fetch)
        }

        fn retrieve_entity_metadata(&self, logical_name: &str) -> Result<EntityMetadata, ClientError> {
            self.inner.retrieve_entity_metadata(logical_name)
        }

        fn retrieve_all_entity_metadata(&self) -> Result<Vec<EntityMetadata>, ClientError> {
            self.inner.retrieve_all_entity_metadata()
        }

        fn retrieve_all_option_sets(&self) -> Result<Vec<OptionSetMetadata>, ClientError> {
            self.inner.retrieve_all_option_sets()
        }
    }

    fn failing(allowed: usize, contacts: usize) -> FailingService {
        let inner = fixtures::service();
        fixtures::seed_contacts(&inner, contacts);
        FailingService { inner, allowed, changes: AtomicUsize::new(0) }
    }

    #[test]
    fn statements_without_where_are_blocked() {
        let service = fixtures::service();
        fixtures::seed_contacts(&service, 2);

        let (mut query, cache) = fixtures::translate_one("DELETE FROM contact");
        let err = query.execute(&service, &cache, &ExecutionSettings::new()).unwrap_err();
        assert_eq!(err, ExecutionError::GuardRejection { operation: "DELETE".into() });
        assert!(matches!(query.state(), QueryState::Failed(_)));
        assert_eq!(service.records("contact").len(), 2);

        let (mut query, cache) = fixtures::translate_one("UPDATE contact SET lastname = 'x'");
        let err = query.execute(&service, &cache, &ExecutionSettings::new()).unwrap_err();
        assert_eq!(err, ExecutionError::GuardRejection { operation: "UPDATE".into() });
    }

    #[test]
    fn declined_confirmation_changes_nothing() {
        let service = fixtures::service();
        fixtures::seed_contacts(&service, 3);

        let asked = Arc::new(Mutex::new(None));
        let seen = asked.clone();
        let settings = ExecutionSettings::new().with_confirm_delete(move |count, metadata| {
            *seen.lock().unwrap() = Some((count, metadata.logical_name.clone()));
            false
        });

        let (mut query, cache) = fixtures::translate_one("DELETE FROM contact WHERE firstname LIKE 'Contact%'");
        query.execute(&service, &cache, &settings).unwrap();
        assert_eq!(*asked.lock().unwrap(), Some((3, "contact".to_string())));
        assert!(matches!(query.result(), Some(QueryResult::Affected { count: 0, .. })));
        assert_eq!(service.records("contact").len(), 3);
    }

    #[test]
    fn updates_run_in_batches() {
        let service = fixtures::service();
        fixtures::seed_contacts(&service, 5);

        let messages = Arc::new(Mutex::new(vec![]));
        let seen = messages.clone();
        let settings = ExecutionSettings::new()
            .with_batch_size(2)
            .with_progress(move |m| seen.lock().unwrap().push(m.to_string()));

        let (mut query, cache) = fixtures::translate_one("UPDATE contact SET lastname = 'Smith' WHERE firstname LIKE 'Contact%'");
        query.execute(&service, &cache, &settings).unwrap();

        let batches: Vec<String> = messages.lock().unwrap().iter().filter(|m| m.starts_with("Updated")).cloned().collect();
        assert_eq!(batches, vec![
            "Updated 2 of 5 contact records",
            "Updated 4 of 5 contact records",
            "Updated 5 of 5 contact records",
        ]);
        assert!(service.records("contact").iter().all(|c| c.get("lastname") == &Value::from("Smith")));
        assert!(matches!(query.result(), Some(QueryResult::Affected { count: 5, .. })));
    }

    #[test]
    fn cancelled_mutations_report_progress_so_far() {
        let service = fixtures::service();
        fixtures::seed_contacts(&service, 3);

        let settings = ExecutionSettings::new();
        settings.cancel();
        let (mut query, cache) = fixtures::translate_one("DELETE FROM contact WHERE firstname LIKE 'Contact%'");
        let err = query.execute(&service, &cache, &settings).unwrap_err();
        assert_eq!(err, ExecutionError::Cancelled { applied: 0 });
        assert_eq!(service.records("contact").len(), 3);
    }

    #[test]
    fn bulk_delete_submits_one_job() {
        let service = fixtures::service();
        fixtures::seed_contacts(&service, 4);

        let (mut query, cache) = fixtures::translate_one("DELETE FROM contact WHERE firstname = 'Contact 1'");
        query.execute(&service, &cache, &ExecutionSettings::new().with_bulk_delete(true)).unwrap();
        let Some(QueryResult::Affected { count, message }) = query.result() else { panic!("expected an affected count") };
        assert_eq!(*count, 1);
        assert!(message.starts_with("Bulk delete job"), "{}", message);
        assert_eq!(service.records("contact").len(), 3);
    }

    #[test]
    fn failures_part_way_keep_applied_changes() {
        let service = failing(2, 4);
        let (mut query, cache) = fixtures::translate_one("DELETE FROM contact WHERE firstname LIKE 'Contact%'");
        let err = query.execute(&service, &cache, &ExecutionSettings::new()).unwrap_err();
        assert!(matches!(err, ExecutionError::PartialMutation { applied: 2, .. }));
        assert_eq!(service.inner.records("contact").len(), 2);
        assert!(matches!(query.state(), QueryState::Failed(message) if message.contains("2 records were changed")));
    }

    #[test]
    fn failure_on_the_first_record_is_a_client_error() {
        let service = failing(0, 2);
        let (mut query, cache) = fixtures::translate_one("UPDATE contact SET lastname = 'x' WHERE firstname LIKE 'Contact%'");
        let err = query.execute(&service, &cache, &ExecutionSettings::new()).unwrap_err();
        assert_eq!(err, ExecutionError::Client(ClientError::Fault("Service unavailable".into())));
    }

    #[test]
    fn rows_without_a_target_record_are_skipped() {
        let service = fixtures::service();
        let data8 = service.create(&Entity::new("account").set("name", "Data8")).unwrap();
        service.create(&Entity::new("account").set("name", "Microsoft")).unwrap();
        service
            .create(&Entity::new("contact").set("firstname", "Mark").set("parentcustomerid", EntityReference::new("account", data8)))
            .unwrap();
        service.create(&Entity::new("contact").set("firstname", "Joe")).unwrap();

        let (mut query, cache) = fixtures::translate_one(
            "DELETE c FROM account a LEFT OUTER JOIN contact c ON a.accountid = c.parentcustomerid WHERE a.name IS NOT NULL",
        );
        query.execute(&service, &cache, &ExecutionSettings::new()).unwrap();

        assert!(matches!(query.result(), Some(QueryResult::Affected { count: 1, .. })));
        let remaining = service.records("contact");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].get("firstname"), &Value::from("Joe"));
    }

    #[test]
    fn values_are_converted_to_attribute_types() {
        let id = Uuid::new_v4();
        let lookup = AttributeMetadata::lookup("primarycontactid", &["contact"]);
        assert_eq!(convert_value(Value::Guid(id), &lookup), Value::EntityReference(EntityReference::new("contact", id)));
        assert_eq!(convert_value(Value::String(id.to_string()), &lookup), Value::EntityReference(EntityReference::new("contact", id)));

        let flag = AttributeMetadata::new("donotemail", AttributeType::Boolean);
        assert_eq!(convert_value(Value::Int(1), &flag), Value::Bool(true));
        let money = AttributeMetadata::new("revenue", AttributeType::Money);
        assert_eq!(convert_value(Value::Int(3), &money), Value::Float(3.0));
        let text = AttributeMetadata::new("name", AttributeType::String);
        assert_eq!(convert_value(Value::from("x"), &text), Value::from("x"));
    }
}
