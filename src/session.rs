use std::sync::Arc;

use tracing::info;

use crate::{
    client::OrganizationService,
    engine::{Query, QueryExecutionOptions},
    metadata::AttributeMetadataCache,
    translator::{Sql2FetchXml, TranslatorOptions},
    Error,
};

/// A client plus the metadata cache and translation switches used with it.
#[derive(Clone)]
pub struct Connection {
    service: Arc<dyn OrganizationService>,
    metadata: Arc<AttributeMetadataCache>,
    options: TranslatorOptions,
}

impl Connection {
    pub fn new(service: Arc<dyn OrganizationService>) -> Self {
        Self::with_options(service, TranslatorOptions::default())
    }

    pub fn with_options(service: Arc<dyn OrganizationService>, options: TranslatorOptions) -> Self {
        let metadata = Arc::new(AttributeMetadataCache::for_service(service.clone()));
        Self { service, metadata, options }
    }

    pub fn service(&self) -> &dyn OrganizationService {
        self.service.as_ref()
    }

    pub fn metadata(&self) -> &AttributeMetadataCache {
        &self.metadata
    }

    pub fn translator(&self) -> Sql2FetchXml {
        Sql2FetchXml::new(self.metadata.clone(), self.options)
    }
}

pub trait QueryRunner {
    /// Translate then execute every statement of a batch, in order.
    fn run(&self, sql: &str, options: &dyn QueryExecutionOptions) -> Result<Vec<Query>, Error>;
}

impl QueryRunner for Connection {
    fn run(&self, sql: &str, options: &dyn QueryExecutionOptions) -> Result<Vec<Query>, Error> {
        let mut queries = self.translator().translate(sql)?;
        for query in queries.iter_mut() {
            query.execute(self.service(), self.metadata(), options)?;
            info!(sql = %query.sql(), state = %query.state(), "statement executed");
        }
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::{
        client::{MemoryOrganizationService, Value},
        engine::{ExecutionError, ExecutionSettings, QueryResult},
        session::{Connection, QueryRunner},
        translator::_tests::fixtures,
        Error,
    };

    fn connection() -> (Connection, Arc<MemoryOrganizationService>) {
        let service = Arc::new(fixtures::service());
        service
            .load_from_json("account", json!([{ "name": "Data8", "employees": 10 }, { "name": "Microsoft", "employees": 1000 }]))
            .unwrap();
        (Connection::new(service.clone()), service)
    }

    #[test]
    fn batches_run_every_statement() {
        let (connection, service) = connection();
        let queries = connection
            .run(
                "UPDATE account SET employees = employees + 1 WHERE name = 'Data8'; SELECT name, employees FROM account ORDER BY name",
                &ExecutionSettings::new(),
            )
            .unwrap();

        assert!(matches!(queries[0].result(), Some(QueryResult::Affected { count: 1, .. })));
        assert_eq!(queries[1].result_set().unwrap().rows(), vec![
            vec![Value::from("Data8"), Value::Int(11)],
            vec![Value::from("Microsoft"), Value::Int(1000)],
        ]);
        assert_eq!(service.records("account").len(), 2);
    }

    #[test]
    fn execution_errors_stop_the_batch() {
        let (connection, service) = connection();
        let err = connection.run("DELETE FROM account; DELETE FROM account WHERE name = 'Data8'", &ExecutionSettings::new()).unwrap_err();
        assert!(matches!(err, Error::Execution(ExecutionError::GuardRejection { .. })));
        assert_eq!(service.records("account").len(), 2);
    }

    #[test]
    fn metadata_is_cached_per_connection() {
        let (connection, _) = connection();
        connection.translator().translate("SELECT name FROM account").unwrap();
        assert!(connection.metadata().cached("account").is_some());
        assert!(connection.metadata().cached("contact").is_none());
    }
}
