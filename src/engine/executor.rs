use tracing::{debug, warn};

use crate::{
    client::{ClientError, Entity, EntityCollection, OrganizationService},
    engine::{ExecutionError, ExecutionStrategy, FetchQuery, Query, QueryExecutionOptions, QueryResult, QueryState},
    extensions::ExtensionInterpreter,
    fetch::FetchXml,
    metadata::AttributeMetadataCache,
};

/// Moves a query out of `Created`, refusing any other state.
pub(crate) fn begin(state: &mut QueryState) -> Result<(), ExecutionError> {
    if !matches!(state, QueryState::Created) {
        return Err(ExecutionError::InvalidState(state.to_string()));
    }
    *state = QueryState::Executing;
    Ok(())
}

pub(crate) fn finish(state: &mut QueryState, outcome: Result<QueryResult, ExecutionError>) -> Result<(), ExecutionError> {
    match outcome {
        Ok(result) => {
            *state = QueryState::Completed(result);
            Ok(())
        }
        Err(e) => {
            *state = QueryState::Failed(e.to_string());
            Err(e)
        }
    }
}

/// Runs a native query to completion, following the platform's paging until it reports
/// no more records or the options ask to stop.
pub(crate) fn retrieve_all(
    fetch: &FetchXml,
    client: &dyn OrganizationService,
    options: &dyn QueryExecutionOptions,
) -> Result<Vec<Entity>, ClientError> {
    let single_page = fetch.top.is_some() || fetch.page.is_some();
    let mut request = fetch.clone();
    let mut entities = vec![];

    loop {
        let EntityCollection { entities: page, more_records, paging_cookie } = client.retrieve_multiple(&request)?;
        entities.extend(page);
        debug!(entity = %request.entity.name, page = request.page.unwrap_or(1), total = entities.len(), "retrieved page");
        options.progress(&format!("Retrieved {} {} records...", entities.len(), request.entity.name));

        if !more_records || single_page || options.cancelled() || !options.continue_retrieve(entities.len()) {
            break;
        }
        request.page = Some(request.page.unwrap_or(1) + 1);
        request.paging_cookie = paging_cookie;
    }

    Ok(entities)
}

impl FetchQuery {
    pub fn execute(&mut self, client: &dyn OrganizationService, options: &dyn QueryExecutionOptions) -> Result<(), ExecutionError> {
        begin(&mut self.state)?;
        let outcome = self.run(client, options);
        finish(&mut self.state, outcome)
    }

    fn run(&mut self, client: &dyn OrganizationService, options: &dyn QueryExecutionOptions) -> Result<QueryResult, ExecutionError> {
        let use_alternative = self.requires_alternative();

        let entities = match &mut self.strategy {
            ExecutionStrategy::Aggregate { alternative } if use_alternative => {
                debug!(sql = %self.sql, "aggregate needs local processing, running the non-aggregate alternative");
                return Self::run_alternative(alternative, client, options);
            }
            ExecutionStrategy::Aggregate { alternative } => match retrieve_all(&self.fetch, client, options) {
                Err(ClientError::AggregateQueryRecordLimit) => {
                    warn!(sql = %self.sql, "aggregate record limit exceeded, falling back to local aggregation");
                    return Self::run_alternative(alternative, client, options);
                }
                other => other?,
            },
            ExecutionStrategy::Native => retrieve_all(&self.fetch, client, options)?,
        };

        let entities = ExtensionInterpreter::new().apply(entities, &self.extensions)?;
        Ok(QueryResult::Entities(EntityCollection { entities, more_records: false, paging_cookie: None }))
    }

    fn run_alternative(
        alternative: &mut FetchQuery,
        client: &dyn OrganizationService,
        options: &dyn QueryExecutionOptions,
    ) -> Result<QueryResult, ExecutionError> {
        alternative.execute(client, options)?;
        match &alternative.state {
            QueryState::Completed(result) => Ok(result.clone()),
            other => Err(ExecutionError::InvalidState(other.to_string())),
        }
    }
}

impl Query {
    /// Executes the query once; a query that has left `Created` is rejected.
    pub fn execute(
        &mut self,
        client: &dyn OrganizationService,
        metadata: &AttributeMetadataCache,
        options: &dyn QueryExecutionOptions,
    ) -> Result<(), ExecutionError> {
        debug!(sql = %self.sql(), "executing");
        match self {
            Query::Fetch(q) => q.execute(client, options),
            Query::Update(q) => q.execute(client, metadata, options),
            Query::Delete(q) => q.execute(client, metadata, options),
            Query::Metadata(q) => q.execute(client),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use crate::{
        client::{MemoryOrganizationService, Value},
        engine::{ExecutionError, ExecutionSettings, Query, QueryResult, QueryState},
        translator::_tests::fixtures,
    };

    #[test]
    fn paging_loop_follows_more_records() {
        let service = fixtures::service().with_page_size(2);
        fixtures::seed_contacts(&service, 5);
        let (mut query, cache) = fixtures::translate_one("SELECT firstname FROM contact");

        let pages = Arc::new(Mutex::new(vec![]));
        let seen = pages.clone();
        let settings = ExecutionSettings::new().with_progress(move |m| seen.lock().unwrap().push(m.to_string()));

        query.execute(&service, &cache, &settings).unwrap();
        assert_eq!(query.result_set().unwrap().len(), 5);
        assert_eq!(pages.lock().unwrap().len(), 3);
    }

    #[test]
    fn continue_callback_stops_paging() {
        let service = fixtures::service().with_page_size(2);
        fixtures::seed_contacts(&service, 5);
        let (mut query, cache) = fixtures::translate_one("SELECT firstname FROM contact");

        let settings = ExecutionSettings::new().with_continue_retrieve(|count| count < 4);
        query.execute(&service, &cache, &settings).unwrap();
        assert_eq!(query.result_set().unwrap().len(), 4);
    }

    #[test]
    fn explicit_page_is_not_followed() {
        let service = fixtures::service().with_page_size(2);
        fixtures::seed_contacts(&service, 5);
        let (mut query, cache) = fixtures::translate_one(
            "SELECT firstname FROM contact ORDER BY firstname OFFSET 2 ROWS FETCH NEXT 2 ROWS ONLY",
        );
        query.execute(&service, &cache, &ExecutionSettings::new()).unwrap();
        let rows = query.result_set().unwrap().rows();
        assert_eq!(rows, vec![vec![Value::from("Contact 2")], vec![Value::from("Contact 3")]]);
    }

    #[test]
    fn queries_execute_once() {
        let service = fixtures::service();
        let (mut query, cache) = fixtures::translate_one("SELECT name FROM account");
        let settings = ExecutionSettings::new();
        query.execute(&service, &cache, &settings).unwrap();
        assert!(matches!(query.state(), QueryState::Completed(QueryResult::Entities(_))));
        assert!(matches!(query.execute(&service, &cache, &settings), Err(ExecutionError::InvalidState(_))));
    }

    #[test]
    fn client_failures_leave_the_query_failed() {
        let service = MemoryOrganizationService::new();
        let (mut query, cache) = fixtures::translate_one("SELECT name FROM account");
        let err = query.execute(&service, &cache, &ExecutionSettings::new()).unwrap_err();
        assert!(matches!(err, ExecutionError::Client(_)));
        assert!(matches!(query.state(), QueryState::Failed(message) if message.contains("account")));
    }

    #[test]
    fn record_limit_falls_back_to_alternative() {
        let service = fixtures::service().with_aggregate_limit(Some(2));
        service
            .load_from_json("account", json!([{ "name": "Data8" }, { "name": "data8" }, { "name": "Microsoft" }]))
            .unwrap();
        let (mut query, cache) = fixtures::translate_one("SELECT name, count(*) FROM account GROUP BY name ORDER BY name");
        let Query::Fetch(fetch) = &query else { panic!("expected a fetch query") };
        assert!(!fetch.requires_alternative());

        query.execute(&service, &cache, &ExecutionSettings::new()).unwrap();
        let rows = query.result_set().unwrap().rows();
        assert_eq!(rows, vec![
            vec![Value::from("Data8"), Value::Int(2)],
            vec![Value::from("Microsoft"), Value::Int(1)],
        ]);
    }
}
