use std::collections::HashMap;

use crate::{
    client::{Entity, OrganizationService, Value},
    engine::{
        executor::{begin, finish},
        ExecutionError, MetadataQuery, MetadataQueryKind, QueryResult,
    },
    fetch::FetchEvaluator,
    metadata::{EntityMetadata, MetadataTable, OptionSetMetadata},
};

const USER_LANGUAGE: i32 = 1033;

fn optional(value: Option<impl Into<Value>>) -> Value {
    value.map(Into::into).unwrap_or_default()
}

/// Shapes schema objects into the rows of the virtual metadata tables.
pub struct MetadataRows;

impl MetadataRows {
    pub fn entities(all: &[EntityMetadata]) -> Vec<Entity> {
        all.iter()
            .map(|m| {
                Entity::with_id("entity", m.metadata_id)
                    .set("metadataid", m.metadata_id)
                    .set("logicalname", m.logical_name.as_str())
                    .set("displayname", optional(m.display_name.clone()))
                    .set("objecttypecode", optional(m.object_type_code))
                    .set("primaryidattribute", m.primary_id_attribute.as_str())
                    .set("primarynameattribute", optional(m.primary_name_attribute.clone()))
            })
            .collect()
    }

    pub fn attributes(all: &[EntityMetadata]) -> Vec<Entity> {
        all.iter()
            .flat_map(|m| {
                m.attributes.iter().map(move |a| {
                    Entity::with_id("attribute", a.metadata_id)
                        .set("metadataid", a.metadata_id)
                        .set("logicalname", a.logical_name.as_str())
                        .set("entitylogicalname", m.logical_name.as_str())
                        .set("attributetype", a.attribute_type.as_str())
                        .set("attributeof", optional(a.attribute_of.clone()))
                        .set("displayname", optional(a.display_name.clone()))
                })
            })
            .collect()
    }

    /// The display name label of an option set shares the option set's id.
    pub fn option_sets(all: &[OptionSetMetadata]) -> Vec<Entity> {
        all.iter()
            .map(|o| {
                Entity::with_id("globaloptionset", o.metadata_id)
                    .set("metadataid", o.metadata_id)
                    .set("name", o.name.as_str())
                    .set("displayname", optional(o.display_name.user_label(USER_LANGUAGE)))
                    .set("displaynameid", o.metadata_id)
                    .set("isglobal", o.is_global)
            })
            .collect()
    }

    pub fn labels(all: &[OptionSetMetadata]) -> Vec<Entity> {
        all.iter()
            .flat_map(|o| {
                o.display_name.localized_labels.iter().map(move |l| {
                    Entity::with_id("localizedlabel", l.metadata_id)
                        .set("localizedlabelid", l.metadata_id)
                        .set("labelid", o.metadata_id)
                        .set("label", l.label.as_str())
                        .set("languagecode", l.language_code)
                })
            })
            .collect()
    }
}

impl MetadataQuery {
    pub fn execute(&mut self, client: &dyn OrganizationService) -> Result<(), ExecutionError> {
        begin(&mut self.state)?;
        let outcome = self.run(client);
        finish(&mut self.state, outcome)
    }

    fn run(&self, client: &dyn OrganizationService) -> Result<QueryResult, ExecutionError> {
        let mut tables = HashMap::new();
        match self.kind {
            MetadataQueryKind::EntityMetadata => {
                let all = client.retrieve_all_entity_metadata()?;
                for table in &self.tables {
                    let rows = match table {
                        MetadataTable::Attribute => MetadataRows::attributes(&all),
                        _ => MetadataRows::entities(&all),
                    };
                    tables.insert(table.logical_name().to_string(), rows);
                }
            }
            MetadataQueryKind::GlobalOptionSet => {
                let all = client.retrieve_all_option_sets()?;
                for table in &self.tables {
                    let rows = match table {
                        MetadataTable::LocalizedLabel => MetadataRows::labels(&all),
                        _ => MetadataRows::option_sets(&all),
                    };
                    tables.insert(table.logical_name().to_string(), rows);
                }
            }
        }

        let size = tables.values().map(Vec::len).sum::<usize>().max(1);
        let collection = FetchEvaluator::new(&tables).with_page_size(size).with_aggregate_limit(None).execute(&self.fetch)?;
        Ok(QueryResult::Entities(collection))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        client::Value,
        engine::{ExecutionError, ExecutionSettings, Query, QueryState},
        metadata::{Label, OptionSetMetadata},
        translator::_tests::fixtures,
    };

    use super::MetadataRows;

    #[test]
    fn labels_share_the_option_set_id() {
        let option_set = OptionSetMetadata::new("new_status", Label::new(&[("Status", 1033), ("Statut", 1036)]));
        let sets = MetadataRows::option_sets(std::slice::from_ref(&option_set));
        let labels = MetadataRows::labels(std::slice::from_ref(&option_set));

        assert_eq!(sets[0].get("displayname"), &Value::from("Status"));
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|l| l.get("labelid") == sets[0].get("displaynameid")));
    }

    #[test]
    fn attribute_rows_name_their_entity() {
        let rows = MetadataRows::attributes(&[fixtures::contact()]);
        assert_eq!(rows.len(), fixtures::contact().attributes.len());
        assert!(rows.iter().all(|r| r.get("entitylogicalname") == &Value::from("contact")));
        let lookup = rows.iter().find(|r| r.get("logicalname") == &Value::from("parentcustomerid")).unwrap();
        assert_eq!(lookup.get("attributetype"), &Value::from("Customer"));
    }

    #[test]
    fn entity_rows_are_filtered_and_sorted() {
        let (mut query, cache) =
            fixtures::translate_one("SELECT logicalname, objecttypecode FROM entity WHERE objecttypecode IS NOT NULL ORDER BY logicalname DESC");
        assert!(matches!(query, Query::Metadata(_)));
        query.execute(&fixtures::service(), &cache, &ExecutionSettings::new()).unwrap();
        assert_eq!(query.result_set().unwrap().rows(), vec![
            vec![Value::from("contact"), Value::Int(2)],
            vec![Value::from("account"), Value::Int(1)],
        ]);
    }

    #[test]
    fn metadata_queries_run_once() {
        let (mut query, cache) = fixtures::translate_one("SELECT name FROM globaloptionset");
        let service = fixtures::service();
        query.execute(&service, &cache, &ExecutionSettings::new()).unwrap();
        assert!(matches!(query.state(), QueryState::Completed(_)));
        assert!(matches!(
            query.execute(&service, &cache, &ExecutionSettings::new()),
            Err(ExecutionError::InvalidState(_))
        ));
    }
}
