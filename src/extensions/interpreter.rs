use std::{cmp::Ordering, collections::{HashMap, HashSet}};

use tracing::trace;

use crate::{
    client::{Entity, Value},
    extensions::{Accumulator, AggregateColumn, AggregateRegistry, Eval, Extension, ExtensionError, GroupKey, Row, SortKey},
    parser::ast::ScalarExpr,
};

/// Applies extension steps, in order, to rows retrieved from the native query.
pub struct ExtensionInterpreter {
    registry: AggregateRegistry,
}

impl Default for ExtensionInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionInterpreter {
    pub fn new() -> Self {
        Self { registry: AggregateRegistry::default_aggregate_registry() }
    }

    pub fn apply(&self, rows: Vec<Entity>, extensions: &[Extension]) -> Result<Vec<Entity>, ExtensionError> {
        let mut rows: Vec<Row> = rows.into_iter().map(Row::new).collect();
        for extension in extensions {
            trace!(step = %extension, rows = rows.len(), "applying extension");
            rows = self.apply_one(rows, extension)?;
        }
        Ok(rows.into_iter().map(Row::into_entity).collect())
    }

    fn apply_one(&self, mut rows: Vec<Row>, extension: &Extension) -> Result<Vec<Row>, ExtensionError> {
        match extension {
            Extension::ComputeColumn { expr, output } => {
                for row in rows.iter_mut() {
                    let value = Eval::eval_scalar(expr, row)?;
                    row.entity.insert(output, value);
                }
                Ok(rows)
            }
            Extension::FilterRows { predicate } | Extension::Having { predicate } => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    if Eval::eval_predicate3(predicate, &row)?.is_true() {
                        out.push(row);
                    }
                }
                Ok(out)
            }
            Extension::Sort { keys } => Self::sort(rows, keys),
            Extension::ApplyLimit { offset, count } => Ok(rows
                .into_iter()
                .skip(*offset)
                .take(count.unwrap_or(usize::MAX))
                .collect()),
            Extension::NormalizeCollationKey { column } => {
                let key = column.row_key();
                for row in rows.iter_mut() {
                    let folded = row.get(&key).collation_key();
                    row.collation_keys.insert(key.clone(), folded);
                }
                Ok(rows)
            }
            Extension::Aggregate { groups, aggregates } => self.aggregate(rows, groups, aggregates),
            Extension::Distinct { columns } => {
                let mut seen = HashSet::new();
                Ok(rows
                    .into_iter()
                    .filter(|row| {
                        let values: Vec<Value> = columns
                            .iter()
                            .map(|c| match c.case_sensitive {
                                true => row.get(&c.name).clone(),
                                false => row.get(&c.name).collation_key(),
                            })
                            .collect();
                        seen.insert(canonical_tuple(&values))
                    })
                    .collect())
            }
        }
    }

    /// Value used to compare rows by `expr`: the collation key for plain columns,
    /// the evaluated value otherwise.
    fn key_value(expr: &ScalarExpr, row: &Row) -> Result<Value, ExtensionError> {
        match expr {
            ScalarExpr::Column(c) => Ok(row.key_for(c).clone()),
            other => Eval::eval_scalar(other, row),
        }
    }

    fn sort(rows: Vec<Row>, keys: &[SortKey]) -> Result<Vec<Row>, ExtensionError> {
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let values = keys.iter().map(|k| Self::key_value(&k.expr, &row)).collect::<Result<Vec<_>, _>>()?;
            keyed.push((values, row));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for (i, key) in keys.iter().enumerate() {
                let ord = a[i].cmp_for_sort(&b[i], key.expr.is_case_sensitive());
                let ord = if key.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    fn aggregate(
        &self,
        rows: Vec<Row>,
        groups: &[GroupKey],
        aggregates: &[AggregateColumn],
    ) -> Result<Vec<Row>, ExtensionError> {
        struct GroupEntry {
            values: Vec<Value>,
            accumulators: Vec<Box<dyn Accumulator>>,
            distinct: Vec<HashSet<String>>,
        }

        let logical_name = rows.first().map(|r| r.entity.logical_name.clone()).unwrap_or_default();
        let mut order: Vec<String> = vec![];
        let mut entries: HashMap<String, GroupEntry> = HashMap::new();

        let new_entry = |values: Vec<Value>| -> Result<GroupEntry, ExtensionError> {
            let accumulators = aggregates
                .iter()
                .map(|a| {
                    self.registry
                        .get(&a.func)
                        .map(|implementation| implementation.create_accumulator())
                        .ok_or_else(|| ExtensionError::UnknownFunction(a.func.to_uppercase()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(GroupEntry { values, accumulators, distinct: vec![HashSet::new(); aggregates.len()] })
        };

        for row in &rows {
            let mut keys = Vec::with_capacity(groups.len());
            let mut visible = Vec::with_capacity(groups.len());
            for group in groups {
                let (value, key) = match &group.expr {
                    // plain columns were folded by a preceding NormalizeCollationKey
                    ScalarExpr::Column(c) => (row.get(&c.row_key()).clone(), row.key_for(c).clone()),
                    other => {
                        let value = Eval::eval_scalar(other, row)?;
                        let key = if other.is_case_sensitive() { value.clone() } else { value.collation_key() };
                        (value, key)
                    }
                };
                keys.push(key);
                visible.push(value);
            }
            let group_key = canonical_tuple(&keys);

            if !entries.contains_key(&group_key) {
                order.push(group_key.clone());
                entries.insert(group_key.clone(), new_entry(visible)?);
            }
            let Some(entry) = entries.get_mut(&group_key) else { continue };

            for (i, aggregate) in aggregates.iter().enumerate() {
                let args = match &aggregate.arg {
                    Some(arg) => vec![Eval::eval_scalar(arg, row)?],
                    None => vec![],
                };
                if aggregate.distinct {
                    let case_sensitive = aggregate.arg.as_ref().is_some_and(ScalarExpr::is_case_sensitive);
                    let folded: Vec<Value> =
                        args.iter().map(|v| if case_sensitive { v.clone() } else { v.collation_key() }).collect();
                    let key = canonical_tuple(&folded);
                    if !entry.distinct[i].insert(key) {
                        continue;
                    }
                }
                entry.accumulators[i].update(&args)?;
            }
        }

        // an ungrouped aggregate over no rows still yields one row
        if groups.is_empty() && entries.is_empty() {
            order.push(String::new());
            entries.insert(String::new(), new_entry(vec![])?);
        }

        let mut out = Vec::with_capacity(order.len());
        for key in order {
            let Some(entry) = entries.remove(&key) else { continue };
            let mut entity = Entity::new(&logical_name);
            for (group, value) in groups.iter().zip(entry.values) {
                entity.insert(&group.output, value);
            }
            for (aggregate, accumulator) in aggregates.iter().zip(entry.accumulators.iter()) {
                entity.insert(&aggregate.output, accumulator.finalize());
            }
            out.push(Row::new(entity));
        }
        Ok(out)
    }
}

/// Stable text key for a tuple of values.
fn canonical_tuple(values: &[Value]) -> String {
    serde_json::Value::Array(values.iter().map(Value::to_json).collect()).to_string()
}

#[cfg(test)]
mod tests {
    use crate::{
        client::{Entity, Value},
        extensions::{AggregateColumn, DistinctColumn, Extension, ExtensionInterpreter, GroupKey, SortKey},
        parser::{ast::{Column, Predicate, ScalarExpr}, QueryParser},
    };

    fn contacts() -> Vec<Entity> {
        vec![
            Entity::new("contact").set("firstname", "Mark").set("lastname", "Carrington"),
            Entity::new("contact").set("firstname", "Joe").set("lastname", "DOE"),
            Entity::new("contact").set("firstname", "Jane").set("lastname", "doe"),
            Entity::new("contact").set("firstname", "Bob").set("lastname", Value::Null),
        ]
    }

    fn column(name: &str) -> ScalarExpr {
        ScalarExpr::Column(Column::name(name))
    }

    fn predicate(text: &str) -> Predicate {
        Predicate::parse(&mut QueryParser::new(text).unwrap()).unwrap()
    }

    fn names(rows: &[Entity], key: &str) -> Vec<String> {
        rows.iter().map(|r| r.get(key).to_string()).collect()
    }

    #[test]
    fn filter_keeps_only_true_rows() {
        let rows = ExtensionInterpreter::new()
            .apply(contacts(), &[Extension::FilterRows { predicate: predicate("lastname = 'doe'") }])
            .unwrap();
        assert_eq!(names(&rows, "firstname"), vec!["Joe", "Jane"]);
    }

    #[test]
    fn sort_is_stable_with_nulls_first() {
        let keys = vec![SortKey { expr: column("lastname"), descending: false }];
        let rows = ExtensionInterpreter::new().apply(contacts(), &[Extension::Sort { keys }]).unwrap();
        assert_eq!(names(&rows, "firstname"), vec!["Bob", "Mark", "Joe", "Jane"]);

        let keys = vec![SortKey { expr: column("lastname"), descending: true }];
        let rows = ExtensionInterpreter::new().apply(contacts(), &[Extension::Sort { keys }]).unwrap();
        assert_eq!(names(&rows, "firstname"), vec!["Joe", "Jane", "Mark", "Bob"]);
    }

    #[test]
    fn compute_and_limit() {
        let steps = vec![
            Extension::ComputeColumn {
                expr: ScalarExpr::parse(&mut QueryParser::new("LEFT(firstname, 1)").unwrap()).unwrap(),
                output: "initial".into(),
            },
            Extension::ApplyLimit { offset: 1, count: Some(2) },
        ];
        let rows = ExtensionInterpreter::new().apply(contacts(), &steps).unwrap();
        assert_eq!(names(&rows, "initial"), vec!["J", "J"]);
    }

    #[test]
    fn grouping_is_case_insensitive_and_keeps_first_value() {
        let steps = vec![
            Extension::NormalizeCollationKey { column: Column::name("lastname") },
            Extension::Aggregate {
                groups: vec![GroupKey { expr: column("lastname"), output: "lastname".into() }],
                aggregates: vec![AggregateColumn {
                    func: "count".into(),
                    arg: None,
                    distinct: false,
                    output: "total".into(),
                }],
            },
        ];
        let rows = ExtensionInterpreter::new().apply(contacts(), &steps).unwrap();
        assert_eq!(names(&rows, "lastname"), vec!["Carrington", "DOE", ""]);
        assert_eq!(names(&rows, "total"), vec!["1", "2", "1"]);
    }

    #[test]
    fn distinct_aggregates_fold_case() {
        let steps = vec![Extension::Aggregate {
            groups: vec![],
            aggregates: vec![
                AggregateColumn { func: "count".into(), arg: Some(column("lastname")), distinct: true, output: "d".into() },
                AggregateColumn { func: "count".into(), arg: Some(column("lastname")), distinct: false, output: "n".into() },
            ],
        }];
        let rows = ExtensionInterpreter::new().apply(contacts(), &steps).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("d"), &Value::Int(2));
        assert_eq!(rows[0].get("n"), &Value::Int(3));
    }

    #[test]
    fn ungrouped_aggregate_over_nothing() {
        let steps = vec![Extension::Aggregate {
            groups: vec![],
            aggregates: vec![AggregateColumn { func: "count".into(), arg: None, distinct: false, output: "n".into() }],
        }];
        let rows = ExtensionInterpreter::new().apply(vec![], &steps).unwrap();
        assert_eq!(rows[0].get("n"), &Value::Int(0));
    }

    #[test]
    fn having_filters_groups() {
        let steps = vec![
            Extension::NormalizeCollationKey { column: Column::name("lastname") },
            Extension::Aggregate {
                groups: vec![GroupKey { expr: column("lastname"), output: "lastname".into() }],
                aggregates: vec![AggregateColumn { func: "count".into(), arg: None, distinct: false, output: "n".into() }],
            },
            Extension::Having { predicate: predicate("n > 1") },
        ];
        let rows = ExtensionInterpreter::new().apply(contacts(), &steps).unwrap();
        assert_eq!(names(&rows, "lastname"), vec!["DOE"]);
    }

    #[test]
    fn distinct_rows() {
        let steps = vec![Extension::Distinct { columns: DistinctColumn::for_outputs(&["lastname".into()], &[]) }];
        let rows = ExtensionInterpreter::new().apply(contacts(), &steps).unwrap();
        assert_eq!(names(&rows, "firstname"), vec!["Mark", "Joe", "Bob"]);

        let steps = vec![Extension::Distinct { columns: DistinctColumn::for_outputs(&["lastname".into()], &["lastname".into()]) }];
        let rows = ExtensionInterpreter::new().apply(contacts(), &steps).unwrap();
        assert_eq!(names(&rows, "firstname"), vec!["Mark", "Joe", "Jane", "Bob"]);
    }

    #[test]
    fn group_keys_only_fold_once_normalized() {
        let count = || vec![AggregateColumn { func: "count".into(), arg: None, distinct: false, output: "n".into() }];
        let raw = vec![Extension::Aggregate {
            groups: vec![GroupKey { expr: column("lastname"), output: "lastname".into() }],
            aggregates: count(),
        }];
        let rows = ExtensionInterpreter::new().apply(contacts(), &raw).unwrap();
        assert_eq!(names(&rows, "lastname"), vec!["Carrington", "DOE", "doe", ""]);

        let collated = ScalarExpr::parse(&mut QueryParser::new("lastname COLLATE Latin1_General_CS_AS").unwrap()).unwrap();
        let steps = vec![Extension::Aggregate {
            groups: vec![GroupKey { expr: collated, output: "ln".into() }],
            aggregates: count(),
        }];
        let rows = ExtensionInterpreter::new().apply(contacts(), &steps).unwrap();
        assert_eq!(names(&rows, "ln"), vec!["Carrington", "DOE", "doe", ""]);

        let insensitive = ScalarExpr::parse(&mut QueryParser::new("lastname COLLATE Latin1_General_CI_AS").unwrap()).unwrap();
        let steps = vec![Extension::Aggregate {
            groups: vec![GroupKey { expr: insensitive, output: "ln".into() }],
            aggregates: count(),
        }];
        let rows = ExtensionInterpreter::new().apply(contacts(), &steps).unwrap();
        assert_eq!(names(&rows, "ln"), vec!["Carrington", "DOE", ""]);
    }
}
