use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    client::{ClientError, Entity, EntityCollection, Value},
    extensions::{like_regex, split_values, AggregateRegistry},
    fetch::{AggregateType, ConditionOperator, FetchAttribute, FetchCondition, FetchEntity, FetchFilter, FetchLinkEntity, FetchOrder, FetchXml, FilterItem, FilterType, LinkType},
};

/// Default number of records per page when the query sets no explicit count.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Record joined across the link-entities of one native query. Root attributes
/// keep their own name, link attributes are keyed `alias.attribute`.
#[derive(Debug, Clone, Default)]
struct Joined {
    id: Option<Uuid>,
    values: IndexMap<String, Value>,
}

impl Joined {
    fn get(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(key).unwrap_or(&NULL)
    }
}

fn prefix_for(link: &FetchLinkEntity) -> String {
    format!("{}.", link.alias)
}

/// Runs native queries over in-memory tables, with the platform's semantics for
/// joins, conditions, ordering, aggregation and paging.
pub struct FetchEvaluator<'a> {
    tables: &'a HashMap<String, Vec<Entity>>,
    page_size: usize,
    aggregate_limit: Option<usize>,
    now: NaiveDateTime,
}

impl<'a> FetchEvaluator<'a> {
    pub fn new(tables: &'a HashMap<String, Vec<Entity>>) -> Self {
        Self { tables, page_size: DEFAULT_PAGE_SIZE, aggregate_limit: None, now: Utc::now().naive_utc() }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_aggregate_limit(mut self, limit: Option<usize>) -> Self {
        self.aggregate_limit = limit;
        self
    }

    /// Fixes the clock used by relative date operators.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn execute(&self, fetch: &FetchXml) -> Result<EntityCollection, ClientError> {
        let rows = self.scope_rows(&fetch.entity, "")?;

        let mut attributes = vec![];
        Self::collect_attributes(&fetch.entity, "", &mut attributes);

        let entities = if fetch.aggregate {
            if let Some(limit) = self.aggregate_limit {
                if rows.len() > limit {
                    return Err(ClientError::AggregateQueryRecordLimit);
                }
            }
            let mut entities = self.aggregate(&fetch.entity.name, rows, &attributes)?;
            let orders = Self::collect_orders(&fetch.entity, "", &attributes, true);
            Self::sort(&mut entities, &orders, |e, key| e.get(key));
            entities
        } else {
            let mut rows = rows;
            let orders = Self::collect_orders(&fetch.entity, "", &attributes, false);
            Self::sort(&mut rows, &orders, |r, key| r.get(key));
            let mut entities: Vec<Entity> =
                rows.iter().map(|r| Self::project(&fetch.entity, r, &attributes)).collect();
            if fetch.distinct {
                let mut seen = HashSet::new();
                entities.retain(|e| {
                    let key: Vec<_> = e.attributes.values().map(|v| v.collation_key().to_json()).collect();
                    seen.insert(serde_json::Value::Array(key).to_string())
                });
            }
            entities
        };

        Ok(self.page(fetch, entities))
    }

    fn page(&self, fetch: &FetchXml, entities: Vec<Entity>) -> EntityCollection {
        if let Some(top) = fetch.top {
            return EntityCollection {
                entities: entities.into_iter().take(top as usize).collect(),
                more_records: false,
                paging_cookie: None,
            };
        }

        let size = fetch.count.map(|c| c as usize).unwrap_or(self.page_size);
        let page = fetch.page.unwrap_or(1).max(1) as usize;
        let total = entities.len();
        let skip = (page - 1) * size;
        let more_records = total > skip + size;
        EntityCollection {
            entities: entities.into_iter().skip(skip).take(size).collect(),
            more_records,
            paging_cookie: more_records.then(|| format!("<cookie page=\"{}\" />", page)),
        }
    }

    fn scope_rows(&self, entity: &FetchEntity, prefix: &str) -> Result<Vec<Joined>, ClientError> {
        let table = self.tables.get(&entity.name).ok_or_else(|| ClientError::UnknownEntity(entity.name.clone()))?;

        let mut rows: Vec<Joined> = table
            .iter()
            .map(|record| Joined {
                id: record.id,
                values: record.attributes.iter().map(|(k, v)| (format!("{}{}", prefix, k), v.clone())).collect(),
            })
            .collect();

        for link in &entity.links {
            rows = self.join(rows, link, prefix)?;
        }

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if self.matches_all(&entity.filters, &row, prefix)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    fn join(&self, parents: Vec<Joined>, link: &FetchLinkEntity, parent_prefix: &str) -> Result<Vec<Joined>, ClientError> {
        let child_prefix = prefix_for(link);
        let children = self.scope_rows(&link.entity, &child_prefix)?;
        let from_key = format!("{}{}", child_prefix, link.from);
        let to_key = format!("{}{}", parent_prefix, link.to);

        let mut out = vec![];
        for parent in parents {
            let parent_value = parent.get(&to_key);
            let mut matched = false;
            for child in &children {
                if Self::join_equals(parent_value, child.get(&from_key)) {
                    matched = true;
                    let mut joined = parent.clone();
                    joined.values.extend(child.values.iter().map(|(k, v)| (k.clone(), v.clone())));
                    out.push(joined);
                }
            }
            if !matched && link.link_type == LinkType::Outer {
                out.push(parent);
            }
        }
        Ok(out)
    }

    fn join_equals(a: &Value, b: &Value) -> bool {
        match (a.as_guid(), b.as_guid()) {
            (Some(x), Some(y)) => x == y,
            _ => a.sql_equals(b, false) == Some(true),
        }
    }

    fn matches_all(&self, filters: &[FetchFilter], row: &Joined, prefix: &str) -> Result<bool, ClientError> {
        for filter in filters {
            if !self.matches_filter(filter, row, prefix)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_filter(&self, filter: &FetchFilter, row: &Joined, prefix: &str) -> Result<bool, ClientError> {
        for item in &filter.items {
            let matched = match item {
                FilterItem::Condition(c) => self.matches_condition(c, row, prefix)?,
                FilterItem::Filter(f) => self.matches_filter(f, row, prefix)?,
            };
            match (filter.filter_type, matched) {
                (FilterType::And, false) => return Ok(false),
                (FilterType::Or, true) => return Ok(true),
                _ => {}
            }
        }
        Ok(filter.filter_type == FilterType::And || filter.items.is_empty())
    }

    fn matches_condition(&self, condition: &FetchCondition, row: &Joined, prefix: &str) -> Result<bool, ClientError> {
        use ConditionOperator::*;

        let value = row.get(&format!("{}{}", prefix, condition.attribute));
        let operand = || -> Value {
            if let Some(other) = &condition.value_of {
                let key = if other.contains('.') { other.clone() } else { format!("{}{}", prefix, other) };
                return row.get(&key).clone();
            }
            condition.value.clone().map(Value::String).unwrap_or_default()
        };
        let number = || -> Result<i64, ClientError> {
            condition
                .value
                .as_deref()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .ok_or_else(|| ClientError::Fault(format!("Condition {} requires a whole number value", condition.operator.as_str())))
        };

        match condition.operator {
            Null => return Ok(value.is_null()),
            NotNull => return Ok(!value.is_null()),
            _ if value.is_null() => return Ok(false),
            _ => {}
        }

        let compare = |expected: std::cmp::Ordering, negate: bool| -> bool {
            let ord = value.compare(&operand(), false);
            match ord {
                Some(o) => (o == expected) != negate,
                None => false,
            }
        };

        Ok(match condition.operator {
            Equal => compare(std::cmp::Ordering::Equal, false),
            NotEqual => compare(std::cmp::Ordering::Equal, true),
            LessThan => compare(std::cmp::Ordering::Less, false),
            GreaterEqual => compare(std::cmp::Ordering::Less, true),
            GreaterThan => compare(std::cmp::Ordering::Greater, false),
            LessEqual => compare(std::cmp::Ordering::Greater, true),
            Like | NotLike => {
                let pattern = condition.value.clone().unwrap_or_default();
                let re = like_regex(&pattern).map_err(|e| ClientError::Fault(e.to_string()))?;
                re.is_match(&value.to_string()) == (condition.operator == Like)
            }
            In | NotIn => {
                let found = condition
                    .values
                    .iter()
                    .any(|v| value.sql_equals(&Value::String(v.clone()), false) == Some(true));
                found == (condition.operator == In)
            }
            ContainValues | NotContainValues => {
                let stored = split_values(&value.to_string());
                let found = condition.values.iter().any(|v| stored.iter().any(|s| s.eq_ignore_ascii_case(v.trim())));
                found == (condition.operator == ContainValues)
            }
            On | OnOrAfter | OnOrBefore => {
                let (Some(day), Some(wanted)) = (value.as_datetime(), operand().as_datetime()) else {
                    return Ok(false);
                };
                let (day, wanted) = (day.date(), wanted.date());
                match condition.operator {
                    On => day == wanted,
                    OnOrAfter => day >= wanted,
                    _ => day <= wanted,
                }
            }
            op => {
                let Some(at) = value.as_datetime() else { return Ok(false) };
                let (start, end) = self.date_range(op, number)?;
                at >= start && at < end
            }
        })
    }

    /// Half-open range of instants a relative date operator accepts.
    fn date_range(
        &self,
        op: ConditionOperator,
        number: impl Fn() -> Result<i64, ClientError>,
    ) -> Result<(NaiveDateTime, NaiveDateTime), ClientError> {
        use ConditionOperator::*;

        let out_of_range = || ClientError::Fault(format!("The {} value is out of range", op.as_str()));
        let now = self.now;
        let today = now.date();
        let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).unwrap_or(now);
        let add_days = |d: NaiveDateTime, n: i64| Duration::try_days(n).and_then(|delta| d.checked_add_signed(delta)).ok_or_else(out_of_range);
        let add_hours = |d: NaiveDateTime, n: i64| Duration::try_hours(n).and_then(|delta| d.checked_add_signed(delta)).ok_or_else(out_of_range);
        let add_months = |d: NaiveDateTime, n: i64| {
            u32::try_from(n.unsigned_abs())
                .ok()
                .map(Months::new)
                .and_then(|m| if n >= 0 { d.checked_add_months(m) } else { d.checked_sub_months(m) })
                .ok_or_else(out_of_range)
        };
        let times = |n: i64, factor: i64| n.checked_mul(factor).ok_or_else(out_of_range);
        let plus_one = |n: i64| n.checked_add(1).ok_or_else(out_of_range);
        let day = |offset: i64| add_days(midnight(today), offset);

        let week_start = add_days(midnight(today), -(today.weekday().num_days_from_sunday() as i64))?;
        let month_start = midnight(today.with_day(1).unwrap_or(today));
        let year_start = midnight(NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today));
        let min = NaiveDateTime::MIN;

        Ok(match op {
            Yesterday => (day(-1)?, day(0)?),
            Today => (day(0)?, day(1)?),
            Tomorrow => (day(1)?, day(2)?),
            Last7Days => (day(-7)?, now),
            Next7Days => (now, day(8)?),
            LastWeek => (add_days(week_start, -7)?, week_start),
            ThisWeek => (week_start, add_days(week_start, 7)?),
            NextWeek => (add_days(week_start, 7)?, add_days(week_start, 14)?),
            LastMonth => (add_months(month_start, -1)?, month_start),
            ThisMonth => (month_start, add_months(month_start, 1)?),
            NextMonth => (add_months(month_start, 1)?, add_months(month_start, 2)?),
            LastYear => (add_months(year_start, -12)?, year_start),
            ThisYear => (year_start, add_months(year_start, 12)?),
            NextYear => (add_months(year_start, 12)?, add_months(year_start, 24)?),
            LastXHours => (add_hours(now, times(number()?, -1)?)?, now),
            NextXHours => (now, add_hours(now, number()?)?),
            LastXDays => (day(times(number()?, -1)?)?, now),
            NextXDays => (now, day(plus_one(number()?)?)?),
            LastXWeeks => (day(times(number()?, -7)?)?, now),
            NextXWeeks => (now, day(plus_one(times(number()?, 7)?)?)?),
            LastXMonths => (add_months(midnight(today), times(number()?, -1)?)?, now),
            NextXMonths => (now, add_months(day(1)?, number()?)?),
            LastXYears => (add_months(midnight(today), times(number()?, -12)?)?, now),
            NextXYears => (now, add_months(day(1)?, times(number()?, 12)?)?),
            OlderThanXDays => (min, add_days(now, times(number()?, -1)?)?),
            OlderThanXMonths => (min, add_months(now, times(number()?, -1)?)?),
            OlderThanXYears => (min, add_months(now, times(number()?, -12)?)?),
            other => {
                return Err(ClientError::Fault(format!("The condition operator {} is not supported", other.as_str())));
            }
        })
    }

    fn collect_attributes<'f>(entity: &'f FetchEntity, prefix: &str, out: &mut Vec<(String, &'f FetchAttribute)>) {
        for attribute in &entity.attributes {
            out.push((prefix.to_string(), attribute));
        }
        for link in &entity.links {
            Self::collect_attributes(&link.entity, &prefix_for(link), out);
        }
    }

    /// Sort keys in document order: the root's orders first, then each link's.
    fn collect_orders(
        entity: &FetchEntity,
        prefix: &str,
        attributes: &[(String, &FetchAttribute)],
        aggregate: bool,
    ) -> Vec<(String, bool)> {
        let mut out: Vec<(String, bool)> = entity
            .orders
            .iter()
            .filter_map(|order: &FetchOrder| match (&order.attribute, &order.alias) {
                (_, Some(alias)) if aggregate => Some((alias.clone(), order.descending)),
                (_, Some(alias)) => attributes
                    .iter()
                    .find(|(_, a)| a.alias.as_deref() == Some(alias.as_str()))
                    .map(|(p, a)| (format!("{}{}", p, a.name), order.descending)),
                (Some(attribute), None) => Some((format!("{}{}", prefix, attribute), order.descending)),
                (None, None) => None,
            })
            .collect();
        for link in &entity.links {
            out.extend(Self::collect_orders(&link.entity, &prefix_for(link), attributes, aggregate));
        }
        out
    }

    fn sort<T>(rows: &mut [T], orders: &[(String, bool)], get: impl for<'r> Fn(&'r T, &str) -> &'r Value) {
        if orders.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for (key, descending) in orders {
                let ord = get(a, key).cmp_for_sort(get(b, key), false);
                let ord = if *descending { ord.reverse() } else { ord };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    fn project(root: &FetchEntity, row: &Joined, attributes: &[(String, &FetchAttribute)]) -> Entity {
        let mut entity = Entity { logical_name: root.name.clone(), id: row.id, attributes: IndexMap::new() };
        Self::project_all(root, "", row, &mut entity);
        for (prefix, attribute) in attributes {
            let key = attribute.alias.clone().unwrap_or_else(|| format!("{}{}", prefix, attribute.name));
            entity.insert(&key, row.get(&format!("{}{}", prefix, attribute.name)).clone());
        }
        entity
    }

    fn project_all(entity: &FetchEntity, prefix: &str, row: &Joined, out: &mut Entity) {
        if entity.all_attributes {
            for (key, value) in &row.values {
                let Some(rest) = key.strip_prefix(prefix) else { continue };
                if !rest.contains('.') {
                    out.insert(key, value.clone());
                }
            }
        }
        for link in &entity.links {
            Self::project_all(&link.entity, &prefix_for(link), row, out);
        }
    }

    fn aggregate(
        &self,
        logical_name: &str,
        rows: Vec<Joined>,
        attributes: &[(String, &FetchAttribute)],
    ) -> Result<Vec<Entity>, ClientError> {
        let registry = AggregateRegistry::default_aggregate_registry();
        let groups: Vec<&(String, &FetchAttribute)> = attributes.iter().filter(|(_, a)| a.group_by).collect();
        let aggregates: Vec<&(String, &FetchAttribute)> = attributes.iter().filter(|(_, a)| a.aggregate.is_some()).collect();
        let output = |prefix: &str, a: &FetchAttribute| a.alias.clone().unwrap_or_else(|| format!("{}{}", prefix, a.name));

        let new_accumulators = || -> Result<Vec<_>, ClientError> {
            aggregates
                .iter()
                .map(|(_, a)| {
                    let name = match a.aggregate {
                        Some(AggregateType::Count | AggregateType::CountColumn) | None => "count",
                        Some(other) => other.as_str(),
                    };
                    registry
                        .get(name)
                        .map(|i| i.create_accumulator())
                        .ok_or_else(|| ClientError::Fault(format!("Unknown aggregate {}", name)))
                })
                .collect()
        };

        let mut order = vec![];
        let mut entries: HashMap<String, (Vec<Value>, Vec<_>, Vec<HashSet<String>>)> = HashMap::new();
        for row in &rows {
            let visible: Vec<Value> = groups.iter().map(|(p, a)| row.get(&format!("{}{}", p, a.name)).clone()).collect();
            let key = serde_json::Value::Array(visible.iter().map(|v| v.collation_key().to_json()).collect()).to_string();
            if !entries.contains_key(&key) {
                order.push(key.clone());
                entries.insert(key.clone(), (visible, new_accumulators()?, vec![HashSet::new(); aggregates.len()]));
            }
            let Some((_, accumulators, distinct)) = entries.get_mut(&key) else { continue };

            for (i, (prefix, a)) in aggregates.iter().enumerate() {
                let args = match a.aggregate {
                    Some(AggregateType::Count) => vec![],
                    _ => vec![row.get(&format!("{}{}", prefix, a.name)).clone()],
                };
                if a.distinct {
                    let seen = args.iter().map(|v| v.collation_key().to_json()).collect::<Vec<_>>();
                    if !distinct[i].insert(serde_json::Value::Array(seen).to_string()) {
                        continue;
                    }
                }
                accumulators[i].update(&args).map_err(|e| ClientError::Fault(e.to_string()))?;
            }
        }

        if groups.is_empty() && entries.is_empty() {
            order.push(String::new());
            entries.insert(String::new(), (vec![], new_accumulators()?, vec![]));
        }

        let mut out = vec![];
        for key in order {
            let Some((values, accumulators, _)) = entries.remove(&key) else { continue };
            let mut entity = Entity::new(logical_name);
            for ((prefix, a), value) in groups.iter().zip(values) {
                entity.insert(&output(prefix.as_str(), *a), value);
            }
            for ((prefix, a), accumulator) in aggregates.iter().zip(accumulators.iter()) {
                entity.insert(&output(prefix.as_str(), *a), accumulator.finalize());
            }
            out.push(entity);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use uuid::Uuid;

    use crate::{
        client::{ClientError, Entity, EntityReference, Value},
        fetch::{
            AggregateType, ConditionOperator, FetchAttribute, FetchCondition, FetchEntity, FetchEvaluator, FetchFilter,
            FetchLinkEntity, FetchOrder, FetchXml, FilterItem, FilterType, LinkType,
        },
    };

    fn tables() -> (HashMap<String, Vec<Entity>>, Uuid) {
        let data8 = Uuid::new_v4();
        let other = Uuid::new_v4();
        let accounts = vec![
            Entity::with_id("account", data8).set("accountid", data8).set("name", "Data8"),
            Entity::with_id("account", other).set("accountid", other).set("name", "Other"),
        ];
        let contact = |first: &str, last: &str, parent: Option<Uuid>, created: &str| {
            let id = Uuid::new_v4();
            let mut e = Entity::with_id("contact", id)
                .set("contactid", id)
                .set("firstname", first)
                .set("lastname", last)
                .set("createdon", Value::parse_datetime(created).unwrap());
            if let Some(p) = parent {
                e.insert("parentcustomerid", Value::EntityReference(EntityReference::new("account", p)));
            }
            e
        };
        let contacts = vec![
            contact("Mark", "Carrington", Some(data8), "2020-01-01 00:30"),
            contact("Joe", "Doe", Some(data8), "2020-02-01"),
            contact("Jane", "Doe", None, "2020-03-01"),
        ];
        (HashMap::from([("account".to_string(), accounts), ("contact".to_string(), contacts)]), data8)
    }

    fn condition(attribute: &str, op: ConditionOperator, value: &str) -> FilterItem {
        FilterItem::Condition(FetchCondition::new(attribute, op, Some(value.to_string())))
    }

    #[test]
    fn filters_and_orders() {
        let (tables, _) = tables();
        let mut fetch = FetchXml::new("contact");
        fetch.entity.attributes.push(FetchAttribute::new("firstname"));
        fetch.entity.add_filter(FetchFilter::new(FilterType::And, vec![condition("lastname", ConditionOperator::Equal, "doe")]));
        fetch.entity.orders.push(FetchOrder::attribute("firstname", false));

        let result = FetchEvaluator::new(&tables).execute(&fetch).unwrap();
        let names: Vec<_> = result.entities.iter().map(|e| e.get("firstname").to_string()).collect();
        assert_eq!(names, vec!["Jane", "Joe"]);
        assert!(!result.more_records);
    }

    #[test]
    fn inner_and_outer_links() {
        let (tables, _) = tables();
        let mut fetch = FetchXml::new("contact");
        fetch.entity.attributes.push(FetchAttribute::new("firstname"));
        let mut account = FetchEntity::new("account");
        account.attributes.push(FetchAttribute::new("name"));
        fetch.entity.links.push(FetchLinkEntity {
            from: "accountid".into(),
            to: "parentcustomerid".into(),
            alias: "a".into(),
            link_type: LinkType::Inner,
            entity: account,
        });

        let inner = FetchEvaluator::new(&tables).execute(&fetch).unwrap();
        assert_eq!(inner.entities.len(), 2);
        assert_eq!(inner.entities[0].get("a.name"), &Value::from("Data8"));

        fetch.entity.links[0].link_type = LinkType::Outer;
        let outer = FetchEvaluator::new(&tables).execute(&fetch).unwrap();
        assert_eq!(outer.entities.len(), 3);
        assert!(outer.entities[2].get("a.name").is_null());
    }

    #[test]
    fn link_filters_apply_before_outer_join() {
        let (tables, _) = tables();
        let mut fetch = FetchXml::new("contact");
        let mut account = FetchEntity::new("account");
        account.add_filter(FetchFilter::new(FilterType::And, vec![condition("name", ConditionOperator::Equal, "nothing")]));
        fetch.entity.links.push(FetchLinkEntity {
            from: "accountid".into(),
            to: "parentcustomerid".into(),
            alias: "a".into(),
            link_type: LinkType::Outer,
            entity: account,
        });
        assert_eq!(FetchEvaluator::new(&tables).execute(&fetch).unwrap().entities.len(), 3);
    }

    #[test]
    fn aggregates_group_case_insensitively() {
        let (tables, _) = tables();
        let mut fetch = FetchXml::new("contact");
        fetch.aggregate = true;
        fetch.entity.attributes.push(FetchAttribute { group_by: true, ..FetchAttribute::aliased("lastname", "lastname") });
        fetch.entity.attributes.push(FetchAttribute {
            aggregate: Some(AggregateType::Count),
            ..FetchAttribute::aliased("contactid", "total")
        });
        fetch.entity.orders.push(FetchOrder::alias("total", true));

        let result = FetchEvaluator::new(&tables).execute(&fetch).unwrap();
        assert_eq!(result.entities[0].get("lastname"), &Value::from("Doe"));
        assert_eq!(result.entities[0].get("total"), &Value::Int(2));

        let limited = FetchEvaluator::new(&tables).with_aggregate_limit(Some(2)).execute(&fetch);
        assert_eq!(limited.unwrap_err(), ClientError::AggregateQueryRecordLimit);
    }

    #[test]
    fn paging() {
        let (tables, _) = tables();
        let mut fetch = FetchXml::new("contact");
        fetch.entity.orders.push(FetchOrder::attribute("createdon", false));
        let first = FetchEvaluator::new(&tables).with_page_size(2).execute(&fetch).unwrap();
        assert_eq!(first.entities.len(), 2);
        assert!(first.more_records);

        fetch.page = Some(2);
        let second = FetchEvaluator::new(&tables).with_page_size(2).execute(&fetch).unwrap();
        assert_eq!(second.entities.len(), 1);
        assert!(!second.more_records);

        fetch.page = None;
        fetch.top = Some(1);
        assert_eq!(FetchEvaluator::new(&tables).execute(&fetch).unwrap().entities.len(), 1);
    }

    #[test]
    fn relative_date_operators() {
        let (tables, _) = tables();
        let mut fetch = FetchXml::new("contact");
        fetch.entity.add_filter(FetchFilter::new(FilterType::Or, vec![
            condition("createdon", ConditionOperator::LastXDays, "10"),
            FilterItem::Condition(FetchCondition::new("createdon", ConditionOperator::Today, None)),
        ]));
        fetch.entity.attributes.push(FetchAttribute::new("firstname"));
        let evaluator = FetchEvaluator::new(&tables).with_now(Value::parse_datetime("2020-02-05 12:00").unwrap());
        let result = evaluator.execute(&fetch).unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].get("firstname"), &Value::from("Joe"));
    }

    #[test]
    fn relative_dates_out_of_range_fail() {
        let (tables, _) = tables();
        let evaluator = FetchEvaluator::new(&tables).with_now(Value::parse_datetime("2020-02-05 12:00").unwrap());
        let cases = [
            (ConditionOperator::LastXDays, "99999999"),
            (ConditionOperator::NextXYears, "9223372036854775807"),
            (ConditionOperator::OlderThanXMonths, "4294967297"),
            (ConditionOperator::LastXHours, "-9223372036854775808"),
        ];
        for (op, value) in cases {
            let mut fetch = FetchXml::new("contact");
            fetch.entity.add_filter(FetchFilter::new(FilterType::And, vec![condition("createdon", op, value)]));
            let err = evaluator.execute(&fetch).unwrap_err();
            assert!(matches!(err, ClientError::Fault(ref m) if m.contains("out of range")), "{:?}: {:?}", op, err);
        }
    }

    #[test]
    fn in_and_like_conditions() {
        let (tables, _) = tables();
        let mut fetch = FetchXml::new("contact");
        fetch.entity.all_attributes = true;
        fetch.entity.add_filter(FetchFilter::new(FilterType::And, vec![
            FilterItem::Condition(FetchCondition::multi("firstname", ConditionOperator::In, vec!["mark".into(), "joe".into()])),
            condition("lastname", ConditionOperator::NotLike, "D%"),
        ]));
        let result = FetchEvaluator::new(&tables).execute(&fetch).unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].get("firstname"), &Value::from("Mark"));
    }

    #[test]
    fn unknown_entities_fail() {
        let (tables, _) = tables();
        let fetch = FetchXml::new("lead");
        assert_eq!(
            FetchEvaluator::new(&tables).execute(&fetch).unwrap_err(),
            ClientError::UnknownEntity("lead".into())
        );
    }
}
