use crate::fetch::ConditionOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateType {
    Count,
    CountColumn,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateType::Count => "count",
            AggregateType::CountColumn => "countcolumn",
            AggregateType::Sum => "sum",
            AggregateType::Avg => "avg",
            AggregateType::Min => "min",
            AggregateType::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchAttribute {
    pub name: String,
    pub alias: Option<String>,
    pub aggregate: Option<AggregateType>,
    pub group_by: bool,
    pub distinct: bool,
}

impl FetchAttribute {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn aliased(name: &str, alias: &str) -> Self {
        Self { name: name.to_string(), alias: Some(alias.to_string()), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCondition {
    pub attribute: String,
    pub operator: ConditionOperator,
    pub value: Option<String>,
    pub value_of: Option<String>,
    pub values: Vec<String>,
}

impl FetchCondition {
    pub fn new(attribute: &str, operator: ConditionOperator, value: Option<String>) -> Self {
        Self { attribute: attribute.to_string(), operator, value, value_of: None, values: vec![] }
    }

    pub fn value_of(attribute: &str, operator: ConditionOperator, other: &str) -> Self {
        Self { attribute: attribute.to_string(), operator, value: None, value_of: Some(other.to_string()), values: vec![] }
    }

    pub fn multi(attribute: &str, operator: ConditionOperator, values: Vec<String>) -> Self {
        Self { attribute: attribute.to_string(), operator, value: None, value_of: None, values }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterItem {
    Condition(FetchCondition),
    Filter(FetchFilter),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchFilter {
    pub filter_type: FilterType,
    pub items: Vec<FilterItem>,
}

impl FetchFilter {
    pub fn new(filter_type: FilterType, items: Vec<FilterItem>) -> Self {
        Self { filter_type, items }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchOrder {
    pub attribute: Option<String>,
    pub alias: Option<String>,
    pub descending: bool,
}

impl FetchOrder {
    pub fn attribute(name: &str, descending: bool) -> Self {
        Self { attribute: Some(name.to_string()), alias: None, descending }
    }

    pub fn alias(alias: &str, descending: bool) -> Self {
        Self { attribute: None, alias: Some(alias.to_string()), descending }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkType {
    #[default]
    Inner,
    Outer,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Inner => "inner",
            LinkType::Outer => "outer",
        }
    }
}

/// The content of a scope: the root `<entity>` or the inside of a `<link-entity>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchEntity {
    pub name: String,
    pub all_attributes: bool,
    pub attributes: Vec<FetchAttribute>,
    pub links: Vec<FetchLinkEntity>,
    pub filters: Vec<FetchFilter>,
    pub orders: Vec<FetchOrder>,
}

impl FetchEntity {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    /// Adds a plain attribute unless the scope already returns it under its own name.
    pub fn ensure_attribute(&mut self, name: &str) {
        if self.all_attributes {
            return;
        }
        let present = self.attributes.iter().any(|a| a.name == name && a.alias.is_none() && a.aggregate.is_none());
        if !present {
            self.attributes.push(FetchAttribute::new(name));
        }
    }

    pub fn add_filter(&mut self, filter: FetchFilter) {
        self.filters.push(filter);
    }

    /// Scope reached by following link indexes from this entity.
    pub fn scope(&self, path: &[usize]) -> Option<&FetchEntity> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.links.get(*first)?.entity.scope(rest),
        }
    }

    pub fn scope_mut(&mut self, path: &[usize]) -> Option<&mut FetchEntity> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.links.get_mut(*first)?.entity.scope_mut(rest),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchLinkEntity {
    pub from: String,
    pub to: String,
    pub alias: String,
    pub link_type: LinkType,
    pub entity: FetchEntity,
}

/// The native query tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchXml {
    pub top: Option<u32>,
    pub page: Option<u32>,
    pub count: Option<u32>,
    pub paging_cookie: Option<String>,
    pub distinct: bool,
    pub aggregate: bool,
    pub no_lock: bool,
    pub entity: FetchEntity,
}

impl FetchXml {
    pub fn new(entity: &str) -> Self {
        Self { entity: FetchEntity::new(entity), ..Default::default() }
    }

    pub fn to_xml(&self) -> String {
        self.to_string()
    }
}
