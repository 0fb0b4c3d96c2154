use uuid::Uuid;

use crate::fetch::ConditionOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    BigInt,
    Boolean,
    Customer,
    DateTime,
    Decimal,
    Double,
    EntityName,
    Integer,
    Lookup,
    Memo,
    Money,
    MultiSelectPicklist,
    Owner,
    Picklist,
    State,
    Status,
    String,
    Uniqueidentifier,
    Virtual,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::BigInt => "BigInt",
            AttributeType::Boolean => "Boolean",
            AttributeType::Customer => "Customer",
            AttributeType::DateTime => "DateTime",
            AttributeType::Decimal => "Decimal",
            AttributeType::Double => "Double",
            AttributeType::EntityName => "EntityName",
            AttributeType::Integer => "Integer",
            AttributeType::Lookup => "Lookup",
            AttributeType::Memo => "Memo",
            AttributeType::Money => "Money",
            AttributeType::MultiSelectPicklist => "MultiSelectPicklist",
            AttributeType::Owner => "Owner",
            AttributeType::Picklist => "Picklist",
            AttributeType::State => "State",
            AttributeType::Status => "Status",
            AttributeType::String => "String",
            AttributeType::Uniqueidentifier => "Uniqueidentifier",
            AttributeType::Virtual => "Virtual",
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, AttributeType::String | AttributeType::Memo | AttributeType::EntityName)
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, AttributeType::Lookup | AttributeType::Customer | AttributeType::Owner)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeType::BigInt | AttributeType::Decimal | AttributeType::Double
            | AttributeType::Integer | AttributeType::Money)
    }

    /// Condition operators the platform accepts for attributes of this type.
    pub fn supports(&self, op: ConditionOperator) -> bool {
        use ConditionOperator::*;
        match op {
            Equal | NotEqual | Null | NotNull | In | NotIn => *self != AttributeType::Virtual,
            LessThan | LessEqual | GreaterThan | GreaterEqual => {
                self.is_numeric() || self.is_string() || matches!(self, AttributeType::DateTime
                    | AttributeType::Picklist | AttributeType::State | AttributeType::Status)
            }
            Like | NotLike => self.is_string(),
            ContainValues | NotContainValues => *self == AttributeType::MultiSelectPicklist,
            Under | UnderOrEqual | Above | AboveOrEqual => self.is_lookup() || *self == AttributeType::Uniqueidentifier,
            EqualUserId | NotEqualUserId | EqualBusinessId => self.is_lookup() || *self == AttributeType::Uniqueidentifier,
            _ => *self == AttributeType::DateTime,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMetadata {
    pub logical_name: String,
    pub attribute_type: AttributeType,
    /// Entities a lookup can point at.
    pub targets: Vec<String>,
    pub attribute_of: Option<String>,
    pub display_name: Option<String>,
    pub metadata_id: Uuid,
}

impl AttributeMetadata {
    pub fn new(logical_name: &str, attribute_type: AttributeType) -> Self {
        Self {
            logical_name: logical_name.to_string(),
            attribute_type,
            targets: vec![],
            attribute_of: None,
            display_name: None,
            metadata_id: Uuid::new_v4(),
        }
    }

    pub fn lookup(logical_name: &str, targets: &[&str]) -> Self {
        let attribute_type = if targets.len() > 1 { AttributeType::Customer } else { AttributeType::Lookup };
        Self {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            ..Self::new(logical_name, attribute_type)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetadata {
    pub logical_name: String,
    pub primary_id_attribute: String,
    pub primary_name_attribute: Option<String>,
    pub display_name: Option<String>,
    pub object_type_code: Option<i32>,
    pub metadata_id: Uuid,
    pub attributes: Vec<AttributeMetadata>,
}

impl EntityMetadata {
    /// Creates the metadata with its primary key attribute already declared.
    pub fn new(logical_name: &str, primary_id_attribute: &str) -> Self {
        Self {
            logical_name: logical_name.to_string(),
            primary_id_attribute: primary_id_attribute.to_string(),
            primary_name_attribute: None,
            display_name: None,
            object_type_code: None,
            metadata_id: Uuid::new_v4(),
            attributes: vec![AttributeMetadata::new(primary_id_attribute, AttributeType::Uniqueidentifier)],
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeMetadata) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_primary_name(mut self, name: &str) -> Self {
        self.primary_name_attribute = Some(name.to_string());
        if self.attribute(name).is_none() {
            self.attributes.push(AttributeMetadata::new(name, AttributeType::String));
        }
        self
    }

    pub fn with_object_type_code(mut self, code: i32) -> Self {
        self.object_type_code = Some(code);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeMetadata> {
        self.attributes.iter().find(|a| a.logical_name.eq_ignore_ascii_case(name))
    }

    /// Attribute names in the order `SELECT *` returns them.
    pub fn sorted_attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .attributes
            .iter()
            .filter(|a| a.attribute_of.is_none() && a.attribute_type != AttributeType::Virtual)
            .map(|a| a.logical_name.clone())
            .collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedLabel {
    pub label: String,
    pub language_code: i32,
    pub metadata_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Label {
    pub localized_labels: Vec<LocalizedLabel>,
}

impl Label {
    pub fn new(labels: &[(&str, i32)]) -> Self {
        Self {
            localized_labels: labels
                .iter()
                .map(|(label, language_code)| LocalizedLabel {
                    label: label.to_string(),
                    language_code: *language_code,
                    metadata_id: Uuid::new_v4(),
                })
                .collect(),
        }
    }

    /// Label shown to a user of the given language, falling back to the first one.
    pub fn user_label(&self, language_code: i32) -> Option<&str> {
        self.localized_labels
            .iter()
            .find(|l| l.language_code == language_code)
            .or_else(|| self.localized_labels.first())
            .map(|l| l.label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionSetMetadata {
    pub name: String,
    pub is_global: bool,
    pub metadata_id: Uuid,
    pub display_name: Label,
}

impl OptionSetMetadata {
    pub fn new(name: &str, display_name: Label) -> Self {
        Self { name: name.to_string(), is_global: true, metadata_id: Uuid::new_v4(), display_name }
    }
}

#[cfg(test)]
mod tests {
    use crate::{fetch::ConditionOperator, metadata::{AttributeMetadata, AttributeType, EntityMetadata, Label}};

    #[test]
    fn star_order_is_alphabetical() {
        let account = EntityMetadata::new("account", "accountid")
            .with_primary_name("name")
            .with_attribute(AttributeMetadata::lookup("primarycontactid", &["contact"]))
            .with_attribute(AttributeMetadata::new("createdon", AttributeType::DateTime));
        assert_eq!(account.sorted_attribute_names(), vec!["accountid", "createdon", "name", "primarycontactid"]);
        assert!(account.attribute("NAME").is_some());
    }

    #[test]
    fn operator_support() {
        assert!(AttributeType::String.supports(ConditionOperator::Like));
        assert!(!AttributeType::Lookup.supports(ConditionOperator::Like));
        assert!(AttributeType::DateTime.supports(ConditionOperator::LastXDays));
        assert!(!AttributeType::String.supports(ConditionOperator::LastXDays));
    }

    #[test]
    fn user_label_falls_back() {
        let label = Label::new(&[("TestGlobalOptionSet", 1033), ("TranslatedDisplayName-Test", 9999)]);
        assert_eq!(label.user_label(9999), Some("TranslatedDisplayName-Test"));
        assert_eq!(label.user_label(1036), Some("TestGlobalOptionSet"));
    }
}
