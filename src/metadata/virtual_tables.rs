use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;

use crate::metadata::{AttributeMetadata, AttributeType, EntityMetadata};

/// Tables that expose schema information rather than data records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataTable {
    Entity,
    Attribute,
    GlobalOptionSet,
    LocalizedLabel,
}

impl MetadataTable {
    pub fn from_name(name: &str) -> Option<MetadataTable> {
        match name.to_ascii_lowercase().as_str() {
            "entity" => Some(MetadataTable::Entity),
            "attribute" => Some(MetadataTable::Attribute),
            "globaloptionset" => Some(MetadataTable::GlobalOptionSet),
            "localizedlabel" => Some(MetadataTable::LocalizedLabel),
            _ => None,
        }
    }

    pub fn logical_name(&self) -> &'static str {
        match self {
            MetadataTable::Entity => "entity",
            MetadataTable::Attribute => "attribute",
            MetadataTable::GlobalOptionSet => "globaloptionset",
            MetadataTable::LocalizedLabel => "localizedlabel",
        }
    }

    /// Entity and attribute tables come from entity metadata; the other two from option sets.
    pub fn is_option_set_table(&self) -> bool {
        matches!(self, MetadataTable::GlobalOptionSet | MetadataTable::LocalizedLabel)
    }

    pub fn metadata(&self) -> Arc<EntityMetadata> {
        VIRTUAL_METADATA[self].clone()
    }
}

fn table(name: &str, id: &str, columns: &[(&str, AttributeType)]) -> Arc<EntityMetadata> {
    let mut metadata = EntityMetadata::new(name, id);
    for (column, attribute_type) in columns {
        metadata = metadata.with_attribute(AttributeMetadata::new(column, *attribute_type));
    }
    Arc::new(metadata)
}

static VIRTUAL_METADATA: Lazy<HashMap<MetadataTable, Arc<EntityMetadata>>> = Lazy::new(|| {
    use AttributeType::*;
    HashMap::from([
        (MetadataTable::Entity, table("entity", "metadataid", &[
            ("logicalname", String),
            ("displayname", String),
            ("objecttypecode", Integer),
            ("primaryidattribute", String),
            ("primarynameattribute", String),
        ])),
        (MetadataTable::Attribute, table("attribute", "metadataid", &[
            ("logicalname", String),
            ("entitylogicalname", String),
            ("attributetype", String),
            ("attributeof", String),
            ("displayname", String),
        ])),
        (MetadataTable::GlobalOptionSet, table("globaloptionset", "metadataid", &[
            ("name", String),
            ("displayname", String),
            ("displaynameid", Uniqueidentifier),
            ("isglobal", Boolean),
        ])),
        (MetadataTable::LocalizedLabel, table("localizedlabel", "localizedlabelid", &[
            ("labelid", Uniqueidentifier),
            ("label", String),
            ("languagecode", Integer),
        ])),
    ])
});
