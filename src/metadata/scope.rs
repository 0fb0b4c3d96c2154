use std::sync::Arc;

use crate::{
    fetch::LinkType,
    metadata::{AttributeMetadata, EntityMetadata, ResolutionError},
    parser::ast::Column,
    translator::TranslationError,
    Error,
};

/// One table of the FROM clause and where it lives in the native query tree.
#[derive(Debug, Clone)]
pub struct TableScope {
    /// Name the rest of the query uses to refer to the table.
    pub alias: String,
    pub entity_name: String,
    pub metadata: Arc<EntityMetadata>,
    /// Link indexes from the root entity down to this scope; empty for the root.
    pub path: Vec<usize>,
    /// `None` for the root.
    pub link_type: Option<LinkType>,
}

impl TableScope {
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_outer(&self) -> bool {
        self.link_type == Some(LinkType::Outer)
    }
}

/// A column reference bound to a scope and a real attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedColumn {
    pub scope: usize,
    pub attribute: String,
}

/// Every table visible to a statement, root first, then link-entities in the order
/// they were joined.
#[derive(Debug, Clone, Default)]
pub struct ScopeChain {
    scopes: Vec<TableScope>,
}

impl ScopeChain {
    pub fn new(root: TableScope) -> Self {
        Self { scopes: vec![root] }
    }

    pub fn push(&mut self, scope: TableScope) -> Result<usize, Error> {
        if self.find_alias(&scope.alias).is_some() {
            return Err(TranslationError::DuplicateAlias(scope.alias).into());
        }
        self.scopes.push(scope);
        Ok(self.scopes.len() - 1)
    }

    pub fn root(&self) -> &TableScope {
        &self.scopes[0]
    }

    pub fn get(&self, index: usize) -> &TableScope {
        &self.scopes[index]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableScope> {
        self.scopes.iter()
    }

    pub fn find_alias(&self, alias: &str) -> Option<usize> {
        self.scopes.iter().position(|s| s.alias.eq_ignore_ascii_case(alias))
    }

    pub fn resolve(&self, column: &Column) -> Result<ResolvedColumn, Error> {
        if let Some(collection) = &column.collection {
            let scope = self.find_alias(collection)
                .ok_or_else(|| ResolutionError::UnknownAlias(collection.clone()))?;
            let attribute = self.attribute_in(scope, &column.name).ok_or_else(|| ResolutionError::UnknownAttribute {
                entity: self.scopes[scope].entity_name.clone(),
                attribute: column.name.clone(),
            })?;
            return Ok(ResolvedColumn { scope, attribute: attribute.logical_name.clone() });
        }

        let matches: Vec<(usize, &AttributeMetadata)> = self
            .scopes
            .iter()
            .enumerate()
            .filter_map(|(i, _)| self.attribute_in(i, &column.name).map(|a| (i, a)))
            .collect();

        match matches.as_slice() {
            [(scope, attribute)] => Ok(ResolvedColumn { scope: *scope, attribute: attribute.logical_name.clone() }),
            [] if column.quoted => Err(TranslationError::QuotedIdentifier { text: column.name.clone() }.into()),
            [] => Err(ResolutionError::UnknownAttribute {
                entity: self.root().entity_name.clone(),
                attribute: column.name.clone(),
            }
            .into()),
            _ => Err(TranslationError::AmbiguousColumn {
                name: column.name.clone(),
                matches: matches.iter().map(|(i, a)| format!("{}.{}", self.scopes[*i].alias, a.logical_name)).collect(),
            }
            .into()),
        }
    }

    pub fn attribute_in(&self, scope: usize, name: &str) -> Option<&AttributeMetadata> {
        self.scopes.get(scope)?.metadata.attribute(name)
    }

    pub fn attribute_of(&self, column: &ResolvedColumn) -> Option<&AttributeMetadata> {
        self.attribute_in(column.scope, &column.attribute)
    }

    /// Key of the column inside a retrieved row.
    pub fn row_key(&self, column: &ResolvedColumn) -> String {
        let scope = &self.scopes[column.scope];
        if scope.is_root() {
            column.attribute.clone()
        } else {
            format!("{}.{}", scope.alias, column.attribute)
        }
    }

    /// The column rewritten so that `Column::row_key` matches the retrieved row.
    pub fn qualified(&self, column: &ResolvedColumn) -> Column {
        let scope = &self.scopes[column.scope];
        if scope.is_root() {
            Column::name(&column.attribute)
        } else {
            Column::with_collection(&scope.alias, &column.attribute)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        fetch::LinkType,
        metadata::{AttributeMetadata, AttributeType, EntityMetadata, ResolutionError, ScopeChain, TableScope},
        parser::ast::Column,
        translator::TranslationError,
        Error,
    };

    fn chain() -> ScopeChain {
        let account = Arc::new(
            EntityMetadata::new("account", "accountid")
                .with_primary_name("name")
                .with_attribute(AttributeMetadata::lookup("primarycontactid", &["contact"])),
        );
        let contact = Arc::new(
            EntityMetadata::new("contact", "contactid")
                .with_attribute(AttributeMetadata::new("firstname", AttributeType::String))
                .with_attribute(AttributeMetadata::new("name", AttributeType::String)),
        );
        let mut chain = ScopeChain::new(TableScope {
            alias: "account".into(),
            entity_name: "account".into(),
            metadata: account,
            path: vec![],
            link_type: None,
        });
        chain
            .push(TableScope {
                alias: "c".into(),
                entity_name: "contact".into(),
                metadata: contact,
                path: vec![0],
                link_type: Some(LinkType::Inner),
            })
            .unwrap();
        chain
    }

    #[test]
    fn resolves_unqualified_and_qualified() {
        let chain = chain();
        let first = chain.resolve(&Column::name("FirstName")).unwrap();
        assert_eq!(first.scope, 1);
        assert_eq!(chain.row_key(&first), "c.firstname");

        let id = chain.resolve(&Column::with_collection("account", "accountid")).unwrap();
        assert_eq!(chain.row_key(&id), "accountid");
    }

    #[test]
    fn ambiguous_and_unknown() {
        let chain = chain();
        assert!(matches!(
            chain.resolve(&Column::name("name")),
            Err(Error::Translation(TranslationError::AmbiguousColumn { .. }))
        ));
        assert!(matches!(
            chain.resolve(&Column::with_collection("x", "name")),
            Err(Error::Resolution(ResolutionError::UnknownAlias(_)))
        ));
    }

    #[test]
    fn quoted_identifier_suggests_literal() {
        let chain = chain();
        let column = Column { collection: None, name: "mark".into(), quoted: true };
        let err = chain.resolve(&column).unwrap_err();
        assert!(err.to_string().contains("Did you mean 'mark'?"));
    }

    #[test]
    fn aliases_are_unique() {
        let mut chain = chain();
        let duplicate = chain.get(1).clone();
        assert!(matches!(chain.push(duplicate), Err(Error::Translation(TranslationError::DuplicateAlias(_)))));
    }
}
