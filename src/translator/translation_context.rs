use crate::{
    fetch::{FetchEntity, FetchXml},
    metadata::{ResolvedColumn, ScopeChain},
    parser::ast::{Column, Literal, ScalarExpr},
    translator::{TranslationError, TranslatorOptions},
    Error,
};

/// What one side of a comparison turned out to be once names were bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ResolvedColumn),
    Literal(Literal),
    Expression,
}

/// Tables in scope plus the native query being built for one statement.
pub struct TranslationContext<'a> {
    pub options: &'a TranslatorOptions,
    pub chain: ScopeChain,
    pub fetch: FetchXml,
}

impl<'a> TranslationContext<'a> {
    pub fn new(options: &'a TranslatorOptions, chain: ScopeChain, fetch: FetchXml) -> Self {
        Self { options, chain, fetch }
    }

    /// Binds a column; `None` when quoted identifiers are off and the name is really a
    /// double-quoted string.
    pub fn resolve(&self, column: &Column) -> Result<Option<ResolvedColumn>, Error> {
        match self.chain.resolve(column) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(Error::Translation(TranslationError::QuotedIdentifier { .. })) if !self.options.quoted_identifiers => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn operand(&self, expr: &ScalarExpr) -> Result<Operand, Error> {
        Ok(match expr {
            ScalarExpr::Column(c) => match self.resolve(c)? {
                Some(resolved) => Operand::Column(resolved),
                None => Operand::Literal(Literal::String(c.name.clone())),
            },
            ScalarExpr::Literal(l) => Operand::Literal(l.clone()),
            _ => Operand::Expression,
        })
    }

    pub fn entity(&self, scope: usize) -> Option<&FetchEntity> {
        self.fetch.entity.scope(&self.chain.get(scope).path)
    }

    pub fn entity_mut(&mut self, scope: usize) -> Result<&mut FetchEntity, Error> {
        let scope = self.chain.get(scope);
        let alias = scope.alias.clone();
        let path = scope.path.clone();
        self.fetch
            .entity
            .scope_mut(&path)
            .ok_or_else(|| TranslationError::InvalidColumn(alias).into())
    }

    /// Makes every column in `columns` part of the retrieved rows.
    pub fn ensure(&mut self, columns: &[ResolvedColumn]) -> Result<(), Error> {
        for column in columns {
            self.entity_mut(column.scope)?.ensure_attribute(&column.attribute);
        }
        Ok(())
    }

    pub fn row_key(&self, column: &ResolvedColumn) -> String {
        self.chain.row_key(column)
    }
}
