//! DELETE query builder module

use super::common::{Outcome, QueryBuilder, SqlWriter, Statement};
use super::condition::{Filter, IntoWhereTokens};
use crate::error::QueryError;
use crate::operator::Connective;
use crate::schema::{EntityDescriptor, EntityToken};
use crate::Database;

/// DELETE query builder
///
/// # Safety note
///
/// Rows are removed according to the where predicates only. A delete
/// finalized without any predicate is valid and removes **every row** of the
/// table; nothing guards against it.
#[derive(Debug, Clone)]
pub struct DeleteBuilder<'db> {
    db: &'db Database,
    entity: Option<&'db EntityDescriptor>,
    filter: Filter,
    outcome: Outcome,
}

impl<'db> DeleteBuilder<'db> {
    pub(crate) fn new(db: &'db Database, entity: EntityToken) -> Self {
        let entity = db.registry().entity(entity);
        let mut outcome = Outcome::default();
        if entity.is_none() {
            outcome.fail(QueryError::invalid_argument("entity is not mapped by this database"));
        }
        Self {
            db,
            entity,
            filter: Filter::default(),
            outcome,
        }
    }

    pub(crate) fn with_error(mut self, error: QueryError) -> Self {
        self.outcome.fail(error);
        self
    }

    fn table(&self) -> &'db str {
        self.entity.map(EntityDescriptor::table).unwrap_or_default()
    }

    pub fn where_<W>(mut self, tokens: W) -> Self
    where
        W: IntoWhereTokens,
    {
        if self.outcome.proceed() {
            let result = self.filter.extend(self.db.registry(), tokens);
            self.outcome.capture(result);
        }
        self
    }

    pub fn and_where<W>(self, tokens: W) -> Self
    where
        W: IntoWhereTokens,
    {
        self.where_with(Connective::And, tokens)
    }

    pub fn or_where<W>(self, tokens: W) -> Self
    where
        W: IntoWhereTokens,
    {
        self.where_with(Connective::Or, tokens)
    }

    fn where_with<W>(mut self, connective: Connective, tokens: W) -> Self
    where
        W: IntoWhereTokens,
    {
        if self.outcome.proceed() {
            let result = self
                .filter
                .extend_with(self.db.registry(), connective, tokens);
            self.outcome.capture(result);
        }
        self
    }
}

impl QueryBuilder for DeleteBuilder<'_> {
    fn database(&self) -> &Database {
        self.db
    }

    fn finalize(&mut self) -> Result<Statement, QueryError> {
        let checked = self.filter.check_table(self.table());
        self.outcome.capture(checked);
        self.outcome.finish()?;

        let mut writer = SqlWriter::new(self.db.dialect());
        writer.push("DELETE FROM ");
        writer.identifier(self.table());
        self.filter.render(&mut writer);
        Ok(writer.finish(Vec::new(), None))
    }
}
