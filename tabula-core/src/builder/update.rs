//! UPDATE query builder module

use std::sync::Arc;

use super::common::{Outcome, QueryBuilder, SqlWriter, Statement};
use super::condition::{Filter, IntoWhereTokens};
use super::record::{coerce, IntoRecord};
use crate::error::QueryError;
use crate::operator::Connective;
use crate::schema::{AttributeDescriptor, EntityDescriptor, EntityToken, FieldToken};
use crate::{Database, Value};

/// UPDATE query builder
///
/// Columns are only written when set explicitly; finalizing without any set
/// operation is an error.
#[derive(Debug, Clone)]
pub struct UpdateBuilder<'db> {
    db: &'db Database,
    entity: Option<&'db EntityDescriptor>,
    sets: Vec<(Arc<AttributeDescriptor>, Value)>,
    filter: Filter,
    outcome: Outcome,
}

impl<'db> UpdateBuilder<'db> {
    pub(crate) fn new(db: &'db Database, entity: EntityToken) -> Self {
        let mut builder = Self {
            db,
            entity: None,
            sets: Vec::new(),
            filter: Filter::default(),
            outcome: Outcome::default(),
        };
        builder.entity = db.registry().entity(entity);
        if builder.entity.is_none() {
            builder
                .outcome
                .fail(QueryError::invalid_argument("entity is not mapped by this database"));
        }
        builder
    }

    pub(crate) fn with_error(mut self, error: QueryError) -> Self {
        self.outcome.fail(error);
        self
    }

    fn table(&self) -> &'db str {
        self.entity.map(EntityDescriptor::table).unwrap_or_default()
    }

    /// Set one column
    pub fn set(mut self, field: FieldToken, value: impl Into<Value>) -> Self {
        if !self.outcome.proceed() {
            return self;
        }
        let Some(attribute) = self.db.registry().resolve(field) else {
            self.outcome
                .fail(QueryError::invalid_argument("field is not mapped by this database"));
            return self;
        };
        if attribute.table() != self.table() {
            self.outcome.fail(QueryError::MixedTables {
                expected: self.table().to_string(),
                found: attribute.table().to_string(),
            });
            return self;
        }
        let value = coerce(value.into(), attribute.data_type());
        self.sets.push((Arc::clone(attribute), value));
        self
    }

    /// Set every column named by the record; unknown names are ignored
    pub fn set_record<R>(mut self, record: R) -> Self
    where
        R: IntoRecord,
    {
        if !self.outcome.proceed() {
            return self;
        }
        let Some(entity) = self.entity else {
            return self;
        };
        if let Some(record) = self.outcome.capture(record.into_record()) {
            for (field, value) in record {
                if let Some(attribute) = entity.attribute(&field) {
                    let value = coerce(value, attribute.data_type());
                    self.sets.push((Arc::clone(attribute), value));
                }
            }
        }
        self
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

impl QueryBuilder for UpdateBuilder<'_> {
    fn database(&self) -> &Database {
        self.db
    }

    fn finalize(&mut self) -> Result<Statement, QueryError> {
        if self.sets.is_empty() {
            self.outcome.fail(QueryError::NoSetOperations);
        }
        let checked = self.filter.check_table(self.table());
        self.outcome.capture(checked);
        self.outcome.finish()?;

        let mut writer = SqlWriter::new(self.db.dialect());
        writer.push("UPDATE ");
        writer.identifier(self.table());
        writer.push(" SET ");
        for (i, (attribute, value)) in self.sets.iter().enumerate() {
            if i > 0 {
                writer.push(", ");
            }
            writer.identifier(attribute.column());
            writer.push(" = ");
            writer.bind(value.clone());
        }
        self.filter.render(&mut writer);
        Ok(writer.finish(Vec::new(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::condition::{equals, greater};
    use crate::fixtures::{self, Animal, Habitat};

    #[test]
    fn test_update_sets_then_filters() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();

        let statement = db
            .update(animal.token())
            .set(animal.field("name"), "Lion")
            .set(animal.field("id_habitat"), 4)
            .where_(equals(animal.field("id"), 9))
            .finalize()
            .unwrap();
        assert_eq!(
            statement.sql,
            r#"UPDATE "animal" SET "name" = $1, "id_habitat" = $2 WHERE "animal"."id" = $3;"#
        );
        assert_eq!(
            statement.arguments,
            vec![Value::from("Lion"), Value::I32(4), Value::I32(9)]
        );
    }

    #[test]
    fn test_update_without_sets() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let err = db
            .update(animal.token())
            .where_(greater(animal.field("id"), 1))
            .finalize()
            .unwrap_err();
        assert_eq!(err, QueryError::NoSetOperations);
    }

    #[test]
    fn test_update_rejects_other_tables() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let habitat = db.table::<Habitat>().unwrap();

        let err = db
            .update(animal.token())
            .set(habitat.field("name"), "Jungle")
            .finalize()
            .unwrap_err();
        assert!(matches!(err, QueryError::MixedTables { .. }));

        let err = db
            .update(animal.token())
            .set(animal.field("name"), "Lion")
            .where_(equals(habitat.field("id"), 1))
            .finalize()
            .unwrap_err();
        assert!(matches!(err, QueryError::MixedTables { .. }));
    }

    #[test]
    fn test_update_unmapped_field() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let err = db
            .update(animal.token())
            .set(FieldToken::dangling(), 1)
            .finalize()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));
    }

    #[test]
    fn test_set_record_skips_unknown_fields() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let statement = db
            .update(animal.token())
            .set_record(vec![("name", Value::from("Tiger")), ("legs", Value::I32(4))])
            .finalize()
            .unwrap();
        assert_eq!(statement.sql, r#"UPDATE "animal" SET "name" = $1;"#);
    }
}
