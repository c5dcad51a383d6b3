//! The database handle: a frozen registry bound to a dialect and config

use crate::builder::condition::{and, equals, WhereToken};
use crate::builder::{
    DeleteBuilder, InsertBuilderInitial, IntoRecord, IntoSelections, LinkBuilder, SelectBuilder,
    UpdateBuilder,
};
use crate::dialect::Dialect;
use crate::error::QueryError;
use crate::schema::{Entity, EntityDescriptor, EntityToken, Schema, SchemaRegistry};
use crate::{Config, Result, Value};

/// Entry point for building statements
///
/// Opening a database builds the [`SchemaRegistry`] once; afterwards the
/// handle is read-only and may be shared between threads. Builders borrow it.
///
/// ```ignore
/// let db = Database::open(schema, Postgres, Config::default())?;
/// let animal = db.table::<Animal>()?;
/// let statement = db
///     .select(animal.token())
///     .where_(equals(animal.field("name"), "Cat"))
///     .finalize()?;
/// ```
#[derive(Debug)]
pub struct Database {
    registry: SchemaRegistry,
    dialect: Box<dyn Dialect>,
    config: Config,
}

impl Database {
    pub fn open(schema: Schema, dialect: impl Dialect + 'static, config: Config) -> Result<Self> {
        let registry = SchemaRegistry::build(&schema)?;
        log::debug!(
            "opened {} database with {} entities",
            dialect.name(),
            registry.entities().len()
        );
        Ok(Self {
            registry,
            dialect: Box::new(dialect),
            config,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Descriptor of a typed entity
    pub fn table<T: Entity>(&self) -> Result<&EntityDescriptor> {
        self.entity(T::NAME)
    }

    /// Descriptor of an entity by name
    pub fn entity(&self, name: &str) -> Result<&EntityDescriptor> {
        self.registry.entity_by_name(name).ok_or_else(|| {
            QueryError::invalid_argument(format!("entity '{}' is not mapped", name)).into()
        })
    }

    pub fn select<S>(&self, selections: S) -> SelectBuilder<'_>
    where
        S: IntoSelections,
    {
        SelectBuilder::new(self, selections)
    }

    pub fn insert(&self, entity: EntityToken) -> InsertBuilderInitial<'_> {
        InsertBuilderInitial::new(self, entity)
    }

    /// Insert rows into the join table of a many-to-many relationship
    pub fn link(&self, left: EntityToken, right: EntityToken) -> LinkBuilder<'_> {
        LinkBuilder::new(self, left, right)
    }

    pub fn update(&self, entity: EntityToken) -> UpdateBuilder<'_> {
        UpdateBuilder::new(self, entity)
    }

    /// Start a DELETE. Without where predicates it removes every row.
    pub fn delete(&self, entity: EntityToken) -> DeleteBuilder<'_> {
        DeleteBuilder::new(self, entity)
    }

    /// Select every attribute of the row with the given primary-key values,
    /// in primary-key declaration order
    pub fn find<I>(&self, entity: EntityToken, keys: I) -> SelectBuilder<'_>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let builder = self.select(entity);
        let Some(descriptor) = self.registry.entity(entity) else {
            return builder;
        };
        match key_predicates(descriptor, keys) {
            Ok(predicates) => builder.where_(predicates),
            Err(error) => builder.with_error(error),
        }
    }

    /// Delete the row with the given primary-key values
    pub fn remove<I>(&self, entity: EntityToken, keys: I) -> DeleteBuilder<'_>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let builder = self.delete(entity);
        let Some(descriptor) = self.registry.entity(entity) else {
            return builder;
        };
        match key_predicates(descriptor, keys) {
            Ok(predicates) => builder.where_(predicates),
            Err(error) => builder.with_error(error),
        }
    }

    /// Update a row from a record: its primary-key values select the row and
    /// every other non-null attribute is written
    pub fn save<R>(&self, entity: EntityToken, record: R) -> UpdateBuilder<'_>
    where
        R: IntoRecord,
    {
        let builder = self.update(entity);
        let Some(descriptor) = self.registry.entity(entity) else {
            return builder;
        };
        let mut record = match record.into_record() {
            Ok(record) => record,
            Err(error) => return builder.with_error(error),
        };

        let mut predicates = Vec::with_capacity(descriptor.primary_keys().len() * 2);
        for key in descriptor.primary_keys() {
            match record.remove(key.field()) {
                Some(value) if !value.is_null() => {
                    if !predicates.is_empty() {
                        predicates.push(and());
                    }
                    predicates.push(equals(key.token(), value));
                }
                _ => {
                    return builder.with_error(QueryError::invalid_record(format!(
                        "{} record has no value for primary key '{}'",
                        descriptor.name(),
                        key.field()
                    )))
                }
            }
        }
        record.retain(|_, value| !value.is_null());
        builder.set_record(record).where_(predicates)
    }
}

fn key_predicates<I>(
    entity: &EntityDescriptor,
    keys: I,
) -> std::result::Result<Vec<WhereToken>, QueryError>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let keys: Vec<Value> = keys.into_iter().map(Into::into).collect();
    let primary_keys = entity.primary_keys();
    if keys.len() != primary_keys.len() {
        return Err(QueryError::invalid_argument(format!(
            "{} has {} primary key(s), got {} value(s)",
            entity.name(),
            primary_keys.len(),
            keys.len()
        )));
    }
    let mut predicates = Vec::with_capacity(keys.len() * 2);
    for (key, value) in primary_keys.iter().zip(keys) {
        if !predicates.is_empty() {
            predicates.push(and());
        }
        predicates.push(equals(key.token(), value));
    }
    Ok(predicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::QueryBuilder;
    use crate::error::{Error, SchemaError};
    use crate::fixtures::{self, Animal};
    use crate::schema::{DataType, EntityDecl, FieldDecl};
    use crate::{MySql, Postgres};
    use serde::Serialize;

    #[derive(Serialize)]
    struct AnimalRecord {
        id: i32,
        name: String,
        id_habitat: Option<i32>,
    }

    #[test]
    fn test_open_rejects_invalid_schema() {
        let schema = Schema::new().declare(
            EntityDecl::new("Orphan").field(FieldDecl::new("name", DataType::Text)),
        );
        let err = Database::open(schema, Postgres, Config::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_entity_lookup() {
        let db = fixtures::database();
        assert_eq!(db.table::<Animal>().unwrap().table(), "animal");
        assert_eq!(db.entity("AnimalFood").unwrap().table(), "animal_food");
        assert!(matches!(
            db.entity("Unicorn"),
            Err(Error::Query(QueryError::InvalidArgument { .. }))
        ));
        assert_eq!(db.dialect().name(), "postgres");
    }

    #[test]
    fn test_find_by_primary_key() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let statement = db.find(animal.token(), [7]).finalize().unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "animal"."id", "animal"."name", "animal"."id_habitat", "animal"."id_info" FROM "animal" WHERE "animal"."id" = $1;"#
        );
        assert_eq!(statement.arguments, vec![Value::I32(7)]);
    }

    #[test]
    fn test_find_by_composite_key() {
        let db = fixtures::database();
        let user_role = db.entity("UserRole").unwrap();
        let statement = db.find(user_role.token(), [3, 4]).finalize().unwrap();
        assert!(statement
            .sql
            .ends_with(r#"WHERE "user_role"."id_user" = $1 AND "user_role"."id_role" = $2;"#));

        let err = db.find(user_role.token(), [3]).finalize().unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));
    }

    #[test]
    fn test_remove_by_primary_key() {
        let db = Database::open(fixtures::zoo(), MySql, Config::default()).unwrap();
        let animal = db.table::<Animal>().unwrap();
        let statement = db.remove(animal.token(), [7]).finalize().unwrap();
        assert_eq!(statement.sql, "DELETE FROM `animal` WHERE `animal`.`id` = ?;");
    }

    #[test]
    fn test_save_writes_non_null_attributes() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let record = AnimalRecord {
            id: 3,
            name: "Cat".into(),
            id_habitat: None,
        };
        let statement = db.save(animal.token(), &record).finalize().unwrap();
        assert_eq!(
            statement.sql,
            r#"UPDATE "animal" SET "name" = $1 WHERE "animal"."id" = $2;"#
        );
        assert_eq!(statement.arguments, vec![Value::from("Cat"), Value::I32(3)]);
    }

    #[test]
    fn test_save_requires_primary_key() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let err = db
            .save(animal.token(), vec![("name", Value::from("Cat"))])
            .finalize()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidRecord { .. }));
    }
}
