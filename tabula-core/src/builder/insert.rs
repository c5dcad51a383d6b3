//! INSERT query builder implementations

use std::sync::Arc;

use super::common::{Outcome, QueryBuilder, SqlWriter, Statement};
use super::record::{coerce, IntoRecord, Record};
use crate::error::QueryError;
use crate::schema::{AttributeDescriptor, EntityDescriptor, EntityToken, RelationshipDescriptor};
use crate::{Database, Value};

/// INSERT query builder in initial state (before values are given)
#[derive(Debug, Clone)]
pub struct InsertBuilderInitial<'db> {
    db: &'db Database,
    entity: Result<&'db EntityDescriptor, QueryError>,
}

/// INSERT query builder in complete state (after values are given)
#[derive(Debug, Clone)]
pub struct InsertBuilderComplete<'db> {
    db: &'db Database,
    table: String,
    columns: Vec<Arc<AttributeDescriptor>>,
    rows: Vec<Vec<Value>>,
    returning: Option<Arc<AttributeDescriptor>>,
    outcome: Outcome,
}

impl<'db> InsertBuilderInitial<'db> {
    pub(crate) fn new(db: &'db Database, entity: EntityToken) -> Self {
        let entity = db
            .registry()
            .entity(entity)
            .ok_or_else(|| QueryError::invalid_argument("entity is not mapped by this database"));
        Self { db, entity }
    }

    /// Insert a single record
    ///
    /// Every column except an auto-increment key is written; fields missing
    /// from the record are written as NULL.
    pub fn value<R>(self, record: R) -> InsertBuilderComplete<'db>
    where
        R: IntoRecord,
    {
        self.values(std::iter::once(record))
    }

    /// Insert several records in one statement; placeholders continue across rows
    pub fn values<I>(self, records: I) -> InsertBuilderComplete<'db>
    where
        I: IntoIterator,
        I::Item: IntoRecord,
    {
        let mut builder = InsertBuilderComplete {
            db: self.db,
            table: String::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            returning: None,
            outcome: Outcome::default(),
        };

        let entity = match self.entity {
            Ok(entity) => entity,
            Err(error) => {
                builder.outcome.fail(error);
                return builder;
            }
        };
        builder.table = entity.table().to_string();
        builder.columns = entity.insert_attributes().cloned().collect();
        builder.returning = entity
            .generated_key()
            .filter(|key| self.db.dialect().returning(key.column()).is_some())
            .map(|key| Arc::clone(key.attribute()));

        for record in records {
            let row = record.into_record().map(|record| row(&builder.columns, record));
            match builder.outcome.capture(row) {
                Some(row) => builder.rows.push(row),
                None => return builder,
            }
        }
        if builder.rows.is_empty() {
            builder.outcome.fail(QueryError::EmptyBatch);
        }
        builder
    }
}

fn row(columns: &[Arc<AttributeDescriptor>], mut record: Record) -> Vec<Value> {
    columns
        .iter()
        .map(|column| {
            let value = record.remove(column.field()).unwrap_or(Value::Null);
            coerce(value, column.data_type())
        })
        .collect()
}

fn render_insert(writer: &mut SqlWriter<'_>, table: &str, columns: &[&str], rows: &[Vec<Value>]) {
    writer.push("INSERT INTO ");
    writer.identifier(table);
    writer.push(" (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            writer.push(", ");
        }
        writer.identifier(column);
    }
    writer.push(") VALUES ");
    for (r, row) in rows.iter().enumerate() {
        if r > 0 {
            writer.push(", ");
        }
        writer.push("(");
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                writer.push(", ");
            }
            writer.bind(value.clone());
        }
        writer.push(")");
    }
}

impl InsertBuilderComplete<'_> {
    /// Key returned by the statement, when the entity has a generated key
    /// and the dialect supports `RETURNING`
    pub fn returning(&self) -> Option<&Arc<AttributeDescriptor>> {
        self.returning.as_ref()
    }
}

impl QueryBuilder for InsertBuilderComplete<'_> {
    fn database(&self) -> &Database {
        self.db
    }

    fn finalize(&mut self) -> Result<Statement, QueryError> {
        self.outcome.finish()?;

        let dialect = self.db.dialect();
        let mut writer = SqlWriter::new(dialect);
        let columns: Vec<&str> = self.columns.iter().map(|c| c.column()).collect();
        render_insert(&mut writer, &self.table, &columns, &self.rows);

        let mut names = Vec::new();
        if let Some(key) = &self.returning {
            if let Some(clause) = dialect.returning(key.column()) {
                writer.push(&clause);
                names.push(key.field().to_string());
            }
        }
        Ok(writer.finish(names, self.returning.clone()))
    }
}

/// INSERT into the join table of a many-to-many relationship
#[derive(Debug, Clone)]
pub struct LinkBuilder<'db> {
    db: &'db Database,
    table: String,
    columns: [String; 2],
    rows: Vec<Vec<Value>>,
    outcome: Outcome,
}

impl<'db> LinkBuilder<'db> {
    pub(crate) fn new(db: &'db Database, left: EntityToken, right: EntityToken) -> Self {
        let mut builder = Self {
            db,
            table: String::new(),
            columns: [String::new(), String::new()],
            rows: Vec::new(),
            outcome: Outcome::default(),
        };
        let target = resolve_link(db, left, right);
        if let Some((table, columns)) = builder.outcome.capture(target) {
            builder.table = table;
            builder.columns = columns;
        }
        builder
    }

    /// Link a left key to a right key
    pub fn pair(mut self, left: impl Into<Value>, right: impl Into<Value>) -> Self {
        if self.outcome.proceed() {
            self.rows.push(vec![left.into(), right.into()]);
        }
        self
    }

    pub fn pairs<I, L, R>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<Value>,
        R: Into<Value>,
    {
        pairs
            .into_iter()
            .fold(self, |builder, (left, right)| builder.pair(left, right))
    }
}

/// Join table and its `[left, right]` columns
fn resolve_link(
    db: &Database,
    left: EntityToken,
    right: EntityToken,
) -> Result<(String, [String; 2]), QueryError> {
    let registry = db.registry();
    let unmapped = || QueryError::invalid_argument("entity is not mapped by this database");
    let left = registry.entity(left).ok_or_else(unmapped)?;
    let right = registry.entity(right).ok_or_else(unmapped)?;

    let not_many_to_many = || QueryError::NotManyToMany {
        left: left.table().to_string(),
        right: right.table().to_string(),
    };
    match left.relationship(right.table()) {
        Some(RelationshipDescriptor::ManyToMany(join)) => Ok((
            join.table.clone(),
            [join.owner_column.clone(), join.target_column.clone()],
        )),
        Some(_) => Err(not_many_to_many()),
        None => match right.relationship(left.table()) {
            Some(RelationshipDescriptor::ManyToMany(join)) => Ok((
                join.table.clone(),
                [join.target_column.clone(), join.owner_column.clone()],
            )),
            Some(_) => Err(not_many_to_many()),
            None => Err(QueryError::missing_relationship(left.table(), right.table())),
        },
    }
}

impl QueryBuilder for LinkBuilder<'_> {
    fn database(&self) -> &Database {
        self.db
    }

    fn finalize(&mut self) -> Result<Statement, QueryError> {
        if self.rows.is_empty() {
            self.outcome.fail(QueryError::EmptyBatch);
        }
        self.outcome.finish()?;

        let mut writer = SqlWriter::new(self.db.dialect());
        let columns = [self.columns[0].as_str(), self.columns[1].as_str()];
        render_insert(&mut writer, &self.table, &columns, &self.rows);
        Ok(writer.finish(Vec::new(), None))
    }
}
