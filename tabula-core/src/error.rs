//! Error types for Tabula

use thiserror::Error;

/// The main error type for Tabula operations
#[derive(Error, Debug)]
pub enum Error {
    /// Registry construction failed; the schema must not be used
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A statement could not be built
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A single-row fetch produced no rows
    #[error("not found any element on result set")]
    NotFound,

    /// Database connection or execution error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type for Tabula operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors raised while building the schema registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("entity '{entity}' has no primary key: declare an `id` field or mark a field as primary key")]
    MissingPrimaryKey { entity: String },

    #[error("field '{field}' on '{entity}' references table '{table}' but that entity is not declared")]
    UnresolvedTableOverride {
        entity: String,
        field: String,
        table: String,
    },

    #[error("entity '{entity}' has more than one relationship path to '{table}'")]
    AmbiguousRelationship { entity: String, table: String },

    #[error("field '{field}' on '{entity}' has entity type '{target}' which is not declared")]
    UnknownEntity {
        entity: String,
        field: String,
        target: String,
    },

    #[error("entity '{entity}' is declared more than once")]
    DuplicateEntity { entity: String },

    #[error("primary key of '{entity}' refers back to itself through entity-typed keys")]
    KeyCycle { entity: String },
}

/// Errors captured by a statement builder and surfaced when it is finalized
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// An entity or field token is not registered, or belongs to another registry
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A where token does not resolve to a mapped field
    #[error("invalid where operation: {message}")]
    InvalidPredicate { message: String },

    /// The order by target does not resolve to a mapped field
    #[error("invalid order by target")]
    InvalidOrderBy,

    #[error("tables '{left}' and '{right}' don't have any relationship")]
    MissingRelationship { left: String, right: String },

    #[error("tables '{left}' and '{right}' don't have a many to many relationship")]
    NotManyToMany { left: String, right: String },

    #[error("UPDATE requires at least one set operation")]
    NoSetOperations,

    #[error("can't insert an empty batch")]
    EmptyBatch,

    /// A record could not be turned into column values
    #[error("invalid record: {message}")]
    InvalidRecord { message: String },

    /// Fields from different tables were used where one table is required
    #[error("fields from '{expected}' and '{found}' can't be mixed in one statement")]
    MixedTables { expected: String, found: String },

    #[error("statement was already finalized")]
    AlreadyFinalized,
}

impl QueryError {
    /// Create a new invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new invalid predicate error
    pub fn invalid_predicate(message: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            message: message.into(),
        }
    }

    /// Create a new invalid record error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    pub fn missing_relationship(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::MissingRelationship {
            left: left.into(),
            right: right.into(),
        }
    }
}

impl SchemaError {
    pub fn missing_primary_key(entity: impl Into<String>) -> Self {
        Self::MissingPrimaryKey {
            entity: entity.into(),
        }
    }
}
