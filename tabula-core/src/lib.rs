//! Tabula Core - entity-to-table mapping and typed SQL statement building
//!
//! Entities are declared once and frozen into a [`SchemaRegistry`] that
//! infers primary keys and relationships from naming conventions. Statements
//! are built through field and entity tokens handed out by the registry, so a
//! misspelt column is caught before any SQL is produced.

pub mod builder;
pub mod config;
pub mod database;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod operator;
pub mod schema;
pub mod value;

#[cfg(test)]
mod fixtures;

// Re-export main types
pub use builder::condition;
pub use builder::{
    count, lower, upper, DeleteBuilder, InsertBuilderComplete, InsertBuilderInitial,
    IntoRecord, IntoSelections, JoinKind, LinkBuilder, QueryBuilder, Record, SelectBuilder,
    Selection, SortDirection, Statement, UpdateBuilder,
};
pub use config::Config;
pub use database::Database;
pub use dialect::{Dialect, MySql, Postgres, Sqlite};
pub use error::{Error, QueryError, Result, SchemaError};
pub use executor::{Connection, ExecutableModification, ExecutableQuery, Execution, IsolationLevel};
pub use operator::{Connective, Operator};
pub use schema::{
    DataType, Entity, EntityDecl, EntityDescriptor, EntityToken, FieldDecl, FieldToken, Schema,
    SchemaRegistry,
};
pub use value::Value;
