//! Common types and traits shared across all query builders

use std::fmt;
use std::sync::Arc;

use crate::dialect::Dialect;
use crate::error::QueryError;
use crate::schema::{AttributeDescriptor, EntityToken, FieldToken};
use crate::{Database, Value};

/// Core trait for all query builders
pub trait QueryBuilder {
    /// Database the statement is built against
    fn database(&self) -> &Database;

    /// Render the statement. A builder finalizes once: later calls return the
    /// captured error again, or [`QueryError::AlreadyFinalized`].
    fn finalize(&mut self) -> Result<Statement, QueryError>;
}

/// Finalized SQL text with its positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub arguments: Vec<Value>,
    /// Names of the produced columns, in select order
    pub columns: Vec<String>,
    /// Generated key returned by an insert
    pub returning: Option<Arc<AttributeDescriptor>>,
}

/// What a select produces for one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Count,
    Upper,
    Lower,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Count => write!(f, "COUNT"),
            Function::Upper => write!(f, "UPPER"),
            Function::Lower => write!(f, "LOWER"),
        }
    }
}

/// One entry of a select list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Field(FieldToken),
    /// Every column of the entity
    Entity(EntityToken),
    Function(Function, FieldToken),
}

impl From<FieldToken> for Selection {
    fn from(token: FieldToken) -> Self {
        Selection::Field(token)
    }
}

impl From<EntityToken> for Selection {
    fn from(token: EntityToken) -> Self {
        Selection::Entity(token)
    }
}

/// `COUNT(field)`
pub fn count(field: FieldToken) -> Selection {
    Selection::Function(Function::Count, field)
}

/// `UPPER(field)`
pub fn upper(field: FieldToken) -> Selection {
    Selection::Function(Function::Upper, field)
}

/// `LOWER(field)`
pub fn lower(field: FieldToken) -> Selection {
    Selection::Function(Function::Lower, field)
}

/// Trait to convert various types into a select list
pub trait IntoSelections {
    fn into_selections(self) -> Vec<Selection>;
}

impl IntoSelections for Selection {
    fn into_selections(self) -> Vec<Selection> {
        vec![self]
    }
}

impl IntoSelections for FieldToken {
    fn into_selections(self) -> Vec<Selection> {
        vec![self.into()]
    }
}

impl IntoSelections for EntityToken {
    fn into_selections(self) -> Vec<Selection> {
        vec![self.into()]
    }
}

impl<T: Into<Selection>> IntoSelections for Vec<T> {
    fn into_selections(self) -> Vec<Selection> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Selection>, const N: usize> IntoSelections for [T; N] {
    fn into_selections(self) -> Vec<Selection> {
        self.into_iter().map(Into::into).collect()
    }
}

macro_rules! tuple_selections {
    ($($name:ident),+) => {
        impl<$($name: Into<Selection>),+> IntoSelections for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_selections(self) -> Vec<Selection> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_selections!(A, B);
tuple_selections!(A, B, C);
tuple_selections!(A, B, C, D);
tuple_selections!(A, B, C, D, E);
tuple_selections!(A, B, C, D, E, F);

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "JOIN"),
            JoinKind::Left => write!(f, "LEFT JOIN"),
            JoinKind::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// Sort direction for ORDER BY clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// First captured error and the finalized flag of a builder
#[derive(Debug, Clone, Default)]
pub(crate) struct Outcome {
    error: Option<QueryError>,
    finalized: bool,
}

impl Outcome {
    /// Record an error; the first one wins
    pub(crate) fn fail(&mut self, error: QueryError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Whether a mutating call may run. Mutating a finalized builder is an error.
    pub(crate) fn proceed(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        if self.finalized {
            self.fail(QueryError::AlreadyFinalized);
            return false;
        }
        true
    }

    pub(crate) fn capture<T>(&mut self, result: Result<T, QueryError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.fail(error);
                None
            }
        }
    }

    pub(crate) fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Gate for `finalize`: the captured error, or the single permitted pass
    pub(crate) fn finish(&mut self) -> Result<(), QueryError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.finalized {
            return Err(QueryError::AlreadyFinalized);
        }
        self.finalized = true;
        Ok(())
    }
}

/// SQL text under construction; placeholders are numbered by argument count
pub(crate) struct SqlWriter<'a> {
    dialect: &'a dyn Dialect,
    sql: String,
    arguments: Vec<Value>,
}

impl<'a> SqlWriter<'a> {
    pub(crate) fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            arguments: Vec::new(),
        }
    }

    pub(crate) fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Append the next placeholder and its argument
    pub(crate) fn bind(&mut self, value: Value) {
        self.arguments.push(value);
        let placeholder = self.dialect.placeholder(self.arguments.len());
        self.sql.push_str(&placeholder);
    }

    pub(crate) fn identifier(&mut self, name: &str) {
        let quoted = self.dialect.quote_identifier(name);
        self.sql.push_str(&quoted);
    }

    /// Qualified `table.column` reference
    pub(crate) fn column(&mut self, attribute: &AttributeDescriptor) {
        let qualified = self.dialect.qualify(attribute.table(), attribute.column());
        self.sql.push_str(&qualified);
    }

    pub(crate) fn finish(
        mut self,
        columns: Vec<String>,
        returning: Option<Arc<AttributeDescriptor>>,
    ) -> Statement {
        self.sql.push(';');
        Statement {
            sql: self.sql,
            arguments: self.arguments,
            columns,
            returning,
        }
    }
}
