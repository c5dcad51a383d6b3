//! Where tokens: predicate constructors, resolution and rendering
//!
//! Predicates and connectives are kept in call order and rendered verbatim;
//! no parentheses are added. Two predicates written back to back are joined
//! with `AND`.

use std::sync::Arc;

use super::common::SqlWriter;
use super::select::{SelectBuilder, SelectPlan};
use crate::error::QueryError;
use crate::operator::{Connective, Operator};
use crate::schema::{AttributeDescriptor, FieldToken, SchemaRegistry};
use crate::Value;

/// A sub-select used by `IN (SELECT ...)`
#[derive(Debug, Clone)]
pub struct Subquery {
    plan: Result<SelectPlan, QueryError>,
}

impl From<SelectBuilder<'_>> for Subquery {
    fn from(builder: SelectBuilder<'_>) -> Self {
        Self {
            plan: builder.into_plan(),
        }
    }
}

/// One element of a where sequence
#[derive(Debug, Clone)]
pub enum WhereToken {
    Compare {
        field: FieldToken,
        operator: Operator,
        value: Value,
    },
    CompareFields {
        left: FieldToken,
        operator: Operator,
        right: FieldToken,
    },
    Null {
        field: FieldToken,
        negated: bool,
    },
    In {
        field: FieldToken,
        values: Vec<Value>,
        negated: bool,
    },
    InQuery {
        field: FieldToken,
        query: Subquery,
        negated: bool,
    },
    Connective(Connective),
}

fn compare(field: FieldToken, operator: Operator, value: impl Into<Value>) -> WhereToken {
    WhereToken::Compare {
        field,
        operator,
        value: value.into(),
    }
}

fn compare_fields(left: FieldToken, operator: Operator, right: FieldToken) -> WhereToken {
    WhereToken::CompareFields {
        left,
        operator,
        right,
    }
}

/// `field = value`; a null value renders `field IS NULL`
pub fn equals(field: FieldToken, value: impl Into<Value>) -> WhereToken {
    match value.into() {
        Value::Null => WhereToken::Null {
            field,
            negated: false,
        },
        value => compare(field, Operator::Equals, value),
    }
}

/// `field <> value`; a null value renders `field IS NOT NULL`
pub fn not_equals(field: FieldToken, value: impl Into<Value>) -> WhereToken {
    match value.into() {
        Value::Null => WhereToken::Null {
            field,
            negated: true,
        },
        value => compare(field, Operator::NotEquals, value),
    }
}

pub fn greater(field: FieldToken, value: impl Into<Value>) -> WhereToken {
    compare(field, Operator::Greater, value)
}

pub fn greater_equals(field: FieldToken, value: impl Into<Value>) -> WhereToken {
    compare(field, Operator::GreaterEquals, value)
}

pub fn less(field: FieldToken, value: impl Into<Value>) -> WhereToken {
    compare(field, Operator::Less, value)
}

pub fn less_equals(field: FieldToken, value: impl Into<Value>) -> WhereToken {
    compare(field, Operator::LessEquals, value)
}

pub fn like(field: FieldToken, pattern: impl Into<Value>) -> WhereToken {
    compare(field, Operator::Like, pattern)
}

pub fn not_like(field: FieldToken, pattern: impl Into<Value>) -> WhereToken {
    compare(field, Operator::NotLike, pattern)
}

pub fn is_null(field: FieldToken) -> WhereToken {
    WhereToken::Null {
        field,
        negated: false,
    }
}

pub fn is_not_null(field: FieldToken) -> WhereToken {
    WhereToken::Null {
        field,
        negated: true,
    }
}

/// `field IN (...)`, one placeholder per value
pub fn in_<V: Into<Value>>(field: FieldToken, values: impl IntoIterator<Item = V>) -> WhereToken {
    WhereToken::In {
        field,
        values: values.into_iter().map(Into::into).collect(),
        negated: false,
    }
}

pub fn not_in<V: Into<Value>>(field: FieldToken, values: impl IntoIterator<Item = V>) -> WhereToken {
    WhereToken::In {
        field,
        values: values.into_iter().map(Into::into).collect(),
        negated: true,
    }
}

/// `field IN (SELECT ...)`; the sub-select continues the outer placeholder numbering
pub fn in_query(field: FieldToken, query: impl Into<Subquery>) -> WhereToken {
    WhereToken::InQuery {
        field,
        query: query.into(),
        negated: false,
    }
}

pub fn not_in_query(field: FieldToken, query: impl Into<Subquery>) -> WhereToken {
    WhereToken::InQuery {
        field,
        query: query.into(),
        negated: true,
    }
}

/// `left = right` between two columns
pub fn equals_arg(left: FieldToken, right: FieldToken) -> WhereToken {
    compare_fields(left, Operator::Equals, right)
}

pub fn not_equals_arg(left: FieldToken, right: FieldToken) -> WhereToken {
    compare_fields(left, Operator::NotEquals, right)
}

pub fn greater_arg(left: FieldToken, right: FieldToken) -> WhereToken {
    compare_fields(left, Operator::Greater, right)
}

pub fn greater_equals_arg(left: FieldToken, right: FieldToken) -> WhereToken {
    compare_fields(left, Operator::GreaterEquals, right)
}

pub fn less_arg(left: FieldToken, right: FieldToken) -> WhereToken {
    compare_fields(left, Operator::Less, right)
}

pub fn less_equals_arg(left: FieldToken, right: FieldToken) -> WhereToken {
    compare_fields(left, Operator::LessEquals, right)
}

pub fn and() -> WhereToken {
    WhereToken::Connective(Connective::And)
}

pub fn or() -> WhereToken {
    WhereToken::Connective(Connective::Or)
}

/// Trait to convert various types into a where sequence
pub trait IntoWhereTokens {
    fn into_where_tokens(self) -> Vec<WhereToken>;
}

impl IntoWhereTokens for WhereToken {
    fn into_where_tokens(self) -> Vec<WhereToken> {
        vec![self]
    }
}

impl IntoWhereTokens for Vec<WhereToken> {
    fn into_where_tokens(self) -> Vec<WhereToken> {
        self
    }
}

impl<const N: usize> IntoWhereTokens for [WhereToken; N] {
    fn into_where_tokens(self) -> Vec<WhereToken> {
        self.into_iter().collect()
    }
}

/// A where token bound to its columns
#[derive(Debug, Clone)]
pub(crate) enum Predicate {
    Compare {
        column: Arc<AttributeDescriptor>,
        operator: Operator,
        value: Value,
    },
    CompareColumns {
        left: Arc<AttributeDescriptor>,
        operator: Operator,
        right: Arc<AttributeDescriptor>,
    },
    Null {
        column: Arc<AttributeDescriptor>,
        negated: bool,
    },
    In {
        column: Arc<AttributeDescriptor>,
        values: Vec<Value>,
        negated: bool,
    },
    InQuery {
        column: Arc<AttributeDescriptor>,
        plan: Box<SelectPlan>,
        negated: bool,
    },
    Connective(Connective),
}

impl Predicate {
    /// Columns the predicate reads at the top level
    fn columns(&self) -> Vec<&Arc<AttributeDescriptor>> {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::Null { column, .. }
            | Predicate::In { column, .. }
            | Predicate::InQuery { column, .. } => vec![column],
            Predicate::CompareColumns { left, right, .. } => vec![left, right],
            Predicate::Connective(_) => Vec::new(),
        }
    }

    fn render(&self, writer: &mut SqlWriter<'_>) {
        match self {
            Predicate::Compare {
                column,
                operator,
                value,
            } => {
                writer.column(column);
                writer.push(&format!(" {} ", operator));
                writer.bind(value.clone());
            }
            Predicate::CompareColumns {
                left,
                operator,
                right,
            } => {
                writer.column(left);
                writer.push(&format!(" {} ", operator));
                writer.column(right);
            }
            Predicate::Null { column, negated } => {
                let operator = if *negated { Operator::IsNot } else { Operator::Is };
                writer.column(column);
                writer.push(&format!(" {} NULL", operator));
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                let operator = if *negated { Operator::NotIn } else { Operator::In };
                writer.column(column);
                writer.push(&format!(" {} (", operator));
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        writer.push(", ");
                    }
                    writer.bind(value.clone());
                }
                writer.push(")");
            }
            Predicate::InQuery {
                column,
                plan,
                negated,
            } => {
                let operator = if *negated { Operator::NotIn } else { Operator::In };
                writer.column(column);
                writer.push(&format!(" {} (", operator));
                plan.render(writer);
                writer.push(")");
            }
            Predicate::Connective(connective) => {
                writer.push(&format!(" {} ", connective));
            }
        }
    }
}

fn resolve(registry: &SchemaRegistry, field: FieldToken) -> Result<Arc<AttributeDescriptor>, QueryError> {
    registry
        .resolve(field)
        .cloned()
        .ok_or_else(|| QueryError::invalid_predicate("field is not mapped by this database"))
}

impl WhereToken {
    fn bind(self, registry: &SchemaRegistry) -> Result<Predicate, QueryError> {
        Ok(match self {
            WhereToken::Compare {
                field,
                operator,
                value,
            } => Predicate::Compare {
                column: resolve(registry, field)?,
                operator,
                value,
            },
            WhereToken::CompareFields {
                left,
                operator,
                right,
            } => Predicate::CompareColumns {
                left: resolve(registry, left)?,
                operator,
                right: resolve(registry, right)?,
            },
            WhereToken::Null { field, negated } => Predicate::Null {
                column: resolve(registry, field)?,
                negated,
            },
            WhereToken::In {
                field,
                values,
                negated,
            } => {
                let column = resolve(registry, field)?;
                if values.is_empty() {
                    return Err(QueryError::invalid_predicate(format!(
                        "IN on '{}' needs at least one value",
                        column.qualified()
                    )));
                }
                Predicate::In {
                    column,
                    values,
                    negated,
                }
            }
            WhereToken::InQuery {
                field,
                query,
                negated,
            } => Predicate::InQuery {
                column: resolve(registry, field)?,
                plan: Box::new(query.plan?),
                negated,
            },
            WhereToken::Connective(connective) => Predicate::Connective(connective),
        })
    }
}

/// Accumulated where sequence of one statement
#[derive(Debug, Clone, Default)]
pub(crate) struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub(crate) fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Tokens are kept in call order; connectives are not checked or implied
    pub(crate) fn push(&mut self, registry: &SchemaRegistry, token: WhereToken) -> Result<(), QueryError> {
        let predicate = token.bind(registry)?;
        self.predicates.push(predicate);
        Ok(())
    }

    pub(crate) fn extend(
        &mut self,
        registry: &SchemaRegistry,
        tokens: impl IntoWhereTokens,
    ) -> Result<(), QueryError> {
        for token in tokens.into_where_tokens() {
            self.push(registry, token)?;
        }
        Ok(())
    }

    /// Append `connective` then the tokens; the connective is dropped on an empty filter
    pub(crate) fn extend_with(
        &mut self,
        registry: &SchemaRegistry,
        connective: Connective,
        tokens: impl IntoWhereTokens,
    ) -> Result<(), QueryError> {
        if !self.is_empty() {
            self.push(registry, WhereToken::Connective(connective))?;
        }
        self.extend(registry, tokens)
    }

    /// Every column must belong to `table`
    pub(crate) fn check_table(&self, table: &str) -> Result<(), QueryError> {
        for predicate in &self.predicates {
            for column in predicate.columns() {
                if column.table() != table {
                    return Err(QueryError::MixedTables {
                        expected: table.to_string(),
                        found: column.table().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// ` WHERE ...`, nothing when empty
    pub(crate) fn render(&self, writer: &mut SqlWriter<'_>) {
        if self.predicates.is_empty() {
            return;
        }
        writer.push(" WHERE ");
        for predicate in &self.predicates {
            predicate.render(writer);
        }
    }
}
