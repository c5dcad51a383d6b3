//! SQL dialect adapters
//!
//! Builders never spell dialect-specific syntax themselves: placeholders,
//! identifier quoting, pagination and `RETURNING` all come from a [`Dialect`].

use std::fmt::Debug;

/// Database-specific SQL fragments
pub trait Dialect: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Positional placeholder for the 1-based argument `index`
    fn placeholder(&self, index: usize) -> String;

    fn quote_identifier(&self, name: &str) -> String;

    /// Pagination clause with a leading space; zero values are left out
    fn limit_offset(&self, limit: u64, offset: u64) -> String {
        let mut clause = String::new();
        if limit > 0 {
            clause.push_str(&format!(" LIMIT {}", limit));
        }
        if offset > 0 {
            clause.push_str(&format!(" OFFSET {}", offset));
        }
        clause
    }

    /// `RETURNING` clause for a generated column, when supported
    fn returning(&self, column: &str) -> Option<String>;

    /// `table.column`, both parts quoted
    fn qualify(&self, table: &str, column: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }
}

fn quote_with(name: &str, quote: char) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push(quote);
    for c in name.chars() {
        if c == quote {
            quoted.push(quote);
        }
        quoted.push(c);
    }
    quoted.push(quote);
    quoted
}

/// PostgreSQL: `$1`, `"ident"`, `RETURNING`
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    fn returning(&self, column: &str) -> Option<String> {
        Some(format!(" RETURNING {}", self.quote_identifier(column)))
    }
}

/// SQLite: `?1`, `"ident"`, `RETURNING`
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    fn returning(&self, column: &str) -> Option<String> {
        Some(format!(" RETURNING {}", self.quote_identifier(column)))
    }
}

/// MySQL: `?`, `` `ident` ``, no `RETURNING`
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '`')
    }

    // OFFSET needs a LIMIT in MySQL
    fn limit_offset(&self, limit: u64, offset: u64) -> String {
        match (limit, offset) {
            (0, 0) => String::new(),
            (limit, 0) => format!(" LIMIT {}", limit),
            (0, offset) => format!(" LIMIT {} OFFSET {}", u64::MAX, offset),
            (limit, offset) => format!(" LIMIT {} OFFSET {}", limit, offset),
        }
    }

    fn returning(&self, _column: &str) -> Option<String> {
        None
    }
}
