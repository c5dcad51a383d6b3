//! Query builder module

pub mod common;
pub mod condition;
pub mod delete;
pub mod insert;
pub mod record;
pub mod select;
pub mod update;

// Re-export types from submodules
pub use common::{
    count, lower, upper, Function, IntoSelections, JoinKind, QueryBuilder, Selection,
    SortDirection, Statement,
};
pub use condition::{IntoWhereTokens, Subquery, WhereToken};
pub use delete::DeleteBuilder;
pub use insert::{InsertBuilderComplete, InsertBuilderInitial, LinkBuilder};
pub use record::{IntoRecord, Record};
pub use select::SelectBuilder;
pub use update::UpdateBuilder;
