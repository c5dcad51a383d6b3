//! SELECT query builder implementation

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::common::{
    Function, IntoSelections, JoinKind, Outcome, QueryBuilder, Selection, SortDirection,
    SqlWriter, Statement,
};
use super::condition::{Filter, IntoWhereTokens};
use crate::error::QueryError;
use crate::operator::Connective;
use crate::schema::{AttributeDescriptor, EntityToken, FieldToken, SchemaRegistry};
use crate::Database;

/// Position of a select builder in its call sequence; calls may not go back,
/// except that order by may follow paging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Selected,
    Joined,
    Filtered,
    Ordered,
    Paged,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Selected => write!(f, "select"),
            Stage::Joined => write!(f, "join"),
            Stage::Filtered => write!(f, "where"),
            Stage::Ordered => write!(f, "order by"),
            Stage::Paged => write!(f, "paging"),
        }
    }
}

/// A selected column, possibly wrapped in a function
#[derive(Debug, Clone)]
struct Column {
    function: Option<Function>,
    attribute: Arc<AttributeDescriptor>,
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    left: Arc<AttributeDescriptor>,
    right: Arc<AttributeDescriptor>,
}

/// Resolved content of a select, independent of the database handle
#[derive(Debug, Clone, Default)]
pub(crate) struct SelectPlan {
    columns: Vec<Column>,
    from: Vec<String>,
    joins: Vec<Join>,
    filter: Filter,
    order: Vec<(Arc<AttributeDescriptor>, SortDirection)>,
    limit: u64,
    offset: u64,
}

impl SelectPlan {
    /// Source tables: the explicit list, else the first selected column's table
    fn sources(&self) -> Vec<&str> {
        if !self.from.is_empty() {
            return self.from.iter().map(String::as_str).collect();
        }
        self.columns
            .first()
            .map(|c| vec![c.attribute.table()])
            .unwrap_or_default()
    }

    /// Output names; a name already taken is qualified with its table
    fn column_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.columns
            .iter()
            .map(|column| {
                let name = match column.function {
                    Some(Function::Count) => "count".to_string(),
                    _ => column.attribute.field().to_string(),
                };
                if seen.insert(name.clone()) {
                    name
                } else {
                    format!("{}.{}", column.attribute.table(), name)
                }
            })
            .collect()
    }

    /// Render without the closing `;`, continuing the writer's placeholders
    pub(crate) fn render(&self, writer: &mut SqlWriter<'_>) {
        writer.push("SELECT ");
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                writer.push(", ");
            }
            match column.function {
                Some(function) => {
                    writer.push(&format!("{}(", function));
                    writer.column(&column.attribute);
                    writer.push(")");
                }
                None => writer.column(&column.attribute),
            }
        }

        let sources = self.sources();
        writer.push(" FROM ");
        for (i, table) in sources.iter().enumerate() {
            if i > 0 {
                writer.push(", ");
            }
            writer.identifier(table);
        }

        // The right side's table is introduced unless already present, in
        // which case the left side's table is, even if it is present too.
        let mut tables: Vec<&str> = sources;
        for join in &self.joins {
            let table = if tables.contains(&join.right.table()) {
                join.left.table()
            } else {
                join.right.table()
            };
            tables.push(table);
            writer.push(&format!(" {} ", join.kind));
            writer.identifier(table);
            writer.push(" ON (");
            writer.column(&join.left);
            writer.push(" = ");
            writer.column(&join.right);
            writer.push(")");
        }

        self.filter.render(writer);

        if !self.order.is_empty() {
            writer.push(" ORDER BY ");
            for (i, (attribute, direction)) in self.order.iter().enumerate() {
                if i > 0 {
                    writer.push(", ");
                }
                writer.column(attribute);
                writer.push(&format!(" {}", direction));
            }
        }

        let paging = writer.dialect().limit_offset(self.limit, self.offset);
        writer.push(&paging);
    }
}

/// SELECT query builder
///
/// Calls follow `select → from → join* → where* → order by* → paging`. A
/// failing call captures its error; later calls become no-ops and
/// [`finalize`](QueryBuilder::finalize) returns the captured error.
#[derive(Debug, Clone)]
pub struct SelectBuilder<'db> {
    db: &'db Database,
    plan: SelectPlan,
    stage: Stage,
    outcome: Outcome,
}

impl<'db> SelectBuilder<'db> {
    pub(crate) fn new<S>(db: &'db Database, selections: S) -> Self
    where
        S: IntoSelections,
    {
        let mut builder = Self {
            db,
            plan: SelectPlan::default(),
            stage: Stage::Selected,
            outcome: Outcome::default(),
        };
        let columns = resolve_selections(db.registry(), selections.into_selections());
        if let Some(columns) = builder.outcome.capture(columns) {
            builder.plan.columns = columns;
        }
        builder
    }

    fn registry(&self) -> &'db SchemaRegistry {
        self.db.registry()
    }

    fn step(&mut self, next: Stage) -> bool {
        if !self.outcome.proceed() {
            return false;
        }
        // Ordering and paging fill fixed slots and may come in either order
        if next == Stage::Ordered && self.stage == Stage::Paged {
            return true;
        }
        if next < self.stage {
            self.outcome.fail(QueryError::invalid_argument(format!(
                "{} can't follow {}",
                next, self.stage
            )));
            return false;
        }
        self.stage = next;
        true
    }

    /// Set the source tables explicitly, replacing the default
    pub fn from<I>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = EntityToken>,
    {
        if !self.step(Stage::Selected) {
            return self;
        }
        let registry = self.registry();
        let tables: Result<Vec<String>, QueryError> = entities
            .into_iter()
            .map(|token| {
                registry
                    .entity(token)
                    .map(|e| e.table().to_string())
                    .ok_or_else(|| QueryError::invalid_argument("entity is not mapped by this database"))
            })
            .collect();
        if let Some(tables) = self.outcome.capture(tables) {
            self.plan.from.extend(tables);
        }
        self
    }

    fn add_join(mut self, kind: JoinKind, left: FieldToken, right: FieldToken) -> Self {
        if !self.step(Stage::Joined) {
            return self;
        }
        let join = resolve_join(self.registry(), kind, left, right);
        if let Some(join) = self.outcome.capture(join) {
            self.plan.joins.push(join);
        }
        self
    }

    /// `JOIN ... ON (left = right)`
    pub fn join(self, left: FieldToken, right: FieldToken) -> Self {
        self.add_join(JoinKind::Inner, left, right)
    }

    pub fn left_join(self, left: FieldToken, right: FieldToken) -> Self {
        self.add_join(JoinKind::Left, left, right)
    }

    pub fn right_join(self, left: FieldToken, right: FieldToken) -> Self {
        self.add_join(JoinKind::Right, left, right)
    }

    /// Append where tokens; consecutive predicates are joined with AND
    pub fn where_<W>(mut self, tokens: W) -> Self
    where
        W: IntoWhereTokens,
    {
        if !self.step(Stage::Filtered) {
            return self;
        }
        let result = self.plan.filter.extend(self.db.registry(), tokens);
        self.outcome.capture(result);
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
        if !self.step(Stage::Filtered) {
            return self;
        }
        let result = self
            .plan
            .filter
            .extend_with(self.db.registry(), connective, tokens);
        self.outcome.capture(result);
        self
    }

    pub fn order_by(mut self, field: FieldToken, direction: SortDirection) -> Self {
        if !self.step(Stage::Ordered) {
            return self;
        }
        match self.registry().resolve(field) {
            Some(attribute) => self.plan.order.push((Arc::clone(attribute), direction)),
            None => self.outcome.fail(QueryError::InvalidOrderBy),
        }
        self
    }

    pub fn order_by_asc(self, field: FieldToken) -> Self {
        self.order_by(field, SortDirection::Asc)
    }

    pub fn order_by_desc(self, field: FieldToken) -> Self {
        self.order_by(field, SortDirection::Desc)
    }

    /// Zero leaves the clause out
    pub fn limit(mut self, limit: u64) -> Self {
        if self.step(Stage::Paged) {
            self.plan.limit = limit;
        }
        self
    }

    /// Zero leaves the clause out
    pub fn offset(mut self, offset: u64) -> Self {
        if self.step(Stage::Paged) {
            self.plan.offset = offset;
        }
        self
    }

    /// 1-based page of `size` rows; page 0 is treated as page 1
    pub fn page(mut self, page: u64, size: u64) -> Self {
        if self.step(Stage::Paged) {
            self.plan.limit = size;
            self.plan.offset = size.saturating_mul(page.max(1) - 1);
        }
        self
    }

    pub(crate) fn with_error(mut self, error: QueryError) -> Self {
        self.outcome.fail(error);
        self
    }

    pub(crate) fn into_plan(self) -> Result<SelectPlan, QueryError> {
        if let Some(error) = self.outcome.error() {
            return Err(error.clone());
        }
        Ok(self.plan)
    }
}

impl QueryBuilder for SelectBuilder<'_> {
    fn database(&self) -> &Database {
        self.db
    }

    fn finalize(&mut self) -> Result<Statement, QueryError> {
        self.outcome.finish()?;

        let mut writer = SqlWriter::new(self.db.dialect());
        self.plan.render(&mut writer);
        Ok(writer.finish(self.plan.column_names(), None))
    }
}

fn resolve_selections(
    registry: &SchemaRegistry,
    selections: Vec<Selection>,
) -> Result<Vec<Column>, QueryError> {
    if selections.is_empty() {
        return Err(QueryError::invalid_argument("select needs at least one field"));
    }
    let unmapped = || QueryError::invalid_argument("field is not mapped by this database");

    let mut columns = Vec::new();
    for selection in selections {
        match selection {
            Selection::Field(token) => columns.push(Column {
                function: None,
                attribute: Arc::clone(registry.resolve(token).ok_or_else(unmapped)?),
            }),
            Selection::Function(function, token) => columns.push(Column {
                function: Some(function),
                attribute: Arc::clone(registry.resolve(token).ok_or_else(unmapped)?),
            }),
            Selection::Entity(token) => {
                let entity = registry
                    .entity(token)
                    .ok_or_else(|| QueryError::invalid_argument("entity is not mapped by this database"))?;
                columns.extend(entity.attributes().iter().map(|attribute| Column {
                    function: None,
                    attribute: Arc::clone(attribute),
                }));
            }
        }
    }
    Ok(columns)
}

fn resolve_join(
    registry: &SchemaRegistry,
    kind: JoinKind,
    left: FieldToken,
    right: FieldToken,
) -> Result<Join, QueryError> {
    let unmapped = || QueryError::invalid_argument("join field is not mapped by this database");
    let left = Arc::clone(registry.resolve(left).ok_or_else(unmapped)?);
    let right = Arc::clone(registry.resolve(right).ok_or_else(unmapped)?);
    if registry
        .relationship_between(left.table(), right.table())
        .is_none()
    {
        return Err(QueryError::missing_relationship(left.table(), right.table()));
    }
    Ok(Join { kind, left, right })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::common::{count, lower};
    use crate::builder::condition::{and, equals, greater, in_query, or};
    use crate::fixtures::{self, Animal, Habitat};
    use crate::Value;

    #[test]
    fn test_join_and_filter_scenario() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let habitat = db.table::<Habitat>().unwrap();

        let statement = db
            .select((animal.field("id"), animal.field("name")))
            .join(animal.field("id_habitat"), habitat.field("id"))
            .where_(equals(animal.field("id"), 5))
            .finalize()
            .unwrap();

        assert_eq!(
            statement.sql,
            r#"SELECT "animal"."id", "animal"."name" FROM "animal" JOIN "habitat" ON ("animal"."id_habitat" = "habitat"."id") WHERE "animal"."id" = $1;"#
        );
        assert_eq!(statement.arguments, vec![Value::I32(5)]);
        assert_eq!(statement.columns, vec!["id", "name"]);
    }

    #[test]
    fn test_join_direction_picks_the_table() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let habitat = db.table::<Habitat>().unwrap();

        // From habitat: (animal, habitat) introduces animal since habitat is present
        let forward = db
            .select(habitat.field("name"))
            .join(animal.field("id_habitat"), habitat.field("id"))
            .finalize()
            .unwrap();
        assert!(forward.sql.contains(r#"FROM "habitat" JOIN "animal" ON"#));

        // From animal: (habitat, animal) introduces habitat since animal is present
        let backward = db
            .select(animal.field("name"))
            .join(habitat.field("id"), animal.field("id_habitat"))
            .finalize()
            .unwrap();
        assert!(backward.sql.contains(
            r#"FROM "animal" JOIN "habitat" ON ("habitat"."id" = "animal"."id_habitat")"#
        ));

        // From weather neither side is present: the right side always wins
        let weather = db.entity("Weather").unwrap();
        let right_habitat = db
            .select(weather.field("name"))
            .join(animal.field("id_habitat"), habitat.field("id"))
            .finalize()
            .unwrap();
        assert!(right_habitat.sql.contains(r#"FROM "weather" JOIN "habitat" ON"#));

        let right_animal = db
            .select(weather.field("name"))
            .join(habitat.field("id"), animal.field("id_habitat"))
            .finalize()
            .unwrap();
        assert!(right_animal.sql.contains(r#"FROM "weather" JOIN "animal" ON"#));
    }

    #[test]
    fn test_join_with_both_tables_present_reintroduces_left() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let habitat = db.table::<Habitat>().unwrap();

        let statement = db
            .select(animal.field("name"))
            .join(animal.field("id_habitat"), habitat.field("id"))
            .join(animal.field("id_habitat"), habitat.field("id"))
            .finalize()
            .unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "animal"."name" FROM "animal" JOIN "habitat" ON ("animal"."id_habitat" = "habitat"."id") JOIN "animal" ON ("animal"."id_habitat" = "habitat"."id");"#
        );
    }

    #[test]
    fn test_join_kinds_and_chain() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let habitat = db.table::<Habitat>().unwrap();
        let weather = db.entity("Weather").unwrap();

        let statement = db
            .select((animal.field("name"), weather.field("name")))
            .left_join(animal.field("id_habitat"), habitat.field("id"))
            .right_join(habitat.field("id_weather"), weather.field("id"))
            .finalize()
            .unwrap();
        assert!(statement.sql.contains(r#" LEFT JOIN "habitat" ON "#));
        assert!(statement.sql.contains(r#" RIGHT JOIN "weather" ON "#));
        assert_eq!(statement.columns, vec!["name", "weather.name"]);
    }

    #[test]
    fn test_join_without_relationship() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let job = db.entity("Job").unwrap();

        let err = db
            .select(animal.field("name"))
            .join(animal.field("id"), job.field("id"))
            .finalize()
            .unwrap_err();
        assert_eq!(err, QueryError::missing_relationship("animal", "job"));
    }

    #[test]
    fn test_placeholders_count_from_one() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();

        let statement = db
            .select(animal.token())
            .where_([
                greater(animal.field("id"), 1),
                or(),
                equals(animal.field("name"), "Cat"),
            ])
            .and_where(equals(animal.field("id_habitat"), 3))
            .finalize()
            .unwrap();
        assert!(statement.sql.ends_with(
            r#"WHERE "animal"."id" > $1 OR "animal"."name" = $2 AND "animal"."id_habitat" = $3;"#
        ));
        assert_eq!(
            statement.arguments,
            vec![Value::I32(1), Value::from("Cat"), Value::I32(3)]
        );
        assert_eq!(statement.columns, vec!["id", "name", "id_habitat", "id_info"]);
    }

    #[test]
    fn test_sub_select_continues_numbering() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let habitat = db.table::<Habitat>().unwrap();

        let inner = db
            .select(habitat.field("id"))
            .where_(equals(habitat.field("name"), "Savanna"));
        let statement = db
            .select(animal.field("name"))
            .where_([
                equals(animal.field("name"), "Lion"),
                and(),
                in_query(animal.field("id_habitat"), inner),
            ])
            .finalize()
            .unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "animal"."name" FROM "animal" WHERE "animal"."name" = $1 AND "animal"."id_habitat" IN (SELECT "habitat"."id" FROM "habitat" WHERE "habitat"."name" = $2);"#
        );
        assert_eq!(statement.arguments.len(), 2);
    }

    #[test]
    fn test_failed_sub_select_fails_outer() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let inner = db.select(FieldToken::dangling());
        let err = db
            .select(animal.field("name"))
            .where_(in_query(animal.field("id"), inner))
            .finalize()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));
    }

    #[test]
    fn test_order_and_paging() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();

        let statement = db
            .select(animal.field("name"))
            .order_by_desc(animal.field("id"))
            .page(3, 10)
            .finalize()
            .unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "animal"."name" FROM "animal" ORDER BY "animal"."id" DESC LIMIT 10 OFFSET 20;"#
        );

        let first = db.select(animal.field("name")).page(0, 5).finalize().unwrap();
        assert!(first.sql.ends_with(" LIMIT 5;"));

        let unpaged = db
            .select(animal.field("name"))
            .limit(0)
            .offset(0)
            .finalize()
            .unwrap();
        assert_eq!(unpaged.sql, r#"SELECT "animal"."name" FROM "animal";"#);
    }

    #[test]
    fn test_paging_before_order_by() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();

        let ordered_first = db
            .select(animal.field("name"))
            .order_by_asc(animal.field("name"))
            .page(1, 20)
            .finalize()
            .unwrap();
        let paged_first = db
            .select(animal.field("name"))
            .page(1, 20)
            .order_by_asc(animal.field("name"))
            .finalize()
            .unwrap();
        assert_eq!(ordered_first.sql, paged_first.sql);
        assert_eq!(
            paged_first.sql,
            r#"SELECT "animal"."name" FROM "animal" ORDER BY "animal"."name" ASC LIMIT 20;"#
        );

        let err = db
            .select(animal.field("name"))
            .page(1, 20)
            .where_(equals(animal.field("id"), 1))
            .finalize()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));
    }

    #[test]
    fn test_invalid_order_by() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let err = db
            .select(animal.field("name"))
            .order_by_asc(FieldToken::dangling())
            .finalize()
            .unwrap_err();
        assert_eq!(err, QueryError::InvalidOrderBy);
    }

    #[test]
    fn test_first_error_wins_and_repeats() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();

        let mut builder = db
            .select(FieldToken::dangling())
            .order_by_asc(FieldToken::dangling())
            .where_(equals(animal.field("id"), 1));
        let first = builder.finalize().unwrap_err();
        let second = builder.finalize().unwrap_err();
        assert!(matches!(first, QueryError::InvalidArgument { .. }));
        assert_eq!(first, second);
    }

    #[test]
    fn test_finalize_twice_is_rejected() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let mut builder = db.select(animal.field("name"));
        assert!(builder.finalize().is_ok());
        assert_eq!(builder.finalize().unwrap_err(), QueryError::AlreadyFinalized);
    }

    #[test]
    fn test_mutating_after_finalize_is_rejected() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let mut builder = db.select(animal.field("name"));
        builder.finalize().unwrap();
        let mut builder = builder.limit(5);
        assert_eq!(builder.finalize().unwrap_err(), QueryError::AlreadyFinalized);
    }

    #[test]
    fn test_calls_out_of_order() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let habitat = db.table::<Habitat>().unwrap();
        let err = db
            .select(animal.field("name"))
            .where_(equals(animal.field("id"), 1))
            .join(animal.field("id_habitat"), habitat.field("id"))
            .finalize()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));
    }

    #[test]
    fn test_functions_and_explicit_sources() {
        let db = fixtures::database();
        let animal = db.table::<Animal>().unwrap();
        let habitat = db.table::<Habitat>().unwrap();

        let statement = db
            .select((count(animal.field("id")), lower(habitat.field("name"))))
            .from([animal.token(), habitat.token()])
            .where_(crate::builder::condition::equals_arg(
                animal.field("id_habitat"),
                habitat.field("id"),
            ))
            .finalize()
            .unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT COUNT("animal"."id"), LOWER("habitat"."name") FROM "animal", "habitat" WHERE "animal"."id_habitat" = "habitat"."id";"#
        );
        assert_eq!(statement.columns, vec!["count", "name"]);
    }

    #[test]
    fn test_empty_selection() {
        let db = fixtures::database();
        let err = db.select(Vec::<FieldToken>::new()).finalize().unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));
    }
}
