//! Typed entity declarations consumed by the registry build
//!
//! Declarations are plain data: one [`EntityDecl`] per mapped type, listing
//! its fields in declaration order. The registry walks them once; nothing here
//! is inspected at query time.

/// Data-type hint carried by a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Boolean,
    Text,
    Bytes,
    Uuid,
    Timestamp,
    Json,
    /// Column type spelled out by the declaration
    Custom(String),
}

impl DataType {
    /// Integer semantic types are eligible for auto-increment keys
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::SmallInt | DataType::Integer | DataType::BigInt)
    }
}

/// What a declared field holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A scalar stored in one column
    Value(DataType),
    /// A value whose type is another declared entity
    Entity(String),
    /// A collection of another entity; never a column
    Collection(String),
}

/// One field of an entity declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) nullable: bool,
    pub(crate) primary_key: bool,
    pub(crate) table: Option<String>,
    pub(crate) column_type: Option<String>,
}

impl FieldDecl {
    /// Declare a scalar field
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self::with_kind(name, FieldKind::Value(data_type))
    }

    /// Declare a field whose value type is the entity `target`
    pub fn entity(name: &str, target: &str) -> Self {
        Self::with_kind(name, FieldKind::Entity(target.to_string()))
    }

    /// Declare a collection of `element` entities
    pub fn collection(name: &str, element: &str) -> Self {
        Self::with_kind(name, FieldKind::Collection(element.to_string()))
    }

    fn with_kind(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable: false,
            primary_key: false,
            table: None,
            column_type: None,
        }
    }

    /// The column accepts NULL
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the field as (part of) the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Name the related entity explicitly instead of deriving it from the
    /// field name. On a collection field this is the join table of a
    /// many-to-many relationship.
    pub fn table(mut self, entity: &str) -> Self {
        self.table = Some(entity.to_string());
        self
    }

    /// Override the column type; the hint becomes [`DataType::Custom`]
    pub fn column_type(mut self, sql: &str) -> Self {
        self.column_type = Some(sql.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub(crate) fn is_collection(&self) -> bool {
        matches!(self.kind, FieldKind::Collection(_))
    }
}

/// Declaration of one mapped entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDecl {
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldDecl>,
}

impl EntityDecl {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub(crate) fn has_collection_of(&self, element: &str) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(&f.kind, FieldKind::Collection(e) if e == element))
    }
}

/// A type mapped to a table
///
/// ```
/// use tabula_core::schema::{DataType, Entity, EntityDecl, FieldDecl};
///
/// struct Habitat;
///
/// impl Entity for Habitat {
///     const NAME: &'static str = "Habitat";
///
///     fn declare() -> EntityDecl {
///         EntityDecl::new(Self::NAME)
///             .field(FieldDecl::new("id", DataType::Integer))
///             .field(FieldDecl::new("name", DataType::Text))
///     }
/// }
/// ```
pub trait Entity {
    const NAME: &'static str;

    fn declare() -> EntityDecl;
}

/// The declared entity set of one database
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub(crate) entities: Vec<EntityDecl>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed entity
    pub fn entity<T: Entity>(self) -> Self {
        self.declare(T::declare())
    }

    /// Register an untyped declaration
    pub fn declare(mut self, decl: EntityDecl) -> Self {
        self.entities.push(decl);
        self
    }

    pub fn entities(&self) -> &[EntityDecl] {
        &self.entities
    }
}
