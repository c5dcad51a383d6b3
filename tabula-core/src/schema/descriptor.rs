//! Immutable descriptors produced by the registry build

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::declare::DataType;
use super::index::{EntityToken, FieldToken};

/// One storable column of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub(crate) token: FieldToken,
    pub(crate) entity: EntityToken,
    pub(crate) entity_name: String,
    pub(crate) table: String,
    pub(crate) field: String,
    pub(crate) column: String,
    pub(crate) data_type: DataType,
    pub(crate) nullable: bool,
    pub(crate) primary_key: bool,
    /// Related table when the column holds a foreign key
    pub(crate) references: Option<String>,
}

impl AttributeDescriptor {
    pub fn token(&self) -> FieldToken {
        self.token
    }

    /// Owning entity
    pub fn entity(&self) -> EntityToken {
        self.entity
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn references(&self) -> Option<&str> {
        self.references.as_deref()
    }

    /// `table.column`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Primary key column plus the relationships it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyDescriptor {
    pub(crate) attribute: Arc<AttributeDescriptor>,
    pub(crate) auto_increment: bool,
    pub(crate) relationships: BTreeMap<String, RelationshipDescriptor>,
}

impl PrimaryKeyDescriptor {
    pub fn attribute(&self) -> &Arc<AttributeDescriptor> {
        &self.attribute
    }

    /// Integer key generated by the database; left out of inserts
    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Outgoing relationships keyed by related table name
    pub fn relationships(&self) -> &BTreeMap<String, RelationshipDescriptor> {
        &self.relationships
    }
}

impl Deref for PrimaryKeyDescriptor {
    type Target = AttributeDescriptor;

    fn deref(&self) -> &Self::Target {
        &self.attribute
    }
}

/// Relationship kinds, without their payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    OneToOne,
    ManyToOne,
    ManyToMany,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipKind::OneToOne => write!(f, "one-to-one"),
            RelationshipKind::ManyToOne => write!(f, "many-to-one"),
            RelationshipKind::ManyToMany => write!(f, "many-to-many"),
        }
    }
}

/// A foreign-key link between the owner and a target table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub target: EntityToken,
    pub target_table: String,
    /// Primary-key column of the owning entity
    pub owner_key: String,
    /// Qualified column holding the foreign key, on whichever side it lives
    pub column: String,
}

/// A link through a join table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    pub target: EntityToken,
    pub target_table: String,
    pub owner_key: String,
    pub table: String,
    /// Join-table column referencing the owner
    pub owner_column: String,
    /// Join-table column referencing the target
    pub target_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipDescriptor {
    OneToOne(ForeignKey),
    /// The owner holds the foreign key, or with `has_many` the target holds
    /// one pointing back at the owner's collection
    ManyToOne { key: ForeignKey, has_many: bool },
    ManyToMany(JoinTable),
}

impl RelationshipDescriptor {
    pub fn kind(&self) -> RelationshipKind {
        match self {
            RelationshipDescriptor::OneToOne(_) => RelationshipKind::OneToOne,
            RelationshipDescriptor::ManyToOne { .. } => RelationshipKind::ManyToOne,
            RelationshipDescriptor::ManyToMany(_) => RelationshipKind::ManyToMany,
        }
    }

    pub fn target(&self) -> EntityToken {
        match self {
            RelationshipDescriptor::OneToOne(key)
            | RelationshipDescriptor::ManyToOne { key, .. } => key.target,
            RelationshipDescriptor::ManyToMany(join) => join.target,
        }
    }

    pub fn target_table(&self) -> &str {
        match self {
            RelationshipDescriptor::OneToOne(key)
            | RelationshipDescriptor::ManyToOne { key, .. } => &key.target_table,
            RelationshipDescriptor::ManyToMany(join) => &join.target_table,
        }
    }

    pub fn owner_key(&self) -> &str {
        match self {
            RelationshipDescriptor::OneToOne(key)
            | RelationshipDescriptor::ManyToOne { key, .. } => &key.owner_key,
            RelationshipDescriptor::ManyToMany(join) => &join.owner_key,
        }
    }

    pub fn join_table(&self) -> Option<&JoinTable> {
        match self {
            RelationshipDescriptor::ManyToMany(join) => Some(join),
            _ => None,
        }
    }
}

/// Everything the builders need to know about one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub(crate) token: EntityToken,
    pub(crate) name: String,
    pub(crate) table: String,
    pub(crate) attributes: Vec<Arc<AttributeDescriptor>>,
    pub(crate) primary_keys: Vec<PrimaryKeyDescriptor>,
    pub(crate) relationships: BTreeMap<String, RelationshipDescriptor>,
}

impl EntityDescriptor {
    pub fn token(&self) -> EntityToken {
        self.token
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every column in declaration order, keys included
    pub fn attributes(&self) -> &[Arc<AttributeDescriptor>] {
        &self.attributes
    }

    pub fn primary_keys(&self) -> &[PrimaryKeyDescriptor] {
        &self.primary_keys
    }

    pub fn relationships(&self) -> &BTreeMap<String, RelationshipDescriptor> {
        &self.relationships
    }

    pub fn relationship(&self, table: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.get(table)
    }

    pub fn attribute(&self, field: &str) -> Option<&Arc<AttributeDescriptor>> {
        self.attributes.iter().find(|a| a.field == field)
    }

    /// Token of a field; unknown names yield a token that never resolves, so
    /// the mistake surfaces when the statement is finalized
    pub fn field(&self, field: &str) -> FieldToken {
        self.attribute(field)
            .map(|a| a.token)
            .unwrap_or_else(FieldToken::dangling)
    }

    pub fn primary_key(&self, field: &str) -> Option<&PrimaryKeyDescriptor> {
        self.primary_keys.iter().find(|k| k.field == field)
    }

    /// Columns written by an insert: auto-increment keys are generated by the database
    pub fn insert_attributes(&self) -> impl Iterator<Item = &Arc<AttributeDescriptor>> {
        self.attributes.iter().filter(move |a| {
            !self
                .primary_key(&a.field)
                .is_some_and(PrimaryKeyDescriptor::is_auto_increment)
        })
    }

    /// Key generated on insert, if any
    pub fn generated_key(&self) -> Option<&PrimaryKeyDescriptor> {
        self.primary_keys.iter().find(|k| k.auto_increment)
    }
}
