//! Entity declarations, descriptors and the registry built from them

pub mod declare;
pub mod descriptor;
pub mod index;
pub mod naming;
pub mod registry;

pub use declare::{DataType, Entity, EntityDecl, FieldDecl, FieldKind, Schema};
pub use descriptor::{
    AttributeDescriptor, EntityDescriptor, ForeignKey, JoinTable, PrimaryKeyDescriptor,
    RelationshipDescriptor, RelationshipKind,
};
pub use index::{EntityToken, FieldToken, IdentityIndex};
pub use registry::SchemaRegistry;
