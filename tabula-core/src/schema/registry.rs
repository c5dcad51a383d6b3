//! Registry build: primary-key and relationship inference over declarations
//!
//! The build walks the declared entity set once. Primary keys come from the
//! `id` convention or explicit annotations; relationships come from entity
//! typed fields, `<key>_<table>` field names, `table` overrides and
//! collection back-references. Once built the registry is immutable.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::declare::{DataType, Entity, EntityDecl, FieldDecl, FieldKind, Schema};
use super::descriptor::{
    AttributeDescriptor, EntityDescriptor, ForeignKey, JoinTable, PrimaryKeyDescriptor,
    RelationshipDescriptor,
};
use super::index::{next_registry_id, EntityToken, FieldToken, IdentityIndex};
use super::naming::{join_column, strip_table, suffix_splits, table_name};
use crate::error::SchemaError;

/// Frozen descriptor graph of one declared entity set
#[derive(Debug)]
pub struct SchemaRegistry {
    id: u32,
    entities: Vec<EntityDescriptor>,
    by_name: HashMap<String, usize>,
    by_table: HashMap<String, usize>,
    index: IdentityIndex,
}

impl SchemaRegistry {
    /// Build the registry, failing as a whole if any entity is unusable
    pub fn build(schema: &Schema) -> Result<Self, SchemaError> {
        let id = next_registry_id();
        let catalog = Catalog::new(id, schema.entities())?;
        let mut index = IdentityIndex::new(id);

        let mut entities = Vec::with_capacity(schema.entities().len());
        for position in 0..schema.entities().len() {
            let entity = catalog.describe(position, &mut index)?;
            log::debug!(
                "registered entity {} as table {} ({} columns, {} relationships)",
                entity.name(),
                entity.table(),
                entity.attributes().len(),
                entity.relationships().len()
            );
            entities.push(entity);
        }

        let by_name = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name().to_string(), i))
            .collect();
        let by_table = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.table().to_string(), i))
            .collect();

        Ok(Self {
            id,
            entities,
            by_name,
            by_table,
            index,
        })
    }

    pub fn index(&self) -> &IdentityIndex {
        &self.index
    }

    pub fn resolve(&self, token: FieldToken) -> Option<&Arc<AttributeDescriptor>> {
        self.index.resolve(token)
    }

    pub fn entity(&self, token: EntityToken) -> Option<&EntityDescriptor> {
        if token.registry != self.id {
            return None;
        }
        self.entities.get(token.entity as usize)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&EntityDescriptor> {
        self.by_name.get(name).map(|&i| &self.entities[i])
    }

    pub fn entity_by_table(&self, table: &str) -> Option<&EntityDescriptor> {
        self.by_table.get(table).map(|&i| &self.entities[i])
    }

    pub fn entity_of<T: Entity>(&self) -> Option<&EntityDescriptor> {
        self.entity_by_name(T::NAME)
    }

    pub fn entities(&self) -> &[EntityDescriptor] {
        &self.entities
    }

    /// Relationship linking two tables, looked up from either side
    pub fn relationship_between(
        &self,
        left: &str,
        right: &str,
    ) -> Option<&RelationshipDescriptor> {
        self.entity_by_table(left)
            .and_then(|e| e.relationship(right))
            .or_else(|| self.entity_by_table(right).and_then(|e| e.relationship(left)))
    }
}

/// A field resolved to a related entity, before the kind is decided
struct Reference {
    target: usize,
    prefix: String,
}

/// Relationship found on one field, waiting to be attached to a key
struct Link {
    field: String,
    table: String,
    relationship: RelationshipDescriptor,
    from_column: bool,
}

/// Declaration-level lookups used while inferring descriptors
struct Catalog<'a> {
    registry: u32,
    decls: &'a [EntityDecl],
    tables: Vec<String>,
    by_name: HashMap<&'a str, usize>,
    by_table: HashMap<String, usize>,
    keys: Vec<Vec<usize>>,
}

impl<'a> Catalog<'a> {
    fn new(registry: u32, decls: &'a [EntityDecl]) -> Result<Self, SchemaError> {
        let mut by_name = HashMap::new();
        let mut by_table = HashMap::new();
        let mut tables = Vec::with_capacity(decls.len());
        let mut keys = Vec::with_capacity(decls.len());

        for (position, decl) in decls.iter().enumerate() {
            if by_name.insert(decl.name.as_str(), position).is_some() {
                return Err(SchemaError::DuplicateEntity {
                    entity: decl.name.clone(),
                });
            }
            let table = table_name(&decl.name);
            by_table.insert(table.clone(), position);
            tables.push(table);
            keys.push(primary_key_fields(decl)?);
        }

        let catalog = Self {
            registry,
            decls,
            tables,
            by_name,
            by_table,
            keys,
        };
        for position in 0..decls.len() {
            catalog.key_type(position)?;
        }
        Ok(catalog)
    }

    fn token(&self, position: usize) -> EntityToken {
        EntityToken {
            registry: self.registry,
            entity: position as u32,
        }
    }

    /// Entity named by an override: entity name first, then table name
    fn lookup(&self, name: &str) -> Option<usize> {
        self.by_name
            .get(name)
            .or_else(|| self.by_table.get(name))
            .copied()
    }

    fn key_field(&self, entity: usize) -> &FieldDecl {
        &self.decls[entity].fields[self.keys[entity][0]]
    }

    fn key_name(&self, entity: usize) -> &str {
        &self.key_field(entity).name
    }

    /// Column type of the first key, following entity-typed keys to the key
    /// they point at
    fn key_type(&self, entity: usize) -> Result<DataType, SchemaError> {
        let mut visited = vec![entity];
        let mut current = entity;
        loop {
            let key = self.key_field(current);
            let target = match (&key.column_type, &key.kind) {
                (Some(sql), _) => return Ok(DataType::Custom(sql.clone())),
                (None, FieldKind::Value(data_type)) => return Ok(data_type.clone()),
                (None, FieldKind::Collection(_)) => return Ok(DataType::BigInt),
                (None, FieldKind::Entity(target)) => match self.by_name.get(target.as_str()) {
                    Some(&target) => target,
                    None => return Ok(DataType::BigInt),
                },
            };
            if visited.contains(&target) {
                return Err(SchemaError::KeyCycle {
                    entity: self.decls[entity].name.clone(),
                });
            }
            visited.push(target);
            current = target;
        }
    }

    /// Key owning a relationship found on `field`: the key named like the
    /// prefix or the field itself, else the first key
    fn owning_key(&self, owner: usize, field: &str, prefix: &str) -> usize {
        let decl = &self.decls[owner];
        self.keys[owner]
            .iter()
            .position(|&k| decl.fields[k].name == prefix || decl.fields[k].name == field)
            .unwrap_or(0)
    }

    /// Related entity a column field points at, if any
    fn reference(&self, owner: usize, field: &FieldDecl) -> Result<Option<Reference>, SchemaError> {
        let entity = &self.decls[owner].name;
        match &field.kind {
            FieldKind::Collection(_) => Ok(None),
            FieldKind::Entity(target_name) => {
                let target = self.by_name.get(target_name.as_str()).copied().ok_or_else(|| {
                    SchemaError::UnknownEntity {
                        entity: entity.clone(),
                        field: field.name.clone(),
                        target: target_name.clone(),
                    }
                })?;
                if let Some(table) = &field.table {
                    if self.lookup(table) != Some(target) {
                        return Err(SchemaError::AmbiguousRelationship {
                            entity: entity.clone(),
                            table: table.clone(),
                        });
                    }
                }
                Ok(Some(Reference {
                    target,
                    prefix: self.key_name(target).to_string(),
                }))
            }
            FieldKind::Value(_) => {
                if let Some(table) = &field.table {
                    let target =
                        self.lookup(table)
                            .ok_or_else(|| SchemaError::UnresolvedTableOverride {
                                entity: entity.clone(),
                                field: field.name.clone(),
                                table: table.clone(),
                            })?;
                    return Ok(Some(Reference {
                        target,
                        prefix: strip_table(&field.name, &self.tables[target]),
                    }));
                }
                Ok(suffix_splits(&field.name).find_map(|(prefix, table)| {
                    self.by_table.get(table).map(|&target| Reference {
                        target,
                        prefix: prefix.to_string(),
                    })
                }))
            }
        }
    }

    /// Field of `holder` holding a foreign key to `target`
    fn foreign_key_to(&self, holder: usize, target: usize) -> Option<&'a str> {
        self.decls[holder].fields.iter().find_map(|field| {
            match self.reference(holder, field) {
                Ok(Some(r)) if r.target == target && r.prefix == self.key_name(target) => {
                    Some(field.name.as_str())
                }
                _ => None,
            }
        })
    }

    /// A third entity holding foreign keys to both sides
    fn bridge_between(&self, left: usize, right: usize) -> bool {
        (0..self.decls.len()).any(|candidate| {
            candidate != left
                && candidate != right
                && self.foreign_key_to(candidate, left).is_some()
                && self.foreign_key_to(candidate, right).is_some()
        })
    }

    /// Decide the kind of a foreign-key column; `None` keeps it a plain attribute
    fn classify(&self, owner: usize, field: &str, reference: &Reference) -> Option<RelationshipDescriptor> {
        let target = reference.target;
        if reference.prefix != self.key_name(target) {
            log::trace!(
                "{}.{} matches table {} but prefix '{}' is not its key",
                self.decls[owner].name,
                field,
                self.tables[target],
                reference.prefix
            );
            return None;
        }

        let owner_decl = &self.decls[owner];
        let target_decl = &self.decls[target];
        let owning = self.keys[owner][self.owning_key(owner, field, &reference.prefix)];
        let key = ForeignKey {
            target: self.token(target),
            target_table: self.tables[target].clone(),
            owner_key: owner_decl.fields[owning].name.clone(),
            column: format!("{}.{}", self.tables[owner], field),
        };

        if target_decl.has_collection_of(&owner_decl.name) {
            return Some(RelationshipDescriptor::ManyToOne { key, has_many: false });
        }

        // Bridge entity named after both sides, e.g. AnimalFood → Food
        let rest = owner_decl.name.replace(&target_decl.name, "");
        if !rest.is_empty() && rest != owner_decl.name {
            if let Some(&other) = self.by_name.get(rest.as_str()) {
                if self.decls[other].has_collection_of(&target_decl.name) {
                    return Some(RelationshipDescriptor::ManyToOne { key, has_many: false });
                }
            }
        }

        Some(RelationshipDescriptor::OneToOne(key))
    }

    fn collection(&self, owner: usize, field: &FieldDecl, element: &str) -> Option<RelationshipDescriptor> {
        let owner_name = &self.decls[owner].name;
        let Some(&target) = self.by_name.get(element) else {
            log::trace!("{}.{} collects undeclared entity {}", owner_name, field.name, element);
            return None;
        };

        if let Some(column) = self.foreign_key_to(target, owner) {
            return Some(RelationshipDescriptor::ManyToOne {
                key: ForeignKey {
                    target: self.token(target),
                    target_table: self.tables[target].clone(),
                    owner_key: self.key_name(owner).to_string(),
                    column: format!("{}.{}", self.tables[target], column),
                },
                has_many: true,
            });
        }

        let bridged =
            self.decls[target].has_collection_of(owner_name) || self.bridge_between(owner, target);
        if !bridged {
            log::trace!("{}.{} has no path to {}", owner_name, field.name, element);
            return None;
        }
        let Some(join) = &field.table else {
            log::trace!(
                "{}.{} looks many-to-many but names no join table; not a relationship",
                owner_name,
                field.name
            );
            return None;
        };

        let table = self
            .lookup(join)
            .map(|j| self.tables[j].clone())
            .unwrap_or_else(|| table_name(join));
        Some(RelationshipDescriptor::ManyToMany(JoinTable {
            target: self.token(target),
            target_table: self.tables[target].clone(),
            owner_key: self.key_name(owner).to_string(),
            table,
            owner_column: join_column(self.key_name(owner), &self.tables[owner]),
            target_column: join_column(self.key_name(target), &self.tables[target]),
        }))
    }

    fn describe(&self, owner: usize, index: &mut IdentityIndex) -> Result<EntityDescriptor, SchemaError> {
        let decl = &self.decls[owner];
        let token = self.token(owner);
        let table = &self.tables[owner];

        let mut attributes: Vec<Arc<AttributeDescriptor>> = Vec::new();
        let mut links = Vec::new();

        for (position, field) in decl.fields.iter().enumerate() {
            if let FieldKind::Collection(element) = &field.kind {
                if let Some(relationship) = self.collection(owner, field, element) {
                    links.push(Link {
                        field: field.name.clone(),
                        table: relationship.target_table().to_string(),
                        relationship,
                        from_column: false,
                    });
                }
                continue;
            }

            let relationship = match self.reference(owner, field)? {
                Some(reference) => self.classify(owner, &field.name, &reference),
                None => None,
            };
            let data_type = match (&field.column_type, &field.kind) {
                (Some(sql), _) => DataType::Custom(sql.clone()),
                (None, FieldKind::Value(data_type)) => data_type.clone(),
                (None, _) => match relationship
                    .as_ref()
                    .and_then(|r| self.lookup_token(r.target()))
                {
                    Some(target) => self.key_type(target)?,
                    None => DataType::BigInt,
                },
            };

            let attribute = Arc::new(AttributeDescriptor {
                token: index.next_token(),
                entity: token,
                entity_name: decl.name.clone(),
                table: table.clone(),
                field: field.name.clone(),
                column: field.name.clone(),
                data_type,
                nullable: field.nullable,
                primary_key: self.keys[owner].contains(&position),
                references: relationship.as_ref().map(|r| r.target_table().to_string()),
            });
            index.register(Arc::clone(&attribute));
            attributes.push(attribute);

            if let Some(relationship) = relationship {
                links.push(Link {
                    field: field.name.clone(),
                    table: relationship.target_table().to_string(),
                    relationship,
                    from_column: true,
                });
            }
        }

        let mut primary_keys: Vec<PrimaryKeyDescriptor> = self.keys[owner]
            .iter()
            .filter_map(|&k| {
                let field = &decl.fields[k];
                let attribute = attributes.iter().find(|a| a.field == field.name)?;
                let integer = matches!(&field.kind, FieldKind::Value(t) if t.is_integer());
                Some(PrimaryKeyDescriptor {
                    attribute: Arc::clone(attribute),
                    auto_increment: integer
                        && field.column_type.is_none()
                        && attribute.references.is_none(),
                    relationships: BTreeMap::new(),
                })
            })
            .collect();
        if primary_keys.is_empty() {
            return Err(SchemaError::missing_primary_key(decl.name.clone()));
        }

        let mut relationships = BTreeMap::new();
        let mut column_links = HashSet::new();
        for link in links {
            if relationships.contains_key(&link.table) {
                if link.from_column && column_links.contains(&link.table) {
                    return Err(SchemaError::AmbiguousRelationship {
                        entity: decl.name.clone(),
                        table: link.table,
                    });
                }
                log::trace!(
                    "{}.{} repeats the relationship to {}; keeping the first",
                    decl.name,
                    link.field,
                    link.table
                );
                continue;
            }

            log::debug!(
                "{}.{} is {} {}",
                decl.name,
                link.field,
                link.relationship.kind(),
                link.table
            );
            let owner_key = link.relationship.owner_key().to_string();
            if let Some(key) = primary_keys.iter_mut().find(|k| k.field == owner_key) {
                key.relationships
                    .insert(link.table.clone(), link.relationship.clone());
            }
            if link.from_column {
                column_links.insert(link.table.clone());
            }
            relationships.insert(link.table, link.relationship);
        }

        Ok(EntityDescriptor {
            token,
            name: decl.name.clone(),
            table: table.clone(),
            attributes,
            primary_keys,
            relationships,
        })
    }

    fn lookup_token(&self, token: EntityToken) -> Option<usize> {
        (token.registry == self.registry && (token.entity as usize) < self.decls.len())
            .then_some(token.entity as usize)
    }
}

/// `id` by convention, otherwise every field marked as primary key
fn primary_key_fields(decl: &EntityDecl) -> Result<Vec<usize>, SchemaError> {
    let column = |f: &FieldDecl| !f.is_collection();
    if let Some(id) = decl
        .fields
        .iter()
        .position(|f| f.name == "id" && column(f))
    {
        return Ok(vec![id]);
    }

    let marked: Vec<usize> = decl
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.primary_key && column(f))
        .map(|(i, _)| i)
        .collect();
    if marked.is_empty() {
        return Err(SchemaError::missing_primary_key(decl.name.clone()));
    }
    Ok(marked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::schema::RelationshipKind;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::build(&fixtures::zoo()).unwrap()
    }

    fn kind(registry: &SchemaRegistry, entity: &str, table: &str) -> Option<RelationshipKind> {
        registry
            .entity_by_name(entity)
            .unwrap()
            .relationship(table)
            .map(RelationshipDescriptor::kind)
    }

    #[test]
    fn test_id_is_auto_increment_key() {
        let registry = registry();
        let animal = registry.entity_by_name("Animal").unwrap();
        assert_eq!(animal.table(), "animal");
        assert_eq!(animal.primary_keys().len(), 1);
        let key = &animal.primary_keys()[0];
        assert_eq!(key.field(), "id");
        assert!(key.is_auto_increment());

        let columns: Vec<&str> = animal.insert_attributes().map(|a| a.column()).collect();
        assert!(!columns.contains(&"id"));
        assert!(columns.contains(&"name"));
    }

    #[test]
    fn test_non_integer_id_is_not_generated() {
        let registry = registry();
        let food = registry.entity_by_name("Food").unwrap();
        assert!(!food.primary_keys()[0].is_auto_increment());
        assert!(food.insert_attributes().any(|a| a.column() == "id"));
    }

    #[test]
    fn test_marked_fields_form_composite_key() {
        let registry = registry();
        let bridge = registry.entity_by_name("AnimalFood").unwrap();
        let keys: Vec<&str> = bridge.primary_keys().iter().map(|k| k.field()).collect();
        assert_eq!(keys, vec!["id_animal", "id_food"]);
        assert!(bridge.primary_keys().iter().all(|k| !k.is_auto_increment()));
    }

    #[test]
    fn test_missing_primary_key_aborts_build() {
        let schema = Schema::new()
            .declare(EntityDecl::new("Habitat").field(FieldDecl::new("id", DataType::Integer)))
            .declare(EntityDecl::new("Note").field(FieldDecl::new("text", DataType::Text)));
        let err = SchemaRegistry::build(&schema).unwrap_err();
        assert_eq!(err, SchemaError::missing_primary_key("Note"));
    }

    #[test]
    fn test_back_reference_makes_many_to_one() {
        let registry = registry();
        assert_eq!(kind(&registry, "Animal", "habitat"), Some(RelationshipKind::ManyToOne));
        assert_eq!(kind(&registry, "Habitat", "weather"), Some(RelationshipKind::ManyToOne));

        let habitat = registry.entity_by_name("Habitat").unwrap();
        match habitat.relationship("animal") {
            Some(RelationshipDescriptor::ManyToOne { key, has_many }) => {
                assert!(*has_many);
                assert_eq!(key.column, "animal.id_habitat");
            }
            other => panic!("unexpected relationship {:?}", other),
        }
    }

    #[test]
    fn test_without_back_reference_is_one_to_one() {
        let registry = registry();
        assert_eq!(kind(&registry, "Animal", "info"), Some(RelationshipKind::OneToOne));
        assert_eq!(kind(&registry, "Info", "status"), Some(RelationshipKind::OneToOne));
        let animal = registry.entity_by_name("Animal").unwrap();
        assert_eq!(animal.attribute("id_info").unwrap().references(), Some("info"));
    }

    #[test]
    fn test_bridge_named_after_both_sides() {
        let registry = registry();
        assert_eq!(kind(&registry, "AnimalFood", "food"), Some(RelationshipKind::ManyToOne));
        assert_eq!(kind(&registry, "AnimalFood", "animal"), Some(RelationshipKind::OneToOne));

        let bridge = registry.entity_by_name("AnimalFood").unwrap();
        let id_food = bridge.primary_key("id_food").unwrap();
        assert!(id_food.relationships().contains_key("food"));
    }

    #[test]
    fn test_many_to_many_through_override() {
        let registry = registry();
        let animal = registry.entity_by_name("Animal").unwrap();
        let join = animal.relationship("food").and_then(|r| r.join_table()).unwrap();
        assert_eq!(join.table, "animal_food");
        assert_eq!(join.owner_column, "id_animal");
        assert_eq!(join.target_column, "id_food");

        assert_eq!(kind(&registry, "Person", "job"), Some(RelationshipKind::ManyToMany));
        assert_eq!(kind(&registry, "Job", "person"), Some(RelationshipKind::ManyToMany));
    }

    #[test]
    fn test_many_to_many_without_override_is_silently_dropped() {
        let schema = Schema::new()
            .declare(
                EntityDecl::new("Person")
                    .field(FieldDecl::new("id", DataType::Integer))
                    .field(FieldDecl::collection("jobs", "Job")),
            )
            .declare(
                EntityDecl::new("Job")
                    .field(FieldDecl::new("id", DataType::Integer))
                    .field(FieldDecl::collection("persons", "Person")),
            );
        let registry = SchemaRegistry::build(&schema).unwrap();
        assert!(registry.entity_by_name("Person").unwrap().relationships().is_empty());
        assert!(registry.relationship_between("person", "job").is_none());
    }

    #[test]
    fn test_prefix_must_name_target_key() {
        let schema = Schema::new()
            .declare(EntityDecl::new("Habitat").field(FieldDecl::new("id", DataType::Integer)))
            .declare(
                EntityDecl::new("Animal")
                    .field(FieldDecl::new("id", DataType::Integer))
                    .field(FieldDecl::new("code_habitat", DataType::Text)),
            );
        let registry = SchemaRegistry::build(&schema).unwrap();
        let animal = registry.entity_by_name("Animal").unwrap();
        assert!(animal.relationships().is_empty());
        assert!(animal.attribute("code_habitat").unwrap().references().is_none());
    }

    #[test]
    fn test_table_override_wins_over_name() {
        let schema = Schema::new()
            .declare(EntityDecl::new("Habitat").field(FieldDecl::new("id", DataType::Integer)))
            .declare(EntityDecl::new("Place").field(FieldDecl::new("id", DataType::Integer)))
            .declare(
                EntityDecl::new("Animal")
                    .field(FieldDecl::new("id", DataType::Integer))
                    .field(FieldDecl::new("id_place", DataType::Integer).table("Habitat")),
            );
        let registry = SchemaRegistry::build(&schema).unwrap();
        let animal = registry.entity_by_name("Animal").unwrap();
        // `id_place` minus `habitat` leaves `id_place`, which is not a key name
        assert!(animal.relationship("place").is_none());
        assert!(animal.relationship("habitat").is_none());

        let schema = Schema::new()
            .declare(EntityDecl::new("Habitat").field(FieldDecl::new("id", DataType::Integer)))
            .declare(
                EntityDecl::new("Animal")
                    .field(FieldDecl::new("id", DataType::Integer))
                    .field(FieldDecl::new("habitat_id", DataType::Integer).table("Habitat")),
            );
        let registry = SchemaRegistry::build(&schema).unwrap();
        assert_eq!(kind(&registry, "Animal", "habitat"), Some(RelationshipKind::OneToOne));
    }

    #[test]
    fn test_unresolved_override_fails() {
        let schema = Schema::new().declare(
            EntityDecl::new("Animal")
                .field(FieldDecl::new("id", DataType::Integer))
                .field(FieldDecl::new("id_cage", DataType::Integer).table("Cage")),
        );
        let err = SchemaRegistry::build(&schema).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedTableOverride { ref table, .. } if table == "Cage"));
    }

    #[test]
    fn test_entity_field_resolves_directly() {
        let schema = Schema::new()
            .declare(
                EntityDecl::new("Habitat")
                    .field(FieldDecl::new("id", DataType::BigInt))
                    .field(FieldDecl::collection("animals", "Animal")),
            )
            .declare(
                EntityDecl::new("Animal")
                    .field(FieldDecl::new("id", DataType::Integer))
                    .field(FieldDecl::entity("home", "Habitat")),
            );
        let registry = SchemaRegistry::build(&schema).unwrap();
        assert_eq!(kind(&registry, "Animal", "habitat"), Some(RelationshipKind::ManyToOne));
        let home = registry.entity_by_name("Animal").unwrap().attribute("home").unwrap();
        assert_eq!(home.data_type(), &DataType::BigInt);
    }

    #[test]
    fn test_entity_field_errors() {
        let unknown = Schema::new().declare(
            EntityDecl::new("Animal")
                .field(FieldDecl::new("id", DataType::Integer))
                .field(FieldDecl::entity("home", "Cage")),
        );
        assert!(matches!(
            SchemaRegistry::build(&unknown).unwrap_err(),
            SchemaError::UnknownEntity { .. }
        ));

        let conflicting = Schema::new()
            .declare(EntityDecl::new("Habitat").field(FieldDecl::new("id", DataType::Integer)))
            .declare(EntityDecl::new("Weather").field(FieldDecl::new("id", DataType::Integer)))
            .declare(
                EntityDecl::new("Animal")
                    .field(FieldDecl::new("id", DataType::Integer))
                    .field(FieldDecl::entity("home", "Habitat").table("Weather")),
            );
        assert!(matches!(
            SchemaRegistry::build(&conflicting).unwrap_err(),
            SchemaError::AmbiguousRelationship { .. }
        ));
    }

    #[test]
    fn test_two_foreign_keys_to_one_table_are_ambiguous() {
        let schema = Schema::new()
            .declare(EntityDecl::new("Habitat").field(FieldDecl::new("id", DataType::Integer)))
            .declare(
                EntityDecl::new("Animal")
                    .field(FieldDecl::new("id", DataType::Integer))
                    .field(FieldDecl::new("id_habitat", DataType::Integer))
                    .field(FieldDecl::entity("winter", "Habitat")),
            );
        let err = SchemaRegistry::build(&schema).unwrap_err();
        assert_eq!(
            err,
            SchemaError::AmbiguousRelationship {
                entity: "Animal".into(),
                table: "habitat".into()
            }
        );
    }

    #[test]
    fn test_self_referencing_key_is_rejected() {
        let schema = Schema::new()
            .declare(EntityDecl::new("Node").field(FieldDecl::entity("id", "Node")));
        assert_eq!(
            SchemaRegistry::build(&schema).unwrap_err(),
            SchemaError::KeyCycle {
                entity: "Node".into()
            }
        );

        let schema = Schema::new()
            .declare(EntityDecl::new("Egg").field(FieldDecl::entity("id", "Hen")))
            .declare(EntityDecl::new("Hen").field(FieldDecl::entity("id", "Egg")));
        assert!(matches!(
            SchemaRegistry::build(&schema).unwrap_err(),
            SchemaError::KeyCycle { .. }
        ));
    }

    #[test]
    fn test_key_type_follows_entity_keys() {
        let schema = Schema::new()
            .declare(EntityDecl::new("Passport").field(FieldDecl::new("id", DataType::Uuid)))
            .declare(EntityDecl::new("Citizen").field(FieldDecl::entity("id", "Passport")))
            .declare(
                EntityDecl::new("Vote")
                    .field(FieldDecl::new("id", DataType::Integer))
                    .field(FieldDecl::entity("voter", "Citizen")),
            );
        let registry = SchemaRegistry::build(&schema).unwrap();
        let vote = registry.entity_by_name("Vote").unwrap();
        assert_eq!(vote.attribute("voter").unwrap().data_type(), &DataType::Uuid);
    }

    #[test]
    fn test_duplicate_entity() {
        let schema = Schema::new()
            .declare(EntityDecl::new("Habitat").field(FieldDecl::new("id", DataType::Integer)))
            .declare(EntityDecl::new("Habitat").field(FieldDecl::new("id", DataType::Integer)));
        assert!(matches!(
            SchemaRegistry::build(&schema).unwrap_err(),
            SchemaError::DuplicateEntity { .. }
        ));
    }

    #[test]
    fn test_every_column_is_indexed() {
        let registry = registry();
        let total: usize = registry.entities().iter().map(|e| e.attributes().len()).sum();
        assert_eq!(registry.index().len(), total);

        let animal = registry.entity_by_name("Animal").unwrap();
        let token = animal.field("name");
        let resolved = registry.resolve(token).unwrap();
        assert_eq!(resolved.qualified(), "animal.name");
        assert_eq!(registry.entity(resolved.entity()).unwrap().name(), "Animal");
        assert!(registry.resolve(animal.field("foods")).is_none());
    }

    #[test]
    fn test_relationship_lookup_from_either_side() {
        let registry = registry();
        assert!(registry.relationship_between("animal", "habitat").is_some());
        assert!(registry.relationship_between("habitat", "animal").is_some());
        assert!(registry.relationship_between("animal", "job").is_none());
    }
}
