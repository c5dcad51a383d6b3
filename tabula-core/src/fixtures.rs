//! Zoo schema shared by the unit tests

use crate::schema::{DataType, Entity, EntityDecl, FieldDecl, Schema};
use crate::{Config, Database, Postgres};

pub struct Animal;
pub struct Habitat;

impl Entity for Animal {
    const NAME: &'static str = "Animal";

    fn declare() -> EntityDecl {
        EntityDecl::new(Self::NAME)
            .field(FieldDecl::new("id", DataType::Integer))
            .field(FieldDecl::new("name", DataType::Text))
            .field(FieldDecl::new("id_habitat", DataType::Integer).nullable())
            .field(FieldDecl::new("id_info", DataType::Bytes).nullable())
            .field(FieldDecl::collection("foods", "Food").table("AnimalFood"))
    }
}

impl Entity for Habitat {
    const NAME: &'static str = "Habitat";

    fn declare() -> EntityDecl {
        EntityDecl::new(Self::NAME)
            .field(FieldDecl::new("id", DataType::Integer))
            .field(FieldDecl::new("name", DataType::Text))
            .field(FieldDecl::new("id_weather", DataType::Integer).nullable())
            .field(FieldDecl::collection("animals", "Animal"))
    }
}

pub fn zoo() -> Schema {
    Schema::new()
        .entity::<Animal>()
        .entity::<Habitat>()
        .declare(
            EntityDecl::new("Weather")
                .field(FieldDecl::new("id", DataType::Integer))
                .field(FieldDecl::new("name", DataType::Text))
                .field(FieldDecl::collection("habitats", "Habitat")),
        )
        .declare(
            EntityDecl::new("Info")
                .field(FieldDecl::new("id", DataType::Bytes))
                .field(FieldDecl::new("name", DataType::Text))
                .field(FieldDecl::new("id_status", DataType::Integer)),
        )
        .declare(
            EntityDecl::new("Status")
                .field(FieldDecl::new("id", DataType::Integer))
                .field(FieldDecl::new("name", DataType::Text)),
        )
        .declare(
            EntityDecl::new("Food")
                .field(FieldDecl::new("id", DataType::Uuid))
                .field(FieldDecl::new("name", DataType::Text)),
        )
        .declare(
            EntityDecl::new("AnimalFood")
                .field(FieldDecl::new("id_animal", DataType::Integer).primary_key())
                .field(FieldDecl::new("id_food", DataType::Uuid).primary_key()),
        )
        .declare(
            EntityDecl::new("User")
                .field(FieldDecl::new("id", DataType::Integer))
                .field(FieldDecl::new("name", DataType::Text))
                .field(FieldDecl::new("email", DataType::Text))
                .field(FieldDecl::collection("roles", "Role").table("UserRole")),
        )
        .declare(
            EntityDecl::new("Role")
                .field(FieldDecl::new("id", DataType::Integer))
                .field(FieldDecl::new("name", DataType::Text)),
        )
        .declare(
            EntityDecl::new("UserRole")
                .field(FieldDecl::new("id_user", DataType::Integer).primary_key())
                .field(FieldDecl::new("id_role", DataType::Integer).primary_key())
                .field(FieldDecl::new("end_date", DataType::Timestamp).nullable()),
        )
        .declare(
            EntityDecl::new("Person")
                .field(FieldDecl::new("id", DataType::Integer))
                .field(FieldDecl::new("name", DataType::Text))
                .field(FieldDecl::collection("jobs", "Job").table("PersonJob")),
        )
        .declare(
            EntityDecl::new("Job")
                .field(FieldDecl::new("id", DataType::Integer))
                .field(FieldDecl::new("name", DataType::Text))
                .field(FieldDecl::collection("persons", "Person").table("PersonJob")),
        )
        .declare(
            EntityDecl::new("PersonJob")
                .field(FieldDecl::new("id_person", DataType::Integer).primary_key())
                .field(FieldDecl::new("id_job", DataType::Integer).primary_key())
                .field(FieldDecl::new("created_at", DataType::Timestamp)),
        )
}

/// Zoo database rendering PostgreSQL syntax
pub fn database() -> Database {
    Database::open(zoo(), Postgres, Config::default()).unwrap()
}
