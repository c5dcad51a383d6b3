use tabula_core::condition::{equals, greater, in_query, is_null, like, or};
use tabula_core::{
    count, Config, DataType, Database, Entity, EntityDecl, FieldDecl, Postgres, QueryBuilder,
    Schema, Value,
};

struct Animal;
struct Habitat;

impl Entity for Animal {
    const NAME: &'static str = "Animal";

    fn declare() -> EntityDecl {
        EntityDecl::new(Self::NAME)
            .field(FieldDecl::new("id", DataType::Integer))
            .field(FieldDecl::new("name", DataType::Text))
            .field(FieldDecl::new("id_habitat", DataType::Integer).nullable())
    }
}

impl Entity for Habitat {
    const NAME: &'static str = "Habitat";

    fn declare() -> EntityDecl {
        EntityDecl::new(Self::NAME)
            .field(FieldDecl::new("id", DataType::Integer))
            .field(FieldDecl::new("name", DataType::Text))
            .field(FieldDecl::collection("animals", "Animal"))
    }
}

fn main() -> tabula_core::Result<()> {
    let schema = Schema::new().entity::<Animal>().entity::<Habitat>();
    let db = Database::open(schema, Postgres, Config::default())?;
    let animal = db.table::<Animal>()?;
    let habitat = db.table::<Habitat>()?;

    // SELECT with a join inferred from `id_habitat`
    let select = db
        .select((animal.field("name"), habitat.field("name")))
        .join(animal.field("id_habitat"), habitat.field("id"))
        .where_(like(animal.field("name"), "%at"))
        .or_where(is_null(animal.field("id_habitat")))
        .order_by_asc(animal.field("name"))
        .page(2, 10)
        .finalize()?;
    println!("SELECT SQL: {}", select.sql);

    // Aggregate over a sub-select
    let large = db
        .select(habitat.field("id"))
        .where_(greater(habitat.field("id"), 100));
    let counted = db
        .select(count(animal.field("id")))
        .where_(in_query(animal.field("id_habitat"), large))
        .finalize()?;
    println!("COUNT SQL: {}", counted.sql);

    // INSERT returning the generated key
    let insert = db
        .insert(animal.token())
        .value(vec![("name", Value::from("Cat")), ("id_habitat", Value::I32(1))])
        .finalize()?;
    println!("INSERT SQL: {}", insert.sql);

    // UPDATE
    let update = db
        .update(animal.token())
        .set(animal.field("name"), "Lion")
        .where_([equals(animal.field("id"), 3), or(), equals(animal.field("id"), 4)])
        .finalize()?;
    println!("UPDATE SQL: {}", update.sql);

    // DELETE by primary key
    let delete = db.remove(animal.token(), [3]).finalize()?;
    println!("DELETE SQL: {}", delete.sql);

    Ok(())
}
