//! Naming conventions shared by the registry and the builders

/// Table name of an entity: snake_case of its name (`AnimalFood` → `animal_food`)
pub fn table_name(entity: &str) -> String {
    let chars: Vec<char> = entity.chars().collect();
    let mut out = String::with_capacity(entity.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let after_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if after_lower || acronym_end {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(*c);
        }
    }
    out
}

/// Candidate `(prefix, table)` splits of a field name, right-most suffix first
///
/// `id_animal_food` yields `("id_animal", "food")` then `("id", "animal_food")`.
/// A split always leaves a non-empty prefix.
pub fn suffix_splits(field: &str) -> impl Iterator<Item = (&str, &str)> {
    field
        .char_indices()
        .rev()
        .filter(|&(i, c)| c == '_' && i > 0 && i + 1 < field.len())
        .map(move |(i, _)| (&field[..i], &field[i + 1..]))
}

/// Prefix left once the related table name is removed from a field name
pub fn strip_table(field: &str, table: &str) -> String {
    field.replacen(table, "", 1).trim_matches('_').to_string()
}

/// Foreign-key column of a many-to-many join table (`id` + `animal` → `id_animal`)
pub fn join_column(primary_key: &str, owner_table: &str) -> String {
    format!("{}_{}", primary_key, owner_table)
}
