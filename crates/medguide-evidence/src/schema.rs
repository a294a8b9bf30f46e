use tantivy::schema::{self, Schema, FAST, INDEXED, STORED, STRING, TEXT};

/// Field names used in the guideline passage index.
pub mod field {
    pub const ID: &str = "id";
    pub const DOCUMENT: &str = "document";
    pub const PAGE: &str = "page";
    pub const TITLE: &str = "title";
    pub const BODY: &str = "body";
    pub const TERMS: &str = "terms";
    pub const GRADE: &str = "grade";
    pub const PUBLISHED_AT: &str = "published_at";
}

pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    // `document#page`, exact match for resolve
    builder.add_text_field(field::ID, STRING | STORED);
    builder.add_text_field(field::DOCUMENT, STRING | STORED);
    builder.add_u64_field(field::PAGE, INDEXED | STORED);

    builder.add_text_field(field::TITLE, TEXT | STORED);
    builder.add_text_field(field::BODY, TEXT | STORED);

    // Canonical term codes, one value per code
    builder.add_text_field(field::TERMS, STRING | STORED);
    builder.add_text_field(field::GRADE, STRING | STORED);

    // Unix seconds
    builder.add_i64_field(field::PUBLISHED_AT, INDEXED | STORED | FAST);

    builder.build()
}

/// Resolve a field by name from the schema.
///
/// # Panics
///
/// Panics if the field name does not exist in the schema. Only called with
/// the constants in [`field`].
pub fn get_field(schema: &Schema, name: &str) -> schema::Field {
    schema
        .get_field(name)
        .unwrap_or_else(|_| panic!("field '{name}' not found in schema"))
}
