use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Rows of the serving table: identity, provenance, metadata JSON and the vector.
pub fn build_vector_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("base_id", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int32, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Key/value rows recording which embedder wrote each table.
pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(arrow_schema::TimeUnit::Millisecond, None), false),
	]))
}

/// Width of the `vector` column, if the schema has one.
pub fn vector_width(schema: &Schema) -> Option<i32> {
	match schema.field_with_name("vector").ok()?.data_type() {
		DataType::FixedSizeList(_, n) => Some(*n),
		_ => None,
	}
}
