//! Small LanceDB helpers: table bootstrap, SQL literals and a key/value
//! side table that records which embedder filled each vector table.
use anyhow::{anyhow, Result};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::Schema;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, Table};
use std::sync::Arc;

use crate::schema::build_meta_schema;

pub const META_TABLE: &str = "recall_meta";

pub async fn connect_at(uri: &str) -> Result<Connection> { Ok(connect(uri).execute().await?) }

async fn has_table(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Open `name`, creating it empty with `schema` on first use.
pub async fn open_or_create(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<Table> {
	if !has_table(conn, name).await? {
		let empty = RecordBatchIterator::new(Vec::new().into_iter(), schema);
		conn.create_table(name, Box::new(empty)).execute().await?;
	}
	Ok(conn.open_table(name).execute().await?)
}

/// Single-quoted SQL string literal.
pub fn sql_literal(value: &str) -> String { format!("'{}'", value.replace('\'', "''")) }

pub async fn write_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
	let table = open_or_create(conn, META_TABLE, build_meta_schema()).await?;
	let row = RecordBatch::try_new(
		build_meta_schema(),
		vec![
			Arc::new(StringArray::from(vec![key])),
			Arc::new(StringArray::from(vec![value])),
			Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
		],
	)?;
	let rows = RecordBatchIterator::new(vec![Ok(row)].into_iter(), build_meta_schema());
	let mut upsert = table.merge_insert(&["key"]);
	upsert.when_matched_update_all(None).when_not_matched_insert_all();
	upsert.execute(Box::new(rows)).await?;
	Ok(())
}

pub async fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
	if !has_table(conn, META_TABLE).await? { return Ok(None); }
	let table = conn.open_table(META_TABLE).execute().await?;
	let batches: Vec<RecordBatch> = table
		.query()
		.only_if(format!("key = {}", sql_literal(key)))
		.limit(1)
		.execute()
		.await?
		.try_collect()
		.await?;
	let Some(batch) = batches.into_iter().find(|b| b.num_rows() > 0) else { return Ok(None) };
	let values = batch
		.column_by_name("value")
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("{META_TABLE}.value column missing"))?;
	Ok(Some(values.value(0).to_string()))
}
