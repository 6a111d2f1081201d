//! LanceDB-backed vector store.
//!
//! The synchronous `VectorStore` surface drives an owned current-thread tokio
//! runtime, so this type must not be used from inside another runtime.
//! Every write is committed by LanceDB immediately; `persist` has nothing left
//! to flush.
use anyhow::anyhow;
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use recall_core::traits::{Embedder, VectorStore};
use recall_core::{DocumentId, Error, MetaValue, Result, SearchHit, VectorEntry};

use crate::schema::{build_vector_schema, vector_width};
use crate::table::{connect_at, open_or_create, read_meta, sql_literal, write_meta};

const DELETE_BATCH: usize = 500;

pub struct LanceVectorStore<E> {
	embedder: E,
	runtime: Runtime,
	table: Table,
	dim: i32,
}

fn lance_err(e: impl Into<anyhow::Error>) -> Error { Error::vector(format!("{:#}", e.into())) }

impl<E: Embedder> LanceVectorStore<E> {
	/// Open (or create) `table_name` under `dir`. Rows written by a different
	/// embedder are cleared.
	pub fn open(dir: &Path, table_name: &str, embedder: E) -> Result<Self> {
		let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(lance_err)?;
		let dim = i32::try_from(embedder.dim()).map_err(lance_err)?;
		let uri = dir.to_string_lossy().to_string();
		let embedder_id = embedder.embedder_id().to_string();
		let meta_key = format!("{table_name}.embedder_id");
		let table = runtime
			.block_on(async {
				let conn = connect_at(&uri).await?;
				let table = open_or_create(&conn, table_name, build_vector_schema(dim)).await?;
				let stored_dim = vector_width(table.schema().await?.as_ref());
				if stored_dim != Some(dim) {
					return Err(anyhow!("table {table_name} holds {stored_dim:?}-wide vectors, embedder produces {dim}"));
				}
				if let Some(previous) = read_meta(&conn, &meta_key).await? {
					if previous != embedder_id {
						warn!(%previous, current = %embedder_id, "clearing vectors from another embedder");
						table.delete("true").await?;
					}
				}
				write_meta(&conn, &meta_key, &embedder_id).await?;
				Ok::<_, anyhow::Error>(table)
			})
			.map_err(lance_err)?;
		info!(uri, table = table_name, "lance vector store opened");
		Ok(Self { embedder, runtime, table, dim })
	}

	pub fn embedder(&self) -> &E { &self.embedder }

	fn to_record_batch(&self, entries: &[VectorEntry]) -> anyhow::Result<RecordBatch> {
		let text = |e: &VectorEntry, key: &str| e.metadata.get(key).map(MetaValue::to_display_string).unwrap_or_default();
		let mut ids = Vec::with_capacity(entries.len());
		let mut base_ids = Vec::with_capacity(entries.len());
		let mut sources = Vec::with_capacity(entries.len());
		let mut chunk_indices = Vec::with_capacity(entries.len());
		let mut metadata = Vec::with_capacity(entries.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(entries.len());
		for e in entries {
			ids.push(e.id.clone());
			base_ids.push(text(e, "baseId"));
			sources.push(text(e, "source"));
			chunk_indices.push(match e.metadata.get("chunkIndex") { Some(MetaValue::Int(i)) => i32::try_from(*i).unwrap_or(0), _ => 0 });
			metadata.push(serde_json::to_string(&e.metadata)?);
			vectors.push(Some(e.vector.iter().map(|&x| Some(x)).collect()));
		}
		Ok(RecordBatch::try_new(
			build_vector_schema(self.dim),
			vec![
				Arc::new(StringArray::from(ids)),
				Arc::new(StringArray::from(base_ids)),
				Arc::new(StringArray::from(sources)),
				Arc::new(Int32Array::from(chunk_indices)),
				Arc::new(StringArray::from(metadata)),
				Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), self.dim)),
			],
		)?)
	}
}

impl<E: Embedder> VectorStore for LanceVectorStore<E> {
	fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() { return Ok(Vec::new()); }
		let vectors = self.embedder.embed_batch(texts).map_err(|e| Error::embedding(format!("{e:#}")))?;
		if vectors.len() != texts.len() || vectors.iter().any(|v| v.len() as i32 != self.dim) {
			return Err(Error::embedding("embedder output does not match the table shape"));
		}
		Ok(vectors)
	}

	fn upsert(&mut self, entries: Vec<VectorEntry>) -> Result<()> {
		if entries.is_empty() { return Ok(()); }
		if entries.iter().any(|e| e.vector.len() as i32 != self.dim) {
			return Err(Error::vector(format!("vector width does not match table dim {}", self.dim)));
		}
		let batch = self.to_record_batch(&entries).map_err(lance_err)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		self.runtime
			.block_on(async {
				let mut mi = self.table.merge_insert(&["id"]);
				mi.when_matched_update_all(None).when_not_matched_insert_all();
				mi.execute(reader).await
			})
			.map_err(lance_err)?;
		debug!(rows = entries.len(), "lance upsert");
		Ok(())
	}

	fn delete(&mut self, ids: &[DocumentId]) -> Result<()> {
		for chunk in ids.chunks(DELETE_BATCH) {
			let predicate = format!("id IN ({})", chunk.iter().map(|id| sql_literal(id)).collect::<Vec<_>>().join(","));
			self.runtime.block_on(self.table.delete(&predicate)).map_err(lance_err)?;
		}
		Ok(())
	}

	fn query(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 || self.len()? == 0 { return Ok(Vec::new()); }
		let q = self.embed(&[query.to_string()])?.pop().unwrap_or_default();
		let hits = self
			.runtime
			.block_on(async {
				let mut stream = self.table.vector_search(q)?.distance_type(DistanceType::Cosine).limit(k).execute().await?;
				let mut hits = Vec::new();
				while let Some(batch) = stream.try_next().await? {
					let ids = batch.column_by_name("id").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("id column missing"))?;
					let dist = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
					for i in 0..batch.num_rows() {
						let score = dist.map_or(0.0, |d| 1.0 - d.value(i));
						hits.push(SearchHit::vector(ids.value(i), score));
					}
				}
				Ok::<_, anyhow::Error>(hits)
			})
			.map_err(lance_err)?;
		Ok(hits)
	}

	fn ids(&self) -> Result<Vec<DocumentId>> {
		self.runtime
			.block_on(async {
				let mut stream = self.table.query().select(Select::columns(&["id"])).execute().await?;
				let mut out = Vec::new();
				while let Some(batch) = stream.try_next().await? {
					if let Some(col) = batch.column_by_name("id") {
						out.extend(col.as_string::<i32>().iter().flatten().map(str::to_string));
					}
				}
				Ok::<_, anyhow::Error>(out)
			})
			.map_err(lance_err)
	}

	fn persist(&mut self) -> Result<()> { Ok(()) }

	fn len(&self) -> Result<usize> { self.runtime.block_on(self.table.count_rows(None)).map_err(lance_err) }
}
