// Copyright 2025 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Qdrant vector-store adapter.
//!
//! One collection per project, deterministically named, created through an
//! explicit exists-check-then-create. Upserts fail soft when there is nothing
//! valid to store; searches degrade to empty results on provider failure so
//! callers can treat "no results" and "error" uniformly (the distinction is
//! logged here).

use anyhow::Result;
use parking_lot::RwLock;
use qdrant_client::qdrant::{
	Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
	Distance, FieldType, Filter, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
	VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::sync::{Arc, LazyLock};

use crate::embedding::{embed_documents, EmbeddingProvider, InputType};
use crate::error::VectorStoreError;
use crate::store::chunks::PendingChunk;

/// A similarity hit from the vector store with its decoded payload.
#[derive(Debug, Clone)]
pub struct VectorHit {
	pub chunk_id: String,
	pub file_path: String,
	pub language: String,
	pub chunk_type: String,
	pub entity_name: Option<String>,
	pub start_line: usize,
	pub end_line: usize,
	pub content: String,
	/// Cosine distance; callers convert to similarity as `1 - distance`.
	pub distance: f32,
}

/// Read seam for similarity search, so retrieval can run against the real
/// adapter or a test stub.
#[async_trait::async_trait]
pub trait VectorSearch: Send + Sync {
	async fn search(
		&self,
		project_id: &str,
		query: &str,
		limit: usize,
		chunk_types: Option<&[String]>,
	) -> Result<Vec<VectorHit>>;
}

/// Process-wide lifecycle for the Qdrant connection: initialized once at
/// startup, shared by reference afterwards. `reset` exists for tests.
pub struct VectorClientManager {
	client: RwLock<Option<Arc<Qdrant>>>,
}

static VECTOR_CLIENT: LazyLock<VectorClientManager> = LazyLock::new(|| VectorClientManager {
	client: RwLock::new(None),
});

impl VectorClientManager {
	pub fn global() -> &'static VectorClientManager {
		&VECTOR_CLIENT
	}

	/// Connect on first use, reuse afterwards.
	pub fn get_or_init(&self, url: &str) -> Result<Arc<Qdrant>> {
		if let Some(client) = self.client.read().as_ref() {
			return Ok(client.clone());
		}
		let mut guard = self.client.write();
		// Re-check: another caller may have initialized while we waited
		if let Some(client) = guard.as_ref() {
			return Ok(client.clone());
		}
		let client = Arc::new(Qdrant::from_url(url).build()?);
		*guard = Some(client.clone());
		Ok(client)
	}

	/// Drop the cached connection. Test hook.
	pub fn reset(&self) {
		*self.client.write() = None;
	}
}

pub struct QdrantVectorStore {
	client: Arc<Qdrant>,
	collection_prefix: String,
	provider: Arc<dyn EmbeddingProvider>,
	batch_size: usize,
}

impl QdrantVectorStore {
	pub fn new(
		client: Arc<Qdrant>,
		collection_prefix: &str,
		provider: Arc<dyn EmbeddingProvider>,
		batch_size: usize,
	) -> Self {
		Self {
			client,
			collection_prefix: collection_prefix.to_string(),
			provider,
			batch_size,
		}
	}

	/// Deterministic collection name per project, so re-runs reuse the same
	/// collection instead of creating duplicates.
	pub fn collection_for_project(&self, project_id: &str) -> String {
		let sanitized: String = project_id
			.chars()
			.map(|c| if c.is_alphanumeric() { c } else { '_' })
			.collect();
		format!("{}_{}", self.collection_prefix, sanitized)
	}

	/// Explicit get-or-create: check existence, create when absent. Never
	/// relies on a not-found error for the expected branch.
	pub async fn ensure_collection(&self, project_id: &str) -> Result<()> {
		let collection = self.collection_for_project(project_id);
		if self.client.collection_exists(&collection).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(&collection).vectors_config(
					VectorParamsBuilder::new(self.provider.get_dimension() as u64, Distance::Cosine),
				),
			)
			.await?;

		for field in ["file_path", "chunk_type", "language"] {
			self.client
				.create_field_index(CreateFieldIndexCollectionBuilder::new(
					&collection,
					field,
					FieldType::Keyword,
				))
				.await?;
		}

		Ok(())
	}

	/// Embed and store a batch of chunks. Returns the chunk ids that were
	/// durably stored. A batch with zero valid documents after cleaning is a
	/// success with nothing stored; only transport/provider failures error.
	pub async fn upsert_chunks(
		&self,
		project_id: &str,
		chunks: &[PendingChunk],
	) -> Result<Vec<String>> {
		if chunks.is_empty() {
			return Ok(Vec::new());
		}
		let collection = self.collection_for_project(project_id);

		let documents: Vec<String> = chunks.iter().map(|c| c.embedding_document()).collect();
		let vectors =
			embed_documents(&*self.provider, &documents, InputType::Document, self.batch_size)
				.await
				.map_err(|err| VectorStoreError::EmbeddingProvider(err.to_string()))?;

		let mut points = Vec::new();
		let mut stored_ids = Vec::new();
		for (chunk, vector) in chunks.iter().zip(vectors) {
			let Some(vector) = vector else {
				// Empty document; nothing valid to store for this chunk
				continue;
			};
			let payload: std::collections::HashMap<String, qdrant_client::qdrant::Value> =
				serde_json::from_value(serde_json::json!({
					"chunk_id": chunk.chunk_id,
					"file_path": chunk.file_path,
					"language": chunk.language,
					"chunk_type": chunk.chunk_type,
					"entity_name": chunk.entity_name,
					"start_line": chunk.start_line,
					"end_line": chunk.end_line,
					"content": chunk.content,
				}))?;
			points.push(PointStruct::new(
				chunk.embedding_id.clone(),
				vector,
				payload,
			));
			stored_ids.push(chunk.chunk_id.clone());
		}

		if points.is_empty() {
			// All documents were empty after cleaning; success, nothing stored
			return Ok(Vec::new());
		}

		self.client
			.upsert_points(UpsertPointsBuilder::new(&collection, points))
			.await
			.map_err(|err| VectorStoreError::Unavailable(err.to_string()))?;

		Ok(stored_ids)
	}

	/// Remove every point belonging to a file (used before re-upserting a
	/// changed file and when a file disappears from the repository).
	pub async fn delete_file_points(&self, project_id: &str, file_path: &str) -> Result<()> {
		let collection = self.collection_for_project(project_id);
		if !self.client.collection_exists(&collection).await? {
			return Ok(());
		}
		self.client
			.delete_points(
				DeletePointsBuilder::new(&collection)
					.points(Filter::must([Condition::matches(
						"file_path",
						file_path.to_string(),
					)])),
			)
			.await?;
		Ok(())
	}

	/// Drop the project's collection entirely (repository deletion).
	pub async fn delete_collection(&self, project_id: &str) -> Result<()> {
		let collection = self.collection_for_project(project_id);
		if self.client.collection_exists(&collection).await? {
			self.client.delete_collection(&collection).await?;
		}
		Ok(())
	}
}

#[async_trait::async_trait]
impl VectorSearch for QdrantVectorStore {
	async fn search(
		&self,
		project_id: &str,
		query: &str,
		limit: usize,
		chunk_types: Option<&[String]>,
	) -> Result<Vec<VectorHit>> {
		let collection = self.collection_for_project(project_id);

		let result = async {
			let query_vector = self.provider.generate_embedding(query).await?;

			let mut builder =
				SearchPointsBuilder::new(&collection, query_vector, limit as u64).with_payload(true);
			if let Some(types) = chunk_types {
				if !types.is_empty() {
					builder = builder.filter(Filter::should(
						types
							.iter()
							.map(|t| Condition::matches("chunk_type", t.clone()))
							.collect::<Vec<_>>(),
					));
				}
			}

			let response = self.client.search_points(builder).await?;
			anyhow::Ok(
				response
					.result
					.iter()
					.filter_map(hit_from_scored_point)
					.collect::<Vec<_>>(),
			)
		}
		.await;

		// Provider failure degrades to zero results; the caller cannot tell
		// "nothing similar" from "store down", but the log can.
		match result {
			Ok(hits) => Ok(hits),
			Err(err) => {
				tracing::error!(
					project_id,
					collection = %collection,
					error = %err,
					"vector search failed, returning empty results"
				);
				Ok(Vec::new())
			}
		}
	}
}

fn hit_from_scored_point(point: &qdrant_client::qdrant::ScoredPoint) -> Option<VectorHit> {
	let payload = &point.payload;
	let get_str = |key: &str| {
		payload
			.get(key)
			.and_then(qdrant_client::qdrant::Value::as_str)
			.cloned()
	};
	let get_int = |key: &str| {
		payload
			.get(key)
			.and_then(qdrant_client::qdrant::Value::as_integer)
			.and_then(|v| usize::try_from(v).ok())
	};

	Some(VectorHit {
		chunk_id: get_str("chunk_id")?,
		file_path: get_str("file_path")?,
		language: get_str("language").unwrap_or_default(),
		chunk_type: get_str("chunk_type")?,
		entity_name: get_str("entity_name"),
		start_line: get_int("start_line")?,
		end_line: get_int("end_line")?,
		content: get_str("content").unwrap_or_default(),
		// Qdrant cosine score is a similarity; expose the distance form
		distance: 1.0 - point.score,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	struct NoopProvider;

	#[async_trait::async_trait]
	impl EmbeddingProvider for NoopProvider {
		async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>> {
			Ok(vec![0.0; 8])
		}

		async fn generate_embeddings_batch(
			&self,
			texts: Vec<String>,
			_input_type: InputType,
		) -> Result<Vec<Vec<f32>>> {
			Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
		}

		fn get_dimension(&self) -> usize {
			8
		}
	}

	fn store() -> QdrantVectorStore {
		let client = Arc::new(Qdrant::from_url("http://localhost:6334").build().unwrap());
		QdrantVectorStore::new(client, "codescout", Arc::new(NoopProvider), 32)
	}

	#[test]
	fn collection_names_are_deterministic_and_sanitized() {
		let store = store();
		assert_eq!(
			store.collection_for_project("proj-1"),
			store.collection_for_project("proj-1")
		);
		assert_eq!(store.collection_for_project("a/b c"), "codescout_a_b_c");
	}

	#[test]
	fn manager_reset_clears_cached_client() {
		let manager = VectorClientManager {
			client: RwLock::new(None),
		};
		let first = manager.get_or_init("http://localhost:6334").unwrap();
		let second = manager.get_or_init("http://localhost:6334").unwrap();
		assert!(Arc::ptr_eq(&first, &second));

		manager.reset();
		let third = manager.get_or_init("http://localhost:6334").unwrap();
		assert!(!Arc::ptr_eq(&first, &third));
	}
}
