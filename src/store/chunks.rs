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

//! Chunk persistence. Chunks are owned by their file: every reparse deletes
//! the old set and inserts the new one in a single transaction.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::constants::CHUNK_PREVIEW_CHARS;
use crate::parser::{self, Complexity};

use super::models::CodeChunk;
use super::SqliteStore;

/// A chunk queued for embedding, joined with its file context.
#[derive(Debug, Clone)]
pub struct PendingChunk {
	pub chunk_id: String,
	pub embedding_id: String,
	pub file_path: String,
	pub language: String,
	pub chunk_type: String,
	pub entity_name: Option<String>,
	pub start_line: i64,
	pub end_line: i64,
	pub content: String,
}

impl PendingChunk {
	/// Document text sent to the embedding provider: a small contextual
	/// header in front of the raw content so nearby hits carry their origin.
	pub fn embedding_document(&self) -> String {
		let entity = self.entity_name.as_deref().unwrap_or("");
		format!(
			"// {} {} ({} lines {}-{})\n{}",
			self.language, entity, self.chunk_type, self.start_line, self.end_line, self.content
		)
	}
}

impl SqliteStore {
	/// Replace a file's chunk set with freshly parsed chunks. Returns the new
	/// rows, each carrying a new embedding id with `embedding_stored = false`.
	pub async fn replace_file_chunks(
		&self,
		file_id: &str,
		chunks: &[parser::Chunk],
	) -> Result<Vec<CodeChunk>> {
		let mut tx = self.pool().begin().await?;
		sqlx::query("DELETE FROM code_chunks WHERE file_id = ?")
			.bind(file_id)
			.execute(&mut *tx)
			.await?;

		let mut rows = Vec::with_capacity(chunks.len());
		for chunk in chunks {
			let id = uuid::Uuid::new_v4().to_string();
			let embedding_id = uuid::Uuid::new_v4().to_string();
			let preview = parser::preview(&chunk.content, CHUNK_PREVIEW_CHARS);
			sqlx::query(
				r#"
				INSERT INTO code_chunks
					(id, file_id, chunk_type, content, preview, start_line, end_line,
					 entity_name, complexity, dependencies, parameters, description,
					 embedding_id, embedding_stored)
				VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
				"#,
			)
			.bind(&id)
			.bind(file_id)
			.bind(chunk.kind.as_str())
			.bind(&chunk.content)
			.bind(&preview)
			.bind(chunk.start_line as i64)
			.bind(chunk.end_line as i64)
			.bind(&chunk.name)
			.bind(chunk.complexity.as_str())
			.bind(serde_json::to_string(&chunk.dependencies)?)
			.bind(serde_json::to_string(&chunk.parameters)?)
			.bind(&chunk.docstring)
			.bind(&embedding_id)
			.execute(&mut *tx)
			.await?;

			rows.push(CodeChunk {
				id,
				file_id: file_id.to_string(),
				chunk_type: chunk.kind.as_str().to_string(),
				content: chunk.content.clone(),
				preview,
				start_line: chunk.start_line as i64,
				end_line: chunk.end_line as i64,
				entity_name: chunk.name.clone(),
				complexity: chunk.complexity,
				dependencies: chunk.dependencies.clone(),
				parameters: chunk.parameters.clone(),
				description: chunk.docstring.clone(),
				embedding_id,
				embedding_stored: false,
			});
		}
		tx.commit().await?;
		Ok(rows)
	}

	pub async fn get_file_chunks(&self, file_id: &str) -> Result<Vec<CodeChunk>> {
		let rows = sqlx::query("SELECT * FROM code_chunks WHERE file_id = ? ORDER BY start_line")
			.bind(file_id)
			.fetch_all(self.pool())
			.await?;
		Ok(rows.iter().map(chunk_from_row).collect())
	}

	/// Chunks whose embeddings have not been confirmed in the vector store.
	/// Drives the idempotent reconciliation pass.
	pub async fn pending_embedding_chunks(
		&self,
		repository_id: &str,
		limit: usize,
	) -> Result<Vec<PendingChunk>> {
		let rows = sqlx::query(
			r#"
			SELECT c.id AS chunk_id, c.embedding_id, c.chunk_type, c.entity_name,
			       c.start_line, c.end_line, c.content, f.file_path, f.language
			FROM code_chunks c
			JOIN indexed_files f ON f.id = c.file_id
			WHERE f.repository_id = ? AND c.embedding_stored = 0
			ORDER BY f.file_path, c.start_line
			LIMIT ?
			"#,
		)
		.bind(repository_id)
		.bind(limit as i64)
		.fetch_all(self.pool())
		.await?;

		Ok(rows
			.into_iter()
			.map(|r| PendingChunk {
				chunk_id: r.get("chunk_id"),
				embedding_id: r.get("embedding_id"),
				file_path: r.get("file_path"),
				language: r.get("language"),
				chunk_type: r.get("chunk_type"),
				entity_name: r.get("entity_name"),
				start_line: r.get("start_line"),
				end_line: r.get("end_line"),
				content: r.get("content"),
			})
			.collect())
	}

	pub async fn mark_embeddings_stored(&self, chunk_ids: &[String]) -> Result<()> {
		let mut tx = self.pool().begin().await?;
		for chunk_id in chunk_ids {
			sqlx::query("UPDATE code_chunks SET embedding_stored = 1 WHERE id = ?")
				.bind(chunk_id)
				.execute(&mut *tx)
				.await?;
		}
		tx.commit().await?;
		Ok(())
	}

	/// Look up the chunk backing a structured-index entry by its location.
	pub async fn get_chunk_by_location(
		&self,
		repository_id: &str,
		file_path: &str,
		start_line: i64,
	) -> Result<Option<CodeChunk>> {
		let row = sqlx::query(
			r#"
			SELECT c.* FROM code_chunks c
			JOIN indexed_files f ON f.id = c.file_id
			WHERE f.repository_id = ? AND f.file_path = ? AND c.start_line = ?
			LIMIT 1
			"#,
		)
		.bind(repository_id)
		.bind(file_path)
		.bind(start_line)
		.fetch_optional(self.pool())
		.await?;
		Ok(row.as_ref().map(chunk_from_row))
	}

	pub async fn count_repository_chunks(&self, repository_id: &str) -> Result<i64> {
		let count: i64 = sqlx::query_scalar(
			r#"
			SELECT COUNT(*) FROM code_chunks c
			JOIN indexed_files f ON f.id = c.file_id
			WHERE f.repository_id = ?
			"#,
		)
		.bind(repository_id)
		.fetch_one(self.pool())
		.await?;
		Ok(count)
	}
}

fn chunk_from_row(row: &SqliteRow) -> CodeChunk {
	let complexity: String = row.get("complexity");
	let dependencies: String = row.get("dependencies");
	let parameters: String = row.get("parameters");
	CodeChunk {
		id: row.get("id"),
		file_id: row.get("file_id"),
		chunk_type: row.get("chunk_type"),
		content: row.get("content"),
		preview: row.get("preview"),
		start_line: row.get("start_line"),
		end_line: row.get("end_line"),
		entity_name: row.get("entity_name"),
		complexity: Complexity::parse(&complexity),
		dependencies: serde_json::from_str(&dependencies).unwrap_or_default(),
		parameters: serde_json::from_str(&parameters).unwrap_or_default(),
		description: row.get("description"),
		embedding_id: row.get("embedding_id"),
		embedding_stored: row.get::<i64, _>("embedding_stored") != 0,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::models::FileStatus;
	use crate::store::SqliteStore;

	async fn fixture(store: &SqliteStore) -> (String, String) {
		let repo = store
			.get_or_create_repository(
				"proj-1",
				"https://github.com/acme/widgets",
				"acme",
				"widgets",
				"main",
				&[],
				&[],
				500,
			)
			.await
			.unwrap();
		let file = store
			.upsert_file(
				&repo.id,
				"src/app.py",
				"py",
				100,
				"hash-1",
				"python",
				FileStatus::Indexed,
				None,
				None,
			)
			.await
			.unwrap();
		(repo.id, file.id)
	}

	fn sample_chunks() -> Vec<crate::parser::Chunk> {
		let parsed = crate::parser::parse(
			"src/app.py",
			"def handler(request):\n    return request.user\n",
		);
		parsed.chunks
	}

	#[tokio::test]
	async fn replace_is_delete_then_insert() {
		let store = SqliteStore::connect_memory().await.unwrap();
		let (_repo_id, file_id) = fixture(&store).await;

		let first = store
			.replace_file_chunks(&file_id, &sample_chunks())
			.await
			.unwrap();
		let second = store
			.replace_file_chunks(&file_id, &sample_chunks())
			.await
			.unwrap();

		let stored = store.get_file_chunks(&file_id).await.unwrap();
		assert_eq!(stored.len(), second.len());
		// Old rows are gone, including their embedding ids
		for old in &first {
			assert!(stored.iter().all(|c| c.id != old.id));
		}
	}

	#[tokio::test]
	async fn pending_chunks_flip_on_mark() {
		let store = SqliteStore::connect_memory().await.unwrap();
		let (repo_id, file_id) = fixture(&store).await;
		let rows = store
			.replace_file_chunks(&file_id, &sample_chunks())
			.await
			.unwrap();
		assert!(!rows.is_empty());

		let pending = store.pending_embedding_chunks(&repo_id, 100).await.unwrap();
		assert_eq!(pending.len(), rows.len());

		let ids: Vec<String> = rows.iter().map(|c| c.id.clone()).collect();
		store.mark_embeddings_stored(&ids).await.unwrap();

		let pending = store.pending_embedding_chunks(&repo_id, 100).await.unwrap();
		assert!(pending.is_empty());
	}

	#[tokio::test]
	async fn embedding_document_carries_context() {
		let pending = PendingChunk {
			chunk_id: "c1".into(),
			embedding_id: "e1".into(),
			file_path: "src/auth.py".into(),
			language: "python".into(),
			chunk_type: "function".into(),
			entity_name: Some("login".into()),
			start_line: 10,
			end_line: 30,
			content: "def login(): ...".into(),
		};
		let doc = pending.embedding_document();
		assert!(doc.contains("python"));
		assert!(doc.contains("login"));
		assert!(doc.ends_with("def login(): ..."));
	}
}
