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

//! Hybrid retrieval: structured index first, vector similarity as a
//! supplement. Index hits are never displaced by vector hits, only topped up.
//! Read-only and stateless; concurrent calls need no coordination.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::constants::{CONTEXT_TRUNCATION_NOTICE, MAX_QUERY_EXPANSIONS};
use crate::store::{RepositoryStatus, SqliteStore};
use crate::vector::VectorSearch;

/// Domain synonym groups for query expansion. The first term is the trigger
/// family; any member appearing in the query pulls in the rest.
const SYNONYM_GROUPS: &[&[&str]] = &[
	&["auth", "login", "session", "credential", "token"],
	&["database", "db", "storage", "persistence", "model"],
	&["api", "endpoint", "route", "handler", "request"],
	&["test", "spec", "fixture", "mock"],
	&["config", "settings", "options", "environment"],
	&["error", "exception", "failure", "retry"],
	&["user", "account", "profile", "member"],
	&["payment", "billing", "invoice", "subscription"],
];

/// One retrieved chunk, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
	pub source: &'static str,
	pub file_path: String,
	pub chunk_type: String,
	pub entity_name: Option<String>,
	pub language: String,
	pub content: String,
	pub start_line: i64,
	pub end_line: i64,
	pub relevance: f32,
}

/// Retrieval outcome. `error` is a structured field, not an exception:
/// querying before indexing finishes is an expected, frequent condition.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
	pub chunks: Vec<RetrievedChunk>,
	pub retrieval_time_ms: u64,
	pub error: Option<String>,
}

impl RetrievalResult {
	fn failed(message: String, elapsed_ms: u64) -> Self {
		Self {
			chunks: Vec::new(),
			retrieval_time_ms: elapsed_ms,
			error: Some(message),
		}
	}
}

/// Context bundle for a single feature request from the AI agent.
#[derive(Debug, Clone)]
pub struct FeatureContext {
	pub context: String,
	pub suggestions: Vec<String>,
	pub relevant_files: Vec<String>,
	pub error: Option<String>,
}

/// Append synonym groups triggered by the query, up to a fixed cap.
pub fn expand_query(query: &str) -> String {
	let lowered = query.to_lowercase();
	let mut expanded = query.to_string();
	let mut expansions = 0usize;

	for group in SYNONYM_GROUPS {
		if expansions >= MAX_QUERY_EXPANSIONS {
			break;
		}
		if group.iter().any(|term| lowered.contains(term)) {
			for term in *group {
				if !lowered.contains(term) {
					expanded.push(' ');
					expanded.push_str(term);
				}
			}
			expansions += 1;
		}
	}
	expanded
}

pub struct RetrievalEngine {
	store: Arc<SqliteStore>,
	vectors: Arc<dyn VectorSearch>,
	config: Arc<Config>,
}

impl RetrievalEngine {
	pub fn new(store: Arc<SqliteStore>, vectors: Arc<dyn VectorSearch>, config: Arc<Config>) -> Self {
		Self {
			store,
			vectors,
			config,
		}
	}

	/// Retrieve up to `max_chunks` chunks for a natural-language query.
	/// The structured index is always consulted first; the vector store is
	/// only queried for the remaining slots.
	pub async fn retrieve(
		&self,
		project_id: &str,
		query: &str,
		max_chunks: usize,
		chunk_types: Option<&[String]>,
	) -> Result<RetrievalResult> {
		let started = Instant::now();
		let elapsed = |s: &Instant| s.elapsed().as_millis() as u64;

		let Some(repo) = self.store.get_repository_by_project(project_id).await? else {
			return Ok(RetrievalResult::failed(
				"No repository is indexed for this project".to_string(),
				elapsed(&started),
			));
		};
		if repo.status != RepositoryStatus::Completed {
			return Ok(RetrievalResult::failed(
				format!(
					"Repository indexing is not complete (status: {})",
					repo.status.as_str()
				),
				elapsed(&started),
			));
		}

		let mut chunks: Vec<RetrievedChunk> = Vec::new();

		let index_entries = self
			.store
			.search_index(&repo.id, query, chunk_types, None, max_chunks)
			.await?;
		for (rank, entry) in index_entries.iter().enumerate() {
			// Synthetic, monotonically decreasing scores keep index hits
			// deterministically ahead of vector hits at equal rank.
			let relevance = 1.0 - rank as f32 * 0.01;
			let content = match self
				.store
				.get_chunk_by_location(&repo.id, &entry.file_path, entry.start_line)
				.await?
			{
				Some(chunk) => chunk.content,
				None => entry.qualified_name.clone(),
			};
			chunks.push(RetrievedChunk {
				source: "index",
				file_path: entry.file_path.clone(),
				chunk_type: entry.entity_type.clone(),
				entity_name: Some(entry.entity_name.clone()),
				language: entry.language.clone(),
				content,
				start_line: entry.start_line,
				end_line: entry.end_line,
				relevance: relevance.max(0.0),
			});
		}

		if chunks.len() < max_chunks {
			let remaining = max_chunks - chunks.len();
			let expanded = expand_query(query);
			match self
				.vectors
				.search(project_id, &expanded, remaining, chunk_types)
				.await
			{
				Ok(hits) => {
					for hit in hits {
						let duplicate = chunks.iter().any(|c| {
							c.file_path == hit.file_path && c.start_line == hit.start_line as i64
						});
						if duplicate {
							continue;
						}
						chunks.push(RetrievedChunk {
							source: "vector",
							file_path: hit.file_path,
							chunk_type: hit.chunk_type,
							entity_name: hit.entity_name,
							language: hit.language,
							content: hit.content,
							start_line: hit.start_line as i64,
							end_line: hit.end_line as i64,
							relevance: 1.0 - hit.distance,
						});
					}
				}
				Err(err) => {
					// Degrade to index-only results; the distinction lives in
					// the log, not the caller-visible result.
					tracing::error!(project_id, error = %err, "vector search failed during retrieval");
				}
			}
		}

		chunks.truncate(max_chunks);
		Ok(RetrievalResult {
			chunks,
			retrieval_time_ms: elapsed(&started),
			error: None,
		})
	}

	/// Assemble retrieved chunks into a bounded Markdown context document.
	/// Output length never exceeds `max_length` plus the truncation notice.
	pub fn assemble_context(&self, chunks: &[RetrievedChunk], max_length: usize) -> String {
		let mut sorted: Vec<&RetrievedChunk> = chunks.iter().collect();
		sorted.sort_by(|a, b| {
			b.relevance
				.partial_cmp(&a.relevance)
				.unwrap_or(std::cmp::Ordering::Equal)
		});

		// Group by file, files ordered by their best-ranked chunk
		let mut file_order: Vec<&str> = Vec::new();
		for chunk in &sorted {
			if !file_order.contains(&chunk.file_path.as_str()) {
				file_order.push(&chunk.file_path);
			}
		}

		let mut output = String::new();
		let mut truncated = false;

		'files: for file in file_order {
			let header = format!("## File: {}\n\n", file);
			if output.len() + header.len() > max_length {
				truncated = true;
				break;
			}
			output.push_str(&header);

			for chunk in sorted.iter().filter(|c| c.file_path == file) {
				let entity = chunk.entity_name.as_deref().unwrap_or("(unnamed)");
				let section = format!(
					"### {} `{}` (lines {}-{}, relevance {:.0}%)\n\n```{}\n{}\n```\n\n",
					chunk.chunk_type,
					entity,
					chunk.start_line,
					chunk.end_line,
					chunk.relevance * 100.0,
					chunk.language,
					chunk.content
				);
				if output.len() + section.len() > max_length {
					truncated = true;
					break 'files;
				}
				output.push_str(&section);
			}
		}

		if truncated {
			output.push_str(CONTEXT_TRUNCATION_NOTICE);
		}
		output
	}

	/// Context bundle for a feature description: assembled code context plus
	/// suggestions and the list of relevant files.
	pub async fn context_for_feature(
		&self,
		project_id: &str,
		description: &str,
	) -> Result<FeatureContext> {
		let result = self
			.retrieve(project_id, description, self.config.search.max_chunks, None)
			.await?;

		if let Some(error) = result.error {
			return Ok(FeatureContext {
				context: String::new(),
				suggestions: vec![
					"Index the project's repository before requesting code context".to_string(),
				],
				relevant_files: Vec::new(),
				error: Some(error),
			});
		}

		let mut relevant_files: Vec<String> = Vec::new();
		for chunk in &result.chunks {
			if !relevant_files.contains(&chunk.file_path) {
				relevant_files.push(chunk.file_path.clone());
			}
		}

		let mut suggestions = Vec::new();
		if let Some(top) = relevant_files.first() {
			suggestions.push(format!("Start from {}, the closest match to this feature", top));
		}
		if result.chunks.iter().any(|c| c.chunk_type == "class") {
			suggestions
				.push("Extend the existing classes rather than introducing parallel ones".to_string());
		}
		if result.chunks.is_empty() {
			suggestions.push(
				"No similar code found; this feature likely needs a new module".to_string(),
			);
		}

		let context = self.assemble_context(&result.chunks, self.config.search.max_context_length);
		Ok(FeatureContext {
			context,
			suggestions,
			relevant_files,
			error: None,
		})
	}

	/// Markdown context for PRD generation: project description plus the
	/// most relevant existing code per requested feature.
	pub async fn context_for_prd(
		&self,
		project_id: &str,
		description: &str,
		features: &[String],
	) -> Result<String> {
		let mut output = format!("# Project Context\n\n{}\n", description.trim());

		// Per-feature retrievals are independent reads; run them together.
		let lookups = features.iter().take(8).map(|feature| {
			let feature = feature.clone();
			async move {
				let result = self.retrieve(project_id, &feature, 5, None).await;
				(feature, result)
			}
		});
		let results = futures::future::join_all(lookups).await;

		for (feature, result) in results {
			output.push_str(&format!("\n## Feature: {}\n\n", feature));
			match result {
				Ok(result) if result.error.is_none() && !result.chunks.is_empty() => {
					output.push_str("Related existing code:\n\n");
					for chunk in &result.chunks {
						output.push_str(&format!(
							"- `{}` {} in {} (lines {}-{})\n",
							chunk.entity_name.as_deref().unwrap_or("(unnamed)"),
							chunk.chunk_type,
							chunk.file_path,
							chunk.start_line,
							chunk.end_line
						));
					}
				}
				Ok(result) => {
					if let Some(error) = result.error {
						output.push_str(&format!("_Context unavailable: {}_\n", error));
					} else {
						output.push_str("_No related code indexed yet._\n");
					}
				}
				Err(err) => {
					tracing::warn!(feature = %feature, error = %err, "PRD feature lookup failed");
					output.push_str("_Context lookup failed._\n");
				}
			}
		}

		Ok(output)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::vector::{VectorHit, VectorSearch};
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct StubVectors {
		calls: AtomicUsize,
		hits: Vec<VectorHit>,
	}

	impl StubVectors {
		fn empty() -> Self {
			Self {
				calls: AtomicUsize::new(0),
				hits: Vec::new(),
			}
		}

		fn with_hits(hits: Vec<VectorHit>) -> Self {
			Self {
				calls: AtomicUsize::new(0),
				hits,
			}
		}
	}

	#[async_trait::async_trait]
	impl VectorSearch for StubVectors {
		async fn search(
			&self,
			_project_id: &str,
			_query: &str,
			limit: usize,
			_chunk_types: Option<&[String]>,
		) -> Result<Vec<VectorHit>> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(self.hits.iter().take(limit).cloned().collect())
		}
	}

	fn vector_hit(file: &str, name: &str, distance: f32) -> VectorHit {
		VectorHit {
			chunk_id: format!("{}-{}", file, name),
			file_path: file.to_string(),
			language: "python".to_string(),
			chunk_type: "function".to_string(),
			entity_name: Some(name.to_string()),
			start_line: 100,
			end_line: 120,
			content: format!("def {}(): ...", name),
			distance,
		}
	}

	async fn engine_with_indexed_repo(
		vectors: Arc<dyn VectorSearch>,
		status: RepositoryStatus,
		source_files: usize,
	) -> RetrievalEngine {
		let store = Arc::new(SqliteStore::connect_memory().await.unwrap());
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

		for i in 0..source_files {
			let path = format!("src/auth_{}.py", i);
			let source = format!(
				"def login_handler_{}(request):\n    return request.session\n",
				i
			);
			let parsed = crate::parser::parse(&path, &source);
			let file = store
				.upsert_file(
					&repo.id,
					&path,
					"py",
					100,
					&format!("hash-{}", i),
					"python",
					crate::store::FileStatus::Indexed,
					None,
					None,
				)
				.await
				.unwrap();
			store.replace_file_chunks(&file.id, &parsed.chunks).await.unwrap();
			store
				.rebuild_file_index(&repo.id, &path, "python", &parsed)
				.await
				.unwrap();
		}

		store
			.set_repository_status(&repo.id, status, None)
			.await
			.unwrap();

		RetrievalEngine::new(store, vectors, Arc::new(Config::default()))
	}

	#[tokio::test]
	async fn vector_store_never_queried_when_index_fills_quota() {
		let stub = Arc::new(StubVectors::empty());
		let engine =
			engine_with_indexed_repo(stub.clone(), RepositoryStatus::Completed, 6).await;

		let result = engine.retrieve("proj-1", "login", 3, None).await.unwrap();
		assert_eq!(result.chunks.len(), 3);
		assert!(result.chunks.iter().all(|c| c.source == "index"));
		assert_eq!(stub.calls.load(Ordering::SeqCst), 0, "vector store was queried");
	}

	#[tokio::test]
	async fn vector_hits_supplement_but_never_displace_index_hits() {
		let stub = Arc::new(StubVectors::with_hits(vec![
			vector_hit("src/other.py", "verify_token", 0.2),
			vector_hit("src/more.py", "refresh_session", 0.4),
		]));
		let engine =
			engine_with_indexed_repo(stub.clone(), RepositoryStatus::Completed, 1).await;

		let result = engine.retrieve("proj-1", "login", 5, None).await.unwrap();
		assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

		let index_count = result.chunks.iter().filter(|c| c.source == "index").count();
		assert!(index_count >= 1);
		// Index results come first, vector results after
		let first_vector = result
			.chunks
			.iter()
			.position(|c| c.source == "vector")
			.unwrap();
		assert!(result.chunks[..first_vector]
			.iter()
			.all(|c| c.source == "index"));
		// Vector similarity is 1 - distance
		let vector_chunk = result
			.chunks
			.iter()
			.find(|c| c.entity_name.as_deref() == Some("verify_token"))
			.unwrap();
		assert!((vector_chunk.relevance - 0.8).abs() < 1e-6);
	}

	#[tokio::test]
	async fn incomplete_repository_is_structured_error() {
		let stub = Arc::new(StubVectors::empty());
		let engine =
			engine_with_indexed_repo(stub.clone(), RepositoryStatus::Indexing, 2).await;

		let result = engine.retrieve("proj-1", "login", 5, None).await.unwrap();
		assert!(result.chunks.is_empty());
		let error = result.error.unwrap();
		assert!(error.contains("indexing"));
		assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn unknown_project_is_structured_error() {
		let store = Arc::new(SqliteStore::connect_memory().await.unwrap());
		let engine = RetrievalEngine::new(
			store,
			Arc::new(StubVectors::empty()),
			Arc::new(Config::default()),
		);
		let result = engine.retrieve("ghost", "query", 5, None).await.unwrap();
		assert!(result.chunks.is_empty());
		assert!(result.error.unwrap().contains("No repository"));
	}

	#[tokio::test]
	async fn context_never_exceeds_budget_plus_notice() {
		let stub = Arc::new(StubVectors::empty());
		let engine =
			engine_with_indexed_repo(stub, RepositoryStatus::Completed, 10).await;
		let result = engine.retrieve("proj-1", "login", 10, None).await.unwrap();
		assert!(!result.chunks.is_empty());

		let max_length = 300;
		let context = engine.assemble_context(&result.chunks, max_length);
		assert!(context.len() <= max_length + CONTEXT_TRUNCATION_NOTICE.len());
		assert!(context.ends_with(CONTEXT_TRUNCATION_NOTICE));
	}

	#[test]
	fn expansion_adds_synonyms_with_cap() {
		let expanded = expand_query("fix login flow");
		assert!(expanded.contains("auth"));
		assert!(expanded.contains("session"));
		assert!(expanded.starts_with("fix login flow"));

		// Unrelated query expands to itself
		assert_eq!(expand_query("quantum chromodynamics"), "quantum chromodynamics");
	}

	#[tokio::test]
	async fn feature_context_lists_relevant_files() {
		let stub = Arc::new(StubVectors::empty());
		let engine =
			engine_with_indexed_repo(stub, RepositoryStatus::Completed, 3).await;

		let feature = engine
			.context_for_feature("proj-1", "improve login")
			.await
			.unwrap();
		assert!(feature.error.is_none());
		assert!(!feature.relevant_files.is_empty());
		assert!(!feature.suggestions.is_empty());
		assert!(feature.context.contains("## File:"));
	}
}
