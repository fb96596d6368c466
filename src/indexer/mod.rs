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

//! Indexing orchestrator: coordinates fetcher, parser, structured index,
//! embedding generation and the vector store across one repository run.
//!
//! Per-file failures are counted, never fatal; the run's final status comes
//! from the graduated success-ratio policy. The scratch workspace is owned by
//! the run and released on every exit path.

pub mod insights;
pub mod stack_detect;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::constants::{STATUS_PARTIAL_RATIO, STATUS_WARN_RATIO};
use crate::embedding::calculate_content_hash;
use crate::error::FetchError;
use crate::fetcher::{self, Diff};
use crate::parser;
use crate::state::SharedState;
use crate::store::chunks::PendingChunk;
use crate::store::{FileStatus, Repository, RepositoryStatus, SqliteStore};
use crate::vector::QdrantVectorStore;

/// Result of one orchestration run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
	pub status: RepositoryStatus,
	pub message: String,
	pub indexed_files: usize,
	pub skipped_files: usize,
	pub error_files: usize,
	pub up_to_date: bool,
}

impl RunOutcome {
	fn aborted(message: String) -> Self {
		Self {
			status: RepositoryStatus::Error,
			message,
			indexed_files: 0,
			skipped_files: 0,
			error_files: 0,
			up_to_date: false,
		}
	}
}

/// Final status policy over the run's success ratio. Large heterogeneous
/// repositories always contain some unparseable files; a minority of errors
/// must not fail the whole run.
pub fn final_status(success: usize, errors: usize) -> (RepositoryStatus, String) {
	let total = success + errors;
	if total == 0 {
		return (
			RepositoryStatus::Completed,
			"Repository is already up to date".to_string(),
		);
	}
	let ratio = success as f64 / total as f64;
	if errors == 0 {
		(
			RepositoryStatus::Completed,
			format!("Successfully indexed {} files", success),
		)
	} else if ratio >= STATUS_WARN_RATIO {
		(
			RepositoryStatus::Completed,
			format!(
				"Successfully indexed {}/{} files ({} files skipped)",
				success, total, errors
			),
		)
	} else if ratio >= STATUS_PARTIAL_RATIO {
		(
			RepositoryStatus::Completed,
			format!(
				"Partial indexing: only {}/{} files indexed; retrieval may be incomplete",
				success, total
			),
		)
	} else {
		(
			RepositoryStatus::Error,
			format!(
				"Indexing failed: only {}/{} files could be indexed",
				success, total
			),
		)
	}
}

pub struct Orchestrator {
	store: Arc<SqliteStore>,
	vectors: Arc<QdrantVectorStore>,
	config: Arc<Config>,
}

impl Orchestrator {
	pub fn new(
		store: Arc<SqliteStore>,
		vectors: Arc<QdrantVectorStore>,
		config: Arc<Config>,
	) -> Self {
		Self {
			store,
			vectors,
			config,
		}
	}

	/// Run a full or incremental indexing pass for one repository.
	pub async fn run(
		&self,
		repository_id: &str,
		force_full: bool,
		state: SharedState,
	) -> Result<RunOutcome> {
		let repo = self
			.store
			.get_repository(repository_id)
			.await?
			.with_context(|| format!("unknown repository {}", repository_id))?;

		{
			let mut guard = state.write();
			guard.repository_id = repo.id.clone();
			guard.force_full = force_full;
			guard.status_message = "Validating repository access...".to_string();
		}

		self.store
			.set_repository_status(&repo.id, RepositoryStatus::Indexing, None)
			.await?;

		let token = self.config.github.token.as_deref();
		if let Err(err) =
			fetcher::validate_access(&self.config.github.api_base, &repo.url, token).await
		{
			return self.abort(&repo, err).await;
		}

		state.write().status_message = "Cloning repository...".to_string();
		let workspace = match fetcher::clone_repository(&repo.url, &repo.branch, token) {
			Ok(workspace) => workspace,
			Err(err) => return self.abort(&repo, err).await,
		};
		// From here on the workspace tempdir is dropped on every return path.

		let current_commit = match fetcher::current_commit(&workspace) {
			Ok(commit) => commit,
			Err(err) => {
				return self
					.abort(&repo, FetchError::CloneError(err.to_string()))
					.await
			}
		};

		let diff = if force_full {
			Diff::Full
		} else {
			fetcher::diff_since(&workspace, repo.last_commit_hash.as_deref(), &current_commit)
		};

		if let Diff::Changed(changed) = &diff {
			if changed.is_empty() && repo.last_commit_hash.is_some() {
				// Idempotent no-op: no per-file record is touched.
				let message = "Repository is already up to date";
				self.store
					.set_repository_status(&repo.id, RepositoryStatus::Completed, Some(message))
					.await?;
				state.write().indexing_complete = true;
				tracing::info!(repository = %repo.id, "no commit changes since last index");
				return Ok(RunOutcome {
					status: RepositoryStatus::Completed,
					message: message.to_string(),
					indexed_files: 0,
					skipped_files: 0,
					error_files: 0,
					up_to_date: true,
				});
			}
		}

		state.write().status_message = "Enumerating candidate files...".to_string();
		let extensions = if repo.extensions.is_empty() {
			self.config.index.extensions.clone()
		} else {
			repo.extensions.clone()
		};
		let exclude_patterns = if repo.exclude_patterns.is_empty() {
			self.config.index.exclude_patterns.clone()
		} else {
			repo.exclude_patterns.clone()
		};

		let full_listing = fetcher::files::full_file_listing(&workspace);
		let mut candidates = fetcher::list_candidate_files(
			&workspace,
			&extensions,
			&exclude_patterns,
			repo.max_file_size_kb,
		)?;

		if candidates.is_empty() {
			return self
				.abort_with_message(
					&repo,
					"No indexable files found with the configured extensions".to_string(),
				)
				.await;
		}

		// Stack detection over the full listing, since manifests are often
		// excluded by the extension allow-list.
		if repo.detected_stack.is_none() || force_full {
			if let Some(stack) = stack_detect::detect_stack(&full_listing) {
				if let Err(err) = self.store.set_detected_stack(&repo.id, &stack).await {
					tracing::warn!(error = %err, "failed to persist detected stack");
				}
			}
		}

		if let Err(err) = self.vectors.ensure_collection(&repo.project_id).await {
			// Embeddings will stay pending; the reconciliation pass picks
			// them up once the store is reachable again.
			tracing::error!(error = %err, "vector collection unavailable, continuing without embeddings");
		}

		if let Diff::Changed(changed) = &diff {
			let changed: HashSet<&str> = changed.iter().map(String::as_str).collect();
			candidates.retain(|f| changed.contains(f.rel_path.as_str()));
			self.cleanup_deleted_files(&repo, &full_listing).await;
		}

		state.write().total_files = candidates.len();

		let stored_hashes = self.store.file_content_hashes(&repo.id).await?;
		let mut embedding_batch: Vec<PendingChunk> = Vec::new();
		let mut indexed = 0usize;
		let mut skipped = 0usize;
		let mut errors = 0usize;

		for descriptor in &candidates {
			let rel_path = descriptor.rel_path.as_str();
			state.write().status_message = rel_path.to_string();

			let content = match std::fs::read_to_string(workspace.path().join(rel_path)) {
				Ok(content) => content,
				Err(err) => {
					tracing::warn!(file = rel_path, error = %err, "failed to read file");
					errors += 1;
					state.write().error_files = errors;
					continue;
				}
			};

			let content_hash = calculate_content_hash(&content);
			if !force_full && stored_hashes.get(rel_path) == Some(&content_hash) {
				// Unchanged content: chunks and index entries stay untouched.
				skipped += 1;
				state.write().skipped_files = skipped;
				continue;
			}

			let previously_indexed = stored_hashes.contains_key(rel_path);
			match self
				.process_file(&repo, descriptor, &content, &content_hash, previously_indexed)
				.await
			{
				Ok(pending) => {
					embedding_batch.extend(pending);
					indexed += 1;
					state.write().indexed_files = indexed;
				}
				Err(err) => {
					tracing::error!(file = rel_path, error = %err, "file processing failed");
					errors += 1;
					state.write().error_files = errors;
					if let Ok(Some(file)) = self.store.get_file(&repo.id, rel_path).await {
						let _ = self.store.set_file_status(&file.id, FileStatus::Error).await;
					}
				}
			}

			if embedding_batch.len() >= self.config.index.embeddings_batch_size {
				state.write().embedding_calls += embedding_batch.len();
				self.flush_embeddings(&repo, &mut embedding_batch).await;
			}
		}

		if !embedding_batch.is_empty() {
			state.write().embedding_calls += embedding_batch.len();
			self.flush_embeddings(&repo, &mut embedding_batch).await;
		}

		let (status, message) = if indexed == 0 && errors == 0 {
			(
				RepositoryStatus::Completed,
				"Repository is already up to date".to_string(),
			)
		} else {
			final_status(indexed, errors)
		};

		let files_count = self.store.list_file_paths(&repo.id).await?.len() as i64;
		let chunks_count = self.store.count_repository_chunks(&repo.id).await?;
		self.store
			.finish_repository_run(
				&repo.id,
				status,
				Some(message.as_str()),
				&current_commit,
				files_count,
				chunks_count,
			)
			.await?;

		if status == RepositoryStatus::Completed {
			self.run_insights(&repo, errors == 0).await;
		}

		{
			let mut guard = state.write();
			guard.indexing_complete = true;
			guard.status_message = String::new();
		}
		tracing::info!(
			repository = %repo.id,
			indexed,
			skipped,
			errors,
			status = status.as_str(),
			"indexing run finished"
		);

		Ok(RunOutcome {
			status,
			message,
			indexed_files: indexed,
			skipped_files: skipped,
			error_files: errors,
			up_to_date: false,
		})
	}

	/// Parse one file and rebuild its relational state: file row, chunk set,
	/// structured index entries. Returns the chunks queued for embedding.
	async fn process_file(
		&self,
		repo: &Repository,
		descriptor: &fetcher::FileDescriptor,
		content: &str,
		content_hash: &str,
		previously_indexed: bool,
	) -> Result<Vec<PendingChunk>> {
		let rel_path = descriptor.rel_path.as_str();
		let parsed = parser::parse(rel_path, content);

		let last_commit_time = descriptor
			.last_commit_time
			.as_deref()
			.and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
			.map(|t| t.with_timezone(&chrono::Utc));

		let file = self
			.store
			.upsert_file(
				&repo.id,
				rel_path,
				&descriptor.extension,
				descriptor.size_bytes as i64,
				content_hash,
				parsed.language,
				FileStatus::Processing,
				descriptor.last_commit.as_deref(),
				last_commit_time,
			)
			.await?;

		if previously_indexed {
			// Old embedding ids are replaced below; drop their points first.
			if let Err(err) = self
				.vectors
				.delete_file_points(&repo.project_id, rel_path)
				.await
			{
				tracing::warn!(file = rel_path, error = %err, "failed to drop stale vector points");
			}
		}

		let chunk_rows = self.store.replace_file_chunks(&file.id, &parsed.chunks).await?;
		self.store
			.rebuild_file_index(&repo.id, rel_path, parsed.language, &parsed)
			.await?;
		self.store.set_file_status(&file.id, FileStatus::Indexed).await?;

		Ok(chunk_rows
			.into_iter()
			.map(|chunk| PendingChunk {
				chunk_id: chunk.id,
				embedding_id: chunk.embedding_id,
				file_path: rel_path.to_string(),
				language: parsed.language.to_string(),
				chunk_type: chunk.chunk_type,
				entity_name: chunk.entity_name,
				start_line: chunk.start_line,
				end_line: chunk.end_line,
				content: chunk.content,
			})
			.collect())
	}

	/// Push a batch to the vector store. Provider failures are logged loudly
	/// and leave the chunks flagged for reconciliation; the run continues
	/// because structured-index data is still useful without embeddings.
	async fn flush_embeddings(&self, repo: &Repository, batch: &mut Vec<PendingChunk>) {
		match self.vectors.upsert_chunks(&repo.project_id, batch).await {
			Ok(stored_ids) => {
				if let Err(err) = self.store.mark_embeddings_stored(&stored_ids).await {
					tracing::error!(error = %err, "failed to flag stored embeddings");
				}
			}
			Err(err) => {
				tracing::error!(
					repository = %repo.id,
					chunks = batch.len(),
					error = %err,
					"embedding batch failed; chunks left pending for reconciliation"
				);
			}
		}
		batch.clear();
	}

	/// Remove rows and vector points for files that disappeared from the
	/// repository since the last run.
	async fn cleanup_deleted_files(&self, repo: &Repository, current_listing: &[String]) {
		let stored_paths = match self.store.list_file_paths(&repo.id).await {
			Ok(paths) => paths,
			Err(err) => {
				tracing::warn!(error = %err, "could not list indexed files for cleanup");
				return;
			}
		};
		let current: HashSet<&str> = current_listing.iter().map(String::as_str).collect();

		for path in stored_paths {
			if current.contains(path.as_str()) {
				continue;
			}
			tracing::debug!(file = %path, "removing deleted file from index");
			if let Err(err) = self.store.delete_file(&repo.id, &path).await {
				tracing::warn!(file = %path, error = %err, "failed to delete file rows");
			}
			if let Err(err) = self
				.vectors
				.delete_file_points(&repo.project_id, &path)
				.await
			{
				tracing::warn!(file = %path, error = %err, "failed to delete vector points");
			}
		}
	}

	/// Best-effort post-run analytics: metadata always on success, the AI
	/// prose summary only on a fully clean run. Failures are logged, never
	/// propagated into the run status.
	async fn run_insights(&self, repo: &Repository, full_success: bool) {
		let metadata = match self.store.recompute_metadata(&repo.id).await {
			Ok(metadata) => metadata,
			Err(err) => {
				tracing::warn!(error = %err, "metadata recomputation failed");
				return;
			}
		};

		if full_success && self.config.summary.enabled {
			match insights::generate_summary(&self.config.summary, &repo.name, &metadata).await {
				Ok(summary) => {
					if let Err(err) = self.store.set_repository_summary(&repo.id, &summary).await {
						tracing::warn!(error = %err, "failed to persist repository summary");
					}
				}
				Err(err) => {
					tracing::warn!(error = %err, "repository summary generation failed");
				}
			}
		}
	}

	/// Re-embed chunks whose vectors were never confirmed stored. Idempotent;
	/// safe to call at any time.
	pub async fn reconcile_embeddings(&self, repository_id: &str) -> Result<usize> {
		let repo = self
			.store
			.get_repository(repository_id)
			.await?
			.with_context(|| format!("unknown repository {}", repository_id))?;

		self.vectors.ensure_collection(&repo.project_id).await?;

		let batch_size = self.config.index.embeddings_batch_size;
		let mut total = 0usize;
		loop {
			let pending = self
				.store
				.pending_embedding_chunks(&repo.id, batch_size)
				.await?;
			if pending.is_empty() {
				break;
			}
			let stored = self.vectors.upsert_chunks(&repo.project_id, &pending).await?;
			if stored.is_empty() {
				// Remaining chunks have nothing embeddable; stop rather than spin
				break;
			}
			self.store.mark_embeddings_stored(&stored).await?;
			total += stored.len();
			if stored.len() < pending.len() {
				break;
			}
		}

		tracing::info!(repository = %repository_id, reconciled = total, "embedding reconciliation pass done");
		Ok(total)
	}

	async fn abort(&self, repo: &Repository, err: FetchError) -> Result<RunOutcome> {
		self.abort_with_message(repo, err.status_message()).await
	}

	async fn abort_with_message(&self, repo: &Repository, message: String) -> Result<RunOutcome> {
		tracing::error!(repository = %repo.id, message = %message, "indexing run aborted");
		self.store
			.set_repository_status(&repo.id, RepositoryStatus::Error, Some(message.as_str()))
			.await?;
		Ok(RunOutcome::aborted(message))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn full_success_is_completed() {
		let (status, message) = final_status(50, 0);
		assert_eq!(status, RepositoryStatus::Completed);
		assert!(message.contains("50"));
	}

	#[test]
	fn eighty_percent_is_completed_with_warning() {
		let (status, message) = final_status(80, 20);
		assert_eq!(status, RepositoryStatus::Completed);
		assert!(message.contains("80/100"));
		assert!(message.contains("20 files skipped"));
	}

	#[test]
	fn forty_percent_is_completed_with_partial_warning() {
		let (status, message) = final_status(40, 60);
		assert_eq!(status, RepositoryStatus::Completed);
		assert!(message.contains("Partial"));
	}

	#[test]
	fn twenty_percent_is_error() {
		let (status, message) = final_status(20, 80);
		assert_eq!(status, RepositoryStatus::Error);
		assert!(message.contains("20/100"));
	}

	#[test]
	fn boundary_ratios() {
		// exactly 0.75 stays a plain warning-completed
		let (status, _) = final_status(75, 25);
		assert_eq!(status, RepositoryStatus::Completed);
		// exactly 0.25 is still completed (partial)
		let (status, _) = final_status(25, 75);
		assert_eq!(status, RepositoryStatus::Completed);
		// just under 0.25 is an error
		let (status, _) = final_status(24, 76);
		assert_eq!(status, RepositoryStatus::Error);
	}

	#[test]
	fn zero_work_is_up_to_date() {
		let (status, message) = final_status(0, 0);
		assert_eq!(status, RepositoryStatus::Completed);
		assert!(message.contains("up to date"));
	}
}
