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

//! Boundary facade over the indexing and retrieval pipeline. This is the
//! surface the HTTP layer and the AI-agent subsystem call into; everything
//! behind it is internal.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::embedding::{create_embedding_provider_from_parts, parse_provider_model, EmbeddingProvider};
use crate::fetcher;
use crate::indexer::Orchestrator;
use crate::jobs::{JobNotification, JobRunner};
use crate::retrieval::{FeatureContext, RetrievalEngine, RetrievalResult};
use crate::store::{IndexingJob, Repository, SqliteStore};
use crate::vector::{QdrantVectorStore, VectorClientManager, VectorSearch};

/// Point-in-time view of a repository's indexing state, shaped for status
/// polling from the UI.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
	pub repository_id: String,
	pub project_id: String,
	pub status: String,
	pub progress_percent: u8,
	pub files_count: i64,
	pub chunks_count: i64,
	pub last_commit_hash: Option<String>,
	pub error_message: Option<String>,
}

pub struct CodescoutService {
	store: Arc<SqliteStore>,
	vectors: Arc<QdrantVectorStore>,
	config: Arc<Config>,
	jobs: JobRunner,
	retrieval: RetrievalEngine,
}

impl CodescoutService {
	/// Wire up the pipeline: relational store, vector client (initialized
	/// once per process), embedding provider, job workers.
	pub async fn init(config: Config) -> Result<Self> {
		let config = Arc::new(config);
		let store = Arc::new(SqliteStore::connect(&config.database.path).await?);

		let client = VectorClientManager::global().get_or_init(&config.vector.url)?;
		let (provider_type, model) = parse_provider_model(&config.embedding.model);
		let provider: Arc<dyn EmbeddingProvider> =
			Arc::from(create_embedding_provider_from_parts(&provider_type, &model)?);
		let vectors = Arc::new(QdrantVectorStore::new(
			client,
			&config.vector.collection_prefix,
			provider,
			config.index.embeddings_batch_size,
		));

		let jobs = JobRunner::new(store.clone(), vectors.clone(), config.clone());
		let retrieval = RetrievalEngine::new(
			store.clone(),
			vectors.clone() as Arc<dyn VectorSearch>,
			config.clone(),
		);

		Ok(Self {
			store,
			vectors,
			config,
			jobs,
			retrieval,
		})
	}

	/// Register (or reuse) the project's repository and queue an indexing
	/// run. Returns the job handle for status polling.
	pub async fn start_indexing(
		&self,
		project_id: &str,
		repo_url: &str,
		branch: Option<&str>,
		force_full: bool,
	) -> Result<IndexingJob> {
		let token = self.config.github.token.as_deref();
		let info =
			fetcher::validate_access(&self.config.github.api_base, repo_url, token).await?;

		let branch = branch.unwrap_or(&info.default_branch);
		let repo = self
			.store
			.get_or_create_repository(
				project_id,
				repo_url,
				&info.owner,
				&info.repo,
				branch,
				&self.config.index.extensions,
				&self.config.index.exclude_patterns,
				self.config.index.max_file_size_kb,
			)
			.await?;

		self.jobs.enqueue_index(&repo.id, force_full).await
	}

	pub async fn get_status(&self, repository_id: &str) -> Result<Option<StatusReport>> {
		let Some(repo) = self.store.get_repository(repository_id).await? else {
			return Ok(None);
		};
		let progress_percent = match self.store.latest_job(&repo.id).await? {
			Some(job) if job.total_files > 0 => {
				((job.processed_files as f64 / job.total_files as f64) * 100.0).min(100.0) as u8
			}
			Some(job) if job.status.is_terminal() => 100,
			_ => 0,
		};
		Ok(Some(StatusReport {
			repository_id: repo.id,
			project_id: repo.project_id,
			status: repo.status.as_str().to_string(),
			progress_percent,
			files_count: repo.files_count,
			chunks_count: repo.chunks_count,
			last_commit_hash: repo.last_commit_hash,
			error_message: repo.error_message,
		}))
	}

	pub async fn repository_for_project(&self, project_id: &str) -> Result<Option<Repository>> {
		self.store.get_repository_by_project(project_id).await
	}

	pub async fn search(
		&self,
		project_id: &str,
		query: &str,
		k: usize,
	) -> Result<RetrievalResult> {
		self.retrieval.retrieve(project_id, query, k, None).await
	}

	pub async fn get_context_for_feature(
		&self,
		project_id: &str,
		description: &str,
	) -> Result<FeatureContext> {
		self.retrieval
			.context_for_feature(project_id, description)
			.await
	}

	pub async fn get_context_for_prd(
		&self,
		project_id: &str,
		description: &str,
		features: &[String],
	) -> Result<String> {
		self.retrieval
			.context_for_prd(project_id, description, features)
			.await
	}

	/// Cascade-delete the repository's relational rows and queue the
	/// vector-store collection cleanup.
	pub async fn delete_repository(&self, repository_id: &str) -> Result<()> {
		let Some(repo) = self.store.get_repository(repository_id).await? else {
			return Ok(());
		};
		self.store.delete_repository(&repo.id).await?;
		self.jobs.enqueue_cleanup(&repo.project_id).await?;
		Ok(())
	}

	/// Run the idempotent embedding reconciliation pass for a repository.
	pub async fn reconcile_embeddings(&self, repository_id: &str) -> Result<usize> {
		let orchestrator = Orchestrator::new(
			self.store.clone(),
			self.vectors.clone(),
			self.config.clone(),
		);
		orchestrator.reconcile_embeddings(repository_id).await
	}

	/// Subscribe to job completion/progress notifications.
	pub fn subscribe(&self) -> broadcast::Receiver<JobNotification> {
		self.jobs.subscribe()
	}

	pub fn store(&self) -> &Arc<SqliteStore> {
		&self.store
	}

	/// Drain the job queue and stop the workers.
	pub async fn shutdown(self) {
		self.jobs.shutdown().await;
	}
}
