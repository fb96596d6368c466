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

//! Background job runner: a small fixed worker pool draining a queue of
//! indexing and cleanup requests, persisting job progress and broadcasting
//! completion notifications to interested listeners.

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::indexer::Orchestrator;
use crate::state;
use crate::store::{IndexingJob, JobKind, JobStatus, RepositoryStatus, SqliteStore};
use crate::vector::QdrantVectorStore;

const JOB_QUEUE_CAPACITY: usize = 64;
const PROGRESS_TICK: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
enum JobRequest {
	Index {
		job_id: String,
		repository_id: String,
		force_full: bool,
	},
	Cleanup {
		project_id: String,
	},
}

/// Pushed to the per-process notification channel whenever a job finishes or
/// makes progress. The HTTP/chat collaborators fan this out to their clients.
#[derive(Debug, Clone)]
pub struct JobNotification {
	pub job_id: Option<String>,
	pub repository_id: Option<String>,
	pub project_id: Option<String>,
	pub status: JobStatus,
	pub progress_percent: u8,
	pub message: Option<String>,
}

/// Per-repository run locks. Two concurrent runs against one repository
/// would race on chunk replacement, so the second enqueue fails fast.
#[derive(Default)]
pub struct RunLocks {
	held: Mutex<HashSet<String>>,
}

impl RunLocks {
	pub fn try_acquire(&self, repository_id: &str) -> bool {
		self.held.lock().insert(repository_id.to_string())
	}

	pub fn release(&self, repository_id: &str) {
		self.held.lock().remove(repository_id);
	}
}

pub struct JobRunner {
	tx: mpsc::Sender<JobRequest>,
	notifications: broadcast::Sender<JobNotification>,
	store: Arc<SqliteStore>,
	workers: Vec<JoinHandle<()>>,
}

impl JobRunner {
	pub fn new(
		store: Arc<SqliteStore>,
		vectors: Arc<QdrantVectorStore>,
		config: Arc<Config>,
	) -> Self {
		let (tx, rx) = mpsc::channel::<JobRequest>(JOB_QUEUE_CAPACITY);
		let rx = Arc::new(tokio::sync::Mutex::new(rx));
		let (notifications, _) = broadcast::channel(64);
		let locks = Arc::new(RunLocks::default());

		let worker_count = config.jobs.workers.max(1);
		let mut workers = Vec::with_capacity(worker_count);
		for worker_id in 0..worker_count {
			let rx = rx.clone();
			let store = store.clone();
			let vectors = vectors.clone();
			let config = config.clone();
			let notifications = notifications.clone();
			let locks = locks.clone();
			workers.push(tokio::spawn(async move {
				loop {
					let request = { rx.lock().await.recv().await };
					let Some(request) = request else {
						break;
					};
					tracing::debug!(worker_id, ?request, "job picked up");
					match request {
						JobRequest::Index {
							job_id,
							repository_id,
							force_full,
						} => {
							run_index_job(
								&store,
								&vectors,
								&config,
								&locks,
								&notifications,
								&job_id,
								&repository_id,
								force_full,
							)
							.await;
						}
						JobRequest::Cleanup { project_id } => {
							run_cleanup_job(&vectors, &notifications, &project_id).await;
						}
					}
				}
			}));
		}

		Self {
			tx,
			notifications,
			store,
			workers,
		}
	}

	/// Queue an indexing run and return its persisted job record.
	pub async fn enqueue_index(
		&self,
		repository_id: &str,
		force_full: bool,
	) -> Result<IndexingJob> {
		let kind = if force_full {
			JobKind::Full
		} else {
			JobKind::Incremental
		};
		let job = self.store.create_job(repository_id, kind).await?;
		self.tx
			.send(JobRequest::Index {
				job_id: job.id.clone(),
				repository_id: repository_id.to_string(),
				force_full,
			})
			.await
			.map_err(|_| anyhow::anyhow!("job queue is closed"))?;
		Ok(job)
	}

	/// Queue removal of a project's vector-store collection. Relational rows
	/// are already gone by the time this runs, so no job row is persisted.
	pub async fn enqueue_cleanup(&self, project_id: &str) -> Result<()> {
		self.tx
			.send(JobRequest::Cleanup {
				project_id: project_id.to_string(),
			})
			.await
			.map_err(|_| anyhow::anyhow!("job queue is closed"))?;
		Ok(())
	}

	pub fn subscribe(&self) -> broadcast::Receiver<JobNotification> {
		self.notifications.subscribe()
	}

	/// Close the queue and wait for in-flight jobs to finish.
	pub async fn shutdown(self) {
		drop(self.tx);
		for worker in self.workers {
			let _ = worker.await;
		}
	}
}

#[allow(clippy::too_many_arguments)]
async fn run_index_job(
	store: &Arc<SqliteStore>,
	vectors: &Arc<QdrantVectorStore>,
	config: &Arc<Config>,
	locks: &Arc<RunLocks>,
	notifications: &broadcast::Sender<JobNotification>,
	job_id: &str,
	repository_id: &str,
	force_full: bool,
) {
	if !locks.try_acquire(repository_id) {
		let message = "indexing already in progress for this repository";
		tracing::warn!(repository_id, message);
		let _ = store
			.finish_job(job_id, JobStatus::Failed, Some(message))
			.await;
		notify(notifications, store, job_id, repository_id, JobStatus::Failed, 0, Some(message))
			.await;
		return;
	}

	let _ = store.mark_job_running(job_id).await;
	let run_state = state::create_shared_state();

	// Copy live progress into the job row until the run completes
	let ticker = {
		let store = store.clone();
		let run_state = run_state.clone();
		let job_id = job_id.to_string();
		tokio::spawn(async move {
			loop {
				tokio::time::sleep(PROGRESS_TICK).await;
				let (processed, total, complete) = {
					let guard = run_state.read();
					(
						(guard.indexed_files + guard.skipped_files + guard.error_files) as i64,
						guard.total_files as i64,
						guard.indexing_complete,
					)
				};
				let _ = store.update_job_progress(&job_id, processed, total).await;
				if complete {
					break;
				}
			}
		})
	};

	let orchestrator = Orchestrator::new(store.clone(), vectors.clone(), config.clone());
	let outcome = orchestrator
		.run(repository_id, force_full, run_state.clone())
		.await;

	ticker.abort();
	locks.release(repository_id);

	match outcome {
		Ok(outcome) => {
			let job_status = match outcome.status {
				RepositoryStatus::Error => JobStatus::Failed,
				_ => JobStatus::Completed,
			};
			let _ = store
				.finish_job(job_id, job_status, Some(outcome.message.as_str()))
				.await;

			if job_status == JobStatus::Completed && !outcome.up_to_date {
				// Retry anything the run left unembedded; best-effort.
				if let Err(err) = orchestrator.reconcile_embeddings(repository_id).await {
					tracing::warn!(repository_id, error = %err, "post-run reconciliation failed");
				}
			}

			let progress = run_state.read().progress_percent();
			notify(
				notifications,
				store,
				job_id,
				repository_id,
				job_status,
				progress,
				Some(outcome.message.as_str()),
			)
			.await;
		}
		Err(err) => {
			tracing::error!(repository_id, error = %err, "indexing job crashed");
			let message = format!("internal error: {}", err);
			let _ = store
				.finish_job(job_id, JobStatus::Failed, Some(message.as_str()))
				.await;
			// Leave the repository in a reconcilable error state instead of
			// a dangling 'indexing'.
			let _ = store
				.set_repository_status(repository_id, RepositoryStatus::Error, Some(message.as_str()))
				.await;
			notify(
				notifications,
				store,
				job_id,
				repository_id,
				JobStatus::Failed,
				0,
				Some(message.as_str()),
			)
			.await;
		}
	}
}

async fn run_cleanup_job(
	vectors: &Arc<QdrantVectorStore>,
	notifications: &broadcast::Sender<JobNotification>,
	project_id: &str,
) {
	let status = match vectors.delete_collection(project_id).await {
		Ok(()) => {
			tracing::info!(project_id, "vector collection removed");
			JobStatus::Completed
		}
		Err(err) => {
			tracing::error!(project_id, error = %err, "vector collection cleanup failed");
			JobStatus::Failed
		}
	};
	let _ = notifications.send(JobNotification {
		job_id: None,
		repository_id: None,
		project_id: Some(project_id.to_string()),
		status,
		progress_percent: 100,
		message: Some("vector store cleanup".to_string()),
	});
}

async fn notify(
	notifications: &broadcast::Sender<JobNotification>,
	store: &Arc<SqliteStore>,
	job_id: &str,
	repository_id: &str,
	status: JobStatus,
	progress_percent: u8,
	message: Option<&str>,
) {
	let project_id = store
		.get_repository(repository_id)
		.await
		.ok()
		.flatten()
		.map(|r| r.project_id);
	// A send only fails when nobody is subscribed, which is fine
	let _ = notifications.send(JobNotification {
		job_id: Some(job_id.to_string()),
		repository_id: Some(repository_id.to_string()),
		project_id,
		status,
		progress_percent,
		message: message.map(|m| m.to_string()),
	});
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn run_locks_are_exclusive_per_repository() {
		let locks = RunLocks::default();
		assert!(locks.try_acquire("repo-1"));
		assert!(!locks.try_acquire("repo-1"));
		assert!(locks.try_acquire("repo-2"));

		locks.release("repo-1");
		assert!(locks.try_acquire("repo-1"));
	}

	#[tokio::test]
	async fn notifications_reach_subscribers() {
		let (tx, _) = broadcast::channel::<JobNotification>(8);
		let mut rx = tx.subscribe();
		tx.send(JobNotification {
			job_id: Some("j1".into()),
			repository_id: Some("r1".into()),
			project_id: Some("p1".into()),
			status: JobStatus::Completed,
			progress_percent: 100,
			message: None,
		})
		.unwrap();

		let received = rx.recv().await.unwrap();
		assert_eq!(received.status, JobStatus::Completed);
		assert_eq!(received.progress_percent, 100);
	}
}
