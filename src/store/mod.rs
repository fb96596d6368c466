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

//! SQLite persistence for repositories, files, chunks, the structured index,
//! jobs and derived metadata.

pub mod chunks;
pub mod index_map;
pub mod metadata;
pub mod models;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

pub use models::{
	CodeChunk, FileStatus, IndexMapEntry, IndexedFile, IndexingJob, JobKind, JobStatus,
	Repository, RepositoryMetadata, RepositoryStatus,
};

pub struct SqliteStore {
	pool: SqlitePool,
}

impl SqliteStore {
	/// Open (and create if missing) the database at `path`.
	pub async fn connect(path: &str) -> Result<Self> {
		if let Some(parent) = Path::new(path).parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent)?;
			}
		}

		let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
			.create_if_missing(true)
			.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

		let pool = SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(options)
			.await?;

		let store = Self { pool };
		store.init_schema().await?;
		Ok(store)
	}

	/// In-memory store for tests. A single connection, since every new
	/// `:memory:` connection would be a fresh empty database.
	pub async fn connect_memory() -> Result<Self> {
		let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(options)
			.await?;
		let store = Self { pool };
		store.init_schema().await?;
		Ok(store)
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	async fn init_schema(&self) -> Result<()> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS repositories (
				id TEXT PRIMARY KEY,
				project_id TEXT NOT NULL UNIQUE,
				url TEXT NOT NULL,
				owner TEXT NOT NULL,
				name TEXT NOT NULL,
				branch TEXT NOT NULL,
				status TEXT NOT NULL DEFAULT 'pending',
				last_commit_hash TEXT,
				files_count INTEGER NOT NULL DEFAULT 0,
				chunks_count INTEGER NOT NULL DEFAULT 0,
				extensions TEXT NOT NULL DEFAULT '[]',
				exclude_patterns TEXT NOT NULL DEFAULT '[]',
				max_file_size_kb INTEGER NOT NULL DEFAULT 500,
				detected_stack TEXT,
				summary TEXT,
				error_message TEXT,
				created_at TEXT NOT NULL,
				updated_at TEXT NOT NULL
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS indexed_files (
				id TEXT PRIMARY KEY,
				repository_id TEXT NOT NULL,
				file_path TEXT NOT NULL,
				extension TEXT NOT NULL DEFAULT '',
				size_bytes INTEGER NOT NULL DEFAULT 0,
				content_hash TEXT NOT NULL DEFAULT '',
				language TEXT NOT NULL DEFAULT 'text',
				status TEXT NOT NULL DEFAULT 'pending',
				last_commit TEXT,
				last_commit_time TEXT,
				UNIQUE(repository_id, file_path),
				FOREIGN KEY (repository_id) REFERENCES repositories(id)
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS code_chunks (
				id TEXT PRIMARY KEY,
				file_id TEXT NOT NULL,
				chunk_type TEXT NOT NULL,
				content TEXT NOT NULL,
				preview TEXT NOT NULL DEFAULT '',
				start_line INTEGER NOT NULL,
				end_line INTEGER NOT NULL,
				entity_name TEXT,
				complexity TEXT NOT NULL DEFAULT 'medium',
				dependencies TEXT NOT NULL DEFAULT '[]',
				parameters TEXT NOT NULL DEFAULT '[]',
				description TEXT,
				embedding_id TEXT NOT NULL,
				embedding_stored INTEGER NOT NULL DEFAULT 0,
				FOREIGN KEY (file_id) REFERENCES indexed_files(id)
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS index_map (
				id TEXT PRIMARY KEY,
				repository_id TEXT NOT NULL,
				file_path TEXT NOT NULL,
				entity_name TEXT NOT NULL,
				qualified_name TEXT NOT NULL,
				entity_type TEXT NOT NULL,
				language TEXT NOT NULL,
				start_line INTEGER NOT NULL,
				end_line INTEGER NOT NULL,
				keywords TEXT NOT NULL DEFAULT '',
				parameters TEXT NOT NULL DEFAULT '[]',
				dependencies TEXT NOT NULL DEFAULT '[]',
				complexity TEXT NOT NULL DEFAULT 'medium',
				description TEXT,
				UNIQUE(repository_id, file_path, entity_name, start_line),
				FOREIGN KEY (repository_id) REFERENCES repositories(id)
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS indexing_jobs (
				id TEXT PRIMARY KEY,
				repository_id TEXT NOT NULL,
				kind TEXT NOT NULL,
				status TEXT NOT NULL DEFAULT 'queued',
				processed_files INTEGER NOT NULL DEFAULT 0,
				total_files INTEGER NOT NULL DEFAULT 0,
				error_message TEXT,
				created_at TEXT NOT NULL,
				started_at TEXT,
				finished_at TEXT,
				FOREIGN KEY (repository_id) REFERENCES repositories(id)
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS repository_metadata (
				repository_id TEXT PRIMARY KEY,
				primary_language TEXT,
				language_distribution TEXT NOT NULL DEFAULT '{}',
				total_functions INTEGER NOT NULL DEFAULT 0,
				total_classes INTEGER NOT NULL DEFAULT 0,
				dependency_frequency TEXT NOT NULL DEFAULT '{}',
				documentation_coverage REAL NOT NULL DEFAULT 0,
				avg_complexity REAL NOT NULL DEFAULT 0,
				computed_at TEXT NOT NULL,
				FOREIGN KEY (repository_id) REFERENCES repositories(id)
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		for stmt in [
			"CREATE INDEX IF NOT EXISTS idx_files_repository ON indexed_files(repository_id)",
			"CREATE INDEX IF NOT EXISTS idx_chunks_file ON code_chunks(file_id)",
			"CREATE INDEX IF NOT EXISTS idx_chunks_pending ON code_chunks(embedding_stored)",
			"CREATE INDEX IF NOT EXISTS idx_index_map_repo ON index_map(repository_id)",
			"CREATE INDEX IF NOT EXISTS idx_index_map_entity ON index_map(repository_id, entity_name)",
			"CREATE INDEX IF NOT EXISTS idx_jobs_repository ON indexing_jobs(repository_id)",
		] {
			sqlx::query(stmt).execute(&self.pool).await?;
		}

		Ok(())
	}

	// ---- repositories ----

	/// Get the project's repository, creating it on the first call. Exactly
	/// one active repository exists per project.
	#[allow(clippy::too_many_arguments)]
	pub async fn get_or_create_repository(
		&self,
		project_id: &str,
		url: &str,
		owner: &str,
		name: &str,
		branch: &str,
		extensions: &[String],
		exclude_patterns: &[String],
		max_file_size_kb: u64,
	) -> Result<Repository> {
		if let Some(existing) = self.get_repository_by_project(project_id).await? {
			return Ok(existing);
		}

		let id = uuid::Uuid::new_v4().to_string();
		let now = Utc::now().to_rfc3339();
		sqlx::query(
			r#"
			INSERT INTO repositories
				(id, project_id, url, owner, name, branch, status, extensions,
				 exclude_patterns, max_file_size_kb, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&id)
		.bind(project_id)
		.bind(url)
		.bind(owner)
		.bind(name)
		.bind(branch)
		.bind(serde_json::to_string(extensions)?)
		.bind(serde_json::to_string(exclude_patterns)?)
		.bind(max_file_size_kb as i64)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		self.get_repository(&id)
			.await?
			.ok_or_else(|| anyhow::anyhow!("repository {} vanished after insert", id))
	}

	pub async fn get_repository(&self, id: &str) -> Result<Option<Repository>> {
		let row = sqlx::query("SELECT * FROM repositories WHERE id = ?")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|r| repository_from_row(&r)))
	}

	pub async fn get_repository_by_project(&self, project_id: &str) -> Result<Option<Repository>> {
		let row = sqlx::query("SELECT * FROM repositories WHERE project_id = ?")
			.bind(project_id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|r| repository_from_row(&r)))
	}

	pub async fn set_repository_status(
		&self,
		id: &str,
		status: RepositoryStatus,
		error_message: Option<&str>,
	) -> Result<()> {
		sqlx::query(
			"UPDATE repositories SET status = ?, error_message = ?, updated_at = ? WHERE id = ?",
		)
		.bind(status.as_str())
		.bind(error_message)
		.bind(Utc::now().to_rfc3339())
		.bind(id)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Persist the outcome of an orchestration run.
	pub async fn finish_repository_run(
		&self,
		id: &str,
		status: RepositoryStatus,
		error_message: Option<&str>,
		last_commit_hash: &str,
		files_count: i64,
		chunks_count: i64,
	) -> Result<()> {
		sqlx::query(
			r#"
			UPDATE repositories
			SET status = ?, error_message = ?, last_commit_hash = ?,
			    files_count = ?, chunks_count = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(status.as_str())
		.bind(error_message)
		.bind(last_commit_hash)
		.bind(files_count)
		.bind(chunks_count)
		.bind(Utc::now().to_rfc3339())
		.bind(id)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn set_repository_summary(&self, id: &str, summary: &str) -> Result<()> {
		sqlx::query("UPDATE repositories SET summary = ?, updated_at = ? WHERE id = ?")
			.bind(summary)
			.bind(Utc::now().to_rfc3339())
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn set_detected_stack(&self, id: &str, stack: &str) -> Result<()> {
		sqlx::query("UPDATE repositories SET detected_stack = ?, updated_at = ? WHERE id = ?")
			.bind(stack)
			.bind(Utc::now().to_rfc3339())
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Delete a repository and every dependent row. Vector-store cleanup is
	/// the caller's responsibility (it lives in a different system).
	pub async fn delete_repository(&self, id: &str) -> Result<()> {
		let mut tx = self.pool.begin().await?;
		sqlx::query(
			"DELETE FROM code_chunks WHERE file_id IN (SELECT id FROM indexed_files WHERE repository_id = ?)",
		)
		.bind(id)
		.execute(&mut *tx)
		.await?;
		sqlx::query("DELETE FROM indexed_files WHERE repository_id = ?")
			.bind(id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM index_map WHERE repository_id = ?")
			.bind(id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM indexing_jobs WHERE repository_id = ?")
			.bind(id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM repository_metadata WHERE repository_id = ?")
			.bind(id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM repositories WHERE id = ?")
			.bind(id)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(())
	}

	// ---- indexed files ----

	pub async fn get_file(
		&self,
		repository_id: &str,
		file_path: &str,
	) -> Result<Option<IndexedFile>> {
		let row =
			sqlx::query("SELECT * FROM indexed_files WHERE repository_id = ? AND file_path = ?")
				.bind(repository_id)
				.bind(file_path)
				.fetch_optional(&self.pool)
				.await?;
		Ok(row.map(|r| file_from_row(&r)))
	}

	/// Content hashes of every indexed file, for change detection in one pass.
	pub async fn file_content_hashes(&self, repository_id: &str) -> Result<HashMap<String, String>> {
		let rows =
			sqlx::query("SELECT file_path, content_hash FROM indexed_files WHERE repository_id = ?")
				.bind(repository_id)
				.fetch_all(&self.pool)
				.await?;
		Ok(rows
			.into_iter()
			.map(|r| (r.get("file_path"), r.get("content_hash")))
			.collect())
	}

	pub async fn list_file_paths(&self, repository_id: &str) -> Result<Vec<String>> {
		let rows = sqlx::query("SELECT file_path FROM indexed_files WHERE repository_id = ?")
			.bind(repository_id)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(|r| r.get("file_path")).collect())
	}

	/// Insert or update the file row, keyed on (repository, path). Explicit
	/// check-then-write rather than relying on conflict handling for the
	/// "does it exist" branch.
	#[allow(clippy::too_many_arguments)]
	pub async fn upsert_file(
		&self,
		repository_id: &str,
		file_path: &str,
		extension: &str,
		size_bytes: i64,
		content_hash: &str,
		language: &str,
		status: FileStatus,
		last_commit: Option<&str>,
		last_commit_time: Option<DateTime<Utc>>,
	) -> Result<IndexedFile> {
		let existing = self.get_file(repository_id, file_path).await?;
		match existing {
			Some(file) => {
				sqlx::query(
					r#"
					UPDATE indexed_files
					SET extension = ?, size_bytes = ?, content_hash = ?, language = ?,
					    status = ?, last_commit = ?, last_commit_time = ?
					WHERE id = ?
					"#,
				)
				.bind(extension)
				.bind(size_bytes)
				.bind(content_hash)
				.bind(language)
				.bind(status.as_str())
				.bind(last_commit)
				.bind(last_commit_time.map(|t| t.to_rfc3339()))
				.bind(&file.id)
				.execute(&self.pool)
				.await?;
				Ok(IndexedFile {
					extension: extension.to_string(),
					size_bytes,
					content_hash: content_hash.to_string(),
					language: language.to_string(),
					status,
					last_commit: last_commit.map(|s| s.to_string()),
					last_commit_time,
					..file
				})
			}
			None => {
				let id = uuid::Uuid::new_v4().to_string();
				sqlx::query(
					r#"
					INSERT INTO indexed_files
						(id, repository_id, file_path, extension, size_bytes, content_hash,
						 language, status, last_commit, last_commit_time)
					VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
					"#,
				)
				.bind(&id)
				.bind(repository_id)
				.bind(file_path)
				.bind(extension)
				.bind(size_bytes)
				.bind(content_hash)
				.bind(language)
				.bind(status.as_str())
				.bind(last_commit)
				.bind(last_commit_time.map(|t| t.to_rfc3339()))
				.execute(&self.pool)
				.await?;
				Ok(IndexedFile {
					id,
					repository_id: repository_id.to_string(),
					file_path: file_path.to_string(),
					extension: extension.to_string(),
					size_bytes,
					content_hash: content_hash.to_string(),
					language: language.to_string(),
					status,
					last_commit: last_commit.map(|s| s.to_string()),
					last_commit_time,
				})
			}
		}
	}

	pub async fn set_file_status(&self, file_id: &str, status: FileStatus) -> Result<()> {
		sqlx::query("UPDATE indexed_files SET status = ? WHERE id = ?")
			.bind(status.as_str())
			.bind(file_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Remove a file row with its chunks and index entries (used when a file
	/// disappears from the repository between runs).
	pub async fn delete_file(&self, repository_id: &str, file_path: &str) -> Result<()> {
		let Some(file) = self.get_file(repository_id, file_path).await? else {
			return Ok(());
		};
		let mut tx = self.pool.begin().await?;
		sqlx::query("DELETE FROM code_chunks WHERE file_id = ?")
			.bind(&file.id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM index_map WHERE repository_id = ? AND file_path = ?")
			.bind(repository_id)
			.bind(file_path)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM indexed_files WHERE id = ?")
			.bind(&file.id)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(())
	}

	// ---- jobs ----

	pub async fn create_job(&self, repository_id: &str, kind: JobKind) -> Result<IndexingJob> {
		let id = uuid::Uuid::new_v4().to_string();
		let now = Utc::now();
		sqlx::query(
			"INSERT INTO indexing_jobs (id, repository_id, kind, status, created_at) VALUES (?, ?, ?, 'queued', ?)",
		)
		.bind(&id)
		.bind(repository_id)
		.bind(kind.as_str())
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await?;
		Ok(IndexingJob {
			id,
			repository_id: repository_id.to_string(),
			kind,
			status: JobStatus::Queued,
			processed_files: 0,
			total_files: 0,
			error_message: None,
			created_at: now,
			started_at: None,
			finished_at: None,
		})
	}

	pub async fn mark_job_running(&self, job_id: &str) -> Result<()> {
		sqlx::query("UPDATE indexing_jobs SET status = 'running', started_at = ? WHERE id = ?")
			.bind(Utc::now().to_rfc3339())
			.bind(job_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn update_job_progress(
		&self,
		job_id: &str,
		processed_files: i64,
		total_files: i64,
	) -> Result<()> {
		sqlx::query("UPDATE indexing_jobs SET processed_files = ?, total_files = ? WHERE id = ?")
			.bind(processed_files)
			.bind(total_files)
			.bind(job_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn finish_job(
		&self,
		job_id: &str,
		status: JobStatus,
		error_message: Option<&str>,
	) -> Result<()> {
		sqlx::query(
			"UPDATE indexing_jobs SET status = ?, error_message = ?, finished_at = ? WHERE id = ?",
		)
		.bind(status.as_str())
		.bind(error_message)
		.bind(Utc::now().to_rfc3339())
		.bind(job_id)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn get_job(&self, job_id: &str) -> Result<Option<IndexingJob>> {
		let row = sqlx::query("SELECT * FROM indexing_jobs WHERE id = ?")
			.bind(job_id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|r| job_from_row(&r)))
	}

	/// The most recently created job for a repository, if any.
	pub async fn latest_job(&self, repository_id: &str) -> Result<Option<IndexingJob>> {
		let row = sqlx::query(
			"SELECT * FROM indexing_jobs WHERE repository_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
		)
		.bind(repository_id)
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.map(|r| job_from_row(&r)))
	}
}

// ---- row mapping ----

fn parse_timestamp(value: String) -> DateTime<Utc> {
	DateTime::parse_from_rfc3339(&value)
		.map(|t| t.with_timezone(&Utc))
		.unwrap_or_else(|_| Utc::now())
}

fn parse_optional_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
	value
		.and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
		.map(|t| t.with_timezone(&Utc))
}

fn parse_string_list(value: String) -> Vec<String> {
	serde_json::from_str(&value).unwrap_or_default()
}

fn repository_from_row(row: &SqliteRow) -> Repository {
	let status: String = row.get("status");
	Repository {
		id: row.get("id"),
		project_id: row.get("project_id"),
		url: row.get("url"),
		owner: row.get("owner"),
		name: row.get("name"),
		branch: row.get("branch"),
		status: RepositoryStatus::parse(&status),
		last_commit_hash: row.get("last_commit_hash"),
		files_count: row.get("files_count"),
		chunks_count: row.get("chunks_count"),
		extensions: parse_string_list(row.get("extensions")),
		exclude_patterns: parse_string_list(row.get("exclude_patterns")),
		max_file_size_kb: row.get::<i64, _>("max_file_size_kb").max(0) as u64,
		detected_stack: row.get("detected_stack"),
		summary: row.get("summary"),
		error_message: row.get("error_message"),
		created_at: parse_timestamp(row.get("created_at")),
		updated_at: parse_timestamp(row.get("updated_at")),
	}
}

fn file_from_row(row: &SqliteRow) -> IndexedFile {
	let status: String = row.get("status");
	IndexedFile {
		id: row.get("id"),
		repository_id: row.get("repository_id"),
		file_path: row.get("file_path"),
		extension: row.get("extension"),
		size_bytes: row.get("size_bytes"),
		content_hash: row.get("content_hash"),
		language: row.get("language"),
		status: FileStatus::parse(&status),
		last_commit: row.get("last_commit"),
		last_commit_time: parse_optional_timestamp(row.get("last_commit_time")),
	}
}

fn job_from_row(row: &SqliteRow) -> IndexingJob {
	let kind: String = row.get("kind");
	let status: String = row.get("status");
	IndexingJob {
		id: row.get("id"),
		repository_id: row.get("repository_id"),
		kind: JobKind::parse(&kind),
		status: JobStatus::parse(&status),
		processed_files: row.get("processed_files"),
		total_files: row.get("total_files"),
		error_message: row.get("error_message"),
		created_at: parse_timestamp(row.get("created_at")),
		started_at: parse_optional_timestamp(row.get("started_at")),
		finished_at: parse_optional_timestamp(row.get("finished_at")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn repo_fixture(store: &SqliteStore) -> Repository {
		store
			.get_or_create_repository(
				"proj-1",
				"https://github.com/acme/widgets",
				"acme",
				"widgets",
				"main",
				&["py".to_string()],
				&[],
				500,
			)
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn repository_is_created_once_per_project() {
		let store = SqliteStore::connect_memory().await.unwrap();
		let first = repo_fixture(&store).await;
		let second = repo_fixture(&store).await;
		assert_eq!(first.id, second.id);
		assert_eq!(first.status, RepositoryStatus::Pending);
	}

	#[tokio::test]
	async fn status_and_run_outcome_round_trip() {
		let store = SqliteStore::connect_memory().await.unwrap();
		let repo = repo_fixture(&store).await;

		store
			.set_repository_status(&repo.id, RepositoryStatus::Indexing, None)
			.await
			.unwrap();
		store
			.finish_repository_run(
				&repo.id,
				RepositoryStatus::Completed,
				Some("Successfully indexed 42/50 files (8 files skipped)"),
				"abc123",
				42,
				180,
			)
			.await
			.unwrap();

		let loaded = store.get_repository(&repo.id).await.unwrap().unwrap();
		assert_eq!(loaded.status, RepositoryStatus::Completed);
		assert_eq!(loaded.last_commit_hash.as_deref(), Some("abc123"));
		assert_eq!(loaded.files_count, 42);
		assert!(loaded.error_message.unwrap().contains("42/50"));
	}

	#[tokio::test]
	async fn upsert_file_keeps_identity_on_update() {
		let store = SqliteStore::connect_memory().await.unwrap();
		let repo = repo_fixture(&store).await;

		let first = store
			.upsert_file(
				&repo.id,
				"src/app.py",
				"py",
				120,
				"hash-1",
				"python",
				FileStatus::Indexed,
				None,
				None,
			)
			.await
			.unwrap();
		let second = store
			.upsert_file(
				&repo.id,
				"src/app.py",
				"py",
				140,
				"hash-2",
				"python",
				FileStatus::Indexed,
				None,
				None,
			)
			.await
			.unwrap();

		assert_eq!(first.id, second.id);
		let hashes = store.file_content_hashes(&repo.id).await.unwrap();
		assert_eq!(hashes.get("src/app.py").map(String::as_str), Some("hash-2"));
	}

	#[tokio::test]
	async fn delete_repository_cascades() {
		let store = SqliteStore::connect_memory().await.unwrap();
		let repo = repo_fixture(&store).await;
		store
			.upsert_file(
				&repo.id,
				"src/app.py",
				"py",
				120,
				"hash-1",
				"python",
				FileStatus::Indexed,
				None,
				None,
			)
			.await
			.unwrap();

		store.delete_repository(&repo.id).await.unwrap();
		assert!(store.get_repository(&repo.id).await.unwrap().is_none());
		assert!(store.list_file_paths(&repo.id).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn job_lifecycle() {
		let store = SqliteStore::connect_memory().await.unwrap();
		let repo = repo_fixture(&store).await;

		let job = store.create_job(&repo.id, JobKind::Full).await.unwrap();
		assert_eq!(job.status, JobStatus::Queued);

		store.mark_job_running(&job.id).await.unwrap();
		store.update_job_progress(&job.id, 10, 50).await.unwrap();
		store
			.finish_job(&job.id, JobStatus::Completed, None)
			.await
			.unwrap();

		let loaded = store.get_job(&job.id).await.unwrap().unwrap();
		assert_eq!(loaded.status, JobStatus::Completed);
		assert_eq!(loaded.processed_files, 10);
		assert!(loaded.finished_at.is_some());
		assert!(loaded.status.is_terminal());
	}
}
