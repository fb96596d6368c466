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

//! Persistent entities of the indexing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::Complexity;

/// Repository indexing lifecycle. `Paused` is only reachable through an
/// explicit external action, never set by the orchestrator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryStatus {
	Pending,
	Indexing,
	Completed,
	Error,
	Paused,
}

impl RepositoryStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			RepositoryStatus::Pending => "pending",
			RepositoryStatus::Indexing => "indexing",
			RepositoryStatus::Completed => "completed",
			RepositoryStatus::Error => "error",
			RepositoryStatus::Paused => "paused",
		}
	}

	pub fn parse(s: &str) -> Self {
		match s {
			"indexing" => RepositoryStatus::Indexing,
			"completed" => RepositoryStatus::Completed,
			"error" => RepositoryStatus::Error,
			"paused" => RepositoryStatus::Paused,
			_ => RepositoryStatus::Pending,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
	Pending,
	Processing,
	Indexed,
	Error,
	Skipped,
}

impl FileStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			FileStatus::Pending => "pending",
			FileStatus::Processing => "processing",
			FileStatus::Indexed => "indexed",
			FileStatus::Error => "error",
			FileStatus::Skipped => "skipped",
		}
	}

	pub fn parse(s: &str) -> Self {
		match s {
			"processing" => FileStatus::Processing,
			"indexed" => FileStatus::Indexed,
			"error" => FileStatus::Error,
			"skipped" => FileStatus::Skipped,
			_ => FileStatus::Pending,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
	Full,
	Incremental,
	Cleanup,
}

impl JobKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobKind::Full => "full",
			JobKind::Incremental => "incremental",
			JobKind::Cleanup => "cleanup",
		}
	}

	pub fn parse(s: &str) -> Self {
		match s {
			"full" => JobKind::Full,
			"cleanup" => JobKind::Cleanup,
			_ => JobKind::Incremental,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Queued,
	Running,
	Completed,
	Failed,
	Cancelled,
}

impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Queued => "queued",
			JobStatus::Running => "running",
			JobStatus::Completed => "completed",
			JobStatus::Failed => "failed",
			JobStatus::Cancelled => "cancelled",
		}
	}

	pub fn parse(s: &str) -> Self {
		match s {
			"running" => JobStatus::Running,
			"completed" => JobStatus::Completed,
			"failed" => JobStatus::Failed,
			"cancelled" => JobStatus::Cancelled,
			_ => JobStatus::Queued,
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
		)
	}
}

/// One indexing target, 1:1 with its owning project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
	pub id: String,
	pub project_id: String,
	pub url: String,
	pub owner: String,
	pub name: String,
	pub branch: String,
	pub status: RepositoryStatus,
	pub last_commit_hash: Option<String>,
	pub files_count: i64,
	pub chunks_count: i64,
	pub extensions: Vec<String>,
	pub exclude_patterns: Vec<String>,
	pub max_file_size_kb: u64,
	pub detected_stack: Option<String>,
	pub summary: Option<String>,
	pub error_message: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// One source file under a repository; unique on (repository, file_path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedFile {
	pub id: String,
	pub repository_id: String,
	pub file_path: String,
	pub extension: String,
	pub size_bytes: i64,
	pub content_hash: String,
	pub language: String,
	pub status: FileStatus,
	pub last_commit: Option<String>,
	pub last_commit_time: Option<DateTime<Utc>>,
}

/// One semantic unit extracted from a file. Owned exclusively by its file;
/// the whole set is dropped and rebuilt whenever the file's hash changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
	pub id: String,
	pub file_id: String,
	pub chunk_type: String,
	pub content: String,
	pub preview: String,
	pub start_line: i64,
	pub end_line: i64,
	pub entity_name: Option<String>,
	pub complexity: Complexity,
	pub dependencies: Vec<String>,
	pub parameters: Vec<String>,
	pub description: Option<String>,
	/// Identifier of the vector-store point holding this chunk's embedding
	pub embedding_id: String,
	/// Whether the embedding is durably stored in the vector store
	pub embedding_stored: bool,
}

/// Denormalized fast-lookup record mirroring a chunk's identity. Always
/// derivable by reparsing, so dropping and rebuilding per file is safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMapEntry {
	pub id: String,
	pub repository_id: String,
	pub file_path: String,
	pub entity_name: String,
	pub qualified_name: String,
	pub entity_type: String,
	pub language: String,
	pub start_line: i64,
	pub end_line: i64,
	pub keywords: Vec<String>,
	pub parameters: Vec<String>,
	pub dependencies: Vec<String>,
	pub complexity: Complexity,
	pub description: Option<String>,
}

/// Audit/progress record for one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingJob {
	pub id: String,
	pub repository_id: String,
	pub kind: JobKind,
	pub status: JobStatus,
	pub processed_files: i64,
	pub total_files: i64,
	pub error_message: Option<String>,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub finished_at: Option<DateTime<Utc>>,
}

/// Repository-wide analytics, recomputed wholesale after each successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryMetadata {
	pub repository_id: String,
	pub primary_language: Option<String>,
	pub language_distribution: std::collections::HashMap<String, i64>,
	pub total_functions: i64,
	pub total_classes: i64,
	pub dependency_frequency: std::collections::HashMap<String, i64>,
	pub documentation_coverage: f64,
	pub avg_complexity: f64,
	pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_round_trips() {
		for status in [
			RepositoryStatus::Pending,
			RepositoryStatus::Indexing,
			RepositoryStatus::Completed,
			RepositoryStatus::Error,
			RepositoryStatus::Paused,
		] {
			assert_eq!(RepositoryStatus::parse(status.as_str()), status);
		}
	}

	#[test]
	fn unknown_status_defaults_to_pending() {
		assert_eq!(RepositoryStatus::parse("???"), RepositoryStatus::Pending);
		assert_eq!(FileStatus::parse("???"), FileStatus::Pending);
		assert_eq!(JobStatus::parse("???"), JobStatus::Queued);
	}

	#[test]
	fn terminal_job_states() {
		assert!(JobStatus::Completed.is_terminal());
		assert!(JobStatus::Failed.is_terminal());
		assert!(JobStatus::Cancelled.is_terminal());
		assert!(!JobStatus::Running.is_terminal());
		assert!(!JobStatus::Queued.is_terminal());
	}
}
