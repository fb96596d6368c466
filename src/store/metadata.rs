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

//! Repository-wide analytics, recomputed wholesale after a successful run.

use anyhow::Result;
use chrono::Utc;
use sqlx::Row;
use std::collections::HashMap;

use super::models::RepositoryMetadata;
use super::SqliteStore;

impl SqliteStore {
	/// Recompute and persist the repository's aggregate metadata from the
	/// current file and chunk rows. Safe to call at any time; the previous
	/// row is fully replaced.
	pub async fn recompute_metadata(&self, repository_id: &str) -> Result<RepositoryMetadata> {
		// Language distribution over indexed files
		let lang_rows = sqlx::query(
			"SELECT language, COUNT(*) AS n FROM indexed_files WHERE repository_id = ? GROUP BY language",
		)
		.bind(repository_id)
		.fetch_all(self.pool())
		.await?;

		let mut language_distribution: HashMap<String, i64> = HashMap::new();
		for row in &lang_rows {
			language_distribution.insert(row.get("language"), row.get("n"));
		}
		let primary_language = language_distribution
			.iter()
			.filter(|(lang, _)| lang.as_str() != "text")
			.max_by_key(|(_, n)| **n)
			.map(|(lang, _)| lang.clone());

		// Entity counts, documentation coverage and complexity over chunks
		let chunk_rows = sqlx::query(
			r#"
			SELECT c.chunk_type, c.complexity, c.description, c.dependencies
			FROM code_chunks c
			JOIN indexed_files f ON f.id = c.file_id
			WHERE f.repository_id = ?
			"#,
		)
		.bind(repository_id)
		.fetch_all(self.pool())
		.await?;

		let mut total_functions = 0i64;
		let mut total_classes = 0i64;
		let mut documented = 0i64;
		let mut documentable = 0i64;
		let mut complexity_sum = 0f64;
		let mut complexity_count = 0usize;
		let mut dependency_frequency: HashMap<String, i64> = HashMap::new();

		for row in &chunk_rows {
			let chunk_type: String = row.get("chunk_type");
			match chunk_type.as_str() {
				"function" | "method" => total_functions += 1,
				"class" => total_classes += 1,
				_ => {}
			}
			if matches!(chunk_type.as_str(), "function" | "method" | "class") {
				documentable += 1;
				let description: Option<String> = row.get("description");
				if description.map(|d| !d.trim().is_empty()).unwrap_or(false) {
					documented += 1;
				}
				let complexity: String = row.get("complexity");
				complexity_sum += match complexity.as_str() {
					"low" => 1.0,
					"high" => 3.0,
					_ => 2.0,
				};
				complexity_count += 1;
			}
			let dependencies: String = row.get("dependencies");
			let deps: Vec<String> = serde_json::from_str(&dependencies).unwrap_or_default();
			for dep in deps {
				*dependency_frequency.entry(dep).or_insert(0) += 1;
			}
		}

		let documentation_coverage = if documentable > 0 {
			documented as f64 / documentable as f64
		} else {
			0.0
		};
		let avg_complexity = if complexity_count > 0 {
			complexity_sum / complexity_count as f64
		} else {
			0.0
		};

		let metadata = RepositoryMetadata {
			repository_id: repository_id.to_string(),
			primary_language,
			language_distribution,
			total_functions,
			total_classes,
			dependency_frequency,
			documentation_coverage,
			avg_complexity,
			computed_at: Utc::now(),
		};

		sqlx::query(
			r#"
			INSERT OR REPLACE INTO repository_metadata
				(repository_id, primary_language, language_distribution, total_functions,
				 total_classes, dependency_frequency, documentation_coverage, avg_complexity,
				 computed_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&metadata.repository_id)
		.bind(&metadata.primary_language)
		.bind(serde_json::to_string(&metadata.language_distribution)?)
		.bind(metadata.total_functions)
		.bind(metadata.total_classes)
		.bind(serde_json::to_string(&metadata.dependency_frequency)?)
		.bind(metadata.documentation_coverage)
		.bind(metadata.avg_complexity)
		.bind(metadata.computed_at.to_rfc3339())
		.execute(self.pool())
		.await?;

		Ok(metadata)
	}

	pub async fn get_metadata(&self, repository_id: &str) -> Result<Option<RepositoryMetadata>> {
		let row = sqlx::query("SELECT * FROM repository_metadata WHERE repository_id = ?")
			.bind(repository_id)
			.fetch_optional(self.pool())
			.await?;

		Ok(row.map(|r| {
			let distribution: String = r.get("language_distribution");
			let frequency: String = r.get("dependency_frequency");
			let computed_at: String = r.get("computed_at");
			RepositoryMetadata {
				repository_id: r.get("repository_id"),
				primary_language: r.get("primary_language"),
				language_distribution: serde_json::from_str(&distribution).unwrap_or_default(),
				total_functions: r.get("total_functions"),
				total_classes: r.get("total_classes"),
				dependency_frequency: serde_json::from_str(&frequency).unwrap_or_default(),
				documentation_coverage: r.get("documentation_coverage"),
				avg_complexity: r.get("avg_complexity"),
				computed_at: chrono::DateTime::parse_from_rfc3339(&computed_at)
					.map(|t| t.with_timezone(&Utc))
					.unwrap_or_else(|_| Utc::now()),
			}
		}))
	}
}

#[cfg(test)]
mod tests {
	use crate::store::models::FileStatus;
	use crate::store::SqliteStore;

	#[tokio::test]
	async fn metadata_aggregates_files_and_chunks() {
		let store = SqliteStore::connect_memory().await.unwrap();
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
				200,
				"hash-1",
				"python",
				FileStatus::Indexed,
				None,
				None,
			)
			.await
			.unwrap();
		let parsed = crate::parser::parse(
			"src/app.py",
			"import os\n\ndef documented():\n    \"\"\"Has a docstring.\"\"\"\n    return os.getpid()\n\ndef bare():\n    return 2\n",
		);
		store.replace_file_chunks(&file.id, &parsed.chunks).await.unwrap();

		let metadata = store.recompute_metadata(&repo.id).await.unwrap();
		assert_eq!(metadata.primary_language.as_deref(), Some("python"));
		assert_eq!(metadata.total_functions, 2);
		assert_eq!(metadata.total_classes, 0);
		assert!((metadata.documentation_coverage - 0.5).abs() < 1e-9);
		assert!(metadata.dependency_frequency.contains_key("os"));

		let loaded = store.get_metadata(&repo.id).await.unwrap().unwrap();
		assert_eq!(loaded.total_functions, 2);
	}
}
