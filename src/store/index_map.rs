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

//! Structured lookup index over chunk identities.
//!
//! This index trades recall for speed: substring and keyword matching over
//! entity names, descriptions, keywords and paths, with no network round-trip.
//! Retrieval always tries it before any vector search.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::constants::MAX_KEYWORDS_PER_ENTRY;
use crate::parser::{ChunkKind, Complexity, ParsedFile};

use super::models::IndexMapEntry;
use super::SqliteStore;

/// Module-path-style fully-qualified name: `src/auth/session.py` + `login`
/// becomes `src.auth.session.login`.
pub fn qualified_name(file_path: &str, entity_name: &str) -> String {
	let module = file_path
		.rsplit_once('.')
		.map(|(stem, _ext)| stem)
		.unwrap_or(file_path)
		.replace(['/', '\\'], ".");
	if entity_name.is_empty() {
		module
	} else {
		format!("{}.{}", module, entity_name)
	}
}

/// Lightweight keywords from an identifier: split on case and underscore
/// boundaries, lowercased, deduplicated, capped.
pub fn extract_keywords(entity_name: &str, file_path: &str) -> Vec<String> {
	let mut keywords = Vec::new();
	let file_stem = std::path::Path::new(file_path)
		.file_stem()
		.and_then(|s| s.to_str())
		.unwrap_or("");

	for source in [entity_name, file_stem] {
		for fragment in split_identifier(source) {
			if fragment.len() >= 2 && !keywords.contains(&fragment) {
				keywords.push(fragment);
			}
			if keywords.len() >= MAX_KEYWORDS_PER_ENTRY {
				return keywords;
			}
		}
	}
	keywords
}

fn split_identifier(identifier: &str) -> Vec<String> {
	let mut fragments = Vec::new();
	let mut current = String::new();
	let mut prev_lower = false;

	for c in identifier.chars() {
		if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
			if !current.is_empty() {
				fragments.push(std::mem::take(&mut current).to_lowercase());
			}
			prev_lower = false;
			continue;
		}
		if c.is_uppercase() && prev_lower {
			// camelCase boundary
			fragments.push(std::mem::take(&mut current).to_lowercase());
		}
		prev_lower = c.is_lowercase() || c.is_numeric();
		current.push(c);
	}
	if !current.is_empty() {
		fragments.push(current.to_lowercase());
	}
	fragments
}

fn entry_name(kind: ChunkKind, name: Option<&str>, file_path: &str) -> String {
	match (kind, name) {
		(_, Some(name)) if !name.is_empty() => name.to_string(),
		(ChunkKind::ImportBlock, _) => "imports".to_string(),
		_ => std::path::Path::new(file_path)
			.file_stem()
			.and_then(|s| s.to_str())
			.unwrap_or("file")
			.to_string(),
	}
}

impl SqliteStore {
	/// Rebuild a file's index entries from a fresh parse: delete-then-insert.
	/// A whole-file chunk is skipped as redundant when the file produced any
	/// finer-grained chunks.
	pub async fn rebuild_file_index(
		&self,
		repository_id: &str,
		file_path: &str,
		language: &str,
		parsed: &ParsedFile,
	) -> Result<usize> {
		let mut tx = self.pool().begin().await?;
		sqlx::query("DELETE FROM index_map WHERE repository_id = ? AND file_path = ?")
			.bind(repository_id)
			.bind(file_path)
			.execute(&mut *tx)
			.await?;

		let has_fine_chunks = parsed.chunks.iter().any(|c| c.kind != ChunkKind::File);
		let mut inserted = 0usize;

		for chunk in &parsed.chunks {
			if chunk.kind == ChunkKind::File && has_fine_chunks {
				continue;
			}
			let name = entry_name(chunk.kind, chunk.name.as_deref(), file_path);
			let keywords = extract_keywords(&name, file_path);

			sqlx::query(
				r#"
				INSERT OR REPLACE INTO index_map
					(id, repository_id, file_path, entity_name, qualified_name, entity_type,
					 language, start_line, end_line, keywords, parameters, dependencies,
					 complexity, description)
				VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
				"#,
			)
			.bind(uuid::Uuid::new_v4().to_string())
			.bind(repository_id)
			.bind(file_path)
			.bind(&name)
			.bind(qualified_name(file_path, &name))
			.bind(chunk.kind.as_str())
			.bind(language)
			.bind(chunk.start_line as i64)
			.bind(chunk.end_line as i64)
			.bind(keywords.join(" "))
			.bind(serde_json::to_string(&chunk.parameters)?)
			.bind(serde_json::to_string(&chunk.dependencies)?)
			.bind(chunk.complexity.as_str())
			.bind(&chunk.docstring)
			.execute(&mut *tx)
			.await?;
			inserted += 1;
		}
		tx.commit().await?;
		Ok(inserted)
	}

	/// Token search over the index: a row must satisfy every query token
	/// against at least one of entity name, description, keywords or path.
	pub async fn search_index(
		&self,
		repository_id: &str,
		query: &str,
		entity_types: Option<&[String]>,
		languages: Option<&[String]>,
		limit: usize,
	) -> Result<Vec<IndexMapEntry>> {
		let tokens: Vec<String> = query
			.split_whitespace()
			.map(|t| t.to_lowercase())
			.filter(|t| !t.is_empty())
			.collect();
		if tokens.is_empty() {
			return Ok(Vec::new());
		}

		let mut sql = String::from("SELECT * FROM index_map WHERE repository_id = ?");
		if let Some(types) = entity_types {
			if !types.is_empty() {
				sql.push_str(&format!(
					" AND entity_type IN ({})",
					vec!["?"; types.len()].join(", ")
				));
			}
		}
		if let Some(langs) = languages {
			if !langs.is_empty() {
				sql.push_str(&format!(
					" AND language IN ({})",
					vec!["?"; langs.len()].join(", ")
				));
			}
		}
		for _ in &tokens {
			sql.push_str(
				" AND (lower(entity_name) LIKE ? OR lower(coalesce(description, '')) LIKE ? \
				 OR keywords LIKE ? OR lower(file_path) LIKE ?)",
			);
		}
		sql.push_str(" LIMIT ?");

		let mut q = sqlx::query(&sql).bind(repository_id);
		if let Some(types) = entity_types {
			for t in types {
				q = q.bind(t);
			}
		}
		if let Some(langs) = languages {
			for l in langs {
				q = q.bind(l);
			}
		}
		for token in &tokens {
			let pattern = format!("%{}%", token);
			q = q.bind(pattern.clone());
			q = q.bind(pattern.clone());
			q = q.bind(pattern.clone());
			q = q.bind(pattern);
		}
		q = q.bind(limit as i64);

		let rows = q.fetch_all(self.pool()).await?;
		let mut entries: Vec<IndexMapEntry> = rows.iter().map(entry_from_row).collect();

		// Prefer entries whose name itself matches; ties break on path/line
		// for a deterministic order.
		entries.sort_by(|a, b| {
			let score = |e: &IndexMapEntry| {
				tokens
					.iter()
					.filter(|t| e.entity_name.to_lowercase().contains(t.as_str()))
					.count()
			};
			score(b)
				.cmp(&score(a))
				.then_with(|| a.file_path.cmp(&b.file_path))
				.then_with(|| a.start_line.cmp(&b.start_line))
		});

		Ok(entries)
	}
}

fn entry_from_row(row: &SqliteRow) -> IndexMapEntry {
	let keywords: String = row.get("keywords");
	let parameters: String = row.get("parameters");
	let dependencies: String = row.get("dependencies");
	let complexity: String = row.get("complexity");
	IndexMapEntry {
		id: row.get("id"),
		repository_id: row.get("repository_id"),
		file_path: row.get("file_path"),
		entity_name: row.get("entity_name"),
		qualified_name: row.get("qualified_name"),
		entity_type: row.get("entity_type"),
		language: row.get("language"),
		start_line: row.get("start_line"),
		end_line: row.get("end_line"),
		keywords: keywords.split_whitespace().map(String::from).collect(),
		parameters: serde_json::from_str(&parameters).unwrap_or_default(),
		dependencies: serde_json::from_str(&dependencies).unwrap_or_default(),
		complexity: Complexity::parse(&complexity),
		description: row.get("description"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::SqliteStore;

	const AUTH_SOURCE: &str = "\
def login_user(username, password):
    \"\"\"Authenticate a user session.\"\"\"
    return check(username, password)


def logout_user(session_id):
    return drop(session_id)
";

	async fn indexed_fixture() -> (SqliteStore, String) {
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

		let parsed = crate::parser::parse("src/auth/session.py", AUTH_SOURCE);
		store
			.rebuild_file_index(&repo.id, "src/auth/session.py", "python", &parsed)
			.await
			.unwrap();
		(store, repo.id)
	}

	#[test]
	fn qualified_name_joins_path_and_entity() {
		assert_eq!(
			qualified_name("src/auth/session.py", "login_user"),
			"src.auth.session.login_user"
		);
		assert_eq!(qualified_name("main.go", "run"), "main.run");
	}

	#[test]
	fn keywords_split_case_and_underscores() {
		let kw = extract_keywords("LoginUserHandler", "src/auth/session_store.py");
		assert!(kw.contains(&"login".to_string()));
		assert!(kw.contains(&"user".to_string()));
		assert!(kw.contains(&"handler".to_string()));
		assert!(kw.contains(&"session".to_string()));
		assert!(kw.len() <= MAX_KEYWORDS_PER_ENTRY);
		// Deduplicated
		let mut sorted = kw.clone();
		sorted.sort();
		sorted.dedup();
		assert_eq!(sorted.len(), kw.len());
	}

	#[tokio::test]
	async fn whole_file_entry_skipped_when_fine_chunks_exist() {
		let (store, repo_id) = indexed_fixture().await;
		let entries = store
			.search_index(&repo_id, "session", None, None, 50)
			.await
			.unwrap();
		assert!(entries.iter().all(|e| e.entity_type != "file"));
	}

	#[tokio::test]
	async fn tokens_and_across_fields_or_within() {
		let (store, repo_id) = indexed_fixture().await;

		// Single token hits both functions through the path
		let hits = store
			.search_index(&repo_id, "auth", None, None, 50)
			.await
			.unwrap();
		assert!(hits.len() >= 2);

		// Both tokens must match somewhere; only login_user satisfies "login"
		let hits = store
			.search_index(&repo_id, "auth login", None, None, 50)
			.await
			.unwrap();
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].entity_name, "login_user");

		// A token matching nothing filters everything out
		let hits = store
			.search_index(&repo_id, "auth nonexistenttoken", None, None, 50)
			.await
			.unwrap();
		assert!(hits.is_empty());
	}

	#[tokio::test]
	async fn entity_type_filter_applies() {
		let (store, repo_id) = indexed_fixture().await;
		let hits = store
			.search_index(
				&repo_id,
				"session",
				Some(&["class".to_string()]),
				None,
				50,
			)
			.await
			.unwrap();
		assert!(hits.is_empty());
	}

	#[tokio::test]
	async fn reindexing_never_duplicates_rows() {
		let (store, repo_id) = indexed_fixture().await;
		let parsed = crate::parser::parse("src/auth/session.py", AUTH_SOURCE);
		store
			.rebuild_file_index(&repo_id, "src/auth/session.py", "python", &parsed)
			.await
			.unwrap();

		let entries = store
			.search_index(&repo_id, "session", None, None, 100)
			.await
			.unwrap();
		let mut identities: Vec<(String, String, i64)> = entries
			.iter()
			.map(|e| (e.file_path.clone(), e.entity_name.clone(), e.start_line))
			.collect();
		let before = identities.len();
		identities.sort();
		identities.dedup();
		assert_eq!(identities.len(), before, "duplicate identity rows found");
	}
}
