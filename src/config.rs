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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// Default values functions
fn default_embedding_model() -> String {
	"voyage:voyage-code-3".to_string()
}

fn default_embeddings_batch_size() -> usize {
	crate::constants::EMBEDDINGS_BATCH_SIZE
}

fn default_extensions() -> Vec<String> {
	[
		"py", "rs", "js", "jsx", "mjs", "ts", "tsx", "go", "rb", "php", "java", "c", "h", "cpp",
		"hpp", "cs", "swift", "kt", "scala", "sh", "sql", "html", "css", "vue", "svelte",
	]
	.iter()
	.map(|s| s.to_string())
	.collect()
}

fn default_exclude_patterns() -> Vec<String> {
	[
		"node_modules/",
		"vendor/",
		"target/",
		"dist/",
		"build/",
		".git/",
		"__pycache__/",
		"*.min.js",
		"*.lock",
	]
	.iter()
	.map(|s| s.to_string())
	.collect()
}

fn default_max_file_size_kb() -> u64 {
	500
}

fn default_qdrant_url() -> String {
	"http://localhost:6334".to_string()
}

fn default_collection_prefix() -> String {
	"codescout".to_string()
}

fn default_max_chunks() -> usize {
	10
}

fn default_max_context_length() -> usize {
	24_000
}

fn default_database_path() -> String {
	".codescout/index.sqlite".to_string()
}

fn default_github_api_base() -> String {
	"https://api.github.com".to_string()
}

fn default_summary_model() -> String {
	"openai/gpt-4.1-mini".to_string()
}

fn default_summary_base_url() -> String {
	"https://openrouter.ai/api/v1".to_string()
}

fn default_workers() -> usize {
	std::cmp::min(4, num_cpus::get())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
	/// File-extension allow-list applied before any other filter
	#[serde(default = "default_extensions")]
	pub extensions: Vec<String>,

	/// Substring or glob patterns; a path matching any of them is skipped
	#[serde(default = "default_exclude_patterns")]
	pub exclude_patterns: Vec<String>,

	#[serde(default = "default_max_file_size_kb")]
	pub max_file_size_kb: u64,

	#[serde(default = "default_embeddings_batch_size")]
	pub embeddings_batch_size: usize,
}

impl Default for IndexConfig {
	fn default() -> Self {
		Self {
			extensions: default_extensions(),
			exclude_patterns: default_exclude_patterns(),
			max_file_size_kb: default_max_file_size_kb(),
			embeddings_batch_size: default_embeddings_batch_size(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
	/// Embedding model in "provider:model" format
	#[serde(default = "default_embedding_model")]
	pub model: String,
}

impl Default for EmbeddingConfig {
	fn default() -> Self {
		Self {
			model: default_embedding_model(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
	#[serde(default = "default_qdrant_url")]
	pub url: String,

	#[serde(default = "default_collection_prefix")]
	pub collection_prefix: String,
}

impl Default for VectorConfig {
	fn default() -> Self {
		Self {
			url: default_qdrant_url(),
			collection_prefix: default_collection_prefix(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
	#[serde(default = "default_max_chunks")]
	pub max_chunks: usize,

	#[serde(default = "default_max_context_length")]
	pub max_context_length: usize,
}

impl Default for SearchConfig {
	fn default() -> Self {
		Self {
			max_chunks: default_max_chunks(),
			max_context_length: default_max_context_length(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
	#[serde(default = "default_database_path")]
	pub path: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			path: default_database_path(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
	#[serde(default = "default_github_api_base")]
	pub api_base: String,

	/// Personal access token; the GITHUB_TOKEN environment variable takes precedence
	pub token: Option<String>,
}

impl Default for GithubConfig {
	fn default() -> Self {
		Self {
			api_base: default_github_api_base(),
			token: None,
		}
	}
}

/// Chat-completion endpoint used for the best-effort repository summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
	#[serde(default)]
	pub enabled: bool,

	#[serde(default = "default_summary_model")]
	pub model: String,

	#[serde(default = "default_summary_base_url")]
	pub base_url: String,

	pub api_key: Option<String>,
}

impl Default for SummaryConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			model: default_summary_model(),
			base_url: default_summary_base_url(),
			api_key: None,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
	#[serde(default = "default_workers")]
	pub workers: usize,
}

impl Default for JobsConfig {
	fn default() -> Self {
		Self {
			workers: default_workers(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
	#[serde(default)]
	pub index: IndexConfig,

	#[serde(default)]
	pub embedding: EmbeddingConfig,

	#[serde(default)]
	pub vector: VectorConfig,

	#[serde(default)]
	pub search: SearchConfig,

	#[serde(default)]
	pub database: DatabaseConfig,

	#[serde(default)]
	pub github: GithubConfig,

	#[serde(default)]
	pub summary: SummaryConfig,

	#[serde(default)]
	pub jobs: JobsConfig,
}

impl Config {
	pub fn load() -> Result<Self> {
		let config_dir = Self::ensure_config_dir()?;
		let config_path = config_dir.join("config.toml");

		let mut config: Config = if config_path.exists() {
			let content = fs::read_to_string(&config_path)?;
			toml::from_str(&content)?
		} else {
			// Create default config if it doesn't exist
			let config = Config::default();
			let toml_content = toml::to_string_pretty(&config)?;
			fs::write(&config_path, toml_content)?;
			config
		};

		// Environment variables take precedence over config file values
		if let Ok(token) = std::env::var("GITHUB_TOKEN") {
			config.github.token = Some(token);
		}
		if let Ok(api_key) = std::env::var("OPENROUTER_API_KEY") {
			config.summary.api_key = Some(api_key);
		}

		Ok(config)
	}

	pub fn save(&self) -> Result<()> {
		let config_dir = Self::ensure_config_dir()?;
		let config_path = config_dir.join("config.toml");

		let toml_content = toml::to_string_pretty(self)?;
		fs::write(config_path, toml_content)?;
		Ok(())
	}

	fn ensure_config_dir() -> Result<PathBuf> {
		let config_dir = std::env::current_dir()?.join(".codescout");
		if !config_dir.exists() {
			fs::create_dir_all(&config_dir)?;
		}
		Ok(config_dir)
	}

	pub fn database_url(&self) -> String {
		// mode=rwc creates the database file on first connect
		format!("sqlite://{}?mode=rwc", self.database.path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_config() {
		let config = Config::default();
		assert_eq!(config.embedding.model, "voyage:voyage-code-3");
		assert_eq!(config.index.max_file_size_kb, 500);
		assert_eq!(config.search.max_chunks, 10);
		assert!(config.index.extensions.iter().any(|e| e == "py"));
	}

	#[test]
	fn test_partial_toml_uses_defaults() {
		let config: Config = toml::from_str(
			r#"
			[search]
			max_chunks = 25
			"#,
		)
		.unwrap();
		assert_eq!(config.search.max_chunks, 25);
		assert_eq!(config.search.max_context_length, 24_000);
		assert_eq!(config.vector.collection_prefix, "codescout");
	}
}
