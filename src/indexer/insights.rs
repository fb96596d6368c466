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

//! Post-run insights: a prose summary of the codebase from a chat-completion
//! endpoint. Strictly best-effort; a failure here never downgrades the run.

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::config::SummaryConfig;
use crate::store::models::RepositoryMetadata;

/// Build the summary prompt from computed metadata. Kept separate from the
/// HTTP call so it is testable without a network.
pub fn summary_prompt(repo_name: &str, metadata: &RepositoryMetadata) -> String {
	let mut languages: Vec<(&String, &i64)> = metadata.language_distribution.iter().collect();
	languages.sort_by(|a, b| b.1.cmp(a.1));
	let language_list = languages
		.iter()
		.take(5)
		.map(|(lang, n)| format!("{} ({} files)", lang, n))
		.collect::<Vec<_>>()
		.join(", ");

	let mut dependencies: Vec<(&String, &i64)> = metadata.dependency_frequency.iter().collect();
	dependencies.sort_by(|a, b| b.1.cmp(a.1));
	let dependency_list = dependencies
		.iter()
		.take(10)
		.map(|(dep, _)| dep.as_str())
		.collect::<Vec<_>>()
		.join(", ");

	format!(
		"Summarize the codebase \"{}\" in 3-5 sentences for a developer joining the project.\n\
		 Languages: {}\n\
		 Functions: {}, classes: {}\n\
		 Frequent dependencies: {}\n\
		 Documentation coverage: {:.0}%\n\
		 Focus on what the project does and how it is structured. Do not list the numbers back.",
		repo_name,
		language_list,
		metadata.total_functions,
		metadata.total_classes,
		dependency_list,
		metadata.documentation_coverage * 100.0
	)
}

/// Request a prose summary from the configured chat-completion endpoint.
pub async fn generate_summary(
	config: &SummaryConfig,
	repo_name: &str,
	metadata: &RepositoryMetadata,
) -> Result<String> {
	let api_key = config
		.api_key
		.as_deref()
		.context("summary API key not configured")?;

	let request_body = json!({
		"model": config.model,
		"messages": [
			{"role": "user", "content": summary_prompt(repo_name, metadata)}
		],
		"max_tokens": 400,
	});

	let response = crate::embedding::provider::HTTP_CLIENT
		.post(format!(
			"{}/chat/completions",
			config.base_url.trim_end_matches('/')
		))
		.header("Authorization", format!("Bearer {}", api_key))
		.header("Content-Type", "application/json")
		.json(&request_body)
		.send()
		.await?;

	if !response.status().is_success() {
		let error_text = response.text().await?;
		return Err(anyhow::anyhow!("summary API error: {}", error_text));
	}

	let response_json: Value = response.json().await?;
	let content = response_json["choices"][0]["message"]["content"]
		.as_str()
		.context("summary response missing content")?
		.trim()
		.to_string();

	if content.is_empty() {
		return Err(anyhow::anyhow!("summary response was empty"));
	}
	Ok(content)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use std::collections::HashMap;

	#[test]
	fn prompt_mentions_top_languages_and_deps() {
		let metadata = RepositoryMetadata {
			repository_id: "r1".into(),
			primary_language: Some("python".into()),
			language_distribution: HashMap::from([
				("python".to_string(), 40i64),
				("javascript".to_string(), 10i64),
			]),
			total_functions: 120,
			total_classes: 18,
			dependency_frequency: HashMap::from([("django".to_string(), 30i64)]),
			documentation_coverage: 0.42,
			avg_complexity: 1.8,
			computed_at: Utc::now(),
		};
		let prompt = summary_prompt("widgets", &metadata);
		assert!(prompt.contains("widgets"));
		assert!(prompt.contains("python (40 files)"));
		assert!(prompt.contains("django"));
		assert!(prompt.contains("42%"));
	}
}
