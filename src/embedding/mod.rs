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

pub mod provider;
pub mod types;

use anyhow::Result;

pub use provider::*;
pub use types::*;

use crate::constants::{CHARS_PER_TOKEN, MAX_TOKENS_PER_DOCUMENT, TRUNCATION_MARKER};

/// Calculate content hash for change detection
pub fn calculate_content_hash(contents: &str) -> String {
	use sha2::{Digest, Sha256};
	let mut hasher = Sha256::new();
	hasher.update(contents.as_bytes());
	format!("{:x}", hasher.finalize())
}

/// Calculate a unique hash for content including file path
pub fn calculate_unique_content_hash(contents: &str, file_path: &str) -> String {
	use sha2::{Digest, Sha256};
	let mut hasher = Sha256::new();
	hasher.update(contents.as_bytes());
	hasher.update(file_path.as_bytes());
	format!("{:x}", hasher.finalize())
}

/// Estimate token count from content length. The fixed characters-per-token
/// ratio is an approximation that keeps requests under provider ceilings
/// without shipping a tokenizer.
pub fn estimate_tokens(text: &str) -> usize {
	text.chars().count() / CHARS_PER_TOKEN
}

/// Cut a document down to the token ceiling, appending a truncation marker
/// so the stored text is honest about what happened.
pub fn truncate_to_token_limit(text: &str) -> String {
	if estimate_tokens(text) <= MAX_TOKENS_PER_DOCUMENT {
		return text.to_string();
	}
	let max_chars = MAX_TOKENS_PER_DOCUMENT * CHARS_PER_TOKEN;
	let cut: String = text.chars().take(max_chars).collect();
	format!("{}{}", cut, TRUNCATION_MARKER)
}

/// Embed a document list, preserving input alignment.
///
/// Empty or whitespace-only texts are dropped before sending (their slot is
/// `None`), over-long texts are truncated with a marker, and requests are
/// split at `batch_size` to bound per-call latency and cost.
pub async fn embed_documents(
	provider: &dyn EmbeddingProvider,
	texts: &[String],
	input_type: InputType,
	batch_size: usize,
) -> Result<Vec<Option<Vec<f32>>>> {
	let mut prepared: Vec<(usize, String)> = Vec::new();
	for (idx, text) in texts.iter().enumerate() {
		if text.trim().is_empty() {
			continue;
		}
		prepared.push((idx, truncate_to_token_limit(text)));
	}

	let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
	if prepared.is_empty() {
		return Ok(results);
	}

	let batch_size = batch_size.max(1);
	for batch in prepared.chunks(batch_size) {
		let contents: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
		let vectors = provider
			.generate_embeddings_batch(contents, input_type)
			.await?;
		if vectors.len() != batch.len() {
			return Err(anyhow::anyhow!(
				"provider returned {} embeddings for {} inputs",
				vectors.len(),
				batch.len()
			));
		}
		for ((idx, _), vector) in batch.iter().zip(vectors) {
			results[*idx] = Some(vector);
		}
	}

	Ok(results)
}

#[cfg(test)]
mod tests {
	use super::*;

	struct FakeProvider {
		calls: std::sync::atomic::AtomicUsize,
	}

	#[async_trait::async_trait]
	impl EmbeddingProvider for FakeProvider {
		async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>> {
			Ok(vec![0.0; 4])
		}

		async fn generate_embeddings_batch(
			&self,
			texts: Vec<String>,
			_input_type: InputType,
		) -> Result<Vec<Vec<f32>>> {
			self.calls
				.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
			Ok(texts.iter().map(|t| vec![t.len() as f32; 4]).collect())
		}

		fn get_dimension(&self) -> usize {
			4
		}
	}

	#[test]
	fn hash_is_stable_and_path_sensitive() {
		assert_eq!(
			calculate_content_hash("abc"),
			calculate_content_hash("abc")
		);
		assert_ne!(
			calculate_unique_content_hash("abc", "a.py"),
			calculate_unique_content_hash("abc", "b.py")
		);
	}

	#[test]
	fn truncation_respects_ceiling_and_marks() {
		let long = "x".repeat(MAX_TOKENS_PER_DOCUMENT * CHARS_PER_TOKEN * 2);
		let truncated = truncate_to_token_limit(&long);
		assert!(truncated.ends_with(TRUNCATION_MARKER));
		assert!(
			truncated.chars().count()
				<= MAX_TOKENS_PER_DOCUMENT * CHARS_PER_TOKEN + TRUNCATION_MARKER.len()
		);

		let short = "fn main() {}";
		assert_eq!(truncate_to_token_limit(short), short);
	}

	#[tokio::test]
	async fn empty_inputs_are_dropped_but_alignment_kept() {
		let provider = FakeProvider {
			calls: std::sync::atomic::AtomicUsize::new(0),
		};
		let texts = vec![
			"real content".to_string(),
			"   ".to_string(),
			"".to_string(),
			"more content".to_string(),
		];
		let result = embed_documents(&provider, &texts, InputType::Document, 32)
			.await
			.unwrap();
		assert_eq!(result.len(), 4);
		assert!(result[0].is_some());
		assert!(result[1].is_none());
		assert!(result[2].is_none());
		assert!(result[3].is_some());
	}

	#[tokio::test]
	async fn batches_split_at_batch_size() {
		let provider = FakeProvider {
			calls: std::sync::atomic::AtomicUsize::new(0),
		};
		let texts: Vec<String> = (0..10).map(|i| format!("text {}", i)).collect();
		let result = embed_documents(&provider, &texts, InputType::Document, 4)
			.await
			.unwrap();
		assert!(result.iter().all(|r| r.is_some()));
		assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn all_empty_input_makes_no_calls() {
		let provider = FakeProvider {
			calls: std::sync::atomic::AtomicUsize::new(0),
		};
		let texts = vec!["".to_string(), "  \n".to_string()];
		let result = embed_documents(&provider, &texts, InputType::Document, 4)
			.await
			.unwrap();
		assert!(result.iter().all(|r| r.is_none()));
		assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
	}
}
