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

//! Embedding providers: thin HTTP clients over the vendors' embeddings APIs.
//!
//! Every supported vendor returns the same `data[].embedding` response shape,
//! so the request/decode path is shared; each vendor contributes its endpoint,
//! its model table and how it wants the input role communicated (API parameter
//! or injected text prefix). Unknown models fail at construction, not at the
//! first request.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;

use super::types::{EmbeddingProviderType, InputType};

mod jina;
mod openai;
mod voyage;

pub use jina::JinaProvider;
pub use openai::OpenAIProvider;
pub use voyage::VoyageProvider;

// Shared HTTP client with connection pooling, reused by every outbound call
// in the process (embedding requests, hosting API, summary endpoint).
pub(crate) static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
	Client::builder()
		.pool_max_idle_per_host(10)
		.pool_idle_timeout(Duration::from_secs(30))
		.timeout(Duration::from_secs(120))
		.connect_timeout(Duration::from_secs(10))
		.build()
		.expect("Failed to create HTTP client")
});

/// Trait for embedding providers. The single-text form embeds retrieval
/// queries; the batch form embeds documents during indexing.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
	async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;
	async fn generate_embeddings_batch(
		&self,
		texts: Vec<String>,
		input_type: InputType,
	) -> Result<Vec<Vec<f32>>>;

	/// Vector dimension of the configured model
	fn get_dimension(&self) -> usize;
}

/// Construct the provider selected by configuration.
pub fn create_embedding_provider_from_parts(
	provider: &EmbeddingProviderType,
	model: &str,
) -> Result<Box<dyn EmbeddingProvider>> {
	Ok(match provider {
		EmbeddingProviderType::Jina => Box::new(JinaProvider::new(model)?),
		EmbeddingProviderType::Voyage => Box::new(VoyageProvider::new(model)?),
		EmbeddingProviderType::OpenAI => Box::new(OpenAIProvider::new(model)?),
	})
}

/// Resolve a model's vector dimension from a vendor's supported-model table.
fn model_dimension(table: &[(&str, usize)], vendor: &str, model: &str) -> Result<usize> {
	table
		.iter()
		.find(|(name, _)| *name == model)
		.map(|(_, dimension)| *dimension)
		.ok_or_else(|| {
			let known: Vec<&str> = table.iter().map(|(name, _)| *name).collect();
			anyhow!(
				"unsupported {} embedding model '{}' (supported: {})",
				vendor,
				model,
				known.join(", ")
			)
		})
}

/// POST an embeddings request and decode the `data[].embedding` response
/// shape shared by all supported vendors.
async fn request_embeddings(
	endpoint: &str,
	api_key_env: &str,
	body: Value,
) -> Result<Vec<Vec<f32>>> {
	let api_key = std::env::var(api_key_env)
		.with_context(|| format!("{} environment variable not set", api_key_env))?;

	let response = HTTP_CLIENT
		.post(endpoint)
		.header("Authorization", format!("Bearer {}", api_key))
		.header("Content-Type", "application/json")
		.json(&body)
		.send()
		.await?;

	let status = response.status();
	if !status.is_success() {
		let detail = response.text().await.unwrap_or_default();
		return Err(anyhow!(
			"embedding request failed with {}: {}",
			status,
			detail
		));
	}

	let payload: Value = response.json().await?;
	let data = payload["data"]
		.as_array()
		.context("embedding response carries no data array")?;

	data.iter()
		.map(|entry| {
			entry["embedding"]
				.as_array()
				.context("embedding entry carries no vector")
				.map(|values| {
					values
						.iter()
						.map(|v| v.as_f64().unwrap_or_default() as f32)
						.collect()
				})
		})
		.collect()
}

/// Embed one text through the batch path and take the single result.
async fn single_from_batch(
	provider: &dyn EmbeddingProvider,
	text: &str,
) -> Result<Vec<f32>> {
	let mut vectors = provider
		.generate_embeddings_batch(vec![text.to_string()], InputType::None)
		.await?;
	vectors
		.pop()
		.ok_or_else(|| anyhow!("provider returned no embedding"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_models_resolve_dimensions() {
		assert_eq!(OpenAIProvider::new("text-embedding-3-large").unwrap().get_dimension(), 3072);
		assert_eq!(VoyageProvider::new("voyage-code-2").unwrap().get_dimension(), 1536);
		assert_eq!(JinaProvider::new("jina-embeddings-v3").unwrap().get_dimension(), 1024);
	}

	#[test]
	fn unknown_models_fail_at_construction() {
		assert!(OpenAIProvider::new("gpt-4").is_err());
		assert!(VoyageProvider::new("voyage-imaginary").is_err());
		assert!(JinaProvider::new("").is_err());
	}

	#[test]
	fn unknown_model_error_names_alternatives() {
		let err = VoyageProvider::new("nope").unwrap_err().to_string();
		assert!(err.contains("voyage-code-3"));
		assert!(err.contains("nope"));
	}

	#[test]
	fn factory_dispatches_on_provider_type() {
		let provider =
			create_embedding_provider_from_parts(&EmbeddingProviderType::Voyage, "voyage-code-3")
				.unwrap();
		assert_eq!(provider.get_dimension(), 1024);

		let provider =
			create_embedding_provider_from_parts(&EmbeddingProviderType::OpenAI, "text-embedding-3-small")
				.unwrap();
		assert_eq!(provider.get_dimension(), 1536);
	}
}
