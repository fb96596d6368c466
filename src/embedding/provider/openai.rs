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

//! OpenAI embeddings API.

use anyhow::Result;
use serde_json::json;

use super::super::types::InputType;
use super::EmbeddingProvider;

const ENDPOINT: &str = "https://api.openai.com/v1/embeddings";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

const MODELS: &[(&str, usize)] = &[
	("text-embedding-3-small", 1536),
	("text-embedding-3-large", 3072),
	("text-embedding-ada-002", 1536),
];

pub struct OpenAIProvider {
	model: String,
	dimension: usize,
}

impl OpenAIProvider {
	pub fn new(model: &str) -> Result<Self> {
		let dimension = super::model_dimension(MODELS, "OpenAI", model)?;
		Ok(Self {
			model: model.to_string(),
			dimension,
		})
	}
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAIProvider {
	async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
		super::single_from_batch(self, text).await
	}

	async fn generate_embeddings_batch(
		&self,
		texts: Vec<String>,
		input_type: InputType,
	) -> Result<Vec<Vec<f32>>> {
		// No input_type parameter in this API; inject the role as a prefix
		let texts: Vec<String> = texts
			.into_iter()
			.map(|text| input_type.apply_prefix(&text))
			.collect();

		super::request_embeddings(
			ENDPOINT,
			API_KEY_ENV,
			json!({
				"input": texts,
				"model": self.model,
				"encoding_format": "float",
			}),
		)
		.await
	}

	fn get_dimension(&self) -> usize {
		self.dimension
	}
}
