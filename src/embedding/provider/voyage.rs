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

//! Voyage AI embeddings API. The only supported vendor with native
//! input-role support, so no prefix injection happens here.

use anyhow::Result;
use serde_json::json;

use super::super::types::InputType;
use super::EmbeddingProvider;

const ENDPOINT: &str = "https://api.voyageai.com/v1/embeddings";
const API_KEY_ENV: &str = "VOYAGE_API_KEY";

const MODELS: &[(&str, usize)] = &[
	("voyage-3.5", 1024),
	("voyage-3.5-lite", 1024),
	("voyage-3-large", 1024),
	("voyage-code-2", 1536),
	("voyage-code-3", 1024),
	("voyage-2", 1024),
];

#[derive(Debug)]
pub struct VoyageProvider {
	model: String,
	dimension: usize,
}

impl VoyageProvider {
	pub fn new(model: &str) -> Result<Self> {
		let dimension = super::model_dimension(MODELS, "Voyage", model)?;
		Ok(Self {
			model: model.to_string(),
			dimension,
		})
	}
}

#[async_trait::async_trait]
impl EmbeddingProvider for VoyageProvider {
	async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
		super::single_from_batch(self, text).await
	}

	async fn generate_embeddings_batch(
		&self,
		texts: Vec<String>,
		input_type: InputType,
	) -> Result<Vec<Vec<f32>>> {
		let mut body = json!({
			"input": texts,
			"model": self.model,
		});
		if let Some(role) = input_type.as_api_str() {
			body["input_type"] = json!(role);
		}

		super::request_embeddings(ENDPOINT, API_KEY_ENV, body).await
	}

	fn get_dimension(&self) -> usize {
		self.dimension
	}
}
