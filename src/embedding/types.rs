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

//! Provider selection and embedding input roles.

use serde::{Deserialize, Serialize};

/// Which side of the retrieval pair a text belongs to. Vendors with native
/// support receive this as an API parameter; the rest get a textual prefix
/// injected into the input instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputType {
	#[default]
	None,
	/// Search-time query text
	Query,
	/// Index-time document text
	Document,
}

impl InputType {
	/// API parameter value, for vendors that accept one.
	pub fn as_api_str(self) -> Option<&'static str> {
		match self {
			InputType::None => None,
			InputType::Query => Some("query"),
			InputType::Document => Some("document"),
		}
	}

	/// Prefix-injected form, for vendors without an input-role parameter.
	pub fn apply_prefix(self, text: &str) -> String {
		let prefix = match self {
			InputType::None => return text.to_string(),
			InputType::Query => crate::constants::QUERY_PREFIX,
			InputType::Document => crate::constants::DOCUMENT_PREFIX,
		};
		format!("{}{}", prefix, text)
	}
}

/// Supported embedding vendors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
	Jina,
	#[default]
	Voyage,
	OpenAI,
}

/// Split a `provider:model` configuration string. A bare model name with no
/// vendor prefix is treated as a Voyage model, matching older config files.
pub fn parse_provider_model(input: &str) -> (EmbeddingProviderType, String) {
	match input.split_once(':') {
		Some((vendor, model)) => {
			let provider = match vendor.to_ascii_lowercase().as_str() {
				"jina" | "jinaai" => EmbeddingProviderType::Jina,
				"openai" => EmbeddingProviderType::OpenAI,
				_ => EmbeddingProviderType::Voyage,
			};
			(provider, model.to_string())
		}
		None => (EmbeddingProviderType::Voyage, input.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_provider_prefix() {
		let (provider, model) = parse_provider_model("openai:text-embedding-3-small");
		assert_eq!(provider, EmbeddingProviderType::OpenAI);
		assert_eq!(model, "text-embedding-3-small");

		let (provider, model) = parse_provider_model("jinaai:jina-embeddings-v3");
		assert_eq!(provider, EmbeddingProviderType::Jina);
		assert_eq!(model, "jina-embeddings-v3");

		let (provider, model) = parse_provider_model("voyage-code-3");
		assert_eq!(provider, EmbeddingProviderType::Voyage);
		assert_eq!(model, "voyage-code-3");
	}

	#[test]
	fn query_prefix_applied_only_when_role_set() {
		let text = InputType::Query.apply_prefix("find auth");
		assert!(text.starts_with(crate::constants::QUERY_PREFIX));
		assert!(text.ends_with("find auth"));
		assert_eq!(InputType::None.apply_prefix("x"), "x");
	}

	#[test]
	fn api_roles_match_vendor_vocabulary() {
		assert_eq!(InputType::Query.as_api_str(), Some("query"));
		assert_eq!(InputType::Document.as_api_str(), Some("document"));
		assert_eq!(InputType::None.as_api_str(), None);
	}
}
