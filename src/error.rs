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

//! Failure taxonomy for the indexing and retrieval pipeline.
//!
//! Only failures a caller must branch on get their own variant; everything
//! else travels as `anyhow::Error` through the orchestration layer.

use thiserror::Error;

/// Failures while reaching or cloning the remote repository.
#[derive(Debug, Error)]
pub enum FetchError {
	/// The hosting provider rejected the request (404 or a plain 403).
	#[error("access denied: {0}")]
	AccessDenied(String),

	/// The provider signalled quota exhaustion via its rate-limit headers.
	#[error("rate limited by provider: {0}")]
	RateLimited(String),

	/// Transport or auth failure during `git clone`.
	#[error("clone failed: {0}")]
	CloneError(String),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("http error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("invalid repository url: {0}")]
	InvalidUrl(String),
}

/// Failures from the embedding or vector-store provider. Callers treat these
/// as soft: retrieval degrades to empty results, indexing leaves chunks
/// flagged for the reconciliation pass.
#[derive(Debug, Error)]
pub enum VectorStoreError {
	#[error("vector store unavailable: {0}")]
	Unavailable(String),

	#[error("embedding provider error: {0}")]
	EmbeddingProvider(String),
}

impl FetchError {
	/// Human-readable summary suitable for the repository `error_message` field.
	pub fn status_message(&self) -> String {
		match self {
			FetchError::AccessDenied(msg) => format!("Repository access denied: {}", msg),
			FetchError::RateLimited(msg) => format!("Provider rate limit reached: {}", msg),
			FetchError::CloneError(msg) => format!("Failed to clone repository: {}", msg),
			other => other.to_string(),
		}
	}
}
