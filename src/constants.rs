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

//! Application-wide constants

/// Rough characters-per-token ratio used to estimate token counts without a tokenizer
pub const CHARS_PER_TOKEN: usize = 4;

/// Hard ceiling on estimated tokens per embedded document
pub const MAX_TOKENS_PER_DOCUMENT: usize = 8000;

/// Marker appended to documents cut down to the token ceiling
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Maximum number of texts per embedding API request
pub const EMBEDDINGS_BATCH_SIZE: usize = 32;

/// Maximum keywords stored per structured index entry
pub const MAX_KEYWORDS_PER_ENTRY: usize = 8;

/// Maximum synonym groups appended during query expansion
pub const MAX_QUERY_EXPANSIONS: usize = 3;

/// Notice appended to an assembled context that hit its length budget
pub const CONTEXT_TRUNCATION_NOTICE: &str =
	"\n\n*Additional results omitted to fit the context window.*";

/// Complexity classifier thresholds: below both tier-1 bounds is `low`,
/// above both tier-2 bounds is `high`, everything else is `medium`.
pub const COMPLEXITY_LINES_LOW: usize = 30;
pub const COMPLEXITY_KEYWORDS_LOW: usize = 5;
pub const COMPLEXITY_LINES_HIGH: usize = 100;
pub const COMPLEXITY_KEYWORDS_HIGH: usize = 15;

/// Pattern-tier parses get slightly tighter line bounds since regex blocks
/// tend to over-span their true extent.
pub const PATTERN_COMPLEXITY_LINES_LOW: usize = 25;
pub const PATTERN_COMPLEXITY_LINES_HIGH: usize = 80;

/// Final-status thresholds over the run success ratio
pub const STATUS_WARN_RATIO: f64 = 0.75;
pub const STATUS_PARTIAL_RATIO: f64 = 0.25;

/// Preview length stored alongside each chunk
pub const CHUNK_PREVIEW_CHARS: usize = 200;

/// Embedding input type prefixes for manual injection (non-API providers)
pub const QUERY_PREFIX: &str = "Represent the query for retrieving supporting documents: ";
pub const DOCUMENT_PREFIX: &str = "Represent the document for retrieval: ";
