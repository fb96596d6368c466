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

//! Language-aware file parsing with graceful degradation.
//!
//! Three tiers: a tree-sitter walk where a grammar is available, ordered
//! signature patterns where it is not (or where the grammar reports a syntax
//! error), and a single whole-file chunk for everything else. Tier failures
//! only ever demote to the next tier; `parse` itself never fails.

mod ast;
pub mod languages;
mod pattern;

pub use languages::Lang;

use serde::{Deserialize, Serialize};

use crate::constants::{
	COMPLEXITY_KEYWORDS_HIGH, COMPLEXITY_KEYWORDS_LOW, COMPLEXITY_LINES_HIGH,
	COMPLEXITY_LINES_LOW, PATTERN_COMPLEXITY_LINES_HIGH, PATTERN_COMPLEXITY_LINES_LOW,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
	File,
	Function,
	Class,
	Method,
	ImportBlock,
}

impl ChunkKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ChunkKind::File => "file",
			ChunkKind::Function => "function",
			ChunkKind::Class => "class",
			ChunkKind::Method => "method",
			ChunkKind::ImportBlock => "import_block",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"file" => Some(ChunkKind::File),
			"function" => Some(ChunkKind::Function),
			"class" => Some(ChunkKind::Class),
			"method" => Some(ChunkKind::Method),
			"import_block" => Some(ChunkKind::ImportBlock),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
	Low,
	Medium,
	High,
}

impl Complexity {
	pub fn as_str(&self) -> &'static str {
		match self {
			Complexity::Low => "low",
			Complexity::Medium => "medium",
			Complexity::High => "high",
		}
	}

	pub fn parse(s: &str) -> Self {
		match s {
			"low" => Complexity::Low,
			"high" => Complexity::High,
			_ => Complexity::Medium,
		}
	}
}

/// One semantic unit extracted from a file. Line numbers are 1-based and
/// inclusive on both ends.
#[derive(Debug, Clone)]
pub struct Chunk {
	pub kind: ChunkKind,
	pub content: String,
	pub start_line: usize,
	pub end_line: usize,
	pub name: Option<String>,
	pub parameters: Vec<String>,
	pub dependencies: Vec<String>,
	pub docstring: Option<String>,
	pub complexity: Complexity,
}

#[derive(Debug, Clone)]
pub struct Import {
	pub statement: String,
	pub line: usize,
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
	pub language: &'static str,
	pub total_lines: usize,
	pub chunks: Vec<Chunk>,
	pub functions_count: usize,
	pub classes_count: usize,
	pub imports: Vec<Import>,
}

/// Parse a file into semantic chunks. Never fails: structured-tier syntax
/// errors demote to the pattern tier, and unknown languages produce a single
/// whole-file chunk.
pub fn parse(file_path: &str, content: &str) -> ParsedFile {
	let lang = Lang::from_path(file_path);
	let total_lines = content.lines().count();

	let mut parsed = match lang.ts_language() {
		Some(_) => match ast::parse_structured(lang, content) {
			Ok(parsed) => parsed,
			Err(err) => {
				tracing::debug!(
					file = file_path,
					language = lang.name(),
					error = %err,
					"structured parse failed, falling back to pattern tier"
				);
				pattern::parse_patterns(lang, content)
			}
		},
		None if lang != Lang::Generic => pattern::parse_patterns(lang, content),
		_ => ParsedFile {
			language: lang.name(),
			total_lines,
			chunks: Vec::new(),
			functions_count: 0,
			classes_count: 0,
			imports: Vec::new(),
		},
	};

	parsed.total_lines = total_lines;
	attach_dependencies(&mut parsed);
	append_whole_file_chunk(&mut parsed, content, lang);
	parsed
}

/// Every tier gets one whole-file chunk for coarse-grained retrieval, except
/// when it would be the only chunk produced (then it IS the only chunk).
fn append_whole_file_chunk(parsed: &mut ParsedFile, content: &str, lang: Lang) {
	if content.trim().is_empty() {
		return;
	}
	let end_line = parsed.total_lines.max(1);
	parsed.chunks.push(Chunk {
		kind: ChunkKind::File,
		content: content.to_string(),
		start_line: 1,
		end_line,
		name: None,
		parameters: Vec::new(),
		dependencies: parsed
			.imports
			.iter()
			.filter_map(|i| import_root(&i.statement))
			.collect(),
		docstring: None,
		complexity: classify_complexity(content, lang.ts_language().is_none()),
	});
}

/// Mark each chunk as depending on the imported modules whose root name
/// actually appears in the chunk body.
fn attach_dependencies(parsed: &mut ParsedFile) {
	if parsed.imports.is_empty() {
		return;
	}
	let roots: Vec<String> = parsed
		.imports
		.iter()
		.filter_map(|i| import_root(&i.statement))
		.collect();

	for chunk in &mut parsed.chunks {
		if chunk.kind == ChunkKind::ImportBlock {
			continue;
		}
		for root in &roots {
			if chunk.content.contains(root.as_str()) && !chunk.dependencies.contains(root) {
				chunk.dependencies.push(root.clone());
			}
		}
	}
}

/// Extract the root module name from an import statement.
fn import_root(statement: &str) -> Option<String> {
	let stripped = statement.trim();
	let rest = stripped
		.strip_prefix("from ")
		.or_else(|| stripped.strip_prefix("import "))
		.or_else(|| stripped.strip_prefix("use "))
		.or_else(|| stripped.strip_prefix("require "))?;
	let root: String = rest
		.chars()
		.take_while(|c| c.is_alphanumeric() || *c == '_')
		.collect();
	if root.is_empty() {
		None
	} else {
		Some(root)
	}
}

/// Classify a block's complexity from line count and branching-keyword count.
///
/// This is a coarse two-factor heuristic, not a cyclomatic-complexity
/// computation; treat the result as an approximation.
pub fn classify_complexity(content: &str, pattern_tier: bool) -> Complexity {
	let lines = content.lines().count();
	let keywords = count_branch_keywords(content);

	let (lines_low, lines_high) = if pattern_tier {
		(PATTERN_COMPLEXITY_LINES_LOW, PATTERN_COMPLEXITY_LINES_HIGH)
	} else {
		(COMPLEXITY_LINES_LOW, COMPLEXITY_LINES_HIGH)
	};

	if lines < lines_low && keywords < COMPLEXITY_KEYWORDS_LOW {
		Complexity::Low
	} else if lines > lines_high && keywords > COMPLEXITY_KEYWORDS_HIGH {
		Complexity::High
	} else {
		Complexity::Medium
	}
}

fn count_branch_keywords(content: &str) -> usize {
	content
		.split(|c: char| !c.is_alphanumeric() && c != '_')
		.filter(|word| Lang::branch_keywords().contains(word))
		.count()
}

/// Short preview of chunk content for listings.
pub fn preview(content: &str, max_chars: usize) -> String {
	let trimmed = content.trim();
	if trimmed.chars().count() <= max_chars {
		trimmed.to_string()
	} else {
		let cut: String = trimmed.chars().take(max_chars).collect();
		format!("{}...", cut)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const TWO_FUNCTIONS: &str = "\
def first(a, b):
    \"\"\"Add two numbers.\"\"\"
    total = a + b
    if total > 10:
        return total
    total = total * 2
    for _ in range(3):
        total += 1
    return total
# trailing comment

def second(x):
    result = []
    for i in range(x):
        if i % 2 == 0:
            result.append(i)
        else:
            result.append(-i)
    while len(result) > 20:
        result.pop()
    try:
        result.sort()
    except ValueError:
        pass
    if not result:
        return None
    if len(result) == 1:
        return result[0]
    first = result[0]
    last = result[-1]
    return first + last
";

	#[test]
	fn two_function_file_yields_three_chunks_with_valid_ranges() {
		let parsed = parse("calc.py", TWO_FUNCTIONS);
		assert_eq!(parsed.language, "python");
		assert!(parsed.chunks.len() >= 3, "expected A, B and whole-file");

		let total = parsed.total_lines;
		for chunk in &parsed.chunks {
			assert!(chunk.start_line >= 1);
			assert!(chunk.start_line <= chunk.end_line);
			assert!(chunk.end_line <= total);
		}

		let functions: Vec<&Chunk> = parsed
			.chunks
			.iter()
			.filter(|c| c.kind == ChunkKind::Function)
			.collect();
		assert_eq!(functions.len(), 2);
		// Function ranges must not overlap
		let (a, b) = (functions[0], functions[1]);
		assert!(a.end_line < b.start_line || b.end_line < a.start_line);
	}

	#[test]
	fn invalid_python_falls_back_to_patterns() {
		let broken = "def broken(:\n    return ???\n\ndef also_broken(:\n    pass\n";
		let parsed = parse("broken.py", broken);
		assert!(
			!parsed.chunks.is_empty(),
			"syntax errors must degrade, not drop the file"
		);
	}

	#[test]
	fn unknown_extension_gets_single_file_chunk() {
		let parsed = parse("notes.xyz", "some\nplain\ntext\n");
		assert_eq!(parsed.chunks.len(), 1);
		assert_eq!(parsed.chunks[0].kind, ChunkKind::File);
		assert_eq!(parsed.chunks[0].start_line, 1);
		assert_eq!(parsed.chunks[0].end_line, 3);
	}

	#[test]
	fn empty_file_produces_no_chunks() {
		let parsed = parse("empty.py", "   \n\n");
		assert!(parsed.chunks.is_empty());
	}

	#[test]
	fn complexity_tiers() {
		assert_eq!(classify_complexity("let x = 1;\n", false), Complexity::Low);

		let mut medium = String::new();
		for i in 0..40 {
			medium.push_str(&format!("line {}\n", i));
		}
		assert_eq!(classify_complexity(&medium, false), Complexity::Medium);

		let mut high = String::new();
		for i in 0..120 {
			high.push_str(&format!("if x > {} {{ while y {{ }} }}\n", i));
		}
		assert_eq!(classify_complexity(&high, false), Complexity::High);
	}

	#[test]
	fn preview_truncates_on_char_boundary() {
		let text = "éééééééééé";
		let p = preview(text, 4);
		assert!(p.starts_with("éééé"));
		assert!(p.ends_with("..."));
	}

	#[test]
	fn import_root_extraction() {
		assert_eq!(import_root("import os.path"), Some("os".to_string()));
		assert_eq!(
			import_root("from django.db import models"),
			Some("django".to_string())
		);
		assert_eq!(import_root("use serde::Deserialize;"), Some("serde".to_string()));
		assert_eq!(import_root("nonsense"), None);
	}
}
