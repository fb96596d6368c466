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

//! Structured parse tier: a tree-sitter walk with exact line spans.

use anyhow::{anyhow, Result};
use tree_sitter::{Node, Parser};

use super::languages::Lang;
use super::{classify_complexity, Chunk, ChunkKind, Import, ParsedFile};

/// Parse with the language's tree-sitter grammar. Returns an error when the
/// grammar reports syntax errors so the caller can demote to the pattern tier.
pub fn parse_structured(lang: Lang, content: &str) -> Result<ParsedFile> {
	let ts_lang = lang
		.ts_language()
		.ok_or_else(|| anyhow!("no grammar for {}", lang.name()))?;

	let mut parser = Parser::new();
	parser.set_language(&ts_lang)?;

	let tree = parser
		.parse(content, None)
		.ok_or_else(|| anyhow!("tree-sitter returned no tree"))?;

	let root = tree.root_node();
	if root.has_error() {
		return Err(anyhow!("syntax error in {} source", lang.name()));
	}

	let mut parsed = ParsedFile {
		language: lang.name(),
		total_lines: content.lines().count(),
		chunks: Vec::new(),
		functions_count: 0,
		classes_count: 0,
		imports: Vec::new(),
	};

	let mut import_nodes: Vec<Node> = Vec::new();
	walk_node(root, content, lang, &mut parsed, &mut import_nodes, false);
	collect_import_blocks(&import_nodes, content, &mut parsed);

	Ok(parsed)
}

fn walk_node<'t>(
	node: Node<'t>,
	content: &str,
	lang: Lang,
	parsed: &mut ParsedFile,
	import_nodes: &mut Vec<Node<'t>>,
	inside_class: bool,
) {
	let mut cursor = node.walk();
	if !cursor.goto_first_child() {
		return;
	}
	loop {
		let child = cursor.node();
		let kind = child.kind();

		if lang.import_kinds().contains(&kind) {
			import_nodes.push(child);
		} else if !inside_class && lang.class_kinds().contains(&kind) {
			emit_class(child, content, lang, parsed);
		} else if lang.function_kinds().contains(&kind) {
			let chunk_kind = if inside_class {
				ChunkKind::Method
			} else {
				ChunkKind::Function
			};
			emit_callable(child, content, lang, parsed, chunk_kind);
		} else if lang.method_kinds().contains(&kind) && inside_class {
			emit_callable(child, content, lang, parsed, ChunkKind::Method);
		} else {
			// Descend through wrappers (decorated definitions, export
			// statements, declaration lists) to reach nested definitions.
			walk_node(child, content, lang, parsed, import_nodes, inside_class);
		}

		if !cursor.goto_next_sibling() {
			break;
		}
	}
}

fn emit_class(node: Node, content: &str, lang: Lang, parsed: &mut ParsedFile) {
	let (snippet, start_line) = with_preceding_comment(node, content);
	let end_line = node.end_position().row + 1;
	let name = node_name(node, content);

	parsed.classes_count += 1;
	parsed.chunks.push(Chunk {
		kind: ChunkKind::Class,
		complexity: classify_complexity(&snippet, false),
		docstring: extract_docstring(node, content, lang),
		content: snippet,
		start_line,
		end_line,
		name,
		parameters: Vec::new(),
		dependencies: Vec::new(),
	});

	// Methods become their own chunks as well, so fine-grained queries can
	// land on a single method instead of the whole class body.
	let mut nested_imports = Vec::new();
	walk_node(node, content, lang, parsed, &mut nested_imports, true);
}

fn emit_callable(
	node: Node,
	content: &str,
	lang: Lang,
	parsed: &mut ParsedFile,
	chunk_kind: ChunkKind,
) {
	let (snippet, start_line) = with_preceding_comment(node, content);
	let end_line = node.end_position().row + 1;
	let name = node_name(node, content);

	if chunk_kind == ChunkKind::Function {
		parsed.functions_count += 1;
	}
	parsed.chunks.push(Chunk {
		kind: chunk_kind,
		complexity: classify_complexity(&snippet, false),
		docstring: extract_docstring(node, content, lang),
		parameters: node_parameters(node, content),
		content: snippet,
		start_line,
		end_line,
		name,
		dependencies: Vec::new(),
	});
}

/// Group contiguous import statements into import-block chunks and record
/// each statement with its line number.
fn collect_import_blocks(import_nodes: &[Node], content: &str, parsed: &mut ParsedFile) {
	for node in import_nodes {
		if let Ok(text) = node.utf8_text(content.as_bytes()) {
			parsed.imports.push(Import {
				statement: text.to_string(),
				line: node.start_position().row + 1,
			});
		}
	}

	let mut block_start = 0usize;
	while block_start < import_nodes.len() {
		let mut block_end = block_start;
		while block_end + 1 < import_nodes.len()
			&& import_nodes[block_end + 1].start_position().row
				<= import_nodes[block_end].end_position().row + 1
		{
			block_end += 1;
		}

		let first = import_nodes[block_start];
		let last = import_nodes[block_end];
		let snippet = content
			.get(first.start_byte()..last.end_byte())
			.unwrap_or_default()
			.to_string();
		if !snippet.trim().is_empty() {
			parsed.chunks.push(Chunk {
				kind: ChunkKind::ImportBlock,
				complexity: super::Complexity::Low,
				content: snippet,
				start_line: first.start_position().row + 1,
				end_line: last.end_position().row + 1,
				name: None,
				parameters: Vec::new(),
				dependencies: Vec::new(),
				docstring: None,
			});
		}
		block_start = block_end + 1;
	}
}

fn node_name(node: Node, content: &str) -> Option<String> {
	if let Some(name_node) = node.child_by_field_name("name") {
		return name_node
			.utf8_text(content.as_bytes())
			.ok()
			.map(|s| s.to_string());
	}
	// impl blocks and type declarations name their target through other
	// fields; fall back to the first identifier-like child.
	let mut cursor = node.walk();
	for child in node.children(&mut cursor) {
		if child.kind().contains("identifier") || child.kind() == "type_identifier" {
			return child
				.utf8_text(content.as_bytes())
				.ok()
				.map(|s| s.to_string());
		}
	}
	None
}

fn node_parameters(node: Node, content: &str) -> Vec<String> {
	let Some(params_node) = node.child_by_field_name("parameters") else {
		return Vec::new();
	};
	let Ok(raw) = params_node.utf8_text(content.as_bytes()) else {
		return Vec::new();
	};
	raw.trim_start_matches('(')
		.trim_end_matches(')')
		.split(',')
		.map(|p| {
			// Keep the bare parameter name, dropping type annotations and defaults
			p.split([':', '=']).next().unwrap_or("").trim().to_string()
		})
		.filter(|p| !p.is_empty() && *p != "self" && *p != "&self" && *p != "&mut self")
		.collect()
}

/// Python docstrings come from the body; other languages use the preceding
/// comment captured into the snippet.
fn extract_docstring(node: Node, content: &str, lang: Lang) -> Option<String> {
	if lang != Lang::Python {
		return None;
	}
	let body = node.child_by_field_name("body")?;
	let first = body.named_child(0)?;
	if first.kind() != "expression_statement" {
		return None;
	}
	let string_node = first.named_child(0)?;
	if string_node.kind() != "string" {
		return None;
	}
	let raw = string_node.utf8_text(content.as_bytes()).ok()?;
	let cleaned = raw
		.trim_matches(|c| c == '"' || c == '\'')
		.trim()
		.to_string();
	if cleaned.is_empty() {
		None
	} else {
		Some(cleaned)
	}
}

/// Combine a declaration with its immediately preceding comment or attribute
/// sibling, keeping the comment's line as the chunk start.
fn with_preceding_comment(node: Node, content: &str) -> (String, usize) {
	let mut combined_start = node.start_position().row;
	let mut snippet = String::new();
	if let Some(parent) = node.parent() {
		let mut cursor = parent.walk();
		let mut preceding = Vec::new();
		for child in parent.children(&mut cursor) {
			if child.id() == node.id() {
				break;
			} else {
				preceding.push(child);
			}
		}
		if let Some(last) = preceding.last() {
			let kind = last.kind();
			if kind.contains("comment") || kind.contains("attribute") {
				combined_start = last.start_position().row;
				snippet.push_str(
					content
						.get(last.start_byte()..last.end_byte())
						.unwrap_or_default(),
				);
				snippet.push('\n');
			}
		}
	}
	snippet.push_str(
		content
			.get(node.start_byte()..node.end_byte())
			.unwrap_or_default(),
	);
	(snippet, combined_start + 1)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn python_functions_classes_and_imports() {
		let source = "\
import os
from collections import defaultdict


def helper(value):
    \"\"\"Normalize a value.\"\"\"
    return value.strip()


class Processor:
    \"\"\"Runs things.\"\"\"

    def run(self, items):
        counts = defaultdict(int)
        for item in items:
            counts[helper(item)] += 1
        return counts
";
		let parsed = parse_structured(Lang::Python, source).unwrap();
		assert_eq!(parsed.functions_count, 1);
		assert_eq!(parsed.classes_count, 1);
		assert_eq!(parsed.imports.len(), 2);

		let helper = parsed
			.chunks
			.iter()
			.find(|c| c.name.as_deref() == Some("helper"))
			.unwrap();
		assert_eq!(helper.kind, ChunkKind::Function);
		assert_eq!(helper.parameters, vec!["value"]);
		assert_eq!(helper.docstring.as_deref(), Some("Normalize a value."));

		let method = parsed
			.chunks
			.iter()
			.find(|c| c.name.as_deref() == Some("run"))
			.unwrap();
		assert_eq!(method.kind, ChunkKind::Method);
		assert_eq!(method.parameters, vec!["items"]);

		assert!(parsed
			.chunks
			.iter()
			.any(|c| c.kind == ChunkKind::ImportBlock && c.start_line == 1));
	}

	#[test]
	fn syntax_error_is_reported_not_swallowed() {
		let err = parse_structured(Lang::Python, "def broken(:\n    pass\n");
		assert!(err.is_err());
	}

	#[test]
	fn rust_items_are_extracted() {
		let source = "\
use std::collections::HashMap;

/// Counts words.
pub fn count(words: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for w in words {
        *map.entry(w.clone()).or_insert(0) += 1;
    }
    map
}

pub struct Counter {
    total: usize,
}
";
		let parsed = parse_structured(Lang::Rust, source).unwrap();
		assert_eq!(parsed.functions_count, 1);
		assert_eq!(parsed.classes_count, 1);
		let count = parsed
			.chunks
			.iter()
			.find(|c| c.name.as_deref() == Some("count"))
			.unwrap();
		// Doc comment is folded into the chunk and its line starts the span
		assert!(count.content.starts_with("/// Counts words."));
		assert_eq!(count.start_line, 3);
	}
}
