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

//! Pattern parse tier: ordered signature regexes with block extents computed
//! by indentation depth or brace balance. Used for languages without a
//! compiled-in grammar and as the fallback when the structured tier hits a
//! syntax error. This tier never fails; unmatched content simply produces
//! fewer chunks.

use regex::Regex;
use std::sync::LazyLock;

use super::languages::Lang;
use super::{classify_complexity, Chunk, ChunkKind, Import, ParsedFile};

struct SignatureRule {
	kind: ChunkKind,
	regex: Regex,
}

fn rule(kind: ChunkKind, pattern: &str) -> SignatureRule {
	SignatureRule {
		kind,
		// Patterns are static; a typo here is a programming error.
		regex: Regex::new(pattern).expect("invalid signature pattern"),
	}
}

static PYTHON_RULES: LazyLock<Vec<SignatureRule>> = LazyLock::new(|| {
	vec![
		rule(
			ChunkKind::Function,
			r"^(?P<indent>[ \t]*)(?:async\s+)?def\s+(?P<name>\w+)\s*\((?P<params>[^)]*)",
		),
		rule(ChunkKind::Class, r"^(?P<indent>[ \t]*)class\s+(?P<name>\w+)"),
	]
});

static RUBY_RULES: LazyLock<Vec<SignatureRule>> = LazyLock::new(|| {
	vec![
		rule(
			ChunkKind::Function,
			r"^(?P<indent>\s*)def\s+(?P<name>[\w?!]+)(?:\s*\((?P<params>[^)]*)\))?",
		),
		rule(
			ChunkKind::Class,
			r"^(?P<indent>\s*)(?:class|module)\s+(?P<name>\w+)",
		),
	]
});

static BRACE_RULES_JS: LazyLock<Vec<SignatureRule>> = LazyLock::new(|| {
	vec![
		rule(
			ChunkKind::Function,
			r"^\s*(?:export\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>\w+)\s*\((?P<params>[^)]*)",
		),
		rule(
			ChunkKind::Function,
			r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>\w+)\s*=\s*(?:async\s+)?(?:function|\()",
		),
		rule(ChunkKind::Class, r"^\s*(?:export\s+)?class\s+(?P<name>\w+)"),
	]
});

static RUST_RULES: LazyLock<Vec<SignatureRule>> = LazyLock::new(|| {
	vec![
		rule(
			ChunkKind::Function,
			r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(?P<name>\w+)",
		),
		rule(
			ChunkKind::Class,
			r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+(?P<name>\w+)",
		),
		rule(ChunkKind::Class, r"^\s*impl(?:<[^>]*>)?\s+(?P<name>\w+)"),
	]
});

static GO_RULES: LazyLock<Vec<SignatureRule>> = LazyLock::new(|| {
	vec![
		rule(
			ChunkKind::Function,
			r"^func\s+(?:\([^)]*\)\s*)?(?P<name>\w+)\s*\((?P<params>[^)]*)",
		),
		rule(
			ChunkKind::Class,
			r"^type\s+(?P<name>\w+)\s+(?:struct|interface)",
		),
	]
});

static PHP_RULES: LazyLock<Vec<SignatureRule>> = LazyLock::new(|| {
	vec![
		rule(
			ChunkKind::Function,
			r"(?:public\s+|private\s+|protected\s+|static\s+)*function\s+(?P<name>\w+)\s*\((?P<params>[^)]*)",
		),
		rule(
			ChunkKind::Class,
			r"^\s*(?:abstract\s+|final\s+)?(?:class|interface|trait)\s+(?P<name>\w+)",
		),
	]
});

static JAVA_RULES: LazyLock<Vec<SignatureRule>> = LazyLock::new(|| {
	vec![
		rule(
			ChunkKind::Class,
			r"^\s*(?:public\s+|final\s+|abstract\s+)*(?:class|interface|enum|record)\s+(?P<name>\w+)",
		),
		rule(
			ChunkKind::Function,
			r"^\s*(?:public|private|protected)\s+(?:static\s+)?(?:final\s+)?[\w<>\[\],\s]+\s+(?P<name>\w+)\s*\((?P<params>[^)]*)\)",
		),
	]
});

static CPP_RULES: LazyLock<Vec<SignatureRule>> = LazyLock::new(|| {
	vec![
		rule(
			ChunkKind::Class,
			r"^\s*(?:class|struct)\s+(?P<name>\w+)\s*(?::|\{|$)",
		),
		rule(
			ChunkKind::Function,
			r"^[\w:&*<>~\s]+?(?P<name>[\w~]+)\s*\((?P<params>[^;()]*)\)\s*(?:const\s*)?\{",
		),
	]
});

static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"^\s*(?:import\s+.+|from\s+\S+\s+import\s+.+|use\s+\S+.*;|require(?:_relative)?\s+.+|#include\s+.+)",
	)
	.expect("invalid import pattern")
});

fn signature_rules(lang: Lang) -> &'static [SignatureRule] {
	match lang {
		Lang::Python => &PYTHON_RULES,
		Lang::Ruby => &RUBY_RULES,
		Lang::JavaScript | Lang::TypeScript => &BRACE_RULES_JS,
		Lang::Rust => &RUST_RULES,
		Lang::Go => &GO_RULES,
		Lang::Php => &PHP_RULES,
		Lang::Java => &JAVA_RULES,
		Lang::Cpp => &CPP_RULES,
		Lang::Generic => &[],
	}
}

pub fn parse_patterns(lang: Lang, content: &str) -> ParsedFile {
	let lines: Vec<&str> = content.lines().collect();
	let mut parsed = ParsedFile {
		language: lang.name(),
		total_lines: lines.len(),
		chunks: Vec::new(),
		functions_count: 0,
		classes_count: 0,
		imports: Vec::new(),
	};

	let indentation = lang.indentation_significant() || lang == Lang::Ruby;

	for (idx, line) in lines.iter().enumerate() {
		let Some((rule, caps)) = signature_rules(lang)
			.iter()
			.find_map(|r| r.regex.captures(line).map(|c| (r, c)))
		else {
			continue;
		};

		let end_idx = if indentation {
			indent_block_end(&lines, idx)
		} else {
			brace_block_end(&lines, idx)
		};

		let name = caps.name("name").map(|m| m.as_str().to_string());
		let parameters = caps
			.name("params")
			.map(|m| split_parameters(m.as_str()))
			.unwrap_or_default();
		let indent = caps.name("indent").map(|m| m.as_str().len()).unwrap_or(0);

		let kind = match rule.kind {
			// An indented definition in an indentation-significant language
			// sits inside a class body.
			ChunkKind::Function if indentation && indent > 0 => ChunkKind::Method,
			other => other,
		};

		let body: String = lines[idx..=end_idx].join("\n");
		match kind {
			ChunkKind::Function => parsed.functions_count += 1,
			ChunkKind::Class => parsed.classes_count += 1,
			_ => {}
		}
		parsed.chunks.push(Chunk {
			kind,
			complexity: classify_complexity(&body, true),
			content: body,
			start_line: idx + 1,
			end_line: end_idx + 1,
			name,
			parameters,
			dependencies: Vec::new(),
			docstring: None,
		});
	}

	collect_imports(&lines, &mut parsed);
	parsed
}

fn split_parameters(raw: &str) -> Vec<String> {
	raw.split(',')
		.map(|p| p.split([':', '=']).next().unwrap_or("").trim().to_string())
		.filter(|p| !p.is_empty() && p != "self" && p != "&self" && p != "&mut self")
		.collect()
}

fn indent_width(line: &str) -> usize {
	line.chars()
		.take_while(|c| *c == ' ' || *c == '\t')
		.map(|c| if c == '\t' { 4 } else { 1 })
		.sum()
}

/// Scan forward until indentation returns to (or below) the opening level.
/// Blank lines inside the block are skipped; trailing blanks are excluded.
fn indent_block_end(lines: &[&str], start_idx: usize) -> usize {
	let opening = indent_width(lines[start_idx]);
	let mut end = start_idx;
	for (offset, line) in lines.iter().enumerate().skip(start_idx + 1) {
		if line.trim().is_empty() {
			continue;
		}
		if indent_width(line) > opening {
			end = offset;
		} else {
			break;
		}
	}
	end
}

/// Scan forward tracking brace balance; the block ends where depth returns
/// to zero. Signatures with no opening brace within a few lines stay
/// single-line (declarations, abstract methods).
fn brace_block_end(lines: &[&str], start_idx: usize) -> usize {
	let mut depth: i64 = 0;
	let mut seen_open = false;
	for (offset, line) in lines.iter().enumerate().skip(start_idx) {
		for c in line.chars() {
			match c {
				'{' => {
					depth += 1;
					seen_open = true;
				}
				'}' => depth -= 1,
				_ => {}
			}
		}
		if seen_open && depth <= 0 {
			return offset;
		}
		if !seen_open && offset >= start_idx + 2 {
			return start_idx;
		}
	}
	lines.len().saturating_sub(1)
}

fn collect_imports(lines: &[&str], parsed: &mut ParsedFile) {
	let mut block: Vec<(usize, &str)> = Vec::new();

	let mut flush = |block: &mut Vec<(usize, &str)>, parsed: &mut ParsedFile| {
		if block.is_empty() {
			return;
		}
		let start_line = block[0].0 + 1;
		let end_line = block[block.len() - 1].0 + 1;
		let content: String = block
			.iter()
			.map(|(_, l)| *l)
			.collect::<Vec<_>>()
			.join("\n");
		parsed.chunks.push(Chunk {
			kind: ChunkKind::ImportBlock,
			complexity: super::Complexity::Low,
			content,
			start_line,
			end_line,
			name: None,
			parameters: Vec::new(),
			dependencies: Vec::new(),
			docstring: None,
		});
		block.clear();
	};

	for (idx, line) in lines.iter().enumerate() {
		if IMPORT_PATTERN.is_match(line) {
			parsed.imports.push(Import {
				statement: line.trim().to_string(),
				line: idx + 1,
			});
			if let Some(&(last_idx, _)) = block.last() {
				if idx > last_idx + 1 {
					flush(&mut block, parsed);
				}
			}
			block.push((idx, line));
		}
	}
	flush(&mut block, parsed);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn python_blocks_end_by_indentation() {
		let source = "\
import os

def outer(a):
    if a:
        return 1
    return 2

class Widget:
    def render(self):
        return '<div>'
";
		let parsed = parse_patterns(Lang::Python, source);

		let outer = parsed
			.chunks
			.iter()
			.find(|c| c.name.as_deref() == Some("outer"))
			.unwrap();
		assert_eq!(outer.kind, ChunkKind::Function);
		assert_eq!((outer.start_line, outer.end_line), (3, 6));

		let render = parsed
			.chunks
			.iter()
			.find(|c| c.name.as_deref() == Some("render"))
			.unwrap();
		assert_eq!(render.kind, ChunkKind::Method);

		assert_eq!(parsed.functions_count, 1);
		assert_eq!(parsed.classes_count, 1);
		assert_eq!(parsed.imports.len(), 1);
	}

	#[test]
	fn brace_blocks_end_by_balance() {
		let source = "\
function add(a, b) {
    if (a > b) {
        return a + b;
    }
    return b;
}

class Cart {
    total() { return 0; }
}
";
		let parsed = parse_patterns(Lang::JavaScript, source);
		let add = parsed
			.chunks
			.iter()
			.find(|c| c.name.as_deref() == Some("add"))
			.unwrap();
		assert_eq!((add.start_line, add.end_line), (1, 6));

		let cart = parsed
			.chunks
			.iter()
			.find(|c| c.name.as_deref() == Some("Cart"))
			.unwrap();
		assert_eq!((cart.start_line, cart.end_line), (8, 10));
	}

	#[test]
	fn signature_without_body_stays_single_line() {
		let source = "\
interface Repo {
}
void find(int id);
";
		let parsed = parse_patterns(Lang::Java, source);
		assert!(parsed.chunks.iter().all(|c| c.end_line >= c.start_line));
	}

	#[test]
	fn ruby_methods_found() {
		let source = "\
require 'json'

class Parser
  def parse(input)
    JSON.parse(input)
  end
end
";
		let parsed = parse_patterns(Lang::Ruby, source);
		assert!(parsed
			.chunks
			.iter()
			.any(|c| c.name.as_deref() == Some("Parser")));
		assert!(parsed
			.chunks
			.iter()
			.any(|c| c.name.as_deref() == Some("parse") && c.kind == ChunkKind::Method));
	}

	#[test]
	fn import_groups_split_on_gaps() {
		let source = "\
import a
import b

import c
";
		let parsed = parse_patterns(Lang::Python, source);
		let blocks: Vec<&Chunk> = parsed
			.chunks
			.iter()
			.filter(|c| c.kind == ChunkKind::ImportBlock)
			.collect();
		assert_eq!(blocks.len(), 2);
		assert_eq!((blocks[0].start_line, blocks[0].end_line), (1, 2));
		assert_eq!((blocks[1].start_line, blocks[1].end_line), (4, 4));
	}
}
