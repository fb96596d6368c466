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

//! Closed set of supported languages and their parser bindings.
//!
//! Each variant is bound to an explicit parser path: a tree-sitter grammar
//! for the structured tier where one is compiled in, signature patterns for
//! the pattern tier, and `Generic` as the mandatory whole-file fallback.

use std::path::Path;

/// Supported languages. `Generic` must stay the catch-all variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
	Python,
	Rust,
	JavaScript,
	TypeScript,
	Go,
	Ruby,
	Php,
	Java,
	Cpp,
	Generic,
}

impl Lang {
	/// Detect language from a file path's extension.
	pub fn from_path(path: &str) -> Self {
		let ext = Path::new(path)
			.extension()
			.and_then(|e| e.to_str())
			.unwrap_or("")
			.to_lowercase();
		match ext.as_str() {
			"py" => Lang::Python,
			"rs" => Lang::Rust,
			"js" | "jsx" | "mjs" => Lang::JavaScript,
			"ts" | "tsx" => Lang::TypeScript,
			"go" => Lang::Go,
			"rb" => Lang::Ruby,
			"php" => Lang::Php,
			"java" => Lang::Java,
			"c" | "h" | "cc" | "cpp" | "cxx" | "hpp" => Lang::Cpp,
			_ => Lang::Generic,
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			Lang::Python => "python",
			Lang::Rust => "rust",
			Lang::JavaScript => "javascript",
			Lang::TypeScript => "typescript",
			Lang::Go => "go",
			Lang::Ruby => "ruby",
			Lang::Php => "php",
			Lang::Java => "java",
			Lang::Cpp => "cpp",
			Lang::Generic => "text",
		}
	}

	/// Tree-sitter grammar for the structured tier, where one is compiled in.
	pub fn ts_language(&self) -> Option<tree_sitter::Language> {
		match self {
			Lang::Python => Some(tree_sitter_python::LANGUAGE.into()),
			Lang::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
			Lang::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
			Lang::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
			Lang::Go => Some(tree_sitter_go::LANGUAGE.into()),
			_ => None,
		}
	}

	/// Node kinds treated as function definitions.
	pub fn function_kinds(&self) -> &'static [&'static str] {
		match self {
			Lang::Python => &["function_definition"],
			Lang::Rust => &["function_item"],
			Lang::JavaScript => &["function_declaration", "generator_function_declaration"],
			Lang::TypeScript => &["function_declaration", "generator_function_declaration"],
			Lang::Go => &["function_declaration", "method_declaration"],
			_ => &[],
		}
	}

	/// Node kinds treated as class-like containers.
	pub fn class_kinds(&self) -> &'static [&'static str] {
		match self {
			Lang::Python => &["class_definition"],
			Lang::Rust => &["struct_item", "enum_item", "trait_item", "impl_item"],
			Lang::JavaScript => &["class_declaration"],
			Lang::TypeScript => &["class_declaration", "interface_declaration", "enum_declaration"],
			Lang::Go => &["type_declaration"],
			_ => &[],
		}
	}

	/// Node kinds carrying method definitions inside a class container.
	pub fn method_kinds(&self) -> &'static [&'static str] {
		match self {
			Lang::Python => &["function_definition"],
			Lang::Rust => &["function_item"],
			Lang::JavaScript | Lang::TypeScript => &["method_definition"],
			_ => &[],
		}
	}

	/// Node kinds carrying import statements.
	pub fn import_kinds(&self) -> &'static [&'static str] {
		match self {
			Lang::Python => &["import_statement", "import_from_statement"],
			Lang::Rust => &["use_declaration"],
			Lang::JavaScript | Lang::TypeScript => &["import_statement"],
			Lang::Go => &["import_declaration"],
			_ => &[],
		}
	}

	/// Whether block extent is determined by indentation rather than braces.
	pub fn indentation_significant(&self) -> bool {
		matches!(self, Lang::Python)
	}

	/// Keywords counted by the complexity classifier. The set is shared;
	/// per-language variation is not worth the precision for a coarse metric.
	pub fn branch_keywords() -> &'static [&'static str] {
		&[
			"if", "else", "elif", "for", "while", "match", "case", "switch", "try", "except",
			"catch", "loop", "when",
		]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn detects_by_extension() {
		assert_eq!(Lang::from_path("src/app/models.py"), Lang::Python);
		assert_eq!(Lang::from_path("lib/store.rs"), Lang::Rust);
		assert_eq!(Lang::from_path("web/App.tsx"), Lang::TypeScript);
		assert_eq!(Lang::from_path("cmd/main.go"), Lang::Go);
		assert_eq!(Lang::from_path("README"), Lang::Generic);
		assert_eq!(Lang::from_path("data.yaml"), Lang::Generic);
	}

	#[test]
	fn structured_tier_coverage() {
		assert!(Lang::Python.ts_language().is_some());
		assert!(Lang::Go.ts_language().is_some());
		assert!(Lang::Ruby.ts_language().is_none());
		assert!(Lang::Generic.ts_language().is_none());
	}
}
