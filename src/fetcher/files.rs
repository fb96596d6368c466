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

//! Candidate file enumeration over a cloned workspace.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

use super::Workspace;

/// One file that passed the candidate filters.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
	pub rel_path: String,
	pub extension: String,
	pub size_bytes: u64,
	pub last_commit: Option<String>,
	pub last_commit_time: Option<String>,
}

/// Walk the workspace and apply the candidate filters in order:
/// extension allow-list, then exclude patterns, then the size ceiling.
/// A file failing any filter is excluded.
pub fn list_candidate_files(
	workspace: &Workspace,
	extensions: &[String],
	exclude_patterns: &[String],
	max_size_kb: u64,
) -> Result<Vec<FileDescriptor>> {
	let glob_set = build_glob_set(exclude_patterns)?;
	let substrings: Vec<&String> = exclude_patterns
		.iter()
		.filter(|p| !is_glob(p))
		.collect();

	let mut files = Vec::new();
	let walker = ignore::WalkBuilder::new(workspace.path())
		.hidden(true)
		.git_ignore(true)
		.git_global(false)
		.git_exclude(true)
		.build();

	for result in walker {
		let entry = match result {
			Ok(entry) => entry,
			Err(_) => continue,
		};
		if !entry.file_type().is_some_and(|ft| ft.is_file()) {
			continue;
		}

		let rel_path = match entry.path().strip_prefix(workspace.path()) {
			Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
			Err(_) => continue,
		};

		// 1. extension allow-list
		let extension = Path::new(&rel_path)
			.extension()
			.and_then(|e| e.to_str())
			.unwrap_or("")
			.to_lowercase();
		if !extensions.is_empty() && !extensions.iter().any(|e| e.eq_ignore_ascii_case(&extension))
		{
			continue;
		}

		// 2. exclude patterns (substring or glob)
		if substrings.iter().any(|p| rel_path.contains(p.as_str()))
			|| glob_set.is_match(&rel_path)
		{
			continue;
		}

		// 3. size ceiling
		let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
		if size_bytes > max_size_kb * 1024 {
			continue;
		}

		let (last_commit, last_commit_time) = match super::file_last_commit(workspace, &rel_path) {
			Some((hash, time)) => (Some(hash), Some(time)),
			None => (None, None),
		};

		files.push(FileDescriptor {
			rel_path,
			extension,
			size_bytes,
			last_commit,
			last_commit_time,
		});
	}

	files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
	Ok(files)
}

/// Unfiltered relative path listing, for stack detection over manifest files
/// that the extension allow-list would exclude.
pub fn full_file_listing(workspace: &Workspace) -> Vec<String> {
	let walker = ignore::WalkBuilder::new(workspace.path())
		.hidden(true)
		.git_ignore(true)
		.git_global(false)
		.git_exclude(true)
		.build();

	let mut paths = Vec::new();
	for result in walker {
		let Ok(entry) = result else { continue };
		if !entry.file_type().is_some_and(|ft| ft.is_file()) {
			continue;
		}
		if let Ok(rel) = entry.path().strip_prefix(workspace.path()) {
			paths.push(rel.to_string_lossy().replace('\\', "/"));
		}
	}
	paths.sort();
	paths
}

fn is_glob(pattern: &str) -> bool {
	pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns.iter().filter(|p| is_glob(p)) {
		// Match anywhere in the tree unless the pattern is already anchored
		let expanded = if pattern.starts_with("**") || pattern.starts_with('/') {
			pattern.trim_start_matches('/').to_string()
		} else {
			format!("**/{}", pattern)
		};
		builder.add(Glob::new(&expanded)?);
	}
	Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	fn workspace_with(files: &[(&str, &str)]) -> Workspace {
		let dir = tempfile::TempDir::new().unwrap();
		for (path, content) in files {
			let full = dir.path().join(path);
			fs::create_dir_all(full.parent().unwrap()).unwrap();
			fs::write(full, content).unwrap();
		}
		super::super::workspace_for_tests(dir)
	}

	fn exts(list: &[&str]) -> Vec<String> {
		list.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn extension_filter_applies_first() {
		let ws = workspace_with(&[
			("src/app.py", "print('hi')"),
			("src/app.js", "console.log('hi')"),
			("README.md", "# readme"),
		]);
		let files = list_candidate_files(&ws, &exts(&["py"]), &[], 500).unwrap();
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].rel_path, "src/app.py");
		assert_eq!(files[0].extension, "py");
	}

	#[test]
	fn substring_and_glob_excludes() {
		let ws = workspace_with(&[
			("src/app.py", "x = 1"),
			("vendor/lib.py", "y = 2"),
			("src/gen.min.py", "z = 3"),
		]);
		let files = list_candidate_files(
			&ws,
			&exts(&["py"]),
			&["vendor/".to_string(), "*.min.py".to_string()],
			500,
		)
		.unwrap();
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].rel_path, "src/app.py");
	}

	#[test]
	fn size_ceiling_excludes_large_files() {
		let big = "x".repeat(3 * 1024);
		let ws = workspace_with(&[("small.py", "a = 1"), ("big.py", big.as_str())]);
		let files = list_candidate_files(&ws, &exts(&["py"]), &[], 2).unwrap();
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].rel_path, "small.py");
	}

	#[test]
	fn full_listing_ignores_filters() {
		let ws = workspace_with(&[("package.json", "{}"), ("src/app.py", "x = 1")]);
		let all = full_file_listing(&ws);
		assert!(all.contains(&"package.json".to_string()));
		assert!(all.contains(&"src/app.py".to_string()));
	}
}
