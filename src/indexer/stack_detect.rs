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

//! Stack/framework auto-detection from the repository's file listing.
//!
//! Runs over the FULL unfiltered listing: the telltale manifest files
//! (lock files, package manifests) are usually excluded by the extension
//! allow-list, so the candidate set alone is not enough.

/// Ordered detection rules; the first hit wins. Framework-specific markers
/// come before their base language so `manage.py` beats plain `python`.
const STACK_RULES: &[(&str, &str)] = &[
	("manage.py", "django"),
	("next.config.js", "nextjs"),
	("next.config.ts", "nextjs"),
	("nuxt.config.ts", "nuxt"),
	("angular.json", "angular"),
	("Gemfile", "rails"),
	("artisan", "laravel"),
	("pyproject.toml", "python"),
	("requirements.txt", "python"),
	("Cargo.toml", "rust"),
	("go.mod", "go"),
	("pom.xml", "java"),
	("build.gradle", "java"),
	("composer.json", "php"),
	("package.json", "node"),
];

/// Detect the project stack from file paths alone. Only file names at any
/// depth are considered; contents are never read.
pub fn detect_stack(paths: &[String]) -> Option<String> {
	for (marker, stack) in STACK_RULES {
		let found = paths.iter().any(|p| {
			p == marker
				|| p.ends_with(&format!("/{}", marker))
		});
		if found {
			return Some((*stack).to_string());
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	fn paths(list: &[&str]) -> Vec<String> {
		list.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn framework_beats_language() {
		let detected = detect_stack(&paths(&[
			"manage.py",
			"requirements.txt",
			"app/models.py",
		]));
		assert_eq!(detected.as_deref(), Some("django"));
	}

	#[test]
	fn nested_manifests_count() {
		let detected = detect_stack(&paths(&["backend/go.mod", "backend/main.go"]));
		assert_eq!(detected.as_deref(), Some("go"));
	}

	#[test]
	fn no_marker_no_stack() {
		assert_eq!(detect_stack(&paths(&["notes.txt", "data.csv"])), None);
	}

	#[test]
	fn package_json_is_last_resort() {
		let detected = detect_stack(&paths(&["package.json", "next.config.js"]));
		assert_eq!(detected.as_deref(), Some("nextjs"));
	}
}
