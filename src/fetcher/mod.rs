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

//! Remote repository access: metadata validation against the hosting API,
//! clone into an ephemeral workspace, and commit diffing for incremental runs.

pub mod files;

pub use files::{list_candidate_files, FileDescriptor};

use anyhow::Result;
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use crate::error::FetchError;

/// Remote repository metadata from the hosting provider.
#[derive(Debug, Clone)]
pub struct RepoInfo {
	pub owner: String,
	pub repo: String,
	pub default_branch: String,
	pub private: bool,
	pub size_kb: u64,
}

/// Result of diffing two commits. A failed diff resolves to `Full`:
/// over-indexing is recoverable, under-indexing silently loses data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff {
	Full,
	Changed(Vec<String>),
}

/// Scratch clone directory, exclusively owned by one orchestrator run. The
/// backing tempdir is removed on drop, which covers success, caught errors
/// and panic unwind alike.
pub struct Workspace {
	dir: TempDir,
}

impl Workspace {
	pub fn path(&self) -> &Path {
		self.dir.path()
	}
}

/// Extract `(owner, repo)` from an https or ssh repository URL.
pub fn parse_repo_url(repo_url: &str) -> Result<(String, String), FetchError> {
	let path = if let Some(rest) = repo_url.strip_prefix("git@") {
		// git@github.com:owner/repo.git
		rest.split_once(':')
			.map(|(_, path)| path.to_string())
			.ok_or_else(|| FetchError::InvalidUrl(repo_url.to_string()))?
	} else {
		let parsed =
			url::Url::parse(repo_url).map_err(|_| FetchError::InvalidUrl(repo_url.to_string()))?;
		parsed.path().trim_start_matches('/').to_string()
	};

	let trimmed = path.trim_end_matches('/').trim_end_matches(".git");
	let mut parts = trimmed.split('/');
	match (parts.next(), parts.next()) {
		(Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
			Ok((owner.to_string(), repo.to_string()))
		}
		_ => Err(FetchError::InvalidUrl(repo_url.to_string())),
	}
}

/// Check repository access against the hosting API and resolve its metadata.
///
/// A 403 with an exhausted rate-limit header is `RateLimited`; any other
/// 403/404 is `AccessDenied`.
pub async fn validate_access(
	api_base: &str,
	repo_url: &str,
	token: Option<&str>,
) -> Result<RepoInfo, FetchError> {
	let (owner, repo) = parse_repo_url(repo_url)?;
	let endpoint = format!("{}/repos/{}/{}", api_base.trim_end_matches('/'), owner, repo);

	let mut request = crate::embedding::provider::HTTP_CLIENT
		.get(&endpoint)
		.header("User-Agent", "codescout")
		.header("Accept", "application/vnd.github+json");
	if let Some(token) = token {
		request = request.header("Authorization", format!("Bearer {}", token));
	}

	let response = request.send().await?;
	let status = response.status();

	if status.as_u16() == 403 {
		let exhausted = response
			.headers()
			.get("x-ratelimit-remaining")
			.and_then(|v| v.to_str().ok())
			.map(|v| v == "0")
			.unwrap_or(false);
		let body = response.text().await.unwrap_or_default();
		if exhausted {
			return Err(FetchError::RateLimited(format!(
				"{}/{}: {}",
				owner, repo, body
			)));
		}
		return Err(FetchError::AccessDenied(format!(
			"{}/{} returned 403",
			owner, repo
		)));
	}
	if status.as_u16() == 404 {
		return Err(FetchError::AccessDenied(format!(
			"{}/{} not found or not visible with the provided credentials",
			owner, repo
		)));
	}
	if !status.is_success() {
		return Err(FetchError::AccessDenied(format!(
			"{}/{} returned {}",
			owner, repo, status
		)));
	}

	let body: Value = response.json().await?;
	Ok(RepoInfo {
		owner,
		repo,
		default_branch: body["default_branch"]
			.as_str()
			.unwrap_or("main")
			.to_string(),
		private: body["private"].as_bool().unwrap_or(false),
		size_kb: body["size"].as_u64().unwrap_or(0),
	})
}

/// Clone the repository branch into a fresh scratch workspace.
pub fn clone_repository(
	repo_url: &str,
	branch: &str,
	token: Option<&str>,
) -> Result<Workspace, FetchError> {
	let dir = TempDir::new()?;

	let clone_url = match token {
		Some(token) if repo_url.starts_with("https://") => repo_url.replacen(
			"https://",
			&format!("https://x-access-token:{}@", token),
			1,
		),
		_ => repo_url.to_string(),
	};

	let output = Command::new("git")
		.args(["clone", "--branch", branch, "--single-branch", &clone_url])
		.arg(dir.path())
		.output()?;

	if !output.status.success() {
		let stderr = String::from_utf8_lossy(&output.stderr);
		// Never echo the token back in an error message
		return Err(FetchError::CloneError(
			stderr.replace(&clone_url, repo_url).trim().to_string(),
		));
	}

	Ok(Workspace { dir })
}

/// Current HEAD commit hash of the workspace clone.
pub fn current_commit(workspace: &Workspace) -> Result<String> {
	let output = Command::new("git")
		.args(["rev-parse", "HEAD"])
		.current_dir(workspace.path())
		.output()?;

	if !output.status.success() {
		return Err(anyhow::anyhow!("Failed to get git commit hash"));
	}

	Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Paths changed between the last indexed commit and the current one. With no
/// prior commit, or when the diff command itself fails, the answer is a full
/// reindex.
pub fn diff_since(
	workspace: &Workspace,
	last_commit: Option<&str>,
	current_commit: &str,
) -> Diff {
	let Some(last_commit) = last_commit else {
		return Diff::Full;
	};
	if last_commit == current_commit {
		return Diff::Changed(Vec::new());
	}

	let output = Command::new("git")
		.args(["diff", "--name-only", last_commit, current_commit])
		.current_dir(workspace.path())
		.output();

	match output {
		Ok(output) if output.status.success() => {
			let stdout = String::from_utf8_lossy(&output.stdout);
			let changed: Vec<String> = stdout
				.lines()
				.map(|l| l.trim().to_string())
				.filter(|l| !l.is_empty())
				.collect();
			Diff::Changed(changed)
		}
		_ => {
			tracing::warn!(
				last_commit,
				current_commit,
				"git diff failed, falling back to full reindex"
			);
			Diff::Full
		}
	}
}

/// Last commit touching a single file, as `(hash, iso_time)`.
pub fn file_last_commit(workspace: &Workspace, rel_path: &str) -> Option<(String, String)> {
	let output = Command::new("git")
		.args(["log", "-1", "--format=%H|%cI", "--", rel_path])
		.current_dir(workspace.path())
		.output()
		.ok()?;
	if !output.status.success() {
		return None;
	}
	let stdout = String::from_utf8(output.stdout).ok()?;
	let line = stdout.lines().next()?;
	let (hash, time) = line.split_once('|')?;
	if hash.is_empty() {
		return None;
	}
	Some((hash.to_string(), time.to_string()))
}

#[cfg(test)]
pub(crate) fn workspace_for_tests(dir: TempDir) -> Workspace {
	Workspace { dir }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_https_and_ssh_urls() {
		assert_eq!(
			parse_repo_url("https://github.com/acme/widgets").unwrap(),
			("acme".to_string(), "widgets".to_string())
		);
		assert_eq!(
			parse_repo_url("https://github.com/acme/widgets.git").unwrap(),
			("acme".to_string(), "widgets".to_string())
		);
		assert_eq!(
			parse_repo_url("git@github.com:acme/widgets.git").unwrap(),
			("acme".to_string(), "widgets".to_string())
		);
		assert!(parse_repo_url("https://github.com/").is_err());
		assert!(parse_repo_url("not a url").is_err());
	}

	#[test]
	fn no_prior_commit_means_full_reindex() {
		let dir = TempDir::new().unwrap();
		let workspace = workspace_for_tests(dir);
		assert_eq!(diff_since(&workspace, None, "abc"), Diff::Full);
	}

	#[test]
	fn same_commit_means_no_changes() {
		let dir = TempDir::new().unwrap();
		let workspace = workspace_for_tests(dir);
		assert_eq!(
			diff_since(&workspace, Some("abc"), "abc"),
			Diff::Changed(Vec::new())
		);
	}

	#[test]
	fn failed_diff_falls_back_to_full() {
		// Not a git repository, so the diff command fails
		let dir = TempDir::new().unwrap();
		let workspace = workspace_for_tests(dir);
		assert_eq!(diff_since(&workspace, Some("abc"), "def"), Diff::Full);
	}
}
