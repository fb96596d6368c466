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

use anyhow::Context;
use clap::Args;

use codescout::service::CodescoutService;

#[derive(Args, Debug)]
pub struct StatusArgs {
	/// Project identifier (resolves its repository)
	#[arg(long)]
	pub project: String,

	/// Print the report as JSON
	#[arg(long)]
	pub json: bool,
}

pub async fn execute(service: &CodescoutService, args: &StatusArgs) -> Result<(), anyhow::Error> {
	let repo = service
		.repository_for_project(&args.project)
		.await?
		.with_context(|| format!("no repository registered for project {}", args.project))?;
	let report = service
		.get_status(&repo.id)
		.await?
		.context("repository vanished while reading status")?;

	if args.json {
		println!("{}", serde_json::to_string_pretty(&report)?);
		return Ok(());
	}

	println!("Repository: {}/{} ({})", repo.owner, repo.name, repo.branch);
	println!("Status:     {}", report.status);
	println!("Progress:   {}%", report.progress_percent);
	println!("Files:      {}", report.files_count);
	println!("Chunks:     {}", report.chunks_count);
	if let Some(commit) = &report.last_commit_hash {
		println!("Commit:     {}", commit);
	}
	if let Some(message) = &report.error_message {
		println!("Message:    {}", message);
	}
	if let Some(summary) = &repo.summary {
		println!("\n{}", summary);
	}
	Ok(())
}
