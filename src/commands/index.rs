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

use clap::Args;
use std::io::Write;

use codescout::service::CodescoutService;
use codescout::store::JobStatus;

#[derive(Args, Debug)]
pub struct IndexArgs {
	/// Project identifier owning the repository
	#[arg(long)]
	pub project: String,

	/// Remote repository URL (https or ssh)
	#[arg(long)]
	pub repo: String,

	/// Branch to index; defaults to the repository's default branch
	#[arg(long)]
	pub branch: Option<String>,

	/// Force a full reindex, ignoring the incremental commit diff
	#[arg(long)]
	pub force: bool,
}

pub async fn execute(service: &CodescoutService, args: &IndexArgs) -> Result<(), anyhow::Error> {
	println!("Indexing {} for project {}", args.repo, args.project);

	let job = service
		.start_indexing(&args.project, &args.repo, args.branch.as_deref(), args.force)
		.await?;
	println!("Queued job {}", job.id);

	let spinner_chars = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
	let mut spinner_idx = 0;

	loop {
		tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;

		let Some(current) = service.store().get_job(&job.id).await? else {
			break;
		};

		if current.status.is_terminal() {
			print!("\r\x1b[K");
			match current.status {
				JobStatus::Completed => {
					println!(
						"✓ Indexing complete! {} of {} files processed",
						current.processed_files, current.total_files
					);
				}
				_ => {
					println!(
						"✗ Indexing {}: {}",
						current.status.as_str(),
						current.error_message.unwrap_or_default()
					);
				}
			}
			break;
		}

		print!("\r\x1b[K");
		if current.total_files > 0 {
			let percentage =
				(current.processed_files as f32 / current.total_files as f32 * 100.0) as u32;
			print!(
				"{} Indexing: {}/{} files ({}%)",
				spinner_chars[spinner_idx], current.processed_files, current.total_files, percentage
			);
		} else {
			print!("{} Preparing...", spinner_chars[spinner_idx]);
		}
		std::io::stdout().flush()?;
		spinner_idx = (spinner_idx + 1) % spinner_chars.len();
	}

	Ok(())
}
