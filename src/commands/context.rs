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

use clap::{Args, Subcommand};

use codescout::service::CodescoutService;

#[derive(Args, Debug)]
pub struct ContextArgs {
	#[command(subcommand)]
	pub command: ContextCommand,
}

#[derive(Subcommand, Debug)]
pub enum ContextCommand {
	/// Assemble code context for a feature description
	Feature {
		#[arg(long)]
		project: String,

		/// Feature description text
		text: String,
	},

	/// Assemble Markdown context for PRD generation
	Prd {
		#[arg(long)]
		project: String,

		/// Project description
		description: String,

		/// Feature names to look up existing code for
		#[arg(long = "feature")]
		features: Vec<String>,
	},
}

pub async fn execute(service: &CodescoutService, args: &ContextArgs) -> Result<(), anyhow::Error> {
	match &args.command {
		ContextCommand::Feature { project, text } => {
			let context = service.get_context_for_feature(project, text).await?;
			if let Some(error) = &context.error {
				println!("Context unavailable: {}", error);
			}
			if !context.context.is_empty() {
				println!("{}", context.context);
			}
			if !context.relevant_files.is_empty() {
				println!("\nRelevant files:");
				for file in &context.relevant_files {
					println!("  - {}", file);
				}
			}
			if !context.suggestions.is_empty() {
				println!("\nSuggestions:");
				for suggestion in &context.suggestions {
					println!("  - {}", suggestion);
				}
			}
		}
		ContextCommand::Prd {
			project,
			description,
			features,
		} => {
			let markdown = service
				.get_context_for_prd(project, description, features)
				.await?;
			println!("{}", markdown);
		}
	}
	Ok(())
}
