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

// Codescout - repository indexing and hybrid retrieval pipeline
// Copyright (c) 2025 Muvon Un Limited

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use codescout::config::Config;
use codescout::service::CodescoutService;

mod commands;

#[derive(Parser)]
#[command(name = "codescout")]
#[command(version)]
#[command(about = "Codescout indexes a repository and serves hybrid code retrieval")]
struct CodescoutArgs {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Register a repository and run an indexing job
	Index(commands::IndexArgs),

	/// Search indexed code with a natural language query
	Search(commands::SearchArgs),

	/// Show a repository's indexing status
	Status(commands::StatusArgs),

	/// Assemble retrieval context for the AI agent
	Context(commands::ContextArgs),

	/// Delete a repository and its derived data
	Delete(commands::DeleteArgs),

	/// Retry embeddings that were never confirmed stored
	Reconcile(commands::ReconcileArgs),

	/// Show (or persist) the resolved configuration
	Config(commands::ConfigArgs),

	/// Generate shell completion scripts
	Completion {
		/// The shell to generate completion for
		#[arg(value_enum)]
		shell: Shell,
	},
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
	dotenvy::dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let args = CodescoutArgs::parse();

	// Load configuration - ensure .codescout directory exists
	let config = Config::load()?;

	// Handle the config command separately (doesn't need the service)
	if let Commands::Config(config_args) = &args.command {
		return commands::config::execute(config_args, config);
	}

	// Handle the Completion command separately (doesn't need the service)
	if let Commands::Completion { shell } = &args.command {
		let mut app = CodescoutArgs::command();
		let name = app.get_name().to_string();
		generate(*shell, &mut app, name, &mut std::io::stdout());
		return Ok(());
	}

	// Wire up the pipeline
	let service = CodescoutService::init(config).await?;

	match &args.command {
		Commands::Index(index_args) => commands::index::execute(&service, index_args).await?,
		Commands::Search(search_args) => commands::search::execute(&service, search_args).await?,
		Commands::Status(status_args) => commands::status::execute(&service, status_args).await?,
		Commands::Context(context_args) => {
			commands::context::execute(&service, context_args).await?
		}
		Commands::Delete(delete_args) => commands::delete::execute(&service, delete_args).await?,
		Commands::Reconcile(reconcile_args) => {
			commands::reconcile::execute(&service, reconcile_args).await?
		}
		Commands::Config(_) => unreachable!(),        // Already handled above
		Commands::Completion { .. } => unreachable!(), // Already handled above
	}

	service.shutdown().await;
	Ok(())
}
