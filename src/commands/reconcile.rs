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
pub struct ReconcileArgs {
	/// Project identifier whose pending embeddings should be retried
	#[arg(long)]
	pub project: String,
}

pub async fn execute(service: &CodescoutService, args: &ReconcileArgs) -> Result<(), anyhow::Error> {
	let repo = service
		.repository_for_project(&args.project)
		.await?
		.with_context(|| format!("no repository registered for project {}", args.project))?;

	let reconciled = service.reconcile_embeddings(&repo.id).await?;
	println!("Reconciled {} pending embeddings", reconciled);
	Ok(())
}
