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

use codescout::retrieval::RetrievedChunk;
use codescout::service::CodescoutService;

#[derive(Args, Debug)]
pub struct SearchArgs {
	/// Project identifier to search in
	#[arg(long)]
	pub project: String,

	/// Natural language query
	pub query: String,

	/// Maximum number of results
	#[arg(long, default_value_t = 10)]
	pub limit: usize,

	/// Print results as JSON
	#[arg(long)]
	pub json: bool,
}

pub async fn execute(service: &CodescoutService, args: &SearchArgs) -> Result<(), anyhow::Error> {
	let result = service.search(&args.project, &args.query, args.limit).await?;

	if let Some(error) = &result.error {
		println!("Search unavailable: {}", error);
		return Ok(());
	}

	if args.json {
		let rows: Vec<serde_json::Value> = result
			.chunks
			.iter()
			.map(|c| {
				serde_json::json!({
					"source": c.source,
					"file_path": c.file_path,
					"chunk_type": c.chunk_type,
					"entity_name": c.entity_name,
					"start_line": c.start_line,
					"end_line": c.end_line,
					"relevance": c.relevance,
				})
			})
			.collect();
		println!("{}", serde_json::to_string_pretty(&rows)?);
		return Ok(());
	}

	render_chunks(&result.chunks);
	println!("({} ms)", result.retrieval_time_ms);
	Ok(())
}

fn render_chunks(chunks: &[RetrievedChunk]) {
	if chunks.is_empty() {
		println!("No results found for the query.");
		return;
	}

	println!("Found {} chunks:\n", chunks.len());

	for (idx, chunk) in chunks.iter().enumerate() {
		println!(
			"╔══════════════════ File: {} ══════════════════",
			chunk.file_path
		);
		println!("║");
		println!("║ Result {} of {}", idx + 1, chunks.len());
		println!(
			"║ {} `{}` via {}",
			chunk.chunk_type,
			chunk.entity_name.as_deref().unwrap_or("(unnamed)"),
			chunk.source
		);
		println!("║ Lines: {}-{}", chunk.start_line, chunk.end_line);
		println!("║ Relevance: {:.0}%", chunk.relevance * 100.0);
		println!("║ Content:");
		println!("║ ┌────────────────────────────────────");
		for line in chunk.content.lines().take(20) {
			println!("║ │ {}", line);
		}
		if chunk.content.lines().count() > 20 {
			println!("║ │ [Content truncated]");
		}
		println!("║ └────────────────────────────────────");
		println!("╚════════════════════════════════════════\n");
	}
}
