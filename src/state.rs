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

use parking_lot::RwLock;
use std::sync::Arc;

/// Progress snapshot shared between an indexing run and its observers
/// (CLI progress display, job runner status updates).
#[derive(Default)]
pub struct RunState {
	pub repository_id: String,
	pub indexed_files: usize,
	pub total_files: usize,
	pub skipped_files: usize,
	pub error_files: usize,
	pub embedding_calls: usize,
	pub indexing_complete: bool,
	pub status_message: String,
	pub force_full: bool,
}

impl RunState {
	pub fn progress_percent(&self) -> u8 {
		if self.total_files == 0 {
			return 0;
		}
		let done = self.indexed_files + self.skipped_files + self.error_files;
		((done as f64 / self.total_files as f64) * 100.0).min(100.0) as u8
	}
}

pub type SharedState = Arc<RwLock<RunState>>;

pub fn create_shared_state() -> SharedState {
	Arc::new(RwLock::new(RunState::default()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn progress_percent_handles_zero_total() {
		let state = RunState::default();
		assert_eq!(state.progress_percent(), 0);
	}

	#[test]
	fn progress_percent_counts_all_outcomes() {
		let state = RunState {
			total_files: 10,
			indexed_files: 5,
			skipped_files: 2,
			error_files: 1,
			..RunState::default()
		};
		assert_eq!(state.progress_percent(), 80);
	}
}
