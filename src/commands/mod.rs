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

pub mod config;
pub mod context;
pub mod delete;
pub mod index;
pub mod reconcile;
pub mod search;
pub mod status;

pub use config::ConfigArgs;
pub use context::ContextArgs;
pub use delete::DeleteArgs;
pub use index::IndexArgs;
pub use reconcile::ReconcileArgs;
pub use search::SearchArgs;
pub use status::StatusArgs;
