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

use codescout::config::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
	/// Write the resolved configuration back to .codescout/config.toml
	#[arg(long)]
	pub save: bool,
}

pub fn execute(args: &ConfigArgs, config: Config) -> Result<(), anyhow::Error> {
	println!("{}", toml::to_string_pretty(&config)?);
	if args.save {
		config.save()?;
		println!("# saved to .codescout/config.toml");
	}
	Ok(())
}
