/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fs, sync::Arc};

use anyhow::{Context, Result};
use arcana::{ArcanaCatalog, Cli, Engine, EngineConfig, Scenario};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr so that they never mix with command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = start(Cli::parse()) {
        eprintln!("{} encountered an error: {e:#}", env!("CARGO_PKG_NAME"));
        std::process::exit(1);
    }
}

/// Builds the engine from the command-line arguments, queues the startup commands, and runs it.
fn start(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };

    let catalog = match &cli.catalog {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read arcana catalog at {}", path.display()))?;
            ArcanaCatalog::from_json(&json)?
        }
        None => ArcanaCatalog::builtin()?,
    };

    let scenario = match &cli.fen {
        Some(fen) => Scenario::from_fen(fen.as_str()),
        None => Scenario::default(),
    };

    let mut engine = Engine::new(Arc::new(catalog), config, scenario)?;
    for command in cli.startup_commands()? {
        engine.send_command(command)?;
    }

    engine.run()
}
