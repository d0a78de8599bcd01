/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use clap::Parser;
use skink::{Command, Engine, EngineCommand};

fn main() {
    let mut engine = Engine::new();
    println!("{} by {}", engine.name(), engine.authors());

    // A command supplied on the command line runs first, then the engine exits.
    if let Ok(cmd) = EngineCommand::try_parse_from(std::env::args_os().skip(1)) {
        engine.send_command(Command::Engine(cmd));
        engine.send_command(Command::Engine(EngineCommand::Exit));
    }

    // Run the engine's main event loop.
    if let Err(e) = engine.run() {
        eprintln!("{} encountered a fatal error: {e:#}", env!("CARGO_PKG_NAME"));
    }
}
