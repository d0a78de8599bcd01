/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use clap::Parser;
use uci_parser::UciCommand;

use crate::Square;

/// A command to be sent to the engine.
///
/// Anything that parses as UCI takes that path; these are the extra
/// commands useful when driving the engine by hand.
#[derive(Debug, Clone, Parser)]
#[command(multicall = true, about, rename_all = "lower")]
pub enum EngineCommand {
    /// Run a fixed-depth benchmark over a suite of positions.
    Bench {
        /// Override the default benchmark depth.
        #[arg(short, long, required = false)]
        depth: Option<i32>,
    },

    /// Print a visual representation of the current board state.
    #[command(alias = "d")]
    Display,

    /// Print the static evaluation of the current position.
    Eval,

    /// Quit the engine.
    #[command(aliases = ["quit", "q"])]
    Exit,

    /// Generate and print a FEN string for the current position.
    Fen,

    /// Display occupancy statistics of the transposition table.
    #[command(aliases = ["tt", "ttable"])]
    HashInfo,

    /// Apply the provided move to the current position, if it is legal.
    MakeMove { mv_string: String },

    /// Show all legal moves in the current position.
    ///
    /// If `square` is provided, only moves from that square are shown.
    Moves { square: Option<Square> },

    /// Block until any running search has finished.
    Wait,
}

/// Everything the engine's event loop can receive.
#[derive(Debug, Clone)]
pub enum Command {
    Uci(UciCommand),
    Engine(EngineCommand),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_commands_parse() {
        assert!(matches!(
            EngineCommand::try_parse_from(["display"]),
            Ok(EngineCommand::Display)
        ));
        assert!(matches!(
            EngineCommand::try_parse_from(["d"]),
            Ok(EngineCommand::Display)
        ));
        assert!(matches!(
            EngineCommand::try_parse_from(["bench", "--depth", "5"]),
            Ok(EngineCommand::Bench { depth: Some(5) })
        ));
        assert!(EngineCommand::try_parse_from(["frobnicate"]).is_err());
    }

    #[test]
    fn test_moves_accepts_square() {
        let cmd = EngineCommand::try_parse_from(["moves", "e2"]).unwrap();
        let EngineCommand::Moves { square } = cmd else {
            panic!("expected a moves command");
        };
        assert_eq!(square, Some(Square::from_uci("e2").unwrap()));
    }
}
