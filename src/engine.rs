/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::io::{self, Write};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use uci_parser::{UciCommand, UciInfo, UciOption, UciParseError, UciResponse, UciSearchOptions};

use crate::{
    eval, legal_moves, move_from_uci, Command, EngineCommand, Limits, Position, SearchOptions,
    TbConfig, ThreadPool, TranspositionTable, FEN_STARTPOS,
};

/// Default depth for the `bench` command.
const BENCH_DEPTH: i32 = 10;

/// Positions exercised by `bench`: openings, middlegames, endgames, and a
/// couple of tactical standards.
const BENCHMARK_FENS: &[&str] = &[
    FEN_STARTPOS,
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "3r1rk1/p5pp/bpp1pp2/8/q1PP1P2/b3P3/P2NQRPP/1R2B1K1 b - - 6 22",
    "8/k1p5/8/KP6/8/8/8/8 w - - 0 1",
    "8/8/8/8/8/6k1/6p1/6K1 w - - 0 1",
    "7k/8/8/8/8/8/6QK/8 w - - 0 1",
];

/// Tunable engine settings, mostly mirrors of UCI options.
#[derive(Clone, Debug)]
struct Options {
    hash_mb: usize,
    threads: usize,
    multipv: usize,
    ponder: bool,
    move_overhead: Duration,
    skill_level: i32,
    limit_strength: bool,
    elo: i32,
    chess960: bool,
    tb: TbConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            hash_mb: TranspositionTable::DEFAULT_SIZE,
            threads: 1,
            multipv: 1,
            ponder: false,
            move_overhead: Duration::from_millis(10),
            skill_level: 20,
            limit_strength: false,
            elo: 3190,
            chess960: false,
            tb: TbConfig::default(),
        }
    }
}

impl Options {
    /// The effective skill handicap, if any: either a direct `Skill Level`
    /// below maximum or an Elo target with strength limiting enabled.
    fn effective_skill(&self) -> Option<i32> {
        if self.limit_strength {
            let span = 3190 - 1320;
            let level = (self.elo.clamp(1320, 3190) - 1320) * 20 / span;
            Some(level)
        } else if self.skill_level < 20 {
            Some(self.skill_level)
        } else {
            None
        }
    }
}

/// The engine: an event loop over commands from stdin, driving the pool.
pub struct Engine {
    sender: Sender<Command>,
    receiver: Receiver<Command>,
    pool: ThreadPool,
    game: Position,
    options: Options,
    debug: bool,
}

impl Engine {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        let options = Options::default();

        Self {
            sender,
            receiver,
            pool: ThreadPool::new(options.threads, options.hash_mb),
            game: Position::default(),
            options,
            debug: false,
        }
    }

    /// Returns a string of the engine's name and current version.
    #[inline(always)]
    pub fn name(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// Returns a string of all authors of this engine.
    #[inline(always)]
    pub fn authors(&self) -> String {
        env!("CARGO_PKG_AUTHORS").replace(':', ", ")
    }

    /// Queues a command for the event loop.
    pub fn send_command(&self, command: Command) {
        self.sender
            .send(command)
            .expect("engine event loop must outlive its senders");
    }

    /// Entrypoint: spawn the stdin reader, then execute commands in order.
    pub fn run(&mut self) -> Result<()> {
        let sender = self.sender.clone();
        thread::spawn(|| {
            if let Err(err) = input_handler(sender) {
                eprintln!("input thread stopping: {err:#}");
            }
        });

        while let Ok(cmd) = self.receiver.recv() {
            match cmd {
                Command::Uci(uci) => {
                    if matches!(uci, UciCommand::Quit) {
                        self.pool.wait();
                        break;
                    }
                    // The UCI spec says to carry on after a bad command.
                    if let Err(e) = self.handle_uci_command(uci) {
                        eprintln!("{e:#}");
                    }
                }
                Command::Engine(cmd) => {
                    if matches!(cmd, EngineCommand::Exit) {
                        self.pool.wait();
                        break;
                    }
                    if let Err(e) = self.handle_engine_command(cmd) {
                        eprintln!("{e:#}");
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_uci_command(&mut self, uci: UciCommand) -> Result<()> {
        use UciCommand::*;
        match uci {
            Uci => self.uci(),

            Debug(status) => self.debug = status,

            IsReady => println!("{}", UciResponse::<&str>::ReadyOk),

            SetOption { name, value } => self.set_option(&name, value)?,

            Register { .. } => println!("{} requires no registration", self.name()),

            UciNewGame => {
                self.pool.new_game();
                self.game = crate::Position::default();
            }

            Position { fen, moves } => self.set_position(fen, moves)?,

            Go(options) => self.go(options)?,

            Stop => self.pool.stop(),

            PonderHit => self.pool.ponderhit(),

            Quit => unreachable!("handled by the event loop"),

            _ => bail!("{} does not support UCI command {uci:?}", self.name()),
        }

        Ok(())
    }

    fn handle_engine_command(&mut self, cmd: EngineCommand) -> Result<()> {
        match cmd {
            EngineCommand::Bench { depth } => self.bench(depth),

            EngineCommand::Display => println!("{}", self.game),

            EngineCommand::Eval => println!("{}", eval::evaluate(&self.game)),

            EngineCommand::Fen => println!("{}", self.game.to_fen()),

            EngineCommand::HashInfo => self.hash_info(),

            EngineCommand::MakeMove { mv_string } => {
                let mv = move_from_uci(&self.game, &mv_string)?;
                let gives_check = self.game.gives_check(mv);
                self.game.do_move(mv, gives_check);
            }

            EngineCommand::Moves { square } => {
                let moves: Vec<String> = legal_moves(&self.game)
                    .into_iter()
                    .filter(|mv| square.map_or(true, |sq| mv.from() == sq))
                    .map(|mv| mv.to_uci(self.options.chess960))
                    .collect();
                if moves.is_empty() {
                    println!("(none)");
                } else {
                    println!("{}", moves.join(", "));
                }
            }

            EngineCommand::Wait => self.pool.wait(),

            EngineCommand::Exit => unreachable!("handled by the event loop"),
        }

        Ok(())
    }

    /// The `uci` handshake: identity, options, `uciok`.
    fn uci(&self) {
        println!("id name {}\nid author {}\n", self.name(), self.authors());

        for opt in self.uci_options() {
            println!("{}", UciResponse::Option(opt));
        }
        // String options are printed literally; uci-parser models the rest.
        println!("option name SyzygyPath type string default <empty>");

        println!("{}", UciResponse::<&str>::UciOk);
    }

    fn uci_options(&self) -> Vec<UciOption> {
        vec![
            UciOption::spin(
                "Hash".to_string(),
                TranspositionTable::DEFAULT_SIZE as i32,
                TranspositionTable::MIN_SIZE as i32,
                TranspositionTable::MAX_SIZE as i32,
            ),
            UciOption::button("Clear Hash".to_string()),
            UciOption::spin("Threads".to_string(), 1, 1, 512),
            UciOption::spin("MultiPV".to_string(), 1, 1, 256),
            UciOption::check("Ponder".to_string(), false),
            UciOption::spin("Move Overhead".to_string(), 10, 0, 5000),
            UciOption::spin("Skill Level".to_string(), 20, 0, 20),
            UciOption::check("UCI_LimitStrength".to_string(), false),
            UciOption::spin("UCI_Elo".to_string(), 3190, 1320, 3190),
            UciOption::check("UCI_Chess960".to_string(), false),
            UciOption::spin("SyzygyProbeDepth".to_string(), 1, 1, 100),
            UciOption::spin("SyzygyProbeLimit".to_string(), 7, 0, 7),
            UciOption::check("Syzygy50MoveRule".to_string(), true),
        ]
    }

    /// Applies `setoption name <name> [value <value>]`.
    fn set_option(&mut self, name: &str, value: Option<String>) -> Result<()> {
        if self.pool.is_searching() {
            bail!("cannot change options during a search");
        }

        fn parsed<T: std::str::FromStr>(name: &str, value: &Option<String>) -> Result<T> {
            let Some(value) = value else {
                bail!("usage: setoption name {name} value <value>");
            };
            value
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid value {value:?} for option {name}"))
        }

        match name {
            "Hash" => {
                let mb: usize = parsed(name, &value)?;
                if !(TranspositionTable::MIN_SIZE..=TranspositionTable::MAX_SIZE).contains(&mb) {
                    bail!(
                        "Hash must be between {} and {} MB",
                        TranspositionTable::MIN_SIZE,
                        TranspositionTable::MAX_SIZE
                    );
                }
                self.options.hash_mb = mb;
                self.pool.resize_tt(mb);
            }

            "Clear Hash" => self.pool.new_game(),

            "Threads" => {
                let threads: usize = parsed(name, &value)?;
                if !(1..=512).contains(&threads) {
                    bail!("Threads must be between 1 and 512");
                }
                self.options.threads = threads;
                self.pool.set_thread_count(threads);
            }

            "MultiPV" => {
                let multipv: usize = parsed(name, &value)?;
                if !(1..=256).contains(&multipv) {
                    bail!("MultiPV must be between 1 and 256");
                }
                self.options.multipv = multipv;
            }

            "Ponder" => self.options.ponder = parsed(name, &value)?,

            "Move Overhead" => {
                let ms: u64 = parsed(name, &value)?;
                self.options.move_overhead = Duration::from_millis(ms.min(5000));
            }

            "Skill Level" => {
                let level: i32 = parsed(name, &value)?;
                if !(0..=20).contains(&level) {
                    bail!("Skill Level must be between 0 and 20");
                }
                self.options.skill_level = level;
            }

            "UCI_LimitStrength" => self.options.limit_strength = parsed(name, &value)?,

            "UCI_Elo" => self.options.elo = parsed(name, &value)?,

            "UCI_Chess960" => {
                self.options.chess960 = parsed(name, &value)?;
                // Re-read the current position under the new convention.
                self.game = Position::from_fen(&self.game.to_fen(), self.options.chess960)?;
            }

            "SyzygyPath" => {
                self.options.tb.path = value.filter(|v| !v.is_empty() && v != "<empty>");
                if self.options.tb.path.is_some() {
                    // No probing code is bundled; be explicit rather than silent.
                    println!(
                        "{}",
                        UciResponse::info(
                            UciInfo::new().string("tablebases configured but not available; probes will fail")
                        )
                    );
                }
            }

            "SyzygyProbeDepth" => self.options.tb.probe_depth = parsed(name, &value)?,

            "SyzygyProbeLimit" => self.options.tb.probe_limit = parsed(name, &value)?,

            "Syzygy50MoveRule" => self.options.tb.rule50 = parsed(name, &value)?,

            _ => bail!("unrecognized option {name:?}"),
        }

        if self.debug {
            println!(
                "{}",
                UciResponse::info(UciInfo::new().string(format!("option {name} updated")))
            );
        }

        Ok(())
    }

    /// Installs a position: `position [fen <fen> | startpos] [moves ...]`.
    fn set_position(&mut self, fen: Option<String>, moves: Vec<String>) -> Result<()> {
        let fen = fen.unwrap_or_else(|| FEN_STARTPOS.to_string());
        let mut game = Position::from_fen(&fen, self.options.chess960)?;

        for mv_str in moves {
            let mv = move_from_uci(&game, &mv_str)?;
            let gives_check = game.gives_check(mv);
            game.do_move(mv, gives_check);
        }

        self.game = game;
        Ok(())
    }

    /// Starts the pool on the current position with the parsed `go` limits.
    fn go(&mut self, opts: UciSearchOptions) -> Result<()> {
        if self.pool.is_searching() {
            bail!("a search is already running");
        }

        let mut searchmoves = Vec::new();
        for mv_str in &opts.searchmoves {
            searchmoves.push(move_from_uci(&self.game, mv_str)?);
        }

        let limits = Limits {
            time: [opts.wtime, opts.btime],
            inc: [opts.winc, opts.binc],
            movestogo: opts.movestogo,
            depth: opts.depth.map(|d| d as i32),
            nodes: opts.nodes.map(|n| n as u64),
            mate: opts.mate.map(|m| m as i32),
            movetime: opts.movetime,
            infinite: opts.infinite,
            ponder: opts.ponder,
            searchmoves,
            start_time: Instant::now(),
            move_overhead: self.options.move_overhead,
        };

        let search_options = SearchOptions {
            multipv: self.options.multipv,
            skill_level: self.options.effective_skill(),
            chess960: self.options.chess960,
            tb: self.options.tb.clone(),
        };

        self.pool.start_thinking(&self.game, limits, search_options);
        Ok(())
    }

    /// Fixed-depth searches over the benchmark suite, reporting total nodes
    /// and speed. Doubles as the determinism harness: single-threaded runs
    /// of `bench` are reproducible.
    fn bench(&mut self, depth: Option<i32>) {
        let depth = depth.unwrap_or(BENCH_DEPTH);
        let start = Instant::now();
        let mut nodes = 0u64;

        for (i, fen) in BENCHMARK_FENS.iter().enumerate() {
            println!("\nPosition {}/{}: {fen}", i + 1, BENCHMARK_FENS.len());
            let _ = io::stdout().flush();

            self.pool.new_game();
            let pos = Position::from_fen(fen, false).expect("benchmark FENs are valid");

            let limits = Limits {
                depth: Some(depth),
                ..Limits::default()
            };
            self.pool
                .start_thinking(&pos, limits, SearchOptions::default());
            nodes += self.pool.wait_for_nodes();
        }

        let elapsed = start.elapsed();
        let nps = (nodes as f64 / elapsed.as_secs_f64().max(1e-6)) as u64;
        println!("\n{nodes} nodes {nps} nps");

        self.pool.new_game();
    }

    /// Prints the occupancy of the transposition table.
    fn hash_info(&self) {
        println!(
            "hash: {}mb, {} entries, {} permill of a sample in use",
            self.options.hash_mb,
            self.pool.tt_capacity(),
            self.pool.tt_hashfull(),
        );
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Loops on stdin, forwarding parsed commands to the event loop.
///
/// UCI commands are tried first; anything else must be an [`EngineCommand`].
fn input_handler(sender: Sender<Command>) -> Result<()> {
    let mut buffer = String::with_capacity(2048);

    loop {
        buffer.clear();
        let bytes = io::stdin()
            .read_line(&mut buffer)
            .context("failed to read from stdin")?;

        // Ctrl+D / closed stdin.
        if bytes == 0 {
            sender
                .send(Command::Engine(EngineCommand::Exit))
                .context("failed to send quit after end of input")?;
            bail!("reached end of input");
        }

        let line = buffer.trim();
        if line.is_empty() {
            continue;
        }

        match UciCommand::new(line) {
            Ok(cmd) => sender
                .send(Command::Uci(cmd))
                .context("failed to forward UCI command")?,

            Err(UciParseError::UnrecognizedCommand { .. }) => {
                match EngineCommand::try_parse_from(line.split_ascii_whitespace()) {
                    Ok(cmd) => sender
                        .send(Command::Engine(cmd))
                        .context("failed to forward engine command")?,
                    Err(err) => eprintln!("{err}"),
                }
            }

            // A recognized UCI command with bad arguments: show usage.
            Err(err) => eprintln!("{err:#}"),
        }
    }
}
