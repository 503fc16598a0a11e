/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{path::PathBuf, str::FromStr};

use clap::Parser;

use crate::{Color, HintLevel, SearchResult, Square, ZobristKey};

/// Command-line arguments of the engine binary.
#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON file of search and evaluation settings.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON file of arcana definitions, replacing the built-in catalog.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Start from this position instead of the standard one.
    #[arg(short, long)]
    pub fen: Option<String>,

    /// Engine commands to run on startup, separated by `;`.
    #[arg(trailing_var_arg = true)]
    pub commands: Vec<String>,
}

impl Cli {
    /// Parses the startup commands, in order.
    pub fn startup_commands(&self) -> Result<Vec<EngineCommand>, clap::Error> {
        self.commands
            .join(" ")
            .split(';')
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .map(EngineCommand::from_str)
            .collect()
    }
}

/// Why a search was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPurpose {
    /// Play the best move once found.
    Play,
    /// Reveal the result as a hint.
    Hint(HintLevel),
}

/// A command to be sent to the engine.
#[derive(Debug, Clone, Parser)]
#[command(
    multicall = true,
    about,
    rename_all = "lower",
    override_usage("<ENGINE COMMAND>")
)]
pub enum EngineCommand {
    /// Activate one of the side to move's arcana.
    #[command(aliases = ["act", "a"])]
    Activate { id: String },

    /// List the arcana both players hold.
    Arcana,

    /// Step one ply back in history.
    #[command(alias = "b")]
    Back,

    /// Leave the active arcana mode, refunding its use.
    Cancel,

    /// Print a visual representation of the current board state.
    #[command(alias = "d")]
    Display,

    /// Jump to the latest ply in history.
    End,

    /// Print an evaluation of the current position.
    Eval {
        /// If set, extra information will be printed during evaluation.
        #[arg(short, long, default_value = "false")]
        pretty: bool,
    },

    /// Quit the engine.
    #[command(aliases = ["quit", "q"])]
    Exit {
        /// If set, the engine will await the completion of any search threads before exiting.
        #[arg(short, long, default_value = "false")]
        cleanup: bool,
    },

    /// Generate and print a FEN string for the current position.
    Fen,

    /// Step one ply forward in history.
    #[command(alias = "f")]
    Forward,

    /// Search the current position and play the best move found.
    Go {
        /// Maximum depth to search.
        #[arg(short, long)]
        depth: Option<usize>,

        /// Milliseconds the search may spend.
        #[arg(short, long)]
        movetime: Option<u64>,

        /// Skip the search and play a quick, mostly random move.
        #[arg(short, long, default_value = "false")]
        glitch: bool,
    },

    /// Give the side to move some uses of an arcana.
    Grant {
        id: String,

        /// Color to receive the arcana, `w` or `b`. Defaults to the side to move.
        #[arg(short, long)]
        color: Option<Color>,

        #[arg(short, long, default_value = "1")]
        uses: u8,
    },

    /// Search the current position and reveal the result: 1 for a square, 2 for a move, 3 for a line.
    Hint {
        #[arg(default_value = "2")]
        level: u8,
    },

    /// Print the moves played so far.
    #[command(alias = "log")]
    History,

    /// Jump to a ply in history.
    Jump { ply: usize },

    /// Shows all legal moves in the current position, or for a specific piece.
    Moves {
        square: Option<Square>,

        /// If set, a Bitboard of all possible destinations will also be displayed.
        #[arg(short, long, default_value = "false")]
        pretty: bool,

        /// If set, moves will be sorted in alphabetical order.
        #[arg(short, long, default_value = "false")]
        sort: bool,
    },

    /// Restart the game from its starting position and arcana.
    #[command(aliases = ["restart", "ucinewgame"])]
    New,

    /// Performs a perft on the current position at the supplied depth, printing total node count.
    Perft { depth: usize },

    /// Apply the provided moves, one after another.
    #[command(aliases = ["move", "m"])]
    Play { moves: Vec<String> },

    /// Start a new game from the supplied FEN.
    Position { fen: Vec<String> },

    /// Start a new game on a shuffled back rank.
    Randomize,

    /// Print the result of the game, if it has ended.
    #[command(name = "result")]
    GameResult,

    /// Rewind the game with a rewinding arcana.
    Sight { id: String },

    /// Performs a split perft on the current position at the supplied depth.
    #[command(alias = "sperft")]
    Splitperft { depth: usize },

    /// Jump to the first ply in history.
    Start,

    /// Stop the current search. Its best move so far is still used.
    Stop,

    /// Await the current search, blocking until it completes.
    ///
    /// This is primarily used when executing searches on startup,
    /// to await their results before doing something else.
    Wait,

    /// Sent by a search thread once it concludes.
    #[command(skip)]
    Finished {
        result: SearchResult,
        purpose: SearchPurpose,
        root: ZobristKey,
    },
}

impl FromStr for EngineCommand {
    type Err = clap::Error;

    /// Attempt to parse an [`EngineCommand`] from a string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse_from(s.split_ascii_whitespace())
    }
}
