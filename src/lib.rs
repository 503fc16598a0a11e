/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Arcana catalog and per-player arcana state.
mod arcana;

/// Board representation, move encoding, and move generation.
mod board;

/// Command-line interface and engine commands.
mod cli;

/// Engine settings loaded from JSON.
mod config;

/// Code related to the engine's functionality, such as user input handling.
mod engine;

/// Error types of the arcana registry and game sessions.
mod error;

/// Evaluation of chess positions.
mod eval;

/// Game log with snapshots, navigation, and rewinding.
mod history;

/// Ordering of moves during search.
mod movepicker;

/// Scores returned by evaluation and search.
mod score;

/// Main engine logic; all search related code.
mod search;

/// A single game: position, arcana, history, and the query API.
mod session;

/// Tunable constants.
mod tune;

pub use arcana::*;
pub use board::*;
pub use cli::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use eval::*;
pub use history::*;
pub use movepicker::*;
pub use score::*;
pub use search::*;
pub use session::*;
