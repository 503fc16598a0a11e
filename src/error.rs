/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use thiserror::Error;

use crate::{Category, Color, GameResult};

/// Errors raised by the arcana catalog and by per-player arcana state.
#[derive(Error, Debug)]
pub enum ArcanaError {
    /// No catalog entry has this identifier.
    #[error("Unknown arcana {0:?}")]
    Unknown(String),

    /// The player holds no uses of this arcana.
    #[error("{} has no uses of {id:?} left", color.name())]
    Exhausted { id: String, color: Color },

    /// Always-on arcana apply while held and cannot be activated.
    #[error("Arcana {0:?} is always on and cannot be activated")]
    Passive(String),

    /// A catalog entry's effect does not belong to its category.
    #[error("Catalog entry {id:?}: a {category} arcana cannot have a {effect} effect")]
    Mismatch {
        id: String,
        category: Category,
        effect: &'static str,
    },

    /// Two catalog entries share an identifier.
    #[error("Catalog entry {0:?} is defined more than once")]
    Duplicate(String),

    /// The catalog could not be read.
    #[error("Failed to parse arcana catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by a [`crate::GameSession`].
///
/// None of these are fatal; the session is left unchanged whenever one is returned.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A search is running, so the position must not change.
    #[error("The engine is thinking")]
    Thinking,

    /// The game has ended and only a restart is accepted.
    #[error("The game is over: {0}")]
    GameOver(GameResult),

    /// The move is not legal in the current state.
    #[error("Illegal move {0:?}")]
    IllegalMove(String),

    /// A mode is already active and must be used or cancelled first.
    #[error("Another arcana is already active")]
    ModeActive,


    /// A rewind asked for more plies than the history holds.
    #[error("Cannot rewind {requested} plies with only {available} in history")]
    RewindTooFar { requested: usize, available: usize },

    /// A promotion choice was abandoned before it was made.
    #[error("Promotion choice was cancelled")]
    PromotionCancelled,

    /// A position or move string could not be parsed.
    #[error("{0}")]
    Parse(#[from] anyhow::Error),

    #[error(transparent)]
    Arcana(#[from] ArcanaError),
}
