/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Depth searched when the caller does not supply one.
macro_rules! default_depth {
    () => {
        4
    };
}
pub(crate) use default_depth;

/// Milliseconds a search may spend when the caller does not supply a budget.
macro_rules! default_movetime_ms {
    () => {
        2_000
    };
}
pub(crate) use default_movetime_ms;

/// Percentage of the move time after which no new iteration is started.
macro_rules! soft_timeout_percent {
    () => {
        60
    };
}
pub(crate) use soft_timeout_percent;

/// Number of nodes searched between checks of the clock and the stop flag.
macro_rules! nodes_between_checks {
    () => {
        1024
    };
}
pub(crate) use nodes_between_checks;

/// Base score of a move when ordering moves during search.
macro_rules! base_move_score {
    () => {
        -20_000
    };
}
pub(crate) use base_move_score;

/// Bonus given to arcane moves when ordering moves during search, placing them after captures and before quiets.
macro_rules! arcane_move_bonus {
    () => {
        10_000
    };
}
pub(crate) use arcane_move_bonus;

/// Centipawns per square a piece can reach.
macro_rules! mobility_weight {
    () => {
        4
    };
}
pub(crate) use mobility_weight;

/// Centipawns for each piece occupying one of the four center squares.
macro_rules! center_weight {
    () => {
        15
    };
}
pub(crate) use center_weight;

/// Centipawns for each royalty mark standing under a friendly piece.
macro_rules! royalty_bonus {
    () => {
        40
    };
}
pub(crate) use royalty_bonus;

/// Centipawns per step a King stands from the center (a penalty in the middlegame, a bonus in the endgame).
macro_rules! king_center_weight {
    () => {
        10
    };
}
pub(crate) use king_center_weight;

/// Chance, in percent, that a glitched move is a capture when one is available.
macro_rules! glitch_capture_percent {
    () => {
        50
    };
}
pub(crate) use glitch_capture_percent;
