/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// FEN string for the starting position of chess.
pub const FEN_STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A popular FEN string for debugging move generation.
pub const FEN_KIWIPETE: &str =
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

/// An arcane starting position: each side fields a Templar and a Unicorn in place of a Knight and a Bishop.
pub const FEN_ARCANE: &str = "rutqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RUTQKBNR w KQkq - 0 1";

/// Number of plies a royalty mark lasts once placed.
pub const ROYALTY_PLIES: u8 = 6;
