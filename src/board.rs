/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Attack tables and slider rays for every piece kind.
mod attacks;

/// Bitboard representation of a set of squares.
mod bitboard;

/// Legal move generation under every move mode.
mod movegen;

/// Move encoding, flags, and text forms.
mod moves;

/// Perft functions for validating move generation.
mod perft;

/// Colors, piece kinds, and colored pieces.
mod piece;

/// Board state: placement, counters, and arcane overlays.
mod position;

/// Pseudo-random number generation for hash keys.
mod prng;

/// Squares, ranks, and files.
mod square;

/// Misc constants.
mod utils;

/// Zobrist hashing of positions.
mod zobrist;

pub use attacks::*;
pub use bitboard::*;
pub use movegen::*;
pub use moves::*;
pub use perft::*;
pub use piece::*;
pub use position::*;
pub use prng::*;
pub use square::*;
pub use utils::*;
pub use zobrist::*;
