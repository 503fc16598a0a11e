/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use super::{CastlingRights, Color, Piece, PieceKind, Position, Rank, Square, XoShiRo};

/// Stores Zobrist hash keys, for hashing [`Position`]s.
///
/// Built at compile time from fixed seeds, so keys are identical between runs.
const ZOBRIST_TABLE: ZobristHashTable = ZobristHashTable::new();

/// Number of royalty kinds that can mark a square.
const NUM_ROYALTIES: usize = 4;

/// Represents a key generated from a Zobrist Hash.
///
/// This is the position signature used for repetition detection.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct ZobristKey(u64);

impl ZobristKey {
    /// Generates a new [`ZobristKey`] from the supplied [`Position`].
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let pos = Position::default();
    /// let key = ZobristKey::new(&pos);
    /// assert_ne!(key.inner(), 0);
    /// assert_eq!(key, pos.key());
    /// ```
    pub fn new(position: &Position) -> Self {
        let mut key = Self::default();

        for (square, piece) in position.board().iter() {
            key.hash_piece(square, piece);
        }

        for square in Square::iter() {
            if let Some(mark) = position.royalty_at(square) {
                key.hash_royalty(square, mark.kind);
            }
        }

        key.hash_optional_ep_square(position.ep_square());
        key.hash_castling_rights(position.castling_rights());
        key.hash_side_to_move(position.side_to_move());
        key.hash_dyad(position.is_dyad_pending());

        key
    }

    /// Return the inner `u64` of this key.
    #[inline(always)]
    pub fn inner(&self) -> u64 {
        self.0
    }

    /// Adds/removes `hash_key` to this [`ZobristKey`].
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let mut zero = ZobristKey::default();
    /// zero.hash(42);
    /// assert_ne!(zero.inner(), 0);
    ///
    /// // Calling again un-hashes it
    /// zero.hash(42);
    /// assert_eq!(zero.inner(), 0);
    /// ```
    #[inline(always)]
    pub fn hash(&mut self, hash_key: u64) {
        self.0 ^= hash_key;
    }

    /// Adds/removes the hash for the provided `piece` at `square`.
    #[inline(always)]
    pub fn hash_piece(&mut self, square: Square, piece: Piece) {
        self.hash(ZOBRIST_TABLE.piece_keys[square][piece]);
    }

    /// Adds/removes the hash for a royalty mark of `kind` on `square`.
    ///
    /// Only royalty kinds have keys; other kinds leave the key unchanged.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let mut key = ZobristKey::default();
    /// key.hash_royalty(Square::E4, PieceKind::Templar);
    /// assert_ne!(key, ZobristKey::default());
    ///
    /// let mut other = ZobristKey::default();
    /// other.hash_royalty(Square::E4, PieceKind::Mystic);
    /// assert_ne!(key, other);
    /// ```
    #[inline(always)]
    pub fn hash_royalty(&mut self, square: Square, kind: PieceKind) {
        if let Some(index) = royalty_index(kind) {
            self.hash(ZOBRIST_TABLE.royalty_keys[square][index]);
        }
    }

    /// Adds/removes the hash for the provided `ep_square`.
    ///
    /// Only squares on ranks 3 and 6 have keys.
    #[inline(always)]
    pub fn hash_ep_square(&mut self, ep_square: Square) {
        self.hash(ZOBRIST_TABLE.ep_keys[ep_square]);
    }

    /// Same as [`ZobristKey::hash_ep_square`] with a safely-unwrapped `ep_square`.
    #[inline(always)]
    pub fn hash_optional_ep_square(&mut self, ep_square: Option<Square>) {
        // Squares where en passant isn't possible (including Square::default) hash to 0
        self.hash_ep_square(ep_square.unwrap_or_default());
    }

    /// Adds/removes the hash for the provided `castling_rights`.
    #[inline(always)]
    pub fn hash_castling_rights(&mut self, castling_rights: &[CastlingRights; Color::COUNT]) {
        let w_index = castling_rights[Color::White].index();
        let b_index = castling_rights[Color::Black].index();
        let index = w_index << 2 | b_index;
        self.hash(ZOBRIST_TABLE.castling_keys[index]);
    }

    /// Adds/removes the hash for when the side-to-move is Black.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let mut white = ZobristKey::default();
    /// white.hash_side_to_move(Color::White);
    /// assert_eq!(white, ZobristKey::default());
    /// ```
    #[inline(always)]
    pub fn hash_side_to_move(&mut self, color: Color) {
        self.hash(ZOBRIST_TABLE.color_key[color]);
    }

    /// Adds/removes the hash for a pending second half of a double move.
    #[inline(always)]
    pub fn hash_dyad(&mut self, pending: bool) {
        if pending {
            self.hash(ZOBRIST_TABLE.dyad_key);
        }
    }
}

impl fmt::Display for ZobristKey {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[inline(always)]
const fn royalty_index(kind: PieceKind) -> Option<usize> {
    match kind {
        PieceKind::Queen => Some(0),
        PieceKind::Templar => Some(1),
        PieceKind::Mystic => Some(2),
        PieceKind::Valkyrie => Some(3),
        _ => None,
    }
}

/// Encapsulates the logic of Zobrist hashing.
struct ZobristHashTable {
    /// One unique key for every possible piece and every possible square.
    piece_keys: [[u64; Piece::COUNT]; Square::COUNT],

    /// One unique key for every royalty kind on every square.
    royalty_keys: [[u64; NUM_ROYALTIES]; Square::COUNT],

    /// One unique key for every square where en passant is possible.
    ep_keys: [u64; Square::COUNT],

    /// One key for every possible combination of castling rights.
    castling_keys: [u64; CastlingRights::COUNT],

    /// One key for the side-to-move (only if side-to-move is Black- White's key is 0).
    color_key: [u64; Color::COUNT],

    /// Key for a pending dyad half.
    dyad_key: u64,
}

impl ZobristHashTable {
    /// Initialize this table, generating keys via the [`XoShiRo`] struct.
    const fn new() -> Self {
        let mut piece_keys = [[0; Piece::COUNT]; Square::COUNT];
        let mut royalty_keys = [[0; NUM_ROYALTIES]; Square::COUNT];
        let mut color_key = [0; Color::COUNT];
        let mut ep_keys = [0; Square::COUNT];
        let mut castling_keys = [0; CastlingRights::COUNT];

        let mut prng = XoShiRo::new();

        let mut i = 0;
        while i < Square::COUNT {
            let mut j = 0;
            while j < Piece::COUNT {
                let key;
                (key, prng) = prng.get_next_const();
                piece_keys[i][j] = key;
                j += 1;
            }

            j = 0;
            while j < NUM_ROYALTIES {
                let key;
                (key, prng) = prng.get_next_const();
                royalty_keys[i][j] = key;
                j += 1;
            }

            // En passant can only happen on ranks 3 and 6
            let rank = Square::from_index_unchecked(i).rank();
            if rank.is(&Rank::THREE) || rank.is(&Rank::SIX) {
                let key;
                (key, prng) = prng.get_next_const();
                ep_keys[i] = key;
            }

            i += 1;
        }

        i = 0;
        while i < CastlingRights::COUNT {
            let key;
            (key, prng) = prng.get_next_const();
            castling_keys[i] = key;
            i += 1;
        }

        // Only Black has a key, since White's is just 0
        let key;
        (key, prng) = prng.get_next_const();
        color_key[Color::Black.index()] = key;

        let (dyad_key, _) = prng.get_next_const();

        Self {
            piece_keys,
            royalty_keys,
            ep_keys,
            castling_keys,
            color_key,
            dyad_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piece_keys_differ_by_kind_and_color() {
        let mut white_templar = ZobristKey::default();
        white_templar.hash_piece(Square::D4, Piece::new(Color::White, PieceKind::Templar));
        let mut black_templar = ZobristKey::default();
        black_templar.hash_piece(Square::D4, Piece::new(Color::Black, PieceKind::Templar));
        let mut white_mystic = ZobristKey::default();
        white_mystic.hash_piece(Square::D4, Piece::new(Color::White, PieceKind::Mystic));

        assert_ne!(white_templar, black_templar);
        assert_ne!(white_templar, white_mystic);
    }

    #[test]
    fn test_non_royalty_kinds_do_not_hash() {
        let mut key = ZobristKey::default();
        key.hash_royalty(Square::E4, PieceKind::Knight);
        assert_eq!(key, ZobristKey::default());
    }
}
