/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{Bitboard, Color, PieceKind, Square};

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

const ZEBRA_OFFSETS: [(i8, i8); 8] = [
    (2, 3),
    (3, 2),
    (3, -2),
    (2, -3),
    (-2, -3),
    (-3, -2),
    (-3, 2),
    (-2, 3),
];

const CAMEL_OFFSETS: [(i8, i8); 8] = [
    (1, 3),
    (3, 1),
    (3, -1),
    (1, -3),
    (-1, -3),
    (-3, -1),
    (-3, 1),
    (-1, 3),
];

const ORTHOGONALS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

const KNIGHT_ATTACKS: [Bitboard; Square::COUNT] = leaper_table(&KNIGHT_OFFSETS);
const KING_ATTACKS: [Bitboard; Square::COUNT] = leaper_table(&KING_OFFSETS);
const ZEBRA_ATTACKS: [Bitboard; Square::COUNT] = leaper_table(&ZEBRA_OFFSETS);
const CAMEL_ATTACKS: [Bitboard; Square::COUNT] = leaper_table(&CAMEL_OFFSETS);
const ORTHOGONAL_STEPS: [Bitboard; Square::COUNT] = leaper_table(&ORTHOGONALS);
const DIAGONAL_STEPS: [Bitboard; Square::COUNT] = leaper_table(&DIAGONALS);
const PAWN_ATTACKS: [[Bitboard; Square::COUNT]; Color::COUNT] = [
    leaper_table(&[(-1, 1), (1, 1)]),
    leaper_table(&[(-1, -1), (1, -1)]),
];

/// Builds a table of every square reachable from each square by a single jump of one of `offsets`.
const fn leaper_table(offsets: &[(i8, i8)]) -> [Bitboard; Square::COUNT] {
    let mut table = [Bitboard::EMPTY_BOARD; Square::COUNT];
    let mut i = 0;
    while i < Square::COUNT {
        let square = Square::from_index_unchecked(i);
        let mut j = 0;
        while j < offsets.len() {
            if let Some(dst) = square.offset(offsets[j].0, offsets[j].1) {
                table[i] = table[i].or(dst.bitboard());
            }
            j += 1;
        }
        i += 1;
    }
    table
}

/// Walks every direction in `directions` from `square`, stopping at (and including) the first blocker.
#[inline(always)]
fn ray_attacks(square: Square, blockers: Bitboard, directions: &[(i8, i8)]) -> Bitboard {
    let mut attacks = Bitboard::EMPTY_BOARD;
    for &(df, dr) in directions {
        let mut current = square;
        while let Some(next) = current.offset(df, dr) {
            attacks |= next;
            if blockers.intersects(next) {
                break;
            }
            current = next;
        }
    }
    attacks
}

/// Squares attacked by a Knight on `square`.
#[inline(always)]
pub const fn knight_attacks(square: Square) -> Bitboard {
    KNIGHT_ATTACKS[square.index()]
}

/// Squares attacked by a King on `square`.
///
/// This is also the set of one-step neighbors of `square`.
///
/// # Example
/// ```
/// # use arcana::{king_attacks, Square};
/// assert_eq!(king_attacks(Square::A1).population(), 3);
/// assert_eq!(king_attacks(Square::E4).population(), 8);
/// ```
#[inline(always)]
pub const fn king_attacks(square: Square) -> Bitboard {
    KING_ATTACKS[square.index()]
}

/// Squares reached by a `(2, 3)` leap from `square`.
#[inline(always)]
pub const fn zebra_attacks(square: Square) -> Bitboard {
    ZEBRA_ATTACKS[square.index()]
}

/// Squares reached by a `(1, 3)` leap from `square`.
#[inline(always)]
pub const fn camel_attacks(square: Square) -> Bitboard {
    CAMEL_ATTACKS[square.index()]
}

/// Squares a Pawn of `color` on `square` attacks.
#[inline(always)]
pub const fn pawn_attacks(square: Square, color: Color) -> Bitboard {
    PAWN_ATTACKS[color.index()][square.index()]
}

/// Squares a Pawn of `color` on `square` could push to, ignoring blockers.
///
/// Pawns on their starting rank may push two squares.
#[inline(always)]
pub fn pawn_pushes(square: Square, color: Color) -> Bitboard {
    let single = Bitboard::from(square.forward_by(color, 1));
    if Bitboard::second_rank(color).intersects(square) {
        single | square.forward_by(color, 2)
    } else {
        single
    }
}

/// Rook-style slides from `square`, stopping on `blockers`.
#[inline(always)]
pub fn rook_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    ray_attacks(square, blockers, &ORTHOGONALS)
}

/// Bishop-style slides from `square`, stopping on `blockers`.
#[inline(always)]
pub fn bishop_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    ray_attacks(square, blockers, &DIAGONALS)
}

/// Queen-style slides from `square`, stopping on `blockers`.
#[inline(always)]
pub fn queen_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    rook_attacks(square, blockers) | bishop_attacks(square, blockers)
}

/// Every square a piece of `kind` and `color` on `square` reaches, given `blockers`.
///
/// Pawns only reach their capture squares here; pushes are handled by [`pawn_pushes`].
/// Ghosts reach their one-step neighbors, although they never capture.
///
/// # Example
/// ```
/// # use arcana::{attacks_for, Bitboard, Color, PieceKind, Square};
/// let templar = attacks_for(PieceKind::Templar, Color::White, Square::A1, Bitboard::EMPTY_BOARD);
/// assert_eq!(templar.population(), 14 + 2);
/// ```
#[inline(always)]
pub fn attacks_for(kind: PieceKind, color: Color, square: Square, blockers: Bitboard) -> Bitboard {
    match kind {
        PieceKind::Pawn => pawn_attacks(square, color),
        PieceKind::Knight => knight_attacks(square),
        PieceKind::Bishop => bishop_attacks(square, blockers),
        PieceKind::Rook => rook_attacks(square, blockers),
        PieceKind::Queen => queen_attacks(square, blockers),
        PieceKind::King | PieceKind::Ghost => king_attacks(square),
        PieceKind::Templar => rook_attacks(square, blockers) | knight_attacks(square),
        PieceKind::Mystic => bishop_attacks(square, blockers) | knight_attacks(square),
        PieceKind::Valkyrie => queen_attacks(square, blockers) | knight_attacks(square),
        PieceKind::Zebra => zebra_attacks(square),
        PieceKind::Unicorn => knight_attacks(square) | camel_attacks(square),
    }
}

/// One-step neighbors of `square` that a piece of `kind` can not already reach with its own movement.
///
/// Pawns gain sideways steps only.
///
/// # Example
/// ```
/// # use arcana::{shift_steps, PieceKind, Square};
/// // A Rook gains the four diagonal steps
/// assert_eq!(shift_steps(PieceKind::Rook, Square::E4).population(), 4);
/// // A Queen already moves in every direction
/// assert!(shift_steps(PieceKind::Queen, Square::E4).is_empty());
/// ```
#[inline(always)]
pub fn shift_steps(kind: PieceKind, square: Square) -> Bitboard {
    match kind {
        PieceKind::Pawn => {
            Bitboard::from(square.offset(-1, 0)) | Bitboard::from(square.offset(1, 0))
        }
        PieceKind::Knight | PieceKind::Zebra | PieceKind::Unicorn => king_attacks(square),
        PieceKind::Bishop | PieceKind::Mystic => ORTHOGONAL_STEPS[square.index()],
        PieceKind::Rook | PieceKind::Templar => DIAGONAL_STEPS[square.index()],
        PieceKind::Queen | PieceKind::King | PieceKind::Valkyrie | PieceKind::Ghost => {
            Bitboard::EMPTY_BOARD
        }
    }
}

/// All squares strictly between `from` and `to`, if they share a rank, file, or diagonal.
///
/// # Example
/// ```
/// # use arcana::{ray_between, Square};
/// assert_eq!(ray_between(Square::E1, Square::H1).population(), 2);
/// assert!(ray_between(Square::E1, Square::F3).is_empty());
/// ```
pub fn ray_between(from: Square, to: Square) -> Bitboard {
    let df = to.file().inner() as i8 - from.file().inner() as i8;
    let dr = to.rank().inner() as i8 - from.rank().inner() as i8;

    if !(df == 0 || dr == 0 || df.abs() == dr.abs()) || from == to {
        return Bitboard::EMPTY_BOARD;
    }

    let (step_f, step_r) = (df.signum(), dr.signum());
    let mut between = Bitboard::EMPTY_BOARD;
    let mut current = from;
    while let Some(next) = current.offset(step_f, step_r) {
        if next == to {
            break;
        }
        between |= next;
        current = next;
    }
    between
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaper_counts() {
        assert_eq!(knight_attacks(Square::A1).population(), 2);
        assert_eq!(knight_attacks(Square::D4).population(), 8);
        assert_eq!(zebra_attacks(Square::A1).population(), 2);
        assert_eq!(zebra_attacks(Square::D4).population(), 6);
        assert_eq!(camel_attacks(Square::D4).population(), 8);
    }

    #[test]
    fn test_slider_stops_on_blocker() {
        let blockers = Bitboard::from_square(Square::E6);
        let attacks = rook_attacks(Square::E4, blockers);
        assert!(attacks.intersects(Square::E6));
        assert!(!attacks.intersects(Square::E7));
        assert_eq!(rook_attacks(Square::E4, Bitboard::EMPTY_BOARD).population(), 14);
    }

    #[test]
    fn test_pawn_tables() {
        assert_eq!(
            pawn_attacks(Square::E4, Color::White),
            Bitboard::from_square(Square::D5) | Square::F5
        );
        assert_eq!(
            pawn_attacks(Square::A7, Color::Black),
            Bitboard::from_square(Square::B6)
        );
        assert_eq!(pawn_pushes(Square::E2, Color::White).population(), 2);
        assert_eq!(pawn_pushes(Square::E3, Color::White).population(), 1);
    }

    #[test]
    fn test_royalty_kinds_combine_knight() {
        let empty = Bitboard::EMPTY_BOARD;
        let valkyrie = attacks_for(PieceKind::Valkyrie, Color::White, Square::D4, empty);
        let queen = queen_attacks(Square::D4, empty);
        assert_eq!(valkyrie, queen | knight_attacks(Square::D4));
    }

    #[test]
    fn test_shift_steps_for_pawn_are_sideways() {
        let steps = shift_steps(PieceKind::Pawn, Square::A2);
        assert_eq!(steps, Bitboard::from_square(Square::B2));
    }
}
