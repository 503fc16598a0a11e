/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    attacks_for, king_attacks, knight_attacks, ray_between, shift_steps, Bitboard, Color, Move,
    MoveFlags, MoveList, Piece, PieceKind, Position, Rank, Square, SquareConditions,
};

/// The rule used to produce moves for the side to move.
///
/// Every arcana that changes how moves are generated resolves to one of these once, when the catalog is loaded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "piece", rename_all = "snake_case")]
pub enum MoveMode {
    /// Ordinary chess moves, with every inherent effect applied.
    #[default]
    Normal,
    /// Move a friendly non-King piece to any empty square.
    Teleport,
    /// Place a new piece of this kind on the mover's back ranks.
    Summon(PieceKind),
    /// Mark a friendly piece's square with royalty of this kind.
    Royalty(PieceKind),
    /// Exchange a friendly piece (of this kind, if given) with an adjacent friendly piece of another kind.
    Swap(Option<PieceKind>),
    /// Sacrifice a friendly piece of this kind.
    Offering(PieceKind),
    /// The first half of a double move (by a piece of this kind, if given).
    Dyad(Option<PieceKind>),
}

impl MoveMode {
    /// Returns `true` if moves of this mode place, mark, or remove a piece rather than moving one.
    #[inline(always)]
    pub const fn is_placement(&self) -> bool {
        matches!(self, Self::Summon(_) | Self::Royalty(_) | Self::Offering(_))
    }
}

impl fmt::Display for MoveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Teleport => write!(f, "teleport"),
            Self::Summon(kind) => write!(f, "summon {}", kind.name()),
            Self::Royalty(kind) => write!(f, "royalty {}", kind.name()),
            Self::Swap(Some(kind)) => write!(f, "swap {}", kind.name()),
            Self::Swap(None) => write!(f, "swap"),
            Self::Offering(kind) => write!(f, "offering {}", kind.name()),
            Self::Dyad(Some(kind)) => write!(f, "dyad {}", kind.name()),
            Self::Dyad(None) => write!(f, "dyad"),
        }
    }
}

impl Position {
    /// Every square the piece on `square` attacks, including any royalty mark it stands on.
    ///
    /// Empty squares reach nothing.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let pos: Position = "4k3/8/8/8/4N3/8/8/4K3 w - - 0 1 r:Te4/3".parse().unwrap();
    /// // Knight moves, plus the Templar's rook slides granted by the mark
    /// assert!(pos.reach(Square::E4).intersects(Square::H4));
    /// assert!(pos.reach(Square::E4).intersects(Square::F6));
    /// ```
    pub fn reach(&self, square: Square) -> Bitboard {
        match self.piece_at(square) {
            Some(piece) => self.reach_of(piece, square),
            None => Bitboard::EMPTY_BOARD,
        }
    }

    /// Attacks of `piece` as if it stood on `square`.
    fn reach_of(&self, piece: Piece, square: Square) -> Bitboard {
        let blockers = self.occupied();
        let color = piece.color();

        let mut attacks = attacks_for(piece.kind(), color, square, blockers);
        if let Some(mark) = self.royalty_at(square) {
            attacks |= attacks_for(mark.kind, color, square, blockers);
        }
        if piece.is_king() && self.effects().has_shogun(color) {
            attacks |= knight_attacks(square);
        }
        attacks
    }

    /// All squares attacked by `color`.
    ///
    /// Ghosts, and pieces standing on entangled or disarmed squares, attack nothing.
    pub fn attacks_by(&self, color: Color) -> Bitboard {
        let inert = self.squares_with(SquareConditions::ENTANGLED)
            | self.squares_with(SquareConditions::DISARMED)
            | self.kind(PieceKind::Ghost);

        self.iter_for(self.color(color) & !inert)
            .fold(Bitboard::EMPTY_BOARD, |attacks, (square, piece)| {
                attacks | self.reach_of(piece, square)
            })
    }

    /// Returns `true` if `color` is in check.
    ///
    /// Normally, any attacked King is check. Under Regency, a side with several Kings is only in check when all of them are attacked.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let pos: Position = "4k3/8/8/8/8/8/8/r2K3K w - - 0 1".parse().unwrap();
    /// assert!(pos.is_in_check(Color::White));
    /// ```
    pub fn is_in_check(&self, color: Color) -> bool {
        let kings = self.king(color);
        if kings.is_empty() {
            return false;
        }

        let attacked = kings & self.attacks_by(color.opponent());
        if self.effects().has_regency(color) {
            attacked == kings
        } else {
            attacked.is_nonempty()
        }
    }

    /// Returns `true` if the side to move is in check.
    #[inline(always)]
    pub fn is_check(&self) -> bool {
        self.is_in_check(self.side_to_move())
    }

    /// Returns `true` if applying `mv` does not leave the mover in check.
    #[inline(always)]
    pub fn is_legal(&self, mv: Move) -> bool {
        !self.with_move_made(mv).is_in_check(self.side_to_move())
    }

    /// Generates every legal [`Move`] for the side to move under `mode`.
    ///
    /// A double move that is already half played only accepts [`MoveMode::Normal`] for its second half.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let pos = Position::default();
    /// assert_eq!(pos.legal_moves(MoveMode::Normal).len(), 20);
    /// // The back ranks are full, so nothing can be summoned
    /// assert!(pos.legal_moves(MoveMode::Summon(PieceKind::Knight)).is_empty());
    /// ```
    pub fn legal_moves(&self, mode: MoveMode) -> MoveList {
        let mut moves = MoveList::new();

        if self.is_dyad_pending() && mode != MoveMode::Normal {
            return moves;
        }

        match mode {
            MoveMode::Normal => self.generate_board_moves(None, MoveFlags::NONE, &mut moves),
            MoveMode::Dyad(kind) => self.generate_board_moves(kind, MoveFlags::DYAD, &mut moves),
            MoveMode::Teleport => self.generate_teleports(&mut moves),
            MoveMode::Summon(kind) => self.generate_summons(kind, &mut moves),
            MoveMode::Royalty(kind) => self.generate_royalties(kind, &mut moves),
            MoveMode::Swap(kind) => self.generate_swaps(kind, &mut moves),
            MoveMode::Offering(kind) => self.generate_offerings(kind, &mut moves),
        }

        moves.retain(|mv| self.is_legal(*mv));
        moves
    }

    /// Generates every legal [`Move`] for the side to move under any of `modes`.
    ///
    /// [`MoveMode::Normal`] is always included. Moves past the capacity of a [`MoveList`] are dropped.
    pub fn all_legal_moves(&self, modes: &[MoveMode]) -> MoveList {
        let mut moves = self.legal_moves(MoveMode::Normal);
        for &mode in modes.iter().filter(|&&mode| mode != MoveMode::Normal) {
            for mv in self.legal_moves(mode) {
                if moves.try_push(mv).is_err() {
                    return moves;
                }
            }
        }
        moves
    }

    /// Returns `true` if the side to move has at least one legal move under any of `modes` (or normally).
    pub fn has_legal_move(&self, modes: &[MoveMode]) -> bool {
        std::iter::once(MoveMode::Normal)
            .chain(modes.iter().copied())
            .any(|mode| !self.legal_moves(mode).is_empty())
    }

    /// Destinations of every legal [`Move`] under `mode`, optionally only those starting on `from`.
    ///
    /// Castling destinations are the Rook's square.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let pos = Position::default();
    /// let knight = pos.legal_destinations(MoveMode::Normal, Some(Square::G1));
    /// assert_eq!(knight, Square::F3.bitboard() | Square::H3);
    /// ```
    pub fn legal_destinations(&self, mode: MoveMode, from: Option<Square>) -> Bitboard {
        self.legal_moves(mode)
            .into_iter()
            .filter(|mv| from.map_or(true, |from| mv.from() == from))
            .map(|mv| mv.to())
            .collect()
    }

    /// Enemy pieces that `color` is allowed to capture right now.
    fn capturable_by(&self, color: Color) -> Bitboard {
        if self.suspend() > 0 {
            return Bitboard::EMPTY_BOARD;
        }

        let enemy = color.opponent();
        let protected = PieceKind::all()
            .into_iter()
            .filter(|&kind| {
                kind == PieceKind::King
                    || kind.is_ghostly()
                    || self.effects().is_cloaked(enemy, kind)
            })
            .fold(Bitboard::EMPTY_BOARD, |bb, kind| bb | self.kind(kind));

        self.color(enemy) & !protected
    }

    /// Generates pseudo-legal board moves for every friendly piece (of `only`, if given), tagging them with `extra` flags.
    fn generate_board_moves(&self, only: Option<PieceKind>, extra: MoveFlags, moves: &mut MoveList) {
        let color = self.side_to_move();
        let capturable = self.capturable_by(color);
        let movers = match only {
            Some(kind) => self.piece_parts(color, kind),
            None => self.color(color),
        } & !self.squares_with(SquareConditions::ENTANGLED);

        for (from, piece) in self.iter_for(movers) {
            let can_capture = !piece.kind().is_ghostly()
                && !self.conditions_at(from).contains(SquareConditions::DISARMED);
            let targets = if can_capture { capturable } else { Bitboard::EMPTY_BOARD };

            if piece.is_pawn() {
                self.generate_pawn_moves(from, targets, extra, moves);
            } else {
                let reach = self.reach_of(piece, from);
                self.serialize_targets(from, reach & self.empty(), extra, moves);
                self.serialize_targets(from, reach & targets, extra, moves);

                if self.effects().has_shift(color, piece.kind()) {
                    let steps = shift_steps(piece.kind(), from) & self.empty() & !reach;
                    self.serialize_targets(from, steps, extra | MoveFlags::SHIFT, moves);
                }
            }
        }

        // Castling cannot be the first half of a double move
        if extra.is_empty() && only.map_or(true, |kind| kind == PieceKind::King) {
            self.generate_castling(moves);
        }
    }

    /// Pushes one [`Move`] per square in `targets`, recording any captured piece.
    fn serialize_targets(&self, from: Square, targets: Bitboard, flags: MoveFlags, moves: &mut MoveList) {
        for to in targets {
            let mv = Move::encode(from, to, self.kind_at(to), None, flags);
            // Overflow only happens on absurd, hand-made positions
            let _ = moves.try_push(mv);
        }
    }

    /// Pawn pushes, captures, en passant, sideways shifts, and royalty-granted moves; all of which promote on the last rank.
    fn generate_pawn_moves(&self, from: Square, targets: Bitboard, extra: MoveFlags, moves: &mut MoveList) {
        let color = self.side_to_move();
        let empty = self.empty();

        let mut push = |to: Square, captured: Option<PieceKind>, flags: MoveFlags| {
            if to.rank() == Rank::eighth(color) {
                for promotion in PieceKind::promotions() {
                    let mv = Move::encode(from, to, captured, Some(promotion), flags | MoveFlags::PROMOTION);
                    let _ = moves.try_push(mv);
                }
            } else {
                let _ = moves.try_push(Move::encode(from, to, captured, None, flags));
            }
        };

        // Single and double steps
        if let Some(single) = from.forward_by(color, 1).filter(|sq| empty.intersects(*sq)) {
            push(single, None, extra);

            if from.rank() == Rank::second(color) {
                if let Some(double) = from.forward_by(color, 2) {
                    let charging = self.effects().has_charge(color) && targets.intersects(double);
                    if empty.intersects(double) || charging {
                        push(double, self.kind_at(double), extra | MoveFlags::PAWN_DOUBLE);
                    }
                }
            }
        }

        // Diagonal captures
        let attacks = attacks_for(PieceKind::Pawn, color, from, self.occupied());
        for to in attacks & targets {
            push(to, self.kind_at(to), extra);
        }

        // En passant, if the pawn that just double-stepped is an enemy
        if let Some(ep_square) = self.ep_square() {
            let victim = ep_square.backward_by(color, 1);
            let victim_is_enemy_pawn = victim
                .and_then(|sq| self.piece_at(sq))
                .is_some_and(|p| p == Piece::new(color.opponent(), PieceKind::Pawn));
            let can_capture = victim.is_some_and(|sq| targets.intersects(sq));

            if attacks.intersects(ep_square) && victim_is_enemy_pawn && can_capture {
                push(ep_square, Some(PieceKind::Pawn), extra | MoveFlags::EN_PASSANT);
            }
        }

        // Sideways steps
        if self.effects().has_shift(color, PieceKind::Pawn) {
            for to in shift_steps(PieceKind::Pawn, from) & empty {
                push(to, None, extra | MoveFlags::SHIFT);
            }
        }

        // Moves granted by a royalty mark, beyond what the pawn can already do
        if let Some(mark) = self.royalty_at(from) {
            let ordinary = attacks
                | Bitboard::from(from.forward_by(color, 1))
                | Bitboard::from(from.forward_by(color, 2))
                | shift_steps(PieceKind::Pawn, from);
            let granted = attacks_for(mark.kind, color, from, self.occupied()) & !ordinary;
            for to in granted & (empty | targets) {
                push(to, self.kind_at(to), extra);
            }
        }
    }

    /// Castling by moving the King onto a Rook that still holds castling rights.
    fn generate_castling(&self, moves: &mut MoveList) {
        let color = self.side_to_move();
        let Some(king) = (self.king(color) & Bitboard::first_rank(color)).to_square() else {
            return;
        };
        if self.conditions_at(king).contains(SquareConditions::ENTANGLED) {
            return;
        }

        let enemy_attacks = self.attacks_by(color.opponent());
        if enemy_attacks.intersects(king) {
            return;
        }

        let rights = self.castling_rights_for(color);
        for rook in [rights.short(), rights.long()].into_iter().flatten() {
            if self.piece_at(rook) != Some(Piece::new(color, PieceKind::Rook))
                || self.conditions_at(rook).contains(SquareConditions::ENTANGLED)
            {
                continue;
            }

            let mv = Move::new(king, rook, MoveFlags::CASTLE);
            let Some((king_dst, rook_dst)) = mv.castling_destinations() else {
                continue;
            };

            // The King and Rook don't count as blockers, since they're moving through each other
            let blockers = self.occupied() ^ king ^ rook;
            let king_to_dst = ray_between(king, king_dst) | king_dst;
            let rook_to_dst = ray_between(rook, rook_dst) | rook_dst;
            let squares_are_empty = (king_to_dst & blockers).is_empty() && (rook_to_dst & blockers).is_empty();

            // All squares between the King and his destination (inclusive) must not be attacked
            let squares_are_safe = (king_to_dst & enemy_attacks).is_empty();

            if squares_are_empty && squares_are_safe {
                let _ = moves.try_push(mv);
            }
        }
    }

    /// Summons of `kind` onto empty, unfogged squares of the mover's first two ranks.
    ///
    /// Pawns may only be summoned onto the second rank.
    fn generate_summons(&self, kind: PieceKind, moves: &mut MoveList) {
        let color = self.side_to_move();
        let ranks = if kind == PieceKind::Pawn {
            Bitboard::second_rank(color)
        } else {
            Bitboard::first_rank(color) | Bitboard::second_rank(color)
        };

        let squares = ranks & self.empty() & !self.squares_with(SquareConditions::FOG);
        for square in squares {
            let _ = moves.try_push(Move::summon(square, kind));
        }
    }

    /// Royalty marks of `kind` on friendly, non-King pieces standing on unmarked squares.
    fn generate_royalties(&self, kind: PieceKind, moves: &mut MoveList) {
        let color = self.side_to_move();
        let squares = self.color(color) & !self.king(color) & !self.royalty_squares();
        for square in squares {
            let _ = moves.try_push(Move::royalty(square, kind));
        }
    }

    /// Swaps of a friendly piece (of `kind`, if given) with an adjacent friendly piece of a different kind.
    fn generate_swaps(&self, kind: Option<PieceKind>, moves: &mut MoveList) {
        let color = self.side_to_move();
        let free = self.color(color) & !self.squares_with(SquareConditions::ENTANGLED);
        let movers = match kind {
            Some(kind) => free & self.kind(kind),
            None => free,
        };

        for (from, piece) in self.iter_for(movers) {
            for (to, other) in self.iter_for(king_attacks(from) & free) {
                if other.kind() != piece.kind() {
                    let _ = moves.try_push(Move::swap(from, to));
                }
            }
        }
    }

    /// Offerings of any friendly piece of `kind`. Kings cannot be offered.
    fn generate_offerings(&self, kind: PieceKind, moves: &mut MoveList) {
        if kind == PieceKind::King {
            return;
        }

        let color = self.side_to_move();
        for square in self.piece_parts(color, kind) {
            let _ = moves.try_push(Move::offering(square, kind));
        }
    }

    /// Teleports of friendly non-King pieces to any empty, unfogged square.
    fn generate_teleports(&self, moves: &mut MoveList) {
        let color = self.side_to_move();
        let movers = self.color(color)
            & !self.king(color)
            & !self.squares_with(SquareConditions::ENTANGLED);
        let destinations = self.empty() & !self.squares_with(SquareConditions::FOG);

        for from in movers {
            for to in destinations {
                let _ = moves.try_push(Move::teleport(from, to));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Effects, FEN_KIWIPETE};

    fn position(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    fn with_effects(fen: &str, apply: impl FnOnce(&mut Effects)) -> Position {
        let mut pos = position(fen);
        let mut effects = *pos.effects();
        apply(&mut effects);
        pos.set_effects(effects);
        pos
    }

    #[test]
    fn test_startpos_has_twenty_moves() {
        assert_eq!(Position::default().legal_moves(MoveMode::Normal).len(), 20);
    }

    #[test]
    fn test_kiwipete_has_forty_eight_moves() {
        assert_eq!(position(FEN_KIWIPETE).legal_moves(MoveMode::Normal).len(), 48);
    }

    #[test]
    fn test_custom_pieces_move_by_their_tables() {
        // Zebra in the corner has two (2,3) leaps
        let zebra = position("4k3/8/8/8/8/8/8/Z3K3 w - - 0 1");
        assert_eq!(zebra.legal_destinations(MoveMode::Normal, Some(Square::A1)).population(), 2);

        // Ghosts never capture
        let ghost = position("4k3/8/8/8/3p4/4G3/8/4K3 w - - 0 1");
        let dests = ghost.legal_destinations(MoveMode::Normal, Some(Square::E3));
        assert!(!dests.intersects(Square::D4));
        assert_eq!(dests.population(), 7);
    }

    #[test]
    fn test_ghosts_cannot_be_captured_or_give_check() {
        let pos = position("4k3/8/8/8/8/8/3g4/R3K3 w - - 0 1");
        assert!(!pos.is_in_check(Color::White));
        let rook = pos.legal_destinations(MoveMode::Normal, Some(Square::A1));
        assert!(rook.intersects(Square::D1));
        assert!(!pos.legal_destinations(MoveMode::Normal, Some(Square::E1)).intersects(Square::D2));
    }

    #[test]
    fn test_summons_target_back_ranks() {
        let pos = position("4k3/8/8/8/8/8/8/4K3 w - - 0 1");
        assert_eq!(pos.legal_moves(MoveMode::Summon(PieceKind::Knight)).len(), 15);
        assert_eq!(pos.legal_moves(MoveMode::Summon(PieceKind::Pawn)).len(), 8);

        let fogged = position("4k3/8/8/8/8/8/8/4K3 w - - 0 1 c:a1F,b2F");
        assert_eq!(fogged.legal_moves(MoveMode::Summon(PieceKind::Knight)).len(), 13);
    }

    #[test]
    fn test_summons_must_not_leave_king_in_check() {
        // Only blocking the rook's check is legal
        let pos = position("4k3/8/8/8/8/8/8/r3K3 w - - 0 1");
        let summons = pos.legal_destinations(MoveMode::Summon(PieceKind::Rook), None);
        assert_eq!(summons, Square::B1.bitboard() | Square::C1 | Square::D1);
    }

    #[test]
    fn test_swaps_need_adjacent_different_kinds() {
        let pos = Position::default();
        // Each Knight can swap with the Rook, Bishop and Pawns around it
        let swaps = pos.legal_moves(MoveMode::Swap(Some(PieceKind::Knight)));
        assert!(swaps.iter().all(|mv| mv.is_swap()));
        assert!(swaps.iter().any(|mv| mv.from() == Square::B1 && mv.to() == Square::A1));
        assert!(!swaps.iter().any(|mv| mv.to() == Square::E1 || mv.to() == Square::D1));
    }

    #[test]
    fn test_offerings_and_teleports() {
        let pos = position("4k3/8/8/8/8/8/8/1N2K3 w - - 0 1");
        assert_eq!(pos.legal_moves(MoveMode::Offering(PieceKind::Knight)).len(), 1);
        assert!(pos.legal_moves(MoveMode::Offering(PieceKind::King)).is_empty());

        let teleports = pos.legal_moves(MoveMode::Teleport);
        assert_eq!(teleports.len(), 64 - 3);
    }

    #[test]
    fn test_royalty_marks_friendly_non_kings() {
        let pos = position("4k3/8/8/8/8/8/8/1N2K3 w - - 0 1 r:Qe1/1");
        let marks = pos.legal_moves(MoveMode::Royalty(PieceKind::Templar));
        assert_eq!(marks.len(), 1);
        assert!(marks[0].is_royalty());
    }

    #[test]
    fn test_shift_grants_one_step_moves() {
        let fen = "4k3/8/8/8/3R4/8/8/4K3 w - - 0 1";
        let plain = position(fen).legal_destinations(MoveMode::Normal, Some(Square::D4));
        let shifted = with_effects(fen, |e| e.add_shift(Color::White, PieceKind::Rook))
            .legal_destinations(MoveMode::Normal, Some(Square::D4));
        assert_eq!(plain.population() + 4, shifted.population());
    }

    #[test]
    fn test_charge_lets_double_steps_capture() {
        let fen = "4k3/8/8/8/4n3/8/4P3/4K3 w - - 0 1";
        let plain = position(fen).legal_destinations(MoveMode::Normal, Some(Square::E2));
        assert_eq!(plain, Square::E3.bitboard());

        let charged = with_effects(fen, |e| e.set_charge(Color::White, true))
            .legal_destinations(MoveMode::Normal, Some(Square::E2));
        assert_eq!(charged, Square::E3.bitboard() | Square::E4);
    }

    #[test]
    fn test_shogun_kings_check_by_knight_leap() {
        let fen = "8/8/8/8/8/3k4/8/4K3 b - - 0 1";
        assert!(!position(fen).is_in_check(Color::Black));
        let shogun = with_effects(fen, |e| e.set_shogun(Color::White, true));
        assert!(shogun.is_in_check(Color::Black));
    }

    #[test]
    fn test_regency_requires_every_king_attacked() {
        let fen = "4k3/8/8/8/8/8/8/r2K3K w - - 0 1";
        let regent = with_effects(fen, |e| e.set_regency(Color::White, true));
        assert!(!regent.is_in_check(Color::White));
    }

    #[test]
    fn test_suspend_blocks_captures() {
        let pos = position("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1 s:2");
        assert!(pos.legal_moves(MoveMode::Normal).iter().all(|mv| !mv.is_capture()));
    }

    #[test]
    fn test_conditions_restrict_pieces() {
        // Entangled pieces cannot move, disarmed pieces cannot capture
        let pos = position("4k3/8/8/3p4/4P3/8/8/R3K3 w - - 0 1 c:a1E,e4D");
        assert!(pos.legal_destinations(MoveMode::Normal, Some(Square::A1)).is_empty());
        assert_eq!(
            pos.legal_destinations(MoveMode::Normal, Some(Square::E4)),
            Square::E5.bitboard()
        );
    }

    #[test]
    fn test_dyad_halves_are_flagged() {
        let pos = Position::default();
        let halves = pos.legal_moves(MoveMode::Dyad(Some(PieceKind::Knight)));
        assert_eq!(halves.len(), 4);
        assert!(halves.iter().all(|mv| mv.is_dyad()));

        // After the first half, only normal moves remain
        let after = pos.with_move_made(halves[0]);
        assert!(after.legal_moves(MoveMode::Dyad(None)).is_empty());
        assert!(!after.legal_moves(MoveMode::Normal).is_empty());
    }

    #[test]
    fn test_cloaked_pieces_cannot_be_captured() {
        let fen = "4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1";
        let cloaked = with_effects(fen, |e| e.add_cloak(Color::Black, PieceKind::Knight));
        assert!(!cloaked
            .legal_destinations(MoveMode::Normal, Some(Square::E4))
            .intersects(Square::D5));
    }
}
