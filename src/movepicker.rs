/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use arrayvec::ArrayVec;

use crate::{tune, Move, MoveList, PieceKind, Position, Score, MAX_NUM_MOVES};

/// Yields moves in order of their scores, highest first.
///
/// Moves are sorted lazily with a selection sort, since a cutoff often happens before the whole list is needed.
pub struct MovePicker {
    moves: MoveList,
    scores: ArrayVec<i32, MAX_NUM_MOVES>,
    current: usize,
}

impl MovePicker {
    /// Creates a new [`MovePicker`] that yields `moves` ordered by `score_fn`.
    pub fn new(moves: MoveList, score_fn: impl Fn(&Move) -> i32) -> Self {
        let scores = moves.iter().map(score_fn).collect();

        Self {
            moves,
            scores,
            current: 0,
        }
    }

    /// Creates a new [`MovePicker`] with the engine's ordering: the previous best move first, then captures
    /// by MVV-LVA, then arcane moves, then everything else.
    pub fn for_search(moves: MoveList, position: &Position, best: Option<Move>) -> Self {
        Self::new(moves, |mv| score_move(position, *mv, best))
    }
}

impl Iterator for MovePicker {
    type Item = (Move, i32);

    fn next(&mut self) -> Option<Self::Item> {
        // No more moves left
        if self.current >= self.moves.len() {
            return None;
        }

        // Fetch the current best
        let mut best_index = self.current;
        let mut best_score = self.scores[best_index];

        // Find the index of the next highest score
        for i in (self.current + 1)..self.moves.len() {
            if self.scores[i] > best_score {
                best_index = i;
                best_score = self.scores[i];
            }
        }

        // Swap, if necessary
        if best_index != self.current {
            self.moves.swap(self.current, best_index);
            self.scores.swap(self.current, best_index);
        }

        // Get the move/score at this index
        let mv = self.moves[self.current];
        let score = self.scores[self.current];

        // Increment for next call
        self.current += 1;

        Some((mv, score))
    }
}

/// Scores `mv` for ordering during search. Higher is searched sooner.
pub fn score_move(position: &Position, mv: Move, best: Option<Move>) -> i32 {
    if best == Some(mv) {
        return i32::MAX;
    }

    let mut score = Score::BASE_MOVE_SCORE.0;

    if mv.is_arcane() {
        score += tune::arcane_move_bonus!();
        // Summoning something big is tried before summoning something small
        if let Some(kind) = mv.promoted() {
            score += kind.value() / 10;
        }
        return score;
    }

    if mv.is_capture() {
        if let Some(attacker) = position.kind_at(mv.from()) {
            let victim = if mv.is_en_passant() {
                PieceKind::Pawn
            } else {
                mv.captured().unwrap_or(PieceKind::Pawn)
            };
            score = MVV_LVA[attacker][victim];
        }
    }

    if let Some(promotion) = mv.promoted() {
        score += promotion.value();
    }

    score
}

/// Value of the most valuable piece kind, used to keep MVV-LVA scores positive.
const MAX_PIECE_VALUE: i32 = {
    let kinds = PieceKind::all();
    let mut max = 0;
    let mut i = 0;
    while i < kinds.len() {
        if kinds[i].value() > max {
            max = kinds[i].value();
        }
        i += 1;
    }
    max
};

/// This table represents values for [MVV-LVA](https://www.chessprogramming.org/MVV-LVA) move ordering.
///
/// It is indexed by `[attacker][victim]`, and yields a "score" that is used when sorting moves.
///
/// Kings and Ghosts are never captured, so those columns are zero.
/// The values are all left-shifted by 16 bits, to ensure that captures are ranked above quiets and arcane moves in all cases.
///
/// See [`print_mvv_lva_table`] to display this table.
pub const MVV_LVA: [[i32; PieceKind::COUNT]; PieceKind::COUNT] = {
    let mut matrix = [[0; PieceKind::COUNT]; PieceKind::COUNT];
    let count = PieceKind::COUNT;

    let mut attacker = 0;
    while attacker < count {
        let mut victim = 0;

        while victim < count {
            let atk = PieceKind::from_bits_unchecked(attacker as u8);
            let vtm = PieceKind::from_bits_unchecked(victim as u8);

            let can_capture = !matches!(vtm, PieceKind::King) && !vtm.is_ghostly();

            let score = 10 * vtm.value() + (MAX_PIECE_VALUE - atk.value());

            matrix[attacker][victim] = (score * can_capture as i32) << 16;
            victim += 1;
        }
        attacker += 1;
    }
    matrix
};

/// Utility function to print the MVV-LVA table
pub fn print_mvv_lva_table() {
    print!("\nX  ");
    for victim in PieceKind::all() {
        print!("{:<10}", victim.to_string());
    }
    println!();
    for attacker in PieceKind::all() {
        print!("{:<2}| ", attacker.to_string());
        for victim in PieceKind::all() {
            let score = MVV_LVA[attacker][victim] >> 16;
            print!("{score:<10}")
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;

    #[test]
    fn test_picker_order() {
        let pos = Position::default();
        let moves = pos.legal_moves(MoveMode::Normal);
        let scores = moves.iter().map(|mv| mv.to().index() as i32).collect::<Vec<_>>();
        let max = *scores.iter().max().unwrap();

        let picked = MovePicker::new(moves, |mv| mv.to().index() as i32).collect::<Vec<_>>();
        assert_eq!(picked.len(), 20);
        assert_eq!(picked[0].1, max);
        assert!(picked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_capture_order() {
        // The Queen on d4 can take the Rook on d7 or the Pawn on a4
        let fen = "4k3/3r4/8/8/p2Q4/8/8/4K3 w - - 0 1";
        let pos = Position::from_fen(fen).unwrap();
        let moves = pos.legal_moves(MoveMode::Normal);

        let mut picker = MovePicker::for_search(moves, &pos, None);
        let (first, _) = picker.next().unwrap();
        assert_eq!(first.to_string(), "d4d7");
        let (second, _) = picker.next().unwrap();
        assert_eq!(second.to_string(), "d4a4");
    }

    #[test]
    fn test_best_move_first() {
        let pos = Position::default();
        let best = Move::from_uci(&pos, "b1a3").unwrap();
        let moves = pos.legal_moves(MoveMode::Normal);
        let mut picker = MovePicker::for_search(moves, &pos, Some(best));
        assert_eq!(picker.next().unwrap().0, best);
    }

    #[test]
    fn test_arcane_before_quiet() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mut moves = pos.legal_moves(MoveMode::Normal);
        moves.extend(pos.legal_moves(MoveMode::Summon(PieceKind::Knight)));

        let mut picker = MovePicker::for_search(moves, &pos, None);
        assert!(picker.next().unwrap().0.is_summon());
    }

    #[test]
    fn test_mvv_lva_prefers_valuable_victims() {
        let pawn_takes_queen = MVV_LVA[PieceKind::Pawn][PieceKind::Queen];
        let queen_takes_pawn = MVV_LVA[PieceKind::Queen][PieceKind::Pawn];
        assert!(pawn_takes_queen > queen_takes_pawn);
        assert!(queen_takes_pawn > 0);
        assert_eq!(MVV_LVA[PieceKind::Rook][PieceKind::Ghost], 0);
    }
}
