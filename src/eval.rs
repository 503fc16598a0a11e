/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{tune, Bitboard, Color, File, PieceKind, Position, Rank, Score, Square};

/// Tunable weights used by the [`Evaluator`].
///
/// None of these are load-bearing for correctness; they only change how well the engine plays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalWeights {
    /// Value of each [`PieceKind`], in centipawns, indexed by the kind's index.
    pub piece_values: [i32; PieceKind::COUNT],

    /// Bonus per square a piece can reach.
    pub mobility: i32,

    /// Bonus per piece standing on one of the four center squares.
    pub center: i32,

    /// Bonus per friendly piece standing on a royalty mark.
    pub royalty: i32,

    /// Bonus per step a King stands from the center, in the middlegame. Negated in the endgame.
    pub king_center: i32,
}

impl EvalWeights {
    /// Value of `kind` under these weights.
    #[inline(always)]
    pub fn value_of(&self, kind: PieceKind) -> i32 {
        self.piece_values[kind]
    }
}

impl Default for EvalWeights {
    fn default() -> Self {
        Self {
            piece_values: PieceKind::all().map(|kind| kind.value()),
            mobility: tune::mobility_weight!(),
            center: tune::center_weight!(),
            royalty: tune::royalty_bonus!(),
            king_center: tune::king_center_weight!(),
        }
    }
}

/// Encapsulates the logic of scoring a position.
///
/// Generally, a high score is good for White, and a low score is good for Black.
/// However, during a negamax search, positions must be evaluated from the side-to-move's perspective.
/// That is, if it is Black's turn, a "good" evaluation for Black will be a positive number.
///
/// Every term is computed per color and subtracted, so `eval_for(White) == -eval_for(Black)` always holds.
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    /// The position to evaluate.
    position: &'a Position,

    /// Weights of each term.
    weights: &'a EvalWeights,

    /// Percentage of game completion, in the range `[0, 100]`.
    ///
    /// Higher number means fewer pieces are on the board
    pub(crate) endgame_weight: i32,
}

impl<'a> Evaluator<'a> {
    /// Construct a new [`Evaluator`], computing any important metadata.
    #[inline(always)]
    pub fn new(position: &'a Position, weights: &'a EvalWeights) -> Self {
        Self {
            position,
            weights,
            endgame_weight: endgame_weight(position, weights),
        }
    }

    /// Evaluate this position from the side-to-move's perspective.
    ///
    /// A positive/high number is good for the side-to-move, while a negative number is better for the opponent.
    /// A score of 0 is considered equal.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let weights = EvalWeights::default();
    /// let pos = Position::default();
    /// assert_eq!(Evaluator::new(&pos, &weights).eval(), Score::DRAW);
    /// ```
    #[inline(always)]
    pub fn eval(&self) -> Score {
        self.eval_for(self.position.side_to_move())
    }

    /// Evaluate this position from `color`'s perspective.
    ///
    /// A positive/high number is good for the `color`, while a negative number is better for the opponent.
    pub fn eval_for(&self, color: Color) -> Score {
        self.side_score(color) - self.side_score(color.opponent())
    }

    /// Every term of the evaluation for the pieces of `color` alone.
    fn side_score(&self, color: Color) -> Score {
        let mut score = Score::DRAW;
        let pieces = self.position.board().color(color);

        for (square, piece) in self.position.board().iter_for(pieces) {
            score += self.weights.value_of(piece.kind());
            score += self.positional_value(square, piece.kind());
        }

        score
    }

    /// Positional contribution of a piece of `kind` on `square`, excluding its material value.
    fn positional_value(&self, square: Square, kind: PieceKind) -> Score {
        let mut score = Score::DRAW;

        // Kings shelter during the middlegame and centralize during the endgame
        if kind == PieceKind::King {
            let distance = square.center_distance() as i32 * self.weights.king_center;
            return Score(distance).lerp(Score(-distance), self.endgame_weight);
        }

        let mobility = (self.position.reach(square) & !self.friendly_at(square)).population();
        score += mobility as i32 * self.weights.mobility;

        if Bitboard::CENTER.intersects(square) {
            score += self.weights.center;
        }

        if self.position.royalty_at(square).is_some() {
            score += self.weights.royalty;
        }

        score
    }

    /// Pieces of the same color as the piece on `square`.
    #[inline(always)]
    fn friendly_at(&self, square: Square) -> Bitboard {
        self.position
            .color_at(square)
            .map(|color| self.position.board().color(color))
            .unwrap_or_default()
    }

    /// Fetches the value for the piece on the specified square, if one exists.
    ///
    /// Only used when printing the evaluator
    #[inline(always)]
    fn value_at(&self, square: Square) -> Option<Score> {
        self.position.piece_at(square).map(|piece| {
            let value = self.positional_value(square, piece.kind()) + self.weights.value_of(piece.kind());
            Score(value.0 * piece.color().negation_multiplier() as i32)
        })
    }
}

impl fmt::Display for Evaluator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let color = self.position.side_to_move();

        let ranks = Rank::iter().rev();

        write!(f, "  +")?;
        for _ in File::iter() {
            write!(f, "-----+")?;
        }
        writeln!(f)?;
        for rank in ranks {
            write!(f, "{rank} |")?;

            // Step 1: Write the piece char
            for file in File::iter() {
                let square = Square::new(file, rank);
                let piece = self.position.piece_at(square);
                let piece_char = piece.map(|p| p.to_uci()).unwrap_or(' ');
                write!(f, "  {piece_char}  |")?;
            }
            writeln!(f)?;
            write!(f, "  |")?;

            // Step 2: Write the contribution of that piece
            for file in File::iter() {
                let square = Square::new(file, rank);
                let score = match self.value_at(square) {
                    Some(val) => format!("{:^5}", val.describe()),
                    None => String::from("     "),
                };
                write!(f, "{score}|")?;
            }

            writeln!(f)?;

            write!(f, "  +")?;
            for _ in File::iter() {
                write!(f, "-----+")?;
            }
            writeln!(f)?;
        }
        for file in File::iter() {
            write!(f, "     {file}")?;
        }

        let score = self.eval_for(color);

        let winning_side = if score > Score::DRAW {
            Some(color)
        } else if score < Score::DRAW {
            Some(color.opponent())
        } else {
            None
        };

        writeln!(f, "\n\nEndgame: {}%", self.endgame_weight)?;
        writeln!(
            f,
            "Winning side: {}",
            winning_side.map(|c| c.name()).unwrap_or("N/A")
        )?;
        writeln!(f, "Score: {score}")?;

        Ok(())
    }
}

/// Initial material value of all non-King pieces in a standard setup.
fn initial_material_value(weights: &EvalWeights) -> i32 {
    weights.value_of(PieceKind::Pawn) * 16
        + weights.value_of(PieceKind::Knight) * 4
        + weights.value_of(PieceKind::Bishop) * 4
        + weights.value_of(PieceKind::Rook) * 4
        + weights.value_of(PieceKind::Queen) * 2
}

/// Counts the material value of all pieces on the board.
///
/// Kings are worth nothing here, as they cannot be removed from the board.
#[inline(always)]
fn material_remaining(position: &Position, weights: &EvalWeights) -> i32 {
    PieceKind::all()
        .into_iter()
        .filter(|&kind| kind != PieceKind::King)
        .fold(0, |score, kind| {
            score + position.board().kind(kind).population() as i32 * weights.value_of(kind)
        })
}

/// Compares the current material on the board to that of a standard setup, yielding an `i32` in the range `[0, 100]`
///
/// Lower numbers are closer to the beginning of the game. Higher numbers are closer to the end of the game.
/// Armies stronger than the standard setup count as the very beginning.
#[inline(always)]
fn endgame_weight(position: &Position, weights: &EvalWeights) -> i32 {
    let initial = initial_material_value(weights).max(1);
    let remaining = (initial - material_remaining(position, weights)).clamp(0, initial);
    remaining * 100 / initial
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FEN_KIWIPETE;

    fn eval_both(fen: &str) -> (Score, Score) {
        let pos = Position::from_fen(fen).unwrap();
        let weights = EvalWeights::default();
        let eval = Evaluator::new(&pos, &weights);
        (eval.eval_for(Color::White), eval.eval_for(Color::Black))
    }

    #[test]
    fn test_eval_is_zero_sum() {
        let fens = [
            FEN_KIWIPETE,
            "rutqkbnr/pppppppp/8/8/4G3/8/PPPPPPPP/RNBQKBZR w KQkq - 0 1",
            "4k3/8/8/3v4/8/8/8/R3K3 b - - 0 1 r:Qa1/3",
        ];

        for fen in fens {
            let (white, black) = eval_both(fen);
            assert_eq!(white, -black, "{fen}");
        }
    }

    #[test]
    fn test_material_advantage_is_positive() {
        // White is up a Queen
        let (white, black) = eval_both("4k3/8/8/8/8/8/8/3QK3 w - - 0 1");
        assert!(white > Score(800));
        assert!(black < Score(-800));
    }

    #[test]
    fn test_royalty_mark_is_rewarded() {
        let weights = EvalWeights::default();
        let plain = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let marked = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1 r:Ta1/4").unwrap();

        let plain = Evaluator::new(&plain, &weights).eval();
        let marked = Evaluator::new(&marked, &weights).eval();
        assert!(marked > plain);
    }

    #[test]
    fn test_endgame_weight() {
        let weights = EvalWeights::default();
        let start = Position::default();
        assert_eq!(Evaluator::new(&start, &weights).endgame_weight, 0);

        let bare = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(Evaluator::new(&bare, &weights).endgame_weight, 100);
    }
}
