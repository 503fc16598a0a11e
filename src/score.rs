/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, ops};

use crate::{tune, MAX_DEPTH};

/// Evaluation of a position, in centipawns, from the perspective of one side.
///
/// Scores within [`MAX_DEPTH`] plies of [`Score::MATE`] announce a forced mate.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Score(pub i32);

impl Score {
    /// Bound that no search ever returns.
    pub const INF: Self = Self(i16::MAX as i32);

    /// Delivering mate right now.
    pub const MATE: Self = Self(Self::INF.0 - 1);

    pub const DRAW: Self = Self(0);

    /// Slowest mate a search can announce.
    pub const LOWEST_MATE: Self = Self(Self::MATE.0 - MAX_DEPTH as i32);

    /// Ordering score of a quiet move.
    ///
    /// Captures and arcane moves are scored above this.
    pub const BASE_MOVE_SCORE: Self = Self(tune::base_move_score!());

    /// Score of the side to move when it is checkmated `ply` plies from the root.
    ///
    /// Shorter losses score lower, so the search prefers to delay them.
    #[inline(always)]
    pub const fn mated_in(ply: i32) -> Self {
        Self(-Self::MATE.0 + ply)
    }

    #[inline(always)]
    pub const fn is_mate(&self) -> bool {
        self.0.abs() >= Self::LOWEST_MATE.0
    }

    /// Plies between the root and the mate this score announces.
    #[inline(always)]
    pub const fn plies_to_mate(&self) -> i32 {
        Self::MATE.0 - self.0.abs()
    }

    /// Full moves until mate: positive when the side to move delivers it, negative when it is mated.
    #[inline(always)]
    pub const fn moves_to_mate(&self) -> i32 {
        let plies = self.plies_to_mate();
        if self.0 > 0 {
            (plies + 1) / 2
        } else {
            -plies / 2
        }
    }

    /// Blends `self` into `other` by `t` percent.
    #[inline(always)]
    pub const fn lerp(self, other: Self, t: i32) -> Self {
        Self(self.0 + (other.0 - self.0) * t / 100)
    }

    /// Mate scores read as `#3` or `#-2` (in full moves), everything else in pawns, like `+1.25`.
    pub fn describe(&self) -> String {
        if self.is_mate() {
            format!("#{}", self.moves_to_mate())
        } else {
            format!("{:+.2}", self.0 as f32 / 100.0)
        }
    }
}

macro_rules! impl_score_ops {
    ($($trait:ident, $fn:ident, $assign_trait:ident, $assign_fn:ident);*) => {
        $(
            impl ops::$trait for Score {
                type Output = Self;

                #[inline(always)]
                fn $fn(self, rhs: Self) -> Self::Output {
                    Self(ops::$trait::$fn(self.0, rhs.0))
                }
            }

            impl ops::$trait<i32> for Score {
                type Output = Self;

                #[inline(always)]
                fn $fn(self, rhs: i32) -> Self::Output {
                    Self(ops::$trait::$fn(self.0, rhs))
                }
            }

            impl ops::$assign_trait for Score {
                #[inline(always)]
                fn $assign_fn(&mut self, rhs: Self) {
                    ops::$assign_trait::$assign_fn(&mut self.0, rhs.0);
                }
            }

            impl ops::$assign_trait<i32> for Score {
                #[inline(always)]
                fn $assign_fn(&mut self, rhs: i32) {
                    ops::$assign_trait::$assign_fn(&mut self.0, rhs);
                }
            }
        )*
    };
}

impl_score_ops!(Add, add, AddAssign, add_assign; Sub, sub, SubAssign, sub_assign);

impl ops::Neg for Score {
    type Output = Self;

    #[inline(always)]
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl fmt::Display for Score {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_mate() {
            write!(f, "{} ({})", self.0, self.describe())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mate_distances() {
        let mating = Score::MATE - 3;
        assert!(mating.is_mate());
        assert_eq!(mating.plies_to_mate(), 3);
        assert_eq!(mating.moves_to_mate(), 2);

        let mated = Score::mated_in(4);
        assert_eq!(mated, -(Score::MATE - 4));
        assert_eq!(mated.plies_to_mate(), 4);
        assert_eq!(mated.moves_to_mate(), -2);
        assert!(Score::mated_in(2) < Score::mated_in(4));

        assert!(!Score(900).is_mate());
        assert!(Score::LOWEST_MATE.is_mate());
        assert_eq!(Score::LOWEST_MATE.plies_to_mate(), MAX_DEPTH as i32);
    }

    #[test]
    fn test_describe() {
        assert_eq!(Score(125).describe(), "+1.25");
        assert_eq!(Score(-40).describe(), "-0.40");
        assert_eq!((Score::MATE - 1).describe(), "#1");
        assert_eq!(Score::mated_in(2).describe(), "#-1");
    }

    #[test]
    fn test_lerp() {
        assert_eq!(Score(30).lerp(Score(-30), 0), Score(30));
        assert_eq!(Score(30).lerp(Score(-30), 50), Score(0));
        assert_eq!(Score(30).lerp(Score(-30), 100), Score(-30));
    }
}
