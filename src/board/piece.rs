/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::{Index, IndexMut, Neg},
    str::FromStr,
};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Represents the color of a player or piece.
///
/// White moves first, and therefore [`Color`] defaults to [`Color::White`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Color {
    #[default]
    White,
    Black,
}

impl Color {
    /// Number of color variants.
    pub const COUNT: usize = 2;

    /// An array of both colors, starting with White.
    #[inline(always)]
    pub const fn all() -> [Self; Self::COUNT] {
        [Self::White, Self::Black]
    }

    /// Creates a new [`Color`] from a `bool`, where `false = White`.
    #[inline(always)]
    pub const fn from_bool(color: bool) -> Self {
        if color {
            Self::Black
        } else {
            Self::White
        }
    }

    #[inline(always)]
    pub const fn is_white(&self) -> bool {
        matches!(self, Self::White)
    }

    #[inline(always)]
    pub const fn is_black(&self) -> bool {
        matches!(self, Self::Black)
    }

    /// Returns a multiplier for negating numbers relative to this color.
    ///
    /// # Example
    /// ```
    /// # use arcana::Color;
    /// assert_eq!(Color::White.negation_multiplier(), 1);
    /// assert_eq!(Color::Black.negation_multiplier(), -1);
    /// ```
    #[inline(always)]
    pub const fn negation_multiplier(&self) -> i8 {
        match self {
            Self::White => 1,
            Self::Black => -1,
        }
    }

    /// Returns this [`Color`]'s opposite / inverse / enemy.
    ///
    /// # Example
    /// ```
    /// # use arcana::Color;
    /// assert_eq!(Color::White.opponent(), Color::Black);
    /// ```
    #[inline(always)]
    pub const fn opponent(&self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Returns this [`Color`] as a `usize`, for indexing into lists.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    #[inline(always)]
    pub const fn bits(&self) -> u8 {
        *self as u8
    }

    /// Creates a [`Color`] from a FEN side-to-move char.
    ///
    /// # Example
    /// ```
    /// # use arcana::Color;
    /// assert_eq!(Color::from_uci('w').unwrap(), Color::White);
    /// assert!(Color::from_uci('x').is_err());
    /// ```
    #[inline(always)]
    pub fn from_uci(color: char) -> Result<Self> {
        match color {
            'w' | 'W' => Ok(Self::White),
            'b' | 'B' => Ok(Self::Black),
            _ => bail!("Color must be either 'w' or 'b' (case-insensitive). Found {color:?}"),
        }
    }

    /// Creates a [`Color`] based on the ASCII case of `c`: uppercase is White, lowercase is Black.
    #[inline(always)]
    pub const fn from_case(c: char) -> Self {
        Self::from_bool(c.is_ascii_lowercase())
    }

    #[inline(always)]
    pub const fn to_uci(&self) -> char {
        match self {
            Self::White => 'w',
            Self::Black => 'b',
        }
    }

    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::White => "w",
            Self::Black => "b",
        }
    }

    /// Fetches a human-readable name for this [`Color`].
    #[inline(always)]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }
}

impl Neg for Color {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self::Output {
        self.opponent()
    }
}

/// Represents the kind (or "role") that a piece can be.
///
/// Besides the six classical pieces there are three piece families:
/// * Royalty: [`PieceKind::Templar`] (Rook + Knight), [`PieceKind::Mystic`] (Bishop + Knight), [`PieceKind::Valkyrie`] (Queen + Knight).
/// * Ghosts: [`PieceKind::Ghost`] steps one square in any direction, never captures, and cannot be captured.
/// * Equus: [`PieceKind::Zebra`] leaps `(2, 3)`, [`PieceKind::Unicorn`] leaps like a Knight or a `(1, 3)` Camel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
    Templar,
    Mystic,
    Valkyrie,
    Ghost,
    Zebra,
    Unicorn,
}

impl PieceKind {
    /// Number of piece variants.
    pub const COUNT: usize = 12;

    /// An array of all [`PieceKind`]s, in discriminant order.
    #[inline(always)]
    pub const fn all() -> [Self; Self::COUNT] {
        use PieceKind::*;
        [
            Pawn, Knight, Bishop, Rook, Queen, King, Templar, Mystic, Valkyrie, Ghost, Zebra,
            Unicorn,
        ]
    }

    /// Kinds a pawn may promote to.
    #[inline(always)]
    pub const fn promotions() -> [Self; 4] {
        [Self::Queen, Self::Rook, Self::Bishop, Self::Knight]
    }

    /// Kinds that can be granted as a royalty mark on a square.
    #[inline(always)]
    pub const fn royalties() -> [Self; 4] {
        [Self::Queen, Self::Templar, Self::Mystic, Self::Valkyrie]
    }

    /// Creates a new [`PieceKind`] from a set of bits.
    ///
    /// # Example
    /// ```
    /// # use arcana::PieceKind;
    /// assert_eq!(PieceKind::from_bits(4).unwrap(), PieceKind::Queen);
    /// assert!(PieceKind::from_bits(42).is_err());
    /// ```
    #[inline(always)]
    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits as usize >= Self::COUNT {
            bail!(
                "Invalid bits for PieceKind: Bits must be between [0,{}]. Got {bits}.",
                Self::COUNT - 1
            );
        }
        Ok(Self::from_bits_unchecked(bits))
    }

    /// Creates a new [`PieceKind`] from a set of bits, ignoring safety checks.
    #[inline(always)]
    pub const fn from_bits_unchecked(bits: u8) -> Self {
        debug_assert!((bits as usize) < Self::COUNT, "Invalid bits for PieceKind");

        // Safety: `PieceKind` is a `repr(u8)` enum and `bits` is within its discriminant range.
        unsafe { std::mem::transmute(bits) }
    }

    #[inline(always)]
    pub const fn bits(&self) -> u8 {
        *self as u8
    }

    #[inline(always)]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Fixed material value of this [`PieceKind`], in centipawns.
    ///
    /// This is the value tracked by a position's material counters.
    /// Search uses the tunable weights in [`crate::EvalWeights`] instead.
    #[inline(always)]
    pub const fn value(&self) -> i32 {
        match self {
            Self::Pawn => 100,
            Self::Knight => 300,
            Self::Bishop => 320,
            Self::Rook => 500,
            Self::Queen => 900,
            Self::King => 0,
            Self::Templar => 800,
            Self::Mystic => 750,
            Self::Valkyrie => 1200,
            Self::Ghost => 150,
            Self::Zebra => 250,
            Self::Unicorn => 450,
        }
    }

    /// Returns `true` for pieces that can never be captured.
    #[inline(always)]
    pub const fn is_ghostly(&self) -> bool {
        matches!(self, Self::Ghost)
    }

    /// Creates a new [`PieceKind`] from a FEN letter, ignoring case.
    ///
    /// # Example
    /// ```
    /// # use arcana::PieceKind;
    /// assert_eq!(PieceKind::from_uci('t').unwrap(), PieceKind::Templar);
    /// assert!(PieceKind::from_uci('x').is_err());
    /// ```
    #[inline(always)]
    pub fn from_uci(kind: char) -> Result<Self> {
        match kind.to_ascii_lowercase() {
            'p' => Ok(Self::Pawn),
            'n' => Ok(Self::Knight),
            'b' => Ok(Self::Bishop),
            'r' => Ok(Self::Rook),
            'q' => Ok(Self::Queen),
            'k' => Ok(Self::King),
            't' => Ok(Self::Templar),
            'm' => Ok(Self::Mystic),
            'v' => Ok(Self::Valkyrie),
            'g' => Ok(Self::Ghost),
            'z' => Ok(Self::Zebra),
            'u' => Ok(Self::Unicorn),
            _ => bail!("Invalid char for PieceKind: Got {kind:?}"),
        }
    }

    /// Lowercase FEN letter of this [`PieceKind`].
    #[inline(always)]
    pub const fn to_uci(&self) -> char {
        match self {
            Self::Pawn => 'p',
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
            Self::King => 'k',
            Self::Templar => 't',
            Self::Mystic => 'm',
            Self::Valkyrie => 'v',
            Self::Ghost => 'g',
            Self::Zebra => 'z',
            Self::Unicorn => 'u',
        }
    }

    /// Uppercase letter of this [`PieceKind`], as used in move notation.
    #[inline(always)]
    pub const fn char(&self) -> char {
        self.to_uci().to_ascii_uppercase()
    }

    #[inline(always)]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pawn => "pawn",
            Self::Knight => "knight",
            Self::Bishop => "bishop",
            Self::Rook => "rook",
            Self::Queen => "queen",
            Self::King => "king",
            Self::Templar => "templar",
            Self::Mystic => "mystic",
            Self::Valkyrie => "valkyrie",
            Self::Ghost => "ghost",
            Self::Zebra => "zebra",
            Self::Unicorn => "unicorn",
        }
    }
}

/// Represents a piece on the game board: a [`PieceKind`] with a [`Color`].
///
/// Internally encoded using the following bit pattern:
/// ```text
///     000 0 0000
///      |  |  |
///      |  |  +- Represents the PieceKind.
///      |  +- Represents the Color. `0` for White, `1` for Black.
///      +- Unused.
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Piece(u8);

impl Piece {
    pub const WHITE_PAWN: Self = Self::new(Color::White, PieceKind::Pawn);
    pub const WHITE_KNIGHT: Self = Self::new(Color::White, PieceKind::Knight);
    pub const WHITE_BISHOP: Self = Self::new(Color::White, PieceKind::Bishop);
    pub const WHITE_ROOK: Self = Self::new(Color::White, PieceKind::Rook);
    pub const WHITE_QUEEN: Self = Self::new(Color::White, PieceKind::Queen);
    pub const WHITE_KING: Self = Self::new(Color::White, PieceKind::King);

    pub const BLACK_PAWN: Self = Self::new(Color::Black, PieceKind::Pawn);
    pub const BLACK_KNIGHT: Self = Self::new(Color::Black, PieceKind::Knight);
    pub const BLACK_BISHOP: Self = Self::new(Color::Black, PieceKind::Bishop);
    pub const BLACK_ROOK: Self = Self::new(Color::Black, PieceKind::Rook);
    pub const BLACK_QUEEN: Self = Self::new(Color::Black, PieceKind::Queen);
    pub const BLACK_KING: Self = Self::new(Color::Black, PieceKind::King);

    /// Number of unique piece variants.
    pub const COUNT: usize = Color::COUNT * PieceKind::COUNT;

    /// Start index of color bits.
    const COLOR_BITS: u8 = 4;
    /// Mask for the kind bits.
    const KIND_MASK: u8 = 0b0000_1111;

    /// Creates a new [`Piece`] from the given [`Color`] and [`PieceKind`].
    ///
    /// # Example
    /// ```
    /// # use arcana::{Piece, Color, PieceKind};
    /// let white_knight = Piece::new(Color::White, PieceKind::Knight);
    /// assert_eq!(white_knight.to_string(), "N");
    /// ```
    #[inline(always)]
    pub const fn new(color: Color, kind: PieceKind) -> Self {
        Self(color.bits() << Self::COLOR_BITS | kind.bits())
    }

    #[inline(always)]
    pub const fn color(&self) -> Color {
        Color::from_bool(self.0 >> Self::COLOR_BITS != 0)
    }

    #[inline(always)]
    pub const fn kind(&self) -> PieceKind {
        PieceKind::from_bits_unchecked(self.0 & Self::KIND_MASK)
    }

    #[inline(always)]
    pub const fn is_pawn(&self) -> bool {
        matches!(self.kind(), PieceKind::Pawn)
    }

    #[inline(always)]
    pub const fn is_rook(&self) -> bool {
        matches!(self.kind(), PieceKind::Rook)
    }

    #[inline(always)]
    pub const fn is_king(&self) -> bool {
        matches!(self.kind(), PieceKind::King)
    }

    /// Returns this [`Piece`] as a `usize` in `[0, Piece::COUNT)`, for indexing into lists.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.color().index() * PieceKind::COUNT + self.kind().index()
    }

    /// Creates a [`Piece`] from a FEN letter; uppercase is White.
    ///
    /// # Example
    /// ```
    /// # use arcana::{Piece, PieceKind, Color};
    /// let mystic = Piece::from_uci('m').unwrap();
    /// assert_eq!(mystic.kind(), PieceKind::Mystic);
    /// assert_eq!(mystic.color(), Color::Black);
    /// ```
    #[inline(always)]
    pub fn from_uci(piece: char) -> Result<Self> {
        let kind = PieceKind::from_uci(piece)?;
        let color = Color::from_case(piece);
        Ok(Self::new(color, kind))
    }

    /// FEN letter of this [`Piece`]; uppercase is White.
    #[inline(always)]
    pub const fn to_uci(&self) -> char {
        let c = self.kind().to_uci();
        if self.color().is_white() {
            c.to_ascii_uppercase()
        } else {
            c
        }
    }

    /// Returns a new [`Piece`] of the same color but of kind `promotion`.
    #[inline(always)]
    pub const fn promoted(self, promotion: PieceKind) -> Self {
        Self::new(self.color(), promotion)
    }

    /// Fetches a human-readable name for this [`Piece`].
    ///
    /// # Example
    /// ```
    /// # use arcana::Piece;
    /// assert_eq!(Piece::WHITE_QUEEN.name(), "white queen");
    /// ```
    #[inline(always)]
    pub fn name(&self) -> String {
        format!("{} {}", self.color().name(), self.kind().name())
    }
}

macro_rules! impl_index_traits {
    ($type:ty) => {
        impl<T> Index<$type> for [T; <$type>::COUNT] {
            type Output = T;
            #[inline(always)]
            fn index(&self, index: $type) -> &Self::Output {
                &self[index.index()]
            }
        }

        impl<T> IndexMut<$type> for [T; <$type>::COUNT] {
            #[inline(always)]
            fn index_mut(&mut self, index: $type) -> &mut Self::Output {
                &mut self[index.index()]
            }
        }
    };
}

impl_index_traits!(Piece);
impl_index_traits!(PieceKind);
impl_index_traits!(Color);

macro_rules! impl_common_traits {
    ($type:ty) => {
        impl FromStr for $type {
            type Err = anyhow::Error;
            /// Does the same as [`Self::from_uci`], but only if `s` is one character in length.
            #[inline(always)]
            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::from_uci(c),
                    _ => bail!(
                        "Invalid str for {}: Must be a str of len 1. Got {s:?}",
                        stringify!($type)
                    ),
                }
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_uci())
            }
        }

        impl fmt::Debug for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "\"{}\" ({})", self.name(), self.index())
            }
        }
    };
}

impl_common_traits!(Piece);
impl_common_traits!(PieceKind);
impl_common_traits!(Color);
