/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Seed expanded into the generator's initial state.
const DEFAULT_SEED: u64 = 0x4172_6361_6e61_2121;

/// A `const`-friendly pseudo-random number generator using the "xoshiro256**" algorithm.
///
/// State is expanded from a single `u64` with SplitMix64, as recommended by the
/// [xoshiro authors](https://prng.di.unimi.it/). Only used to build hash tables at compile time;
/// runtime randomness goes through the `rand` crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XoShiRo([u64; 4]);

impl XoShiRo {
    /// Construct a new generator from the library's seed.
    #[inline(always)]
    pub const fn new() -> Self {
        Self::from_seed(DEFAULT_SEED)
    }

    /// Construct a new generator by expanding `seed` with SplitMix64.
    pub const fn from_seed(seed: u64) -> Self {
        let mut state = [0; 4];
        let mut x = seed;
        let mut i = 0;
        while i < state.len() {
            x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = x;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            state[i] = z ^ (z >> 31);
            i += 1;
        }
        Self(state)
    }

    /// Returns the next number in the sequence along with the advanced generator.
    ///
    /// # Example
    /// ```
    /// # use arcana::XoShiRo;
    /// let (a, prng) = XoShiRo::new().get_next_const();
    /// let (b, _) = prng.get_next_const();
    /// assert_ne!(a, b);
    /// ```
    #[inline(always)]
    pub const fn get_next_const(self) -> (u64, Self) {
        let mut s = self.0;
        let result = s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = s[1] << 17;

        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];
        s[2] ^= t;
        s[3] = s[3].rotate_left(45);

        (result, Self(s))
    }
}

impl Default for XoShiRo {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for XoShiRo {
    type Item = u64;
    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        let (value, next) = self.get_next_const();
        *self = next;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_deterministic() {
        let a: Vec<u64> = XoShiRo::new().take(8).collect();
        let b: Vec<u64> = XoShiRo::new().take(8).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seeds_diverge() {
        let a = XoShiRo::from_seed(1).next();
        let b = XoShiRo::from_seed(2).next();
        assert_ne!(a, b);
    }
}
