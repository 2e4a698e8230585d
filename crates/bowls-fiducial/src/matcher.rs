//! Dictionary matching and rotation helpers.

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that: `observed_code == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance between observed and dictionary code (after rotation).
    pub hamming: u8,
}

/// Brute-force matcher over all ids and rotations of a small dictionary.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher for the given dictionary.
    ///
    /// `max_hamming` is clamped to the dictionary's correction capacity.
    /// Dictionaries with more than 64 bits are not representable and yield
    /// a matcher that never matches.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let rotated = if dict.bit_count() <= 64 {
            dict.codes
                .iter()
                .map(|&base| [0, 1, 2, 3].map(|r| rotate_code_u64(base, dict.marker_size, r)))
                .collect()
        } else {
            log::warn!(
                "dictionary {} has {} bits per marker, more than 64",
                dict.name,
                dict.bit_count()
            );
            Vec::new()
        };

        Self {
            dict,
            max_hamming: max_hamming.min(dict.max_correction_bits),
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Closest id and rotation within `max_hamming`; the first exact hit wins.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;
        for (id, rots) in (0u32..).zip(&self.rotated) {
            for (rotation, &cand) in (0u8..).zip(rots) {
                let hamming = (observed ^ cand).count_ones() as u8;
                if hamming > self.max_hamming || best.is_some_and(|b| b.hamming <= hamming) {
                    continue;
                }
                best = Some(Match {
                    id,
                    rotation,
                    hamming,
                });
                if hamming == 0 {
                    return best;
                }
            }
        }
        best
    }
}

/// Rotate a code stored in row-major bits: `idx = y * N + x`.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            out |= ((code >> (sy * n + sx)) & 1) << (y * n + x);
        }
    }
    out
}
