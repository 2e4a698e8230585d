//! Embedded built-in dictionaries.

use crate::Dictionary;

/// Leading entries of the OpenCV `DICT_4X4_50` dictionary, enough for the
/// corner markers of a measuring mat. Minimum pairwise distance over all
/// rotations is 6 bits.
pub const DICT_4X4_50_HEAD: Dictionary = Dictionary {
    name: "DICT_4X4_50",
    marker_size: 4,
    max_correction_bits: 1,
    codes: &[
        0x4cad, 0x59f0, 0xb4cc, 0x6299, 0x792a, 0xb39e, 0x7479, 0x4f23,
    ],
};

/// Look up a built-in dictionary by name.
pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {
    match name {
        "DICT_4X4_50" => Some(DICT_4X4_50_HEAD),
        _ => None,
    }
}
