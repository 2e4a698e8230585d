//! Corner fiducials for perspective-corrected bowls measurement.
//!
//! This crate focuses on:
//! - an embedded 4x4 marker dictionary (compiled into the binary),
//! - proposing marker quads anywhere in a grayscale image,
//! - decoding those quads and matching them against the dictionary,
//! - rendering printable markers for a measuring mat.

pub mod builtins;
mod decode;
mod detect;
mod dictionary;
mod matcher;
mod print;
mod quad;
mod threshold;

pub use decode::DecodeConfig;
pub use detect::{detect_fiducials, FiducialDetection, FiducialParams};
pub use dictionary::Dictionary;
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use print::render_marker;
pub use quad::{propose_quads, QuadCandidate, QuadParams};
