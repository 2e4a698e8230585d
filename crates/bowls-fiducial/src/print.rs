//! Printable marker generation.
//!
//! Renders a dictionary marker as a grayscale bitmap (black border, inner
//! bits, optional white quiet zone) for printing measuring-mat corners.

use crate::Dictionary;
use bowls_core::GrayImage;

/// Render marker `id` with `cell_px` pixels per bit cell and a white margin
/// of `quiet_px` pixels on each side.
///
/// Returns `None` when the id is not in the dictionary or `cell_px == 0`.
pub fn render_marker(
    dict: &Dictionary,
    id: u32,
    cell_px: usize,
    quiet_px: usize,
) -> Option<GrayImage> {
    let code = dict.code(id)?;
    if cell_px == 0 {
        return None;
    }
    let bits = dict.marker_size;
    let cells = bits + 2;
    let side = cells * cell_px + 2 * quiet_px;
    let mut img = GrayImage::filled(side, side, 255);

    for cy in 0..cells {
        for cx in 0..cells {
            let is_border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
            let is_black = is_border || (code >> ((cy - 1) * bits + (cx - 1))) & 1 == 1;
            if !is_black {
                continue;
            }
            for yy in 0..cell_px {
                let row = quiet_px + cy * cell_px + yy;
                let start = row * side + quiet_px + cx * cell_px;
                img.data[start..start + cell_px].fill(0);
            }
        }
    }

    Some(img)
}
