//! Spatial key generation: 32-bit Morton (Z-order) codes.
//!
//! Positions are normalized into `[0, 2^16)` per axis inside the current
//! bounding box and the bits of the two 16-bit coordinates are interleaved,
//! x in the even bits and y in the odd bits.

use rayon::prelude::*;

use crate::{Bounds, NodeState};

/// Cells per axis of the Morton grid.
pub const MORTON_RESOLUTION: u32 = 1 << 16;

// Interleave bits for 2D Morton code (16 bits per dimension = 32-bit code)
fn expand_bits(v: u32) -> u32 {
    let mut x = v & 0xFFFF;
    x = (x | (x << 8)) & 0x00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}

fn compact_bits(v: u32) -> u32 {
    let mut x = v & 0x5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF;
    x
}

/// Interleave two 16-bit grid coordinates into a Morton code.
pub fn interleave(x: u16, y: u16) -> u32 {
    expand_bits(u32::from(x)) | (expand_bits(u32::from(y)) << 1)
}

/// Split a Morton code back into its grid coordinates.
pub fn deinterleave(code: u32) -> (u16, u16) {
    (compact_bits(code) as u16, compact_bits(code >> 1) as u16)
}

/// Map one coordinate into a grid cell, clamping anything outside the range.
fn quantize(value: f32, min: f32, extent: f32) -> u16 {
    let scaled = (value - min) / extent * MORTON_RESOLUTION as f32;
    // NaN fails both comparisons and lands in cell 0
    if scaled >= (MORTON_RESOLUTION - 1) as f32 {
        (MORTON_RESOLUTION - 1) as u16
    } else if scaled > 0.0 {
        scaled as u16
    } else {
        0
    }
}

/// Morton code of a point inside `bounds`. Points outside are clamped to the
/// nearest edge cell.
pub fn encode(x: f32, y: f32, bounds: &Bounds) -> u32 {
    let gx = quantize(x, bounds.min_x, bounds.width());
    let gy = quantize(y, bounds.min_y, bounds.height());
    interleave(gx, gy)
}

/// Stage 1: write one key per node and seed the identity permutation.
pub(crate) fn generate_keys(
    states: &[NodeState],
    bounds: &Bounds,
    keys: &mut [u32],
    values: &mut [u32],
) {
    debug_assert_eq!(states.len(), keys.len());
    debug_assert_eq!(states.len(), values.len());

    keys.par_iter_mut()
        .zip(values.par_iter_mut())
        .zip(states.par_iter())
        .enumerate()
        .for_each(|(i, ((key, value), state))| {
            *key = encode(state.x, state.y, bounds);
            *value = i as u32;
        });
}
