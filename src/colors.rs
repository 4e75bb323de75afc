//! Distinct-color counting
//!
//! Pure decode-and-count: no I/O, no shared state. Pixels are compared as
//! RGBA8 tuples; only equality matters, so channel order and source bit
//! depth are irrelevant to the count.

use crate::CensusError;
use std::collections::HashSet;

/// Count the number of distinct pixel values in an encoded image.
///
/// Corrupt or unsupported bytes yield a decode error. An image with zero
/// pixels yields 0, not an error.
pub fn count_colors(bytes: &[u8]) -> Result<u64, CensusError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgba = decoded.to_rgba8();
    Ok(distinct_count(rgba.pixels().map(|pixel| pixel.0)))
}

fn distinct_count<I>(pixels: I) -> u64
where
    I: IntoIterator<Item = [u8; 4]>,
{
    let unique: HashSet<[u8; 4]> = pixels.into_iter().collect();
    unique.len() as u64
}
