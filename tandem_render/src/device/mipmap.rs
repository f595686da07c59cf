/// Mip chain math shared by the explicit backend's blit chain and the tests.

use crate::device::types::Extent2D;

/// Number of mip levels of a full chain: `floor(log2(max(width, height))) + 1`
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height);
    if largest == 0 {
        return 0;
    }
    u32::BITS - largest.leading_zeros()
}

/// Extent of a given level: each dimension halved per level, never below 1
pub fn mip_extent(width: u32, height: u32, level: u32) -> Extent2D {
    Extent2D::new(
        width.checked_shr(level).unwrap_or(0).max(1),
        height.checked_shr(level).unwrap_or(0).max(1),
    )
}

/// Extents of every level, base level first
pub fn mip_chain(width: u32, height: u32) -> Vec<Extent2D> {
    (0..mip_level_count(width, height))
        .map(|level| mip_extent(width, height, level))
        .collect()
}

#[cfg(test)]
#[path = "mipmap_tests.rs"]
mod tests;
