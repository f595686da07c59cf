//! GPU-free checks of the blit geometry used for mip generation

use super::*;

// ============================================================================
// BLIT BOUNDS
// ============================================================================

#[test]
fn test_blit_bounds_cover_full_level() {
    let bounds = blit_bounds(Extent2D::new(256, 128));
    assert_eq!(bounds[0], vk::Offset3D { x: 0, y: 0, z: 0 });
    assert_eq!(bounds[1], vk::Offset3D { x: 256, y: 128, z: 1 });
}

#[test]
fn test_blit_chain_halves_until_one() {
    let levels = mip_level_count(256, 256);
    assert_eq!(levels, 9);

    for level in 1..levels {
        let src = blit_bounds(mip_extent(256, 256, level - 1))[1];
        let dst = blit_bounds(mip_extent(256, 256, level))[1];
        assert_eq!(dst.x, (src.x / 2).max(1));
        assert_eq!(dst.y, (src.y / 2).max(1));
    }
    assert_eq!(blit_bounds(mip_extent(256, 256, levels - 1))[1], vk::Offset3D { x: 1, y: 1, z: 1 });
}

#[test]
fn test_blit_chain_non_square() {
    // 300x20: the short side bottoms out at 1 while the long side keeps halving
    let levels = mip_level_count(300, 20);
    assert_eq!(levels, 9);
    let last = blit_bounds(mip_extent(300, 20, levels - 1))[1];
    assert_eq!((last.x, last.y), (1, 1));
    let fifth = blit_bounds(mip_extent(300, 20, 5))[1];
    assert_eq!((fifth.x, fifth.y), (9, 1));
}
