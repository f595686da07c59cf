//! Unit tests for GlSurface, alone and driven by the frame synchronizer

use super::*;
use std::cell::Cell;
use std::rc::Rc;
use tandem_render::frame::{BeginFrame, FrameSynchronizer};
use tandem_render::tandem::render::SkipReason;
use tandem_render::tandem::Error;

fn counting_surface(width: u32, height: u32) -> (GlSurface, Rc<Cell<u32>>) {
    let swaps = Rc::new(Cell::new(0));
    let counter = Rc::clone(&swaps);
    let hook: SwapHook = Box::new(move || {
        counter.set(counter.get() + 1);
        Ok(())
    });
    (GlSurface::new(hook, Extent2D::new(width, height)), swaps)
}

// ============================================================================
// SURFACE
// ============================================================================

#[test]
fn test_acquire_always_image_zero() {
    let (mut surface, _) = counting_surface(640, 480);

    for slot in 0..4 {
        assert_eq!(
            surface.acquire_image(slot % 2, None).unwrap(),
            AcquireOutcome::Acquired { image_index: 0, suboptimal: false }
        );
    }
}

#[test]
fn test_present_calls_swap_hook() {
    let (mut surface, swaps) = counting_surface(640, 480);

    assert_eq!(surface.present(0, 0).unwrap(), PresentOutcome::Presented);
    assert_eq!(surface.present(1, 0).unwrap(), PresentOutcome::Presented);

    assert_eq!(swaps.get(), 2);
    assert_eq!(surface.presented(), 2);
}

#[test]
fn test_swap_hook_error_propagates() {
    let hook: SwapHook = Box::new(|| Err(Error::BackendError("context lost".to_string())));
    let mut surface = GlSurface::new(hook, Extent2D::new(640, 480));

    assert_eq!(
        surface.present(0, 0),
        Err(Error::BackendError("context lost".to_string()))
    );
    assert_eq!(surface.presented(), 0);
}

#[test]
fn test_resized_window_reports_suboptimal_until_rebuilt() {
    let (mut surface, _) = counting_surface(640, 480);
    surface.set_window_extent(Extent2D::new(800, 600));

    assert_eq!(surface.present(0, 0).unwrap(), PresentOutcome::Suboptimal);
    assert_eq!(surface.rebuild().unwrap(), Extent2D::new(800, 600));
    assert_eq!(surface.present(0, 0).unwrap(), PresentOutcome::Presented);
}

#[test]
fn test_zero_area_is_out_of_date() {
    let (mut surface, _) = counting_surface(0, 0);
    assert_eq!(surface.acquire_image(0, None).unwrap(), AcquireOutcome::OutOfDate);
}

// ============================================================================
// WITH FRAME SYNCHRONIZER
// ============================================================================

#[test]
fn test_frames_alternate_slots() {
    let (surface, swaps) = counting_surface(640, 480);
    let mut sync = FrameSynchronizer::new(surface, None);

    let mut slots = Vec::new();
    for _ in 0..3 {
        match sync.begin_frame().unwrap() {
            BeginFrame::Ready(token) => {
                slots.push(token.slot());
                sync.end_frame(token).unwrap();
            }
            BeginFrame::Skipped(reason) => panic!("unexpected skip: {:?}", reason),
        }
    }

    assert_eq!(slots, vec![0, 1, 0]);
    assert_eq!(swaps.get(), 3);
}

#[test]
fn test_minimized_window_skips_frames() {
    let (surface, swaps) = counting_surface(640, 480);
    let mut sync = FrameSynchronizer::new(surface, None);

    sync.surface_mut().set_window_extent(Extent2D::new(0, 0));
    sync.request_rebuild();
    assert_eq!(sync.begin_frame().unwrap(), BeginFrame::Skipped(SkipReason::Minimized));
    assert_eq!(sync.begin_frame().unwrap(), BeginFrame::Skipped(SkipReason::Minimized));

    sync.surface_mut().set_window_extent(Extent2D::new(1024, 768));
    assert!(matches!(sync.begin_frame().unwrap(), BeginFrame::Ready(_)));
    assert_eq!(sync.extent(), Extent2D::new(1024, 768));
    assert_eq!(swaps.get(), 0);
}
