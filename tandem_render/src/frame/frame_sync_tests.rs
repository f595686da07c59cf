//! Unit tests for frame_sync.rs, driven by the simulated GPU timeline of MockSurface

use std::time::Duration;

use crate::config::MAX_FRAMES_IN_FLIGHT;
use crate::device::mock_device::{FenceState, MockSurface, SurfaceEvent};
use crate::device::render_device::SkipReason;
use crate::device::types::Extent2D;
use crate::error::Error;
use crate::frame::frame_sync::{BeginFrame, FrameSynchronizer, FrameToken};
use crate::frame::present_surface::{AcquireOutcome, PresentOutcome};

fn sync() -> FrameSynchronizer<MockSurface> {
    FrameSynchronizer::new(MockSurface::new(800, 600), None)
}

fn begin(sync: &mut FrameSynchronizer<MockSurface>) -> FrameToken {
    match sync.begin_frame().unwrap() {
        BeginFrame::Ready(token) => token,
        BeginFrame::Skipped(reason) => panic!("frame unexpectedly skipped: {:?}", reason),
    }
}

fn run_frame(sync: &mut FrameSynchronizer<MockSurface>) {
    let token = begin(sync);
    sync.end_frame(token).unwrap();
}

// ============================================================================
// FRAMES IN FLIGHT
// ============================================================================

#[test]
fn test_slots_cycle_over_frames_in_flight() {
    let mut sync = sync();
    let mut slots = Vec::new();
    for _ in 0..5 {
        let token = begin(&mut sync);
        slots.push(token.slot());
        sync.end_frame(token).unwrap();
    }
    assert_eq!(slots, vec![0, 1, 0, 1, 0]);
    assert_eq!(MAX_FRAMES_IN_FLIGHT, 2);
}

#[test]
fn test_third_submission_blocks_on_slot_zero_fence() {
    let mut sync = sync();

    run_frame(&mut sync);
    run_frame(&mut sync);
    assert_eq!(sync.surface().in_flight, 2);
    assert_eq!(sync.surface().count(|e| matches!(e, SurfaceEvent::Wait { blocked: true, .. })), 0);

    run_frame(&mut sync);

    let events = &sync.surface().events;
    let blocked_wait = events
        .iter()
        .position(|e| *e == SurfaceEvent::Wait { slot: 0, blocked: true })
        .expect("third frame never waited on slot 0");
    let third_submit = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, SurfaceEvent::Submit { .. }))
        .map(|(i, _)| i)
        .nth(2)
        .unwrap();
    assert!(blocked_wait < third_submit);
}

#[test]
fn test_never_more_than_n_in_flight() {
    let mut sync = sync();
    for _ in 0..50 {
        run_frame(&mut sync);
    }
    assert_eq!(sync.surface().max_in_flight, MAX_FRAMES_IN_FLIGHT);
}

#[test]
fn test_wait_precedes_acquire_precedes_reset() {
    let mut sync = sync();
    let token = begin(&mut sync);
    assert_eq!(token.slot(), 0);

    let events = &sync.surface().events;
    assert!(matches!(events[0], SurfaceEvent::Wait { slot: 0, .. }));
    assert!(matches!(events[1], SurfaceEvent::Acquire { slot: 0, .. }));
    assert_eq!(events[2], SurfaceEvent::Reset { slot: 0 });
    sync.end_frame(token).unwrap();
}

#[test]
fn test_token_carries_acquired_image_index() {
    let mut sync = sync();
    sync.surface_mut()
        .acquire_script
        .push_back(AcquireOutcome::Acquired { image_index: 2, suboptimal: false });

    let token = begin(&mut sync);
    assert_eq!(token.image_index(), 2);
    sync.end_frame(token).unwrap();

    assert!(sync.surface().events.contains(&SurfaceEvent::Present { slot: 0, image_index: 2 }));
}

// ============================================================================
// OUT OF DATE / SUBOPTIMAL
// ============================================================================

#[test]
fn test_out_of_date_acquire_rebuilds_and_skips() {
    let mut sync = sync();
    sync.surface_mut().window_extent = Extent2D::new(1024, 768);
    sync.surface_mut().acquire_script.push_back(AcquireOutcome::OutOfDate);

    assert_eq!(sync.begin_frame().unwrap(), BeginFrame::Skipped(SkipReason::SurfaceRebuilt));
    assert_eq!(sync.extent(), Extent2D::new(1024, 768));

    // Slot 0 fence was never reset, so the next frame does not deadlock
    assert_eq!(sync.surface().fences[0], FenceState::Signaled);
    assert!(sync.rebuild_pending());
    assert_eq!(sync.current_frame(), 0);

    let token = begin(&mut sync);
    assert_eq!(token.slot(), 0);
    sync.end_frame(token).unwrap();
}

#[test]
fn test_rebuild_recreates_everything_at_new_extent_before_next_acquire() {
    let mut sync = sync();
    run_frame(&mut sync);

    let new_extent = Extent2D::new(1280, 720);
    sync.surface_mut().window_extent = new_extent;
    sync.surface_mut().acquire_script.push_back(AcquireOutcome::OutOfDate);
    sync.begin_frame().unwrap();
    let token = begin(&mut sync);
    sync.end_frame(token).unwrap();

    let events = &sync.surface().events;
    let out_of_date = events
        .iter()
        .position(|e| matches!(e, SurfaceEvent::Acquire { outcome: AcquireOutcome::OutOfDate, .. }))
        .unwrap();
    let next_acquire = events
        .iter()
        .skip(out_of_date + 1)
        .position(|e| matches!(e, SurfaceEvent::Acquire { outcome: AcquireOutcome::Acquired { .. }, .. }))
        .map(|i| i + out_of_date + 1)
        .unwrap();

    let rebuild = &events[out_of_date + 1..next_acquire];
    for expected in [
        SurfaceEvent::DestroyFramebuffers,
        SurfaceEvent::DestroyDepth,
        SurfaceEvent::DestroySwapchain,
        SurfaceEvent::CreateSwapchain(new_extent),
        SurfaceEvent::CreateDepth(new_extent),
        SurfaceEvent::CreateFramebuffers { count: 3, extent: new_extent },
    ] {
        assert!(rebuild.contains(&expected), "missing {:?} in {:?}", expected, rebuild);
    }
}

#[test]
fn test_suboptimal_present_rebuilds_before_next_acquire() {
    let mut sync = sync();
    sync.surface_mut().present_script.push_back(PresentOutcome::Suboptimal);

    run_frame(&mut sync);
    assert!(sync.rebuild_pending());
    // The suboptimal frame itself was presented
    assert_eq!(sync.surface().count(|e| matches!(e, SurfaceEvent::Present { .. })), 1);
    assert_eq!(sync.surface().count(|e| *e == SurfaceEvent::DestroySwapchain), 0);

    run_frame(&mut sync);
    assert!(!sync.rebuild_pending());

    let events = &sync.surface().events;
    let rebuild = events.iter().position(|e| *e == SurfaceEvent::DestroySwapchain).unwrap();
    let second_acquire = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, SurfaceEvent::Acquire { .. }))
        .map(|(i, _)| i)
        .nth(1)
        .unwrap();
    assert!(rebuild < second_acquire);
}

#[test]
fn test_out_of_date_present_marks_rebuild() {
    let mut sync = sync();
    sync.surface_mut().present_script.push_back(PresentOutcome::OutOfDate);
    run_frame(&mut sync);
    assert!(sync.rebuild_pending());
    assert_eq!(sync.current_frame(), 1);
}

#[test]
fn test_suboptimal_acquire_still_renders_then_rebuilds() {
    let mut sync = sync();
    sync.surface_mut()
        .acquire_script
        .push_back(AcquireOutcome::Acquired { image_index: 0, suboptimal: true });

    let token = begin(&mut sync);
    sync.end_frame(token).unwrap();
    assert!(sync.rebuild_pending());
}

// ============================================================================
// TIMEOUT / MINIMIZED / ABANDON
// ============================================================================

#[test]
fn test_acquire_timeout_skips_without_rebuild() {
    let timeout = Duration::from_millis(5);
    let mut sync = FrameSynchronizer::new(MockSurface::new(800, 600), Some(timeout));
    sync.surface_mut().acquire_script.push_back(AcquireOutcome::Timeout);

    assert_eq!(sync.begin_frame().unwrap(), BeginFrame::Skipped(SkipReason::AcquireTimeout));
    assert_eq!(sync.surface().last_timeout, Some(timeout));
    assert!(!sync.rebuild_pending());
    assert_eq!(sync.surface().count(|e| *e == SurfaceEvent::DestroySwapchain), 0);

    run_frame(&mut sync);
}

#[test]
fn test_minimized_window_skips_until_it_has_area() {
    let mut sync = sync();
    sync.surface_mut().window_extent = Extent2D::new(0, 0);
    sync.request_rebuild();

    assert_eq!(sync.begin_frame().unwrap(), BeginFrame::Skipped(SkipReason::Minimized));
    assert_eq!(sync.begin_frame().unwrap(), BeginFrame::Skipped(SkipReason::Minimized));
    assert_eq!(sync.surface().count(|e| matches!(e, SurfaceEvent::Acquire { .. })), 0);

    sync.surface_mut().window_extent = Extent2D::new(640, 480);
    run_frame(&mut sync);
    assert_eq!(sync.extent(), Extent2D::new(640, 480));
}

#[test]
fn test_abandoned_frame_leaves_slot_usable() {
    let mut sync = sync();
    let token = begin(&mut sync);
    sync.abandon_frame(token).unwrap();
    assert_eq!(sync.surface().fences[0], FenceState::Signaled);

    // Wrap back around to slot 0 without deadlocking
    run_frame(&mut sync);
    run_frame(&mut sync);
    assert_eq!(sync.surface().count(|e| matches!(e, SurfaceEvent::Submit { .. })), 2);
}

// ============================================================================
// SUBMIT / PRESENT FAILURES
// ============================================================================

#[test]
fn test_failed_submit_rearms_fence_and_advances() {
    let mut sync = sync();
    sync.surface_mut().submit_failure = Some(Error::OutOfMemory);

    let token = begin(&mut sync);
    assert_eq!(sync.end_frame(token), Err(Error::OutOfMemory));

    assert_eq!(sync.surface().fences[0], FenceState::Signaled);
    assert_eq!(sync.surface().count(|e| *e == SurfaceEvent::Abandon { slot: 0 }), 1);
    assert_eq!(sync.current_frame(), 1);
    assert!(sync.rebuild_pending());
}

#[test]
fn test_failed_submit_does_not_deadlock_next_wrap() {
    let mut sync = sync();
    sync.surface_mut().submit_failure = Some(Error::OutOfMemory);

    let token = begin(&mut sync);
    assert!(sync.end_frame(token).is_err());

    // Back around to slot 0 and beyond
    for _ in 0..MAX_FRAMES_IN_FLIGHT + 1 {
        run_frame(&mut sync);
    }
    assert_eq!(sync.surface().count(|e| matches!(e, SurfaceEvent::Submit { .. })), MAX_FRAMES_IN_FLIGHT + 1);
    assert_eq!(sync.surface().count(|e| matches!(e, SurfaceEvent::Present { .. })), MAX_FRAMES_IN_FLIGHT + 1);
}

#[test]
fn test_failed_present_advances_and_rebuilds() {
    let mut sync = sync();
    sync.surface_mut().present_failure = Some(Error::DeviceLost);

    let token = begin(&mut sync);
    assert_eq!(sync.end_frame(token), Err(Error::DeviceLost));

    // The submission still signals slot 0
    assert_eq!(sync.surface().fences[0], FenceState::Pending);
    assert_eq!(sync.current_frame(), 1);
    assert!(sync.rebuild_pending());

    run_frame(&mut sync);
    run_frame(&mut sync);
    assert_eq!(sync.surface().count(|e| *e == SurfaceEvent::Wait { slot: 0, blocked: true }), 1);
    assert!(!sync.rebuild_pending());
}

#[test]
fn test_wait_for_in_flight_retires_every_slot() {
    let mut sync = sync();
    run_frame(&mut sync);
    run_frame(&mut sync);
    assert_eq!(sync.surface().in_flight, 2);

    sync.wait_for_in_flight().unwrap();

    assert_eq!(sync.surface().in_flight, 0);
    assert_eq!(sync.surface().fences, [FenceState::Signaled; MAX_FRAMES_IN_FLIGHT]);
    // Waiting does not consume a slot
    assert_eq!(sync.current_frame(), 0);
}
