//! Unit tests for the GL projection and version gate

use super::*;
use serial_test::serial;
use std::sync::{Arc, Mutex};
use tandem_render::glam::Vec4;
use tandem_render::tandem::log::{Log, LogEntry, LogSeverity, Logger};

/// Captures log entries for verification
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// PROJECTION
// ============================================================================

#[test]
fn test_gl_projection_depth_range() {
    let config = Config::default();
    let projection = gl_projection(&config, Extent2D::new(800, 600));

    let near = projection * Vec4::new(0.0, 0.0, -config.near_plane, 1.0);
    let far = projection * Vec4::new(0.0, 0.0, -config.far_plane, 1.0);

    assert!((near.z / near.w + 1.0).abs() < 1e-4);
    assert!((far.z / far.w - 1.0).abs() < 1e-4);
}

#[test]
fn test_gl_projection_y_up() {
    let projection = gl_projection(&Config::default(), Extent2D::new(800, 600));
    let above = projection * Vec4::new(0.0, 1.0, -5.0, 1.0);

    assert!(above.y / above.w > 0.0);
}

#[test]
fn test_gl_projection_zero_area_is_finite() {
    let projection = gl_projection(&Config::default(), Extent2D::new(0, 0));
    assert!(projection.is_finite());
}

// ============================================================================
// INITIALIZATION
// ============================================================================

#[test]
#[serial]
fn test_init_failed_logs_before_returning() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Log::set_logger(CaptureLogger { entries: entries.clone() });

    let error = init_failed("OpenGL 3.3 or newer required, context is 2.1".to_string());
    Log::reset_logger();

    assert_eq!(
        error,
        Error::InitializationFailed("OpenGL 3.3 or newer required, context is 2.1".to_string())
    );
    let captured = entries.lock().unwrap();
    assert!(captured.iter().any(|entry| {
        entry.severity == LogSeverity::Error && entry.source == "tandem::gl" && entry.message.contains("context is 2.1")
    }));
}
