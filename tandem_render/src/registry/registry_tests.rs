//! Unit tests for registry.rs

use super::*;
use crate::error::Error;
use crate::registry::handle::BufferHandle;
use slotmap::Key;

fn registry() -> Registry<BufferHandle, &'static str> {
    Registry::new("buffer")
}

// ============================================================================
// REGISTER / GET / RELEASE
// ============================================================================

#[test]
fn test_register_and_get() {
    let mut reg = registry();
    let a = reg.register("a");
    let b = reg.register("b");

    assert_ne!(a, b);
    assert_eq!(*reg.get(a).unwrap(), "a");
    assert_eq!(*reg.get(b).unwrap(), "b");
    assert_eq!(reg.len(), 2);
}

#[test]
fn test_release_does_not_disturb_other_handles() {
    let mut reg = registry();
    let a = reg.register("a");
    let b = reg.register("b");
    let c = reg.register("c");

    assert_eq!(reg.release(b).unwrap(), "b");

    assert_eq!(*reg.get(a).unwrap(), "a");
    assert_eq!(*reg.get(c).unwrap(), "c");
    assert_eq!(reg.len(), 2);
}

#[test]
fn test_use_after_release_is_rejected() {
    let mut reg = registry();
    let a = reg.register("a");
    reg.release(a).unwrap();

    assert!(matches!(reg.get(a), Err(Error::InvalidResource(_))));
    assert!(matches!(reg.get_mut(a), Err(Error::InvalidResource(_))));
    assert!(matches!(reg.release(a), Err(Error::InvalidResource(_))));
}

#[test]
fn test_null_handle_is_never_valid() {
    let mut reg = registry();
    reg.register("a");

    let null = BufferHandle::default();
    assert!(null.is_null());
    assert!(reg.get(null).is_err());
    assert!(reg.release(null).is_err());
}

// ============================================================================
// SLOT REUSE
// ============================================================================

#[test]
fn test_recycled_slot_does_not_revive_stale_handle() {
    let mut reg = registry();
    let old = reg.register("old");
    reg.release(old).unwrap();

    let new = reg.register("new");
    assert_ne!(old, new);
    assert!(reg.get(old).is_err());
    assert_eq!(*reg.get(new).unwrap(), "new");
}

#[test]
fn test_churn_does_not_grow_table() {
    let mut reg = registry();
    let keep = reg.register("keep");

    for _ in 0..1000 {
        let h = reg.register("temp");
        reg.release(h).unwrap();
    }

    assert_eq!(reg.len(), 1);
    assert!(reg.capacity() <= 4);
    assert_eq!(*reg.get(keep).unwrap(), "keep");
}

// ============================================================================
// BULK RELEASE
// ============================================================================

#[test]
fn test_release_where_and_drain() {
    let mut reg = registry();
    reg.register("red");
    let blue = reg.register("blue");
    reg.register("rust");

    let removed = reg.release_where(|v| v.starts_with('r'));
    assert_eq!(removed.len(), 2);
    assert_eq!(reg.len(), 1);
    assert!(reg.contains(blue));

    assert_eq!(reg.drain(), vec!["blue"]);
    assert!(reg.is_empty());
}
