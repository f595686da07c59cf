use super::*;
use crate::error::Error;

#[test]
fn test_same_name_returns_cached_image_without_upload() {
    let mut cache: ImageCache<u32> = ImageCache::new();
    let extent = Extent2D::new(2, 2);

    let first = cache.get_or_upload("crate.png", extent, || Ok((7, 2))).unwrap();
    let second = cache
        .get_or_upload("crate.png", extent, || panic!("cached image uploaded again"))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(cache.upload_count(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(first).unwrap().gpu, 7);
}

#[test]
fn test_distinct_names_upload_separately() {
    let mut cache: ImageCache<u32> = ImageCache::new();
    let a = cache.get_or_upload("a", Extent2D::new(1, 1), || Ok((1, 1))).unwrap();
    let b = cache.get_or_upload("b", Extent2D::new(1, 1), || Ok((2, 1))).unwrap();

    assert_ne!(a, b);
    assert_eq!(cache.upload_count(), 2);
}

#[test]
fn test_failed_upload_is_not_cached() {
    let mut cache: ImageCache<u32> = ImageCache::new();
    let result = cache.get_or_upload("broken", Extent2D::new(1, 1), || Err(Error::OutOfMemory));

    assert_eq!(result, Err(Error::OutOfMemory));
    assert!(cache.lookup("broken").is_none());
    assert_eq!(cache.upload_count(), 0);
}

#[test]
fn test_clear_invalidates_handles() {
    let mut cache: ImageCache<u32> = ImageCache::new();
    let h = cache.get_or_upload("a", Extent2D::new(1, 1), || Ok((1, 1))).unwrap();

    let removed = cache.clear();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].name, "a");
    assert!(cache.get(h).is_err());
    assert!(cache.lookup("a").is_none());

    // Uploading again after a clear is a new upload
    cache.get_or_upload("a", Extent2D::new(1, 1), || Ok((1, 1))).unwrap();
    assert_eq!(cache.upload_count(), 2);
}

#[test]
fn test_image_payload_checks() {
    assert!(check_image_payload(2, 2, 4, &[0u8; 16]).is_ok());
    assert!(matches!(check_image_payload(2, 2, 3, &[0u8; 12]), Err(Error::PreconditionFailed(_))));
    assert!(matches!(check_image_payload(2, 2, 4, &[0u8; 15]), Err(Error::PreconditionFailed(_))));
    assert!(matches!(check_image_payload(0, 2, 4, &[]), Err(Error::PreconditionFailed(_))));
}
