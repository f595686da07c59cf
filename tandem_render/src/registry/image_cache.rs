/// ImageCache - device images cached by name
///
/// A name that is already cached resolves to the existing image; the upload
/// closure is not run again.

use rustc_hash::FxHashMap;

use crate::device::types::{Extent2D, IMAGE_CHANNELS};
use crate::error::Result;
use crate::registry::handle::ImageHandle;
use crate::registry::registry::Registry;
use crate::{render_debug, render_precondition};

/// A cached image and its backend object
pub struct ImageRecord<I> {
    pub name: String,
    pub extent: Extent2D,
    pub mip_levels: u32,
    pub gpu: I,
}

pub struct ImageCache<I> {
    images: Registry<ImageHandle, ImageRecord<I>>,
    by_name: FxHashMap<String, ImageHandle>,
    uploads: u64,
}

impl<I> Default for ImageCache<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> ImageCache<I> {
    pub fn new() -> Self {
        Self {
            images: Registry::new("image"),
            by_name: FxHashMap::default(),
            uploads: 0,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<ImageHandle> {
        self.by_name.get(name).copied()
    }

    /// Return the cached image for `name`, or run `upload` and cache its result.
    ///
    /// `upload` yields the backend image and its mip level count.
    pub fn get_or_upload<F>(&mut self, name: &str, extent: Extent2D, upload: F) -> Result<ImageHandle>
    where
        F: FnOnce() -> Result<(I, u32)>,
    {
        if let Some(handle) = self.lookup(name) {
            render_debug!("tandem::images", "Image '{}' served from cache", name);
            return Ok(handle);
        }

        let (gpu, mip_levels) = upload()?;
        self.uploads += 1;

        let handle = self.images.register(ImageRecord {
            name: name.to_string(),
            extent,
            mip_levels,
            gpu,
        });
        self.by_name.insert(name.to_string(), handle);
        Ok(handle)
    }

    pub fn get(&self, handle: ImageHandle) -> Result<&ImageRecord<I>> {
        self.images.get(handle)
    }

    /// Number of uploads performed (cache misses)
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Drop every image from the cache, returning them for backend teardown
    pub fn clear(&mut self) -> Vec<ImageRecord<I>> {
        self.by_name.clear();
        self.images.drain()
    }
}

/// Validate a raw pixel payload: tightly packed RGBA8, row-major
pub fn check_image_payload(width: u32, height: u32, channels: u32, pixels: &[u8]) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(render_precondition!("tandem::images", "Image has zero size ({}x{})", width, height));
    }
    if channels != IMAGE_CHANNELS {
        return Err(render_precondition!(
            "tandem::images",
            "Images must have {} channels, got {}",
            IMAGE_CHANNELS, channels
        ));
    }
    let expected = width as u64 * height as u64 * channels as u64;
    if pixels.len() as u64 != expected {
        return Err(render_precondition!(
            "tandem::images",
            "Pixel payload is {} bytes, expected {} ({}x{}x{})",
            pixels.len(), expected, width, height, channels
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "image_cache_tests.rs"]
mod tests;
