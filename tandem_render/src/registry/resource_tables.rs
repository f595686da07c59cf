/// ResourceTables - the per-device set of registries
///
/// Both backends own one of these, parameterized by their GPU object types.
/// All handle validation (liveness, usage class, stride agreement, pipeline
/// compatibility) happens here so the backends only deal with GPU calls.

use glam::{Mat4, Vec3};

use crate::device::command_recorder::GpuTypes;
use crate::device::types::{BufferUsage, IndexType, VertexLayout};
use crate::error::Result;
use crate::registry::handle::{BufferHandle, DescriptorsHandle, GeometryHandle, ImageHandle, PipelineHandle};
use crate::registry::image_cache::{ImageCache, ImageRecord};
use crate::registry::registry::Registry;
use crate::{render_precondition, render_warn};

/// A device buffer with its element description
pub struct BufferRecord<B> {
    pub usage: BufferUsage,
    pub stride: u32,
    pub count: u32,
    pub gpu: B,
}

/// A compiled pipeline with the layout derived from its attribute schema
pub struct PipelineRecord<P> {
    pub layout: VertexLayout,
    pub gpu: P,
}

/// Texture + tint bound for one drawable. The tint travels in push constants.
pub struct DescriptorsRecord<D> {
    pub pipeline: PipelineHandle,
    pub image: ImageHandle,
    pub color: Vec3,
    pub gpu: D,
}

pub struct GeometryRecord<V> {
    pub pipeline: PipelineHandle,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    pub index_type: IndexType,
    /// Backend vertex input state (a vertex array object on the immediate-mode backend)
    pub gpu: V,
}

/// What `destroy_geometry` takes out of the tables
pub struct RemovedGeometry<T: GpuTypes> {
    pub geometry: GeometryRecord<T::VertexInput>,
    pub vertex_buffer: Option<BufferRecord<T::Buffer>>,
    pub index_buffer: Option<BufferRecord<T::Buffer>>,
}

/// Validated inputs for building a geometry's backend vertex input
pub struct GeometryPlan<'a, T: GpuTypes> {
    pub pipeline: &'a PipelineRecord<T::Pipeline>,
    pub vertex_buffer: &'a BufferRecord<T::Buffer>,
    pub index_buffer: &'a BufferRecord<T::Buffer>,
    pub index_type: IndexType,
}

/// One fully resolved draw
pub struct ResolvedDraw<'a, T: GpuTypes> {
    pub model: Mat4,
    pub geometry: &'a GeometryRecord<T::VertexInput>,
    pub vertex_buffer: &'a BufferRecord<T::Buffer>,
    pub index_buffer: &'a BufferRecord<T::Buffer>,
    pub descriptors: &'a DescriptorsRecord<T::Descriptors>,
}

/// A batch whose every handle has been checked
pub struct ResolvedBatch<'a, T: GpuTypes> {
    pub view: Mat4,
    pub pipeline: &'a PipelineRecord<T::Pipeline>,
    pub draws: Vec<ResolvedDraw<'a, T>>,
}

pub struct ResourceTables<T: GpuTypes> {
    pub buffers: Registry<BufferHandle, BufferRecord<T::Buffer>>,
    pub pipelines: Registry<PipelineHandle, PipelineRecord<T::Pipeline>>,
    pub descriptors: Registry<DescriptorsHandle, DescriptorsRecord<T::Descriptors>>,
    pub geometries: Registry<GeometryHandle, GeometryRecord<T::VertexInput>>,
    pub images: ImageCache<T::Image>,
}

impl<T: GpuTypes> Default for ResourceTables<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: GpuTypes> ResourceTables<T> {
    pub fn new() -> Self {
        Self {
            buffers: Registry::new("buffer"),
            pipelines: Registry::new("pipeline"),
            descriptors: Registry::new("descriptors"),
            geometries: Registry::new("geometry"),
            images: ImageCache::new(),
        }
    }

    // ===== BUFFERS =====

    /// Validate a buffer payload before anything is allocated
    pub fn check_buffer_payload(usage: BufferUsage, stride: u32, count: u32, data: &[u8]) -> Result<()> {
        if stride == 0 || count == 0 {
            return Err(render_precondition!(
                "tandem::buffers",
                "Buffer needs a non-zero stride and count (stride {}, count {})",
                stride, count
            ));
        }
        if usage == BufferUsage::Index && IndexType::from_stride(stride).is_none() {
            return Err(render_precondition!(
                "tandem::buffers",
                "Index buffer stride must be 2 or 4 bytes, got {}",
                stride
            ));
        }
        let expected = stride as u64 * count as u64;
        if data.len() as u64 != expected {
            return Err(render_precondition!(
                "tandem::buffers",
                "Buffer payload is {} bytes, expected {} (stride {} x count {})",
                data.len(), expected, stride, count
            ));
        }
        Ok(())
    }

    // ===== PIPELINES =====

    /// Remove a pipeline and every descriptor set created against it
    pub fn remove_pipeline(
        &mut self,
        handle: PipelineHandle,
    ) -> Result<(PipelineRecord<T::Pipeline>, Vec<DescriptorsRecord<T::Descriptors>>)> {
        let pipeline = self.pipelines.release(handle)?;
        let orphans = self.descriptors.release_where(|d| d.pipeline == handle);
        if !orphans.is_empty() {
            render_warn!(
                "tandem::pipelines",
                "Destroying pipeline {:?} also dropped {} descriptor set(s)",
                handle, orphans.len()
            );
        }
        Ok((pipeline, orphans))
    }

    // ===== DESCRIPTORS =====

    /// Check that a pipeline and image are live before allocating a descriptor set
    pub fn check_descriptors(
        &self,
        pipeline: PipelineHandle,
        image: ImageHandle,
    ) -> Result<(&PipelineRecord<T::Pipeline>, &ImageRecord<T::Image>)> {
        Ok((self.pipelines.get(pipeline)?, self.images.get(image)?))
    }

    /// Empty the image cache, dropping descriptor sets that sampled those images
    pub fn remove_all_images(&mut self) -> (Vec<ImageRecord<T::Image>>, Vec<DescriptorsRecord<T::Descriptors>>) {
        let orphans = self.descriptors.drain();
        if !orphans.is_empty() {
            render_warn!(
                "tandem::images",
                "Destroying all images also dropped {} descriptor set(s)",
                orphans.len()
            );
        }
        (self.images.clear(), orphans)
    }

    // ===== GEOMETRY =====

    /// Validate a (pipeline, vertex buffer, index buffer) triple
    pub fn plan_geometry(
        &self,
        pipeline: PipelineHandle,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
    ) -> Result<GeometryPlan<'_, T>> {
        let pipeline_record = self.pipelines.get(pipeline)?;
        let vbo = self.buffers.get(vertex_buffer)?;
        let ebo = self.buffers.get(index_buffer)?;

        if vbo.usage != BufferUsage::Vertex {
            return Err(render_precondition!(
                "tandem::geometry",
                "Buffer {:?} was created as {:?}, not Vertex",
                vertex_buffer, vbo.usage
            ));
        }
        if ebo.usage != BufferUsage::Index {
            return Err(render_precondition!(
                "tandem::geometry",
                "Buffer {:?} was created as {:?}, not Index",
                index_buffer, ebo.usage
            ));
        }
        if vbo.stride != pipeline_record.layout.stride() {
            return Err(render_precondition!(
                "tandem::geometry",
                "Vertex buffer stride {} does not match pipeline vertex stride {}",
                vbo.stride, pipeline_record.layout.stride()
            ));
        }
        let index_type = IndexType::from_stride(ebo.stride).ok_or_else(|| {
            render_precondition!("tandem::geometry", "Index buffer stride {} is not 2 or 4", ebo.stride)
        })?;

        Ok(GeometryPlan {
            pipeline: pipeline_record,
            vertex_buffer: vbo,
            index_buffer: ebo,
            index_type,
        })
    }

    /// Remove a geometry together with both of its buffers
    pub fn remove_geometry(&mut self, handle: GeometryHandle) -> Result<RemovedGeometry<T>> {
        let geometry = self.geometries.release(handle)?;

        let vertex_buffer = self.buffers.release(geometry.vertex_buffer).ok();
        let index_buffer = self.buffers.release(geometry.index_buffer).ok();
        if vertex_buffer.is_none() || index_buffer.is_none() {
            render_warn!(
                "tandem::geometry",
                "Geometry {:?} referenced a buffer that was already destroyed",
                handle
            );
        }

        Ok(RemovedGeometry {
            geometry,
            vertex_buffer,
            index_buffer,
        })
    }

    // ===== BATCH =====

    /// Validate a `render` batch and resolve every handle.
    ///
    /// Fails before anything is recorded: on mismatched array lengths, on any
    /// dead handle, or on descriptors that belong to another pipeline.
    pub fn resolve_batch<'a>(
        &'a self,
        view: &Mat4,
        pipeline: PipelineHandle,
        transforms: &[Mat4],
        geometries: &[GeometryHandle],
        descriptors: &[DescriptorsHandle],
    ) -> Result<ResolvedBatch<'a, T>> {
        if transforms.len() != geometries.len() || geometries.len() != descriptors.len() {
            return Err(render_precondition!(
                "tandem::render",
                "render() needs parallel arrays: {} transforms, {} geometries, {} descriptors",
                transforms.len(), geometries.len(), descriptors.len()
            ));
        }

        let pipeline_record = self.pipelines.get(pipeline)?;

        let mut draws = Vec::with_capacity(transforms.len());
        for ((model, &geometry), &descriptor) in transforms.iter().zip(geometries).zip(descriptors) {
            let geometry_record = self.geometries.get(geometry)?;
            let descriptors_record = self.descriptors.get(descriptor)?;

            if descriptors_record.pipeline != pipeline {
                return Err(render_precondition!(
                    "tandem::render",
                    "Descriptors {:?} were created for pipeline {:?}, not {:?}",
                    descriptor, descriptors_record.pipeline, pipeline
                ));
            }

            let vertex_buffer = self.buffers.get(geometry_record.vertex_buffer)?;
            if vertex_buffer.stride != pipeline_record.layout.stride() {
                return Err(render_precondition!(
                    "tandem::render",
                    "Geometry {:?} has vertex stride {}, pipeline expects {}",
                    geometry, vertex_buffer.stride, pipeline_record.layout.stride()
                ));
            }

            draws.push(ResolvedDraw {
                model: *model,
                geometry: geometry_record,
                vertex_buffer,
                index_buffer: self.buffers.get(geometry_record.index_buffer)?,
                descriptors: descriptors_record,
            });
        }

        Ok(ResolvedBatch {
            view: *view,
            pipeline: pipeline_record,
            draws,
        })
    }

    /// Empty every table (device teardown)
    pub fn clear(&mut self) {
        self.geometries.drain();
        self.descriptors.drain();
        self.pipelines.drain();
        self.buffers.drain();
        self.images.clear();
    }
}

#[cfg(test)]
#[path = "resource_tables_tests.rs"]
mod tests;
