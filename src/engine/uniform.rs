// Per-entity uniform blocks and the device buffer that holds them.
//
// The pool writes every active entity's block inside one `write_blocks`
// scope per frame (map once, write many, unmap once). Draw later binds each
// entity's window of the same buffer through a dynamic offset. Because the
// mapping only exists inside the closure, a draw can never observe the
// buffer while it is still mapped.

use std::cell::RefCell;
use std::num::NonZeroU64;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec4};

use super::error::{EngineError, UploadError};

/// Uniform payload of one entity. Byte layout matches `EntityBlock` in
/// `shader_entity.wgsl`:
///   mvp    mat4x4<f32>  @ 0
///   model  mat4x4<f32>  @ 64
///   normal mat3x3<f32>  @ 128 (three 16-byte columns)
///   color  vec4<f32>    @ 176
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EntityUniforms {
    pub mvp: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    pub color: [f32; 4],
}

impl EntityUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(model: Mat4, view: Mat4, proj: Mat4, normal: Mat3, color: Vec4) -> Self {
        Self {
            mvp: (proj * view * model).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            normal: [
                normal.x_axis.extend(0.0).to_array(),
                normal.y_axis.extend(0.0).to_array(),
                normal.z_axis.extend(0.0).to_array(),
            ],
            color: color.to_array(),
        }
    }
}

/// Round `block_size` up to the next multiple of `alignment`.
pub fn aligned_stride(block_size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    block_size.div_ceil(alignment) * alignment
}

/// Storage for the per-entity uniform blocks of one pool.
pub trait UniformStore {
    /// Bytes a single entity may use.
    fn block_size(&self) -> u64;
    /// Distance in bytes between consecutive slots' blocks.
    fn stride(&self) -> u64;
    /// Number of slot blocks the store can hold.
    fn capacity(&self) -> usize;
    /// Map the whole store once and let `write` fill any blocks it likes.
    /// The store is unmapped when this returns.
    fn write_blocks(&mut self, write: &mut dyn FnMut(&mut [u8])) -> Result<(), UploadError>;
}

/// Bind group layout and bind group through which draws see the entity blocks.
pub struct EntityBlockBinding {
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    pub block_size: u64,
}

/// Device-resident uniform buffer holding one block per pool slot.
pub struct WgpuUniformBuffer {
    name: String,
    queue: Arc<wgpu::Queue>,
    buffer: wgpu::Buffer,
    block_size: u64,
    stride: u64,
    capacity: usize,
}

impl WgpuUniformBuffer {
    /// Create a buffer of `max_entity_count` blocks visible at `binding`.
    ///
    /// The stride is `block_size` rounded up to the device's dynamic offset
    /// alignment. Fails if the device rejects the allocation.
    pub fn create(
        device: &wgpu::Device,
        queue: Arc<wgpu::Queue>,
        max_entity_count: usize,
        block_size: u64,
        binding: u32,
        name: &str,
    ) -> Result<(Self, EntityBlockBinding), EngineError> {
        let limits = device.limits();
        let stride = aligned_stride(block_size, limits.min_uniform_buffer_offset_alignment as u64);
        let size = stride * max_entity_count as u64;

        let fail = |reason: String| EngineError::GpuBuffer {
            name: name.to_string(),
            reason,
        };
        let Some(min_binding_size) = NonZeroU64::new(block_size) else {
            return Err(fail("block size is zero".into()));
        };
        if size == 0 {
            return Err(fail("buffer has no slots".into()));
        }
        if size > limits.max_buffer_size {
            return Err(fail(format!(
                "{size} bytes exceeds max_buffer_size {}",
                limits.max_buffer_size
            )));
        }
        if block_size > limits.max_uniform_buffer_binding_size as u64 {
            return Err(fail(format!(
                "block of {block_size} bytes exceeds max_uniform_buffer_binding_size {}",
                limits.max_uniform_buffer_binding_size
            )));
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("entity_block_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: Some(min_binding_size),
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("entity_block_bind_group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: Some(min_binding_size),
                }),
            }],
        });

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            return Err(fail(err.to_string()));
        }

        log::info!(
            "Uniform buffer '{name}': {max_entity_count} blocks x {stride} bytes (block {block_size}, binding {binding})"
        );

        Ok((
            Self {
                name: name.to_string(),
                queue,
                buffer,
                block_size,
                stride,
                capacity: max_entity_count,
            },
            EntityBlockBinding {
                layout,
                bind_group,
                block_size,
            },
        ))
    }
}

impl UniformStore for WgpuUniformBuffer {
    fn block_size(&self) -> u64 {
        self.block_size
    }

    fn stride(&self) -> u64 {
        self.stride
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn write_blocks(&mut self, write: &mut dyn FnMut(&mut [u8])) -> Result<(), UploadError> {
        let Some(size) = wgpu::BufferSize::new(self.buffer.size()) else {
            return Ok(());
        };
        let mut view = self
            .queue
            .write_buffer_with(&self.buffer, 0, size)
            .ok_or_else(|| UploadError::MapFailed {
                name: self.name.clone(),
            })?;
        write(&mut *view);
        // Dropping the view schedules the copy into the buffer.
        drop(view);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct HostState {
    bytes: Vec<u8>,
    mapped: bool,
    map_count: u32,
}

/// CPU-resident store with the same layout rules as the device buffer.
///
/// Clones share memory, so a caller can keep one to inspect what the pool
/// wrote. Used for headless runs and tests.
#[derive(Debug, Clone)]
pub struct HostUniformBuffer {
    state: Rc<RefCell<HostState>>,
    block_size: u64,
    stride: u64,
    capacity: usize,
}

impl HostUniformBuffer {
    pub fn new(capacity: usize, block_size: u64, alignment: u64) -> Self {
        let stride = aligned_stride(block_size, alignment);
        let state = HostState {
            bytes: vec![0; stride as usize * capacity],
            ..Default::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            block_size,
            stride,
            capacity,
        }
    }

    /// Copy of the block at `offset`.
    pub fn block(&self, offset: u64) -> Vec<u8> {
        let state = self.state.borrow();
        let start = offset as usize;
        state.bytes[start..start + self.block_size as usize].to_vec()
    }

    /// Decode the entity payload stored at `offset`.
    pub fn uniforms_at(&self, offset: u64) -> EntityUniforms {
        let state = self.state.borrow();
        let start = offset as usize;
        bytemuck::pod_read_unaligned(&state.bytes[start..start + EntityUniforms::SIZE as usize])
    }

    /// How many times the store has been mapped.
    pub fn map_count(&self) -> u32 {
        self.state.borrow().map_count
    }

    pub fn is_mapped(&self) -> bool {
        self.state.borrow().mapped
    }
}

impl UniformStore for HostUniformBuffer {
    fn block_size(&self) -> u64 {
        self.block_size
    }

    fn stride(&self) -> u64 {
        self.stride
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn write_blocks(&mut self, write: &mut dyn FnMut(&mut [u8])) -> Result<(), UploadError> {
        let mut state = self.state.borrow_mut();
        state.mapped = true;
        state.map_count += 1;
        write(state.bytes.as_mut_slice());
        state.mapped = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn payload_matches_shader_layout() {
        assert_eq!(EntityUniforms::SIZE, 192);
        assert_eq!(std::mem::offset_of!(EntityUniforms, model), 64);
        assert_eq!(std::mem::offset_of!(EntityUniforms, normal), 128);
        assert_eq!(std::mem::offset_of!(EntityUniforms, color), 176);
    }

    #[test]
    fn stride_rounds_up_to_alignment() {
        assert_eq!(aligned_stride(192, 256), 256);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(257, 256), 512);
        assert_eq!(aligned_stride(192, 0), 192);
    }

    #[test]
    fn mvp_combines_projection_view_model() {
        let model = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let view = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        let proj = Mat4::from_scale(Vec3::splat(2.0));
        let u = EntityUniforms::new(model, view, proj, Mat3::from_quat(Quat::IDENTITY), Vec4::ONE);
        let mvp = Mat4::from_cols_array_2d(&u.mvp);
        let p = mvp.transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(2.0, 4.0, 0.0), 1e-6));
        assert_eq!(u.normal[0], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn host_store_maps_inside_scope_only() {
        let mut store = HostUniformBuffer::new(4, EntityUniforms::SIZE, 256);
        let host = store.clone();
        assert_eq!(store.stride(), 256);
        assert_eq!(store.capacity(), 4);

        store
            .write_blocks(&mut |bytes: &mut [u8]| {
                assert_eq!(bytes.len(), 1024);
                bytes[256..260].copy_from_slice(&[1, 2, 3, 4]);
            })
            .unwrap();

        assert!(!host.is_mapped());
        assert_eq!(host.map_count(), 1);
        assert_eq!(&host.block(256)[..4], &[1, 2, 3, 4]);
        assert!(host.block(0).iter().all(|&b| b == 0));
    }
}
