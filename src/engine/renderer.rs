// wgpu device, surface and the resources entity draws refer to.
//
// Bind group layout used by every program:
//   group(0) entity block (dynamic offset, one window per pool slot)
//   group(1) scene lighting
//   group(2) diffuse texture + sampler
//
// `PassRecorder` is the wgpu side of `RenderSink`: `EntityBuffer::draw`
// feeds it ids and offsets, it turns them into render pass commands.

use std::sync::Arc;

use glam::Vec3;
use winit::window::Window;

use super::config::LightConfig;
use super::error::EngineError;
use super::mesh::{GpuMeshes, GpuVertex, MeshBuffer};
use super::resource::{IndexRange, ProgramId, RenderSink, TextureId};
use super::uniform::EntityBlockBinding;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Opaque, lit with the scene light, writes depth.
pub const PROGRAM_LIT: ProgramId = ProgramId(0);
/// Unlit, alpha blended, depth tested but not written.
pub const PROGRAM_EMISSIVE: ProgramId = ProgramId(1);

const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.0, g: 0.0, b: 0.02, a: 1.0 };

// ============================================================================
// DEVICE + SURFACE
// ============================================================================

pub struct Gpu {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: Arc<wgpu::Queue>,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
}

impl Gpu {
    pub async fn new(window: Arc<Window>) -> Result<Self, EngineError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(EngineError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(EngineError::NoAdapter)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let info = adapter.get_info();
        log::info!("Adapter: {} ({:?}), surface {:?}", info.name, info.backend, surface_format);

        Ok(Self {
            surface,
            device,
            queue: Arc::new(queue),
            config,
            size,
        })
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
}

// ============================================================================
// SCENE UNIFORMS
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniforms {
    ambient: [f32; 4],
    light_position: [f32; 4],
    light_intensity: [f32; 4],
    eye: [f32; 4],
}

impl SceneUniforms {
    fn new(light: &LightConfig, eye: Vec3) -> Self {
        Self {
            ambient: light.ambient().extend(1.0).to_array(),
            light_position: light.position().extend(1.0).to_array(),
            light_intensity: light.intensity().extend(0.0).to_array(),
            eye: eye.extend(1.0).to_array(),
        }
    }
}

// ============================================================================
// TEXTURE IMAGES
// ============================================================================

/// Tightly packed RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    pub fn from_fn(width: u32, height: u32, mut texel: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&texel(x, y));
            }
        }
        Self { width, height, rgba }
    }

    pub fn solid(color: [u8; 4]) -> Self {
        Self::from_fn(1, 1, |_, _| color)
    }

    /// `cells` × `cells` checkerboard.
    pub fn checker(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = (size / cells.max(1)).max(1);
        Self::from_fn(size, size, |x, y| if (x / cell + y / cell) % 2 == 0 { a } else { b })
    }

    /// Horizontal bands alternating every `band` rows.
    pub fn stripes(size: u32, band: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let band = band.max(1);
        Self::from_fn(size, size, |_, y| if (y / band) % 2 == 0 { a } else { b })
    }

    /// White center fading to transparent at the edge.
    pub fn radial_glow(size: u32) -> Self {
        let half = size as f32 * 0.5;
        Self::from_fn(size, size, |x, y| {
            let dx = (x as f32 + 0.5 - half) / half;
            let dy = (y as f32 + 0.5 - half) / half;
            let falloff = (1.0 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
            let v = (falloff * 255.0) as u8;
            [255, v.max(160), v, v]
        })
    }
}

// ============================================================================
// RENDERER
// ============================================================================

pub struct Renderer {
    pub gpu: Gpu,
    depth_view: wgpu::TextureView,
    programs: Vec<wgpu::RenderPipeline>,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    textures: Vec<wgpu::BindGroup>,
    scene_bind_group: wgpu::BindGroup,
    entity_blocks: EntityBlockBinding,
    meshes: GpuMeshes,
}

impl Renderer {
    /// Build the programs around `entity_blocks` and upload `meshes`.
    pub fn new(
        gpu: Gpu,
        entity_blocks: EntityBlockBinding,
        entity_binding: u32,
        meshes: &MeshBuffer,
        light: &LightConfig,
        eye: Vec3,
    ) -> Self {
        use wgpu::util::DeviceExt;
        let device = &gpu.device;

        let scene_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scene_uniforms"),
            contents: bytemuck::bytes_of(&SceneUniforms::new(light, eye)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("diffuse_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let source = include_str!("../shader_entity.wgsl")
            .replace("ENTITY_BINDING", &entity_binding.to_string());
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("entity_shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("entity_pipeline_layout"),
            bind_group_layouts: &[&entity_blocks.layout, &scene_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let format = gpu.config.format;
        // Indexed by ProgramId.
        let programs = vec![
            create_program(device, &layout, &shader, format, "fs_lit", false),
            create_program(device, &layout, &shader, format, "fs_emissive", true),
        ];

        let depth_view = create_depth_view(device, &gpu.config);
        let meshes = meshes.upload(device);

        Self {
            gpu,
            depth_view,
            programs,
            texture_layout,
            sampler,
            textures: Vec::new(),
            scene_bind_group,
            entity_blocks,
            meshes,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.gpu.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.gpu.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.gpu.config.format
    }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.gpu.size
    }

    pub fn aspect(&self) -> f32 {
        self.gpu.aspect()
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gpu.size = new_size;
            self.gpu.config.width = new_size.width;
            self.gpu.config.height = new_size.height;
            self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
            self.depth_view = create_depth_view(&self.gpu.device, &self.gpu.config);
        }
    }

    /// Reconfigure the surface at its current size, after it was lost.
    pub fn reconfigure(&mut self) {
        self.resize(self.gpu.size);
    }

    /// Upload `image` and return the id draws bind it by.
    pub fn add_texture(&mut self, name: &str, image: &TextureImage) -> TextureId {
        let device = &self.gpu.device;
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(name),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(name),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let id = TextureId(self.textures.len() as u32);
        self.textures.push(bind_group);
        log::info!("Texture '{name}' -> {id:?} ({}x{})", image.width, image.height);
        id
    }

    /// Clear color and depth, then let `draw` record entity draws into the pass.
    pub fn render_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        draw: impl FnOnce(&mut PassRecorder<'_, '_>),
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        pass.set_bind_group(1, &self.scene_bind_group, &[]);
        pass.set_vertex_buffer(0, self.meshes.vertex_buffer.slice(..));
        pass.set_index_buffer(self.meshes.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

        let mut recorder = PassRecorder {
            pass: &mut pass,
            renderer: self,
            program: None,
            texture: None,
            ready: false,
        };
        draw(&mut recorder);
    }
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size: wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_program(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    fragment_entry: &str,
    emissive: bool,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(fragment_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[GpuVertex::desc()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(if emissive {
                    wgpu::BlendState::ALPHA_BLENDING
                } else {
                    wgpu::BlendState::REPLACE
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if emissive { None } else { Some(wgpu::Face::Back) },
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: !emissive,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

// ============================================================================
// PASS RECORDER
// ============================================================================

/// Records entity draws into an open render pass.
///
/// Redundant program and texture binds are skipped. A draw after binding an
/// unknown program or texture is dropped.
pub struct PassRecorder<'a, 'p> {
    pass: &'a mut wgpu::RenderPass<'p>,
    renderer: &'a Renderer,
    program: Option<ProgramId>,
    texture: Option<TextureId>,
    ready: bool,
}

impl RenderSink for PassRecorder<'_, '_> {
    fn bind_program(&mut self, program: ProgramId) {
        if self.program == Some(program) {
            return;
        }
        self.program = Some(program);
        match self.renderer.programs.get(program.0 as usize) {
            Some(pipeline) => self.pass.set_pipeline(pipeline),
            None => log::trace!("Unknown program {program:?}"),
        }
    }

    fn bind_texture(&mut self, texture: TextureId) {
        if self.texture == Some(texture) {
            return;
        }
        self.texture = Some(texture);
        match self.renderer.textures.get(texture.0 as usize) {
            Some(bind_group) => self.pass.set_bind_group(2, bind_group, &[]),
            None => log::trace!("Unknown texture {texture:?}"),
        }
    }

    fn bind_entity_block(&mut self, offset: u64, size: u64) {
        debug_assert_eq!(
            size, self.renderer.entity_blocks.block_size,
            "entity block bound with a size other than the binding's"
        );
        let known_program = self
            .program
            .is_some_and(|p| (p.0 as usize) < self.renderer.programs.len());
        let known_texture = self
            .texture
            .is_some_and(|t| (t.0 as usize) < self.renderer.textures.len());
        self.ready = known_program && known_texture;
        self.pass
            .set_bind_group(0, &self.renderer.entity_blocks.bind_group, &[offset as u32]);
    }

    fn draw_indexed(&mut self, range: IndexRange) {
        if self.ready {
            self.pass.draw_indexed(range.indices(), range.base_vertex, 0..1);
        }
    }
}
