// Engine module - entity pool, GPU upload and the wgpu front end around it

pub mod buffer;
pub mod camera;
pub mod collision;
pub mod config;
pub mod debug_overlay;
pub mod entity;
pub mod error;
pub mod input;
pub mod link;
pub mod mesh;
pub mod renderer;
pub mod resource;
pub mod uniform;

// Re-export commonly used items
pub use buffer::{EntityBuffer, FrameStats};
pub use camera::Camera;
pub use collision::{Aabb, CollisionHandler};
pub use config::EngineConfig;
pub use entity::{Behavior, Entity, EntityHandle, GroupId, MAX_GROUP_ID};
pub use error::{ConfigError, EngineError, PoolError, UploadError};
pub use input::{GamePad, InputState};
pub use resource::{IndexRange, MeshId, MeshSource, ProgramId, RenderSink, TextureId};
pub use uniform::{EntityUniforms, HostUniformBuffer, UniformStore, WgpuUniformBuffer};
