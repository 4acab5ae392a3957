// Error types for engine startup and the per-frame upload.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no compatible graphics adapter found")]
    NoAdapter,

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to create GPU buffer '{name}': {reason}")]
    GpuBuffer { name: String, reason: String },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Os(#[from] winit::error::OsError),
}

/// Invalid pool construction parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("entity pool capacity must be at least 1")]
    ZeroCapacity,

    #[error("entity pool capacity {0} does not fit 32-bit slot indices")]
    TooLarge(usize),

    #[error("uniform block of {block_size} bytes cannot hold the {required}-byte entity payload")]
    BlockTooSmall { block_size: u64, required: u64 },

    #[error("uniform store holds {capacity} blocks, pool needs {required}")]
    StoreTooSmall { capacity: usize, required: usize },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not map uniform buffer '{name}' for writing")]
    MapFailed { name: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
