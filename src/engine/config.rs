// Game configuration, read from TOML.
//
// Every section and field is optional; anything left out keeps its default.

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "TOROID_BLASTER_CONFIG";
/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "toroid_blaster.toml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub entities: EntityConfig,
    pub frame: FrameConfig,
    pub camera: CameraConfig,
    pub light: LightConfig,
}

impl EngineConfig {
    /// Load from `$TOROID_BLASTER_CONFIG`, else `toroid_blaster.toml`.
    ///
    /// A missing file yields the defaults; a file that exists but cannot be
    /// read or parsed is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::from_file(&path)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot drive a frame.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max_delta = self.frame.max_delta;
        if !max_delta.is_finite() || max_delta <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frame.max_delta must be a positive number of seconds, got {max_delta}"
            )));
        }
        if self.entities.max_entity_count == 0 {
            return Err(ConfigError::Invalid("entities.max_entity_count must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Toroid Blaster".to_string(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityConfig {
    pub max_entity_count: usize,
    /// Shader binding of the per-entity uniform block.
    pub binding: u32,
    pub block_name: String,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            max_entity_count: 1024,
            binding: 0,
            block_name: "VertexData".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameConfig {
    /// Longest step, in seconds, handed to the simulation after a stall.
    pub max_delta: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { max_delta: 0.25 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 20.0, -8.0],
            target: [0.0, 0.0, 12.0],
            up: [0.0, 0.0, 1.0],
            fov_degrees: 45.0,
            near: 1.0,
            far: 200.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightConfig {
    pub ambient: [f32; 3],
    pub position: [f32; 3],
    pub intensity: [f32; 3],
}

impl LightConfig {
    pub fn ambient(&self) -> Vec3 {
        Vec3::from_array(self.ambient)
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn intensity(&self) -> Vec3 {
        Vec3::from_array(self.intensity)
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            ambient: [0.05, 0.1, 0.2],
            position: [40.0, 100.0, 10.0],
            intensity: [12000.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.entities.max_entity_count, 1024);
        assert_eq!(config.entities.block_name, "VertexData");
        assert_eq!(config.window.title, "Toroid Blaster");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [entities]
            max_entity_count = 64

            [camera]
            fov_degrees = 60.0
            "#,
        )
        .unwrap();
        assert_eq!(config.entities.max_entity_count, 64);
        assert_eq!(config.entities.binding, 0);
        assert_eq!(config.camera.fov_degrees, 60.0);
        assert_eq!(config.camera.position, [0.0, 20.0, -8.0]);
        assert_eq!(config.frame.max_delta, 0.25);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml("[window]\ncolour = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn non_positive_max_delta_is_rejected() {
        for text in ["[frame]\nmax_delta = -1.0\n", "[frame]\nmax_delta = 0.0\n", "[frame]\nmax_delta = nan\n"] {
            let err = EngineConfig::from_toml(text).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{text:?}: {err}");
        }
        assert!(EngineConfig::from_toml("[frame]\nmax_delta = 0.1\n").is_ok());
    }

    #[test]
    fn empty_pool_is_rejected() {
        let err = EngineConfig::from_toml("[entities]\nmax_entity_count = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::from_file("/nonexistent/toroid_blaster.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = EngineConfig::default();
        config.light.intensity = [1.0, 2.0, 3.0];
        let text = toml::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }
}
