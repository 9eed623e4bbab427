use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::StartupError;

pub const CONFIG_PATH_VAR: &str = "PLANTGUARD_CONFIG";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub image: ImageConfig,
    pub storage: StorageConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub backend: ModelBackend,
    pub activation: OutputActivation,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model/model.onnx"),
            backend: ModelBackend::Onnx,
            activation: OutputActivation::Probabilities,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    Onnx,
    Torch,
}

impl ModelBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "onnx" => Some(ModelBackend::Onnx),
            "torch" | "torchscript" => Some(ModelBackend::Torch),
            _ => None,
        }
    }
}

/// What the last layer of the network emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputActivation {
    Probabilities,
    Logits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// `[height, width]` the network was trained on.
    pub size: [u32; 2],
    pub channels: u32,
    pub normalization: Normalization,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size: [224, 224],
            channels: 3,
            normalization: Normalization::Inception,
        }
    }
}

impl ImageConfig {
    pub fn height(&self) -> u32 {
        self.size[0]
    }

    pub fn width(&self) -> u32 {
        self.size[1]
    }

    /// Shape of the tensor handed to the classifier, batch first.
    pub fn tensor_shape(&self) -> [usize; 4] {
        [
            1,
            self.height() as usize,
            self.width() as usize,
            self.channels as usize,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// `x / 127.5 - 1`, range `[-1, 1]`.
    Inception,
    /// `x / 255`, range `[0, 1]`.
    Unit,
    /// Raw intensities, range `[0, 255]`.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("static/uploads"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Alternative advisory document; the embedded one is used when unset.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Defaults, then the YAML file named by `PLANTGUARD_CONFIG`, then
    /// individual environment overrides.
    pub fn load() -> Result<Self, StartupError> {
        let mut config = match env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            StartupError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, StartupError> {
        serde_yaml::from_str(config_str).map_err(|e| StartupError::Config(e.to_string()))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| StartupError::Config(format!("invalid PORT: {}", port)))?;
        }
        if let Some(path) = lookup("MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(backend) = lookup("MODEL_BACKEND") {
            self.model.backend = ModelBackend::parse(&backend).ok_or_else(|| {
                StartupError::Config(format!("unknown MODEL_BACKEND: {}", backend))
            })?;
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("CLASSES_PATH") {
            self.registry.path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if self.image.channels != 3 {
            return Err(StartupError::Config(format!(
                "image.channels must be 3 (RGB), got {}",
                self.image.channels
            )));
        }
        if self.image.height() == 0 || self.image.width() == 0 {
            return Err(StartupError::Config(format!(
                "image.size must be non-zero, got {:?}",
                self.image.size
            )));
        }
        if self.storage.upload_dir.as_os_str().is_empty() {
            return Err(StartupError::Config("storage.upload_dir is empty".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
