//! Configuration schema for offcache
//!
//! Configuration is stored at `~/.config/offcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// The app whose shell is precached
    pub app: AppConfig,

    /// Fixed partition names
    pub partitions: PartitionConfig,

    /// Upstream model repository mirror
    pub mirror: MirrorConfig,

    /// Network client settings
    pub network: NetworkConfig,

    /// On-disk store settings
    pub storage: StorageConfig,

    /// Models that can be imported from local files
    pub models: ModelsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable lifecycle audit logging
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// App identity and scope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// App name, the prefix of every app-shell partition
    pub name: String,

    /// Semantic version of the current build
    pub version: String,

    /// Origin + path the worker controls; manifest paths resolve against it
    pub scope: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "assistant".to_string(),
            version: "1.0.0".to_string(),
            scope: "http://localhost:5173/".to_string(),
        }
    }
}

/// Long-lived partition names, stable across builds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Opportunistic same-origin cache
    pub runtime: String,

    /// Cross-origin model weight cache
    pub model_weights: String,

    /// Other partitions that activation must never delete
    pub preserved: Vec<String>,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            runtime: "assistant-runtime".to_string(),
            model_weights: "transformers-cache".to_string(),
            preserved: vec!["kokoro-voices".to_string()],
        }
    }
}

/// Mirror rewrite settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Normalize upstream URLs onto the mirror
    pub enabled: bool,

    /// Canonical model repository origin
    pub upstream: String,

    /// Mirror origin used as the cache key host
    pub mirror: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            upstream: "https://huggingface.co".to_string(),
            mirror: "https://hf-mirror.com".to_string(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            user_agent: concat!("offcache/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// On-disk store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store root (defaults to the state directory)
    pub root: Option<PathBuf>,

    /// Total body size limit in MB (0 = unlimited)
    pub quota_mb: u64,
}

impl StorageConfig {
    /// Quota in bytes, if one is set
    pub fn quota_bytes(&self) -> Option<u64> {
        (self.quota_mb > 0).then(|| self.quota_mb * 1024 * 1024)
    }
}

/// Importable models by kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub vision: ModelConfig,
    pub tts: ModelConfig,
    pub asr: ModelConfig,
}

/// One model repository and the files it needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Repository id, e.g. `org/name`
    pub id: String,

    /// Files the pipeline fetches, relative to the repository root
    #[serde(default)]
    pub files: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            vision: ModelConfig {
                id: "HuggingFaceTB/SmolVLM-500M-Instruct".to_string(),
                files: strings(&[
                    "config.json",
                    "preprocessor_config.json",
                    "tokenizer.json",
                    "tokenizer_config.json",
                    "onnx/model.onnx",
                    "onnx/model_fp16.onnx",
                ]),
            },
            tts: ModelConfig {
                id: "onnx-community/Kokoro-82M-v1.0-ONNX".to_string(),
                files: strings(&[
                    "config.json",
                    "tokenizer.json",
                    "tokenizer_config.json",
                    "onnx/model_quantized.onnx",
                ]),
            },
            asr: ModelConfig {
                id: "Xenova/whisper-base".to_string(),
                files: strings(&[
                    "config.json",
                    "preprocessor_config.json",
                    "tokenizer_config.json",
                    "generation_config.json",
                    "vocab.json",
                    "onnx/encoder_model.onnx",
                    "onnx/decoder_model_merged.onnx",
                ]),
            },
        }
    }
}
