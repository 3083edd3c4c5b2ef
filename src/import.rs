//! Import model files from local disk into the model-weights partition
//!
//! Files are stored under the URL the inference pipeline would request from
//! the upstream repository, normalized the same way the router normalizes
//! it, so an imported model is served offline with no download.

use crate::config::schema::{ModelConfig, ModelsConfig};
use crate::error::{OffcacheError, OffcacheResult};
use crate::http::Response;
use crate::normalize::UrlNormalizer;
use crate::store::{CacheKey, CacheStore};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Which pipeline a model serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Vision,
    Tts,
    Asr,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [Self::Vision, Self::Tts, Self::Asr];

    /// Whether bare `.onnx` files belong in the repository's `onnx/` folder
    fn nests_onnx(&self) -> bool {
        matches!(self, Self::Vision | Self::Asr)
    }

    pub fn model<'a>(&self, models: &'a ModelsConfig) -> &'a ModelConfig {
        match self {
            Self::Vision => &models.vision,
            Self::Tts => &models.tts,
            Self::Asr => &models.asr,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Vision => "vision",
            Self::Tts => "tts",
            Self::Asr => "asr",
        };
        f.write_str(label)
    }
}

/// Repository-relative path a local file is published under
pub fn repo_path(kind: ModelKind, file: &str) -> String {
    let file = file.trim_start_matches("./").replace('\\', "/");
    if kind.nests_onnx() && file.ends_with(".onnx") && !file.contains('/') {
        format!("onnx/{}", file)
    } else {
        file
    }
}

/// `{upstream}/{model_id}/resolve/main/{path}`
pub fn target_url(upstream: &Url, model_id: &str, path: &str) -> OffcacheResult<Url> {
    let relative = format!("{}/resolve/main/{}", model_id.trim_matches('/'), path);
    upstream
        .join(&relative)
        .map_err(|e| OffcacheError::invalid_url(relative, e))
}

/// Every regular file under `path`, named relative to it with `/` separators
pub async fn collect_files(path: &Path) -> OffcacheResult<Vec<(String, PathBuf)>> {
    if !path.exists() {
        return Err(OffcacheError::PathNotFound(path.to_path_buf()));
    }
    if path.is_file() {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| OffcacheError::User(format!("Invalid file name: {}", path.display())))?;
        return Ok(vec![(name.to_string(), path.to_path_buf())]);
    }

    let mut files = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| OffcacheError::io(format!("reading {}", dir.display()), e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OffcacheError::io(format!("reading {}", dir.display()), e))?
        {
            let entry_path = entry.path();
            if entry_path.is_dir() {
                pending.push(entry_path);
                continue;
            }
            if let Ok(relative) = entry_path.strip_prefix(path) {
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((name, entry_path));
            }
        }
    }
    files.sort();
    Ok(files)
}

/// One imported file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedFile {
    pub key: String,
    pub bytes: u64,
}

/// Cache state of a configured model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub kind: ModelKind,
    pub id: String,
    /// Entries stored for this model
    pub files: usize,
    /// At least one model weight file is cached
    pub cached: bool,
}

/// Writes local model files into the model-weights partition
pub struct ModelImporter {
    store: Arc<dyn CacheStore>,
    normalizer: UrlNormalizer,
    upstream: Url,
    partition: String,
}

impl ModelImporter {
    pub fn new(
        store: Arc<dyn CacheStore>,
        normalizer: UrlNormalizer,
        upstream: &str,
        partition: impl Into<String>,
    ) -> OffcacheResult<Self> {
        let upstream = Url::parse(upstream).map_err(|e| OffcacheError::invalid_url(upstream, e))?;
        Ok(Self {
            store,
            normalizer,
            upstream,
            partition: partition.into(),
        })
    }

    /// Store one file under the normalized request URL for `name`
    pub async fn import_file(
        &self,
        kind: ModelKind,
        model_id: &str,
        name: &str,
        path: &Path,
    ) -> OffcacheResult<ImportedFile> {
        let url = target_url(&self.upstream, model_id, &repo_path(kind, name))?;
        let key = CacheKey::from_url(&self.normalizer.normalize(&url));

        let body = tokio::fs::read(path)
            .await
            .map_err(|e| OffcacheError::io(format!("reading {}", path.display()), e))?;
        let bytes = body.len() as u64;
        let response = Response::ok(body)
            .with_header("content-type", "application/octet-stream")
            .with_header("content-length", bytes.to_string());

        let handle = self.store.open(&self.partition).await?;
        if let Err(e) = self.store.put(&handle, key.clone(), response).await {
            if let Err(cleanup) = self.store.delete_entry(&handle, &key).await {
                warn!("Removing partial entry {} failed: {}", key, cleanup);
            }
            return Err(e.into());
        }
        debug!("Imported {} as {} ({} bytes)", path.display(), key, bytes);

        Ok(ImportedFile {
            key: key.to_string(),
            bytes,
        })
    }

    /// Import a file or every file under a directory
    pub async fn import_path(
        &self,
        kind: ModelKind,
        model_id: &str,
        path: &Path,
    ) -> OffcacheResult<Vec<ImportedFile>> {
        let files = collect_files(path).await?;
        let mut imported = Vec::with_capacity(files.len());
        for (name, file) in files {
            imported.push(self.import_file(kind, model_id, &name, &file).await?);
        }
        info!("Imported {} file(s) for {} model {}", imported.len(), kind, model_id);
        Ok(imported)
    }

    /// Which configured models have files in the partition
    pub async fn status(&self, models: &ModelsConfig) -> OffcacheResult<Vec<ModelStatus>> {
        let keys = if self.store.has_partition(&self.partition).await? {
            let handle = self.store.open(&self.partition).await?;
            self.store.keys(&handle).await?
        } else {
            Vec::new()
        };

        Ok(ModelKind::ALL
            .iter()
            .map(|kind| {
                let id = kind.model(models).id.clone();
                let needle = format!("/{}/", id);
                let matching: Vec<&CacheKey> =
                    keys.iter().filter(|k| k.as_str().contains(&needle)).collect();
                ModelStatus {
                    kind: *kind,
                    cached: matching.iter().any(|k| k.as_str().contains("model")),
                    files: matching.len(),
                    id,
                }
            })
            .collect())
    }
}
