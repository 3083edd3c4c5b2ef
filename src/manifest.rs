//! Precache manifest
//!
//! The manifest is the closed list of app-shell assets that must be cached
//! before a generation may become current. It is produced at build time
//! from the bundler output and stored next to it as `precache.toml`:
//!
//! ```toml
//! [generation]
//! app = "assistant"
//! version = "1.0.0"
//! built_at = 1700000000000
//!
//! [precache]
//! assets = ["./", "./index.html", "./assets/index-3f2a.js"]
//! ```

use crate::error::{OffcacheError, OffcacheResult};
use crate::generation::Generation;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

/// File name of the manifest written into the build output
pub const MANIFEST_FILE: &str = "precache.toml";

/// Entries every build precaches regardless of bundler output
const STATIC_ENTRIES: &[&str] = &[
    "./",
    "./index.html",
    "./manifest.json",
    "./icons/icon-192.svg",
    "./icons/icon-512.svg",
];

/// Bundler output extensions that belong to the app shell
const ASSET_EXTENSIONS: &[&str] = &["js", "css", "wasm"];

/// Ordered, de-duplicated list of app-shell asset paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Manifest {
    entries: Vec<String>,
}

impl From<Vec<String>> for Manifest {
    fn from(entries: Vec<String>) -> Self {
        Self::new(entries)
    }
}

impl From<Manifest> for Vec<String> {
    fn from(manifest: Manifest) -> Self {
        manifest.entries
    }
}

impl Manifest {
    /// Build a manifest, keeping the first occurrence of each path
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .map(Into::into)
            .filter(|entry: &String| seen.insert(entry.clone()))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry against the worker scope
    pub fn resolve(&self, scope: &Url) -> OffcacheResult<Vec<(String, Url)>> {
        self.entries
            .iter()
            .map(|entry| {
                if entry.trim().is_empty() {
                    return Err(OffcacheError::invalid_url(entry, "empty manifest entry"));
                }
                let url = scope
                    .join(entry)
                    .map_err(|e| OffcacheError::invalid_url(entry, e))?;
                Ok((entry.clone(), url))
            })
            .collect()
    }

    /// Generate the manifest from a bundler output directory
    ///
    /// Static entries come first, then every `*.js`, `*.css` and `*.wasm`
    /// file directly under `<dist>/assets`, sorted by name. Source maps are
    /// never precached.
    pub async fn from_build_dir(dist: &Path) -> OffcacheResult<Self> {
        let assets_dir = dist.join("assets");
        if !assets_dir.is_dir() {
            return Err(OffcacheError::BuildOutputMissing(assets_dir));
        }

        let mut dir = tokio::fs::read_dir(&assets_dir).await.map_err(|e| {
            OffcacheError::io(format!("reading {}", assets_dir.display()), e)
        })?;

        let mut assets = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| OffcacheError::io(format!("reading {}", assets_dir.display()), e))?
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let keep = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ASSET_EXTENSIONS.contains(&ext));
            if let (true, Some(name)) = (keep, path.file_name().and_then(|n| n.to_str())) {
                assets.push(format!("./assets/{}", name));
            }
        }
        assets.sort();

        Ok(Self::new(
            STATIC_ENTRIES.iter().map(|s| s.to_string()).chain(assets),
        ))
    }
}

/// `[precache]` section of `precache.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrecacheSection {
    #[serde(default)]
    pub assets: Manifest,
}

/// Contents of `precache.toml`: the build's generation and its manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub generation: Generation,
    pub precache: PrecacheSection,
}

impl BuildManifest {
    pub fn new(generation: Generation, manifest: Manifest) -> Self {
        Self {
            generation,
            precache: PrecacheSection { assets: manifest },
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.precache.assets
    }

    /// Default location inside a build output directory
    pub fn path_in(dist: &Path) -> PathBuf {
        dist.join(MANIFEST_FILE)
    }

    /// Parse a manifest from a TOML string
    pub fn parse(content: &str, path: &Path) -> OffcacheResult<Self> {
        let parsed: Self = toml::from_str(content).map_err(|e| OffcacheError::ManifestInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(bad) = parsed.manifest().entries().iter().find(|e| e.trim().is_empty()) {
            return Err(OffcacheError::ManifestInvalid {
                path: path.to_path_buf(),
                reason: format!("empty asset entry {:?}", bad),
            });
        }
        Ok(parsed)
    }

    pub async fn load(path: &Path) -> OffcacheResult<Self> {
        if !path.exists() {
            return Err(OffcacheError::PathNotFound(path.to_path_buf()));
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| OffcacheError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&content, path)
    }

    pub async fn save(&self, path: &Path) -> OffcacheResult<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| OffcacheError::io(format!("writing {}", path.display()), e))
    }
}
