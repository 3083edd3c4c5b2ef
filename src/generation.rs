//! App-shell generations and partition naming
//!
//! The "current" app shell is never held in memory. A worker may be torn
//! down and respawned at any time, so the pointer is re-derived from the
//! partition names themselves: `{app}-{version}-{built_at}`, where
//! `built_at` is a millisecond build timestamp unique per deploy.

use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use chrono::{DateTime, TimeZone, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One deployed build of the app shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub app: String,
    pub version: Version,
    /// Build timestamp in milliseconds since the Unix epoch
    pub built_at: i64,
}

impl Generation {
    pub fn new(app: impl Into<String>, version: Version, built_at: i64) -> Self {
        Self {
            app: app.into(),
            version,
            built_at,
        }
    }

    /// A generation for `app` stamped with the current time
    pub fn stamp_now(app: &str, version: &str) -> OffcacheResult<Self> {
        let version = Version::parse(version).map_err(|e| OffcacheError::InvalidVersion {
            value: version.to_string(),
            source: e,
        })?;
        Ok(Self::new(app, version, Utc::now().timestamp_millis()))
    }

    /// Name of the app-shell partition for this generation
    pub fn partition_name(&self) -> String {
        format!("{}-{}-{}", self.app, self.version, self.built_at)
    }

    /// Recover a generation of `app` from a partition name
    ///
    /// Returns `None` for names that belong to another app or do not follow
    /// the naming convention. Versions may carry pre-release tags with
    /// dashes; the timestamp is always the last segment.
    pub fn parse(app: &str, name: &str) -> Option<Self> {
        let rest = name.strip_prefix(app)?.strip_prefix('-')?;
        let (version, built_at) = rest.rsplit_once('-')?;
        if built_at.is_empty() || !built_at.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(
            app,
            Version::parse(version).ok()?,
            built_at.parse().ok()?,
        ))
    }

    /// The newest generation of `app` among `names`
    pub fn latest<'a>(app: &str, names: impl IntoIterator<Item = &'a String>) -> Option<Self> {
        names
            .into_iter()
            .filter_map(|name| Self::parse(app, name))
            .max_by(|a, b| {
                a.built_at
                    .cmp(&b.built_at)
                    .then_with(|| a.version.cmp(&b.version))
            })
    }

    pub fn built_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.built_at).single()
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.partition_name())
    }
}

/// What a partition is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    /// Versioned app shell, replaced on every verified activation
    AppShell,
    /// Opportunistic same-origin cache
    Runtime,
    /// Cross-origin model weights
    ModelWeights,
    /// Explicitly preserved long-lived partition
    Preserved,
    /// Anything else, including app shells of other apps
    Other,
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AppShell => "app-shell",
            Self::Runtime => "runtime",
            Self::ModelWeights => "model-weights",
            Self::Preserved => "preserved",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Fixed partition names and the app they belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLayout {
    pub app: String,
    pub runtime: String,
    pub model_weights: String,
    pub preserved: Vec<String>,
}

impl PartitionLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            app: config.app.name.clone(),
            runtime: config.partitions.runtime.clone(),
            model_weights: config.partitions.model_weights.clone(),
            preserved: config.partitions.preserved.clone(),
        }
    }

    pub fn classify(&self, name: &str) -> PartitionKind {
        if name == self.runtime {
            PartitionKind::Runtime
        } else if name == self.model_weights {
            PartitionKind::ModelWeights
        } else if self.preserved.iter().any(|p| p == name) {
            PartitionKind::Preserved
        } else if Generation::parse(&self.app, name).is_some() {
            PartitionKind::AppShell
        } else {
            PartitionKind::Other
        }
    }

    /// Names that survive a verified activation of `current`
    pub fn preserved_set(&self, current: &str) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = self.preserved.iter().cloned().collect();
        set.insert(current.to_string());
        set.insert(self.runtime.clone());
        set.insert(self.model_weights.clone());
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> PartitionLayout {
        PartitionLayout {
            app: "assistant".to_string(),
            runtime: "assistant-runtime".to_string(),
            model_weights: "transformers-cache".to_string(),
            preserved: vec!["kokoro-voices".to_string()],
        }
    }

    #[test]
    fn partition_name_round_trips() {
        let generation = Generation::new("assistant", Version::new(1, 2, 3), 1_700_000_000_000);
        assert_eq!(generation.partition_name(), "assistant-1.2.3-1700000000000");
        assert_eq!(
            Generation::parse("assistant", &generation.partition_name()),
            Some(generation)
        );
    }

    #[test]
    fn parse_handles_prerelease_and_dashed_app() {
        let parsed = Generation::parse("my-app", "my-app-2.0.0-beta.1-42").unwrap();
        assert_eq!(parsed.version, Version::parse("2.0.0-beta.1").unwrap());
        assert_eq!(parsed.built_at, 42);
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert!(Generation::parse("assistant", "assistant-runtime").is_none());
        assert!(Generation::parse("assistant", "transformers-cache").is_none());
        assert!(Generation::parse("assistant", "assistant-1.0.0-").is_none());
        assert!(Generation::parse("assistant", "assistant-1.0-5").is_none());
        assert!(Generation::parse("assistant", "assistantx-1.0.0-5").is_none());
    }

    #[test]
    fn latest_prefers_newest_build() {
        let names: Vec<String> = vec![
            "assistant-1.0.0-100".into(),
            "assistant-runtime".into(),
            "assistant-0.9.0-300".into(),
            "assistant-1.0.0-200".into(),
        ];
        let latest = Generation::latest("assistant", &names).unwrap();
        assert_eq!(latest.partition_name(), "assistant-0.9.0-300");
    }

    #[test]
    fn built_at_is_epoch_millis() {
        let generation = Generation::new("assistant", Version::new(1, 0, 0), 1_700_000_000_123);
        let built = generation.built_at_utc().unwrap();
        assert_eq!(built.to_rfc3339(), "2023-11-14T22:13:20.123+00:00");
    }

    #[test]
    fn stamp_now_rejects_bad_version() {
        assert!(matches!(
            Generation::stamp_now("assistant", "one"),
            Err(OffcacheError::InvalidVersion { .. })
        ));
        assert!(Generation::stamp_now("assistant", "1.0.0").unwrap().built_at > 0);
    }

    #[test]
    fn classify_partitions() {
        let layout = layout();
        assert_eq!(layout.classify("assistant-runtime"), PartitionKind::Runtime);
        assert_eq!(layout.classify("transformers-cache"), PartitionKind::ModelWeights);
        assert_eq!(layout.classify("kokoro-voices"), PartitionKind::Preserved);
        assert_eq!(layout.classify("assistant-1.0.0-7"), PartitionKind::AppShell);
        assert_eq!(layout.classify("legacy-cache"), PartitionKind::Other);
    }

    #[test]
    fn preserved_set_contains_fixed_names() {
        let set = layout().preserved_set("assistant-1.0.0-7");
        let expected: BTreeSet<String> = [
            "assistant-1.0.0-7",
            "assistant-runtime",
            "transformers-cache",
            "kokoro-voices",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(set, expected);
    }
}
