//! Mirror rewriting for cross-origin model URLs
//!
//! Model files may be requested from the canonical upstream repository or
//! from its mirror. Both addresses must resolve to one cache key, otherwise
//! a multi-hundred-megabyte weight file is stored twice. Normalization is a
//! cache-key concern only: the request sent over the network is never
//! rewritten.

use crate::config::schema::MirrorConfig;
use crate::error::{OffcacheError, OffcacheResult};
use url::Url;

/// Rewrites the upstream origin to the mirror origin
#[derive(Debug, Clone, PartialEq, Eq)]
struct MirrorRule {
    upstream_host: String,
    mirror: Url,
}

/// URL normalizer applied before every model-cache lookup and write
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlNormalizer {
    rule: Option<MirrorRule>,
}

fn parse_origin(value: &str) -> OffcacheResult<Url> {
    let url = Url::parse(value).map_err(|e| OffcacheError::invalid_url(value, e))?;
    if url.host_str().is_none() {
        return Err(OffcacheError::invalid_url(value, "missing host"));
    }
    if url.path() != "/" || url.query().is_some() {
        return Err(OffcacheError::invalid_url(
            value,
            "expected an origin without path or query",
        ));
    }
    Ok(url)
}

impl UrlNormalizer {
    /// A normalizer that never rewrites
    pub fn identity() -> Self {
        Self::default()
    }

    /// Rewrite requests for `upstream`'s host onto `mirror`'s origin
    pub fn new(upstream: &str, mirror: &str) -> OffcacheResult<Self> {
        let upstream = parse_origin(upstream)?;
        let mirror = parse_origin(mirror)?;

        let upstream_host = upstream.host_str().unwrap_or_default().to_string();
        if mirror.host_str() == Some(upstream_host.as_str()) {
            return Err(OffcacheError::MirrorLoop(upstream_host));
        }

        Ok(Self {
            rule: Some(MirrorRule {
                upstream_host,
                mirror,
            }),
        })
    }

    /// Build from the `[mirror]` config section
    pub fn from_config(config: &MirrorConfig) -> OffcacheResult<Self> {
        if !config.enabled {
            return Ok(Self::identity());
        }
        Self::new(&config.upstream, &config.mirror)
    }

    /// Whether `url` addresses the canonical upstream host
    pub fn is_upstream(&self, url: &Url) -> bool {
        self.rule
            .as_ref()
            .is_some_and(|rule| url.host_str() == Some(rule.upstream_host.as_str()))
    }

    /// Map `url` to its cache key form. Pure, total and idempotent: only
    /// the origin changes; path, query and fragment are kept as-is.
    pub fn normalize(&self, url: &Url) -> Url {
        let Some(rule) = self.rule.as_ref() else {
            return url.clone();
        };
        if !self.is_upstream(url) {
            return url.clone();
        }

        let mut rewritten = rule.mirror.clone();
        rewritten.set_path(url.path());
        rewritten.set_query(url.query());
        rewritten.set_fragment(url.fragment());
        rewritten
    }

    /// The pre-normalization key to try after a normalized miss, if it differs
    pub fn legacy_key(&self, url: &Url) -> Option<Url> {
        let normalized = self.normalize(url);
        (normalized != *url).then(|| url.clone())
    }

    /// The mirror origin, if rewriting is enabled
    pub fn mirror(&self) -> Option<&Url> {
        self.rule.as_ref().map(|rule| &rule.mirror)
    }
}
