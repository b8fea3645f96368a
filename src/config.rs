// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the sync layer.
//!
//! # Example
//!
//! ```
//! use mindtrail_sync::SyncConfig;
//!
//! // No backend: everything stays in the local cache
//! let config = SyncConfig::default();
//! assert!(!config.is_remote_configured());
//! assert_eq!(config.cache_key, "mindtrail_data.v1");
//!
//! // Hosted backend
//! let config = SyncConfig {
//!     remote_url: Some("https://example.supabase.co".into()),
//!     remote_anon_key: Some("anon-key".into()),
//!     cache_path: Some("./mindtrail_cache.db".into()),
//!     ..Default::default()
//! };
//! assert!(config.is_remote_configured());
//! ```

use serde::Deserialize;

/// Environment variable holding the backend base URL.
pub const ENV_REMOTE_URL: &str = "MINDTRAIL_REMOTE_URL";
/// Environment variable holding the backend anonymous API key.
pub const ENV_REMOTE_ANON_KEY: &str = "MINDTRAIL_REMOTE_ANON_KEY";
/// Environment variable holding the SQLite cache file path.
pub const ENV_CACHE_PATH: &str = "MINDTRAIL_CACHE_PATH";

/// Configuration for the sync layer.
///
/// All fields have defaults. The remote backend is only used when both
/// `remote_url` and `remote_anon_key` are set.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Backend base URL (e.g., "https://project.supabase.co")
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Backend anonymous API key, sent as the `apikey` header
    #[serde(default)]
    pub remote_anon_key: Option<String>,

    /// SQLite file for the local snapshot (None = in-memory slot)
    #[serde(default)]
    pub cache_path: Option<String>,

    /// Key of the local snapshot slot. Bump the suffix when the format changes.
    #[serde(default = "default_cache_key")]
    pub cache_key: String,

    /// Base URL of the repository metadata API
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// How many recent commits a repository lookup returns
    #[serde(default = "default_recent_commit_limit")]
    pub recent_commit_limit: usize,

    /// Buffered notices per subscriber before the oldest are dropped
    #[serde(default = "default_notice_capacity")]
    pub notice_capacity: usize,
}

fn default_cache_key() -> String { "mindtrail_data.v1".to_string() }
fn default_github_api_url() -> String { "https://api.github.com".to_string() }
fn default_recent_commit_limit() -> usize { 5 }
fn default_notice_capacity() -> usize { 64 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_anon_key: None,
            cache_path: None,
            cache_key: default_cache_key(),
            github_api_url: default_github_api_url(),
            recent_commit_limit: default_recent_commit_limit(),
            notice_capacity: default_notice_capacity(),
        }
    }
}

impl SyncConfig {
    /// Build a config from `MINDTRAIL_*` environment variables.
    ///
    /// Unset or empty variables leave the default in place.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            remote_url: non_empty(ENV_REMOTE_URL),
            remote_anon_key: non_empty(ENV_REMOTE_ANON_KEY),
            cache_path: non_empty(ENV_CACHE_PATH),
            ..Default::default()
        }
    }

    /// True when both the backend URL and key are present.
    #[must_use]
    pub fn is_remote_configured(&self) -> bool {
        self.remote_url.as_deref().is_some_and(|u| !u.is_empty())
            && self.remote_anon_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert!(config.remote_url.is_none());
        assert_eq!(config.cache_key, "mindtrail_data.v1");
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert_eq!(config.recent_commit_limit, 5);
        assert!(!config.is_remote_configured());
    }

    #[test]
    fn test_url_without_key_is_not_configured() {
        let config = SyncConfig {
            remote_url: Some("https://example.supabase.co".into()),
            ..Default::default()
        };
        assert!(!config.is_remote_configured());
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"remote_url": "https://x.supabase.co", "remote_anon_key": "k"}"#,
        )
        .unwrap();
        assert!(config.is_remote_configured());
        assert_eq!(config.notice_capacity, 64);
        assert_eq!(config.cache_key, "mindtrail_data.v1");
    }

    #[test]
    fn test_from_lookup_ignores_empty_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_REMOTE_URL, "https://x.supabase.co"),
            (ENV_REMOTE_ANON_KEY, "  "),
            (ENV_CACHE_PATH, "/tmp/cache.db"),
        ]
        .into_iter()
        .collect();

        let config = SyncConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.remote_url.as_deref(), Some("https://x.supabase.co"));
        assert!(config.remote_anon_key.is_none());
        assert_eq!(config.cache_path.as_deref(), Some("/tmp/cache.db"));
        assert!(!config.is_remote_configured());
    }
}
