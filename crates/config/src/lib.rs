//! Configuration for the tsingest ingestion registry.
//!
//! Plain constants and a plain struct, consumed by the layers above it
//! and never the reverse — `tsingest-registry` depends on this crate,
//! this crate depends on nothing in the workspace.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum length, in bytes, of a canonical series name. Bounds
/// the normalizer's scratch buffer.
pub const DEFAULT_MAX_SERIES_NAME_LEN: usize = 2048;

/// Default timeout for `wait_for_sync_request` when the caller does not
/// specify one.
pub const DEFAULT_SYNC_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of in-memory samples an extent list buffers before
/// reporting `OkFlushNeeded`.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum length, in bytes, of a canonical series name.
    pub max_series_name_len: usize,
    /// Default timeout for `wait_for_sync_request`.
    #[serde(with = "duration_secs")]
    pub sync_wait_timeout: Duration,
    /// Number of samples an extent list buffers before it reports
    /// `OkFlushNeeded`.
    pub flush_threshold: usize,
    /// Whether a broadcast that finds no owning session logs a warning.
    pub broadcast_log_misses: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_series_name_len: DEFAULT_MAX_SERIES_NAME_LEN,
            sync_wait_timeout: DEFAULT_SYNC_WAIT_TIMEOUT,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            broadcast_log_misses: true,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let cfg = IngestConfig::default();
        assert_eq!(cfg.max_series_name_len, DEFAULT_MAX_SERIES_NAME_LEN);
        assert_eq!(cfg.sync_wait_timeout, DEFAULT_SYNC_WAIT_TIMEOUT);
        assert_eq!(cfg.flush_threshold, DEFAULT_FLUSH_THRESHOLD);
    }

    #[test]
    fn roundtrips_through_toml() {
        let cfg = IngestConfig::default();
        let text = toml::to_string(&cfg).expect("serialize");
        let back: IngestConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(back.max_series_name_len, cfg.max_series_name_len);
    }
}
