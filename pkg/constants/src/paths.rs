//! Filesystem path constants.

/// Default config file path for `hnsctl`.
pub const DEFAULT_PROXY_CONFIG: &str = "/etc/hns/proxy-config.yaml";
