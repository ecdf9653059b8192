//! Configuration Module
//!
//! Handles loading server configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context};

use crate::cache::DEFAULT_TTL_SECS;
use crate::proxy::BackendConfig;
use crate::tools::prepare::DEFAULT_MAX_FILE_SIZE;

/// Which tool host the process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// The local tool registry, unprefixed
    Local,
    /// The prefix router over every configured backend
    Proxy,
}

impl FromStr for ServerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ServerMode::Local),
            "proxy" | "unified" => Ok(ServerMode::Proxy),
            other => bail!("unknown SERVER_MODE {:?} (expected local or proxy)", other),
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMode::Local => write!(f, "local"),
            ServerMode::Proxy => write!(f, "proxy"),
        }
    }
}

/// How requests reach the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Stdio,
}

impl FromStr for Transport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "streamable-http" => Ok(Transport::Http),
            "stdio" => Ok(Transport::Stdio),
            other => bail!("unknown SERVER_TRANSPORT {:?} (expected http or stdio)", other),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: ServerMode,
    pub transport: Transport,
    /// HTTP bind address
    pub server_host: String,
    /// HTTP server port
    pub server_port: u16,
    /// Cache entry lifetime in seconds
    pub cache_ttl: u64,
    /// Default size limit for `prepare_local_folder`, in bytes
    pub max_file_size: u64,
    /// Default exclusion globs for `prepare_local_folder`
    pub skip_patterns: Vec<String>,
    /// Seconds between background sweeps; 0 disables the task
    pub cleanup_interval: u64,
    /// Per-request timeout for remote backends, in seconds
    pub forward_timeout: u64,
    /// Routing table used in proxy mode
    pub backends: Vec<BackendConfig>,
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn split_patterns(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_backends(json: &str, source: &str) -> anyhow::Result<Vec<BackendConfig>> {
    serde_json::from_str(json).with_context(|| format!("invalid backend table in {}", source))
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_MODE` - `local` or `proxy` (default: local)
    /// - `SERVER_TRANSPORT` - `http` or `stdio` (default: http)
    /// - `SERVER_HOST` / `SERVER_PORT` - bind address (default: 127.0.0.1:8001)
    /// - `CACHE_TTL` - cache lifetime in seconds (default: 3600)
    /// - `MAX_FILE_SIZE` - bytes (default: 100MB)
    /// - `SKIP_PATTERNS` - comma-separated globs
    /// - `CLEANUP_INTERVAL` - seconds between sweeps (default: 0, disabled)
    /// - `FORWARD_TIMEOUT` - seconds per remote request (default: 30)
    /// - `MCP_BACKENDS` / `MCP_BACKENDS_FILE` - JSON backend table
    /// - `REMOTE_MCP_URL` - shorthand for `local` in-process plus `remote` over HTTP
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mode = match lookup("SERVER_MODE") {
            Some(value) => value.parse()?,
            None => defaults.mode,
        };
        let transport = match lookup("SERVER_TRANSPORT") {
            Some(value) => value.parse()?,
            None => defaults.transport,
        };

        let backends = if let Some(json) = lookup("MCP_BACKENDS") {
            parse_backends(&json, "MCP_BACKENDS")?
        } else if let Some(path) = lookup("MCP_BACKENDS_FILE") {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read MCP_BACKENDS_FILE {}", path))?;
            parse_backends(&json, &path)?
        } else if let Some(url) = lookup("REMOTE_MCP_URL") {
            vec![
                BackendConfig::in_process("local"),
                BackendConfig::http("remote", url.trim()),
            ]
        } else {
            defaults.backends
        };

        Ok(Self {
            mode,
            transport,
            server_host: lookup("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or(lookup("SERVER_PORT"), defaults.server_port),
            cache_ttl: parse_or(lookup("CACHE_TTL"), defaults.cache_ttl),
            max_file_size: parse_or(lookup("MAX_FILE_SIZE"), defaults.max_file_size),
            skip_patterns: lookup("SKIP_PATTERNS")
                .map(|v| split_patterns(&v))
                .unwrap_or(defaults.skip_patterns),
            cleanup_interval: parse_or(lookup("CLEANUP_INTERVAL"), defaults.cleanup_interval),
            forward_timeout: parse_or(lookup("FORWARD_TIMEOUT"), defaults.forward_timeout),
            backends,
        })
    }

    /// Rejects combinations that cannot be served.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mode == ServerMode::Proxy && self.backends.is_empty() {
            bail!("proxy mode needs at least one backend");
        }
        if self.forward_timeout == 0 {
            bail!("FORWARD_TIMEOUT must be at least one second");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ServerMode::Local,
            transport: Transport::Http,
            server_host: "127.0.0.1".to_string(),
            server_port: 8001,
            cache_ttl: DEFAULT_TTL_SECS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            skip_patterns: Vec::new(),
            cleanup_interval: 0,
            forward_timeout: 30,
            backends: vec![BackendConfig::in_process("local")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::TransportConfig;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.mode, ServerMode::Local);
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.server_port, 8001);
        assert_eq!(config.cache_ttl, 3600);
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.cleanup_interval, 0);
    }

    #[test]
    fn test_config_from_empty_lookup_uses_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.forward_timeout, 30);
        assert_eq!(config.backends, vec![BackendConfig::in_process("local")]);
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("SERVER_MODE", "proxy"),
            ("SERVER_TRANSPORT", "stdio"),
            ("SERVER_PORT", "9000"),
            ("CACHE_TTL", "60"),
            ("SKIP_PATTERNS", "*.log, .git ,,*.tmp"),
            ("CLEANUP_INTERVAL", "not-a-number"),
        ]))
        .unwrap();

        assert_eq!(config.mode, ServerMode::Proxy);
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.cache_ttl, 60);
        assert_eq!(config.skip_patterns, vec!["*.log", ".git", "*.tmp"]);
        assert_eq!(config.cleanup_interval, 0);
    }

    #[test]
    fn test_unknown_mode_is_error() {
        assert!(Config::from_lookup(lookup_from(&[("SERVER_MODE", "cluster")])).is_err());
    }

    #[test]
    fn test_remote_url_shorthand() {
        let config =
            Config::from_lookup(lookup_from(&[("REMOTE_MCP_URL", "http://10.0.0.5:8000/mcp")]))
                .unwrap();
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].prefix, "local");
        assert_eq!(config.backends[1].prefix, "remote");
        assert!(matches!(
            &config.backends[1].transport,
            TransportConfig::Http { url, .. } if url == "http://10.0.0.5:8000/mcp"
        ));
    }

    #[test]
    fn test_backend_table_from_json() {
        let config = Config::from_lookup(lookup_from(&[(
            "MCP_BACKENDS",
            r#"[{"prefix": "tools", "transport": "stdio", "command": "srv"}]"#,
        )]))
        .unwrap();
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].prefix, "tools");
    }

    #[test]
    fn test_backend_table_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("backends.json");
        std::fs::write(&path, r#"[{"prefix": "local", "transport": "in-process"}]"#).unwrap();

        let path = path.display().to_string();
        let config = Config::from_lookup(lookup_from(&[("MCP_BACKENDS_FILE", path.as_str())]))
            .unwrap();
        assert_eq!(config.backends, vec![BackendConfig::in_process("local")]);
    }

    #[test]
    fn test_invalid_backend_json_is_error() {
        let result = Config::from_lookup(lookup_from(&[("MCP_BACKENDS", "[{")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.mode = ServerMode::Proxy;
        config.backends.clear();
        assert!(config.validate().is_err());
    }
}
