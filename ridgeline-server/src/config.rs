//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ridgeline_core::{
    EngineCommand, EngineConfig, EnrollmentPolicy, FeatureMode, MatchThreshold, PipelineConfig,
    DEFAULT_DESCRIPTOR_FORMAT, DEFAULT_ENGINE_TIMEOUT,
};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 5000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 50)
    pub body_limit_mb: usize,
    /// Maximum profile photo size in MB (default: 25)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL URL; the in-memory store is used when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Database connection pool minimum connections (default: 2)
    pub database_min_connections: u32,
    /// Feature engine commands, timeout and working directory
    pub engine: EngineConfig,
    /// Matching threshold, feature mode and enrollment policy
    pub pipeline: PipelineConfig,
    /// Root for per-request scratch files (default: OS temp dir)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 50,
            max_file_size_mb: 25,
            timeout_secs: 60,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            database_min_connections: 2,
            engine: EngineConfig::default(),
            pipeline: PipelineConfig::default(),
            scratch_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            port,
            host,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB").unwrap_or(defaults.body_limit_mb),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB").unwrap_or(defaults.max_file_size_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            database_min_connections: env_parse("DATABASE_MIN_CONNECTIONS")
                .unwrap_or(defaults.database_min_connections),
            engine: engine_from_env(defaults.engine),
            pipeline: pipeline_from_env(defaults.pipeline),
            scratch_dir: std::env::var_os("SCRATCH_DIR").map(PathBuf::from),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

fn engine_from_env(defaults: EngineConfig) -> EngineConfig {
    let command = |name: &str, fallback: EngineCommand| match std::env::var(name) {
        Ok(line) => EngineCommand::parse(&line).unwrap_or_else(|| {
            tracing::warn!(var = name, value = %line, "Unusable engine command; using default");
            fallback
        }),
        Err(_) => fallback,
    };

    EngineConfig {
        extract: command("ENGINE_EXTRACT_CMD", defaults.extract),
        compare: command("ENGINE_COMPARE_CMD", defaults.compare),
        timeout: env_parse("ENGINE_TIMEOUT_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ENGINE_TIMEOUT),
        working_dir: std::env::var_os("ENGINE_WORKDIR")
            .map(PathBuf::from)
            .or(defaults.working_dir),
    }
}

fn pipeline_from_env(defaults: PipelineConfig) -> PipelineConfig {
    let threshold = match std::env::var("MATCH_THRESHOLD") {
        Ok(raw) => parse_threshold(&raw).unwrap_or_else(|| {
            tracing::warn!(value = %raw, "MATCH_THRESHOLD must be a number in 0..=100; using default");
            MatchThreshold::default()
        }),
        Err(_) => defaults.threshold,
    };

    let feature_mode = match std::env::var("FEATURE_MODE") {
        Ok(raw) => FeatureMode::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid FEATURE_MODE; using default");
            FeatureMode::default()
        }),
        Err(_) => defaults.feature_mode,
    };

    let descriptor_format = std::env::var("DESCRIPTOR_FORMAT")
        .ok()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_DESCRIPTOR_FORMAT.to_string());

    let require_profile_image = std::env::var("REQUIRE_PROFILE_PHOTO")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(defaults.enrollment.require_profile_image);

    PipelineConfig {
        feature_mode,
        descriptor_format,
        threshold,
        enrollment: EnrollmentPolicy {
            require_profile_image,
            ..defaults.enrollment
        },
    }
}

fn parse_threshold(raw: &str) -> Option<MatchThreshold> {
    raw.trim().parse::<f64>().ok().and_then(MatchThreshold::new)
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.timeout_secs, 60);
        assert!(config.database_url.is_none());
        assert!(!config.rate_limit_enabled);
        assert_eq!(config.pipeline.threshold.value(), 70.0);
        assert_eq!(config.engine.extract.to_string(), "python processor.py");
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("85").map(|t| t.value()), Some(85.0));
        assert_eq!(parse_threshold(" 0 ").map(|t| t.value()), Some(0.0));
        assert_eq!(parse_threshold("100").map(|t| t.value()), Some(100.0));
        assert!(parse_threshold("101").is_none());
        assert!(parse_threshold("-5").is_none());
        assert!(parse_threshold("NaN").is_none());
        assert!(parse_threshold("high").is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            host: [0, 0, 0, 0],
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(Config::default().max_file_size(), 25 * 1024 * 1024);
    }
}
