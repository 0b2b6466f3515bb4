use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub recommendation: RecommendationConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = self
            .host
            .parse::<IpAddr>()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Result count when a caller does not ask for one.
    pub default_count: usize,
    /// Most similar students consulted by the collaborative model.
    pub neighbor_count: usize,
    /// Recent history entries averaged into a content profile.
    pub profile_window: usize,
    /// Vocabulary bound of the term-weighting model.
    pub max_features: usize,
    pub max_factor_components: usize,
    /// Upper bound enforced by the HTTP layer.
    pub max_request_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub num_books: usize,
    pub num_students: usize,
    pub num_records: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            recommendation: RecommendationConfig::default(),
            data: DataConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: num_cpus::get(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_count: 10,
            neighbor_count: 5,
            profile_window: 10,
            max_features: 1000,
            max_factor_components: 10,
            max_request_count: 100,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            num_books: 150,
            num_students: 75,
            num_records: 1000,
            seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Layers `path` (any format the `config` crate understands) under
    /// `SMARTREADS_`-prefixed environment variables, e.g. `SMARTREADS_SERVER__PORT`.
    pub fn from_file(path: &str) -> EngineResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SMARTREADS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.recommendation.neighbor_count, 5);
        assert_eq!(config.recommendation.profile_window, 10);
        assert_eq!(config.recommendation.max_features, 1000);
        assert_eq!(config.data.num_books, 150);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.socket_addr().port(), 8000);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = std::env::temp_dir().join(format!("smartreads-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("smartreads.toml");
        std::fs::write(&path, "[recommendation]\nneighbor_count = 7\n\n[data]\nseed = 42\n").unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.recommendation.neighbor_count, 7);
        assert_eq!(config.recommendation.profile_window, 10);
        assert_eq!(config.data.seed, Some(42));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_bad_host_falls_back_to_unspecified() {
        let server = ServerConfig {
            host: "not-an-ip".to_string(),
            ..ServerConfig::default()
        };
        assert!(server.socket_addr().ip().is_unspecified());
    }
}
