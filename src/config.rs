//! Persistent application configuration model and defaults.

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    /// Feed selection and endpoints.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Fetch timeouts and the tabular retry policy.
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Which of the two interchangeable feed shapes to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedShape {
    #[default]
    Tabular,
    Nested,
}

/// Feed endpoints. A source is an http(s) URL or a local path.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub shape: FeedShape,
    #[serde(default = "default_tabular_source")]
    pub tabular_source: String,
    #[serde(default = "default_nested_source")]
    pub nested_source: String,
}

impl Default for FeedConfig {
    fn default() -> FeedConfig {
        FeedConfig {
            shape: FeedShape::Tabular,
            tabular_source: default_tabular_source(),
            nested_source: default_nested_source(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Attempts for the tabular fetch+parse step before the feed is declared
    /// unavailable.
    #[serde(default = "default_feed_retry_limit")]
    pub feed_retry_limit: u64,
    #[serde(default = "default_feed_retry_backoff_ms")]
    pub feed_retry_backoff_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> NetworkConfig {
        NetworkConfig {
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            feed_retry_limit: default_feed_retry_limit(),
            feed_retry_backoff_ms: default_feed_retry_backoff_ms(),
        }
    }
}

fn default_tabular_source() -> String {
    "media_links.csv".to_string()
}

fn default_nested_source() -> String {
    "models.json".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_timeout_ms() -> u64 {
    7_000
}

fn default_feed_retry_limit() -> u64 {
    4
}

fn default_feed_retry_backoff_ms() -> u64 {
    500
}

/// Clamps loaded values into ranges the runtime can live with.
pub fn sanitize_config(mut config: Config) -> Config {
    config.network.connect_timeout_ms = config.network.connect_timeout_ms.clamp(100, 60_000);
    config.network.read_timeout_ms = config.network.read_timeout_ms.clamp(100, 120_000);
    config.network.feed_retry_limit = config.network.feed_retry_limit.clamp(1, 20);
    config.network.feed_retry_backoff_ms = config.network.feed_retry_backoff_ms.clamp(10, 30_000);
    config
}

#[cfg(test)]
mod tests {
    use super::{sanitize_config, Config, FeedShape};

    #[test]
    fn test_default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.feed.shape, FeedShape::Tabular);
        assert_eq!(config.feed.tabular_source, "media_links.csv");
        assert_eq!(config.feed.nested_source, "models.json");
        assert_eq!(config.network.connect_timeout_ms, 5_000);
        assert_eq!(config.network.read_timeout_ms, 7_000);
        assert_eq!(config.network.feed_retry_limit, 4);
        assert_eq!(config.network.feed_retry_backoff_ms, 500);
    }

    #[test]
    fn test_partial_config_fills_in_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[feed]
shape = "nested"
nested_source = "https://example.org/models.json"
"#,
        )
        .expect("config should parse");
        assert_eq!(parsed.feed.shape, FeedShape::Nested);
        assert_eq!(parsed.feed.nested_source, "https://example.org/models.json");
        assert_eq!(parsed.feed.tabular_source, "media_links.csv");
        assert_eq!(parsed.network.feed_retry_limit, 4);
    }

    #[test]
    fn test_sanitize_clamps_out_of_range_values() {
        let mut config = Config::default();
        config.network.feed_retry_limit = 0;
        config.network.feed_retry_backoff_ms = 1;
        config.network.connect_timeout_ms = 0;
        let sanitized = sanitize_config(config);
        assert_eq!(sanitized.network.feed_retry_limit, 1);
        assert_eq!(sanitized.network.feed_retry_backoff_ms, 10);
        assert_eq!(sanitized.network.connect_timeout_ms, 100);
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).expect("config should serialize");
        let parsed: Config = toml::from_str(&text).expect("config should re-parse");
        assert_eq!(parsed, config);
    }
}
