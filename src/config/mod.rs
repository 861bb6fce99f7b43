mod settings;

pub use settings::{ClusterConfig, Config, ConfigError, LogConfig, TomlConfig, EXAMPLE_CONFIG};
