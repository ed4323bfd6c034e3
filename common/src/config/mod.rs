mod file;

pub use file::{
    load_config, render_config, AgentConfig, PostgresqlConfig, RestoreConfig, StorageConfig,
    CONFIG_PATHS, DEFAULT_IGNORED_ERROR_PATTERN,
};
