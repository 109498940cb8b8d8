use log::{debug, warn};
use serde::{Deserialize, Serialize};

const DATABASE_URL_VARS: &[&str] = &["SQLFLOW_DATABASE_URL", "DATABASE_URL"];
const MAX_CONNECTIONS_VAR: &str = "SQLFLOW_MAX_CONNECTIONS";
const LOG_LEVEL_VAR: &str = "SQLFLOW_LOG";

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub log_level: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl FlowConfig {
    /// Read configuration from the environment, loading `.env` first if present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config.database_url = DATABASE_URL_VARS
            .iter()
            .find_map(|key| lookup(key))
            .filter(|url| !url.trim().is_empty());
        if let Some(raw) = lookup(MAX_CONNECTIONS_VAR) {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.max_connections = n,
                _ => warn!(
                    "ignoring invalid {}={}, using {}",
                    MAX_CONNECTIONS_VAR, raw, DEFAULT_MAX_CONNECTIONS
                ),
            }
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR).filter(|l| !l.trim().is_empty()) {
            config.log_level = level;
        }
        debug!(
            "config: database url {}, max connections {}",
            if config.database_url.is_some() { "set" } else { "unset" },
            config.max_connections
        );
        config
    }

    /// Database URL or a configuration error naming the variables to set.
    pub fn require_database_url(&self) -> Result<&str, crate::query_ast::FlowError> {
        self.database_url.as_deref().ok_or_else(|| {
            crate::query_ast::FlowError::Config(format!(
                "no database URL; pass --database-url or set {}",
                DATABASE_URL_VARS.join(" or ")
            ))
        })
    }
}
