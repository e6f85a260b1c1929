//! Configuration module
//!
//! Everything the process reads from the environment is resolved once at
//! startup into a `Config` that is threaded through the call graph. There is
//! no process-global mutable configuration.

use std::env;

use crate::error::AppError;

const DEFAULT_DB_URL: &str = "sqlite://curator.sqlite?mode=rwc";
const TOOLSDB_HOST: &str = "tools.db.svc.wikimedia.cloud";
const DEFAULT_COMMONS_API_URL: &str = "https://commons.wikimedia.org/w/api.php";
const DEFAULT_SERVER_PORT: u16 = 8000;

pub const USER_AGENT: &str =
    "Curator / Toolforge curator.toolforge.org / Wikimedia Commons User:DaxServer";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// Base64-encoded 32-byte key for the sealed token store. Required; the
    /// process refuses to start without it.
    pub token_encryption_key: String,
    pub commons_api_url: String,
    pub mapillary_api_token: Option<String>,
    pub flickr_api_key: Option<String>,
    pub oauth_consumer_key: Option<String>,
    pub oauth_consumer_secret: Option<String>,
    /// Usernames allowed on the admin surface (comma-separated env value).
    pub admin_users: Vec<String>,
    pub worker_concurrency: usize,
    pub server_port: u16,
    pub user_agent: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let token_encryption_key = env::var("TOKEN_ENCRYPTION_KEY").map_err(|_| {
            AppError::Config("TOKEN_ENCRYPTION_KEY environment variable not set".to_string())
        })?;

        let worker_concurrency = env::var("WORKER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SERVER_PORT);

        let admin_users = env::var("ADMIN_USERS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url: database_url_from_env(),
            token_encryption_key,
            commons_api_url: env::var("COMMONS_API_URL")
                .unwrap_or_else(|_| DEFAULT_COMMONS_API_URL.to_string()),
            mapillary_api_token: env::var("MAPILLARY_API_TOKEN").ok(),
            flickr_api_key: env::var("FLICKR_API_KEY").ok(),
            oauth_consumer_key: env::var("OAUTH_CONSUMER_KEY").ok(),
            oauth_consumer_secret: env::var("OAUTH_CONSUMER_SECRET").ok(),
            admin_users,
            worker_concurrency,
            server_port,
            user_agent: USER_AGENT.to_string(),
        })
    }

    /// Admin predicate: membership in the configured admin list.
    pub fn is_admin(&self, username: &str) -> bool {
        self.admin_users.iter().any(|u| u == username)
    }
}

/// Resolve the database URL. When the Toolforge ToolsDB credentials are both
/// present the tool database on `tools.db.svc.wikimedia.cloud` is used (TLS
/// disabled, as ToolsDB does not serve certificates); otherwise `DB_URL`
/// with an SQLite fallback.
pub fn database_url_from_env() -> String {
    let user = env::var("TOOL_TOOLSDB_USER").ok();
    let password = env::var("TOOL_TOOLSDB_PASSWORD").ok();

    match (user, password) {
        (Some(user), Some(password)) => format!(
            "mysql://{}:{}@{}/{}__curator?ssl-mode=DISABLED",
            user, password, TOOLSDB_HOST, user
        ),
        _ => env::var("DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toolforge_db_url() {
        let url = format!(
            "mysql://{}:{}@{}/{}__curator?ssl-mode=DISABLED",
            "s1234", "pw", TOOLSDB_HOST, "s1234"
        );
        assert!(url.starts_with("mysql://s1234:pw@tools.db.svc.wikimedia.cloud/"));
        assert!(url.contains("s1234__curator"));
        assert!(url.ends_with("ssl-mode=DISABLED"));
    }

    #[test]
    fn test_admin_predicate() {
        let config = Config {
            database_url: DEFAULT_DB_URL.to_string(),
            token_encryption_key: String::new(),
            commons_api_url: DEFAULT_COMMONS_API_URL.to_string(),
            mapillary_api_token: None,
            flickr_api_key: None,
            oauth_consumer_key: None,
            oauth_consumer_secret: None,
            admin_users: vec!["Admin".to_string()],
            worker_concurrency: 1,
            server_port: DEFAULT_SERVER_PORT,
            user_agent: USER_AGENT.to_string(),
        };
        assert!(config.is_admin("Admin"));
        assert!(!config.is_admin("Someone"));
    }
}
