/// Configuration for the user-api server
///
/// Loaded from environment variables, with a `.env` file honoured in
/// development.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma separated allowed origins, `*` for any
///   (default: `FRONTEND_URL` or http://localhost:3001, plus localhost:3000)
/// - `APP_ROOT`: Directory migration paths resolve against (default: crate directory)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_URL_<NAME>`: Override for one database, e.g. `DATABASE_URL_USERS`
/// - `DATABASE_MAX_CONNECTIONS`: Pool size per database (default: 10)
/// - `DATABASE_MIN_CONNECTIONS`: Idle connections kept per database (default: 2)
/// - `DATABASE_ACQUIRE_TIMEOUT_SECONDS`: Wait for a free connection (default: 30)
/// - `RUN_MIGRATIONS`: Apply migrations at startup (default: true)
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for text
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use userapi_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use userapi_shared::db::pool::PoolSettings;
use userapi_shared::runtime::ProvisionSettings;

/// Prefix of per-database URL overrides
const DATABASE_URL_PREFIX: &str = "DATABASE_URL_";

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,

    /// Directory relative resource paths are resolved against
    pub app_root: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins. `*` allows any origin.
    pub cors_origins: Vec<String>,
}

/// Database configuration shared by every declared database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Default PostgreSQL connection URL
    pub url: String,

    /// Per-database URL overrides, keyed by environment suffix (`USERS`)
    pub overrides: HashMap<String, String>,

    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,

    /// Apply migrations during startup
    pub run_migrations: bool,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a numeric or boolean
    /// variable cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(env::vars())
    }

    /// Builds configuration from explicit key/value pairs
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> anyhow::Result<Self> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let get = |key: &str| vars.get(key).map(String::as_str);

        let host = get("API_HOST").unwrap_or("0.0.0.0").to_string();
        let port = get("API_PORT").unwrap_or("8080").parse::<u16>()?;

        let cors_origins = match get("CORS_ORIGINS") {
            Some(origins) => split_list(origins),
            None => default_cors_origins(get("FRONTEND_URL")),
        };

        let url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?
            .to_string();

        let overrides = vars
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(DATABASE_URL_PREFIX)
                    .filter(|suffix| !suffix.is_empty())
                    .map(|suffix| (suffix.to_string(), value.clone()))
            })
            .collect();

        let max_connections = get("DATABASE_MAX_CONNECTIONS").unwrap_or("10").parse::<u32>()?;
        let min_connections = get("DATABASE_MIN_CONNECTIONS").unwrap_or("2").parse::<u32>()?;
        let acquire_timeout_seconds = get("DATABASE_ACQUIRE_TIMEOUT_SECONDS")
            .unwrap_or("30")
            .parse::<u64>()?;
        let run_migrations = parse_bool(get("RUN_MIGRATIONS").unwrap_or("true"))?;

        let json = get("LOG_FORMAT").is_some_and(|format| format.eq_ignore_ascii_case("json"));

        let app_root = get("APP_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")));

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
            },
            database: DatabaseConfig {
                url,
                overrides,
                max_connections,
                min_connections,
                acquire_timeout_seconds,
                run_migrations,
            },
            logging: LoggingConfig { json },
            app_root,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Provisioning settings for the given database names
    ///
    /// `DATABASE_URL_<NAME>` overrides are matched by uppercasing the
    /// database name and replacing `-` with `_`.
    pub fn provision_settings<'a>(&self, databases: impl IntoIterator<Item = &'a str>) -> ProvisionSettings {
        let urls = databases
            .into_iter()
            .filter_map(|name| {
                self.database
                    .overrides
                    .get(&env_suffix(name))
                    .map(|url| (name.to_string(), url.clone()))
            })
            .collect();

        ProvisionSettings {
            default_url: Some(self.database.url.clone()),
            urls,
            pool: PoolSettings {
                max_connections: self.database.max_connections,
                min_connections: self.database.min_connections,
                acquire_timeout_seconds: self.database.acquire_timeout_seconds,
                ..Default::default()
            },
            run_migrations: self.database.run_migrations,
            ..Default::default()
        }
    }
}

/// `user-api` → `USER_API`
fn env_suffix(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn default_cors_origins(frontend_url: Option<&str>) -> Vec<String> {
    let mut origins = vec![frontend_url.unwrap_or("http://localhost:3001").to_string()];
    for local in ["http://localhost:3000", "http://localhost:3001"] {
        if !origins.iter().any(|origin| origin == local) {
            origins.push(local.to_string());
        }
    }
    origins
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid boolean value: {}", other),
    }
}
