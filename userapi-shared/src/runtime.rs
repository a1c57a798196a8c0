/// Application runtime
///
/// [`Runtime`] is the application context built once at startup from a
/// validated [`Registry`]. Provisioning walks the declared databases in
/// order and, for each one:
///
/// 1. Resolves its connection URL
/// 2. Optionally creates the database when it is missing
/// 3. Opens a connection pool (eager or lazy)
/// 4. Optionally applies its migrations directory
///
/// Handlers then reach their databases through a [`ServiceContext`], which
/// only exposes the databases the service declared.
///
/// # Example
///
/// ```no_run
/// use userapi_shared::registry::RegistryBuilder;
/// use userapi_shared::resource::{DatabaseOptions, ServiceOptions};
/// use userapi_shared::runtime::{ProvisionSettings, Runtime};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut builder = RegistryBuilder::new(".");
/// let users = builder.declare_database("users", DatabaseOptions::new("./migrations"));
/// builder.declare_service("user-api", ServiceOptions::new([users]));
///
/// let settings = ProvisionSettings {
///     default_url: Some("postgresql://localhost/users".to_string()),
///     ..Default::default()
/// };
/// let runtime = Runtime::provision(builder.build()?, &settings).await?;
///
/// let service = runtime.service("user-api")?;
/// let pool = service.database("users")?;
/// sqlx::query("SELECT 1").execute(pool).await?;
///
/// runtime.shutdown().await;
/// # Ok(())
/// # }
/// ```

use crate::db::migrations::{ensure_database_exists, run_migrations};
use crate::db::pool::{close_pool, connect, connect_lazy, health_check, PoolSettings};
use crate::registry::Registry;
use crate::resource::{DatabaseDescriptor, ServiceDescriptor};
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Upper bound for a single database health probe
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while provisioning or querying the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Neither an override nor a default URL is configured
    #[error("No connection URL configured for database {0:?}")]
    UnresolvedUrl(String),

    /// Pool creation or database creation failed
    #[error("Failed to connect to database {database:?}: {source}")]
    Connect {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    /// Applying migrations failed
    #[error("Failed to migrate database {database:?}: {source}")]
    Migrate {
        database: String,
        #[source]
        source: MigrateError,
    },

    #[error("Unknown database {0:?}")]
    UnknownDatabase(String),

    #[error("Unknown service {0:?}")]
    UnknownService(String),

    /// A service asked for a database it did not declare
    #[error("Service {service:?} does not declare database {database:?}")]
    NotDeclared { service: String, database: String },
}

/// How databases are provisioned
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// URL used by databases without an override
    pub default_url: Option<String>,

    /// Per-database URL overrides, keyed by database name
    pub urls: HashMap<String, String>,

    /// Pool sizing shared by every database
    pub pool: PoolSettings,

    /// Apply migrations after connecting
    pub run_migrations: bool,

    /// Create databases that do not exist yet (eager mode only)
    pub create_missing: bool,

    /// Build pools without connecting. Migrations are skipped in this mode.
    pub lazy: bool,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            default_url: None,
            urls: HashMap::new(),
            pool: PoolSettings::default(),
            run_migrations: true,
            create_missing: false,
            lazy: false,
        }
    }
}

impl ProvisionSettings {
    /// Connection URL for a database: its override, else the default
    pub fn url_for(&self, database: &str) -> Option<&str> {
        self.urls
            .get(database)
            .or(self.default_url.as_ref())
            .map(String::as_str)
    }
}

/// Connectivity of one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHealth {
    pub name: String,
    pub connected: bool,
}

/// Provisioned application context
#[derive(Debug)]
pub struct Runtime {
    registry: Registry,
    pools: HashMap<String, PgPool>,
}

impl Runtime {
    /// Provisions every database in the registry
    ///
    /// Databases are handled in declaration order. If one fails, pools
    /// already opened are closed before the error is returned.
    pub async fn provision(registry: Registry, settings: &ProvisionSettings) -> Result<Self, RuntimeError> {
        let mut pools = HashMap::new();

        for database in registry.databases() {
            match provision_database(database, settings).await {
                Ok(pool) => {
                    pools.insert(database.name().to_string(), pool);
                }
                Err(e) => {
                    error!(database = database.name(), error = %e, "Database provisioning failed");
                    for pool in pools.values() {
                        close_pool(pool).await;
                    }
                    return Err(e);
                }
            }
        }

        info!(
            databases = pools.len(),
            services = registry.services().count(),
            "Runtime provisioned"
        );

        Ok(Self { registry, pools })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Pool of a database, regardless of which service uses it
    pub fn pool(&self, database: &str) -> Result<&PgPool, RuntimeError> {
        self.pools
            .get(database)
            .ok_or_else(|| RuntimeError::UnknownDatabase(database.to_string()))
    }

    /// Scoped view for one service
    pub fn service(&self, name: &str) -> Result<ServiceContext<'_>, RuntimeError> {
        let descriptor = self
            .registry
            .service(name)
            .ok_or_else(|| RuntimeError::UnknownService(name.to_string()))?;

        Ok(ServiceContext {
            runtime: self,
            descriptor,
        })
    }

    /// Probes every database, in declaration order
    pub async fn health(&self) -> Vec<DatabaseHealth> {
        let mut report = Vec::with_capacity(self.pools.len());

        for database in self.registry.databases() {
            let connected = match self.pools.get(database.name()) {
                Some(pool) => probe(database.name(), pool).await,
                None => false,
            };

            report.push(DatabaseHealth {
                name: database.name().to_string(),
                connected,
            });
        }

        report
    }

    /// Closes every pool
    pub async fn shutdown(&self) {
        info!("Closing database pools");
        for pool in self.pools.values() {
            close_pool(pool).await;
        }
    }
}

/// A service's view of the runtime
#[derive(Debug, Clone, Copy)]
pub struct ServiceContext<'a> {
    runtime: &'a Runtime,
    descriptor: &'a ServiceDescriptor,
}

impl<'a> ServiceContext<'a> {
    pub fn name(&self) -> &'a str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &'a ServiceDescriptor {
        self.descriptor
    }

    /// Pool of a database this service declared
    pub fn database(&self, name: &str) -> Result<&'a PgPool, RuntimeError> {
        if !self.descriptor.uses_database(name) {
            return Err(RuntimeError::NotDeclared {
                service: self.descriptor.name().to_string(),
                database: name.to_string(),
            });
        }

        self.runtime.pool(name)
    }
}

async fn provision_database(
    database: &DatabaseDescriptor,
    settings: &ProvisionSettings,
) -> Result<PgPool, RuntimeError> {
    let name = database.name();
    let url = settings
        .url_for(name)
        .ok_or_else(|| RuntimeError::UnresolvedUrl(name.to_string()))?;

    let connect_error = |source: sqlx::Error| RuntimeError::Connect {
        database: name.to_string(),
        source,
    };

    if settings.lazy {
        info!(database = name, "Provisioning database lazily");
        return connect_lazy(url, &settings.pool).map_err(connect_error);
    }

    info!(database = name, migrations = ?database.migrations(), "Provisioning database");

    if settings.create_missing {
        ensure_database_exists(url).await.map_err(connect_error)?;
    }

    let pool = connect(url, &settings.pool).await.map_err(connect_error)?;

    if settings.run_migrations {
        if let Err(source) = run_migrations(&pool, database.migrations()).await {
            close_pool(&pool).await;
            return Err(RuntimeError::Migrate {
                database: name.to_string(),
                source,
            });
        }
    }

    Ok(pool)
}

async fn probe(name: &str, pool: &PgPool) -> bool {
    match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, health_check(pool)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(database = name, error = %e, "Database health check failed");
            false
        }
        Err(_) => {
            warn!(database = name, "Database health check timed out");
            false
        }
    }
}
