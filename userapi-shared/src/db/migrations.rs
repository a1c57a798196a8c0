/// Database migrations
///
/// Each database carries its own migrations directory. The files follow
/// sqlx's naming scheme:
/// - `{version}_{description}.sql` for simple migrations
/// - `{version}_{description}.up.sql` / `.down.sql` for reversible ones
///
/// The directory is read at runtime rather than embedded at compile time,
/// so the path declared for a database is the one that gets applied.
///
/// # Example
///
/// ```no_run
/// use userapi_shared::db::migrations::{migration_status, run_migrations};
/// use userapi_shared::db::pool::{connect, PoolSettings};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = connect("postgresql://localhost/users", &PoolSettings::default()).await?;
/// let dir = Path::new("./migrations");
///
/// run_migrations(&pool, dir).await?;
///
/// let status = migration_status(&pool, dir).await?;
/// assert!(status.is_up_to_date);
/// # Ok(())
/// # }
/// ```

use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::postgres::{PgPool, Postgres};
use std::path::Path;
use tracing::{debug, info, warn};

/// A migration found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMigration {
    pub version: i64,
    pub description: String,
}

/// Migration state of one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migrations recorded as successfully applied
    pub applied_migrations: usize,

    /// Highest applied version
    pub latest_version: Option<i64>,

    /// Migrations on disk that have not been applied
    pub pending_migrations: usize,

    /// True when nothing on disk is pending
    pub is_up_to_date: bool,
}

/// Loads the migrations in `dir`
pub async fn load_migrator(dir: &Path) -> Result<Migrator, MigrateError> {
    let migrator = Migrator::new(dir).await?;
    debug!(
        path = ?dir,
        migrations = migrator.iter().count(),
        "Loaded migrations"
    );
    Ok(migrator)
}

/// Lists the forward migrations in `dir`, ordered by version
pub async fn local_migrations(dir: &Path) -> Result<Vec<LocalMigration>, MigrateError> {
    let migrator = load_migrator(dir).await?;

    let mut migrations: Vec<LocalMigration> = migrator
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| LocalMigration {
            version: m.version,
            description: m.description.to_string(),
        })
        .collect();
    migrations.sort_by_key(|m| m.version);

    Ok(migrations)
}

/// Applies every pending migration in `dir`
///
/// Already applied migrations are skipped, so running this repeatedly is safe.
///
/// # Errors
///
/// Returns an error if the directory cannot be read, a file is malformed,
/// an applied migration was modified on disk, or a statement fails.
pub async fn run_migrations(pool: &PgPool, dir: &Path) -> Result<(), MigrateError> {
    info!(path = ?dir, "Running database migrations");

    let migrator = load_migrator(dir).await?;
    match migrator.run(pool).await {
        Ok(()) => {
            info!(path = ?dir, "Database migrations complete");
            Ok(())
        }
        Err(e) => {
            warn!(path = ?dir, error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Compares applied migrations against the files in `dir`
pub async fn migration_status(pool: &PgPool, dir: &Path) -> Result<MigrationStatus, MigrateError> {
    let local = local_migrations(dir).await?;

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    let applied: Vec<i64> = if table_exists {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = true ORDER BY version")
            .fetch_all(pool)
            .await?
    } else {
        debug!("Migrations table does not exist yet");
        Vec::new()
    };

    let pending = local
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count();

    Ok(MigrationStatus {
        applied_migrations: applied.len(),
        latest_version: applied.last().copied(),
        pending_migrations: pending,
        is_up_to_date: pending == 0,
    })
}

/// Creates the database named in `url` when it does not exist yet
pub async fn ensure_database_exists(url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(url).await? {
        debug!("Database already exists");
    } else {
        info!("Database does not exist, creating it");
        Postgres::create_database(url).await?;
    }

    Ok(())
}
