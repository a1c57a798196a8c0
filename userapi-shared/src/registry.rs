/// Resource registry
///
/// Registration happens in two phases:
///
/// 1. **Declare**: databases and services are recorded on a
///    [`RegistryBuilder`]. Declaring never fails, so bootstrap code stays
///    purely declarative.
/// 2. **Build**: [`RegistryBuilder::build`] validates everything at once
///    (names, uniqueness, migration directories, service dependencies) and
///    freezes the result into an immutable [`Registry`].
///
/// The built registry is the application's view of its resources. It is
/// created once at startup and passed by reference to whatever needs to
/// look up a database or a service; there is no process-wide global.
///
/// # Example
///
/// ```no_run
/// use userapi_shared::registry::RegistryBuilder;
/// use userapi_shared::resource::{DatabaseOptions, ServiceOptions};
///
/// # fn example() -> Result<(), userapi_shared::registry::RegistryError> {
/// let mut builder = RegistryBuilder::new("/srv/app");
/// let users = builder.declare_database("users", DatabaseOptions::new("./migrations"));
/// builder.declare_service("user-api", ServiceOptions::new([users]));
///
/// let registry = builder.build()?;
/// assert!(registry.service("user-api").is_some());
/// # Ok(())
/// # }
/// ```

use crate::resource::{
    check_name, DatabaseDescriptor, DatabaseHandle, DatabaseOptions, ResourceKind,
    ServiceDescriptor, ServiceOptions,
};
use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(1);

/// Errors detected while validating declared resources
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Resource name does not follow the naming rules
    #[error("Invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: ResourceKind,
        name: String,
        reason: &'static str,
    },

    /// Two databases share a name
    #[error("Database {0:?} is declared more than once")]
    DuplicateDatabase(String),

    /// Two services share a name
    #[error("Service {0:?} is declared more than once")]
    DuplicateService(String),

    /// Migrations directory is missing or cannot be listed
    #[error("Migrations directory {path:?} for database {database:?} is not readable: {source}")]
    MigrationsUnreadable {
        database: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Service declares no databases
    #[error("Service {service:?} does not declare any database")]
    NoDatabases { service: String },

    /// Service lists the same database twice
    #[error("Service {service:?} lists database {database:?} more than once")]
    DuplicateDependency { service: String, database: String },

    /// Service references a database this registry never declared
    #[error("Service {service:?} references database {database:?} which is not declared in this registry")]
    UnknownDatabase { service: String, database: String },
}

#[derive(Debug)]
struct PendingService {
    name: String,
    databases: Vec<DatabaseHandle>,
}

/// Collects resource declarations before validation
#[derive(Debug)]
pub struct RegistryBuilder {
    id: u64,
    root: PathBuf,
    databases: Vec<DatabaseHandle>,
    services: Vec<PendingService>,
}

impl RegistryBuilder {
    /// Creates an empty builder
    ///
    /// `root` is the directory relative migration paths are resolved against.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            id: NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed),
            root: root.into(),
            databases: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Declares a database and returns a handle services can depend on
    pub fn declare_database(&mut self, name: impl Into<String>, options: DatabaseOptions) -> DatabaseHandle {
        let name = name.into();
        debug!(database = %name, migrations = ?options.migrations, "Database declared");

        let handle = DatabaseHandle::new(DatabaseDescriptor::new(name, options.migrations), self.id);
        self.databases.push(handle.clone());
        handle
    }

    /// Declares a service and the databases it uses
    pub fn declare_service(&mut self, name: impl Into<String>, options: ServiceOptions) {
        let name = name.into();
        debug!(
            service = %name,
            databases = options.databases.len(),
            "Service declared"
        );

        self.services.push(PendingService {
            name,
            databases: options.databases,
        });
    }

    /// Validates all declarations and freezes them into a [`Registry`]
    ///
    /// # Errors
    ///
    /// Returns the first problem found, checking databases before services:
    /// - a malformed database or service name
    /// - a duplicate database or service name
    /// - a migrations directory that cannot be listed
    /// - a service with no databases, a repeated dependency, or a dependency
    ///   on a database declared elsewhere
    pub fn build(self) -> Result<Registry, RegistryError> {
        let databases = self.validate_databases()?;
        let services = self.validate_services()?;

        info!(
            databases = databases.len(),
            services = services.len(),
            "Resource registry validated"
        );

        Ok(Registry { databases, services })
    }

    fn validate_databases(&self) -> Result<Vec<Arc<DatabaseDescriptor>>, RegistryError> {
        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(self.databases.len());

        for handle in &self.databases {
            let name = handle.name();

            check_name(name).map_err(|reason| RegistryError::InvalidName {
                kind: ResourceKind::Database,
                name: name.to_string(),
                reason,
            })?;

            if !seen.insert(name) {
                warn!(database = %name, "Duplicate database declaration");
                return Err(RegistryError::DuplicateDatabase(name.to_string()));
            }

            let path = resolve_path(&self.root, handle.descriptor().migrations());
            if let Err(source) = std::fs::read_dir(&path) {
                warn!(database = %name, path = ?path, error = %source, "Migrations directory not readable");
                return Err(RegistryError::MigrationsUnreadable {
                    database: name.to_string(),
                    path,
                    source,
                });
            }

            validated.push(Arc::new(DatabaseDescriptor::new(name.to_string(), path)));
        }

        Ok(validated)
    }

    fn validate_services(&self) -> Result<Vec<ServiceDescriptor>, RegistryError> {
        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(self.services.len());

        for service in &self.services {
            check_name(&service.name).map_err(|reason| RegistryError::InvalidName {
                kind: ResourceKind::Service,
                name: service.name.clone(),
                reason,
            })?;

            if !seen.insert(service.name.as_str()) {
                warn!(service = %service.name, "Duplicate service declaration");
                return Err(RegistryError::DuplicateService(service.name.clone()));
            }

            if service.databases.is_empty() {
                return Err(RegistryError::NoDatabases {
                    service: service.name.clone(),
                });
            }

            let mut names = Vec::with_capacity(service.databases.len());
            for dependency in &service.databases {
                if !self.owns(dependency) {
                    return Err(RegistryError::UnknownDatabase {
                        service: service.name.clone(),
                        database: dependency.name().to_string(),
                    });
                }

                if names.iter().any(|n: &String| n == dependency.name()) {
                    return Err(RegistryError::DuplicateDependency {
                        service: service.name.clone(),
                        database: dependency.name().to_string(),
                    });
                }

                names.push(dependency.name().to_string());
            }

            validated.push(ServiceDescriptor::new(service.name.clone(), names));
        }

        Ok(validated)
    }

    fn owns(&self, handle: &DatabaseHandle) -> bool {
        handle.owner() == self.id && self.databases.iter().any(|declared| declared.same_as(handle))
    }
}

/// Validated, immutable set of resources
#[derive(Debug, Clone)]
pub struct Registry {
    databases: Vec<Arc<DatabaseDescriptor>>,
    services: Vec<ServiceDescriptor>,
}

impl Registry {
    /// Looks up a database by name
    pub fn database(&self, name: &str) -> Option<&DatabaseDescriptor> {
        self.databases
            .iter()
            .find(|db| db.name() == name)
            .map(|db| db.as_ref())
    }

    /// Looks up a service by name
    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|svc| svc.name() == name)
    }

    /// All databases in declaration order
    pub fn databases(&self) -> impl Iterator<Item = &DatabaseDescriptor> {
        self.databases.iter().map(|db| db.as_ref())
    }

    /// All services in declaration order
    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter()
    }

    /// Services that depend on the given database
    pub fn dependents<'a>(&'a self, database: &'a str) -> impl Iterator<Item = &'a ServiceDescriptor> {
        self.services
            .iter()
            .filter(move |svc| svc.uses_database(database))
    }
}

/// Joins a relative path onto `root`, dropping `.` components
fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    joined
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Creates a fresh directory with a `migrations/` subdirectory
    fn temp_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("userapi-registry-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(root.join("migrations")).unwrap();
        root
    }

    #[test]
    fn test_build_single_database_and_service() {
        let root = temp_root();
        let mut builder = RegistryBuilder::new(&root);
        let users = builder.declare_database("users", DatabaseOptions::new("./migrations"));
        builder.declare_service("user-api", ServiceOptions::new([users]));

        let registry = builder.build().unwrap();

        let db = registry.database("users").unwrap();
        assert_eq!(db.migrations(), root.join("migrations"));

        let service = registry.service("user-api").unwrap();
        assert_eq!(service.databases(), ["users"]);

        let dependents: Vec<_> = registry.dependents("users").map(|s| s.name()).collect();
        assert_eq!(dependents, ["user-api"]);
    }

    #[test]
    fn test_absolute_migrations_path_is_kept() {
        let root = temp_root();
        let absolute = root.join("migrations");
        let mut builder = RegistryBuilder::new("/nonexistent-root");
        let users = builder.declare_database("users", DatabaseOptions::new(&absolute));
        builder.declare_service("user-api", ServiceOptions::new([users]));

        let registry = builder.build().unwrap();
        assert_eq!(registry.database("users").unwrap().migrations(), absolute);
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let root = temp_root();
        let mut builder = RegistryBuilder::new(&root);
        let users = builder.declare_database("users", DatabaseOptions::new("migrations"));
        let audit = builder.declare_database("audit", DatabaseOptions::new("migrations"));
        builder.declare_service("user-api", ServiceOptions::new([audit.clone(), users]));
        builder.declare_service("audit-api", ServiceOptions::new([audit]));

        let registry = builder.build().unwrap();

        let databases: Vec<_> = registry.databases().map(|d| d.name()).collect();
        assert_eq!(databases, ["users", "audit"]);

        let services: Vec<_> = registry.services().map(|s| s.name()).collect();
        assert_eq!(services, ["user-api", "audit-api"]);

        assert_eq!(registry.service("user-api").unwrap().databases(), ["audit", "users"]);
        assert_eq!(registry.dependents("audit").count(), 2);
        assert_eq!(registry.dependents("users").count(), 1);
    }

    #[test]
    fn test_duplicate_database_is_rejected() {
        let root = temp_root();
        let mut builder = RegistryBuilder::new(&root);
        let first = builder.declare_database("users", DatabaseOptions::new("./migrations"));
        builder.declare_database("users", DatabaseOptions::new("./migrations"));
        builder.declare_service("user-api", ServiceOptions::new([first]));

        let err = builder.build().unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateDatabase(ref name) if name == "users"));
    }

    #[test]
    fn test_duplicate_service_is_rejected() {
        let root = temp_root();
        let mut builder = RegistryBuilder::new(&root);
        let users = builder.declare_database("users", DatabaseOptions::new("./migrations"));
        builder.declare_service("user-api", ServiceOptions::new([users.clone()]));
        builder.declare_service("user-api", ServiceOptions::new([users]));

        let err = builder.build().unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateService(ref name) if name == "user-api"));
    }

    #[test]
    fn test_missing_migrations_directory_is_rejected() {
        let root = temp_root();
        let mut builder = RegistryBuilder::new(&root);
        let users = builder.declare_database("users", DatabaseOptions::new("./does-not-exist"));
        builder.declare_service("user-api", ServiceOptions::new([users]));

        match builder.build().unwrap_err() {
            RegistryError::MigrationsUnreadable { database, path, .. } => {
                assert_eq!(database, "users");
                assert_eq!(path, root.join("does-not-exist"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_migrations_path_must_be_a_directory() {
        let root = temp_root();
        fs::write(root.join("schema.sql"), "SELECT 1;").unwrap();

        let mut builder = RegistryBuilder::new(&root);
        let users = builder.declare_database("users", DatabaseOptions::new("schema.sql"));
        builder.declare_service("user-api", ServiceOptions::new([users]));

        assert!(matches!(
            builder.build(),
            Err(RegistryError::MigrationsUnreadable { .. })
        ));
    }

    #[test]
    fn test_service_without_databases_is_rejected() {
        let root = temp_root();
        let mut builder = RegistryBuilder::new(&root);
        builder.declare_database("users", DatabaseOptions::new("./migrations"));
        builder.declare_service("user-api", ServiceOptions::default());

        assert!(matches!(
            builder.build(),
            Err(RegistryError::NoDatabases { ref service }) if service == "user-api"
        ));
    }

    #[test]
    fn test_repeated_dependency_is_rejected() {
        let root = temp_root();
        let mut builder = RegistryBuilder::new(&root);
        let users = builder.declare_database("users", DatabaseOptions::new("./migrations"));
        builder.declare_service("user-api", ServiceOptions::new([users.clone(), users]));

        assert!(matches!(
            builder.build(),
            Err(RegistryError::DuplicateDependency { ref database, .. }) if database == "users"
        ));
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let root = temp_root();
        let mut other = RegistryBuilder::new(&root);
        let foreign = other.declare_database("users", DatabaseOptions::new("./migrations"));

        let mut builder = RegistryBuilder::new(&root);
        builder.declare_database("users", DatabaseOptions::new("./migrations"));
        builder.declare_service("user-api", ServiceOptions::new([foreign]));

        assert!(matches!(
            builder.build(),
            Err(RegistryError::UnknownDatabase { ref service, ref database })
                if service == "user-api" && database == "users"
        ));
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let root = temp_root();
        let mut builder = RegistryBuilder::new(&root);
        let users = builder.declare_database("Users", DatabaseOptions::new("./migrations"));
        builder.declare_service("user-api", ServiceOptions::new([users]));

        assert!(matches!(
            builder.build(),
            Err(RegistryError::InvalidName { kind: ResourceKind::Database, .. })
        ));

        let mut builder = RegistryBuilder::new(&root);
        let users = builder.declare_database("users", DatabaseOptions::new("./migrations"));
        builder.declare_service("user api", ServiceOptions::new([users]));

        assert!(matches!(
            builder.build(),
            Err(RegistryError::InvalidName { kind: ResourceKind::Service, .. })
        ));
    }

    #[test]
    fn test_database_without_services_is_allowed() {
        let root = temp_root();
        let mut builder = RegistryBuilder::new(&root);
        builder.declare_database("users", DatabaseOptions::new("./migrations"));

        let registry = builder.build().unwrap();
        assert!(registry.database("users").is_some());
        assert_eq!(registry.services().count(), 0);
    }

    #[test]
    fn test_resolve_path_drops_current_dir() {
        let resolved = resolve_path(Path::new("/srv/app"), Path::new("./migrations"));
        assert_eq!(resolved, PathBuf::from("/srv/app/migrations"));
    }
}
