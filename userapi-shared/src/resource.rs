/// Resource descriptors
///
/// A deployment is described by two kinds of resources:
///
/// - **Databases**: a logical database plus the directory holding its
///   schema migrations.
/// - **Services**: a named unit of deployment and the databases it uses.
///
/// Descriptors are plain immutable records. They are declared through a
/// [`RegistryBuilder`](crate::registry::RegistryBuilder), which hands back a
/// [`DatabaseHandle`] for every database so services can reference it.
///
/// # Example
///
/// ```
/// use userapi_shared::registry::RegistryBuilder;
/// use userapi_shared::resource::{DatabaseOptions, ServiceOptions};
///
/// let mut builder = RegistryBuilder::new(".");
/// let db = builder.declare_database("orders", DatabaseOptions::new("./migrations"));
/// builder.declare_service("order-api", ServiceOptions::new([db]));
/// ```

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longest accepted resource name
pub const MAX_NAME_LEN: usize = 63;

/// Kind of a declared resource, used in error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Database,
    Service,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Database => write!(f, "database"),
            ResourceKind::Service => write!(f, "service"),
        }
    }
}

/// Options accepted when declaring a database
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// Migrations directory. Relative paths resolve against the registry root.
    pub migrations: PathBuf,
}

impl DatabaseOptions {
    pub fn new(migrations: impl Into<PathBuf>) -> Self {
        Self {
            migrations: migrations.into(),
        }
    }
}

/// Options accepted when declaring a service
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Databases the service uses, in declaration order
    pub databases: Vec<DatabaseHandle>,
}

impl ServiceOptions {
    pub fn new(databases: impl IntoIterator<Item = DatabaseHandle>) -> Self {
        Self {
            databases: databases.into_iter().collect(),
        }
    }
}

/// A logical database and its migration source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseDescriptor {
    name: String,
    migrations: PathBuf,
}

impl DatabaseDescriptor {
    pub(crate) fn new(name: String, migrations: PathBuf) -> Self {
        Self { name, migrations }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Migrations directory.
    ///
    /// As declared on a [`DatabaseHandle`]; resolved against the registry
    /// root once the registry has been built.
    pub fn migrations(&self) -> &Path {
        &self.migrations
    }
}

/// A named service and the databases it depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    name: String,
    databases: Vec<String>,
}

impl ServiceDescriptor {
    pub(crate) fn new(name: String, databases: Vec<String>) -> Self {
        Self { name, databases }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the databases this service uses, in declaration order
    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    pub fn uses_database(&self, database: &str) -> bool {
        self.databases.iter().any(|db| db == database)
    }
}

/// Opaque reference to a declared database
///
/// Only a [`RegistryBuilder`](crate::registry::RegistryBuilder) creates
/// handles. A handle remembers which builder declared it, so a service can
/// never reference a database that belongs to a different registry.
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    descriptor: Arc<DatabaseDescriptor>,
    owner: u64,
}

impl DatabaseHandle {
    pub(crate) fn new(descriptor: DatabaseDescriptor, owner: u64) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            owner,
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &DatabaseDescriptor {
        &self.descriptor
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner
    }

    pub(crate) fn same_as(&self, other: &DatabaseHandle) -> bool {
        Arc::ptr_eq(&self.descriptor, &other.descriptor)
    }
}

/// Checks a resource name
///
/// Names start with an ASCII lowercase letter, continue with lowercase
/// letters, digits, `-` or `_`, and are at most [`MAX_NAME_LEN`] long.
///
/// Returns a short reason on failure.
pub fn check_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }

    if name.len() > MAX_NAME_LEN {
        return Err("name is longer than 63 characters");
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return Err("name must start with a lowercase letter");
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
        return Err("name may only contain lowercase letters, digits, '-' and '_'");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_name_accepts_valid_names() {
        assert!(check_name("users").is_ok());
        assert!(check_name("user-api").is_ok());
        assert!(check_name("audit_log2").is_ok());
    }

    #[test]
    fn test_check_name_rejects_invalid_names() {
        assert_eq!(check_name(""), Err("name is empty"));
        assert!(check_name("Users").is_err());
        assert!(check_name("1users").is_err());
        assert!(check_name("-users").is_err());
        assert!(check_name("user api").is_err());
        assert!(check_name("users.db").is_err());
        assert!(check_name(&"a".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(check_name(&"a".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_service_uses_database() {
        let service = ServiceDescriptor::new(
            "user-api".to_string(),
            vec!["users".to_string(), "audit".to_string()],
        );

        assert!(service.uses_database("users"));
        assert!(service.uses_database("audit"));
        assert!(!service.uses_database("billing"));
        assert_eq!(service.databases(), ["users", "audit"]);
    }

    #[test]
    fn test_handles_compare_by_identity() {
        let first = DatabaseHandle::new(
            DatabaseDescriptor::new("users".to_string(), PathBuf::from("./migrations")),
            1,
        );
        let clone = first.clone();
        let other = DatabaseHandle::new(
            DatabaseDescriptor::new("users".to_string(), PathBuf::from("./migrations")),
            1,
        );

        assert!(first.same_as(&clone));
        assert!(!first.same_as(&other));
        assert_eq!(first.descriptor(), other.descriptor());
    }

    #[test]
    fn test_resource_kind_display() {
        assert_eq!(ResourceKind::Database.to_string(), "database");
        assert_eq!(ResourceKind::Service.to_string(), "service");
    }
}
