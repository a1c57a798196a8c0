/// Resource declarations for user-api
///
/// One database, `users`, migrated from `./migrations`, and one service,
/// `user-api`, that depends on it. Validation happens when the registry is
/// built, not here.

use userapi_shared::registry::RegistryBuilder;
use userapi_shared::resource::{DatabaseOptions, ServiceOptions};

pub const USERS_DATABASE: &str = "users";
pub const USERS_MIGRATIONS: &str = "./migrations";
pub const SERVICE_NAME: &str = "user-api";

pub fn declare(registry: &mut RegistryBuilder) {
    let users = registry.declare_database(USERS_DATABASE, DatabaseOptions::new(USERS_MIGRATIONS));

    registry.declare_service(SERVICE_NAME, ServiceOptions::new([users]));
}
