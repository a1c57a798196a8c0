/// Database plumbing
///
/// - `pool`: PostgreSQL connection pools with health checks
/// - `migrations`: applies each database's migrations directory with sqlx

pub mod migrations;
pub mod pool;
