//! # user-api shared runtime
//!
//! Resource declaration and provisioning used by the user-api server.
//!
//! ## Module Organization
//!
//! - `resource`: database and service descriptors
//! - `registry`: two-phase declaration and validation of resources
//! - `db`: connection pools and migrations
//! - `runtime`: the provisioned application context

pub mod db;
pub mod registry;
pub mod resource;
pub mod runtime;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
