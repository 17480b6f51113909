//! Tenant Database Provisioning
//!
//! PostgreSQL databases with a dedicated owner role each. Credentials are
//! kept, encrypted, in a registry table in Xylem's own database.

pub mod catalog;
pub mod cipher;
pub mod credentials;
pub mod provisioner;
pub mod registry;
pub mod selector;

pub use catalog::PgCatalogConnector;
pub use cipher::CredentialCipher;
pub use credentials::validate_database_name;
pub use provisioner::DatabaseProvisioner;
pub use registry::PgRegistry;
pub use selector::{FixedSelector, RandomSelector};
