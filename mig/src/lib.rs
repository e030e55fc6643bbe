//! # Mig
//!
//! Schema migrations that every service instance registers and runs on
//! startup. Each step is applied once per database, tracked by the hash of
//! its normalized text, and runs from concurrent instances are serialized by
//! a database lock.
//!
//! Backends are enabled with the `postgres` (default) and `mysql` features.

#![deny(missing_docs)]

pub use mig_core::*;

#[cfg(feature = "postgres")]
/// The PostgreSQL backend.
pub mod pg {
    //! Re-exports the `mig_pg` crate.
    pub use mig_pg::*;
}

#[cfg(feature = "mysql")]
/// The MySQL backend.
pub mod mysql {
    //! Re-exports the `mig_mysql` crate.
    pub use mig_mysql::*;
}

pub mod prelude {
    //! The prelude module for the `mig` crate.
    pub use mig_core::prelude::*;

    #[cfg(feature = "postgres")]
    pub use super::pg::PgDatabase;
    #[cfg(feature = "mysql")]
    pub use super::mysql::MySqlDatabase;
}
