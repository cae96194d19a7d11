//! Postgres-backed catalog for the marketplace: users, datasets, shares,
//! purchases, and audit logs.
//!
//! There is no meta service reached over the network here — the data plane
//! and the marketplace API both hold a `Catalog` directly and talk to
//! Postgres through [`sqlx`]. Repository functions are grouped by entity
//! into their own modules rather than inherent methods on one god struct,
//! mirroring how the teacher's SQL layer is organized around `Row` shapes
//! plus free functions per operation.

pub mod audit_logs;
pub mod datasets;
pub mod models;
pub mod purchases;
pub mod shares;
pub mod users;

use mktplace_common::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Embedded migrations, applied with [`Catalog::migrate`].
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// A handle to the catalog database. Cheaply clonable; wraps a connection
/// pool shared across the process.
#[derive(Clone)]
pub struct Catalog {
    pool: PgPool,
}

impl Catalog {
    /// Connect and return a handle. Does not run migrations — call
    /// [`Catalog::migrate`] explicitly at startup.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| Error::configuration(format!("failed to connect to catalog database: {e}")))?;
        Ok(Self { pool })
    }

    /// Apply any pending migrations. Safe to call on every startup.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| Error::configuration(format!("catalog migration failed: {e}")))
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}
