//! Database Registry
//!
//! The `databases` table in Xylem's own database records every database this
//! service provisioned. Uniqueness of `name` is enforced by the table, not by
//! any in-process lock.

use crate::config::RegistryDbConfig;
use crate::domain::ports::{DatabaseRecord, DatabaseRegistry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info};

/// SQLSTATE duplicate_table
pub(crate) const DUPLICATE_TABLE: &str = "42P07";
/// SQLSTATE unique_violation
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

const CREATE_TABLE: &str = "CREATE TABLE databases (name varchar(66) UNIQUE, \
     host varchar(256), username varchar(256), password varchar(256));";

const FIND_RECORD: &str =
    "SELECT name, host, username, password FROM databases WHERE name = $1";

const INSERT_RECORD: &str =
    "INSERT INTO databases (name, host, username, password) VALUES ($1, $2, $3, $4)";

/// SQLSTATE carried by `err`, if it came from the server
pub(crate) fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned())
}

/// Whether `err` is a database error with SQLSTATE `code`
pub(crate) fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    sqlstate(err).as_deref() == Some(code)
}

/// Whether a failed `CREATE TABLE` left the registry usable
fn table_already_exists(code: Option<&str>) -> bool {
    code == Some(DUPLICATE_TABLE)
}

/// [`DatabaseRegistry`] stored in PostgreSQL
pub struct PgRegistry {
    pool: PgPool,
}

impl PgRegistry {
    /// Build a registry; connections are opened lazily, one per query
    pub fn new(config: &RegistryDbConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.name);

        let pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(2)
            .connect_lazy_with(options);

        Self { pool }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabaseRegistry for PgRegistry {
    async fn bootstrap(&self) -> Result<()> {
        match sqlx::raw_sql(CREATE_TABLE).execute(&self.pool).await {
            Ok(_) => {
                info!("Created registry table");
                Ok(())
            }
            Err(e) if table_already_exists(sqlstate(&e).as_deref()) => {
                debug!("Registry table already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find(&self, name: &str) -> Result<Option<DatabaseRecord>> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(FIND_RECORD)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(name, host, username, password)| DatabaseRecord {
            name,
            host,
            username,
            password,
        }))
    }

    async fn insert(&self, record: &DatabaseRecord) -> Result<()> {
        let result = sqlx::query(INSERT_RECORD)
            .bind(&record.name)
            .bind(&record.host)
            .bind(&record.username)
            .bind(&record.password)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if has_sqlstate(&e, UNIQUE_VIOLATION) => Err(Error::RegistryConflict {
                name: record.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
