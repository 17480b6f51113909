//! Tenant Server Catalog
//!
//! Admin sessions on the tenant PostgreSQL servers. `CREATE USER` and
//! `CREATE DATABASE` are utility statements that take no bind parameters,
//! so identifiers and the password literal are quoted here.

use crate::config::DatabaseServer;
use crate::database::registry::has_sqlstate;
use crate::domain::ports::{CatalogConnector, CatalogSession};
use crate::error::{Error, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};
use tracing::debug;

/// SQLSTATE duplicate_database
const DUPLICATE_DATABASE: &str = "42P04";

/// Maintenance database admin sessions connect to
const ADMIN_DATABASE: &str = "postgres";

/// Quote an identifier for interpolation
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal for interpolation
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Opens admin sessions with sqlx
#[derive(Debug, Clone, Default)]
pub struct PgCatalogConnector;

impl PgCatalogConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CatalogConnector for PgCatalogConnector {
    async fn connect(&self, server: &DatabaseServer) -> Result<Box<dyn CatalogSession>> {
        let mut options = PgConnectOptions::new()
            .host(server.connect_host())
            .port(server.port)
            .username(&server.username)
            .database(ADMIN_DATABASE);
        if let Some(password) = &server.password {
            options = options.password(password);
        }

        debug!(
            "Connecting to {}:{} as {}",
            server.connect_host(),
            server.port,
            server.username
        );
        let conn = PgConnection::connect_with(&options).await?;

        Ok(Box::new(PgCatalogSession { conn }))
    }
}

/// One admin connection
pub struct PgCatalogSession {
    conn: PgConnection,
}

#[async_trait]
impl CatalogSession for PgCatalogSession {
    async fn database_exists(&mut self, name: &str) -> Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM pg_database WHERE datname = $1")
            .bind(name)
            .fetch_optional(&mut self.conn)
            .await?;
        Ok(row.is_some())
    }

    async fn create_user(&mut self, username: &str, password: &str) -> Result<()> {
        let sql = format!(
            "CREATE USER {} WITH ENCRYPTED PASSWORD {};",
            quote_ident(username),
            quote_literal(password)
        );
        self.conn.execute(sqlx::raw_sql(&sql)).await?;
        Ok(())
    }

    async fn create_database(&mut self, name: &str, owner: &str) -> Result<()> {
        let sql = format!(
            "CREATE DATABASE {} ENCODING 'UTF8' OWNER {};",
            quote_ident(name),
            quote_ident(owner)
        );
        match self.conn.execute(sqlx::raw_sql(&sql)).await {
            Ok(_) => Ok(()),
            Err(e) if has_sqlstate(&e, DUPLICATE_DATABASE) => Err(Error::Conflict {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn drop_user(&mut self, username: &str) -> Result<()> {
        let sql = format!("DROP USER IF EXISTS {};", quote_ident(username));
        self.conn.execute(sqlx::raw_sql(&sql)).await?;
        Ok(())
    }

    async fn drop_database(&mut self, name: &str) -> Result<()> {
        let sql = format!("DROP DATABASE IF EXISTS {};", quote_ident(name));
        self.conn.execute(sqlx::raw_sql(&sql)).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let PgCatalogSession { conn } = *self;
        conn.close().await?;
        Ok(())
    }
}
