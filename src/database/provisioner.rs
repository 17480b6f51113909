//! Database Provisioner
//!
//! Reconciles a requested database name against the registry and the
//! catalog of a tenant server:
//!
//! - registered: return the stored credentials without touching any server
//! - absent everywhere: create user + database, record them, return the
//!   plaintext password (the only time it leaves the service unencrypted)
//! - on the server but unregistered: refuse, the database is not ours
//!
//! A database that cannot be recorded is dropped again with its owner, so a
//! failed insert never leaves an unregistered database behind.

use crate::config::{DatabaseServer, PostgresConfig};
use crate::database::cipher::CredentialCipher;
use crate::database::credentials::{generate_password, generate_username, validate_database_name};
use crate::database::selector::RandomSelector;
use crate::domain::ports::{
    CatalogConnectorRef, CatalogSession, DatabaseDescriptor, DatabaseRecord, DatabaseRegistryRef,
    ServerSelectorRef,
};
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Provisions tenant databases and their owners
pub struct DatabaseProvisioner {
    servers: Vec<DatabaseServer>,
    cipher: CredentialCipher,
    registry: DatabaseRegistryRef,
    connector: CatalogConnectorRef,
    selector: ServerSelectorRef,
}

impl DatabaseProvisioner {
    pub fn new(
        config: &PostgresConfig,
        registry: DatabaseRegistryRef,
        connector: CatalogConnectorRef,
    ) -> Self {
        Self {
            servers: config.servers.clone(),
            cipher: CredentialCipher::new(&config.key),
            registry,
            connector,
            selector: Arc::new(RandomSelector),
        }
    }

    /// Replace the server selection policy
    pub fn with_selector(mut self, selector: ServerSelectorRef) -> Self {
        self.selector = selector;
        self
    }

    /// Prepare the registry table
    pub async fn initialize(&self) -> Result<()> {
        self.registry.bootstrap().await
    }

    /// Ensure `name` exists, returning its connection details
    pub async fn ensure_database(&self, name: &str) -> Result<DatabaseDescriptor> {
        validate_database_name(name)?;

        if let Some(record) = self.registry.find(name).await? {
            info!("Database found {} on {}", name, record.host);
            return self.describe(record);
        }

        let server = self
            .selector
            .select(&self.servers)
            .ok_or_else(|| Error::Configuration("no database servers configured".into()))?;

        let mut session = self.connector.connect(server).await?;
        let outcome = self.provision_on(session.as_mut(), server, name).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close session on {}: {}", server.hostname, e);
        }

        outcome
    }

    async fn provision_on(
        &self,
        session: &mut dyn CatalogSession,
        server: &DatabaseServer,
        name: &str,
    ) -> Result<DatabaseDescriptor> {
        if session.database_exists(name).await? {
            warn!("Database {} exists on {} but is not registered", name, server.hostname);
            return Err(Error::Conflict {
                name: name.to_string(),
            });
        }

        let username = generate_username();
        let password = generate_password();

        session.create_user(&username, &password).await?;

        if let Err(e) = session.create_database(name, &username).await {
            if let Err(drop_err) = session.drop_user(&username).await {
                warn!("Failed to drop orphaned user {}: {}", username, drop_err);
            }
            return match e {
                Error::Conflict { .. } => self.resolve_race(name).await,
                e => Err(e),
            };
        }

        let record = DatabaseRecord {
            name: name.to_string(),
            host: server.hostname.clone(),
            username: username.clone(),
            password: self.cipher.encrypt(&password)?,
        };

        match self.registry.insert(&record).await {
            Ok(()) => {
                info!("Database provisioned {} on {}", name, server.hostname);
                Ok(DatabaseDescriptor {
                    name: record.name,
                    host: record.host,
                    username,
                    password,
                })
            }
            Err(e) => {
                warn!(
                    "Failed to record {} on {}, dropping it: {}",
                    name, server.hostname, e
                );
                roll_back(session, server, name, &username).await;
                match e {
                    Error::RegistryConflict { .. } => self.resolve_race(name).await,
                    e => Err(e),
                }
            }
        }
    }

    /// Another call got there first; whatever the registry says wins
    async fn resolve_race(&self, name: &str) -> Result<DatabaseDescriptor> {
        match self.registry.find(name).await? {
            Some(record) => self.describe(record),
            None => Err(Error::Conflict {
                name: name.to_string(),
            }),
        }
    }

    fn describe(&self, record: DatabaseRecord) -> Result<DatabaseDescriptor> {
        let password = self.cipher.decrypt(&record.password)?;
        Ok(DatabaseDescriptor {
            name: record.name,
            host: record.host,
            username: record.username,
            password,
        })
    }
}

/// Best-effort removal of a database and owner this call created
async fn roll_back(
    session: &mut dyn CatalogSession,
    server: &DatabaseServer,
    name: &str,
    username: &str,
) {
    if let Err(e) = session.drop_database(name).await {
        warn!("Failed to drop database {} on {}: {}", name, server.hostname, e);
    }
    if let Err(e) = session.drop_user(username).await {
        warn!("Failed to drop user {} on {}: {}", username, server.hostname, e);
    }
}
