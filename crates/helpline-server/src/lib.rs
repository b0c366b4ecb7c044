//! Helpline server.
//!
//! This crate provides the production service around the queue engine:
//! - axum for the JSON HTTP API
//! - Tokio for the async runtime
//! - System wall clock and a file-backed queue document
//!
//! ## Architecture
//!
//! ```text
//! helpline-server
//!   ├─ Config          (TOML config + staff credentials)
//!   ├─ AccessFilter    (CIDR allow-list, reverse-DNS suffix fallback)
//!   ├─ HelpDesk        (validation, secrets, staff checks)
//!   │    └─ QueueStore (helpline-core, SystemEnv + FileStorage)
//!   └─ router          (axum routes, error → status mapping)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod api;
pub mod config;
mod error;
pub mod service;
mod system_env;

use std::{net::SocketAddr, sync::Arc};

pub use access::{AccessFilter, NoReverseLookup, ReverseResolver, SystemReverseLookup};
pub use api::router;
pub use config::{AccessConfig, Config, ConfigError, Credentials};
pub use error::ServerError;
use helpline_core::{FileStorage, QueueStore, SecretIssuer};
pub use service::{HelpDesk, JoinReceipt, JoinRequest, ServiceError};
pub use system_env::SystemEnv;
use tokio::net::TcpListener;

/// Production help desk type.
pub type ProductionDesk = HelpDesk<SystemEnv, FileStorage>;

/// Production Helpline server.
///
/// Owns the bound listener and the help desk it serves.
pub struct Server {
    listener: TcpListener,
    desk: Arc<ProductionDesk>,
}

impl Server {
    /// Restore the queue and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The auth secret or access ranges are unusable
    /// - Binding to the address fails
    pub async fn bind(config: Config, credentials: Credentials) -> Result<Self, ServerError> {
        let issuer = SecretIssuer::new(config.auth_secret.as_bytes())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let access = access_filter(&config)?;

        let store = QueueStore::open(
            SystemEnv::new(),
            FileStorage::new(&config.store_path),
            config.policy(),
        );
        let desk = Arc::new(HelpDesk::new(Arc::new(store), issuer, credentials, access));

        let listener = TcpListener::bind(config.listen_address.as_str()).await?;

        Ok(Self { listener, desk })
    }

    /// Serve requests until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        let app = router(Arc::clone(&self.desk));
        axum::serve(self.listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// The help desk being served.
    pub fn desk(&self) -> &Arc<ProductionDesk> {
        &self.desk
    }
}

/// Build the access filter. Reverse DNS is only wired in when a trusted
/// suffix is configured.
fn access_filter(config: &Config) -> Result<Option<AccessFilter>, ConfigError> {
    let Some(access) = &config.access else {
        tracing::warn!("No [access] section configured; student routes are open to all");
        return Ok(None);
    };

    if access.trusted_suffix.is_none() {
        return AccessFilter::from_config(access, NoReverseLookup).map(Some);
    }

    let filter = match SystemReverseLookup::from_system_conf() {
        Ok(resolver) => AccessFilter::from_config(access, resolver)?,
        Err(e) => {
            tracing::warn!("{}; trusted_suffix is ignored, only CIDR ranges apply", e);
            AccessFilter::from_config(access, NoReverseLookup)?
        },
    };
    Ok(Some(filter))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
