//! Connection descriptors and pool construction.
//!
//! A [`ConnectionDescriptor`] is resolved from, in order of precedence, an
//! explicit database URL, the `DATABASE_URL` environment variable, and
//! finally discrete fields whose defaults target a local server.

use std::str::FromStr;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{NoTls, config::Host};

use crate::{ConnectionUrlError, PoolBuildError};

/// Environment variable consulted when no explicit URL is given.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Default maximum number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Role to authenticate as.
    pub user: String,
    /// Password, if the server asks for one.
    pub password: Option<String>,
    /// Database name.
    pub database: String,
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5432,
            user: "postgres".to_owned(),
            password: None,
            database: "postgres".to_owned(),
        }
    }
}

impl ConnectionDescriptor {
    /// Parse a `postgres://` URL or key/value connection string.
    ///
    /// Components the URL leaves out take the [`Default`] values.
    ///
    /// # Examples
    /// ```
    /// use pitstore_postgis::ConnectionDescriptor;
    ///
    /// let descriptor = ConnectionDescriptor::from_url("postgres://histograph@db:6543/pits")?;
    /// assert_eq!(descriptor.host, "db");
    /// assert_eq!(descriptor.port, 6543);
    /// assert_eq!(descriptor.user, "histograph");
    /// assert_eq!(descriptor.database, "pits");
    /// assert_eq!(descriptor.password, None);
    /// # Ok::<(), pitstore_postgis::ConnectionUrlError>(())
    /// ```
    pub fn from_url(url: &str) -> Result<Self, ConnectionUrlError> {
        let config = tokio_postgres::Config::from_str(url)
            .map_err(|source| ConnectionUrlError::Parse { source })?;
        let defaults = Self::default();
        let host = match config.get_hosts().first() {
            Some(Host::Tcp(host)) => host.clone(),
            Some(other) => {
                return Err(ConnectionUrlError::UnsupportedHost {
                    host: format!("{other:?}"),
                });
            }
            None => defaults.host,
        };
        Ok(Self {
            host,
            port: config.get_ports().first().copied().unwrap_or(defaults.port),
            user: config.get_user().map_or(defaults.user, str::to_owned),
            password: config
                .get_password()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
            database: config.get_dbname().map_or(defaults.database, str::to_owned),
        })
    }

    /// Pick the descriptor to use.
    ///
    /// `explicit` wins over `environment`, which wins over `fields`.
    pub fn resolve(
        explicit: Option<&str>,
        environment: Option<&str>,
        fields: Self,
    ) -> Result<Self, ConnectionUrlError> {
        match explicit.or(environment) {
            Some(url) => Self::from_url(url),
            None => Ok(fields),
        }
    }

    /// [`ConnectionDescriptor::resolve`] against the process environment.
    pub fn from_env(explicit: Option<&str>, fields: Self) -> Result<Self, ConnectionUrlError> {
        let environment = std::env::var(DATABASE_URL_ENV).ok();
        Self::resolve(explicit, environment.as_deref(), fields)
    }

    /// Driver configuration for this descriptor.
    #[must_use]
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(&self.database);
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }

    /// Build a pool holding at most `max_size` connections.
    ///
    /// Connections are opened lazily, so this succeeds even when the server
    /// is unreachable.
    pub fn create_pool(&self, max_size: usize) -> Result<Pool, PoolBuildError> {
        let mut manager_config = ManagerConfig::default();
        manager_config.recycling_method = RecyclingMethod::Fast;
        let manager = Manager::from_config(self.to_pg_config(), NoTls, manager_config);
        Pool::builder(manager)
            .max_size(max_size.max(1))
            .build()
            .map_err(|source| PoolBuildError { source })
    }
}
