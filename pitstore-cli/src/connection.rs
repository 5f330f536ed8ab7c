//! Connection options shared by every subcommand.
//!
//! Options layer in the usual order: CLI flags, then `PITSTORE_CMDS_DB_*`
//! environment variables, then the `[cmds.db]` table of a configuration
//! file. Once merged, an explicit `--database-url` wins over the
//! `DATABASE_URL` environment variable, which wins over the discrete fields.

use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use pitstore_core::TableName;
use pitstore_postgis::{ConnectionDescriptor, DATABASE_URL_ENV, DEFAULT_POOL_SIZE, PitStore};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_DATABASE_URL, ARG_HOST, ARG_PASSWORD, ARG_POOL_SIZE, ARG_PORT, ARG_TABLE,
    ARG_USER, CliError,
};

/// Connection and table options.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "db")]
#[ortho_config(prefix = "PITSTORE")]
pub(crate) struct ConnectionArgs {
    /// Full connection URL, e.g. `postgres://user@host:5432/db`.
    #[arg(long = ARG_DATABASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) database_url: Option<String>,
    /// Server host (default `localhost`).
    #[arg(long = ARG_HOST, value_name = "host")]
    #[serde(default)]
    pub(crate) host: Option<String>,
    /// Server port (default 5432).
    #[arg(long = ARG_PORT, value_name = "port")]
    #[serde(default)]
    pub(crate) port: Option<u16>,
    /// Role to connect as (default `postgres`).
    #[arg(long = ARG_USER, value_name = "user")]
    #[serde(default)]
    pub(crate) user: Option<String>,
    /// Password for the role.
    #[arg(long = ARG_PASSWORD, value_name = "password")]
    #[serde(default)]
    pub(crate) password: Option<String>,
    /// Database name (default `postgres`).
    #[arg(long = ARG_DATABASE, value_name = "name")]
    #[serde(default)]
    pub(crate) database: Option<String>,
    /// Maximum pooled connections (default 10).
    #[arg(long = ARG_POOL_SIZE, value_name = "count")]
    #[serde(default)]
    pub(crate) pool_size: Option<usize>,
    /// PIT table name (default `pits`).
    #[arg(long = ARG_TABLE, value_name = "name")]
    #[serde(default)]
    pub(crate) table: Option<String>,
}

impl ConnectionArgs {
    pub(crate) fn into_config(self) -> Result<ConnectionConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        let environment = std::env::var(DATABASE_URL_ENV).ok();
        ConnectionConfig::resolve(merged, environment.as_deref())
    }
}

/// Resolved connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConnectionConfig {
    pub(crate) descriptor: ConnectionDescriptor,
    pub(crate) pool_size: usize,
    pub(crate) table: TableName,
}

impl ConnectionConfig {
    /// Resolve merged arguments against the `DATABASE_URL` value, if any.
    pub(crate) fn resolve(
        args: ConnectionArgs,
        environment_url: Option<&str>,
    ) -> Result<Self, CliError> {
        let defaults = ConnectionDescriptor::default();
        let fields = ConnectionDescriptor {
            host: args.host.unwrap_or(defaults.host),
            port: args.port.unwrap_or(defaults.port),
            user: args.user.unwrap_or(defaults.user),
            password: args.password,
            database: args.database.unwrap_or(defaults.database),
        };
        let descriptor =
            ConnectionDescriptor::resolve(args.database_url.as_deref(), environment_url, fields)?;
        let table = args
            .table
            .map_or_else(|| Ok(TableName::default()), TableName::new)?;
        Ok(Self {
            descriptor,
            pool_size: args.pool_size.unwrap_or(DEFAULT_POOL_SIZE),
            table,
        })
    }

    pub(crate) fn into_store(self) -> Result<PitStore, CliError> {
        let pool = self.descriptor.create_pool(self.pool_size)?;
        Ok(PitStore::new(pool, self.table))
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
    environment_url: Option<&str>,
) -> Result<ConnectionConfig, CliError> {
    let merged = ConnectionArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ConnectionConfig::resolve(merged, environment_url)
}
