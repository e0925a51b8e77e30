//! Conversion of command-line arguments into a `RemovalConfig`

use super::main_impl::Cli;
use crate::{config::RemovalConfig, models::ModelSpec, utils::ExecutionProviderManager};
use anyhow::{Context, Result};

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the removal configuration from parsed arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemovalConfig> {
        let (backend_type, execution_provider) =
            ExecutionProviderManager::parse_provider_string(&cli.execution_provider)
                .context("Invalid execution provider")?;

        let model = cli
            .model
            .as_deref()
            .map_or_else(ModelSpec::default, ModelSpec::parse)
            .with_variant(cli.variant.clone());

        RemovalConfig::builder()
            .model(model)
            .backend_type(backend_type)
            .execution_provider(execution_provider)
            .num_threads(cli.threads)
            .cache_dir(cli.cache_dir.clone())
            .build()
            .context("Failed to build removal configuration")
    }
}
