use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::solver::Boosts;

pub struct ModcatConfig {
    pub catalog_path: Option<PathBuf>,
    pub boosts: Boosts,
}

impl ModcatConfig {
    /// Reads the optional config file, then `MODCAT_*` environment variables
    /// on top of it.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let raw_config = RawConfig::load(file, None)?;

        Ok(Self {
            catalog_path: raw_config.catalog.path,
            boosts: raw_config.solver.boosts.into_iter().collect(),
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    catalog: CatalogConfig,
    #[serde(default)]
    solver: SolverConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CatalogConfig {
    path: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct SolverConfig {
    #[serde(default)]
    boosts: HashMap<String, i64>,
}

impl RawConfig {
    fn load(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml));
        }
        builder
            .add_source(
                Environment::with_prefix("MODCAT")
                    .separator("_")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
