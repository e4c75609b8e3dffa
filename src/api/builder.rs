use std::{env, error::Error, path::PathBuf};

use log::debug;

use crate::{config::ModcatConfig, solver::Boosts, Modcat};

const DEFAULT_CONFIG_FILE_NAME: &str = "modcat.toml";
const DEFAULT_CATALOG_FILE_NAME: &str = "catalog.toml";

#[derive(Default)]
pub struct ModcatBuilder {
    // All other paths are relative to `root`
    root: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
    config_file: Option<PathBuf>,
    boosts: Vec<(String, i64)>,
}

impl ModcatBuilder {
    /// Project root directory.
    ///
    /// Defaults to the current directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Catalog file, or a directory of catalog files.
    ///
    /// Defaults to the configured `catalog.path`, then `catalog.toml`.
    pub fn catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    /// Configuration file holding the catalog path and solver boosts.
    ///
    /// Defaults to `modcat.toml` when that file exists.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Boost for one module, taking precedence over the configured one.
    pub fn boost(mut self, module: impl Into<String>, boost: i64) -> Self {
        self.boosts.push((module.into(), boost));
        self
    }

    pub fn try_build(self) -> Result<Modcat, Box<dyn Error>> {
        let Self {
            root,
            catalog_path,
            config_file,
            boosts,
        } = self;
        let root = match root {
            Some(root) => root,
            None => env::current_dir()?,
        };

        let config_file = match config_file {
            Some(file) => Some(root.join(file)),
            None => Some(root.join(DEFAULT_CONFIG_FILE_NAME)).filter(|f| f.is_file()),
        };
        debug!("Using configuration file {:?}", config_file);
        let config = ModcatConfig::load(config_file.as_deref())?;

        let catalog_path = root.join(
            catalog_path
                .or(config.catalog_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_FILE_NAME)),
        );

        let mut all_boosts: Boosts = config.boosts;
        for (module, boost) in boosts {
            all_boosts.insert(module, boost);
        }

        Ok(Modcat {
            catalog_path,
            boosts: all_boosts,
        })
    }
}
