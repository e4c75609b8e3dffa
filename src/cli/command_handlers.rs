use log::{debug, info, warn};

use crate::{
    catalog::Catalog,
    loader::{CatalogLoader, FileCatalogLoader},
    model::{ModuleDescriptor, ModuleName},
    solver::Boosts,
};
use std::{error::Error, path::Path};

/// One row of the `list` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleListing {
    pub module: ModuleDescriptor,
    pub group: Option<String>,
    pub placement: Option<String>,
}

/// Handler to validate command
/// Loads every catalog file under `catalog_path` and runs all structural checks
pub fn do_validate(catalog_path: &Path, boosts: &Boosts) -> Result<Catalog, Box<dyn Error>> {
    let loader = FileCatalogLoader::new(catalog_path);
    let mut catalog = Catalog::new(boosts.clone());
    catalog.initialize(&loader)?;

    info!(
        "Catalog {} is valid ({} modules, {} groups)",
        loader.path().display(),
        catalog.len(),
        catalog.groups().count()
    );
    Ok(catalog)
}

/// Handler to order command
/// Computes the load order of `modules` plus everything they depend on
pub fn do_order(
    catalog_path: &Path,
    boosts: &Boosts,
    modules: &[ModuleName],
) -> Result<Vec<ModuleName>, Box<dyn Error>> {
    let catalog = do_validate(catalog_path, boosts)?;

    let seeds: Vec<ModuleName> = if modules.is_empty() {
        debug!("No modules requested, ordering every available module");
        catalog.available_modules().map(|m| m.name.clone()).collect()
    } else {
        modules.to_vec()
    };

    let order = catalog
        .complete_list_with_dependencies(&seeds)?
        .into_iter()
        .map(|m| m.name.clone())
        .collect();
    Ok(order)
}

/// Handler to list command
/// Lists modules even when the catalog does not validate
pub fn do_list(catalog_path: &Path, boosts: &Boosts) -> Result<Vec<ModuleListing>, Box<dyn Error>> {
    let mut catalog = Catalog::new(boosts.clone());
    FileCatalogLoader::new(catalog_path).load(&mut catalog)?;

    if let Err(err) = catalog.validate() {
        warn!("Catalog {} is not valid: {err}", catalog_path.display());
    }

    let listing = catalog
        .modules()
        .map(|module| {
            let group = catalog.group_of(&module.name);
            ModuleListing {
                module: module.clone(),
                group: group.map(|g| g.name.clone()),
                placement: group.and_then(|g| g.placement.clone()),
            }
        })
        .collect();
    Ok(listing)
}
