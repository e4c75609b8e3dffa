use std::{
    error::Error,
    path::{Path, PathBuf},
};

use crate::{
    catalog::Catalog,
    cli::command_handlers::{do_list, do_order, do_validate, ModuleListing},
    model::ModuleName,
    solver::Boosts,
};

mod builder;

pub use builder::ModcatBuilder;

pub struct Modcat {
    catalog_path: PathBuf,
    boosts: Boosts,
}

impl Modcat {
    pub fn builder() -> ModcatBuilder {
        ModcatBuilder::default()
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn boosts(&self) -> &Boosts {
        &self.boosts
    }

    /// Loads and validates the catalog
    pub fn validate(&self) -> Result<Catalog, Box<dyn Error>> {
        do_validate(&self.catalog_path, &self.boosts)
    }

    /// Load order for `modules` and everything they need. All modules when
    /// `modules` is empty.
    pub fn order(&self, modules: &[ModuleName]) -> Result<Vec<ModuleName>, Box<dyn Error>> {
        do_order(&self.catalog_path, &self.boosts, modules)
    }

    /// Describes every module in the catalog, valid or not
    pub fn list(&self) -> Result<Vec<ModuleListing>, Box<dyn Error>> {
        do_list(&self.catalog_path, &self.boosts)
    }
}
