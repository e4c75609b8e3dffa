mod file;

pub use file::FileCatalogLoader;

use crate::{catalog::Catalog, model::CatalogItem};

/// Populates a catalog from wherever module descriptors live.
///
/// Every call must add the full set of descriptors through the catalog's add
/// operations; the catalog is cleared before a reload.
pub trait CatalogLoader {
    fn load(&self, catalog: &mut Catalog) -> anyhow::Result<()>;
}

impl<L> CatalogLoader for &L
where
    L: CatalogLoader + ?Sized,
{
    fn load(&self, catalog: &mut Catalog) -> anyhow::Result<()> {
        (**self).load(catalog)
    }
}

/// Loader over a fixed list of items, for hosts that build their catalog in
/// code.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogLoader {
    items: Vec<CatalogItem>,
}

impl StaticCatalogLoader {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        StaticCatalogLoader { items }
    }
}

impl CatalogLoader for StaticCatalogLoader {
    fn load(&self, catalog: &mut Catalog) -> anyhow::Result<()> {
        catalog.add_items(self.items.iter().cloned())?;
        Ok(())
    }
}
