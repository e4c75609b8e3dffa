use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info};

use crate::{catalog::Catalog, model::catalog_file::CatalogFile};

use super::CatalogLoader;

/// Reads catalog TOML files. A directory path loads every `*.toml` file in
/// it, sorted by file name.
#[derive(Debug, Clone)]
pub struct FileCatalogLoader {
    path: PathBuf,
}

impl FileCatalogLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCatalogLoader { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn catalog_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        if !self.path.is_dir() {
            return Ok(vec![self.path.clone()]);
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.path)
            .with_context(|| format!("Could not read {}", self.path.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "toml") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl CatalogLoader for FileCatalogLoader {
    fn load(&self, catalog: &mut Catalog) -> anyhow::Result<()> {
        let files = self.catalog_files()?;
        info!(
            "Reading {} catalog file(s) from {}",
            files.len(),
            self.path.display()
        );
        let mut items = Vec::new();
        for file in files {
            let contents = CatalogFile::from_file(&file)
                .with_context(|| format!("Invalid catalog file {}", file.display()))?;
            debug!("{} holds {} items", file.display(), contents.items.len());
            items.extend(contents.items);
        }
        catalog.add_items(items)?;
        Ok(())
    }
}
