use thiserror::Error;

pub mod catalog_file;
pub mod module;

pub use module::{
    ActivationMode, CatalogItem, GroupDescriptor, ModuleDescriptor, ModuleName, ModuleState,
};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading catalog toml: {0}")]
    IO(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid activation mode `{0}`, expected `eager` or `on-demand`")]
    InvalidActivationMode(String),
    #[error("Module `{module}` lists `{dependency}` as optional but does not depend on it")]
    UndeclaredOptionalDependency { module: String, dependency: String },
    #[error("Empty {0} name")]
    EmptyName(&'static str),
}
