pub mod catalog;
pub mod cli;
pub mod config;
pub mod loader;
pub mod model;
pub mod solver;

mod api;

pub use api::{Modcat, ModcatBuilder};
