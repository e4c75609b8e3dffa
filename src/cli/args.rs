use clap::Parser;

/// Validates plugin module catalogs and prints their load order.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Project root, all other paths are relative to it
    #[clap(short, long)]
    pub root: Option<String>,
    /// Catalog file or directory of catalog files
    #[clap(short, long)]
    pub catalog: Option<String>,
    /// Configuration file with the catalog path and solver boosts
    #[clap(long, env = "MODCAT_CONFIG")]
    pub config: Option<String>,
}

#[derive(Debug, Parser)]
pub enum Command {
    ///Checks the catalog for duplicates, missing dependencies, cycles and illegal dependencies
    Validate,
    ///Prints the load order of the given modules and their dependencies
    Order {
        /// Modules to load; the whole catalog when empty
        modules: Vec<String>,
    },
    ///Lists every module with its group and activation mode
    List,
}
