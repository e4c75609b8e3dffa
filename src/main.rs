use std::error::Error;

use clap::Parser;
use modcat::{
    cli::args::{CliArgs, Command},
    model::ModuleName,
    Modcat,
};

fn run() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = CliArgs::parse();

    let mut builder = Modcat::builder();
    if let Some(root) = cli_args.root {
        builder = builder.root(root);
    }
    if let Some(catalog) = cli_args.catalog {
        builder = builder.catalog_path(catalog);
    }
    if let Some(config) = cli_args.config {
        builder = builder.config_file(config);
    }
    let modcat = builder.try_build()?;

    match cli_args.cmd {
        Command::Validate => {
            modcat.validate()?;
        }
        Command::Order { modules } => {
            let modules: Vec<ModuleName> = modules.into_iter().map(ModuleName::from).collect();
            for name in modcat.order(&modules)? {
                println!("{name}");
            }
        }
        Command::List => {
            for listing in modcat.list()? {
                match listing.group {
                    Some(group) => println!("{} [{}]", listing.module, group),
                    None => println!("{}", listing.module),
                }
            }
        }
    }

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
