use std::{collections::BTreeSet, path::Path, str::FromStr};

use log::{debug, error};
use serde::Deserialize;

use crate::model::{
    ActivationMode, CatalogItem, GroupDescriptor, ModuleDescriptor, ModuleName, ParseError,
};

/// On-disk catalog description. Modules and groups keep their file order.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
struct RawCatalogFile {
    #[serde(default)]
    modules: Vec<RawModule>,
    #[serde(default)]
    groups: Vec<RawGroup>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct RawModule {
    name: String,
    #[serde(rename = "type", default)]
    type_ref: Option<String>,
    #[serde(default)]
    activation: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    optional_dependencies: Vec<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    name: String,
    #[serde(default)]
    placement: Option<String>,
    #[serde(default)]
    activation: Option<String>,
    #[serde(default)]
    modules: Vec<RawModule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFile {
    pub items: Vec<CatalogItem>,
}

impl CatalogFile {
    pub fn from_file(path: &Path) -> Result<CatalogFile, ParseError> {
        debug!("Attempting to read catalog from {}", path.display());
        let contents = std::fs::read_to_string(path)?;

        let catalog = CatalogFile::from_toml_str(&contents);
        if let Err(err) = &catalog {
            error!(
                "Could not build a valid catalog from {} due to err {err}",
                path.display()
            )
        }
        catalog
    }

    pub fn from_toml_str(data: &str) -> Result<CatalogFile, ParseError> {
        let raw = toml::from_str::<RawCatalogFile>(data)?;

        let mut items = Vec::with_capacity(raw.modules.len() + raw.groups.len());
        for module in raw.modules {
            items.push(CatalogItem::Module(parse_module(module, None)?));
        }
        for group in raw.groups {
            items.push(CatalogItem::Group(parse_group(group)?));
        }

        Ok(CatalogFile { items })
    }
}

fn parse_group(raw: RawGroup) -> Result<GroupDescriptor, ParseError> {
    if raw.name.trim().is_empty() {
        return Err(ParseError::EmptyName("group"));
    }
    let activation = parse_activation(raw.activation.as_deref())?;
    let modules = raw
        .modules
        .into_iter()
        .map(|m| parse_module(m, Some(activation)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GroupDescriptor {
        name: raw.name,
        placement: raw.placement,
        activation,
        modules,
    })
}

/// Group members take the activation mode of their group; a mode spelled on
/// the member itself is ignored in that case.
fn parse_module(
    raw: RawModule,
    group_activation: Option<ActivationMode>,
) -> Result<ModuleDescriptor, ParseError> {
    if raw.name.trim().is_empty() {
        return Err(ParseError::EmptyName("module"));
    }
    let activation = match group_activation {
        Some(activation) => activation,
        None => parse_activation(raw.activation.as_deref())?,
    };

    let depends_on: Vec<ModuleName> = raw.depends_on.into_iter().map(ModuleName::from).collect();

    let mut optional_dependencies = BTreeSet::new();
    for dependency in raw.optional_dependencies {
        let dependency = ModuleName::from(dependency);
        if !depends_on.contains(&dependency) {
            return Err(ParseError::UndeclaredOptionalDependency {
                module: raw.name,
                dependency: dependency.to_string(),
            });
        }
        optional_dependencies.insert(dependency);
    }

    Ok(ModuleDescriptor {
        name: ModuleName::from(raw.name),
        type_ref: raw.type_ref,
        depends_on,
        activation,
        optional_dependencies,
        ..Default::default()
    })
}

fn parse_activation(value: Option<&str>) -> Result<ActivationMode, ParseError> {
    value.map_or(Ok(ActivationMode::default()), ActivationMode::from_str)
}
