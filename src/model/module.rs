use std::{
    collections::BTreeSet,
    fmt::{Display, Write},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::model::ParseError;

#[derive(Clone, Default, Hash, Deserialize, Serialize, Debug, PartialEq, Eq, Ord, PartialOrd)]
pub struct ModuleName(String);

impl ModuleName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ModuleName {
    fn from(s: String) -> Self {
        ModuleName(s)
    }
}

impl From<&str> for ModuleName {
    fn from(s: &str) -> Self {
        ModuleName(s.to_string())
    }
}

/// When a module has to be ready.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum ActivationMode {
    /// Activated as soon as the host starts.
    #[default]
    #[serde(rename = "eager")]
    Eager,
    /// May be deferred until the module is first requested.
    #[serde(rename = "on-demand")]
    OnDemand,
}

impl FromStr for ActivationMode {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.to_ascii_lowercase();
        match value.as_str() {
            "eager" => Ok(ActivationMode::Eager),
            "on-demand" | "ondemand" | "on_demand" => Ok(ActivationMode::OnDemand),
            _ => Err(ParseError::InvalidActivationMode(value)),
        }
    }
}

impl Display for ActivationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ActivationMode::Eager => f.write_str("eager"),
            ActivationMode::OnDemand => f.write_str("on-demand"),
        }
    }
}

/// Lifecycle tag reported by whoever activates the module.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
pub enum ModuleState {
    #[default]
    NotStarted,
    Loading,
    Loaded,
    Failed,
}

impl Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ModuleState::NotStarted => f.write_str("not started"),
            ModuleState::Loading => f.write_str("loading"),
            ModuleState::Loaded => f.write_str("loaded"),
            ModuleState::Failed => f.write_str("failed"),
        }
    }
}

/// A single node of the plugin dependency graph.
///
/// `state` and `errors` belong to the activation side. Nothing in this crate
/// writes them except on an explicit report through the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleDescriptor {
    pub name: ModuleName,
    pub type_ref: Option<String>,
    pub depends_on: Vec<ModuleName>,
    pub activation: ActivationMode,
    pub optional_dependencies: BTreeSet<ModuleName>,
    pub state: ModuleState,
    pub errors: Vec<String>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<ModuleName>) -> Self {
        ModuleDescriptor {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn type_ref(mut self, type_ref: impl Into<String>) -> Self {
        self.type_ref = Some(type_ref.into());
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<ModuleName>) -> Self {
        self.depends_on.push(dependency.into());
        self
    }

    /// Declares a dependency that is not a hard edge: it may be missing and
    /// never constrains ordering or activation timing.
    pub fn optionally_depends_on(mut self, dependency: impl Into<ModuleName>) -> Self {
        let dependency = dependency.into();
        self.depends_on.push(dependency.clone());
        self.optional_dependencies.insert(dependency);
        self
    }

    pub fn activation(mut self, activation: ActivationMode) -> Self {
        self.activation = activation;
        self
    }

    pub fn is_optional(&self, dependency: &ModuleName) -> bool {
        self.optional_dependencies.contains(dependency)
    }

    /// Dependencies that must be present and loaded first, without repeats.
    pub fn required_dependencies(&self) -> impl Iterator<Item = &ModuleName> {
        let mut seen = BTreeSet::new();
        self.depends_on
            .iter()
            .filter(move |d| !self.is_optional(d) && seen.insert(*d))
    }

    /// Whether the activation side reported no problem for this module.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Display for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.activation)?;
        if !self.depends_on.is_empty() {
            f.write_str(" -> ")?;
            for (i, dependency) in self.depends_on.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(dependency.as_str())?;
                if self.is_optional(dependency) {
                    f.write_char('?')?;
                }
            }
        }
        Ok(())
    }
}

/// Organizational partition of modules. Membership carries no dependency
/// semantics of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub name: String,
    pub placement: Option<String>,
    pub activation: ActivationMode,
    pub modules: Vec<ModuleDescriptor>,
}

impl GroupDescriptor {
    pub fn new(name: impl Into<String>, activation: ActivationMode) -> Self {
        GroupDescriptor {
            name: name.into(),
            placement: None,
            activation,
            modules: Vec::new(),
        }
    }

    pub fn placement(mut self, placement: impl Into<String>) -> Self {
        self.placement = Some(placement.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogItem {
    Module(ModuleDescriptor),
    Group(GroupDescriptor),
}

impl CatalogItem {
    /// Every module held by this item: itself, or all members of the group.
    pub fn modules(&self) -> &[ModuleDescriptor] {
        match self {
            CatalogItem::Module(module) => std::slice::from_ref(module),
            CatalogItem::Group(group) => &group.modules,
        }
    }

    pub fn group(&self) -> Option<&GroupDescriptor> {
        match self {
            CatalogItem::Module(_) => None,
            CatalogItem::Group(group) => Some(group),
        }
    }
}
