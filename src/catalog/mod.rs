mod validation;

use std::{
    cell::Cell,
    collections::{HashMap, HashSet, VecDeque},
    fmt::Display,
};

use log::{debug, info, trace};
use thiserror::Error;

use crate::{
    loader::CatalogLoader,
    model::{CatalogItem, GroupDescriptor, ModuleDescriptor, ModuleName, ModuleState},
    solver::{Boosts, CycleError, DependencySolver},
};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Module `{0}` is registered more than once")]
    DuplicateName(ModuleName),
    #[error("Module `{module}` depends on `{dependency}`, which is not in the catalog")]
    MissingDependency {
        module: ModuleName,
        dependency: ModuleName,
    },
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error("Module `{module}` may not depend on `{dependency}`: {reason}")]
    IllegalDependency {
        module: ModuleName,
        dependency: ModuleName,
        reason: IllegalDependencyReason,
    },
    #[error("Unknown module `{0}`")]
    UnknownModule(ModuleName),
    #[error("Error while loading the catalog: {0}")]
    Load(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalDependencyReason {
    /// The dependency lives in a group the module has no access to.
    CrossPartition,
    /// An eager module would have to wait for an on-demand one.
    ActivationTiming,
}

impl Display for IllegalDependencyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            IllegalDependencyReason::CrossPartition => {
                f.write_str("dependency belongs to another group")
            }
            IllegalDependencyReason::ActivationTiming => {
                f.write_str("an eager module cannot depend on an on-demand module")
            }
        }
    }
}

/// The set of modules known to the host.
///
/// Mutation is append-only and never rejected: structural problems surface
/// from [`Catalog::validate`] instead. Any insertion clears the validity flag,
/// and if the catalog had been valid the insertion validates again right away.
#[derive(Debug, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    boosts: Boosts,
    loaded: bool,
    validated: Cell<bool>,
}

impl Catalog {
    pub fn new(boosts: Boosts) -> Self {
        Catalog {
            boosts,
            ..Default::default()
        }
    }

    pub fn boosts(&self) -> &Boosts {
        &self.boosts
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn add_module(&mut self, module: ModuleDescriptor) -> Result<(), CatalogError> {
        self.push_module(module);
        self.structure_changed()
    }

    /// Adds `group` extended with `members`. Every member takes the group's
    /// activation mode.
    pub fn add_group(
        &mut self,
        group: GroupDescriptor,
        members: Vec<ModuleDescriptor>,
    ) -> Result<(), CatalogError> {
        self.push_group(group, members);
        self.structure_changed()
    }

    /// Inserts every item, then validates once if the catalog had been valid.
    /// A failing check never stops the rest of the batch from landing.
    pub fn add_items(
        &mut self,
        items: impl IntoIterator<Item = CatalogItem>,
    ) -> Result<(), CatalogError> {
        for item in items {
            match item {
                CatalogItem::Module(module) => self.push_module(module),
                CatalogItem::Group(group) => self.push_group(group, Vec::new()),
            }
        }
        self.structure_changed()
    }

    fn push_module(&mut self, module: ModuleDescriptor) {
        debug!("Adding module {}", module.name);
        self.items.push(CatalogItem::Module(module));
    }

    fn push_group(&mut self, mut group: GroupDescriptor, members: Vec<ModuleDescriptor>) {
        debug!(
            "Adding group {} with {} new members",
            group.name,
            members.len()
        );
        group.modules.extend(members);
        for member in &mut group.modules {
            member.activation = group.activation;
        }
        self.items.push(CatalogItem::Group(group));
    }

    fn structure_changed(&mut self) -> Result<(), CatalogError> {
        if self.validated.replace(false) {
            debug!("Catalog changed after validation, validating again");
            self.validate()
        } else {
            Ok(())
        }
    }

    /// Every module, groupless or grouped, in insertion order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.items.iter().flat_map(CatalogItem::modules)
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupDescriptor> {
        self.items.iter().filter_map(CatalogItem::group)
    }

    /// Modules the activation side has not reported a problem for.
    pub fn available_modules(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules().filter(|m| m.is_healthy())
    }

    pub fn module(&self, name: &ModuleName) -> Option<&ModuleDescriptor> {
        self.modules().find(|m| &m.name == name)
    }

    pub fn group_of(&self, name: &ModuleName) -> Option<&GroupDescriptor> {
        self.groups()
            .find(|g| g.modules.iter().any(|m| &m.name == name))
    }

    /// Number of modules, including group members.
    pub fn len(&self) -> usize {
        self.modules().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_valid(&self) -> bool {
        self.validated.get()
    }

    fn index(&self) -> HashMap<&ModuleName, &ModuleDescriptor> {
        let mut index = HashMap::new();
        for module in self.modules() {
            index.entry(&module.name).or_insert(module);
        }
        index
    }

    /// Descriptors named in `module.depends_on` that exist in the catalog.
    pub fn get_dependent_modules(&self, module: &ModuleDescriptor) -> Vec<&ModuleDescriptor> {
        dependent_modules(&self.index(), module)
    }

    /// Expands `seeds` to everything they transitively depend on and returns
    /// it in load order, dependencies first.
    ///
    /// Modules with reported errors are left out and nothing is expanded
    /// through them. A module already [`ModuleState::Loaded`] is returned but
    /// its dependencies are not pulled in on its behalf.
    pub fn complete_list_with_dependencies(
        &self,
        seeds: &[ModuleName],
    ) -> Result<Vec<&ModuleDescriptor>, CatalogError> {
        if !self.is_valid() {
            self.validate()?;
        }

        let index = self.index();
        let mut closure: HashSet<&ModuleName> = HashSet::new();
        let mut queue: VecDeque<&ModuleDescriptor> = VecDeque::new();
        for seed in seeds {
            let module = index
                .get(seed)
                .copied()
                .ok_or_else(|| CatalogError::UnknownModule(seed.clone()))?;
            if !module.is_healthy() {
                debug!("Skipping requested module {seed}, it has reported errors");
                continue;
            }
            if closure.insert(&module.name) {
                queue.push_back(module);
            }
        }
        while let Some(module) = queue.pop_front() {
            if module.state == ModuleState::Loaded {
                trace!("{} is already loaded, not expanding it", module.name);
                continue;
            }
            for dependency in dependent_modules(&index, module) {
                if !dependency.is_healthy() {
                    debug!(
                        "Leaving out {}, needed by {}: it has reported errors",
                        dependency.name, module.name
                    );
                    continue;
                }
                if closure.insert(&dependency.name) {
                    queue.push_back(dependency);
                }
            }
        }
        debug!(
            "Closure of {} seed modules holds {} modules",
            seeds.len(),
            closure.len()
        );

        let members: Vec<&ModuleDescriptor> = self
            .modules()
            .filter(|m| closure.contains(&m.name))
            .collect();
        let mut solver = DependencySolver::new(&self.boosts);
        for module in &members {
            solver.add_node(&module.name);
        }
        for module in &members {
            for dependency in module
                .required_dependencies()
                .filter(|d| closure.contains(d))
            {
                solver.add_edge(&module.name, dependency);
            }
        }
        if solver.node_count() == 0 {
            return Ok(Vec::new());
        }

        Ok(solver
            .solve()?
            .iter()
            .filter_map(|name| index.get(name).copied())
            .collect())
    }

    /// Runs every structural check in order and stops at the first failure.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let result = validation::run(self);
        self.validated.set(result.is_ok());
        match &result {
            Ok(()) => debug!("Catalog of {} modules is valid", self.len()),
            Err(err) => debug!("Catalog validation failed: {err}"),
        }
        result
    }

    /// Populates the catalog through `loader` unless that already happened,
    /// then validates it.
    ///
    /// Insertions made by the loader are validated once, after it returns. A
    /// failing loader leaves the items that were present before the call.
    pub fn initialize<L>(&mut self, loader: &L) -> Result<(), CatalogError>
    where
        L: CatalogLoader + ?Sized,
    {
        if !self.loaded {
            info!("Loading module catalog...");
            let existing = self.items.len();
            let was_valid = self.validated.replace(false);
            if let Err(err) = loader.load(self) {
                self.items.truncate(existing);
                self.validated.set(was_valid);
                return Err(CatalogError::Load(err));
            }
            self.loaded = true;
            info!("Loaded {} modules", self.len());
        }
        self.validate()
    }

    /// Drops every item and populates the catalog from scratch.
    pub fn reload<L>(&mut self, loader: &L) -> Result<(), CatalogError>
    where
        L: CatalogLoader + ?Sized,
    {
        info!("Reloading module catalog");
        self.clear();
        self.initialize(loader)
    }

    fn clear(&mut self) {
        self.items.clear();
        self.loaded = false;
        self.validated.set(false);
    }

    /// Records the lifecycle state reported by the activation side.
    pub fn set_state(&mut self, name: &ModuleName, state: ModuleState) -> Result<(), CatalogError> {
        self.module_mut(name)?.state = state;
        Ok(())
    }

    /// Records a problem reported by the activation side. The module stops
    /// being listed by [`Catalog::available_modules`].
    pub fn record_error(
        &mut self,
        name: &ModuleName,
        error: impl Into<String>,
    ) -> Result<(), CatalogError> {
        let module = self.module_mut(name)?;
        module.errors.push(error.into());
        module.state = ModuleState::Failed;
        Ok(())
    }

    fn module_mut(&mut self, name: &ModuleName) -> Result<&mut ModuleDescriptor, CatalogError> {
        self.items
            .iter_mut()
            .flat_map(|item| match item {
                CatalogItem::Module(module) => std::slice::from_mut(module),
                CatalogItem::Group(group) => group.modules.as_mut_slice(),
            })
            .find(|m| &m.name == name)
            .ok_or_else(|| CatalogError::UnknownModule(name.clone()))
    }
}

fn dependent_modules<'a>(
    index: &HashMap<&ModuleName, &'a ModuleDescriptor>,
    module: &ModuleDescriptor,
) -> Vec<&'a ModuleDescriptor> {
    let mut seen = HashSet::new();
    module
        .depends_on
        .iter()
        .filter(|name| seen.insert(*name))
        .filter_map(|name| index.get(name).copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        loader::StaticCatalogLoader,
        model::{ActivationMode, GroupDescriptor},
    };

    use pretty_assertions::assert_eq;

    fn names(modules: &[&ModuleDescriptor]) -> Vec<String> {
        modules.iter().map(|m| m.name.to_string()).collect()
    }

    fn position(order: &[&ModuleDescriptor], name: &str) -> usize {
        order
            .iter()
            .position(|m| m.name.as_str() == name)
            .unwrap()
    }

    #[test]
    fn modules_flattens_groups_in_order() {
        let mut catalog = Catalog::default();
        catalog.add_module(ModuleDescriptor::new("a")).unwrap();
        catalog
            .add_group(
                GroupDescriptor::new("g", ActivationMode::OnDemand),
                vec![ModuleDescriptor::new("b"), ModuleDescriptor::new("c")],
            )
            .unwrap();
        catalog.add_module(ModuleDescriptor::new("d")).unwrap();

        let all: Vec<&str> = catalog.modules().map(|m| m.name.as_str()).collect();
        assert_eq!(all, vec!["a", "b", "c", "d"]);
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.group_of(&"c".into()).map(|g| g.name.as_str()),
            Some("g")
        );
        assert!(catalog.group_of(&"d".into()).is_none());
    }

    #[test]
    fn group_members_take_group_activation() {
        let mut catalog = Catalog::default();
        catalog
            .add_group(
                GroupDescriptor::new("g", ActivationMode::OnDemand),
                vec![ModuleDescriptor::new("b").activation(ActivationMode::Eager)],
            )
            .unwrap();

        assert_eq!(
            catalog.module(&"b".into()).unwrap().activation,
            ActivationMode::OnDemand
        );
    }

    #[test]
    fn dependent_modules_skip_absent_names() {
        let mut catalog = Catalog::default();
        let a = ModuleDescriptor::new("a")
            .depends_on("b")
            .optionally_depends_on("ghost")
            .depends_on("b");
        catalog.add_module(a.clone()).unwrap();
        catalog.add_module(ModuleDescriptor::new("b")).unwrap();

        assert_eq!(names(&catalog.get_dependent_modules(&a)), vec!["b"]);
    }

    #[test]
    fn closure_is_ordered_dependencies_first() {
        let mut catalog = Catalog::default();
        catalog
            .add_module(ModuleDescriptor::new("a").depends_on("b"))
            .unwrap();
        catalog
            .add_module(ModuleDescriptor::new("b").depends_on("c"))
            .unwrap();
        catalog.add_module(ModuleDescriptor::new("c")).unwrap();
        catalog.add_module(ModuleDescriptor::new("unrelated")).unwrap();

        let order = catalog
            .complete_list_with_dependencies(&["a".into()])
            .unwrap();
        assert_eq!(order.len(), 3);
        assert!(position(&order, "c") < position(&order, "b"));
        assert!(position(&order, "b") < position(&order, "a"));
        assert!(catalog.is_valid());
    }

    #[test]
    fn closure_of_diamond_contains_shared_dependency_once() {
        let mut catalog = Catalog::default();
        catalog
            .add_module(ModuleDescriptor::new("app").depends_on("left").depends_on("right"))
            .unwrap();
        catalog
            .add_module(ModuleDescriptor::new("left").depends_on("base"))
            .unwrap();
        catalog
            .add_module(ModuleDescriptor::new("right").depends_on("base"))
            .unwrap();
        catalog.add_module(ModuleDescriptor::new("base")).unwrap();

        let order = catalog
            .complete_list_with_dependencies(&["app".into(), "left".into()])
            .unwrap();
        assert_eq!(names(&order), vec!["base", "left", "right", "app"]);
    }

    #[test]
    fn closure_respects_boosts() {
        let boosts = Boosts::from_iter([("z", 10)]);
        let mut catalog = Catalog::new(boosts);
        catalog
            .add_module(ModuleDescriptor::new("root").depends_on("y").depends_on("z"))
            .unwrap();
        catalog.add_module(ModuleDescriptor::new("y")).unwrap();
        catalog.add_module(ModuleDescriptor::new("z")).unwrap();

        let order = catalog
            .complete_list_with_dependencies(&["root".into()])
            .unwrap();
        assert_eq!(names(&order), vec!["z", "y", "root"]);
    }

    #[test]
    fn closure_includes_present_optional_dependencies_without_ordering_them() {
        let mut catalog = Catalog::default();
        catalog
            .add_module(ModuleDescriptor::new("a").optionally_depends_on("b"))
            .unwrap();
        catalog.add_module(ModuleDescriptor::new("b")).unwrap();

        let order = catalog
            .complete_list_with_dependencies(&["a".into()])
            .unwrap();
        assert_eq!(names(&order), vec!["a", "b"]);
    }

    #[test]
    fn closure_of_nothing_is_empty() {
        let mut catalog = Catalog::default();
        catalog.add_module(ModuleDescriptor::new("a")).unwrap();

        assert!(catalog
            .complete_list_with_dependencies(&[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn closure_rejects_unknown_seed() {
        let catalog = Catalog::default();
        let err = catalog
            .complete_list_with_dependencies(&["nope".into()])
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownModule(name) if name.as_str() == "nope"));
    }

    #[test]
    fn closure_validates_first() {
        let mut catalog = Catalog::default();
        catalog.add_module(ModuleDescriptor::new("a")).unwrap();
        catalog.add_module(ModuleDescriptor::new("a")).unwrap();

        let err = catalog
            .complete_list_with_dependencies(&["a".into()])
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName(name) if name.as_str() == "a"));
    }

    #[test]
    fn insertion_after_validation_validates_again() {
        let mut catalog = Catalog::default();
        catalog.add_module(ModuleDescriptor::new("a")).unwrap();
        catalog.validate().unwrap();
        assert!(catalog.is_valid());

        catalog.add_module(ModuleDescriptor::new("b")).unwrap();
        assert!(catalog.is_valid());

        let err = catalog
            .add_module(ModuleDescriptor::new("c").depends_on("missing"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingDependency { .. }));
        assert!(!catalog.is_valid());
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn batch_insertion_after_validation_keeps_every_item() {
        let mut catalog = Catalog::default();
        catalog.add_module(ModuleDescriptor::new("base")).unwrap();
        catalog.validate().unwrap();

        catalog
            .add_items([
                CatalogItem::Module(ModuleDescriptor::new("a").depends_on("b")),
                CatalogItem::Module(ModuleDescriptor::new("b")),
            ])
            .unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.is_valid());

        let err = catalog
            .add_items([
                CatalogItem::Module(ModuleDescriptor::new("c").depends_on("missing")),
                CatalogItem::Module(ModuleDescriptor::new("d")),
            ])
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingDependency { .. }));
        assert_eq!(catalog.len(), 5);
        assert!(!catalog.is_valid());
    }

    #[test]
    fn initialize_validates_loaded_batch_once() {
        let loader = StaticCatalogLoader::new(vec![
            CatalogItem::Module(ModuleDescriptor::new("a").depends_on("b")),
            CatalogItem::Module(ModuleDescriptor::new("b")),
        ]);
        let mut catalog = Catalog::default();
        catalog.add_module(ModuleDescriptor::new("base")).unwrap();
        catalog.validate().unwrap();

        catalog.initialize(&loader).unwrap();
        let all: Vec<&str> = catalog.modules().map(|m| m.name.as_str()).collect();
        assert_eq!(all, vec!["base", "a", "b"]);
        assert!(catalog.is_valid());
    }

    #[test]
    fn insertion_before_validation_is_not_checked() {
        let mut catalog = Catalog::default();
        catalog.add_module(ModuleDescriptor::new("a")).unwrap();
        catalog.add_module(ModuleDescriptor::new("a")).unwrap();
        assert!(!catalog.is_valid());
    }

    #[test]
    fn initialize_loads_once() {
        let loader = StaticCatalogLoader::new(vec![CatalogItem::Module(ModuleDescriptor::new(
            "a",
        ))]);
        let mut catalog = Catalog::default();
        catalog.initialize(&loader).unwrap();
        catalog.initialize(&loader).unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(catalog.is_valid());
    }

    #[test]
    fn reload_repopulates_from_scratch() {
        let loader = StaticCatalogLoader::new(vec![
            CatalogItem::Module(ModuleDescriptor::new("a")),
            CatalogItem::Module(ModuleDescriptor::new("b").depends_on("a")),
        ]);
        let mut catalog = Catalog::default();
        catalog.initialize(&loader).unwrap();
        catalog.reload(&loader).unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.is_valid());
    }

    #[test]
    fn failing_loader_leaves_catalog_empty() {
        struct Broken;

        impl CatalogLoader for Broken {
            fn load(&self, catalog: &mut Catalog) -> anyhow::Result<()> {
                catalog.add_module(ModuleDescriptor::new("partial"))?;
                anyhow::bail!("backing store unavailable")
            }
        }

        let mut catalog = Catalog::default();
        let err = catalog.initialize(&Broken).unwrap_err();
        assert!(matches!(err, CatalogError::Load(_)));
        assert!(catalog.is_empty());
    }

    #[test]
    fn failing_loader_keeps_items_added_before() {
        struct Broken;

        impl CatalogLoader for Broken {
            fn load(&self, catalog: &mut Catalog) -> anyhow::Result<()> {
                catalog.add_module(ModuleDescriptor::new("partial"))?;
                anyhow::bail!("backing store unavailable")
            }
        }

        let mut catalog = Catalog::default();
        catalog.add_module(ModuleDescriptor::new("base")).unwrap();
        catalog.validate().unwrap();

        let err = catalog.initialize(&Broken).unwrap_err();
        assert!(matches!(err, CatalogError::Load(_)));
        let all: Vec<&str> = catalog.modules().map(|m| m.name.as_str()).collect();
        assert_eq!(all, vec!["base"]);
        assert!(catalog.is_valid());
    }

    #[test]
    fn closure_leaves_out_modules_with_errors() {
        let mut catalog = Catalog::default();
        catalog
            .add_module(ModuleDescriptor::new("a").depends_on("b"))
            .unwrap();
        catalog
            .add_module(ModuleDescriptor::new("b").depends_on("c"))
            .unwrap();
        catalog.add_module(ModuleDescriptor::new("c")).unwrap();
        catalog.add_module(ModuleDescriptor::new("d")).unwrap();
        catalog.record_error(&"b".into(), "boom").unwrap();

        let order = catalog
            .complete_list_with_dependencies(&["a".into()])
            .unwrap();
        assert_eq!(names(&order), vec!["a"]);

        let order = catalog
            .complete_list_with_dependencies(&["b".into(), "d".into()])
            .unwrap();
        assert_eq!(names(&order), vec!["d"]);
    }

    #[test]
    fn closure_does_not_expand_loaded_modules() {
        let mut catalog = Catalog::default();
        catalog
            .add_module(ModuleDescriptor::new("a").depends_on("b"))
            .unwrap();
        catalog
            .add_module(ModuleDescriptor::new("b").depends_on("c"))
            .unwrap();
        catalog.add_module(ModuleDescriptor::new("c")).unwrap();
        catalog.set_state(&"b".into(), ModuleState::Loaded).unwrap();

        let order = catalog
            .complete_list_with_dependencies(&["a".into()])
            .unwrap();
        assert_eq!(names(&order), vec!["b", "a"]);

        let order = catalog
            .complete_list_with_dependencies(&["a".into(), "c".into()])
            .unwrap();
        assert_eq!(names(&order), vec!["c", "b", "a"]);
    }

    #[test]
    fn reported_errors_hide_module() {
        let mut catalog = Catalog::default();
        catalog.add_module(ModuleDescriptor::new("a")).unwrap();
        catalog.add_module(ModuleDescriptor::new("b")).unwrap();
        catalog.validate().unwrap();

        catalog
            .set_state(&"a".into(), ModuleState::Loaded)
            .unwrap();
        catalog
            .record_error(&"b".into(), "assembly not found")
            .unwrap();

        let available: Vec<&str> = catalog
            .available_modules()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(available, vec!["a"]);
        assert_eq!(
            catalog.module(&"b".into()).unwrap().state,
            ModuleState::Failed
        );
        assert!(catalog.is_valid());
        assert!(matches!(
            catalog.set_state(&"zzz".into(), ModuleState::Loading),
            Err(CatalogError::UnknownModule(_))
        ));
    }
}
