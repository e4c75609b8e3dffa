//! Structural checks run by [`Catalog::validate`].
//!
//! Later checks rely on earlier ones: resolution assumes unique names, the
//! partition and timing checks assume an acyclic graph.

use std::collections::{HashMap, HashSet, VecDeque};

use log::trace;

use super::{Catalog, CatalogError, IllegalDependencyReason};
use crate::{
    model::{ActivationMode, CatalogItem, ModuleDescriptor, ModuleName},
    solver::DependencySolver,
};

pub(super) fn run(catalog: &Catalog) -> Result<(), CatalogError> {
    check_unique_names(catalog)?;
    check_dependencies_resolve(catalog)?;
    check_acyclic(catalog)?;
    check_partitions(catalog)?;
    check_activation_timing(catalog)?;
    Ok(())
}

fn check_unique_names(catalog: &Catalog) -> Result<(), CatalogError> {
    trace!("Checking module names are unique");
    let mut seen = HashSet::new();
    for module in catalog.modules() {
        if !seen.insert(&module.name) {
            return Err(CatalogError::DuplicateName(module.name.clone()));
        }
    }
    Ok(())
}

/// Optional dependencies are allowed to be absent.
fn check_dependencies_resolve(catalog: &Catalog) -> Result<(), CatalogError> {
    trace!("Checking dependencies resolve");
    let known: HashSet<&ModuleName> = catalog.modules().map(|m| &m.name).collect();
    for module in catalog.modules() {
        if let Some(dependency) = module.required_dependencies().find(|d| !known.contains(d)) {
            return Err(CatalogError::MissingDependency {
                module: module.name.clone(),
                dependency: dependency.clone(),
            });
        }
    }
    Ok(())
}

fn check_acyclic(catalog: &Catalog) -> Result<(), CatalogError> {
    trace!("Checking dependency graph is acyclic");
    let mut solver = DependencySolver::new(catalog.boosts());
    for module in catalog.modules() {
        solver.add_node(&module.name);
    }
    for module in catalog.modules() {
        for dependency in module.required_dependencies() {
            solver.add_edge(&module.name, dependency);
        }
    }
    if solver.node_count() > 0 {
        solver.solve()?;
    }
    Ok(())
}

/// A groupless module may only use groupless modules. A grouped module may
/// use groupless modules and members of its own group.
fn check_partitions(catalog: &Catalog) -> Result<(), CatalogError> {
    trace!("Checking dependencies stay within their partition");
    let mut placement: HashMap<&ModuleName, Option<usize>> = HashMap::new();
    for (i, item) in catalog.items().iter().enumerate() {
        let group = item.group().map(|_| i);
        for module in item.modules() {
            placement.insert(&module.name, group);
        }
    }

    let check = |module: &ModuleDescriptor, own: Option<usize>| {
        for dependency in &module.depends_on {
            match placement.get(dependency) {
                Some(Some(group)) if Some(*group) != own => {
                    return Err(CatalogError::IllegalDependency {
                        module: module.name.clone(),
                        dependency: dependency.clone(),
                        reason: IllegalDependencyReason::CrossPartition,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    };

    for item in catalog.items() {
        if let CatalogItem::Module(module) = item {
            check(module, None)?;
        }
    }
    for (i, item) in catalog.items().iter().enumerate() {
        if let CatalogItem::Group(group) = item {
            for module in &group.modules {
                check(module, Some(i))?;
            }
        }
    }
    Ok(())
}

fn check_activation_timing(catalog: &Catalog) -> Result<(), CatalogError> {
    trace!("Checking eager modules only need eager modules");
    let index: HashMap<&ModuleName, &ModuleDescriptor> =
        catalog.modules().map(|m| (&m.name, m)).collect();

    for module in catalog
        .modules()
        .filter(|m| m.activation == ActivationMode::Eager)
    {
        if let Some(dependency) = first_on_demand_dependency(&index, module) {
            return Err(CatalogError::IllegalDependency {
                module: module.name.clone(),
                dependency: dependency.clone(),
                reason: IllegalDependencyReason::ActivationTiming,
            });
        }
    }
    Ok(())
}

/// Breadth-first over required edges, so the nearest offender is reported.
fn first_on_demand_dependency<'a>(
    index: &HashMap<&ModuleName, &'a ModuleDescriptor>,
    module: &'a ModuleDescriptor,
) -> Option<&'a ModuleName> {
    let mut visited: HashSet<&ModuleName> = HashSet::from([&module.name]);
    let mut queue = VecDeque::from([module]);
    while let Some(current) = queue.pop_front() {
        for name in current.required_dependencies() {
            if !visited.insert(name) {
                continue;
            }
            let Some(&dependency) = index.get(name) else {
                continue;
            };
            if dependency.activation == ActivationMode::OnDemand {
                return Some(&dependency.name);
            }
            queue.push_back(dependency);
        }
    }
    None
}
