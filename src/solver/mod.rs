use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use log::{debug, trace};
use thiserror::Error;

use crate::model::ModuleName;

/// Priority hints used to break ties between nodes with no ordering
/// constraint between them. A higher boost is placed earlier; a missing entry
/// counts as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Boosts(HashMap<ModuleName, i64>);

impl Boosts {
    pub fn new() -> Self {
        Boosts::default()
    }

    pub fn insert(&mut self, name: impl Into<ModuleName>, boost: i64) {
        self.0.insert(name.into(), boost);
    }

    pub fn get(&self, name: &ModuleName) -> i64 {
        self.0.get(name).copied().unwrap_or(0)
    }
}

impl<N: Into<ModuleName>> FromIterator<(N, i64)> for Boosts {
    fn from_iter<T: IntoIterator<Item = (N, i64)>>(iter: T) -> Self {
        Boosts(iter.into_iter().map(|(n, b)| (n.into(), b)).collect())
    }
}

/// A dependency cycle. Every member depends on the next one and the last
/// member depends on the first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Dependency cycle detected: {}", display_cycle(.cycle))]
pub struct CycleError {
    pub cycle: Vec<ModuleName>,
}

fn display_cycle(cycle: &[ModuleName]) -> String {
    let mut out = cycle
        .iter()
        .map(ModuleName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ");
    if let Some(first) = cycle.first() {
        out.push_str(" -> ");
        out.push_str(first.as_str());
    }
    out
}

/// Directed "depends-on" graph over module names.
///
/// Nodes keep their registration order, which is the final tie-breaker after
/// boosts, so identical input always produces identical output.
pub struct DependencySolver<'a> {
    boosts: &'a Boosts,
    nodes: Vec<ModuleName>,
    index: HashMap<ModuleName, usize>,
    dependencies: Vec<Vec<usize>>,
}

impl<'a> DependencySolver<'a> {
    pub fn new(boosts: &'a Boosts) -> Self {
        DependencySolver {
            boosts,
            nodes: Vec::new(),
            index: HashMap::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn add_node(&mut self, name: &ModuleName) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(name.clone());
        self.index.insert(name.clone(), i);
        self.dependencies.push(Vec::new());
        i
    }

    /// Records that `from` depends on `to`. Either end is registered if it
    /// was not already, so an edge to a missing module is representable.
    pub fn add_edge(&mut self, from: &ModuleName, to: &ModuleName) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        if !self.dependencies[from].contains(&to) {
            self.dependencies[from].push(to);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Orders the nodes so that every dependency comes before its dependents.
    pub fn solve(&self) -> Result<Vec<ModuleName>, CycleError> {
        let n = self.nodes.len();
        let mut pending: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (node, dependencies) in self.dependencies.iter().enumerate() {
            for &dependency in dependencies {
                dependents[dependency].push(node);
            }
        }

        let mut ready: BinaryHeap<(i64, Reverse<usize>)> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| self.priority(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some((boost, Reverse(i))) = ready.pop() {
            trace!("Placing {} (boost {})", self.nodes[i], boost);
            order.push(i);
            for &dependent in &dependents[i] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push(self.priority(dependent));
                }
            }
        }

        if order.len() < n {
            let cycle = self.find_cycle(&pending);
            debug!(
                "Solver stopped after placing {} of {} nodes",
                order.len(),
                n
            );
            return Err(CycleError { cycle });
        }

        debug!("Solved dependency order for {} nodes", n);
        Ok(order.into_iter().map(|i| self.nodes[i].clone()).collect())
    }

    fn priority(&self, i: usize) -> (i64, Reverse<usize>) {
        (self.boosts.get(&self.nodes[i]), Reverse(i))
    }

    /// Every node left with pending dependencies has at least one unplaced
    /// dependency, so following those from any of them must loop.
    fn find_cycle(&self, pending: &[usize]) -> Vec<ModuleName> {
        let unplaced = |i: usize| pending[i] > 0;
        let Some(start) = (0..self.nodes.len()).find(|&i| unplaced(i)) else {
            return Vec::new();
        };

        let mut path: Vec<usize> = Vec::new();
        let mut position: HashMap<usize, usize> = HashMap::new();
        let mut current = start;
        loop {
            if let Some(&p) = position.get(&current) {
                return path[p..]
                    .iter()
                    .map(|&i| self.nodes[i].clone())
                    .collect();
            }
            position.insert(current, path.len());
            path.push(current);
            match self.dependencies[current].iter().find(|&&d| unplaced(d)) {
                Some(&next) => current = next,
                None => return Vec::new(),
            }
        }
    }
}
