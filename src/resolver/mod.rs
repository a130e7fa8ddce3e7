//! Dependency Resolver
//!
//! Turns module descriptors into one linear execution order.
//!
//! # Graph
//!
//! ```text
//! after: X   → every member of X  ──▶ module
//! before: X  → module ──▶ every member of X
//! groups     → every member of group i ──▶ every member of group j (i < j)
//! ```
//!
//! `X` may name a module, a tag or a group. The order is a topological sort
//! of the merged edge set; ties are broken by registration order, so a set
//! without constraints keeps the order in which modules were added.

mod graph;

use crate::error::{KernelError, Result};
use crate::module::ModuleDescriptor;
use graph::Graph;
use std::collections::{BTreeSet, HashMap};

/// Resolves an execution order against a fixed group sequence.
///
/// The resolver holds no state between calls.
pub struct DependencyResolver<'a> {
    groups: &'a [String],
}

impl<'a> DependencyResolver<'a> {
    pub fn new(groups: &'a [String]) -> Self {
        Self { groups }
    }

    /// Order `modules` (given in registration order) or fail.
    pub fn resolve(&self, modules: &[ModuleDescriptor]) -> Result<Vec<String>> {
        let index = Index::build(self.groups, modules)?;
        let mut graph = Graph::new(modules.len());

        for (node, module) in modules.iter().enumerate() {
            for reference in &module.after {
                for pred in index.expand(&module.name, reference)? {
                    if pred != node {
                        graph.edge(pred, node);
                    }
                }
            }
            for reference in &module.before {
                for succ in index.expand(&module.name, reference)? {
                    if succ != node {
                        graph.edge(node, succ);
                    }
                }
            }
        }

        let populated: Vec<&BTreeSet<usize>> = self
            .groups
            .iter()
            .filter_map(|group| index.groups.get(group.as_str()))
            .collect();
        for (i, earlier) in populated.iter().enumerate() {
            for later in &populated[i + 1..] {
                for &pred in earlier.iter() {
                    for &succ in later.iter() {
                        graph.edge(pred, succ);
                    }
                }
            }
        }

        match graph.toposort() {
            Ok(order) => Ok(order
                .into_iter()
                .map(|node| modules[node].name.clone())
                .collect()),
            Err(cycle) => Err(KernelError::CircularDependency {
                cycle: cycle
                    .into_iter()
                    .map(|node| modules[node].name.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> "),
            }),
        }
    }
}

/// Name, tag and group membership of one module set
struct Index<'m> {
    names: HashMap<&'m str, usize>,
    tags: HashMap<&'m str, BTreeSet<usize>>,
    groups: HashMap<&'m str, BTreeSet<usize>>,
}

impl<'m> Index<'m> {
    fn build(groups: &[String], modules: &'m [ModuleDescriptor]) -> Result<Self> {
        let mut index = Index {
            names: HashMap::new(),
            tags: HashMap::new(),
            groups: HashMap::new(),
        };
        for (node, module) in modules.iter().enumerate() {
            index.names.insert(module.name.as_str(), node);
            for tag in &module.tags {
                index.tags.entry(tag.as_str()).or_default().insert(node);
            }
            if let Some(group) = &module.group {
                if !groups.contains(group) {
                    return Err(KernelError::UnknownGroup {
                        module: module.name.clone(),
                        group: group.clone(),
                    });
                }
                index.groups.entry(group.as_str()).or_default().insert(node);
            }
        }
        Ok(index)
    }

    /// Every module denoted by `reference`
    fn expand(&self, module: &str, reference: &str) -> Result<BTreeSet<usize>> {
        let mut nodes = BTreeSet::new();
        if let Some(&node) = self.names.get(reference) {
            nodes.insert(node);
        }
        if let Some(members) = self.tags.get(reference) {
            nodes.extend(members);
        }
        if let Some(members) = self.groups.get(reference) {
            nodes.extend(members);
        }
        if nodes.is_empty() {
            return Err(KernelError::UnresolvedReference {
                module: module.to_string(),
                reference: reference.to_string(),
            });
        }
        Ok(nodes)
    }
}
