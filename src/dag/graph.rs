// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::step::{StepName, StepSpec};
use crate::errors::{DagrunError, Result};

/// Read-only dependency indexes derived from a list of [`StepSpec`]s.
///
/// - `forward`: parent -> children
/// - `in_degree`: child -> number of parents
/// - `reverse`: child -> parents
///
/// `in_degree[n] == reverse[n].len()` holds for every node. Construction
/// rejects unknown dependencies, duplicate names and cycles, so a built
/// graph is always a DAG.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Step names in declaration order.
    order: Vec<StepName>,
    forward: HashMap<StepName, Vec<StepName>>,
    in_degree: HashMap<StepName, usize>,
    reverse: HashMap<StepName, Vec<StepName>>,
}

/// Levels of one weakly connected component: `levels[i]` holds the sorted
/// names whose longest path from a root of the component has length `i`.
pub type ComponentLevels = Vec<Vec<StepName>>;

impl DependencyGraph {
    pub fn build(steps: &[StepSpec]) -> Result<Self> {
        let mut order = Vec::with_capacity(steps.len());
        let mut forward: HashMap<StepName, Vec<StepName>> = HashMap::new();
        let mut in_degree: HashMap<StepName, usize> = HashMap::new();
        let mut reverse: HashMap<StepName, Vec<StepName>> = HashMap::new();

        for step in steps {
            if in_degree.contains_key(&step.name) {
                return Err(DagrunError::Config(format!(
                    "step '{}' is declared more than once",
                    step.name
                )));
            }
            order.push(step.name.clone());
            forward.insert(step.name.clone(), Vec::new());
            in_degree.insert(step.name.clone(), 0);
            reverse.insert(step.name.clone(), Vec::new());
        }

        for step in steps {
            let mut seen: HashSet<&str> = HashSet::new();
            for dep in &step.dependencies {
                if dep == &step.name {
                    return Err(DagrunError::Config(format!(
                        "step '{}' cannot depend on itself in `depends_on`",
                        step.name
                    )));
                }
                if !in_degree.contains_key(dep) {
                    return Err(DagrunError::Config(format!(
                        "step '{}' has unknown dependency '{}' in `depends_on`",
                        step.name, dep
                    )));
                }
                // Dependencies are a set; repeated names add no edge.
                if !seen.insert(dep.as_str()) {
                    continue;
                }

                if let Some(children) = forward.get_mut(dep) {
                    children.push(step.name.clone());
                }
                if let Some(deg) = in_degree.get_mut(&step.name) {
                    *deg += 1;
                }
                if let Some(parents) = reverse.get_mut(&step.name) {
                    parents.push(dep.clone());
                }
            }
        }

        let graph = Self {
            order,
            forward,
            in_degree,
            reverse,
        };
        graph.ensure_acyclic()?;
        Ok(graph)
    }

    fn ensure_acyclic(&self) -> Result<()> {
        // Edge direction: dep -> step.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for name in &self.order {
            graph.add_node(name.as_str());
        }
        for (parent, children) in &self.forward {
            for child in children {
                graph.add_edge(parent.as_str(), child.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(DagrunError::DagCycle(format!(
                "cycle detected in step DAG involving step '{}'",
                cycle.node_id()
            ))),
        }
    }

    /// Step names in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.in_degree.contains_key(name)
    }

    /// Steps with no dependencies, in declaration order.
    pub fn roots(&self) -> Vec<StepName> {
        self.order
            .iter()
            .filter(|name| self.in_degree(name) == 0)
            .cloned()
            .collect()
    }

    pub fn children_of(&self, name: &str) -> &[StepName] {
        self.forward.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn parents_of(&self, name: &str) -> &[StepName] {
        self.reverse.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn in_degree(&self, name: &str) -> usize {
        self.in_degree.get(name).copied().unwrap_or(0)
    }

    /// Weakly connected components, each sorted by name, ordered by their
    /// smallest member.
    pub fn components(&self) -> Vec<Vec<StepName>> {
        let nodes: BTreeSet<&str> = self.steps().collect();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut components = Vec::new();

        for start in nodes {
            if !visited.insert(start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([start]);

            while let Some(cur) = queue.pop_front() {
                component.insert(cur.to_string());
                let neighbours = self
                    .children_of(cur)
                    .iter()
                    .chain(self.parents_of(cur).iter());
                for nb in neighbours {
                    if visited.insert(nb.as_str()) {
                        queue.push_back(nb.as_str());
                    }
                }
            }

            components.push(component.into_iter().collect());
        }

        components
    }

    /// Longest-path levels within one component (Kahn's algorithm).
    pub fn levels(&self, component: &[StepName]) -> ComponentLevels {
        let members: HashSet<&str> = component.iter().map(|s| s.as_str()).collect();
        let mut remaining: HashMap<&str, usize> = component
            .iter()
            .map(|n| (n.as_str(), self.in_degree(n)))
            .collect();
        let mut level: HashMap<&str, usize> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        for name in component {
            if self.in_degree(name) == 0 {
                level.insert(name.as_str(), 0);
                queue.push_back(name.as_str());
            }
        }

        while let Some(cur) = queue.pop_front() {
            let next = level.get(cur).copied().unwrap_or(0) + 1;
            for child in self.children_of(cur) {
                let child = child.as_str();
                if !members.contains(child) {
                    continue;
                }
                let entry = level.entry(child).or_insert(0);
                *entry = (*entry).max(next);
                if let Some(rem) = remaining.get_mut(child) {
                    *rem = rem.saturating_sub(1);
                    if *rem == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }

        let depth = level.values().copied().max().map(|m| m + 1).unwrap_or(0);
        let mut levels: ComponentLevels = vec![Vec::new(); depth];
        for (name, lv) in level {
            levels[lv].push(name.to_string());
        }
        for names in levels.iter_mut() {
            names.sort();
        }
        levels
    }

    /// Levels over the whole graph, merging components level by level.
    pub fn global_levels(&self) -> ComponentLevels {
        let mut merged: ComponentLevels = Vec::new();
        for component in self.components() {
            for (i, names) in self.levels(&component).into_iter().enumerate() {
                if merged.len() <= i {
                    merged.push(Vec::new());
                }
                merged[i].extend(names);
            }
        }
        for names in merged.iter_mut() {
            names.sort();
        }
        merged
    }
}
