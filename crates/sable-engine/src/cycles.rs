//! The library dependency graph
//!
//! Libraries that import or export each other, directly or transitively,
//! form a cycle and have to be built together. Cycles are the strongly
//! connected components of the import/export graph.

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use sable_core::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Import,
    Export,
    /// The implicit import of `dart:core`
    ImplicitCore,
}

/// Import/export edges between libraries, pointing from a library to the
/// libraries it depends on
#[derive(Debug, Default)]
pub struct LibraryGraph {
    graph: DiGraph<Source, DependencyKind>,
    indices: HashMap<Source, NodeIndex>,
}

impl LibraryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_library(&mut self, source: &Source) -> NodeIndex {
        if let Some(index) = self.indices.get(source) {
            return *index;
        }
        let index = self.graph.add_node(source.clone());
        self.indices.insert(source.clone(), index);
        index
    }

    /// Add an edge between two libraries already in the graph. Edges to
    /// unknown sources are ignored; those are not libraries.
    pub fn add_dependency(&mut self, from: &Source, to: &Source, kind: DependencyKind) {
        if let (Some(&from), Some(&to)) = (self.indices.get(from), self.indices.get(to)) {
            if self.graph.find_edge(from, to).is_none() {
                self.graph.add_edge(from, to, kind);
            }
        }
    }

    pub fn contains(&self, source: &Source) -> bool {
        self.indices.contains_key(source)
    }

    pub fn library_count(&self) -> usize {
        self.graph.node_count()
    }

    /// All cycles, each sorted, ordered so that every cycle comes after the
    /// cycles it depends on.
    pub fn cycles(&self) -> Vec<Vec<Source>> {
        // kosaraju_scc yields components in reverse topological order, which
        // with edges pointing at dependencies is dependencies first.
        kosaraju_scc(&self.graph)
            .into_iter()
            .map(|component| {
                let mut cycle: Vec<Source> = component
                    .into_iter()
                    .map(|index| self.graph[index].clone())
                    .collect();
                cycle.sort();
                cycle
            })
            .collect()
    }

    /// The cycle containing `source`, or `None` if it is not a library
    pub fn cycle_of(&self, source: &Source) -> Option<Vec<Source>> {
        self.cycles().into_iter().find(|cycle| cycle.contains(source))
    }

    /// Direct dependencies of a library
    pub fn dependencies_of(&self, source: &Source) -> Vec<Source> {
        self.neighbors(source, Direction::Outgoing)
    }

    /// `sources` plus every library whose dependency closure contains one of them
    pub fn dependents_closure<'a>(
        &self,
        sources: impl IntoIterator<Item = &'a Source>,
    ) -> BTreeSet<Source> {
        let mut closure = BTreeSet::new();
        let mut queue: VecDeque<Source> = sources.into_iter().cloned().collect();
        while let Some(source) = queue.pop_front() {
            if !closure.insert(source.clone()) {
                continue;
            }
            queue.extend(self.neighbors(&source, Direction::Incoming));
        }
        closure
    }

    fn neighbors(&self, source: &Source, direction: Direction) -> Vec<Source> {
        let Some(&index) = self.indices.get(source) else {
            return Vec::new();
        };
        let mut neighbors: Vec<Source> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|neighbor| self.graph[neighbor].clone())
            .collect();
        neighbors.sort();
        neighbors
    }
}
