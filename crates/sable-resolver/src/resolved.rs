use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use sable_core::Source;
use sable_parser::ast::{CompilationUnit, NodeId};

use crate::element::Element;
use crate::types::DartType;

/// Resolution results for one unit, keyed by node id. The syntax tree itself
/// is never modified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionTable {
    elements: HashMap<NodeId, Element>,
    types: HashMap<NodeId, DartType>,
    used_imports: BTreeSet<usize>,
}

impl ResolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_element(&mut self, node: NodeId, element: Element) {
        self.elements.insert(node, element);
    }

    pub fn record_type(&mut self, node: NodeId, ty: DartType) {
        self.types.insert(node, ty);
    }

    pub fn record_used_imports(&mut self, imports: impl IntoIterator<Item = usize>) {
        self.used_imports.extend(imports);
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        self.elements.get(&node)
    }

    /// Static type of an expression or type name, `dynamic` when unknown
    pub fn static_type(&self, node: NodeId) -> DartType {
        self.types.get(&node).cloned().unwrap_or(DartType::Dynamic)
    }

    pub fn has_type(&self, node: NodeId) -> bool {
        self.types.contains_key(&node)
    }

    /// Indices into the library's import list that some name resolved through
    pub fn used_imports(&self) -> &BTreeSet<usize> {
        &self.used_imports
    }

    pub fn elements(&self) -> impl Iterator<Item = (&NodeId, &Element)> {
        self.elements.iter()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

/// A unit after declaration, type and expression resolution
#[derive(Debug, Clone)]
pub struct ResolvedUnit {
    pub source: Source,
    pub library: Source,
    pub modification_time: i64,
    pub unit: Arc<CompilationUnit>,
    pub resolution: ResolutionTable,
}
