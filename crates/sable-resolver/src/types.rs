//! Static types and the subtype relation
//!
//! The supported subset has no generics, so a type is either one of the
//! special types or a class.

use std::collections::HashSet;
use std::fmt;

use crate::element::{ClassRef, LibraryLookup};
use crate::type_provider::TypeProvider;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceType {
    pub element: ClassRef,
}

impl InterfaceType {
    pub fn new(element: ClassRef) -> Self {
        Self { element }
    }

    pub fn name(&self) -> &str {
        &self.element.name
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DartType {
    Dynamic,
    Void,
    /// Type of `null`, assignable to everything
    Bottom,
    Interface(InterfaceType),
}

impl DartType {
    pub fn interface(element: ClassRef) -> Self {
        DartType::Interface(InterfaceType::new(element))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, DartType::Dynamic)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, DartType::Void)
    }

    pub fn as_interface(&self) -> Option<&InterfaceType> {
        match self {
            DartType::Interface(interface) => Some(interface),
            _ => None,
        }
    }
}

impl fmt::Display for DartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DartType::Dynamic => f.write_str("dynamic"),
            DartType::Void => f.write_str("void"),
            DartType::Bottom => f.write_str("Null"),
            DartType::Interface(interface) => interface.fmt(f),
        }
    }
}

/// Subtyping over the classes reachable through a [`LibraryLookup`]
pub struct TypeSystem<'a> {
    lookup: &'a dyn LibraryLookup,
    provider: &'a TypeProvider,
}

impl<'a> TypeSystem<'a> {
    pub fn new(lookup: &'a dyn LibraryLookup, provider: &'a TypeProvider) -> Self {
        Self { lookup, provider }
    }

    pub fn is_subtype(&self, sub: &DartType, sup: &DartType) -> bool {
        match (sub, sup) {
            (DartType::Dynamic, _) | (_, DartType::Dynamic) => true,
            (DartType::Bottom, _) => true,
            (DartType::Void, DartType::Void) => true,
            (DartType::Void, _) | (_, DartType::Void) => false,
            (_, DartType::Bottom) => false,
            (DartType::Interface(sub), DartType::Interface(sup)) => {
                sup.element == self.provider.object_type.element
                    || self.superclasses(&sub.element).contains(&sup.element)
            }
        }
    }

    /// Assignable in either direction, which is what Dart 1 static checks use.
    pub fn is_assignable(&self, from: &DartType, to: &DartType) -> bool {
        self.is_subtype(from, to) || self.is_subtype(to, from)
    }

    /// The class itself and every class reachable through supertypes, mixins
    /// and interfaces. Terminates on cyclic hierarchies.
    pub fn superclasses(&self, class: &ClassRef) -> HashSet<ClassRef> {
        let mut seen = HashSet::new();
        let mut stack = vec![class.clone()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(element) = self.lookup.class(&current) {
                stack.extend(element.direct_supertypes().map(|t| t.element.clone()));
            }
        }
        seen
    }

    /// Least upper bound, approximated: equal types stay, numbers join to
    /// `num`, anything else becomes `dynamic`.
    pub fn least_upper_bound(&self, left: &DartType, right: &DartType) -> DartType {
        if left == right {
            return left.clone();
        }
        match (left, right) {
            (DartType::Bottom, other) | (other, DartType::Bottom) => other.clone(),
            _ if self.provider.is_numeric(left) && self.provider.is_numeric(right) => {
                self.provider.num_type()
            }
            _ => DartType::Dynamic,
        }
    }
}
