//! Member lookup along class hierarchies
//!
//! One manager is built per resolved unit and shared by the resolver and the
//! verifiers. Inherited member maps are memoized per class.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::element::{ClassElement, ClassRef, FieldElement, LibraryLookup, MethodElement};

#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    Method(MethodElement),
    Field(FieldElement),
}

/// A member together with the class that declares it
#[derive(Debug, Clone, PartialEq)]
pub struct InheritedMember {
    pub owner: ClassRef,
    pub kind: MemberKind,
}

impl InheritedMember {
    pub fn name(&self) -> &str {
        match &self.kind {
            MemberKind::Method(method) => &method.name,
            MemberKind::Field(field) => &field.name,
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(&self.kind, MemberKind::Method(method) if method.is_abstract)
    }

    pub fn is_static(&self) -> bool {
        match &self.kind {
            MemberKind::Method(method) => method.is_static,
            MemberKind::Field(field) => field.is_static,
        }
    }

    pub fn as_method(&self) -> Option<&MethodElement> {
        match &self.kind {
            MemberKind::Method(method) => Some(method),
            MemberKind::Field(_) => None,
        }
    }
}

pub type MemberMap = BTreeMap<String, InheritedMember>;

pub struct InheritanceManager<'a> {
    lookup: &'a dyn LibraryLookup,
    inherited: RefCell<HashMap<ClassRef, Rc<MemberMap>>>,
}

impl<'a> InheritanceManager<'a> {
    pub fn new(lookup: &'a dyn LibraryLookup) -> Self {
        Self {
            lookup,
            inherited: RefCell::new(HashMap::new()),
        }
    }

    pub fn class(&self, class: &ClassRef) -> Option<&'a ClassElement> {
        self.lookup.class(class)
    }

    /// Members declared directly in `class`
    pub fn declared_member(&self, class: &ClassRef, name: &str) -> Option<InheritedMember> {
        let element = self.class(class)?;
        declared(element, name)
    }

    /// Member visible on instances of `class`: its own, then those of its
    /// mixins and superclass chain, then those of its interfaces.
    pub fn lookup_member(&self, class: &ClassRef, name: &str) -> Option<InheritedMember> {
        self.declared_member(class, name)
            .or_else(|| self.inherited_members(class).get(name).cloned())
    }

    /// First non-abstract member along the class, mixin and superclass chain
    pub fn concrete_member(&self, class: &ClassRef, name: &str) -> Option<InheritedMember> {
        let mut seen = HashSet::new();
        let mut current = Some(class.clone());
        while let Some(class) = current {
            if !seen.insert(class.clone()) {
                return None;
            }
            let element = self.class(&class)?;
            let found = std::iter::once(element)
                .chain(
                    element
                        .mixins
                        .iter()
                        .rev()
                        .filter_map(|mixin| self.class(&mixin.element)),
                )
                .find_map(|candidate| declared(candidate, name).filter(|m| !m.is_abstract()));
            if found.is_some() {
                return found;
            }
            current = element.supertype.as_ref().map(|t| t.element.clone());
        }
        None
    }

    /// Everything `class` inherits through supertypes, keyed by name. The
    /// class's own members are not included; superclass members win over
    /// interface members of the same name.
    pub fn inherited_members(&self, class: &ClassRef) -> Rc<MemberMap> {
        if let Some(members) = self.inherited.borrow().get(class) {
            return members.clone();
        }
        let members = Rc::new(self.compute_inherited(class, &mut HashSet::new()));
        self.inherited
            .borrow_mut()
            .insert(class.clone(), members.clone());
        members
    }

    /// Member of a supertype that a member named `name` in `class` overrides
    pub fn overridden_member(&self, class: &ClassRef, name: &str) -> Option<InheritedMember> {
        self.inherited_members(class).get(name).cloned()
    }

    fn compute_inherited(&self, class: &ClassRef, visiting: &mut HashSet<ClassRef>) -> MemberMap {
        let mut members = MemberMap::new();
        let Some(element) = self.class(class) else {
            return members;
        };
        if !visiting.insert(class.clone()) {
            return members;
        }
        let supertypes = element
            .supertype
            .iter()
            .chain(element.mixins.iter().rev())
            .chain(element.interfaces.iter());
        for supertype in supertypes {
            let Some(super_element) = self.class(&supertype.element) else {
                continue;
            };
            for member in all_declared(super_element) {
                members
                    .entry(member.name().to_string())
                    .or_insert(member);
            }
            for (name, member) in self.compute_inherited(&supertype.element, visiting) {
                members.entry(name).or_insert(member);
            }
        }
        visiting.remove(class);
        members
    }
}

fn declared(class: &ClassElement, name: &str) -> Option<InheritedMember> {
    let owner = class.class_ref();
    class
        .method(name)
        .map(|method| InheritedMember {
            owner: owner.clone(),
            kind: MemberKind::Method(method.clone()),
        })
        .or_else(|| {
            class.field(name).map(|field| InheritedMember {
                owner: owner.clone(),
                kind: MemberKind::Field(field.clone()),
            })
        })
}

fn all_declared(class: &ClassElement) -> Vec<InheritedMember> {
    let owner = class.class_ref();
    let methods = class.methods.iter().map(|method| InheritedMember {
        owner: owner.clone(),
        kind: MemberKind::Method(method.clone()),
    });
    let fields = class.fields.iter().map(|field| InheritedMember {
        owner: owner.clone(),
        kind: MemberKind::Field(field.clone()),
    });
    methods.chain(fields).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{LibraryElement, LibraryMap};
    use crate::types::{DartType, InterfaceType};
    use pretty_assertions::assert_eq;
    use sable_core::Source;
    use std::sync::Arc;

    fn method(name: &str, is_abstract: bool) -> MethodElement {
        MethodElement {
            name: name.to_string(),
            name_offset: 0,
            is_static: false,
            is_abstract,
            return_type: DartType::Dynamic,
            parameters: Vec::new(),
        }
    }

    fn class(
        source: &Source,
        name: &str,
        supertype: Option<&str>,
        interfaces: &[&str],
        methods: Vec<MethodElement>,
    ) -> ClassElement {
        let reference = |n: &str| InterfaceType::new(ClassRef::new(source, n));
        ClassElement {
            name: name.to_string(),
            name_offset: 0,
            library: source.clone(),
            source: source.clone(),
            is_abstract: false,
            doc_comment: None,
            supertype: supertype.map(reference),
            mixins: Vec::new(),
            interfaces: interfaces.iter().map(|n| reference(*n)).collect(),
            fields: Vec::new(),
            methods,
            constructors: Vec::new(),
        }
    }

    fn lookup(classes: Vec<ClassElement>) -> LibraryMap {
        let source = Source::new("file:///a.dart");
        let mut library = LibraryElement::new(source.clone(), "a");
        library.defining_unit.classes = classes;
        let mut map = LibraryMap::new();
        map.insert(source, Arc::new(library));
        map
    }

    #[test]
    fn test_superclass_members_win_over_interfaces() {
        let source = Source::new("file:///a.dart");
        let map = lookup(vec![
            class(&source, "I", None, &[], vec![method("run", true)]),
            class(&source, "Base", None, &[], vec![method("run", false)]),
            class(&source, "C", Some("Base"), &["I"], vec![]),
        ]);
        let manager = InheritanceManager::new(&map);
        let c = ClassRef::new(&source, "C");

        let run = manager.lookup_member(&c, "run").unwrap();
        assert_eq!(run.owner.name, "Base");
        assert!(manager.concrete_member(&c, "run").is_some());
        assert!(manager.lookup_member(&c, "walk").is_none());
    }

    #[test]
    fn test_abstract_members_are_not_concrete() {
        let source = Source::new("file:///a.dart");
        let map = lookup(vec![
            class(&source, "I", None, &[], vec![method("run", true)]),
            class(&source, "C", None, &["I"], vec![]),
        ]);
        let manager = InheritanceManager::new(&map);
        let c = ClassRef::new(&source, "C");
        assert!(manager.concrete_member(&c, "run").is_none());
        assert!(manager.overridden_member(&c, "run").unwrap().is_abstract());
    }

    #[test]
    fn test_cyclic_hierarchy_terminates() {
        let source = Source::new("file:///a.dart");
        let map = lookup(vec![
            class(&source, "A", Some("B"), &[], vec![method("a", false)]),
            class(&source, "B", Some("A"), &[], vec![method("b", false)]),
        ]);
        let manager = InheritanceManager::new(&map);
        let a = ClassRef::new(&source, "A");
        assert!(manager.lookup_member(&a, "b").is_some());
        assert!(manager.concrete_member(&a, "missing").is_none());
        assert_eq!(manager.inherited_members(&a).len(), 2);
    }
}
