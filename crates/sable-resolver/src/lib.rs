//! Element model, name and type resolution, and static verification
//!
//! Libraries are built a cycle at a time: [`element_builder`] creates bare
//! elements, [`directive_builder`] wires imports and exports, and
//! [`hierarchy`] fills in supertypes and signatures. Units are then resolved
//! one by one with [`resolver::resolve_unit`], and [`hints`] runs last over a
//! whole library.

pub mod constant;
pub mod directive_builder;
pub mod element;
pub mod element_builder;
pub mod error;
pub mod error_verifier;
pub mod hierarchy;
pub mod hints;
pub mod inheritance;
pub mod namespace;
pub mod resolvable;
pub mod resolved;
pub mod resolver;
pub mod scope;
pub mod type_provider;
pub mod types;
pub mod visitor;

pub use constant::{ConstantVerifier, DartObject};
pub use directive_builder::{compute_entry_points, DirectiveBuilder};
pub use element::{
    ClassElement, ClassRef, CompilationUnitElement, CycleLookup, Element, ExportElement,
    ImportElement, LibraryElement, LibraryLookup, LibraryMap, MemberRef, TopLevelRef,
};
pub use element_builder::{build_unit_element, LibraryElementBuilder, ENTRY_POINT_NAME};
pub use error::ResolverError;
pub use error_verifier::ErrorVerifier;
pub use hierarchy::HierarchyResolver;
pub use hints::{HintGenerator, LibraryHints};
pub use inheritance::InheritanceManager;
pub use namespace::{Namespace, NamespaceBuilder};
pub use resolvable::{DirectiveContext, ResolvableLibrary, ResolvablePart};
pub use resolved::{ResolutionTable, ResolvedUnit};
pub use resolver::{resolve_unit, UnitContext};
pub use scope::{LibraryScope, ScopeLookup};
pub use type_provider::TypeProvider;
pub use types::{DartType, InterfaceType, TypeSystem};
