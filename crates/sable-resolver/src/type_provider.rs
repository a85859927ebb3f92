use crate::element::{ClassRef, LibraryElement};
use crate::error::ResolverError;
use crate::types::{DartType, InterfaceType};

/// The core types every resolution step relies on, looked up once from the
/// `dart:core` library element. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeProvider {
    pub object_type: InterfaceType,
    pub null_type: InterfaceType,
    pub bool_type: InterfaceType,
    pub num_type: InterfaceType,
    pub int_type: InterfaceType,
    pub double_type: InterfaceType,
    pub string_type: InterfaceType,
    pub list_type: InterfaceType,
    pub function_type: InterfaceType,
    pub type_type: InterfaceType,
}

impl TypeProvider {
    pub fn new(core: &LibraryElement) -> Result<Self, ResolverError> {
        let class = |name: &str| -> Result<InterfaceType, ResolverError> {
            core.class(name)
                .map(|class| InterfaceType::new(ClassRef::new(&core.source, &class.name)))
                .ok_or_else(|| ResolverError::MissingCoreType(name.to_string()))
        };
        Ok(Self {
            object_type: class("Object")?,
            null_type: class("Null")?,
            bool_type: class("bool")?,
            num_type: class("num")?,
            int_type: class("int")?,
            double_type: class("double")?,
            string_type: class("String")?,
            list_type: class("List")?,
            function_type: class("Function")?,
            type_type: class("Type")?,
        })
    }

    pub fn object(&self) -> DartType {
        DartType::Interface(self.object_type.clone())
    }

    pub fn bool(&self) -> DartType {
        DartType::Interface(self.bool_type.clone())
    }

    pub fn int(&self) -> DartType {
        DartType::Interface(self.int_type.clone())
    }

    pub fn double(&self) -> DartType {
        DartType::Interface(self.double_type.clone())
    }

    pub fn num_type(&self) -> DartType {
        DartType::Interface(self.num_type.clone())
    }

    pub fn string(&self) -> DartType {
        DartType::Interface(self.string_type.clone())
    }

    pub fn type_literal(&self) -> DartType {
        DartType::Interface(self.type_type.clone())
    }

    pub fn is_numeric(&self, ty: &DartType) -> bool {
        match ty {
            DartType::Interface(interface) => {
                interface == &self.int_type
                    || interface == &self.double_type
                    || interface == &self.num_type
            }
            _ => false,
        }
    }
}
