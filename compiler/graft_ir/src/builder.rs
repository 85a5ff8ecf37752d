//! Programmatic unit construction.
//!
//! `UnitBuilder` assembles a [`CompiledUnit`] field by field. It is the
//! construction path for tests and tools; decoded byte streams go through
//! the codec instead.

use crate::flags::{UnitFlags, Visibility};
use crate::ty::TypeDesc;
use crate::unit::{CompiledUnit, Field, Method, NestedRef};

/// Fluent builder for [`CompiledUnit`].
#[derive(Clone, Debug)]
pub struct UnitBuilder {
    unit: CompiledUnit,
}

impl UnitBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        UnitBuilder {
            unit: CompiledUnit {
                name: name.into(),
                flags: UnitFlags::empty(),
                supertype: None,
                interfaces: Vec::new(),
                tags: Vec::new(),
                augments: None,
                fields: Vec::new(),
                methods: Vec::new(),
                nested: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn flags(mut self, flags: UnitFlags) -> Self {
        self.unit.flags = flags;
        self
    }

    #[must_use]
    pub fn supertype(mut self, name: impl Into<String>) -> Self {
        self.unit.supertype = Some(name.into());
        self
    }

    #[must_use]
    pub fn implements(mut self, name: impl Into<String>) -> Self {
        self.unit.interfaces.push(name.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.unit.tags.push(tag.into());
        self
    }

    /// Declare this unit an augmentation of `target`.
    #[must_use]
    pub fn augments(mut self, target: impl Into<String>) -> Self {
        self.unit.augments = Some(target.into());
        self
    }

    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: TypeDesc, visibility: Visibility) -> Self {
        self.field_decl(Field::new(name, ty, visibility))
    }

    #[must_use]
    pub fn field_decl(mut self, field: Field) -> Self {
        self.unit.fields.push(field);
        self
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.unit.methods.push(method);
        self
    }

    #[must_use]
    pub fn nested(mut self, nested: NestedRef) -> Self {
        self.unit.nested.push(nested);
        self
    }

    pub fn build(self) -> CompiledUnit {
        self.unit
    }
}
