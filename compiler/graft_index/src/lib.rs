//! Unit Index oracle.
//!
//! Answers "what members, supertype, and interfaces does unit X declare" and
//! "which units carry tag Y". The index is populated once, before any chain
//! compiles, and is read-only thereafter; consumers hold it behind `Arc` and
//! query it concurrently without further synchronization.
//!
//! The resolver consults the index instead of decoded unit bodies so the
//! analysis pass never touches byte streams.

use std::fmt;

use rustc_hash::FxHashMap;

use graft_ir::{CompiledUnit, MemberFlags, MemberKey, ParamShape, TypeDesc, UnitFlags, Visibility};

/// Declared-field fact.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeDesc,
    pub visibility: Visibility,
    pub flags: MemberFlags,
}

impl FieldDecl {
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn key(&self) -> MemberKey {
        MemberKey::field(self.name.clone())
    }
}

impl From<&graft_ir::Field> for FieldDecl {
    fn from(field: &graft_ir::Field) -> Self {
        FieldDecl {
            name: field.name.clone(),
            ty: field.ty.clone(),
            visibility: field.visibility,
            flags: field.flags,
        }
    }
}

/// Declared-method fact.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MethodDecl {
    pub name: String,
    pub shape: ParamShape,
    pub ret: TypeDesc,
    pub visibility: Visibility,
    pub flags: MemberFlags,
}

impl MethodDecl {
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn key(&self) -> MemberKey {
        MemberKey::method(self.name.clone(), self.shape.clone())
    }
}

impl From<&graft_ir::Method> for MethodDecl {
    fn from(method: &graft_ir::Method) -> Self {
        MethodDecl {
            name: method.name.clone(),
            shape: method.shape.clone(),
            ret: method.ret.clone(),
            visibility: method.visibility,
            flags: method.flags,
        }
    }
}

/// Everything the index knows about one unit.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct UnitFacts {
    pub name: String,
    pub flags: UnitFlags,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
}

impl UnitFacts {
    pub fn is_enum(&self) -> bool {
        self.flags.contains(UnitFlags::ENUM)
    }
}

impl From<&CompiledUnit> for UnitFacts {
    fn from(unit: &CompiledUnit) -> Self {
        UnitFacts {
            name: unit.name.clone(),
            flags: unit.flags,
            superclass: unit.supertype.clone(),
            interfaces: unit.interfaces.clone(),
            fields: unit.fields.iter().map(FieldDecl::from).collect(),
            methods: unit.methods.iter().map(MethodDecl::from).collect(),
        }
    }
}

const NO_UNITS: &[String] = &[];

/// The oracle consumed by the resolver and the compile driver.
///
/// `None` means the index has no data for the unit: a lookup failure the
/// caller must surface, never silently treat as "empty unit".
pub trait UnitIndex: Send + Sync {
    /// All declared facts for a unit.
    fn unit_facts(&self, unit: &str) -> Option<&UnitFacts>;

    /// Units carrying a metadata tag. Unknown tags yield an empty slice.
    fn units_tagged_with(&self, tag: &str) -> &[String];

    fn declared_fields(&self, unit: &str) -> Option<&[FieldDecl]> {
        self.unit_facts(unit).map(|f| f.fields.as_slice())
    }

    fn declared_methods(&self, unit: &str) -> Option<&[MethodDecl]> {
        self.unit_facts(unit).map(|f| f.methods.as_slice())
    }

    /// `Some(None)` is a known unit without a superclass; `None` is a unit
    /// the index has no data for.
    fn declared_superclass(&self, unit: &str) -> Option<Option<&str>> {
        self.unit_facts(unit).map(|f| f.superclass.as_deref())
    }

    fn declared_interfaces(&self, unit: &str) -> Option<&[String]> {
        self.unit_facts(unit).map(|f| f.interfaces.as_slice())
    }
}

/// Error raised while populating a [`MemoryUnitIndex`].
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum IndexError {
    /// The same unit name was registered twice.
    DuplicateUnit { name: String },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::DuplicateUnit { name } => {
                write!(f, "unit `{name}` registered twice in the index")
            }
        }
    }
}

impl std::error::Error for IndexError {}

/// In-memory [`UnitIndex`].
///
/// Populate with `add_unit`/`add_facts`, then share behind `Arc`. Population
/// takes `&mut self`, so a shared index is immutable by construction.
#[derive(Default, Debug)]
pub struct MemoryUnitIndex {
    units: FxHashMap<String, UnitFacts>,
    /// Tag → unit names, in registration order.
    tags: FxHashMap<String, Vec<String>>,
}

impl MemoryUnitIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a decoded unit: its declared facts plus its metadata tags.
    pub fn add_unit(&mut self, unit: &CompiledUnit) -> Result<(), IndexError> {
        for tag in &unit.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .push(unit.name.clone());
        }
        self.add_facts(UnitFacts::from(unit))
    }

    /// Index pre-extracted facts (for callers with their own metadata path).
    pub fn add_facts(&mut self, facts: UnitFacts) -> Result<(), IndexError> {
        let name = facts.name.clone();
        if self.units.insert(name.clone(), facts).is_some() {
            return Err(IndexError::DuplicateUnit { name });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl UnitIndex for MemoryUnitIndex {
    fn unit_facts(&self, unit: &str) -> Option<&UnitFacts> {
        self.units.get(unit)
    }

    fn units_tagged_with(&self, tag: &str) -> &[String] {
        self.tags.get(tag).map_or(NO_UNITS, Vec::as_slice)
    }
}
