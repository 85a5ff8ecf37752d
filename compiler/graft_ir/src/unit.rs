//! Compiled unit structure.
//!
//! A [`CompiledUnit`] is the decoded form of one unit byte stream: a named,
//! binary-addressable definition with supertype/interface references, field
//! and method declarations, and nested-unit relationship records. Units are
//! immutable once decoded; rewrite passes build new units.

use std::fmt;

use crate::code::CodeBody;
use crate::flags::{MemberFlags, UnitFlags, Visibility};
use crate::ty::{shape_descriptor, ParamShape, TypeDesc};

/// Reserved constructor name.
pub const CTOR_NAME: &str = "<init>";
/// Reserved static-initializer name.
pub const CLINIT_NAME: &str = "<clinit>";
/// Synthesized field holding the ordinal-ordered constant table of an
/// enumerated unit.
pub const VALUES_FIELD: &str = "$values";
/// Generated accessor returning a copy of the constant table.
pub const VALUES_METHOD: &str = "values";
/// Generated accessor resolving a constant by name.
pub const BY_NAME_METHOD: &str = "by_name";
/// Separator reserved for mangled shadow identities. Rejected in source
/// identifiers so mangled names cannot collide with real symbols; only
/// compiler-synthesized members may carry it, which keeps merged output
/// decodable.
pub const MANGLE_SEPARATOR: char = '#';

/// Collision identity of a member: `(name, parameter shape)` for methods,
/// `(name)` for fields. Two members with the same key in different units are
/// on the same slot.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum MemberKey {
    Field { name: String },
    Method { name: String, shape: ParamShape },
}

impl MemberKey {
    pub fn field(name: impl Into<String>) -> Self {
        MemberKey::Field { name: name.into() }
    }

    pub fn method(name: impl Into<String>, shape: ParamShape) -> Self {
        MemberKey::Method {
            name: name.into(),
            shape,
        }
    }

    /// The declared name, regardless of member kind.
    pub fn name(&self) -> &str {
        match self {
            MemberKey::Field { name } | MemberKey::Method { name, .. } => name,
        }
    }
}

// The error-message rendering: `name` for fields, `name(descriptors)` for
// methods.
impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKey::Field { name } => write!(f, "{name}"),
            MemberKey::Method { name, shape } => {
                write!(f, "{name}{}", shape_descriptor(shape))
            }
        }
    }
}

/// A pre-init hook reference: a named static function (optionally scoped to
/// another unit) invoked with the constructor's own arguments before the
/// constructor body runs.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct HookRef {
    /// Owning unit of the hook function; `None` means the declaring unit.
    pub owner: Option<String>,
    pub name: String,
}

impl HookRef {
    pub fn local(name: impl Into<String>) -> Self {
        HookRef {
            owner: None,
            name: name.into(),
        }
    }

    pub fn scoped(owner: impl Into<String>, name: impl Into<String>) -> Self {
        HookRef {
            owner: Some(owner.into()),
            name: name.into(),
        }
    }
}

/// A field declaration.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Field {
    pub name: String,
    pub ty: TypeDesc,
    pub visibility: Visibility,
    pub flags: MemberFlags,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeDesc, visibility: Visibility) -> Self {
        Field {
            name: name.into(),
            ty,
            visibility,
            flags: MemberFlags::empty(),
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: MemberFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn key(&self) -> MemberKey {
        MemberKey::field(self.name.clone())
    }
}

/// A method declaration (constructors and the static initializer included).
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Method {
    pub name: String,
    pub shape: ParamShape,
    pub ret: TypeDesc,
    pub visibility: Visibility,
    pub flags: MemberFlags,
    /// Pre-init hooks; only meaningful on constructors.
    pub hooks: Vec<HookRef>,
    /// Absent for interface members.
    pub body: Option<CodeBody>,
}

impl Method {
    pub fn new(name: impl Into<String>, shape: ParamShape, ret: TypeDesc) -> Self {
        Method {
            name: name.into(),
            shape,
            ret,
            visibility: Visibility::Public,
            flags: MemberFlags::empty(),
            hooks: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: MemberFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_hook(mut self, hook: HookRef) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: CodeBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn is_ctor(&self) -> bool {
        self.name == CTOR_NAME
    }

    pub fn is_clinit(&self) -> bool {
        self.name == CLINIT_NAME
    }

    pub fn key(&self) -> MemberKey {
        MemberKey::method(self.name.clone(), self.shape.clone())
    }
}

/// A nested-unit relationship record.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct NestedRef {
    /// Fully-qualified name of the nested unit.
    pub inner: String,
    /// Fully-qualified name of the enclosing unit.
    pub outer: String,
    /// Simple (unqualified) name of the nested unit.
    pub simple_name: String,
    pub flags: UnitFlags,
}

/// A decoded compiled unit. Identity is the fully-qualified name.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct CompiledUnit {
    pub name: String,
    pub flags: UnitFlags,
    pub supertype: Option<String>,
    pub interfaces: Vec<String>,
    /// Free-form metadata tags (the declarative annotation facts of the
    /// surrounding system).
    pub tags: Vec<String>,
    /// Declared augmentation target, when this unit augments another.
    pub augments: Option<String>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub nested: Vec<NestedRef>,
}

impl CompiledUnit {
    pub fn is_enum(&self) -> bool {
        self.flags.contains(UnitFlags::ENUM)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, key: &MemberKey) -> Option<&Method> {
        self.methods.iter().find(|m| &m.key() == key)
    }

    /// The static initializer, if the unit declares one.
    pub fn clinit(&self) -> Option<&Method> {
        self.methods.iter().find(|m| m.is_clinit())
    }

    pub fn constructors(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|m| m.is_ctor())
    }

    /// Structural well-formedness of a single unit, checked at decode time.
    ///
    /// Cross-unit contract violations (duplicate slots, narrowing) are the
    /// resolver's concern, not the codec's.
    pub fn validate(&self) -> Result<(), WellFormedError> {
        self.check_identifier(&self.name)?;
        if let Some(superty) = &self.supertype {
            self.check_identifier(superty)?;
        }
        for iface in &self.interfaces {
            self.check_identifier(iface)?;
        }
        if let Some(target) = &self.augments {
            self.check_identifier(target)?;
        }
        for field in &self.fields {
            self.check_member_identifier(&field.name, field.flags)?;
        }

        let mut clinit_count = 0usize;
        for method in &self.methods {
            if method.is_clinit() {
                clinit_count += 1;
                if !method.is_static() {
                    return self.fail(format!("`{CLINIT_NAME}` must be static"));
                }
                if clinit_count > 1 {
                    return self.fail(format!("more than one `{CLINIT_NAME}` declared"));
                }
            } else if !method.is_ctor() {
                self.check_member_identifier(&method.name, method.flags)?;
            }
            if !method.hooks.is_empty() && !method.is_ctor() {
                return self.fail(format!(
                    "pre-init hooks declared on non-constructor `{}`",
                    method.name
                ));
            }
            if let Some(body) = &method.body {
                let len = body.code.len() as u32;
                for (i, inst) in body.code.iter().enumerate() {
                    if let Some(target) = inst.jump_target() {
                        if target >= len {
                            return self.fail(format!(
                                "jump target {target} out of range at {}#{i} (body length {len})",
                                method.name
                            ));
                        }
                    }
                }
            }
        }
        for nested in &self.nested {
            self.check_identifier(&nested.inner)?;
            self.check_identifier(&nested.outer)?;
            self.check_identifier(&nested.simple_name)?;
        }
        Ok(())
    }

    fn check_identifier(&self, ident: &str) -> Result<(), WellFormedError> {
        if ident.is_empty() {
            return self.fail("empty identifier".to_string());
        }
        if ident.contains(MANGLE_SEPARATOR) {
            return self.fail(format!(
                "identifier `{ident}` contains reserved character `{MANGLE_SEPARATOR}`"
            ));
        }
        Ok(())
    }

    /// Member names follow the same rules, except that compiler-synthesized
    /// members (renamed shadows) legitimately carry the mangle separator.
    fn check_member_identifier(
        &self,
        ident: &str,
        flags: MemberFlags,
    ) -> Result<(), WellFormedError> {
        if flags.contains(MemberFlags::SYNTHETIC) {
            if ident.is_empty() {
                return self.fail("empty identifier".to_string());
            }
            return Ok(());
        }
        self.check_identifier(ident)
    }

    fn fail(&self, message: String) -> Result<(), WellFormedError> {
        Err(WellFormedError {
            unit: self.name.clone(),
            message,
        })
    }
}

/// A structural defect found in a single decoded unit.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct WellFormedError {
    pub unit: String,
    pub message: String,
}

impl fmt::Display for WellFormedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed unit `{}`: {}", self.unit, self.message)
    }
}

impl std::error::Error for WellFormedError {}
