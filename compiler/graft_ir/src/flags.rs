//! Declaration modifier flags.
//!
//! Flags are stored verbatim in the wire format as `u16` bit sets, so every
//! bit here is part of the encoding and must not be renumbered.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Unit-level modifiers.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct UnitFlags: u16 {
        /// Enumerated-constant type; its static initializer uses the
        /// stylized constant-construction pattern.
        const ENUM = 1 << 0;
        /// Interface-like unit (no constructors, no instance state).
        const INTERFACE = 1 << 1;
        /// Compiler-synthesized unit.
        const SYNTHETIC = 1 << 2;
        /// Not extensible by further units.
        const FINAL = 1 << 3;
    }
}

bitflags! {
    /// Field/method modifiers.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct MemberFlags: u16 {
        const STATIC = 1 << 0;
        const FINAL = 1 << 1;
        /// Compiler-synthesized member (renamed shadows, discriminator
        /// constructors, regenerated enum accessors).
        const SYNTHETIC = 1 << 2;
        /// Field holding an enumerated constant.
        const ENUM_CONST = 1 << 3;
    }
}

/// Declared visibility of a unit member.
///
/// Ordered from least to most exposed, so `a < b` means "`a` is narrower
/// than `b`" and the planner's narrowing checks are plain comparisons.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Visibility {
    /// Visible only inside the declaring unit. Private members never
    /// participate in override resolution.
    Private,
    /// Visible to the unit's own package/module grouping.
    Internal,
    /// Visible everywhere.
    Public,
}

impl Visibility {
    pub fn is_private(self) -> bool {
        matches!(self, Visibility::Private)
    }

    /// Wire encoding. Stable, part of the format.
    pub fn to_wire(self) -> u8 {
        match self {
            Visibility::Private => 0,
            Visibility::Internal => 1,
            Visibility::Public => 2,
        }
    }

    pub fn from_wire(v: u8) -> Option<Visibility> {
        match v {
            0 => Some(Visibility::Private),
            1 => Some(Visibility::Internal),
            2 => Some(Visibility::Public),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Private => write!(f, "private"),
            Visibility::Internal => write!(f, "internal"),
            Visibility::Public => write!(f, "public"),
        }
    }
}
