//! Graft IR - Compiled Unit Model
//!
//! This crate contains the core data structures for the graft compiler:
//! - `TypeDesc` for wire type descriptors
//! - `UnitFlags` / `MemberFlags` / `Visibility` for declaration modifiers
//! - `CompiledUnit`, `Field`, `Method` for unit structure
//! - `Instruction` / `CodeBody` for method bodies
//! - The GUF binary codec (`to_bytes` / `from_bytes`)
//! - `UnitBuilder` for programmatic unit construction
//!
//! # Design Philosophy
//!
//! - **Units are values**: a `CompiledUnit` is plain owned data, decoded once
//!   and never mutated. The compiler only ever produces *new* byte streams.
//! - **Index-addressed code**: jump targets are instruction indices, not byte
//!   offsets, so code motion only needs index rebasing.
//! - **Canonical encoding**: encode → decode → encode is byte-identical.

mod builder;
mod code;
mod codec;
mod flags;
mod ty;
mod unit;

pub use builder::UnitBuilder;
pub use code::{
    int_value, push_int, rebase_jump_targets, CallKind, CallRef, CodeBody, Const, Instruction,
    Intrinsic, MemberRef,
};
pub use codec::{from_bytes, to_bytes, DecodeError, EncodeError, FORMAT_VERSION};
pub use flags::{MemberFlags, UnitFlags, Visibility};
pub use ty::{shape_descriptor, ParamShape, TypeDesc};
pub use unit::{
    CompiledUnit, Field, HookRef, MemberKey, Method, NestedRef, WellFormedError, BY_NAME_METHOD,
    CLINIT_NAME, CTOR_NAME, MANGLE_SEPARATOR, VALUES_FIELD, VALUES_METHOD,
};
