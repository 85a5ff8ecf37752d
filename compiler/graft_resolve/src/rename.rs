//! Mangled shadow identities and chain-local type remapping.

use rustc_hash::FxHashSet;

use graft_ir::{TypeDesc, MANGLE_SEPARATOR};

/// Compute the chain-scoped shadow identity for a declaration.
///
/// Deterministic in `(owning unit, original name)` so repeated compiles of
/// the same chain produce identical output. Cannot collide with a real
/// symbol: the separator is rejected in source identifiers at decode time.
pub fn mangle(name: &str, owning_unit: &str) -> String {
    format!("{name}{MANGLE_SEPARATOR}{owning_unit}")
}

/// Remap a type so references to any chain member resolve to the merged
/// unit. Object types naming a chain unit become the base; everything else
/// is unchanged.
pub fn remap_type(ty: &TypeDesc, chain: &FxHashSet<String>, base: &str) -> TypeDesc {
    match ty {
        TypeDesc::Object(name) if chain.contains(name.as_str()) => {
            TypeDesc::Object(base.to_string())
        }
        TypeDesc::Array(elem) => TypeDesc::Array(Box::new(remap_type(elem, chain, base))),
        other => other.clone(),
    }
}
