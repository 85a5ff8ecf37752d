//! The precomputed chain plan consulted by the emitter.

use rustc_hash::{FxHashMap, FxHashSet};

use graft_ir::{MemberKey, ParamShape, Visibility, MANGLE_SEPARATOR};

/// Final-owner record for one member key.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MemberRecord {
    pub key: MemberKey,
    /// Unit whose declaration finally owns the slot.
    pub owner: String,
    /// Merged visibility: the exposure of the earliest non-private
    /// declaration (later owners may not narrow and are never widened
    /// beyond it).
    pub visibility: Visibility,
    pub is_static: bool,
}

/// One non-private physical declaration of a key, in chain order.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct DeclSite {
    /// Chain position of the declaring unit (base = 0).
    pub position: usize,
    pub unit: String,
    /// Name the declaration carries in the merged unit: the original name
    /// for the final owner, the mangled shadow identity otherwise.
    pub emitted_name: String,
    pub visibility: Visibility,
    pub is_static: bool,
}

/// One physical constructor of a nominal shape, in chain order.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CtorSite {
    pub position: usize,
    pub unit: String,
    /// `None` for the final declarer of the shape (keeps the declared
    /// signature); otherwise the constant discriminator value appended as a
    /// synthetic trailing `long` parameter.
    pub discriminator: Option<u32>,
}

/// What the emitter does with one physical declaration.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum DeclDecision {
    /// Keeps its original public-facing name, with the merged visibility.
    Expose { visibility: Visibility },
    /// Moved to a private, chain-scoped shadow identity.
    Rename { new_name: String },
    /// Redundant overlay redeclaration; not emitted at all.
    DropOverlay,
    /// Constructor retained with its declared signature.
    Retain,
    /// Constructor retained with a synthetic trailing discriminator.
    Discriminate { value: u32 },
}

/// The full analysis result for one chain: member records, per-declaration
/// decisions, declaration timelines, and constructor slots.
#[derive(Clone, Debug)]
pub struct ChainPlan {
    pub base: String,
    /// Base first, then each augmentation in chain order.
    pub order: Vec<String>,
    /// Internal fully-merged alias, resolved to the base during emission.
    pub merged_alias: String,
    pub base_is_enum: bool,
    chain_set: FxHashSet<String>,
    positions: FxHashMap<String, usize>,
    pub records: FxHashMap<MemberKey, MemberRecord>,
    /// Non-private declaration sites per key, ascending by position.
    pub timelines: FxHashMap<MemberKey, Vec<DeclSite>>,
    /// Decision per physical declaration, keyed by (unit, member key).
    pub decisions: FxHashMap<(String, MemberKey), DeclDecision>,
    /// Physical constructors per nominal shape, ascending by position.
    pub ctors: FxHashMap<ParamShape, Vec<CtorSite>>,
}

impl ChainPlan {
    pub(crate) fn new(order: Vec<String>, base_is_enum: bool) -> Self {
        let base = order[0].clone();
        let merged_alias = format!("{base}{MANGLE_SEPARATOR}chain");
        let chain_set: FxHashSet<String> = order.iter().cloned().collect();
        let positions = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        ChainPlan {
            base,
            order,
            merged_alias,
            base_is_enum,
            chain_set,
            positions,
            records: FxHashMap::default(),
            timelines: FxHashMap::default(),
            decisions: FxHashMap::default(),
            ctors: FxHashMap::default(),
        }
    }

    /// Whether `name` is a chain member or the merged alias.
    pub fn is_chain_unit(&self, name: &str) -> bool {
        self.chain_set.contains(name) || name == self.merged_alias
    }

    /// The set of chain unit names (alias excluded), for type remapping.
    pub fn chain_set(&self) -> &FxHashSet<String> {
        &self.chain_set
    }

    /// Chain position of a unit; `None` for the alias and foreign units.
    pub fn position(&self, unit: &str) -> Option<usize> {
        self.positions.get(unit).copied()
    }

    pub fn decision(&self, unit: &str, key: &MemberKey) -> Option<&DeclDecision> {
        self.decisions.get(&(unit.to_string(), key.clone()))
    }

    /// The latest non-private declaration of `key` strictly before chain
    /// position `before`: the target of a super-style call written at that
    /// position.
    pub fn predecessor(&self, key: &MemberKey, before: usize) -> Option<&DeclSite> {
        self.timelines
            .get(key)?
            .iter()
            .rev()
            .find(|site| site.position < before)
    }

    /// The latest physical constructor of `shape` at or before `position`.
    /// Constant-initializer fragments resolve against their own unit, so
    /// the bound is inclusive.
    pub fn ctor_at_or_before(&self, shape: &ParamShape, position: usize) -> Option<&CtorSite> {
        self.ctors
            .get(shape)?
            .iter()
            .rev()
            .find(|site| site.position <= position)
    }

    /// The latest physical constructor of `shape` strictly before
    /// `position`: the target of a constructor delegation call.
    pub fn ctor_before(&self, shape: &ParamShape, position: usize) -> Option<&CtorSite> {
        self.ctors
            .get(shape)?
            .iter()
            .rev()
            .find(|site| site.position < position)
    }
}
