//! The unit byte source collaborator.

use rustc_hash::FxHashMap;

use graft_ir::{to_bytes, CompiledUnit, EncodeError};

/// Supplies raw unit byte streams on demand. All reads are synchronous; the
/// emitter never performs I/O of its own.
pub trait UnitSource: Send + Sync {
    /// The raw bytes of a unit, or `None` when the source has none: a
    /// lookup failure the compiler surfaces as fatal for the chain.
    fn open_unit(&self, name: &str) -> Option<Vec<u8>>;
}

/// In-memory [`UnitSource`] keyed by unit name.
#[derive(Default, Debug)]
pub struct MemoryUnitSource {
    units: FxHashMap<String, Vec<u8>>,
}

impl MemoryUnitSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register raw bytes under a name. Later registrations win.
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.units.insert(name.into(), bytes);
    }

    /// Encode and register a structured unit.
    pub fn insert_unit(&mut self, unit: &CompiledUnit) -> Result<(), EncodeError> {
        let bytes = to_bytes(unit)?;
        self.units.insert(unit.name.clone(), bytes);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl UnitSource for MemoryUnitSource {
    fn open_unit(&self, name: &str) -> Option<Vec<u8>> {
        self.units.get(name).cloned()
    }
}
