//! The per-chain compile driver.
//!
//! Opens and decodes every unit in the chain, runs the analysis pass, then
//! the emission pass, and encodes the results. Pure function of its inputs;
//! caching and serialization live in the registry.

use rustc_hash::FxHashMap;

use graft_emit::{merge_chain, rewrite_nested};
use graft_index::UnitIndex;
use graft_ir::{from_bytes, to_bytes, CompiledUnit};
use graft_resolve::resolve;

use crate::error::ComposeError;
use crate::source::UnitSource;

/// The composed result of one chain: merged byte streams for every name the
/// chain covers: the base's public name, its internal fully-merged alias,
/// and every rewritten nested unit.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ComposeOutput {
    pub base: String,
    /// The internal alias loaders may resolve; maps to the same merged
    /// stream as the base name.
    pub alias: String,
    /// The frozen chain order this output was compiled from (base first).
    pub order: Vec<String>,
    units: FxHashMap<String, Vec<u8>>,
}

impl ComposeOutput {
    /// The merged byte stream for a covered name.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.units.get(name).map(Vec::as_slice)
    }

    /// All covered names and their byte streams.
    pub fn units(&self) -> &FxHashMap<String, Vec<u8>> {
        &self.units
    }
}

#[tracing::instrument(level = "debug", skip(index, source), fields(base = order.first().map(String::as_str).unwrap_or("")))]
pub(crate) fn compile_chain(
    order: &[String],
    index: &dyn UnitIndex,
    source: &dyn UnitSource,
) -> Result<ComposeOutput, ComposeError> {
    let mut units: Vec<CompiledUnit> = Vec::with_capacity(order.len());
    for name in order {
        let bytes = source
            .open_unit(name)
            .ok_or_else(|| ComposeError::Lookup { name: name.clone() })?;
        let unit = from_bytes(&bytes).map_err(|e| ComposeError::Structural {
            unit: name.clone(),
            message: e.to_string(),
        })?;
        if &unit.name != name {
            return Err(ComposeError::Structural {
                unit: name.clone(),
                message: format!("stream declares unit `{}`", unit.name),
            });
        }
        units.push(unit);
    }

    let plan = resolve(order, index)?;
    let merged = merge_chain(&plan, &units)?;

    let mut out = FxHashMap::default();
    let merged_bytes = to_bytes(&merged).map_err(|e| ComposeError::Structural {
        unit: plan.base.clone(),
        message: e.to_string(),
    })?;
    out.insert(plan.merged_alias.clone(), merged_bytes.clone());
    out.insert(plan.base.clone(), merged_bytes);

    // Nested units pass through with chain references rewritten.
    for record in &merged.nested {
        if out.contains_key(&record.inner) {
            continue;
        }
        let bytes = source.open_unit(&record.inner).ok_or_else(|| {
            ComposeError::Lookup {
                name: record.inner.clone(),
            }
        })?;
        let nested = from_bytes(&bytes).map_err(|e| ComposeError::Structural {
            unit: record.inner.clone(),
            message: e.to_string(),
        })?;
        let rewritten = rewrite_nested(&plan, &nested)?;
        let bytes = to_bytes(&rewritten).map_err(|e| ComposeError::Structural {
            unit: record.inner.clone(),
            message: e.to_string(),
        })?;
        out.insert(record.inner.clone(), bytes);
    }

    tracing::debug!(covered = out.len(), "chain composed");
    Ok(ComposeOutput {
        base: plan.base,
        alias: plan.merged_alias,
        order: order.to_vec(),
        units: out,
    })
}
