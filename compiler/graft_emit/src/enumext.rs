//! Enumeration extension.
//!
//! Enumerated base types need more than initializer concatenation: ordinals
//! must be globally consistent across the whole chain, and the constant
//! table plus the `values`/`by_name` accessors must be regenerated from the
//! union of constants, not the base alone.
//!
//! A pre-pass strips the stylized "construct named instance at known
//! ordinal" fragments and the constant-table build out of every (already
//! rewritten) initializer fragment. Each stripped construction becomes an
//! [`EnumConstantRecord`]; a later record with the same name merges into the
//! earlier one, inheriting its ordinal. After all chain members are scanned,
//! records are re-emitted in ordinal order, re-synthesizing the embedded
//! ordinal push with the narrowest integer encoding, and the accessors are
//! regenerated wholesale.

use rustc_hash::FxHashMap;

use graft_ir::{
    int_value, push_int, CodeBody, Const, Field, Instruction, Intrinsic, MemberFlags, MemberRef,
    Method, ParamShape, TypeDesc, Visibility, BY_NAME_METHOD, CTOR_NAME, VALUES_FIELD,
    VALUES_METHOD,
};
use smallvec::smallvec;

use crate::error::EmitError;

/// One enumerated constant, as observed across the chain.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct EnumConstantRecord {
    pub name: String,
    /// Assigned by first-declaration order across the whole chain.
    pub ordinal: u32,
    /// Last unit whose declaration supplied the initializer.
    pub declaring_unit: String,
    /// Extra constructor-argument instructions between the ordinal push and
    /// the constructor call, already rewritten for the merged unit.
    pub middle: Vec<Instruction>,
    /// The rewritten constructor call.
    pub call: Instruction,
    /// The embedded ordinal disagreed with the assigned one and the push
    /// must be re-synthesized.
    pub needs_ordinal_patch: bool,
}

/// A constant construction stripped from one fragment.
#[derive(Clone, Debug)]
pub(crate) struct ScannedConstant {
    pub name: String,
    pub embedded_ordinal: u32,
    pub middle: Vec<Instruction>,
    pub call: Instruction,
}

/// Strip the stylized constant constructions and the `$values` table build
/// from a rewritten initializer fragment. Returns the residual fragment and
/// the constants in declaration order.
pub(crate) fn scan_fragment(
    unit: &str,
    base: &str,
    body: CodeBody,
) -> Result<(CodeBody, Vec<ScannedConstant>), EmitError> {
    let code = &body.code;
    let mut constants = Vec::new();
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    let mut i = 0;
    while i < code.len() {
        if let Some((constant, end)) = match_construction(code, i, base) {
            ranges.push((i, end));
            constants.push(constant);
            i = end + 1;
        } else {
            i += 1;
        }
    }

    if let Some(range) = find_values_build(code, base).map_err(|message| EmitError::EnumPattern {
        unit: unit.to_string(),
        message,
    })? {
        if ranges.iter().any(|r| overlaps(*r, range)) {
            return Err(EmitError::EnumPattern {
                unit: unit.to_string(),
                message: "table build interleaved with a constant construction".to_string(),
            });
        }
        ranges.push(range);
    }

    ranges.sort_unstable();
    let residual = strip_ranges(body.code, &ranges).map_err(|message| EmitError::EnumPattern {
        unit: unit.to_string(),
        message,
    })?;

    Ok((
        CodeBody {
            max_stack: body.max_stack,
            max_locals: body.max_locals,
            code: residual,
        },
        constants,
    ))
}

/// Recognize `New; Dup; LoadConst name; <int push>; args…; Call <init>;
/// PutStatic name` starting at `start`. Returns the constant and the
/// inclusive end index.
fn match_construction(
    code: &[Instruction],
    start: usize,
    base: &str,
) -> Option<(ScannedConstant, usize)> {
    match code.get(start)? {
        Instruction::New(owner) if owner == base => {}
        _ => return None,
    }
    if !matches!(code.get(start + 1)?, Instruction::Dup) {
        return None;
    }
    let name = match code.get(start + 2)? {
        Instruction::LoadConst(Const::Str(name)) => name.clone(),
        _ => return None,
    };
    let embedded_ordinal = u32::try_from(int_value(code.get(start + 3)?)?).ok()?;

    // Everything up to the constructor call is the extra-argument fragment.
    let mut call_idx = None;
    for (offset, inst) in code.iter().enumerate().skip(start + 4) {
        if let Instruction::Call { target, .. } = inst {
            if target.owner == base && target.name == CTOR_NAME {
                call_idx = Some(offset);
                break;
            }
        }
    }
    let call_idx = call_idx?;

    match code.get(call_idx + 1)? {
        Instruction::PutStatic(r) if r.owner == base && r.name == name => {}
        _ => return None,
    }

    Some((
        ScannedConstant {
            name,
            embedded_ordinal,
            middle: code[start + 4..call_idx].to_vec(),
            call: code[call_idx].clone(),
        },
        call_idx + 1,
    ))
}

/// Locate the `$values` table build: a count push, `NewArray`, per-constant
/// stores, and the closing `PutStatic $values`. Returns the inclusive range.
fn find_values_build(
    code: &[Instruction],
    base: &str,
) -> Result<Option<(usize, usize)>, String> {
    let Some(put_idx) = code.iter().position(|inst| {
        matches!(inst, Instruction::PutStatic(r) if r.owner == base && r.name == VALUES_FIELD)
    }) else {
        return Ok(None);
    };

    let array_idx = code[..put_idx]
        .iter()
        .rposition(|inst| matches!(inst, Instruction::NewArray(_)))
        .ok_or_else(|| "`$values` store without a table allocation".to_string())?;
    if array_idx == 0 || int_value(&code[array_idx - 1]).is_none() {
        return Err("table allocation without a length push".to_string());
    }
    Ok(Some((array_idx - 1, put_idx)))
}

fn overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// Remove the inclusive `ranges` (sorted, disjoint) from `code`, remapping
/// jump targets across the removed spans.
fn strip_ranges(
    code: Vec<Instruction>,
    ranges: &[(usize, usize)],
) -> Result<Vec<Instruction>, String> {
    let mut removed = vec![false; code.len()];
    for &(start, end) in ranges {
        for slot in &mut removed[start..=end] {
            *slot = true;
        }
    }

    // Old index -> new index for every kept instruction.
    let mut index_map = vec![u32::MAX; code.len()];
    let mut next = 0u32;
    for (i, is_removed) in removed.iter().enumerate() {
        if !is_removed {
            index_map[i] = next;
            next += 1;
        }
    }

    let map_target = |t: u32| -> Result<u32, String> {
        index_map
            .get(t as usize)
            .copied()
            .filter(|&m| m != u32::MAX)
            .ok_or_else(|| format!("jump target {t} lands inside a stripped range"))
    };

    let mut out = Vec::with_capacity(next as usize);
    for (i, inst) in code.into_iter().enumerate() {
        if removed[i] {
            continue;
        }
        out.push(match inst {
            Instruction::Jump(t) => Instruction::Jump(map_target(t)?),
            Instruction::Branch(t) => Instruction::Branch(map_target(t)?),
            other => other,
        });
    }
    Ok(out)
}

/// Accumulates constant records across the chain and regenerates the
/// constant table and accessors.
#[derive(Default, Debug)]
pub(crate) struct EnumTable {
    records: Vec<EnumConstantRecord>,
    by_name: FxHashMap<String, usize>,
}

impl EnumTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment's constants, in their declaration order.
    pub(crate) fn add_fragment(&mut self, unit: &str, constants: Vec<ScannedConstant>) {
        for constant in constants {
            if let Some(&idx) = self.by_name.get(&constant.name) {
                // Re-declared constant: the initializer updates, the ordinal
                // never moves.
                let record = &mut self.records[idx];
                record.declaring_unit = unit.to_string();
                record.middle = constant.middle;
                record.call = constant.call;
                record.needs_ordinal_patch = constant.embedded_ordinal != record.ordinal;
                tracing::trace!(unit, name = %record.name, "enum constant re-declared");
            } else {
                let ordinal = self.records.len() as u32;
                self.by_name.insert(constant.name.clone(), self.records.len());
                self.records.push(EnumConstantRecord {
                    needs_ordinal_patch: constant.embedded_ordinal != ordinal,
                    name: constant.name,
                    ordinal,
                    declaring_unit: unit.to_string(),
                    middle: constant.middle,
                    call: constant.call,
                });
            }
        }
    }

    pub(crate) fn records(&self) -> &[EnumConstantRecord] {
        &self.records
    }

    /// Re-emit every construction in ordinal order plus the table build.
    /// Returns the initializer head and its operand-stack requirement.
    pub(crate) fn build_head(&self, base: &str) -> (Vec<Instruction>, u16) {
        let mut head = Vec::new();
        let mut max_middle = 0usize;

        for record in &self.records {
            max_middle = max_middle.max(record.middle.len());
            head.push(Instruction::New(base.to_string()));
            head.push(Instruction::Dup);
            head.push(Instruction::LoadConst(Const::Str(record.name.clone())));
            head.push(push_int(record.ordinal as i32));
            head.extend(record.middle.iter().cloned());
            head.push(record.call.clone());
            head.push(Instruction::PutStatic(MemberRef::new(
                base,
                record.name.clone(),
            )));
        }

        head.push(push_int(self.records.len() as i32));
        head.push(Instruction::NewArray(TypeDesc::Object(base.to_string())));
        for record in &self.records {
            head.push(Instruction::Dup);
            head.push(push_int(record.ordinal as i32));
            head.push(Instruction::GetStatic(MemberRef::new(
                base,
                record.name.clone(),
            )));
            head.push(Instruction::ArrayStore);
        }
        head.push(Instruction::PutStatic(MemberRef::new(base, VALUES_FIELD)));

        // New + Dup + name + ordinal, then up to `max_middle` argument
        // pushes live at once; the table build itself peaks at four.
        let stack = 4 + u16::try_from(max_middle).unwrap_or(u16::MAX - 4);
        (head, stack)
    }

    /// The synthesized `$values` field holding the ordinal-ordered table.
    pub(crate) fn values_field(&self, base: &str) -> Field {
        Field::new(
            VALUES_FIELD,
            TypeDesc::Array(Box::new(TypeDesc::Object(base.to_string()))),
            Visibility::Private,
        )
        .with_flags(MemberFlags::STATIC | MemberFlags::FINAL | MemberFlags::SYNTHETIC)
    }

    /// The regenerated `values()` accessor.
    pub(crate) fn values_method(&self, base: &str) -> Method {
        let ret = TypeDesc::Array(Box::new(TypeDesc::Object(base.to_string())));
        Method::new(VALUES_METHOD, ParamShape::new(), ret)
            .with_flags(MemberFlags::STATIC | MemberFlags::SYNTHETIC)
            .with_body(CodeBody::new(
                1,
                0,
                vec![
                    Instruction::GetStatic(MemberRef::new(base, VALUES_FIELD)),
                    Instruction::Intrinsic(Intrinsic::ArrayClone),
                    Instruction::ReturnValue,
                ],
            ))
    }

    /// The regenerated `by_name(str)` accessor.
    pub(crate) fn by_name_method(&self, base: &str) -> Method {
        Method::new(
            BY_NAME_METHOD,
            smallvec![TypeDesc::Str],
            TypeDesc::Object(base.to_string()),
        )
        .with_flags(MemberFlags::STATIC | MemberFlags::SYNTHETIC)
        .with_body(CodeBody::new(
            1,
            1,
            vec![
                Instruction::LoadLocal(0),
                Instruction::Intrinsic(Intrinsic::EnumByName),
                Instruction::ReturnValue,
            ],
        ))
    }
}
