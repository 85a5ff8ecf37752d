//! Reference and call-site rewriting.
//!
//! Every instruction of every chain unit streams through [`rewrite_body`]
//! exactly once. The rewrite substitutes the merged unit's name for chain
//! member references, renames accesses to shadowed declarations, and, at
//! the heart of multi-way chaining, statically redirects every super-style
//! call to the actual chain predecessor recorded in the plan. Virtual
//! dispatch semantics are *not* reproduced; the redirect is exact, which is
//! sound because the compiler controls the entire chain.

use graft_ir::{
    CallKind, CodeBody, Const, Instruction, MemberKey, ParamShape, TypeDesc, CTOR_NAME,
    VALUES_FIELD,
};
use graft_resolve::{remap_type, ChainPlan, DeclDecision};

use crate::error::EmitError;

/// Context for rewriting one unit's bodies.
pub(crate) struct RewriteCx<'a> {
    pub plan: &'a ChainPlan,
    /// Original name of the unit being rewritten.
    pub unit: &'a str,
    /// Chain position of that unit; `plan.order.len()` for nested units,
    /// which see the whole chain.
    pub position: usize,
    /// Inside `<clinit>` of an enumerated chain: constructions resolve
    /// against the declaring unit's own epoch, not the final slot.
    pub in_enum_clinit: bool,
}

impl<'a> RewriteCx<'a> {
    fn remap(&self, ty: &TypeDesc) -> TypeDesc {
        remap_type(ty, self.plan.chain_set(), &self.plan.base)
    }

    fn remap_shape(&self, shape: &ParamShape) -> ParamShape {
        shape.iter().map(|ty| self.remap(ty)).collect()
    }

    /// The name a member access lands on in the merged unit: the mangled
    /// shadow identity when the referenced declaration was renamed, the
    /// original name otherwise. On enumerated chains the regenerated
    /// constant table keeps its canonical name regardless of how the unit
    /// declared it.
    fn emitted_name(&self, owner: &str, key: &MemberKey) -> String {
        if self.plan.base_is_enum
            && matches!(key, MemberKey::Field { name } if name == VALUES_FIELD)
        {
            return VALUES_FIELD.to_string();
        }
        match self.plan.decision(owner, key) {
            Some(DeclDecision::Rename { new_name }) => new_name.clone(),
            _ => key.name().to_string(),
        }
    }
}

/// Rewrite one body. Returns the rewritten body; jump targets are remapped
/// across any inserted discriminator pushes.
pub(crate) fn rewrite_body(cx: &RewriteCx<'_>, body: &CodeBody) -> Result<CodeBody, EmitError> {
    // Emitted instruction groups, one per source instruction; discriminator
    // pushes join their call's group.
    let mut groups: Vec<Vec<Instruction>> = Vec::with_capacity(body.code.len());
    // Pending `New` allocations of chain units distinguish construction
    // calls from predecessor delegation.
    let mut pending_new: u32 = 0;
    let mut inserted = false;

    for inst in &body.code {
        let group = rewrite_inst(cx, inst, &mut pending_new)?;
        inserted |= group.len() > 1;
        groups.push(group);
    }

    // Old index -> new index of the group head.
    let mut index_map = Vec::with_capacity(groups.len());
    let mut next = 0u32;
    for group in &groups {
        index_map.push(next);
        next += group.len() as u32;
    }

    let mut code = Vec::with_capacity(next as usize);
    for group in groups {
        for inst in group {
            code.push(match inst {
                Instruction::Jump(t) => Instruction::Jump(index_map[t as usize]),
                Instruction::Branch(t) => Instruction::Branch(index_map[t as usize]),
                other => other,
            });
        }
    }

    Ok(CodeBody {
        // A discriminator push holds one extra slot live across its call.
        max_stack: body.max_stack + u16::from(inserted),
        max_locals: body.max_locals,
        code,
    })
}

fn rewrite_inst(
    cx: &RewriteCx<'_>,
    inst: &Instruction,
    pending_new: &mut u32,
) -> Result<Vec<Instruction>, EmitError> {
    let plan = cx.plan;
    let base = &plan.base;

    let out = match inst {
        Instruction::GetField(r) | Instruction::PutField(r)
            if plan.is_chain_unit(&r.owner) =>
        {
            let key = MemberKey::field(r.name.clone());
            let name = cx.emitted_name(&r.owner, &key);
            let rewritten = graft_ir::MemberRef::new(base.clone(), name);
            match inst {
                Instruction::GetField(_) => vec![Instruction::GetField(rewritten)],
                _ => vec![Instruction::PutField(rewritten)],
            }
        }
        Instruction::GetStatic(r) | Instruction::PutStatic(r)
            if plan.is_chain_unit(&r.owner) =>
        {
            let key = MemberKey::field(r.name.clone());
            let name = cx.emitted_name(&r.owner, &key);
            let rewritten = graft_ir::MemberRef::new(base.clone(), name);
            match inst {
                Instruction::GetStatic(_) => vec![Instruction::GetStatic(rewritten)],
                _ => vec![Instruction::PutStatic(rewritten)],
            }
        }
        Instruction::New(name) if plan.is_chain_unit(name) => {
            *pending_new += 1;
            vec![Instruction::New(base.clone())]
        }
        Instruction::NewArray(ty) => vec![Instruction::NewArray(cx.remap(ty))],
        Instruction::Call { kind, target } => {
            let shape = cx.remap_shape(&target.shape);
            let ret = cx.remap(&target.ret);
            if !plan.is_chain_unit(&target.owner) {
                let mut t = target.clone();
                t.shape = shape;
                t.ret = ret;
                vec![Instruction::Call {
                    kind: *kind,
                    target: t,
                }]
            } else if target.name == CTOR_NAME {
                return rewrite_ctor_call(cx, shape, pending_new);
            } else {
                return rewrite_member_call(cx, *kind, target, shape, ret);
            }
        }
        other => vec![other.clone()],
    };
    Ok(out)
}

/// Constructor calls: a construction (paired with a pending `New`) targets
/// the final physical constructor of the shape; a delegation targets the
/// chain predecessor, pushing its discriminator when the predecessor was
/// superseded.
fn rewrite_ctor_call(
    cx: &RewriteCx<'_>,
    shape: ParamShape,
    pending_new: &mut u32,
) -> Result<Vec<Instruction>, EmitError> {
    let plan = cx.plan;
    let key = MemberKey::method(CTOR_NAME, shape.clone());

    let construction = *pending_new > 0;
    if construction {
        *pending_new -= 1;
    }

    let site = if construction {
        if cx.in_enum_clinit {
            plan.ctor_at_or_before(&shape, cx.position)
        } else {
            plan.ctors.get(&shape).and_then(|sites| sites.last())
        }
    } else {
        plan.ctor_before(&shape, cx.position)
    };
    let Some(site) = site else {
        return Err(EmitError::UnresolvedPredecessor {
            unit: cx.unit.to_string(),
            key,
        });
    };

    let mut out = Vec::with_capacity(2);
    let mut final_shape = shape;
    if let Some(value) = site.discriminator {
        out.push(Instruction::LoadConst(Const::Long(i64::from(value))));
        final_shape.push(TypeDesc::Long);
    }
    out.push(Instruction::Call {
        kind: CallKind::Special,
        target: graft_ir::CallRef::new(
            plan.base.clone(),
            CTOR_NAME,
            final_shape,
            TypeDesc::Void,
        ),
    });
    Ok(out)
}

fn rewrite_member_call(
    cx: &RewriteCx<'_>,
    kind: CallKind,
    target: &graft_ir::CallRef,
    shape: ParamShape,
    ret: TypeDesc,
) -> Result<Vec<Instruction>, EmitError> {
    let plan = cx.plan;
    let key = MemberKey::method(target.name.clone(), shape.clone());

    let name = match kind {
        // Super-style: a `Special` call naming a chain member other than the
        // caller itself is redirected to the actual predecessor.
        CallKind::Special if target.owner != cx.unit && target.owner != plan.merged_alias => {
            match plan.predecessor(&key, cx.position) {
                Some(site) => site.emitted_name.clone(),
                None => {
                    return Err(EmitError::UnresolvedPredecessor {
                        unit: cx.unit.to_string(),
                        key,
                    })
                }
            }
        }
        // Self-reference: follow the declaration's own rename decision so
        // calls to the unit's private helpers land on their shadow identity.
        CallKind::Special | CallKind::Static if target.owner == cx.unit => {
            cx.emitted_name(&target.owner, &key)
        }
        // Public slot: the final owner keeps the original name.
        _ => target.name.clone(),
    };

    Ok(vec![Instruction::Call {
        kind,
        target: graft_ir::CallRef::new(plan.base.clone(), name, shape, ret),
    }])
}
