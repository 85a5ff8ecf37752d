//! Constructor chaining: pre-init hook inlining and discriminator
//! application.
//!
//! Hooks are inlined as static calls receiving the constructor's own
//! arguments, in declaration order, strictly before the original body, and
//! therefore before any delegation to the predecessor constructor. The hook
//! metadata itself never survives into the merged unit.
//!
//! A superseded physical constructor keeps its nominal shape but gains a
//! synthetic trailing `long` parameter; the parameter is never read, it only
//! disambiguates same-shape constructors originating from different units.

use graft_ir::{
    rebase_jump_targets, CallKind, CallRef, CodeBody, Instruction, ParamShape, TypeDesc,
};
use graft_resolve::ChainPlan;

/// Inline a constructor's pre-init hooks ahead of its (already rewritten)
/// body. `shape` is the nominal (pre-discriminator) parameter shape.
pub(crate) fn inline_hooks(
    plan: &ChainPlan,
    declaring_unit: &str,
    hooks: &[graft_ir::HookRef],
    shape: &ParamShape,
    body: CodeBody,
) -> CodeBody {
    if hooks.is_empty() {
        return body;
    }

    let mut prefix = Vec::with_capacity(hooks.len() * (shape.len() + 1));
    for hook in hooks {
        // Instance slot 0 is `this`; arguments start at 1.
        for slot in 0..shape.len() {
            prefix.push(Instruction::LoadLocal(slot as u16 + 1));
        }
        let owner = hook.owner.as_deref().unwrap_or(declaring_unit);
        let owner = if plan.is_chain_unit(owner) {
            plan.base.clone()
        } else {
            owner.to_string()
        };
        prefix.push(Instruction::Call {
            kind: CallKind::Static,
            target: CallRef::new(owner, hook.name.clone(), shape.clone(), TypeDesc::Void),
        });
    }

    let offset = prefix.len() as u32;
    let mut code = body.code;
    rebase_jump_targets(&mut code, offset);
    prefix.append(&mut code);

    CodeBody {
        max_stack: body.max_stack.max(shape.len() as u16),
        max_locals: body.max_locals,
        code: prefix,
    }
}

/// Append the synthetic discriminator parameter to a superseded physical
/// constructor: widen the shape and shift the body's temporary locals past
/// the new parameter slot. The discriminator itself is never read.
pub(crate) fn append_discriminator(shape: &mut ParamShape, body: &mut CodeBody) {
    // Slots: 0 = this, 1..=n = parameters, n+1.. = temporaries.
    let first_temp = shape.len() as u16 + 1;
    shape.push(TypeDesc::Long);
    for inst in &mut body.code {
        match inst {
            Instruction::LoadLocal(slot) | Instruction::StoreLocal(slot)
                if *slot >= first_temp =>
            {
                *slot += 1;
            }
            _ => {}
        }
    }
    body.max_locals = body.max_locals.max(first_temp) + 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_ir::MemberRef;
    use graft_resolve::resolve;
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;

    fn test_plan() -> ChainPlan {
        let mut index = graft_index::MemoryUnitIndex::new();
        index
            .add_unit(&graft_ir::UnitBuilder::new("ex.Base").build())
            .unwrap();
        resolve(&["ex.Base".to_string()], &index).unwrap()
    }

    #[test]
    fn test_hooks_run_before_body_in_declaration_order() {
        let plan = test_plan();
        let shape: ParamShape = smallvec![TypeDesc::Int, TypeDesc::Str];
        let body = CodeBody::new(1, 3, vec![Instruction::Return]);
        let hooks = vec![
            graft_ir::HookRef::local("first"),
            graft_ir::HookRef::scoped("ex.Audit", "second"),
        ];

        let merged = inline_hooks(&plan, "ex.Base", &hooks, &shape, body);

        // Two hooks, each loading both arguments then calling out.
        assert_eq!(merged.code.len(), 7);
        assert_eq!(merged.code[0], Instruction::LoadLocal(1));
        assert_eq!(merged.code[1], Instruction::LoadLocal(2));
        let Instruction::Call { kind, target } = &merged.code[2] else {
            panic!("expected hook call");
        };
        assert_eq!(*kind, CallKind::Static);
        assert_eq!(target.owner, "ex.Base");
        assert_eq!(target.name, "first");
        let Instruction::Call { target, .. } = &merged.code[5] else {
            panic!("expected hook call");
        };
        assert_eq!(target.owner, "ex.Audit");
        assert_eq!(target.name, "second");
        assert_eq!(merged.code[6], Instruction::Return);
        assert_eq!(merged.max_stack, 2);
    }

    #[test]
    fn test_hook_inlining_rebases_jumps() {
        let plan = test_plan();
        let shape: ParamShape = smallvec![TypeDesc::Int];
        let body = CodeBody::new(
            1,
            2,
            vec![
                Instruction::LoadLocal(1),
                Instruction::Branch(3),
                Instruction::Return,
                Instruction::Return,
            ],
        );
        let merged = inline_hooks(
            &plan,
            "ex.Base",
            &[graft_ir::HookRef::local("check")],
            &shape,
            body,
        );
        // One argument load plus the call shifts everything by two.
        assert_eq!(merged.code[3], Instruction::Branch(5));
    }

    #[test]
    fn test_discriminator_widens_shape_and_shifts_temps() {
        let mut shape: ParamShape = smallvec![TypeDesc::Int];
        let mut body = CodeBody::new(
            2,
            3,
            vec![
                Instruction::LoadLocal(0),
                Instruction::LoadLocal(1),
                Instruction::StoreLocal(2), // temporary, must shift
                Instruction::LoadLocal(2),
                Instruction::PutField(MemberRef::new("ex.Base", "size")),
                Instruction::Return,
            ],
        );

        append_discriminator(&mut shape, &mut body);

        assert_eq!(shape.len(), 2);
        assert_eq!(shape[1], TypeDesc::Long);
        assert_eq!(body.code[1], Instruction::LoadLocal(1));
        assert_eq!(body.code[2], Instruction::StoreLocal(3));
        assert_eq!(body.code[3], Instruction::LoadLocal(3));
        assert_eq!(body.max_locals, 4);
    }
}
