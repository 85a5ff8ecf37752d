//! The per-unit streaming pass and merged-unit assembly.
//!
//! Each chain unit streams through exactly once, in chain order, consulting
//! the precomputed plan: declarations pick up their rename/visibility
//! substitutions, bodies go through the call rewriter, nested-unit records
//! deduplicate, and static initializers accumulate for the merger. Nothing
//! here re-resolves anything; the plan is the single source of truth.

use rustc_hash::FxHashSet;

use graft_ir::{
    CompiledUnit, Field, MemberFlags, MemberKey, Method, NestedRef, ParamShape, TypeDesc,
    Visibility, BY_NAME_METHOD, CLINIT_NAME, VALUES_FIELD, VALUES_METHOD,
};
use graft_resolve::{remap_type, ChainPlan, DeclDecision};

use crate::calls::{rewrite_body, RewriteCx};
use crate::clinit::merge_fragments;
use crate::ctor::{append_discriminator, inline_hooks};
use crate::enumext::{scan_fragment, EnumTable};
use crate::error::EmitError;

/// Merge the decoded chain units into one unit.
///
/// `units` must be the chain's units in chain order, matching the plan. The
/// result carries the base's identity; every reference to a chain member
/// inside it has been rewritten to the merged name.
#[tracing::instrument(level = "debug", skip_all, fields(base = %plan.base, units = units.len()))]
pub fn merge_chain(plan: &ChainPlan, units: &[CompiledUnit]) -> Result<CompiledUnit, EmitError> {
    assert_eq!(
        units.len(),
        plan.order.len(),
        "unit list must match the planned chain"
    );
    for (unit, expected) in units.iter().zip(&plan.order) {
        assert_eq!(&unit.name, expected, "unit order must match the plan");
    }

    let base_unit = &units[0];
    let is_enum = plan.base_is_enum;

    let mut fields: Vec<Field> = Vec::new();
    let mut methods: Vec<Method> = Vec::new();
    let mut nested: Vec<NestedRef> = Vec::new();
    let mut clinit_fragments = Vec::new();
    let mut enum_table = EnumTable::new();

    for (position, unit) in units.iter().enumerate() {
        let cx = RewriteCx {
            plan,
            unit: &unit.name,
            position,
            in_enum_clinit: false,
        };

        for field in &unit.fields {
            if is_enum && field.name == VALUES_FIELD {
                continue; // regenerated from the merged constant table
            }
            let key = MemberKey::field(field.name.clone());
            let ty = remap_type(&field.ty, plan.chain_set(), &plan.base);
            match plan.decision(&unit.name, &key) {
                Some(DeclDecision::DropOverlay) => {}
                Some(DeclDecision::Rename { new_name }) => fields.push(Field {
                    name: new_name.clone(),
                    ty,
                    visibility: Visibility::Private,
                    flags: field.flags | MemberFlags::SYNTHETIC,
                }),
                Some(DeclDecision::Expose { visibility }) => fields.push(Field {
                    name: field.name.clone(),
                    ty,
                    visibility: *visibility,
                    flags: field.flags,
                }),
                _ => {
                    return Err(EmitError::PlanMismatch {
                        unit: unit.name.clone(),
                        key,
                    })
                }
            }
        }

        for method in &unit.methods {
            if method.is_clinit() {
                if let Some(body) = &method.body {
                    let clinit_cx = RewriteCx {
                        plan,
                        unit: &unit.name,
                        position,
                        in_enum_clinit: is_enum,
                    };
                    let rewritten = rewrite_body(&clinit_cx, body)?;
                    if is_enum {
                        let (residual, constants) =
                            scan_fragment(&unit.name, &plan.base, rewritten)?;
                        enum_table.add_fragment(&unit.name, constants);
                        clinit_fragments.push(residual);
                    } else {
                        clinit_fragments.push(rewritten);
                    }
                }
                continue;
            }
            if is_enum && is_enum_accessor(method) {
                continue; // regenerated wholesale
            }

            let shape: ParamShape = method
                .shape
                .iter()
                .map(|ty| remap_type(ty, plan.chain_set(), &plan.base))
                .collect();
            let key = MemberKey::method(method.name.clone(), shape.clone());
            let ret = remap_type(&method.ret, plan.chain_set(), &plan.base);
            let decision = plan
                .decision(&unit.name, &key)
                .ok_or_else(|| EmitError::PlanMismatch {
                    unit: unit.name.clone(),
                    key: key.clone(),
                })?
                .clone();

            let body = method
                .body
                .as_ref()
                .map(|b| rewrite_body(&cx, b))
                .transpose()?;

            match decision {
                DeclDecision::Expose { visibility } => methods.push(Method {
                    name: method.name.clone(),
                    shape,
                    ret,
                    visibility,
                    flags: method.flags,
                    hooks: Vec::new(),
                    body,
                }),
                DeclDecision::Rename { new_name } => methods.push(Method {
                    name: new_name,
                    shape,
                    ret,
                    visibility: Visibility::Private,
                    flags: method.flags | MemberFlags::SYNTHETIC,
                    hooks: Vec::new(),
                    body,
                }),
                DeclDecision::Retain => {
                    let body =
                        body.map(|b| inline_hooks(plan, &unit.name, &method.hooks, &shape, b));
                    methods.push(Method {
                        name: method.name.clone(),
                        shape,
                        ret,
                        visibility: method.visibility,
                        flags: method.flags,
                        hooks: Vec::new(),
                        body,
                    });
                }
                DeclDecision::Discriminate { .. } => {
                    let mut shape = shape;
                    let mut body =
                        body.map(|b| inline_hooks(plan, &unit.name, &method.hooks, &shape, b));
                    if let Some(b) = &mut body {
                        append_discriminator(&mut shape, b);
                    } else {
                        shape.push(TypeDesc::Long);
                    }
                    methods.push(Method {
                        name: method.name.clone(),
                        shape,
                        ret,
                        visibility: Visibility::Private,
                        flags: method.flags | MemberFlags::SYNTHETIC,
                        hooks: Vec::new(),
                        body,
                    });
                }
                DeclDecision::DropOverlay => {
                    return Err(EmitError::PlanMismatch {
                        unit: unit.name.clone(),
                        key,
                    })
                }
            }
        }

        for record in &unit.nested {
            let entry = NestedRef {
                inner: record.inner.clone(),
                outer: if plan.is_chain_unit(&record.outer) {
                    plan.base.clone()
                } else {
                    record.outer.clone()
                },
                simple_name: record.simple_name.clone(),
                flags: record.flags,
            };
            match nested.iter().find(|n| n.inner == entry.inner) {
                None => nested.push(entry),
                Some(existing) if *existing == entry => {}
                Some(_) => {
                    return Err(EmitError::NestedConflict {
                        inner: entry.inner,
                    })
                }
            }
        }
    }

    if is_enum {
        let (head, head_stack) = enum_table.build_head(&plan.base);
        fields.push(enum_table.values_field(&plan.base));
        methods.push(enum_table.values_method(&plan.base));
        methods.push(enum_table.by_name_method(&plan.base));
        methods.push(clinit_method(merge_fragments(
            head,
            head_stack,
            &clinit_fragments,
        )));
        tracing::debug!(constants = enum_table.records().len(), "constant table rebuilt");
    } else if !clinit_fragments.is_empty() {
        methods.push(clinit_method(merge_fragments(
            Vec::new(),
            0,
            &clinit_fragments,
        )));
    }

    Ok(CompiledUnit {
        name: plan.base.clone(),
        flags: base_unit.flags,
        supertype: base_unit.supertype.clone(),
        interfaces: merged_interfaces(plan, units),
        tags: base_unit.tags.clone(),
        augments: None,
        fields,
        methods,
        nested,
    })
}

/// Rewrite a nested unit so its references resolve against the merged unit.
/// Nested units are not merged; they pass through with chain member names
/// substituted and the full chain visible.
pub fn rewrite_nested(plan: &ChainPlan, unit: &CompiledUnit) -> Result<CompiledUnit, EmitError> {
    let cx = RewriteCx {
        plan,
        unit: &unit.name,
        position: plan.order.len(),
        in_enum_clinit: false,
    };
    let remap_name = |name: &str| {
        if plan.is_chain_unit(name) {
            plan.base.clone()
        } else {
            name.to_string()
        }
    };

    let mut out = unit.clone();
    out.supertype = out.supertype.take().map(|s| remap_name(&s));
    out.interfaces = out.interfaces.iter().map(|i| remap_name(i)).collect();
    for field in &mut out.fields {
        field.ty = remap_type(&field.ty, plan.chain_set(), &plan.base);
    }
    for method in &mut out.methods {
        method.shape = method
            .shape
            .iter()
            .map(|ty| remap_type(ty, plan.chain_set(), &plan.base))
            .collect();
        method.ret = remap_type(&method.ret, plan.chain_set(), &plan.base);
        if let Some(body) = method.body.take() {
            method.body = Some(rewrite_body(&cx, &body)?);
        }
    }
    for record in &mut out.nested {
        record.outer = remap_name(&record.outer);
    }
    Ok(out)
}

fn is_enum_accessor(method: &Method) -> bool {
    (method.name == VALUES_METHOD && method.shape.is_empty())
        || (method.name == BY_NAME_METHOD && method.shape.as_slice() == [TypeDesc::Str])
}

fn clinit_method(body: graft_ir::CodeBody) -> Method {
    Method::new(CLINIT_NAME, ParamShape::new(), TypeDesc::Void)
        .with_visibility(Visibility::Internal)
        .with_flags(MemberFlags::STATIC | MemberFlags::SYNTHETIC)
        .with_body(body)
}

/// Interfaces of the merged unit: the union across chain members in chain
/// order, chain member names excluded.
fn merged_interfaces(plan: &ChainPlan, units: &[CompiledUnit]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut interfaces = Vec::new();
    for unit in units {
        for iface in &unit.interfaces {
            if plan.is_chain_unit(iface) {
                continue;
            }
            if seen.insert(iface.clone()) {
                interfaces.push(iface.clone());
            }
        }
    }
    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_index::MemoryUnitIndex;
    use graft_ir::{
        CallKind, CallRef, CodeBody, Const, Instruction, MemberRef, UnitBuilder, UnitFlags,
        CTOR_NAME,
    };
    use graft_resolve::resolve;
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;

    fn plan_for(units: &[&CompiledUnit]) -> ChainPlan {
        let mut index = MemoryUnitIndex::new();
        for unit in units {
            index.add_unit(unit).unwrap();
        }
        let order: Vec<String> = units.iter().map(|u| u.name.clone()).collect();
        resolve(&order, &index).unwrap()
    }

    fn find_method<'a>(unit: &'a CompiledUnit, name: &str) -> &'a Method {
        unit.methods
            .iter()
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("method `{name}` missing from merged unit"))
    }

    /// Base declares `f()` returning 1; the augmentation overrides it with a
    /// body that consults its predecessor.
    fn override_chain() -> (CompiledUnit, CompiledUnit) {
        let base = UnitBuilder::new("ex.Widget")
            .method(
                Method::new("f", ParamShape::new(), TypeDesc::Int).with_body(CodeBody::new(
                    1,
                    1,
                    vec![Instruction::ConstSmall(1), Instruction::ReturnValue],
                )),
            )
            .build();
        let aug = UnitBuilder::new("ex.Boost")
            .augments("ex.Widget")
            .method(
                Method::new("f", ParamShape::new(), TypeDesc::Int).with_body(CodeBody::new(
                    2,
                    1,
                    vec![
                        Instruction::LoadLocal(0),
                        Instruction::Call {
                            kind: CallKind::Special,
                            target: CallRef::new(
                                "ex.Widget",
                                "f",
                                ParamShape::new(),
                                TypeDesc::Int,
                            ),
                        },
                        Instruction::Pop,
                        Instruction::ConstSmall(2),
                        Instruction::ReturnValue,
                    ],
                )),
            )
            .build();
        (base, aug)
    }

    #[test]
    fn test_override_emits_shadow_and_redirected_predecessor_call() {
        let (base, aug) = override_chain();
        let plan = plan_for(&[&base, &aug]);
        let merged = merge_chain(&plan, &[base, aug]).unwrap();

        assert_eq!(merged.name, "ex.Widget");

        // The shadowed base declaration survives under its mangled name.
        let shadow = find_method(&merged, "f#ex.Widget");
        assert_eq!(shadow.visibility, Visibility::Private);
        assert!(shadow.flags.contains(MemberFlags::SYNTHETIC));
        assert_eq!(
            shadow.body.as_ref().unwrap().code[0],
            Instruction::ConstSmall(1)
        );

        // The exposed `f` is the augmentation's, with its super-style call
        // statically redirected to the shadow.
        let exposed = find_method(&merged, "f");
        let body = exposed.body.as_ref().unwrap();
        assert_eq!(body.code[0], Instruction::LoadLocal(0));
        let Instruction::Call { kind, target } = &body.code[1] else {
            panic!("expected redirected call, got {:?}", body.code[1]);
        };
        assert_eq!(*kind, CallKind::Special);
        assert_eq!(target.owner, "ex.Widget");
        assert_eq!(target.name, "f#ex.Widget");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (base, aug) = override_chain();
        let plan = plan_for(&[&base, &aug]);
        let first = merge_chain(&plan, &[base.clone(), aug.clone()]).unwrap();
        let second = merge_chain(&plan, &[base, aug]).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            graft_ir::to_bytes(&first).unwrap(),
            graft_ir::to_bytes(&second).unwrap()
        );
    }

    #[test]
    fn test_same_shape_ctors_coexist_with_discriminators() {
        let ctor_body = |field_value: i8| {
            CodeBody::new(
                2,
                2,
                vec![
                    Instruction::LoadLocal(0),
                    Instruction::LoadLocal(1),
                    Instruction::Call {
                        kind: CallKind::Special,
                        target: CallRef::new(
                            "ex.Widget",
                            CTOR_NAME,
                            smallvec![TypeDesc::Int],
                            TypeDesc::Void,
                        ),
                    },
                    Instruction::ConstSmall(field_value),
                    Instruction::Pop,
                    Instruction::Return,
                ],
            )
        };
        let base = UnitBuilder::new("ex.Widget")
            .method(
                Method::new(CTOR_NAME, smallvec![TypeDesc::Int], TypeDesc::Void)
                    .with_body(CodeBody::new(1, 2, vec![Instruction::Return])),
            )
            .build();
        let a1 = UnitBuilder::new("ex.A1")
            .method(
                Method::new(CTOR_NAME, smallvec![TypeDesc::Int], TypeDesc::Void)
                    .with_body(ctor_body(1)),
            )
            .build();
        let a2 = UnitBuilder::new("ex.A2")
            .method(
                Method::new(CTOR_NAME, smallvec![TypeDesc::Int], TypeDesc::Void)
                    .with_body(ctor_body(2)),
            )
            .build();

        let plan = plan_for(&[&base, &a1, &a2]);
        let merged = merge_chain(&plan, &[base, a1, a2]).unwrap();

        let ctors: Vec<&Method> = merged.methods.iter().filter(|m| m.is_ctor()).collect();
        assert_eq!(ctors.len(), 3);

        // Base and A1 are superseded: discriminated, private, one extra
        // trailing long. A2 keeps the declared signature.
        let discriminated: Vec<&&Method> =
            ctors.iter().filter(|c| c.shape.len() == 2).collect();
        assert_eq!(discriminated.len(), 2);
        for ctor in &discriminated {
            assert_eq!(ctor.shape[1], TypeDesc::Long);
            assert_eq!(ctor.visibility, Visibility::Private);
        }
        let public = ctors.iter().find(|c| c.shape.len() == 1).unwrap();
        assert_eq!(public.visibility, Visibility::Public);

        // A2's delegation pushes A1's discriminator before the call.
        let body = public.body.as_ref().unwrap();
        let call_idx = body
            .code
            .iter()
            .position(|i| matches!(i, Instruction::Call { .. }))
            .unwrap();
        assert_eq!(
            body.code[call_idx - 1],
            Instruction::LoadConst(Const::Long(1))
        );
        let Instruction::Call { target, .. } = &body.code[call_idx] else {
            unreachable!();
        };
        assert_eq!(target.shape.len(), 2);
    }

    #[test]
    fn test_pre_init_hooks_run_before_delegation() {
        let base = UnitBuilder::new("ex.Widget")
            .method(
                Method::new(CTOR_NAME, smallvec![TypeDesc::Int], TypeDesc::Void)
                    .with_body(CodeBody::new(1, 2, vec![Instruction::Return])),
            )
            .build();
        let aug = UnitBuilder::new("ex.Audit")
            .method(
                Method::new(CTOR_NAME, smallvec![TypeDesc::Int], TypeDesc::Void)
                    .with_hook(graft_ir::HookRef::scoped("ex.Validators", "check_size"))
                    .with_body(CodeBody::new(
                        2,
                        2,
                        vec![
                            Instruction::LoadLocal(0),
                            Instruction::LoadLocal(1),
                            Instruction::Call {
                                kind: CallKind::Special,
                                target: CallRef::new(
                                    "ex.Widget",
                                    CTOR_NAME,
                                    smallvec![TypeDesc::Int],
                                    TypeDesc::Void,
                                ),
                            },
                            Instruction::Return,
                        ],
                    )),
            )
            .build();

        let plan = plan_for(&[&base, &aug]);
        let merged = merge_chain(&plan, &[base, aug]).unwrap();

        let public = merged
            .methods
            .iter()
            .find(|m| m.is_ctor() && m.shape.len() == 1)
            .unwrap();
        assert!(public.hooks.is_empty(), "hook metadata must not survive");
        let body = public.body.as_ref().unwrap();
        // Hook first: load the ctor argument, call out statically.
        assert_eq!(body.code[0], Instruction::LoadLocal(1));
        let Instruction::Call { kind, target } = &body.code[1] else {
            panic!("expected hook call");
        };
        assert_eq!(*kind, CallKind::Static);
        assert_eq!(target.owner, "ex.Validators");
        assert_eq!(target.name, "check_size");
        // Delegation to the base's discriminated ctor comes after.
        let Instruction::Call { target, .. } = &body.code[5] else {
            panic!("expected delegation call, got {:?}", body.code[5]);
        };
        assert_eq!(target.name, CTOR_NAME);
        assert_eq!(target.shape.len(), 2);
    }

    /// One stylized constant construction, as a standalone enum compiler
    /// would have emitted it inside `unit`.
    fn enum_constant(unit: &str, constant: &str, ordinal: i8) -> Vec<Instruction> {
        vec![
            Instruction::New(unit.to_string()),
            Instruction::Dup,
            Instruction::LoadConst(Const::Str(constant.to_string())),
            Instruction::ConstSmall(ordinal),
            Instruction::Call {
                kind: CallKind::Special,
                target: CallRef::new(
                    unit,
                    CTOR_NAME,
                    smallvec![TypeDesc::Str, TypeDesc::Int],
                    TypeDesc::Void,
                ),
            },
            Instruction::PutStatic(MemberRef::new(unit, constant)),
        ]
    }

    fn enum_unit(name: &str, constants: &[(&str, i8)], with_ctor: bool) -> CompiledUnit {
        let mut code = Vec::new();
        for (constant, ordinal) in constants {
            code.extend(enum_constant(name, constant, *ordinal));
        }
        // The unit's own `$values` build.
        code.push(Instruction::ConstSmall(constants.len() as i8));
        code.push(Instruction::NewArray(TypeDesc::Object(name.to_string())));
        for (i, (constant, _)) in constants.iter().enumerate() {
            code.push(Instruction::Dup);
            code.push(Instruction::ConstSmall(i as i8));
            code.push(Instruction::GetStatic(MemberRef::new(name, *constant)));
            code.push(Instruction::ArrayStore);
        }
        code.push(Instruction::PutStatic(MemberRef::new(name, VALUES_FIELD)));
        code.push(Instruction::Return);

        let mut builder = UnitBuilder::new(name).flags(UnitFlags::ENUM);
        for (constant, _) in constants {
            builder = builder.field_decl(
                Field::new(
                    *constant,
                    TypeDesc::Object(name.to_string()),
                    Visibility::Public,
                )
                .with_flags(MemberFlags::STATIC | MemberFlags::FINAL | MemberFlags::ENUM_CONST),
            );
        }
        builder = builder.field_decl(
            Field::new(
                VALUES_FIELD,
                TypeDesc::Array(Box::new(TypeDesc::Object(name.to_string()))),
                Visibility::Private,
            )
            .with_flags(MemberFlags::STATIC | MemberFlags::FINAL),
        );
        if with_ctor {
            builder = builder.method(
                Method::new(
                    CTOR_NAME,
                    smallvec![TypeDesc::Str, TypeDesc::Int],
                    TypeDesc::Void,
                )
                .with_visibility(Visibility::Private)
                .with_body(CodeBody::new(1, 3, vec![Instruction::Return])),
            );
        }
        builder
            .method(
                Method::new(CLINIT_NAME, ParamShape::new(), TypeDesc::Void)
                    .with_flags(MemberFlags::STATIC)
                    .with_body(CodeBody::new(5, 0, code)),
            )
            .build()
    }

    #[test]
    fn test_enum_extension_merges_constants_in_first_declaration_order() {
        let base = enum_unit("ex.Color", &[("RED", 0), ("BLUE", 1)], true);
        let aug = enum_unit("ex.Palette", &[("GREEN", 0)], false);

        let plan = plan_for(&[&base, &aug]);
        assert!(plan.base_is_enum);
        let merged = merge_chain(&plan, &[base, aug]).unwrap();

        // Constant fields: RED and BLUE from the base, GREEN added, plus the
        // regenerated `$values` table.
        let constant_names: Vec<&str> = merged
            .fields
            .iter()
            .filter(|f| f.flags.contains(MemberFlags::ENUM_CONST))
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(constant_names, vec!["RED", "BLUE", "GREEN"]);
        // Exactly one `$values` survives: the regenerated table, not the
        // per-unit declarations.
        let tables = merged
            .fields
            .iter()
            .filter(|f| f.name == VALUES_FIELD)
            .count();
        assert_eq!(tables, 1);

        // Accessors regenerated.
        assert!(merged.methods.iter().any(|m| m.name == VALUES_METHOD));
        assert!(merged.methods.iter().any(|m| m.name == BY_NAME_METHOD));

        // The merged initializer constructs RED=0, BLUE=1, GREEN=2.
        let clinit = find_method(&merged, CLINIT_NAME);
        let code = &clinit.body.as_ref().unwrap().code;
        let ordinals: Vec<(String, i32)> = code
            .windows(2)
            .filter_map(|w| match (&w[0], &w[1]) {
                (
                    Instruction::LoadConst(Const::Str(name)),
                    Instruction::ConstSmall(ordinal),
                ) => Some((name.clone(), i32::from(*ordinal))),
                _ => None,
            })
            .collect();
        assert_eq!(
            ordinals,
            vec![
                ("RED".to_string(), 0),
                ("BLUE".to_string(), 1),
                ("GREEN".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_nested_records_deduplicate() {
        let nested_ref = || NestedRef {
            inner: "ex.Widget.Part".to_string(),
            outer: "ex.Widget".to_string(),
            simple_name: "Part".to_string(),
            flags: UnitFlags::empty(),
        };
        let base = UnitBuilder::new("ex.Widget").nested(nested_ref()).build();
        let mut aug_nested = nested_ref();
        aug_nested.outer = "ex.Boost".to_string(); // remaps to the base
        let aug = UnitBuilder::new("ex.Boost").nested(aug_nested).build();

        let plan = plan_for(&[&base, &aug]);
        let merged = merge_chain(&plan, &[base, aug]).unwrap();
        assert_eq!(merged.nested.len(), 1);
        assert_eq!(merged.nested[0].outer, "ex.Widget");
    }

    #[test]
    fn test_inconsistent_nested_records_are_an_error() {
        let base = UnitBuilder::new("ex.Widget")
            .nested(NestedRef {
                inner: "ex.Widget.Part".to_string(),
                outer: "ex.Widget".to_string(),
                simple_name: "Part".to_string(),
                flags: UnitFlags::empty(),
            })
            .build();
        let aug = UnitBuilder::new("ex.Boost")
            .nested(NestedRef {
                inner: "ex.Widget.Part".to_string(),
                outer: "ex.Boost".to_string(),
                simple_name: "Piece".to_string(), // inconsistent
                flags: UnitFlags::empty(),
            })
            .build();

        let plan = plan_for(&[&base, &aug]);
        let err = merge_chain(&plan, &[base, aug]).unwrap_err();
        assert!(matches!(err, EmitError::NestedConflict { .. }));
    }
}
