//! The chain walk: member registration and rename decisions.
//!
//! Two conceptual walks over the chain (implemented as one pass that fixes
//! up superseded declarations as it goes):
//!
//! 1. Ownership: each non-private declaration replaces the owner of its key.
//!    Private declarations, constructors, and the static initializer never
//!    take ownership.
//! 2. Rename decision: a physical declaration keeps its name iff it is the
//!    final owner of its key; everything else moves to a mangled shadow
//!    identity. Constructors and `<clinit>` are exempt (handled by the
//!    discriminator table and the initializer merger respectively).

use rustc_hash::{FxHashMap, FxHashSet};

use graft_index::{FieldDecl, MethodDecl, UnitIndex};
use graft_ir::{
    MemberFlags, MemberKey, ParamShape, TypeDesc, Visibility, CLINIT_NAME, CTOR_NAME,
};

use crate::error::{InvariantViolation, ResolveError};
use crate::plan::{ChainPlan, CtorSite, DeclDecision, DeclSite, MemberRecord};
use crate::rename::{mangle, remap_type};

/// State tracked per field slot beyond what [`MemberRecord`] carries.
struct FieldSlot {
    unit: String,
    visibility: Visibility,
    /// Chain-remapped declared type.
    ty: TypeDesc,
    enum_const: bool,
    is_static: bool,
}

/// Run the analysis pass over a chain.
///
/// `order` is the full chain: base first, then each augmentation in chain
/// order. The pass consults only the Unit Index; it never reads unit bytes.
#[tracing::instrument(level = "debug", skip(index), fields(base = order.first().map(String::as_str).unwrap_or("")))]
pub fn resolve(order: &[String], index: &dyn UnitIndex) -> Result<ChainPlan, ResolveError> {
    assert!(!order.is_empty(), "a chain always contains its base");

    let base = &order[0];
    let base_facts = index
        .unit_facts(base)
        .ok_or_else(|| ResolveError::UnknownUnit { name: base.clone() })?;
    let mut plan = ChainPlan::new(order.to_vec(), base_facts.is_enum());
    let mut field_slots: FxHashMap<String, FieldSlot> = FxHashMap::default();

    for (position, unit) in order.iter().enumerate() {
        let facts = index
            .unit_facts(unit)
            .ok_or_else(|| ResolveError::UnknownUnit { name: unit.clone() })?;

        let mut seen: FxHashSet<MemberKey> = FxHashSet::default();

        for field in &facts.fields {
            let key = MemberKey::field(field.name.clone());
            if !seen.insert(key.clone()) {
                return Err(InvariantViolation::DuplicateMember {
                    unit: unit.clone(),
                    key,
                }
                .into());
            }
            register_field(&mut plan, &mut field_slots, unit, field)?;
        }

        for method in &facts.methods {
            let shape = remap_shape(&method.shape, &plan);
            let key = MemberKey::method(method.name.clone(), shape.clone());
            if !seen.insert(key.clone()) {
                return Err(InvariantViolation::DuplicateMember {
                    unit: unit.clone(),
                    key,
                }
                .into());
            }
            if method.name == CLINIT_NAME {
                continue; // merged by the emitter, never renamed
            }
            if method.name == CTOR_NAME {
                register_ctor(&mut plan, position, unit, shape);
                continue;
            }
            register_method(&mut plan, position, unit, method, key)?;
        }
    }

    check_discriminator_collisions(&plan)?;

    for (name, slot) in field_slots {
        let key = MemberKey::field(name);
        plan.records.insert(
            key.clone(),
            MemberRecord {
                key,
                owner: slot.unit,
                visibility: slot.visibility,
                is_static: slot.is_static,
            },
        );
    }

    tracing::debug!(
        members = plan.records.len(),
        decisions = plan.decisions.len(),
        "chain plan complete"
    );
    Ok(plan)
}

fn remap_shape(shape: &ParamShape, plan: &ChainPlan) -> ParamShape {
    shape
        .iter()
        .map(|ty| remap_type(ty, plan.chain_set(), &plan.base))
        .collect()
}

fn register_field(
    plan: &mut ChainPlan,
    slots: &mut FxHashMap<String, FieldSlot>,
    unit: &str,
    field: &FieldDecl,
) -> Result<(), ResolveError> {
    let key = MemberKey::field(field.name.clone());
    let ty = remap_type(&field.ty, plan.chain_set(), &plan.base);
    let enum_const = field.flags.contains(MemberFlags::ENUM_CONST);

    if let Some(slot) = slots.get_mut(&field.name) {
        // Redeclaration of an established slot. Either a purely declarative
        // overlay (identical type, exposure not narrowed) or a contract
        // violation.
        if ty != slot.ty {
            return Err(InvariantViolation::FieldTypeMismatch {
                name: field.name.clone(),
                prior_unit: slot.unit.clone(),
                prior_ty: slot.ty.clone(),
                unit: unit.to_string(),
                declared_ty: ty,
            }
            .into());
        }
        if field.visibility < slot.visibility && !(enum_const && slot.enum_const) {
            return Err(InvariantViolation::VisibilityNarrowed {
                key,
                prior_unit: slot.unit.clone(),
                prior: slot.visibility,
                unit: unit.to_string(),
                declared: field.visibility,
            }
            .into());
        }
        tracing::trace!(unit, field = %field.name, "overlay field dropped");
        if field.visibility > slot.visibility {
            // The overlay widens exposure of the existing declaration.
            slot.visibility = field.visibility;
            plan.decisions.insert(
                (slot.unit.clone(), key.clone()),
                DeclDecision::Expose {
                    visibility: field.visibility,
                },
            );
        }
        plan.decisions
            .insert((unit.to_string(), key), DeclDecision::DropOverlay);
        return Ok(());
    }

    if field.visibility.is_private() {
        plan.decisions.insert(
            (unit.to_string(), key),
            DeclDecision::Rename {
                new_name: mangle(&field.name, unit),
            },
        );
        return Ok(());
    }

    plan.decisions.insert(
        (unit.to_string(), key),
        DeclDecision::Expose {
            visibility: field.visibility,
        },
    );
    slots.insert(
        field.name.clone(),
        FieldSlot {
            unit: unit.to_string(),
            visibility: field.visibility,
            ty,
            enum_const,
            is_static: field.is_static(),
        },
    );
    Ok(())
}

fn register_method(
    plan: &mut ChainPlan,
    position: usize,
    unit: &str,
    method: &MethodDecl,
    key: MemberKey,
) -> Result<(), ResolveError> {
    if method.visibility.is_private() {
        plan.decisions.insert(
            (unit.to_string(), key),
            DeclDecision::Rename {
                new_name: mangle(&method.name, unit),
            },
        );
        return Ok(());
    }

    if let Some(record) = plan.records.get_mut(&key) {
        if method.visibility < record.visibility {
            return Err(InvariantViolation::VisibilityNarrowed {
                key: key.clone(),
                prior_unit: record.owner.clone(),
                prior: record.visibility,
                unit: unit.to_string(),
                declared: method.visibility,
            }
            .into());
        }

        // This unit now owns the key; the previous owner's declaration
        // moves to its shadow identity. The merged visibility stays at the
        // earliest exposure, never widened beyond it.
        let prior_unit = std::mem::replace(&mut record.owner, unit.to_string());
        record.is_static = method.is_static();
        let shadow = mangle(&method.name, &prior_unit);
        tracing::trace!(unit, key = %key, prior = %prior_unit, "slot superseded");
        plan.decisions.insert(
            (prior_unit.clone(), key.clone()),
            DeclDecision::Rename {
                new_name: shadow.clone(),
            },
        );
        let merged_visibility = record.visibility;
        if let Some(timeline) = plan.timelines.get_mut(&key) {
            if let Some(site) = timeline.iter_mut().rev().find(|s| s.unit == prior_unit) {
                site.emitted_name = shadow;
            }
        }
        plan.decisions.insert(
            (unit.to_string(), key.clone()),
            DeclDecision::Expose {
                visibility: merged_visibility,
            },
        );
        plan.timelines.entry(key).or_default().push(DeclSite {
            position,
            unit: unit.to_string(),
            emitted_name: method.name.clone(),
            visibility: merged_visibility,
            is_static: method.is_static(),
        });
        return Ok(());
    }

    plan.records.insert(
        key.clone(),
        MemberRecord {
            key: key.clone(),
            owner: unit.to_string(),
            visibility: method.visibility,
            is_static: method.is_static(),
        },
    );
    plan.decisions.insert(
        (unit.to_string(), key.clone()),
        DeclDecision::Expose {
            visibility: method.visibility,
        },
    );
    plan.timelines.entry(key).or_default().push(DeclSite {
        position,
        unit: unit.to_string(),
        emitted_name: method.name.clone(),
        visibility: method.visibility,
        is_static: method.is_static(),
    });
    Ok(())
}

fn register_ctor(plan: &mut ChainPlan, position: usize, unit: &str, shape: ParamShape) {
    let key = MemberKey::method(CTOR_NAME, shape.clone());
    let sites = plan.ctors.entry(shape).or_default();
    if let Some(last) = sites.last_mut() {
        // The newcomer takes the declared signature; the superseded
        // physical constructor is disambiguated by its chain position.
        let value = u32::try_from(last.position).unwrap_or(u32::MAX);
        last.discriminator = Some(value);
        plan.decisions.insert(
            (last.unit.clone(), key.clone()),
            DeclDecision::Discriminate { value },
        );
    }
    sites.push(CtorSite {
        position,
        unit: unit.to_string(),
        discriminator: None,
    });
    plan.decisions
        .insert((unit.to_string(), key), DeclDecision::Retain);
}

/// A declared constructor whose shape equals another shape plus the
/// synthetic trailing discriminator would be indistinguishable from the
/// synthesized signature.
fn check_discriminator_collisions(plan: &ChainPlan) -> Result<(), ResolveError> {
    for (shape, sites) in &plan.ctors {
        if sites.iter().all(|s| s.discriminator.is_none()) {
            continue;
        }
        let mut collider = shape.clone();
        collider.push(TypeDesc::Long);
        if let Some(real) = plan.ctors.get(&collider) {
            if let Some(site) = real.first() {
                return Err(InvariantViolation::DiscriminatorCollision {
                    unit: site.unit.clone(),
                    key: MemberKey::method(CTOR_NAME, collider),
                }
                .into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_index::MemoryUnitIndex;
    use graft_ir::{CodeBody, Instruction, Method, UnitBuilder};
    use pretty_assertions::assert_eq;

    fn ret_int(value: i8) -> CodeBody {
        CodeBody::new(
            1,
            1,
            vec![Instruction::ConstSmall(value), Instruction::ReturnValue],
        )
    }

    fn method(name: &str, vis: Visibility, body: CodeBody) -> Method {
        Method::new(name, ParamShape::new(), TypeDesc::Int)
            .with_visibility(vis)
            .with_body(body)
    }

    fn chain(units: &[&str]) -> Vec<String> {
        units.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_override_law_last_owner_wins() {
        let mut index = MemoryUnitIndex::new();
        index
            .add_unit(
                &UnitBuilder::new("ex.Base")
                    .method(method("f", Visibility::Public, ret_int(1)))
                    .build(),
            )
            .unwrap();
        index
            .add_unit(
                &UnitBuilder::new("ex.A1")
                    .augments("ex.Base")
                    .method(method("f", Visibility::Public, ret_int(2)))
                    .build(),
            )
            .unwrap();

        let plan = resolve(&chain(&["ex.Base", "ex.A1"]), &index).unwrap();
        let key = MemberKey::method("f", ParamShape::new());
        assert_eq!(plan.records[&key].owner, "ex.A1");
        assert_eq!(
            plan.decision("ex.Base", &key),
            Some(&DeclDecision::Rename {
                new_name: "f#ex.Base".to_string()
            })
        );
        assert_eq!(
            plan.decision("ex.A1", &key),
            Some(&DeclDecision::Expose {
                visibility: Visibility::Public
            })
        );

        // The predecessor of position 1 is the base's shadowed declaration.
        let pred = plan.predecessor(&key, 1).unwrap();
        assert_eq!(pred.unit, "ex.Base");
        assert_eq!(pred.emitted_name, "f#ex.Base");
    }

    #[test]
    fn test_private_members_never_own_a_slot() {
        let mut index = MemoryUnitIndex::new();
        index
            .add_unit(
                &UnitBuilder::new("ex.Base")
                    .method(method("f", Visibility::Public, ret_int(1)))
                    .build(),
            )
            .unwrap();
        index
            .add_unit(
                &UnitBuilder::new("ex.A1")
                    .method(method("f", Visibility::Private, ret_int(2)))
                    .build(),
            )
            .unwrap();

        let plan = resolve(&chain(&["ex.Base", "ex.A1"]), &index).unwrap();
        let key = MemberKey::method("f", ParamShape::new());
        assert_eq!(plan.records[&key].owner, "ex.Base");
        assert_eq!(
            plan.decision("ex.A1", &key),
            Some(&DeclDecision::Rename {
                new_name: "f#ex.A1".to_string()
            })
        );
    }

    #[test]
    fn test_merged_visibility_is_never_widened_past_base() {
        let mut index = MemoryUnitIndex::new();
        index
            .add_unit(
                &UnitBuilder::new("ex.Base")
                    .method(method("f", Visibility::Internal, ret_int(1)))
                    .build(),
            )
            .unwrap();
        index
            .add_unit(
                &UnitBuilder::new("ex.A1")
                    .method(method("f", Visibility::Public, ret_int(2)))
                    .build(),
            )
            .unwrap();

        let plan = resolve(&chain(&["ex.Base", "ex.A1"]), &index).unwrap();
        let key = MemberKey::method("f", ParamShape::new());
        assert_eq!(
            plan.decision("ex.A1", &key),
            Some(&DeclDecision::Expose {
                visibility: Visibility::Internal
            })
        );
    }

    #[test]
    fn test_visibility_narrowing_is_an_error() {
        let mut index = MemoryUnitIndex::new();
        index
            .add_unit(
                &UnitBuilder::new("ex.Base")
                    .method(method("f", Visibility::Public, ret_int(1)))
                    .build(),
            )
            .unwrap();
        index
            .add_unit(
                &UnitBuilder::new("ex.A1")
                    .method(method("f", Visibility::Internal, ret_int(2)))
                    .build(),
            )
            .unwrap();

        let err = resolve(&chain(&["ex.Base", "ex.A1"]), &index).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Invariant(InvariantViolation::VisibilityNarrowed { .. })
        ));
    }

    #[test]
    fn test_field_overlay_is_dropped() {
        let mut index = MemoryUnitIndex::new();
        index
            .add_unit(
                &UnitBuilder::new("ex.Base")
                    .field("y", TypeDesc::Int, Visibility::Internal)
                    .build(),
            )
            .unwrap();
        index
            .add_unit(
                &UnitBuilder::new("ex.A1")
                    .field("y", TypeDesc::Int, Visibility::Public)
                    .build(),
            )
            .unwrap();

        let plan = resolve(&chain(&["ex.Base", "ex.A1"]), &index).unwrap();
        let key = MemberKey::field("y");
        assert_eq!(plan.decision("ex.A1", &key), Some(&DeclDecision::DropOverlay));
        // The overlay widened the existing declaration.
        assert_eq!(
            plan.decision("ex.Base", &key),
            Some(&DeclDecision::Expose {
                visibility: Visibility::Public
            })
        );
        assert_eq!(plan.records[&key].visibility, Visibility::Public);
    }

    #[test]
    fn test_field_retyping_is_an_error() {
        let mut index = MemoryUnitIndex::new();
        index
            .add_unit(
                &UnitBuilder::new("ex.Base")
                    .field("x", TypeDesc::Int, Visibility::Internal)
                    .build(),
            )
            .unwrap();
        index
            .add_unit(
                &UnitBuilder::new("ex.A1")
                    .field("x", TypeDesc::Str, Visibility::Private)
                    .build(),
            )
            .unwrap();

        match resolve(&chain(&["ex.Base", "ex.A1"]), &index).unwrap_err() {
            ResolveError::Invariant(InvariantViolation::FieldTypeMismatch {
                name,
                prior_unit,
                unit,
                ..
            }) => {
                assert_eq!(name, "x");
                assert_eq!(prior_unit, "ex.Base");
                assert_eq!(unit, "ex.A1");
            }
            other => panic!("expected field type mismatch, got {other}"),
        }
    }

    #[test]
    fn test_duplicate_member_in_one_unit_is_an_error() {
        let mut index = MemoryUnitIndex::new();
        index
            .add_unit(
                &UnitBuilder::new("ex.Base")
                    .method(method("f", Visibility::Public, ret_int(1)))
                    .method(method("f", Visibility::Public, ret_int(2)))
                    .build(),
            )
            .unwrap();

        let err = resolve(&chain(&["ex.Base"]), &index).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Invariant(InvariantViolation::DuplicateMember { .. })
        ));
    }

    #[test]
    fn test_same_shape_ctors_get_discriminators() {
        let ctor = |unit: &str| {
            UnitBuilder::new(unit)
                .method(
                    Method::new(CTOR_NAME, smallvec::smallvec![TypeDesc::Int], TypeDesc::Void)
                        .with_body(CodeBody::new(1, 2, vec![Instruction::Return])),
                )
                .build()
        };
        let mut index = MemoryUnitIndex::new();
        index.add_unit(&ctor("ex.Base")).unwrap();
        index.add_unit(&ctor("ex.A1")).unwrap();
        index.add_unit(&ctor("ex.A2")).unwrap();

        let plan = resolve(&chain(&["ex.Base", "ex.A1", "ex.A2"]), &index).unwrap();
        let shape: ParamShape = smallvec::smallvec![TypeDesc::Int];
        let sites = &plan.ctors[&shape];
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[0].discriminator, Some(0));
        assert_eq!(sites[1].discriminator, Some(1));
        assert_eq!(sites[2].discriminator, None);

        // Delegation from position 2 resolves to A1's physical constructor.
        let target = plan.ctor_before(&shape, 2).unwrap();
        assert_eq!(target.unit, "ex.A1");
    }

    #[test]
    fn test_discriminator_collision_is_an_error() {
        let mut index = MemoryUnitIndex::new();
        index
            .add_unit(
                &UnitBuilder::new("ex.Base")
                    .method(
                        Method::new(CTOR_NAME, ParamShape::new(), TypeDesc::Void)
                            .with_body(CodeBody::new(0, 1, vec![Instruction::Return])),
                    )
                    .method(
                        Method::new(
                            CTOR_NAME,
                            smallvec::smallvec![TypeDesc::Long],
                            TypeDesc::Void,
                        )
                        .with_body(CodeBody::new(1, 3, vec![Instruction::Return])),
                    )
                    .build(),
            )
            .unwrap();
        index
            .add_unit(
                &UnitBuilder::new("ex.A1")
                    .method(
                        Method::new(CTOR_NAME, ParamShape::new(), TypeDesc::Void)
                            .with_body(CodeBody::new(0, 1, vec![Instruction::Return])),
                    )
                    .build(),
            )
            .unwrap();

        let err = resolve(&chain(&["ex.Base", "ex.A1"]), &index).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Invariant(InvariantViolation::DiscriminatorCollision { .. })
        ));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut index = MemoryUnitIndex::new();
        index
            .add_unit(
                &UnitBuilder::new("ex.Base")
                    .field("y", TypeDesc::Int, Visibility::Internal)
                    .method(method("f", Visibility::Public, ret_int(1)))
                    .method(method("g", Visibility::Public, ret_int(3)))
                    .build(),
            )
            .unwrap();
        index
            .add_unit(
                &UnitBuilder::new("ex.A1")
                    .method(method("f", Visibility::Public, ret_int(2)))
                    .method(method("h", Visibility::Private, ret_int(4)))
                    .build(),
            )
            .unwrap();

        let order = chain(&["ex.Base", "ex.A1"]);
        let first = resolve(&order, &index).unwrap();
        let second = resolve(&order, &index).unwrap();
        assert_eq!(first.decisions, second.decisions);
        assert_eq!(first.timelines, second.timelines);
    }

    #[test]
    fn test_unknown_unit_is_a_lookup_failure() {
        let index = MemoryUnitIndex::new();
        let err = resolve(&chain(&["ex.Missing"]), &index).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownUnit {
                name: "ex.Missing".to_string()
            }
        );
    }
}
