//! Shared fixtures for the chain-compile integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use graft_index::MemoryUnitIndex;
use graft_ir::{
    from_bytes, CallKind, CallRef, CodeBody, CompiledUnit, Const, Field, Instruction, MemberFlags,
    MemberRef, Method, ParamShape, TypeDesc, UnitBuilder, UnitFlags, Visibility, CLINIT_NAME,
    CTOR_NAME, VALUES_FIELD,
};
use graftc::{ChainRegistry, ComposeOutput, MemoryUnitSource};
use smallvec::smallvec;

/// Index and source every unit, then build a registry over them.
pub fn registry_for(units: &[&CompiledUnit]) -> ChainRegistry {
    let mut index = MemoryUnitIndex::new();
    let mut source = MemoryUnitSource::new();
    for unit in units {
        index.add_unit(unit).expect("fixture units are unique");
        source.insert_unit(unit).expect("fixture units encode");
    }
    ChainRegistry::new(Arc::new(index), Arc::new(source))
}

/// Register every unit's declared `augments` edge, in the given order.
pub fn register_augmentations(registry: &ChainRegistry, units: &[&CompiledUnit]) {
    for unit in units {
        if let Some(target) = &unit.augments {
            registry
                .augment(target, &unit.name)
                .expect("fixture chains register");
        }
    }
}

pub fn decode(output: &ComposeOutput, name: &str) -> CompiledUnit {
    let bytes = output
        .get(name)
        .unwrap_or_else(|| panic!("output covers `{name}`"));
    from_bytes(bytes).expect("merged output decodes")
}

pub fn find_method<'a>(unit: &'a CompiledUnit, name: &str) -> &'a Method {
    unit.methods
        .iter()
        .find(|m| m.name == name)
        .unwrap_or_else(|| panic!("method `{name}` present in `{}`", unit.name))
}

/// A niladic `int` method returning a constant.
pub fn ret_int(name: &str, visibility: Visibility, value: i8) -> Method {
    Method::new(name, ParamShape::new(), TypeDesc::Int)
        .with_visibility(visibility)
        .with_body(CodeBody::new(
            1,
            1,
            vec![Instruction::ConstSmall(value), Instruction::ReturnValue],
        ))
}

/// A niladic `int` method that calls its conceptual predecessor's `name`
/// on `owner`, discards the result, and returns `value`.
pub fn ret_int_calling_predecessor(
    name: &str,
    owner: &str,
    value: i8,
) -> Method {
    Method::new(name, ParamShape::new(), TypeDesc::Int).with_body(CodeBody::new(
        2,
        1,
        vec![
            Instruction::LoadLocal(0),
            Instruction::Call {
                kind: CallKind::Special,
                target: CallRef::new(owner, name, ParamShape::new(), TypeDesc::Int),
            },
            Instruction::Pop,
            Instruction::ConstSmall(value),
            Instruction::ReturnValue,
        ],
    ))
}

/// A one-`int`-argument constructor that delegates to `owner`'s
/// same-shape constructor.
pub fn ctor_delegating_to(owner: &str) -> Method {
    Method::new(CTOR_NAME, smallvec![TypeDesc::Int], TypeDesc::Void).with_body(CodeBody::new(
        2,
        2,
        vec![
            Instruction::LoadLocal(0),
            Instruction::LoadLocal(1),
            Instruction::Call {
                kind: CallKind::Special,
                target: CallRef::new(owner, CTOR_NAME, smallvec![TypeDesc::Int], TypeDesc::Void),
            },
            Instruction::Return,
        ],
    ))
}

/// One stylized constant construction, as a standalone enum compiler emits
/// it inside `unit`.
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

/// An enumerated unit with the given constants, its own `$values` table
/// build, and (optionally) its own `(str, int)` constructor.
pub fn enum_unit(name: &str, constants: &[(&str, i8)], with_ctor: bool) -> CompiledUnit {
    let mut code = Vec::new();
    for (constant, ordinal) in constants {
        code.extend(enum_constant(name, constant, *ordinal));
    }
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
