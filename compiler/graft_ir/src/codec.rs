//! Stable GUF serialization for [`CompiledUnit`].
//!
//! Design goals:
//! - Portable, explicit encoding (little-endian, fixed-width integers).
//! - No reliance on Rust-specific layouts or derive-based formats.
//! - Deterministic (canonical) output so `encode -> decode -> encode` is
//!   byte-identical.
//!
//! The format is versioned and validated on decode; a decoder never hands
//! back a structurally malformed unit.

use std::fmt;

use crate::code::{CallKind, CallRef, CodeBody, Const, Instruction, Intrinsic, MemberRef};
use crate::flags::{MemberFlags, UnitFlags, Visibility};
use crate::ty::{ParamShape, TypeDesc};
use crate::unit::{CompiledUnit, Field, HookRef, Method, NestedRef};

const MAGIC: &[u8; 8] = b"GRAFTU0\0";
const VERSION_MAJOR: u16 = 0;
const VERSION_MINOR: u16 = 1;

/// The `(major, minor)` version pair this build reads and writes.
pub const FORMAT_VERSION: (u16, u16) = (VERSION_MAJOR, VERSION_MINOR);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError {
    pub message: String,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encode error: {}", self.message)
    }
}

impl std::error::Error for EncodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub message: String,
    pub offset: usize,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decode error at {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for DecodeError {}

/// Serialize a unit to canonical GUF bytes.
pub fn to_bytes(unit: &CompiledUnit) -> Result<Vec<u8>, EncodeError> {
    let mut enc = Encoder::new();
    enc.write_bytes(MAGIC);
    enc.write_u16(VERSION_MAJOR);
    enc.write_u16(VERSION_MINOR);
    enc.write_unit(unit)?;
    Ok(enc.finish())
}

/// Deserialize and structurally validate a unit.
pub fn from_bytes(bytes: &[u8]) -> Result<CompiledUnit, DecodeError> {
    let mut dec = Decoder::new(bytes);
    dec.expect_bytes(MAGIC)?;
    let major = dec.read_u16()?;
    let minor = dec.read_u16()?;
    if major != VERSION_MAJOR || minor != VERSION_MINOR {
        return Err(dec.err(format!(
            "unsupported unit format version {major}.{minor} (expected {VERSION_MAJOR}.{VERSION_MINOR})"
        )));
    }

    let unit = dec.read_unit()?;
    unit.validate().map_err(|e| dec.err(e.to_string()))?;
    if dec.remaining() != 0 {
        return Err(dec.err("trailing bytes".to_string()));
    }
    Ok(unit)
}

struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_len(&mut self, len: usize) -> Result<(), EncodeError> {
        let len_u32: u32 = len.try_into().map_err(|_| EncodeError {
            message: "length overflow".to_string(),
        })?;
        self.write_u32(len_u32);
        Ok(())
    }

    fn write_string(&mut self, s: &str) -> Result<(), EncodeError> {
        self.write_len(s.len())?;
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    fn write_opt_string(&mut self, s: Option<&str>) -> Result<(), EncodeError> {
        match s {
            None => self.write_u8(0),
            Some(s) => {
                self.write_u8(1);
                self.write_string(s)?;
            }
        }
        Ok(())
    }

    fn write_type(&mut self, ty: &TypeDesc) -> Result<(), EncodeError> {
        self.write_string(&ty.descriptor())
    }

    fn write_shape(&mut self, shape: &ParamShape) -> Result<(), EncodeError> {
        self.write_len(shape.len())?;
        for ty in shape {
            self.write_type(ty)?;
        }
        Ok(())
    }

    fn write_unit(&mut self, unit: &CompiledUnit) -> Result<(), EncodeError> {
        self.write_string(&unit.name)?;
        self.write_u16(unit.flags.bits());
        self.write_opt_string(unit.supertype.as_deref())?;

        self.write_len(unit.interfaces.len())?;
        for iface in &unit.interfaces {
            self.write_string(iface)?;
        }

        self.write_len(unit.tags.len())?;
        for tag in &unit.tags {
            self.write_string(tag)?;
        }

        self.write_opt_string(unit.augments.as_deref())?;

        self.write_len(unit.fields.len())?;
        for field in &unit.fields {
            self.write_field(field)?;
        }

        self.write_len(unit.methods.len())?;
        for method in &unit.methods {
            self.write_method(method)?;
        }

        self.write_len(unit.nested.len())?;
        for nested in &unit.nested {
            self.write_string(&nested.inner)?;
            self.write_string(&nested.outer)?;
            self.write_string(&nested.simple_name)?;
            self.write_u16(nested.flags.bits());
        }
        Ok(())
    }

    fn write_field(&mut self, field: &Field) -> Result<(), EncodeError> {
        self.write_string(&field.name)?;
        self.write_type(&field.ty)?;
        self.write_u8(field.visibility.to_wire());
        self.write_u16(field.flags.bits());
        Ok(())
    }

    fn write_method(&mut self, method: &Method) -> Result<(), EncodeError> {
        self.write_string(&method.name)?;
        self.write_shape(&method.shape)?;
        self.write_type(&method.ret)?;
        self.write_u8(method.visibility.to_wire());
        self.write_u16(method.flags.bits());

        self.write_len(method.hooks.len())?;
        for hook in &method.hooks {
            self.write_opt_string(hook.owner.as_deref())?;
            self.write_string(&hook.name)?;
        }

        match &method.body {
            None => self.write_u8(0),
            Some(body) => {
                self.write_u8(1);
                self.write_body(body)?;
            }
        }
        Ok(())
    }

    fn write_body(&mut self, body: &CodeBody) -> Result<(), EncodeError> {
        self.write_u16(body.max_stack);
        self.write_u16(body.max_locals);
        self.write_len(body.code.len())?;
        for inst in &body.code {
            self.write_inst(inst)?;
        }
        Ok(())
    }

    fn write_member_ref(&mut self, r: &MemberRef) -> Result<(), EncodeError> {
        self.write_string(&r.owner)?;
        self.write_string(&r.name)
    }

    fn write_call_ref(&mut self, r: &CallRef) -> Result<(), EncodeError> {
        self.write_string(&r.owner)?;
        self.write_string(&r.name)?;
        self.write_shape(&r.shape)?;
        self.write_type(&r.ret)
    }

    #[expect(clippy::cast_sign_loss, reason = "two's-complement wire encoding")]
    fn write_inst(&mut self, inst: &Instruction) -> Result<(), EncodeError> {
        match inst {
            Instruction::ConstSmall(v) => {
                self.write_u8(0);
                self.write_u8(*v as u8);
            }
            Instruction::ConstInt(v) => {
                self.write_u8(1);
                self.write_u16(*v as u16);
            }
            Instruction::ConstWide(v) => {
                self.write_u8(2);
                self.write_u32(*v as u32);
            }
            Instruction::LoadConst(c) => {
                self.write_u8(3);
                match c {
                    Const::Null => self.write_u8(0),
                    Const::Long(v) => {
                        self.write_u8(1);
                        self.write_i64(*v);
                    }
                    Const::Str(s) => {
                        self.write_u8(2);
                        self.write_string(s)?;
                    }
                }
            }
            Instruction::LoadLocal(slot) => {
                self.write_u8(4);
                self.write_u16(*slot);
            }
            Instruction::StoreLocal(slot) => {
                self.write_u8(5);
                self.write_u16(*slot);
            }
            Instruction::GetField(r) => {
                self.write_u8(6);
                self.write_member_ref(r)?;
            }
            Instruction::PutField(r) => {
                self.write_u8(7);
                self.write_member_ref(r)?;
            }
            Instruction::GetStatic(r) => {
                self.write_u8(8);
                self.write_member_ref(r)?;
            }
            Instruction::PutStatic(r) => {
                self.write_u8(9);
                self.write_member_ref(r)?;
            }
            Instruction::New(name) => {
                self.write_u8(10);
                self.write_string(name)?;
            }
            Instruction::Dup => self.write_u8(11),
            Instruction::Pop => self.write_u8(12),
            Instruction::NewArray(ty) => {
                self.write_u8(13);
                self.write_type(ty)?;
            }
            Instruction::ArrayLoad => self.write_u8(14),
            Instruction::ArrayStore => self.write_u8(15),
            Instruction::Call { kind, target } => {
                self.write_u8(16);
                self.write_u8(match kind {
                    CallKind::Virtual => 0,
                    CallKind::Special => 1,
                    CallKind::Static => 2,
                });
                self.write_call_ref(target)?;
            }
            Instruction::Intrinsic(i) => {
                self.write_u8(17);
                self.write_u8(match i {
                    Intrinsic::ArrayClone => 0,
                    Intrinsic::EnumByName => 1,
                });
            }
            Instruction::Jump(t) => {
                self.write_u8(18);
                self.write_u32(*t);
            }
            Instruction::Branch(t) => {
                self.write_u8(19);
                self.write_u32(*t);
            }
            Instruction::Return => self.write_u8(20),
            Instruction::ReturnValue => self.write_u8(21),
        }
        Ok(())
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn err(&self, message: String) -> DecodeError {
        DecodeError {
            message,
            offset: self.pos,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(self.err(format!(
                "unexpected end of input (need {n} bytes, have {})",
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn expect_bytes(&mut self, expected: &[u8]) -> Result<(), DecodeError> {
        let got = self.take(expected.len())?;
        if got != expected {
            return Err(self.err("bad magic".to_string()));
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(i64::from_le_bytes(arr))
    }

    fn read_len(&mut self) -> Result<usize, DecodeError> {
        Ok(self.read_u32()? as usize)
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_len()?;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| self.err("invalid utf-8 in string".to_string()))
    }

    fn read_opt_string(&mut self) -> Result<Option<String>, DecodeError> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_string()?)),
            other => Err(self.err(format!("bad option tag {other}"))),
        }
    }

    fn read_type(&mut self) -> Result<TypeDesc, DecodeError> {
        let desc = self.read_string()?;
        TypeDesc::parse(&desc).map_err(|e| self.err(e))
    }

    fn read_shape(&mut self) -> Result<ParamShape, DecodeError> {
        let len = self.read_len()?;
        let mut shape = ParamShape::new();
        for _ in 0..len {
            shape.push(self.read_type()?);
        }
        Ok(shape)
    }

    fn read_unit_flags(&mut self) -> Result<UnitFlags, DecodeError> {
        let bits = self.read_u16()?;
        UnitFlags::from_bits(bits).ok_or_else(|| self.err(format!("unknown unit flags {bits:#06x}")))
    }

    fn read_member_flags(&mut self) -> Result<MemberFlags, DecodeError> {
        let bits = self.read_u16()?;
        MemberFlags::from_bits(bits)
            .ok_or_else(|| self.err(format!("unknown member flags {bits:#06x}")))
    }

    fn read_visibility(&mut self) -> Result<Visibility, DecodeError> {
        let v = self.read_u8()?;
        Visibility::from_wire(v).ok_or_else(|| self.err(format!("bad visibility {v}")))
    }

    fn read_unit(&mut self) -> Result<CompiledUnit, DecodeError> {
        let name = self.read_string()?;
        let flags = self.read_unit_flags()?;
        let supertype = self.read_opt_string()?;

        let iface_count = self.read_len()?;
        let mut interfaces = Vec::with_capacity(iface_count);
        for _ in 0..iface_count {
            interfaces.push(self.read_string()?);
        }

        let tag_count = self.read_len()?;
        let mut tags = Vec::with_capacity(tag_count);
        for _ in 0..tag_count {
            tags.push(self.read_string()?);
        }

        let augments = self.read_opt_string()?;

        let field_count = self.read_len()?;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(self.read_field()?);
        }

        let method_count = self.read_len()?;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(self.read_method()?);
        }

        let nested_count = self.read_len()?;
        let mut nested = Vec::with_capacity(nested_count);
        for _ in 0..nested_count {
            let inner = self.read_string()?;
            let outer = self.read_string()?;
            let simple_name = self.read_string()?;
            let flags = self.read_unit_flags()?;
            nested.push(NestedRef {
                inner,
                outer,
                simple_name,
                flags,
            });
        }

        Ok(CompiledUnit {
            name,
            flags,
            supertype,
            interfaces,
            tags,
            augments,
            fields,
            methods,
            nested,
        })
    }

    fn read_field(&mut self) -> Result<Field, DecodeError> {
        let name = self.read_string()?;
        let ty = self.read_type()?;
        let visibility = self.read_visibility()?;
        let flags = self.read_member_flags()?;
        Ok(Field {
            name,
            ty,
            visibility,
            flags,
        })
    }

    fn read_method(&mut self) -> Result<Method, DecodeError> {
        let name = self.read_string()?;
        let shape = self.read_shape()?;
        let ret = self.read_type()?;
        let visibility = self.read_visibility()?;
        let flags = self.read_member_flags()?;

        let hook_count = self.read_len()?;
        let mut hooks = Vec::with_capacity(hook_count);
        for _ in 0..hook_count {
            let owner = self.read_opt_string()?;
            let name = self.read_string()?;
            hooks.push(HookRef { owner, name });
        }

        let body = match self.read_u8()? {
            0 => None,
            1 => Some(self.read_body()?),
            other => return Err(self.err(format!("bad body tag {other}"))),
        };

        Ok(Method {
            name,
            shape,
            ret,
            visibility,
            flags,
            hooks,
            body,
        })
    }

    fn read_body(&mut self) -> Result<CodeBody, DecodeError> {
        let max_stack = self.read_u16()?;
        let max_locals = self.read_u16()?;
        let count = self.read_len()?;
        let mut code = Vec::with_capacity(count);
        for _ in 0..count {
            code.push(self.read_inst()?);
        }
        Ok(CodeBody {
            max_stack,
            max_locals,
            code,
        })
    }

    fn read_member_ref(&mut self) -> Result<MemberRef, DecodeError> {
        let owner = self.read_string()?;
        let name = self.read_string()?;
        Ok(MemberRef { owner, name })
    }

    fn read_call_ref(&mut self) -> Result<CallRef, DecodeError> {
        let owner = self.read_string()?;
        let name = self.read_string()?;
        let shape = self.read_shape()?;
        let ret = self.read_type()?;
        Ok(CallRef {
            owner,
            name,
            shape,
            ret,
        })
    }

    #[expect(clippy::cast_possible_wrap, reason = "two's-complement wire encoding")]
    fn read_inst(&mut self) -> Result<Instruction, DecodeError> {
        let opcode = self.read_u8()?;
        Ok(match opcode {
            0 => Instruction::ConstSmall(self.read_u8()? as i8),
            1 => Instruction::ConstInt(self.read_u16()? as i16),
            2 => Instruction::ConstWide(self.read_u32()? as i32),
            3 => Instruction::LoadConst(match self.read_u8()? {
                0 => Const::Null,
                1 => Const::Long(self.read_i64()?),
                2 => Const::Str(self.read_string()?),
                other => return Err(self.err(format!("bad constant tag {other}"))),
            }),
            4 => Instruction::LoadLocal(self.read_u16()?),
            5 => Instruction::StoreLocal(self.read_u16()?),
            6 => Instruction::GetField(self.read_member_ref()?),
            7 => Instruction::PutField(self.read_member_ref()?),
            8 => Instruction::GetStatic(self.read_member_ref()?),
            9 => Instruction::PutStatic(self.read_member_ref()?),
            10 => Instruction::New(self.read_string()?),
            11 => Instruction::Dup,
            12 => Instruction::Pop,
            13 => Instruction::NewArray(self.read_type()?),
            14 => Instruction::ArrayLoad,
            15 => Instruction::ArrayStore,
            16 => {
                let kind = match self.read_u8()? {
                    0 => CallKind::Virtual,
                    1 => CallKind::Special,
                    2 => CallKind::Static,
                    other => return Err(self.err(format!("bad call kind {other}"))),
                };
                Instruction::Call {
                    kind,
                    target: self.read_call_ref()?,
                }
            }
            17 => Instruction::Intrinsic(match self.read_u8()? {
                0 => Intrinsic::ArrayClone,
                1 => Intrinsic::EnumByName,
                other => return Err(self.err(format!("bad intrinsic {other}"))),
            }),
            18 => Instruction::Jump(self.read_u32()?),
            19 => Instruction::Branch(self.read_u32()?),
            20 => Instruction::Return,
            21 => Instruction::ReturnValue,
            other => return Err(self.err(format!("unknown opcode {other}"))),
        })
    }
}
