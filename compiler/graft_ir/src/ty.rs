//! Wire type descriptors.
//!
//! Descriptors use a compact single-pass grammar:
//!
//! ```text
//! V        void
//! Z        bool
//! I        int
//! J        long
//! T        str
//! L<name>; object reference
//! [<desc>  array of <desc>
//! ```

use std::fmt;

use smallvec::SmallVec;

/// Parameter shape of a method: the ordered declared parameter types.
///
/// Most methods have few parameters; four covers the common case inline.
pub type ParamShape = SmallVec<[TypeDesc; 4]>;

/// A declared type in the graft unit format.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeDesc {
    Void,
    Bool,
    Int,
    Long,
    Str,
    /// Reference to a named unit.
    Object(String),
    /// Array of the element type.
    Array(Box<TypeDesc>),
}

impl TypeDesc {
    /// Render this type as its wire descriptor.
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            TypeDesc::Void => out.push('V'),
            TypeDesc::Bool => out.push('Z'),
            TypeDesc::Int => out.push('I'),
            TypeDesc::Long => out.push('J'),
            TypeDesc::Str => out.push('T'),
            TypeDesc::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            TypeDesc::Array(elem) => {
                out.push('[');
                elem.write_descriptor(out);
            }
        }
    }

    /// Parse a wire descriptor. The whole input must be consumed.
    pub fn parse(desc: &str) -> Result<TypeDesc, String> {
        let bytes = desc.as_bytes();
        let mut pos = 0usize;
        let ty = Self::parse_at(desc, bytes, &mut pos)?;
        if pos != bytes.len() {
            return Err(format!("trailing characters in type descriptor `{desc}`"));
        }
        Ok(ty)
    }

    fn parse_at(desc: &str, bytes: &[u8], pos: &mut usize) -> Result<TypeDesc, String> {
        let Some(&c) = bytes.get(*pos) else {
            return Err(format!("empty type descriptor in `{desc}`"));
        };
        *pos += 1;
        match c {
            b'V' => Ok(TypeDesc::Void),
            b'Z' => Ok(TypeDesc::Bool),
            b'I' => Ok(TypeDesc::Int),
            b'J' => Ok(TypeDesc::Long),
            b'T' => Ok(TypeDesc::Str),
            b'L' => {
                let start = *pos;
                while let Some(&c) = bytes.get(*pos) {
                    *pos += 1;
                    if c == b';' {
                        return Ok(TypeDesc::Object(desc[start..*pos - 1].to_string()));
                    }
                }
                Err(format!("unterminated object descriptor in `{desc}`"))
            }
            b'[' => Ok(TypeDesc::Array(Box::new(Self::parse_at(desc, bytes, pos)?))),
            other => Err(format!(
                "unknown type descriptor char `{}` in `{desc}`",
                other as char
            )),
        }
    }

    /// Whether values of this type occupy an operand-stack slot.
    pub fn is_value(&self) -> bool {
        !matches!(self, TypeDesc::Void)
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Void => write!(f, "void"),
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Int => write!(f, "int"),
            TypeDesc::Long => write!(f, "long"),
            TypeDesc::Str => write!(f, "str"),
            TypeDesc::Object(name) => write!(f, "{name}"),
            TypeDesc::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

/// Render a parameter shape as `(desc…)` for signatures and error messages.
pub fn shape_descriptor(shape: &[TypeDesc]) -> String {
    let mut out = String::from("(");
    for ty in shape {
        ty.write_descriptor(&mut out);
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_round_trip() {
        let types = [
            TypeDesc::Void,
            TypeDesc::Int,
            TypeDesc::Str,
            TypeDesc::Object("com.ex.Widget".to_string()),
            TypeDesc::Array(Box::new(TypeDesc::Object("com.ex.Widget".to_string()))),
            TypeDesc::Array(Box::new(TypeDesc::Array(Box::new(TypeDesc::Long)))),
        ];
        for ty in types {
            let desc = ty.descriptor();
            assert_eq!(TypeDesc::parse(&desc).as_ref(), Ok(&ty), "desc `{desc}`");
        }
    }

    #[test]
    fn test_parse_rejects_trailing() {
        assert!(TypeDesc::parse("IV").is_err());
        assert!(TypeDesc::parse("Lcom.ex.A").is_err());
        assert!(TypeDesc::parse("").is_err());
        assert!(TypeDesc::parse("Q").is_err());
    }

    #[test]
    fn test_shape_descriptor() {
        let shape = [TypeDesc::Int, TypeDesc::Object("a.B".to_string())];
        assert_eq!(shape_descriptor(&shape), "(ILa.B;)");
    }
}
