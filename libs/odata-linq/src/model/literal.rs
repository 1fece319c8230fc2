use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

use super::types::TypeRef;

/// Enum constant, identified by the enum's full name and a member name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: String,
    pub member: String,
}

impl EnumValue {
    #[must_use]
    pub fn new(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            member: member.into(),
        }
    }
}

/// Owned constant appearing in an expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Byte(u8),
    SByte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Guid(Uuid),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Enum(EnumValue),
}

/// Discriminant of a [`Literal`], used by value writers to declare what they handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Null,
    Bool,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
    Decimal,
    String,
    Guid,
    DateTime,
    DateTimeOffset,
    Enum,
}

impl LiteralKind {
    #[must_use]
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::SByte
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }
}

impl Literal {
    #[must_use]
    pub fn kind(&self) -> LiteralKind {
        match self {
            Self::Null => LiteralKind::Null,
            Self::Bool(_) => LiteralKind::Bool,
            Self::Byte(_) => LiteralKind::Byte,
            Self::SByte(_) => LiteralKind::SByte,
            Self::Int16(_) => LiteralKind::Int16,
            Self::Int32(_) => LiteralKind::Int32,
            Self::Int64(_) => LiteralKind::Int64,
            Self::UInt16(_) => LiteralKind::UInt16,
            Self::UInt32(_) => LiteralKind::UInt32,
            Self::UInt64(_) => LiteralKind::UInt64,
            Self::Single(_) => LiteralKind::Single,
            Self::Double(_) => LiteralKind::Double,
            Self::Decimal(_) => LiteralKind::Decimal,
            Self::String(_) => LiteralKind::String,
            Self::Guid(_) => LiteralKind::Guid,
            Self::DateTime(_) => LiteralKind::DateTime,
            Self::DateTimeOffset(_) => LiteralKind::DateTimeOffset,
            Self::Enum(_) => LiteralKind::Enum,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Declared type of this constant. Enum constants carry no descriptor
    /// and `null` has no type, so both yield `None`.
    #[must_use]
    pub fn type_ref(&self) -> Option<TypeRef> {
        let ty = match self {
            Self::Null | Self::Enum(_) => return None,
            Self::Bool(_) => TypeRef::Bool,
            Self::Byte(_) => TypeRef::Byte,
            Self::SByte(_) => TypeRef::SByte,
            Self::Int16(_) => TypeRef::Int16,
            Self::Int32(_) => TypeRef::Int32,
            Self::Int64(_) => TypeRef::Int64,
            Self::UInt16(_) => TypeRef::UInt16,
            Self::UInt32(_) => TypeRef::UInt32,
            Self::UInt64(_) => TypeRef::UInt64,
            Self::Single(_) => TypeRef::Single,
            Self::Double(_) => TypeRef::Double,
            Self::Decimal(_) => TypeRef::Decimal,
            Self::String(_) => TypeRef::String,
            Self::Guid(_) => TypeRef::Guid,
            Self::DateTime(_) => TypeRef::DateTime,
            Self::DateTimeOffset(_) => TypeRef::DateTimeOffset,
        };
        Some(ty)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral value widened to `i128`.
    #[must_use]
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            Self::Byte(v) => Some(i128::from(v)),
            Self::SByte(v) => Some(i128::from(v)),
            Self::Int16(v) => Some(i128::from(v)),
            Self::Int32(v) => Some(i128::from(v)),
            Self::Int64(v) => Some(i128::from(v)),
            Self::UInt16(v) => Some(i128::from(v)),
            Self::UInt32(v) => Some(i128::from(v)),
            Self::UInt64(v) => Some(i128::from(v)),
            _ => None,
        }
    }
}

/// Invariant textual form, used when no value writer claims a constant.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Single(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Guid(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f")),
            Self::DateTimeOffset(v) => f.write_str(&v.to_rfc3339()),
            Self::Enum(v) => f.write_str(&v.member),
        }
    }
}

macro_rules! literal_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Literal {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

literal_from! {
    bool => Bool,
    u8 => Byte,
    i8 => SByte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Single,
    f64 => Double,
    Decimal => Decimal,
    String => String,
    Uuid => Guid,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    EnumValue => Enum,
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTimeOffset(value.fixed_offset())
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
