use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

use super::literal::Literal;
use super::types::{EntityRef, EntityType, TypeRef};

/// Member reference carried by member-access nodes.
///
/// `declaring_type` is only set when the member was resolved through an
/// interface, so that a record can answer an explicit interface member
/// differently from its own member of the same name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub name: String,
    pub declaring_type: Option<String>,
}

impl MemberRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: None,
        }
    }

    #[must_use]
    pub fn declared_on(mut self, declaring_type: impl Into<String>) -> Self {
        self.declaring_type = Some(declaring_type.into());
        self
    }

    /// True when this reference names `member` on an interface declaring `declaring`.
    #[must_use]
    pub fn is(&self, declaring: &str, member: &str) -> bool {
        self.name == member && self.declaring_type.as_deref() == Some(declaring)
    }
}

/// Runtime value produced while evaluating a compiled expression.
#[derive(Clone)]
pub enum Value<'a> {
    Scalar(Literal),
    Record(&'a dyn Record),
    Collection(Vec<Value<'a>>),
}

impl Value<'_> {
    pub const NULL: Value<'static> = Value::Scalar(Literal::Null);

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Literal::Null))
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Scalar(lit) => Some(lit),
            _ => None,
        }
    }

    /// Truthiness in predicate position; anything but `true` is false.
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Scalar(Literal::Bool(true)))
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(lit) => f.debug_tuple("Scalar").field(lit).finish(),
            Value::Record(rec) => f
                .debug_tuple("Record")
                .field(&rec.entity_type().full_name())
                .finish(),
            Value::Collection(items) => f.debug_tuple("Collection").field(items).finish(),
        }
    }
}

impl From<Literal> for Value<'_> {
    fn from(value: Literal) -> Self {
        Value::Scalar(value)
    }
}

/// A queryable object whose members can be read by reference.
pub trait Record {
    fn entity_type(&self) -> &'static EntityType;

    /// Returns the member's value, or `None` when the record has no such member.
    fn field(&self, member: &MemberRef) -> Option<Value<'_>>;
}

/// A type with a static descriptor.
pub trait Entity: Record {
    fn descriptor() -> &'static EntityType;
}

/// Mapping between a Rust field type and the query type system.
pub trait ODataType {
    fn type_ref() -> TypeRef;
    fn to_value(&self) -> Value<'_>;
}

macro_rules! scalar_odata_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ODataType for $ty {
                fn type_ref() -> TypeRef {
                    TypeRef::$variant
                }

                fn to_value(&self) -> Value<'_> {
                    Value::Scalar(Literal::from(*self))
                }
            }
        )*
    };
}

scalar_odata_type! {
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
    Uuid => Guid,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    DateTime<Utc> => DateTimeOffset,
}

impl ODataType for String {
    fn type_ref() -> TypeRef {
        TypeRef::String
    }

    fn to_value(&self) -> Value<'_> {
        Value::Scalar(Literal::String(self.clone()))
    }
}

impl<T: ODataType> ODataType for Option<T> {
    fn type_ref() -> TypeRef {
        match T::type_ref() {
            TypeRef::String => TypeRef::String,
            inner @ TypeRef::Nullable(_) => inner,
            inner => TypeRef::Nullable(Box::new(inner)),
        }
    }

    fn to_value(&self) -> Value<'_> {
        self.as_ref().map_or(Value::NULL, ODataType::to_value)
    }
}

impl<T: ODataType> ODataType for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::Collection(Box::new(T::type_ref()))
    }

    fn to_value(&self) -> Value<'_> {
        Value::Collection(self.iter().map(ODataType::to_value).collect())
    }
}

impl<T: ODataType> ODataType for Box<T> {
    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn to_value(&self) -> Value<'_> {
        (**self).to_value()
    }
}

/// Entity-typed member value; used by generated code.
#[must_use]
pub fn entity_type_ref<T: Entity>() -> TypeRef {
    TypeRef::Entity(EntityRef::of::<T>())
}
