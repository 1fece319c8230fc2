//! Source type descriptors, constants and runtime values.

mod literal;
mod types;
mod value;

pub use literal::{EnumValue, Literal, LiteralKind};
pub use types::{EntityRef, EntityType, EnumRef, EnumType, Member, TypeKind, TypeRef};
pub use value::{Entity, MemberRef, ODataType, Record, Value, entity_type_ref};
