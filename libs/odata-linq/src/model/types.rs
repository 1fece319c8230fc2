//! Static type descriptors for queryable shapes.
//!
//! An [`EntityType`] is the explicit alias table a caller supplies for a
//! source type: declared member names, their types and the optional wire,
//! element and attribute aliases. Descriptors are normally produced by
//! `#[derive(ODataEntity)]` and live for the whole process.

use std::collections::HashSet;
use std::fmt;

/// Pointer to a static entity descriptor.
///
/// The lazy form holds a function instead of the descriptor itself, which
/// lets a type refer to itself through a collection member.
#[derive(Clone, Copy)]
pub struct EntityRef(Target);

#[derive(Clone, Copy)]
enum Target {
    Lazy(fn() -> &'static EntityType),
    Static(&'static EntityType),
}

impl EntityRef {
    #[must_use]
    pub fn of<T: super::Entity>() -> Self {
        Self(Target::Lazy(T::descriptor))
    }

    #[must_use]
    pub fn lazy(descriptor: fn() -> &'static EntityType) -> Self {
        Self(Target::Lazy(descriptor))
    }

    #[must_use]
    pub fn get(self) -> &'static EntityType {
        match self.0 {
            Target::Lazy(descriptor) => descriptor(),
            Target::Static(ty) => ty,
        }
    }
}

impl From<&'static EntityType> for EntityRef {
    fn from(ty: &'static EntityType) -> Self {
        Self(Target::Static(ty))
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.get().full_name() == other.get().full_name()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.get().full_name()).finish()
    }
}

/// Lazily dereferenced pointer to a static enum descriptor.
#[derive(Clone, Copy)]
pub struct EnumRef(pub fn() -> &'static EnumType);

impl EnumRef {
    #[must_use]
    pub fn get(self) -> &'static EnumType {
        (self.0)()
    }
}

impl PartialEq for EnumRef {
    fn eq(&self, other: &Self) -> bool {
        self.get().full_name() == other.get().full_name()
    }
}

impl fmt::Debug for EnumRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnumRef").field(&self.get().full_name()).finish()
    }
}

/// Declared type of a member, parameter or expression.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeRef {
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
    Enum(EnumRef),
    Entity(EntityRef),
    Collection(Box<TypeRef>),
    Nullable(Box<TypeRef>),
}

impl TypeRef {
    /// The type with any `Nullable` wrapper removed.
    #[must_use]
    pub fn underlying(&self) -> &TypeRef {
        match self {
            Self::Nullable(inner) => inner.underlying(),
            other => other,
        }
    }

    /// Element type of a collection, if this is one.
    #[must_use]
    pub fn element(&self) -> Option<&TypeRef> {
        match self.underlying() {
            Self::Collection(inner) => Some(inner),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.underlying(),
            Self::Byte
                | Self::SByte
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
                | Self::Single
                | Self::Double
                | Self::Decimal
        )
    }

    #[must_use]
    pub fn is_integral(&self) -> bool {
        self.is_numeric() && !matches!(self.underlying(), Self::Single | Self::Double | Self::Decimal)
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self.underlying(), Self::String)
    }

    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self.underlying(), Self::Bool)
    }

    #[must_use]
    pub fn is_temporal(&self) -> bool {
        matches!(self.underlying(), Self::DateTime | Self::DateTimeOffset)
    }

    /// Entity descriptor behind this type, looking through `Nullable`.
    #[must_use]
    pub fn entity(&self) -> Option<&'static EntityType> {
        match self.underlying() {
            Self::Entity(entity) => Some(entity.get()),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum(e) => f.write_str(e.get().full_name()),
            Self::Entity(e) => f.write_str(e.get().full_name()),
            Self::Collection(inner) => write!(f, "Collection({inner})"),
            Self::Nullable(inner) => write!(f, "{inner}?"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Structure,
    Interface,
}

/// A typed member (property or field) of an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    name: String,
    declaring_type: String,
    ty: TypeRef,
    data_member_name: Option<String>,
    element_name: Option<String>,
    attribute_name: Option<String>,
}

impl Member {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            ty,
            data_member_name: None,
            element_name: None,
            attribute_name: None,
        }
    }

    /// Wire name taken from a data-contract style annotation.
    #[must_use]
    pub fn data_member(mut self, alias: impl Into<String>) -> Self {
        self.data_member_name = Some(alias.into());
        self
    }

    #[must_use]
    pub fn element(mut self, alias: impl Into<String>) -> Self {
        self.element_name = Some(alias.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, alias: impl Into<String>) -> Self {
        self.attribute_name = Some(alias.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    #[must_use]
    pub fn data_member_name(&self) -> Option<&str> {
        self.data_member_name.as_deref()
    }

    #[must_use]
    pub fn element_name(&self) -> Option<&str> {
        self.element_name.as_deref()
    }

    #[must_use]
    pub fn attribute_name(&self) -> Option<&str> {
        self.attribute_name.as_deref()
    }

    /// Aliases in precedence order, declared name last.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        [
            self.data_member_name.as_deref(),
            self.element_name.as_deref(),
            self.attribute_name.as_deref(),
            Some(self.name.as_str()),
        ]
        .into_iter()
        .flatten()
    }

    fn signature(&self) -> (String, String) {
        (self.name.clone(), self.ty.to_string())
    }
}

/// Descriptor of a queryable shape.
#[derive(Debug)]
pub struct EntityType {
    full_name: String,
    kind: TypeKind,
    members: Vec<Member>,
    interfaces: Vec<EntityRef>,
}

impl EntityType {
    #[must_use]
    pub fn structure(full_name: impl Into<String>) -> Self {
        Self::with_kind(full_name.into(), TypeKind::Structure)
    }

    #[must_use]
    pub fn interface(full_name: impl Into<String>) -> Self {
        Self::with_kind(full_name.into(), TypeKind::Interface)
    }

    fn with_kind(full_name: String, kind: TypeKind) -> Self {
        Self {
            full_name,
            kind,
            members: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    /// Adds a member declared on this type.
    #[must_use]
    pub fn member(mut self, mut member: Member) -> Self {
        member.declaring_type.clone_from(&self.full_name);
        self.members.push(member);
        self
    }

    #[must_use]
    pub fn implements(mut self, interface: EntityRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Short name without the namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        self.full_name.rsplit('.').next().unwrap_or(&self.full_name)
    }

    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Members declared directly on this type.
    #[must_use]
    pub fn declared_members(&self) -> &[Member] {
        &self.members
    }

    #[must_use]
    pub fn interfaces(&self) -> &[EntityRef] {
        &self.interfaces
    }

    /// Members visible through this type.
    ///
    /// Structures expose their own members. Interfaces expose the members
    /// of the whole implemented-interface closure, visited breadth first.
    /// Each newly discovered level goes after the levels closer to `self`,
    /// so a lookup by name finds the more derived declaration first.
    #[must_use]
    pub fn members(&self) -> Vec<&Member> {
        if !self.is_interface() {
            return self.members.iter().collect();
        }

        let mut members: Vec<&Member> = self.members.iter().collect();
        let mut seen: HashSet<(String, String)> = members.iter().map(|m| m.signature()).collect();
        let mut considered: Vec<&'static EntityType> = Vec::new();
        let mut queue: Vec<&'static EntityType> = self.interfaces.iter().map(|i| i.get()).collect();

        while let Some(interface) = queue.first().copied() {
            queue.remove(0);
            if considered.iter().any(|c| c.full_name == interface.full_name) {
                continue;
            }
            considered.push(interface);

            for sub in &interface.interfaces {
                let sub = sub.get();
                if !considered.iter().any(|c| c.full_name == sub.full_name) {
                    queue.push(sub);
                }
            }

            members.extend(
                interface
                    .members
                    .iter()
                    .filter(|m| seen.insert(m.signature())),
            );
        }

        members
    }

    /// Finds a visible member by declared name.
    #[must_use]
    pub fn find_member(&self, name: &str) -> Option<&Member> {
        self.members().into_iter().find(|m| m.name == name)
    }
}

/// Descriptor of an enumeration.
#[derive(Debug)]
pub struct EnumType {
    full_name: String,
    members: Vec<String>,
}

impl EnumType {
    #[must_use]
    pub fn new<I, S>(full_name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            full_name: full_name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    #[must_use]
    pub fn has_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    static BASE: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::interface("Tests.IBase")
            .member(Member::new("Id", TypeRef::Int32))
            .member(Member::new("Name", TypeRef::String))
    });

    static DERIVED: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::interface("Tests.IDerived")
            .member(Member::new("Email", TypeRef::String))
            .implements(EntityRef::lazy(|| &BASE))
    });

    static TOP: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::interface("Tests.ITop")
            .member(Member::new("Name", TypeRef::String))
            .implements(EntityRef::lazy(|| &DERIVED))
            .implements(EntityRef::lazy(|| &BASE))
    });

    #[test]
    fn test_member_declaring_type_is_assigned() {
        let m = BASE.find_member("Id").unwrap();
        assert_eq!(m.declaring_type(), "Tests.IBase");
        assert_eq!(BASE.name(), "IBase");
    }

    #[test]
    fn test_interface_closure_contains_base_members() {
        let names: Vec<&str> = DERIVED.members().iter().map(|m| m.name()).collect();
        assert!(names.contains(&"Email"));
        assert!(names.contains(&"Id"));
        assert!(names.contains(&"Name"));
    }

    #[test]
    fn test_interface_closure_deduplicates_by_signature() {
        let members = TOP.members();
        let names: Vec<&str> = members.iter().map(|m| m.name()).collect();
        assert_eq!(names.iter().filter(|n| **n == "Name").count(), 1);
        assert_eq!(names.iter().filter(|n| **n == "Id").count(), 1);
        let name = TOP.find_member("Name").unwrap();
        assert_eq!(name.declaring_type(), "Tests.ITop");
    }

    static RETYPED: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::interface("Tests.IRetyped")
            .member(Member::new("Name", TypeRef::Int32))
            .implements(EntityRef::lazy(|| &DERIVED))
    });

    #[test]
    fn test_derived_member_shadows_base_with_other_type() {
        let members = RETYPED.members();
        let names: Vec<&str> = members.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["Name", "Email", "Id", "Name"]);

        let name = RETYPED.find_member("Name").unwrap();
        assert_eq!(name.declaring_type(), "Tests.IRetyped");
        assert_eq!(name.ty(), &TypeRef::Int32);
    }

    #[test]
    fn test_aliases_follow_precedence() {
        let m = Member::new("IntValue", TypeRef::Int32)
            .attribute("attr")
            .element("Number");
        let aliases: Vec<&str> = m.aliases().collect();
        assert_eq!(aliases, vec!["Number", "attr", "IntValue"]);
    }

    #[test]
    fn test_type_ref_helpers() {
        let t = TypeRef::Nullable(Box::new(TypeRef::Double));
        assert!(t.is_numeric());
        assert!(!t.is_integral());
        assert_eq!(t.underlying(), &TypeRef::Double);
        let c = TypeRef::Collection(Box::new(TypeRef::String));
        assert_eq!(c.element(), Some(&TypeRef::String));
    }
}
