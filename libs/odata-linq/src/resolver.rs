//! Member name resolution between declared members and wire aliases.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

use crate::model::{EntityType, Member};

/// Memoized lookups owned by a single resolver.
///
/// Entries are pure functions of the static descriptors, so populating a
/// key twice under contention is harmless; the write lock only keeps the
/// maps consistent.
#[derive(Debug, Default)]
struct MemberCache {
    names: RwLock<HashMap<(String, String), String>>,
    members: RwLock<HashMap<AliasKey, Option<&'static Member>>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct AliasKey {
    type_name: String,
    alias: String,
    ignore_case: bool,
}

/// Maps typed members to wire aliases and back.
#[derive(Debug, Default)]
pub struct MemberNameResolver {
    cache: MemberCache,
}

impl MemberNameResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire alias of `member`: data-member name, then element name, then
    /// attribute name, then the declared name.
    #[must_use]
    pub fn resolve_name(&self, member: &Member) -> String {
        let key = (member.declaring_type().to_owned(), member.name().to_owned());
        if let Some(hit) = self.cache.names.read().get(&key) {
            return hit.clone();
        }

        let alias = member
            .aliases()
            .next()
            .unwrap_or_else(|| member.name())
            .to_owned();
        trace!(member = %member.name(), alias = %alias, "cached member alias");
        self.cache.names.write().insert(key, alias.clone());
        alias
    }

    /// Member of `ty` answering to `alias` under exact matching.
    ///
    /// A member answers to every name it carries: the data-member, element
    /// and attribute names as well as its declared name. Readers therefore
    /// accept `IntValue` for a member written as `Number`. The first visible
    /// member with a matching name wins.
    #[must_use]
    pub fn resolve_alias(&self, ty: &'static EntityType, alias: &str) -> Option<&'static Member> {
        self.lookup(ty, alias, false)
    }

    /// Like [`Self::resolve_alias`] with case-folded comparison.
    pub fn resolve_alias_ignore_case(
        &self,
        ty: &'static EntityType,
        alias: &str,
    ) -> Option<&'static Member> {
        self.lookup(ty, alias, true)
    }

    /// The alias itself, if some member of `ty` answers to it.
    #[must_use]
    pub fn resolve_name_on_type(&self, ty: &'static EntityType, alias: &str) -> Option<String> {
        self.resolve_alias(ty, alias).map(|_| alias.to_owned())
    }

    fn lookup(&self, ty: &'static EntityType, alias: &str, ignore_case: bool) -> Option<&'static Member> {
        let key = AliasKey {
            type_name: ty.full_name().to_owned(),
            alias: alias.to_owned(),
            ignore_case,
        };
        if let Some(hit) = self.cache.members.read().get(&key) {
            return *hit;
        }

        let folded = alias.to_lowercase();
        let found = ty.members().into_iter().find(|m| {
            m.aliases().any(|candidate| {
                if ignore_case {
                    candidate.to_lowercase() == folded
                } else {
                    candidate == alias
                }
            })
        });
        trace!(
            entity = %ty.full_name(),
            alias = %alias,
            found = found.is_some(),
            "cached alias lookup"
        );
        self.cache.members.write().insert(key, found);
        found
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::{EntityRef, TypeRef};
    use std::sync::LazyLock;

    static ITEM: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::structure("Tests.FakeItem")
            .member(Member::new("StringValue", TypeRef::String).data_member("Text"))
            .member(Member::new("IntValue", TypeRef::Int32).element("Number"))
            .member(Member::new("Flag", TypeRef::Bool).attribute("flag"))
            .member(Member::new("DoubleValue", TypeRef::Double))
    });

    static BASE: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::interface("Tests.INamed").member(Member::new("Name", TypeRef::String))
    });

    static DERIVED: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::interface("Tests.IPerson")
            .member(Member::new("Age", TypeRef::Int32))
            .implements(EntityRef::lazy(|| &BASE))
    });

    static RETYPED: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::interface("Tests.IRetyped")
            .member(Member::new("Name", TypeRef::Int32))
            .implements(EntityRef::lazy(|| &DERIVED))
    });

    fn member(name: &str) -> &'static Member {
        ITEM.find_member(name).unwrap()
    }

    #[test]
    fn test_resolve_name_precedence() {
        let resolver = MemberNameResolver::new();
        assert_eq!(resolver.resolve_name(member("StringValue")), "Text");
        assert_eq!(resolver.resolve_name(member("IntValue")), "Number");
        assert_eq!(resolver.resolve_name(member("Flag")), "flag");
        assert_eq!(resolver.resolve_name(member("DoubleValue")), "DoubleValue");
    }

    #[test]
    fn test_resolve_name_is_memoized() {
        let resolver = MemberNameResolver::new();
        let first = resolver.resolve_name(member("IntValue"));
        let second = resolver.resolve_name(member("IntValue"));
        assert_eq!(first, second);
        assert_eq!(resolver.cache.names.read().len(), 1);
    }

    #[test]
    fn test_resolve_alias_by_any_alias() {
        let resolver = MemberNameResolver::new();
        assert_eq!(resolver.resolve_alias(&ITEM, "Number").unwrap().name(), "IntValue");
        assert_eq!(resolver.resolve_alias(&ITEM, "IntValue").unwrap().name(), "IntValue");
        assert!(resolver.resolve_alias(&ITEM, "number").is_none());
        assert!(resolver.resolve_alias(&ITEM, "Missing").is_none());
    }

    #[test]
    fn test_resolve_alias_ignore_case() {
        let resolver = MemberNameResolver::new();
        let m = resolver.resolve_alias_ignore_case(&ITEM, "number").unwrap();
        assert_eq!(m.name(), "IntValue");
    }

    #[test]
    fn test_resolve_alias_through_interface_closure() {
        let resolver = MemberNameResolver::new();
        let m = resolver.resolve_alias(&DERIVED, "Name").unwrap();
        assert_eq!(m.declaring_type(), "Tests.INamed");
    }

    #[test]
    fn test_resolve_alias_prefers_derived_declaration() {
        let resolver = MemberNameResolver::new();
        let m = resolver.resolve_alias(&RETYPED, "Name").unwrap();
        assert_eq!(m.declaring_type(), "Tests.IRetyped");
        assert_eq!(m.ty(), &TypeRef::Int32);
        let m = resolver.resolve_alias_ignore_case(&RETYPED, "name").unwrap();
        assert_eq!(m.declaring_type(), "Tests.IRetyped");
    }

    #[test]
    fn test_resolve_name_on_type() {
        let resolver = MemberNameResolver::new();
        assert_eq!(resolver.resolve_name_on_type(&ITEM, "Text").as_deref(), Some("Text"));
        assert_eq!(resolver.resolve_name_on_type(&ITEM, "Nope"), None);
    }

    #[test]
    fn test_concurrent_resolution() {
        let resolver = std::sync::Arc::new(MemberNameResolver::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = resolver.clone();
                std::thread::spawn(move || r.resolve_alias(&ITEM, "Number").map(Member::name))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), Some("IntValue"));
        }
    }
}
