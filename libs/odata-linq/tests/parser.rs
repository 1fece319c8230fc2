#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use odata_linq::expr::{Expr, Lambda};
use odata_linq::model::{Entity, EntityType};
use odata_linq::{Error, Predicate};

use uuid::Uuid;

use common::{ChildItem, FakeItem, NUMBERED, Person, QUERYABLE_USER, User, parser, writer};

fn roundtrip(text: &str, source: &'static EntityType) -> String {
    let lambda = parser().convert(text, source).unwrap();
    writer().write(&Expr::Lambda(lambda), source).unwrap()
}

fn matching(text: &str, items: &[FakeItem]) -> Vec<i32> {
    let lambda = parser().convert(text, FakeItem::descriptor()).unwrap();
    let predicate = Predicate::compile(&lambda).unwrap();
    items
        .iter()
        .filter(|item| predicate.matches(*item))
        .map(|item| item.int_value)
        .collect()
}

fn items() -> Vec<FakeItem> {
    let mut with_children = FakeItem::numbered(3, Some("parent"));
    with_children.children = vec![ChildItem {
        id: 1,
        text: Some("blah".to_owned()),
        descendants: Vec::new(),
    }];
    with_children.child = Some(ChildItem {
        id: 9,
        text: Some("only".to_owned()),
        descendants: Vec::new(),
    });
    vec![
        FakeItem::numbered(1, Some("blah")),
        FakeItem::numbered(2, None),
        with_children,
    ]
}

#[test]
fn test_parsed_filter_renders_like_built_filter() {
    let built = writer()
        .write(
            &Expr::Lambda(Lambda::new(|x| x.member("Name").length().add(2).eq(7))),
            FakeItem::descriptor(),
        )
        .unwrap();
    assert_eq!(roundtrip("(length(Name) add 2) eq 7", FakeItem::descriptor()), built);
}

#[test]
fn test_roundtrips() {
    let source = FakeItem::descriptor();
    for text in [
        "Name eq 'blah'",
        "Number le 3 and DoubleValue gt 1.5",
        "Children/any(y: y/Text eq 'blah')",
        "Children/any(y: y/Descendants/all(z: z/Id gt 1))",
        "Child/Text eq 'a'",
        "Choice eq Tests.Choice'That'",
        "GlobalID ne guid'00000000-0000-0000-0000-000000000000'",
        "substringof('la', Name)",
        "not (Name eq 'a')",
        "DateValue gt datetime'2012-05-06T16:11:00'",
    ] {
        assert_eq!(roundtrip(text, source), text);
    }
}

#[test]
fn test_bound_variable_names_are_normalized() {
    assert_eq!(
        roundtrip("Children/any(c: c/Text eq 'blah')", FakeItem::descriptor()),
        "Children/any(y: y/Text eq 'blah')"
    );
}

#[test]
fn test_correlated_nested_quantifier() {
    let text = "Children/any(a: Children/any(b: b/Text ne a/Text))";
    let expected = Lambda::new(|x| {
        x.clone().member("Children").any(move |y| {
            x.member("Children")
                .any(|z| z.member("Text").ne(y.member("Text")))
        })
    });
    assert_eq!(parser().convert(text, FakeItem::descriptor()).unwrap(), expected);
    assert_eq!(
        roundtrip(text, FakeItem::descriptor()),
        "Children/any(y: Children/any(z: z/Text ne y/Text))"
    );

    let child = |text: &str| ChildItem {
        id: 1,
        text: Some(text.to_owned()),
        descendants: Vec::new(),
    };
    let mut mixed = FakeItem::numbered(4, Some("mixed"));
    mixed.children = vec![child("blah"), child("foo")];
    let mut data = items();
    data.push(mixed);
    assert_eq!(matching(text, &data), vec![4]);
}

#[test]
fn test_evaluated_filters() {
    let data = items();
    assert_eq!(matching("Name eq 'blah'", &data), vec![1]);
    assert_eq!(matching("Number ge 2", &data), vec![2, 3]);
    assert_eq!(matching("Children/any(y: y/Text eq 'blah')", &data), vec![3]);
    assert_eq!(matching("Children/any()", &data), vec![3]);
    assert_eq!(matching("Child/Text eq 'only'", &data), vec![3]);
    assert_eq!(matching("Name eq null", &data), vec![2]);
    assert_eq!(matching("Choice eq Tests.Choice'This'", &data), vec![1, 2, 3]);
}

#[test]
fn test_string_functions_skip_missing_values() {
    let data = items();
    assert_eq!(matching("substringof('la', Name)", &data), vec![1]);
    assert_eq!(matching("not startswith(Name, 'p')", &data), vec![1, 2]);
    assert_eq!(matching("length(Name) eq 6", &data), vec![3]);
}

#[test]
fn test_null_given_name_does_not_match() {
    let people = vec![
        Person::named(None, "Nobody"),
        Person::named(Some("tester"), "Smith"),
        Person::named(Some("other"), "Jones"),
    ];
    let lambda = parser()
        .convert("startswith(GivenName,'test')", Person::descriptor())
        .unwrap();
    let predicate = Predicate::compile(&lambda).unwrap();
    let hits: Vec<&str> = people
        .iter()
        .filter(|p| predicate.matches(*p))
        .map(|p| p.surname.as_str())
        .collect();
    assert_eq!(hits, vec!["Smith"]);
}

#[test]
fn test_zero_guid_literal() {
    let mut data = items();
    data[0].global_id = Uuid::from_u128(7);
    let zero = "guid'00000000-0000-0000-0000-000000000000'";
    assert_eq!(matching(&format!("GlobalID ne {zero}"), &data), vec![1]);
    assert_eq!(matching(&format!("GlobalID eq {zero}"), &data), vec![2, 3]);
}

#[test]
fn test_case_sensitivity() {
    let data = items();
    let source = FakeItem::descriptor();
    assert!(parser().convert("name eq 'BLAH'", source).is_err());
    assert!(matching("Name eq 'BLAH'", &data).is_empty());

    let folding = parser().ignore_case(true);
    let lambda = folding.convert("name eq 'BLAH'", source).unwrap();
    let predicate = Predicate::compile(&lambda).unwrap();
    let hits: Vec<i32> = data
        .iter()
        .filter(|item| predicate.matches(*item))
        .map(|item| item.int_value)
        .collect();
    assert_eq!(hits, vec![1]);
}

#[test]
fn test_invalid_input_is_a_format_error() {
    let source = FakeItem::descriptor();
    for text in [
        "DateValue eq 123",
        "DoubleValue gt blah",
        "Missing eq 1",
        "Name eq",
        "Name eq 'unterminated",
        "",
    ] {
        let err = parser().convert(text, source).unwrap_err();
        assert!(err.is_format(), "{text}: {err}");
    }
    assert!(matches!(
        parser().convert_selector("DoubleValues", source),
        Err(Error::Format(_))
    ));
}

#[test]
fn test_explicit_interface_member() {
    let lambda = parser()
        .convert("EmailAddress eq 'iface@example.com'", &QUERYABLE_USER)
        .unwrap();
    assert_eq!(
        lambda,
        Lambda::new(|x| {
            x.interface_member("Tests.IQueryableUser", "EmailAddress")
                .eq("iface@example.com")
        })
    );

    let predicate = Predicate::compile(&lambda).unwrap();
    let user = User {
        email: "own@example.com".to_owned(),
        interface_email: "iface@example.com".to_owned(),
        age: 30,
    };
    assert!(predicate.matches(&user));
}

#[test]
fn test_derived_interface_member_shadows_base() {
    let lambda = parser().convert("Name eq 5", &NUMBERED).unwrap();
    assert_eq!(
        lambda,
        Lambda::new(|x| x.interface_member("Tests.INumbered", "Name").eq(5))
    );
    assert_eq!(roundtrip("Name eq 5", &NUMBERED), "Name eq 5");
    assert!(parser().convert("Name eq 'five'", &NUMBERED).unwrap_err().is_format());
}
