#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use odata_linq::model::Entity;
use odata_linq::{Error, ModelFilter, ODataLimits, QuerySettings};
use serde_json::json;

use common::{ChildItem, FakeItem, QUERYABLE_USER, User, parser, resolver};

fn items() -> Vec<FakeItem> {
    let mut parent = FakeItem::numbered(4, Some("parent"));
    parent.child = Some(ChildItem {
        id: 7,
        text: Some("only".to_owned()),
        descendants: Vec::new(),
    });
    parent.children = vec![
        ChildItem {
            id: 1,
            text: Some("blah".to_owned()),
            descendants: Vec::new(),
        },
        ChildItem {
            id: 2,
            text: None,
            descendants: Vec::new(),
        },
    ];
    vec![
        FakeItem::numbered(2, Some("beta")),
        FakeItem::numbered(1, Some("alpha")),
        FakeItem::numbered(3, None),
        parent,
    ]
}

fn model(query: &str) -> odata_linq::Result<ModelFilter> {
    ModelFilter::from_query_string(
        query,
        FakeItem::descriptor(),
        &parser(),
        &ODataLimits::default(),
    )
}

fn numbers(query: &str) -> Vec<i32> {
    let data = items();
    model(query)
        .unwrap()
        .filter(&data)
        .iter()
        .map(|item| item.int_value)
        .collect()
}

#[test]
fn test_filters_use_wire_names() {
    assert_eq!(numbers("$filter=Number+le+2"), vec![2, 1]);
    assert_eq!(numbers("$filter=DoubleValue%20gt%203.0"), vec![3, 4]);
    assert_eq!(numbers("$filter=IntValue+le+2"), vec![2, 1]);
    assert!(model("$filter=Text+le+2").unwrap_err().is_format());
}

#[test]
fn test_collection_and_navigation_filters() {
    assert_eq!(numbers("$filter=Children/any(c:+c/Text+eq+'blah')"), vec![4]);
    assert_eq!(numbers("$filter=Children/all(c:+c/Id+gt+0)"), vec![2, 1, 3, 4]);
    assert_eq!(numbers("$filter=Child/Text+eq+'only'"), vec![4]);
}

#[test]
fn test_ordering_and_paging() {
    assert_eq!(numbers("$orderby=Name"), vec![3, 1, 2, 4]);
    assert_eq!(numbers("$orderby=Number+desc&$skip=1&$top=2"), vec![3, 2]);
    assert_eq!(numbers("$orderby=DoubleValue+asc&$top=0"), Vec::<i32>::new());
}

#[test]
fn test_unrelated_parameters_are_ignored() {
    assert_eq!(numbers("$format=json&$inlinecount=allpages&foo=bar"), vec![2, 1, 3, 4]);
}

#[test]
fn test_projection_with_paths() {
    let data = items();
    let m = model("$filter=Number+ge+3&$select=Name,Child/Text").unwrap();
    let selected: Vec<_> = m.select(&data).iter().map(|r| r.to_json()).collect();
    assert_eq!(
        selected,
        vec![
            json!({ "Name": null, "Child/Text": null }),
            json!({ "Name": "parent", "Child/Text": "only" }),
        ]
    );
}

#[test]
fn test_default_projection_uses_aliases() {
    let data = items();
    let m = model("$filter=Number+eq+1").unwrap();
    let selected = m.select(&data);
    let record = &selected[0];
    assert!(record.get("Number").is_some());
    assert!(record.get("IntValue").is_none());
    assert!(record.get("GlobalID").is_some());
    assert!(record.get("Cached").is_none());
    assert_eq!(record.to_json()["Choice"], json!("This"));
}

#[test]
fn test_limits() {
    let tight = ODataLimits::new()
        .with_max_top(10)
        .with_max_orderby_fields(1)
        .with_max_filter_length(12);
    let build = |query: &str| {
        ModelFilter::from_query_string(query, FakeItem::descriptor(), &parser(), &tight)
    };

    assert!(matches!(build("$top=11"), Err(Error::InvalidLimit)));
    assert!(build("$top=10").is_ok());
    assert!(matches!(build("$orderby=Name,Number"), Err(Error::InvalidOrderByField(_))));
    assert!(matches!(
        build("$filter=Name+eq+'a-long-name'"),
        Err(Error::InvalidFilter(_))
    ));
    assert!(build("$filter=Name+eq+'x'").is_ok());
}

#[test]
fn test_unknown_order_key() {
    let err = model("$orderby=Name,Nope+desc").unwrap_err();
    assert_eq!(err, Error::InvalidOrderByField("Nope".to_owned()));
}

#[test]
fn test_interface_source_reads_explicit_member() {
    let users = vec![
        User {
            email: "iface@example.com".to_owned(),
            interface_email: "other@example.com".to_owned(),
            age: 20,
        },
        User {
            email: "own@example.com".to_owned(),
            interface_email: "iface@example.com".to_owned(),
            age: 40,
        },
    ];
    let m = ModelFilter::from_query_string(
        "$filter=EmailAddress+eq+'iface@example.com'&$orderby=Age",
        &QUERYABLE_USER,
        &parser(),
        &ODataLimits::default(),
    )
    .unwrap();

    let kept = m.filter(&users);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].age, 40);
}

#[test]
fn test_loaded_settings_reach_the_filter() {
    let raw = json!({ "ignore_case": true, "limits": { "max_top": 2 } });
    let settings = QuerySettings::from_json_section(Some(&raw)).unwrap();
    let build = |query: &str| {
        ModelFilter::from_query_string_with_settings(
            query,
            FakeItem::descriptor(),
            resolver(),
            &settings,
        )
    };

    let data = items();
    let m = build("$filter=name+eq+'ALPHA'&$top=2").unwrap();
    let kept: Vec<i32> = m.filter(&data).iter().map(|item| item.int_value).collect();
    assert_eq!(kept, vec![1]);
    assert!(matches!(build("$top=3"), Err(Error::InvalidLimit)));

    let strict = QuerySettings::default();
    let err = ModelFilter::from_query_string_with_settings(
        "$filter=name+eq+'ALPHA'",
        FakeItem::descriptor(),
        resolver(),
        &strict,
    )
    .unwrap_err();
    assert!(err.is_format());
}
