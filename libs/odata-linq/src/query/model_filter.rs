//! Server-side application of request query options to in-memory items.
//!
//! A [`ModelFilter`] is built once from the `$filter`, `$orderby`, `$skip`,
//! `$top` and `$select` parameters of a request and then applied to a
//! slice of records. Options run in the order filter, order, skip, top,
//! select. Other parameters are ignored.

use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::config::QuerySettings;
use crate::error::{Error, Result};
use crate::eval::{Predicate, Selector, compare_values};
use crate::limits::ODataLimits;
use crate::model::{EntityType, Literal, MemberRef, Record, Value};
use crate::parser::FilterParser;
use crate::resolver::MemberNameResolver;

/// Parsed query options for one source type.
#[derive(Debug)]
pub struct ModelFilter {
    source: &'static EntityType,
    resolver: Arc<MemberNameResolver>,
    filter: Option<Predicate>,
    order_by: Vec<(Selector, bool)>,
    skip: Option<usize>,
    top: Option<usize>,
    select: Vec<(String, Selector)>,
}

impl ModelFilter {
    /// Reads the options from decoded `(key, value)` pairs.
    ///
    /// # Errors
    /// The first invalid option fails the whole set: `Error::Format` for
    /// malformed filters, paging values and select paths,
    /// `Error::InvalidOrderByField` for unknown order keys and the limit
    /// errors of [`ODataLimits`].
    pub fn from_parameters<'a, I>(
        parameters: I,
        source: &'static EntityType,
        parser: &FilterParser,
        limits: &ODataLimits,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut model = Self {
            source,
            resolver: Arc::clone(parser.resolver()),
            filter: None,
            order_by: Vec::new(),
            skip: None,
            top: None,
            select: Vec::new(),
        };

        for (key, value) in parameters {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "$filter" => {
                    limits.validate_filter(value)?;
                    let lambda = parser.convert(value, source)?;
                    model.filter = Some(Predicate::compile(&lambda)?);
                }
                "$orderby" => model.order_by = parse_order_by(value, source, parser, limits)?,
                "$skip" => model.skip = Some(parse_count("$skip", value)?),
                "$top" => {
                    let top = parse_count("$top", value)?;
                    limits.validate_top(top)?;
                    model.top = Some(top);
                }
                "$select" => {
                    model.select = value
                        .split(',')
                        .map(str::trim)
                        .filter(|path| !path.is_empty())
                        .map(|path| {
                            let (lambda, _) = parser.convert_selector(path, source)?;
                            Ok((path.to_owned(), Selector::compile(&lambda)?))
                        })
                        .collect::<Result<_>>()?;
                }
                _ => {}
            }
        }

        debug!(
            entity = %source.full_name(),
            filtered = model.filter.is_some(),
            order_keys = model.order_by.len(),
            selected = model.select.len(),
            "parsed query options"
        );
        Ok(model)
    }

    /// Reads the options from a raw query string such as
    /// `$filter=Number+le+3&$top=2`.
    ///
    /// # Errors
    /// See [`Self::from_parameters`].
    pub fn from_query_string(
        query: &str,
        source: &'static EntityType,
        parser: &FilterParser,
        limits: &ODataLimits,
    ) -> Result<Self> {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Self::from_parameters(
            pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            source,
            parser,
            limits,
        )
    }

    /// Reads the options from a raw query string with a parser and limits
    /// taken from loaded settings.
    ///
    /// # Errors
    /// See [`Self::from_parameters`].
    pub fn from_query_string_with_settings(
        query: &str,
        source: &'static EntityType,
        resolver: Arc<MemberNameResolver>,
        settings: &QuerySettings,
    ) -> Result<Self> {
        let parser = FilterParser::from_settings(resolver, settings);
        Self::from_query_string(query, source, &parser, &settings.limits)
    }

    #[must_use]
    pub fn source(&self) -> &'static EntityType {
        self.source
    }

    #[must_use]
    pub fn skip(&self) -> Option<usize> {
        self.skip
    }

    #[must_use]
    pub fn top(&self) -> Option<usize> {
        self.top
    }

    /// Applies filter, ordering and paging.
    #[must_use]
    pub fn filter<'r, T: Record>(&self, items: &'r [T]) -> Vec<&'r T> {
        let mut kept: Vec<&'r T> = match &self.filter {
            Some(predicate) => items.iter().filter(|item| predicate.matches(*item)).collect(),
            None => items.iter().collect(),
        };

        if !self.order_by.is_empty() {
            kept.sort_by(|a, b| {
                self.order_by
                    .iter()
                    .map(|(selector, descending)| {
                        let ordering = compare_values(&selector.select(*a), &selector.select(*b));
                        if *descending { ordering.reverse() } else { ordering }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let skip = self.skip.unwrap_or(0).min(kept.len());
        kept.drain(..skip);
        if let Some(top) = self.top {
            kept.truncate(top);
        }
        kept
    }

    /// [`Self::filter`] followed by projection. Without `$select` every
    /// member is projected under its wire alias.
    #[must_use]
    pub fn select<'r, T: Record>(&self, items: &'r [T]) -> Vec<SelectedRecord<'r>> {
        self.filter(items)
            .into_iter()
            .map(|item| self.project(item))
            .collect()
    }

    fn project<'r>(&self, item: &'r dyn Record) -> SelectedRecord<'r> {
        let fields = if self.select.is_empty() {
            item.entity_type()
                .members()
                .into_iter()
                .map(|m| {
                    let value = item.field(&MemberRef::new(m.name())).unwrap_or(Value::NULL);
                    (self.resolver.resolve_name(m), value)
                })
                .collect()
        } else {
            self.select
                .iter()
                .map(|(alias, selector)| (alias.clone(), selector.select(item)))
                .collect()
        };
        SelectedRecord {
            fields,
            resolver: Arc::clone(&self.resolver),
        }
    }
}

fn parse_count(option: &str, value: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| Error::format(format!("{option} value '{value}' is not a non-negative integer")))
}

fn parse_order_by(
    value: &str,
    source: &'static EntityType,
    parser: &FilterParser,
    limits: &ODataLimits,
) -> Result<Vec<(Selector, bool)>> {
    let keys: Vec<&str> = value.split(',').map(str::trim).filter(|k| !k.is_empty()).collect();
    limits.validate_orderby_count(keys.len())?;

    keys.into_iter()
        .map(|key| {
            let (path, descending) = match key.rsplit_once(char::is_whitespace) {
                Some((path, direction)) if direction.eq_ignore_ascii_case("desc") => (path.trim(), true),
                Some((path, direction)) if direction.eq_ignore_ascii_case("asc") => (path.trim(), false),
                _ => (key, false),
            };
            let (lambda, _) = parser
                .convert_selector(path, source)
                .map_err(|_| Error::InvalidOrderByField(path.to_owned()))?;
            Ok((Selector::compile(&lambda)?, descending))
        })
        .collect()
}

/// A projected item: aliases paired with the values they selected.
pub struct SelectedRecord<'r> {
    fields: Vec<(String, Value<'r>)>,
    resolver: Arc<MemberNameResolver>,
}

impl<'r> SelectedRecord<'r> {
    #[must_use]
    pub fn fields(&self) -> &[(String, Value<'r>)] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&Value<'r>> {
        self.fields.iter().find(|(a, _)| a == alias).map(|(_, v)| v)
    }

    /// JSON object keyed by alias; nested records use their members' wire aliases.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(alias, value)| (alias.clone(), value_to_json(value, &self.resolver)))
                .collect(),
        )
    }
}

impl std::fmt::Debug for SelectedRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|(a, v)| (a, v)))
            .finish()
    }
}

fn value_to_json(value: &Value<'_>, resolver: &MemberNameResolver) -> serde_json::Value {
    match value {
        Value::Scalar(literal) => literal_to_json(literal),
        Value::Record(record) => serde_json::Value::Object(
            record
                .entity_type()
                .members()
                .into_iter()
                .map(|m| {
                    let field = record.field(&MemberRef::new(m.name())).unwrap_or(Value::NULL);
                    (resolver.resolve_name(m), value_to_json(&field, resolver))
                })
                .collect(),
        ),
        Value::Collection(items) => {
            serde_json::Value::Array(items.iter().map(|v| value_to_json(v, resolver)).collect())
        }
    }
}

fn literal_to_json(literal: &Literal) -> serde_json::Value {
    use serde_json::Value as Json;
    match literal {
        Literal::Null => Json::Null,
        Literal::Bool(b) => Json::Bool(*b),
        Literal::Byte(v) => Json::from(*v),
        Literal::SByte(v) => Json::from(*v),
        Literal::Int16(v) => Json::from(*v),
        Literal::Int32(v) => Json::from(*v),
        Literal::Int64(v) => Json::from(*v),
        Literal::UInt16(v) => Json::from(*v),
        Literal::UInt32(v) => Json::from(*v),
        Literal::UInt64(v) => Json::from(*v),
        Literal::Single(v) => serde_json::Number::from_f64(f64::from(*v)).map_or(Json::Null, Json::Number),
        Literal::Double(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Literal::Decimal(v) => Json::String(v.to_string()),
        Literal::String(s) => Json::String(s.clone()),
        Literal::Guid(g) => Json::String(g.to_string()),
        Literal::DateTime(dt) => Json::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Literal::DateTimeOffset(dt) => Json::String(dt.to_rfc3339()),
        Literal::Enum(e) => Json::String(e.member.clone()),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::{Member, TypeRef};
    use serde_json::json;
    use std::sync::LazyLock;

    static ITEM: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::structure("Tests.Row")
            .member(Member::new("Name", TypeRef::String))
            .member(Member::new("Number", TypeRef::Int32).data_member("Num"))
    });

    struct Row {
        name: Option<&'static str>,
        number: i32,
    }

    impl Record for Row {
        fn entity_type(&self) -> &'static EntityType {
            &ITEM
        }

        fn field(&self, member: &MemberRef) -> Option<Value<'_>> {
            match member.name.as_str() {
                "Name" => Some(Value::Scalar(self.name.into())),
                "Number" => Some(Value::Scalar(Literal::Int32(self.number))),
                _ => None,
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { name: Some("c"), number: 3 },
            Row { name: Some("a"), number: 1 },
            Row { name: None, number: 2 },
            Row { name: Some("b"), number: 1 },
        ]
    }

    fn model(query: &str) -> Result<ModelFilter> {
        let parser = FilterParser::new(Arc::new(MemberNameResolver::new()));
        ModelFilter::from_query_string(query, &ITEM, &parser, &ODataLimits::default())
    }

    fn numbers(items: &[&Row]) -> Vec<i32> {
        items.iter().map(|r| r.number).collect()
    }

    #[test]
    fn test_filter_and_order() {
        let data = rows();
        let m = model("$filter=Num+le+2&$orderby=Num+desc,Name").unwrap();
        let kept = m.filter(&data);
        assert_eq!(numbers(&kept), vec![2, 1, 1]);
        assert_eq!(kept[1].name, Some("a"));
    }

    #[test]
    fn test_null_string_is_guarded() {
        let data = rows();
        let m = model("$filter=startswith(Name,'a')").unwrap();
        assert_eq!(numbers(&m.filter(&data)), vec![1]);
    }

    #[test]
    fn test_paging() {
        let data = rows();
        let m = model("$orderby=Num&$skip=1&$top=2").unwrap();
        assert_eq!(numbers(&m.filter(&data)), vec![1, 2]);
        let m = model("$skip=10").unwrap();
        assert!(m.filter(&data).is_empty());
    }

    #[test]
    fn test_empty_filter_is_ignored() {
        let data = rows();
        let m = model("$filter=&$top=").unwrap();
        assert_eq!(m.filter(&data).len(), 4);
    }

    #[test]
    fn test_select_projects_aliases() {
        let data = rows();
        let m = model("$filter=Num+eq+3&$select=Num").unwrap();
        let selected = m.select(&data);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].to_json(), json!({ "Num": 3 }));
    }

    #[test]
    fn test_select_defaults_to_all_members() {
        let data = rows();
        let m = model("$filter=Num+eq+2").unwrap();
        assert_eq!(m.select(&data)[0].to_json(), json!({ "Name": null, "Num": 2 }));
    }

    #[test]
    fn test_invalid_options() {
        assert!(matches!(model("$orderby=Missing"), Err(Error::InvalidOrderByField(p)) if p == "Missing"));
        assert!(matches!(model("$top=abc"), Err(Error::Format(_))));
        assert!(matches!(model("$skip=-1"), Err(Error::Format(_))));
        assert!(matches!(model("$top=5000"), Err(Error::InvalidLimit)));
        assert!(model("$select=Missing").unwrap_err().is_format());
        assert!(model("$filter=Num+eq+'x'").unwrap_err().is_format());
        assert!(model("$filter=Num+eq+1&$top=x").is_err());
    }
}
