use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::model::EntityType;

/// `$filter` text is form-encoded with these characters left readable.
const FILTER_VERBATIM: &[(&str, &str)] = &[
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%3A", ":"),
    ("%21", "!"),
];

/// Accumulates the query options of one request.
///
/// Repeated filters are conjoined, order keys and expand paths are appended,
/// and paging values are last-write-wins.
#[derive(Debug, Clone)]
pub struct ParameterBuilder {
    service_base: Url,
    source: &'static EntityType,
    filter: Option<String>,
    order_by: Vec<String>,
    select: Option<String>,
    skip: Option<String>,
    take: Option<String>,
    expand: Option<String>,
}

impl ParameterBuilder {
    #[must_use]
    pub fn new(service_base: Url, source: &'static EntityType) -> Self {
        Self {
            service_base,
            source,
            filter: None,
            order_by: Vec::new(),
            select: None,
            skip: None,
            take: None,
            expand: None,
        }
    }

    #[must_use]
    pub fn source(&self) -> &'static EntityType {
        self.source
    }

    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    #[must_use]
    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    #[must_use]
    pub fn select(&self) -> Option<&str> {
        self.select.as_deref()
    }

    #[must_use]
    pub fn skip(&self) -> Option<&str> {
        self.skip.as_deref()
    }

    #[must_use]
    pub fn take(&self) -> Option<&str> {
        self.take.as_deref()
    }

    #[must_use]
    pub fn expand(&self) -> Option<&str> {
        self.expand.as_deref()
    }

    /// Adds a filter clause; an existing clause becomes `(old) and (new)`.
    pub fn add_filter(&mut self, clause: &str) {
        self.filter = Some(match self.filter.take() {
            Some(existing) if !existing.trim().is_empty() => format!("({existing}) and ({clause})"),
            _ => clause.to_owned(),
        });
    }

    pub fn add_order_by(&mut self, key: impl Into<String>) {
        self.order_by.push(key.into());
    }

    pub fn set_select(&mut self, aliases: impl Into<String>) {
        self.select = Some(aliases.into());
    }

    /// Appends one alias to the select list.
    pub fn add_select(&mut self, alias: &str) {
        self.select = Some(match self.select.take() {
            Some(existing) if !existing.is_empty() => format!("{existing},{alias}"),
            _ => alias.to_owned(),
        });
    }

    pub fn set_skip(&mut self, skip: impl ToString) {
        self.skip = Some(skip.to_string());
    }

    pub fn set_take(&mut self, take: impl ToString) {
        self.take = Some(take.to_string());
    }

    pub fn add_expand(&mut self, path: &str) {
        self.expand = Some(match self.expand.take() {
            Some(existing) if !existing.is_empty() => format!("{existing},{path}"),
            _ => path.to_owned(),
        });
    }

    /// Query options in wire order: filter, select, skip, top, orderby, expand.
    #[must_use]
    pub fn query_string(&self) -> String {
        let mut parameters = Vec::new();
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            parameters.push(format!("$filter={}", encode_filter(filter)));
        }
        if let Some(select) = non_blank(self.select.as_deref()) {
            parameters.push(format!("$select={}", encode_plain(select)));
        }
        if let Some(skip) = non_blank(self.skip.as_deref()) {
            parameters.push(format!("$skip={skip}"));
        }
        if let Some(take) = non_blank(self.take.as_deref()) {
            parameters.push(format!("$top={take}"));
        }
        if !self.order_by.is_empty() {
            parameters.push(format!("$orderby={}", encode_plain(&self.order_by.join(","))));
        }
        if let Some(expand) = non_blank(self.expand.as_deref()) {
            parameters.push(format!("$expand={}", encode_plain(expand)));
        }
        parameters.join("&")
    }

    /// The service base with the accumulated options appended to any query
    /// it already carries.
    #[must_use]
    pub fn full_uri(&self) -> String {
        let mut base = self.service_base.clone();
        base.set_fragment(None);
        let existing = base.query().filter(|q| !q.is_empty()).map(str::to_owned);
        base.set_query(None);

        let options = self.query_string();
        match (existing, options.is_empty()) {
            (None, true) => base.to_string(),
            (None, false) => format!("{base}?{options}"),
            (Some(existing), true) => format!("{base}?{existing}"),
            (Some(existing), false) => format!("{base}?{existing}&{options}"),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn encode_filter(filter: &str) -> String {
    let encoded: String = byte_serialize(filter.as_bytes()).collect();
    FILTER_VERBATIM
        .iter()
        .fold(encoded, |acc, (escaped, raw)| acc.replace(escaped, raw))
}

fn encode_plain(value: &str) -> String {
    value.replace(' ', "%20")
}
