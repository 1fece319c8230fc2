//! Executes operator chains against an OData endpoint.

use serde::de::DeserializeOwned;
use std::io::Read;
use tracing::debug;
use url::Url;

use super::ops::Query;
use super::parameter_builder::ParameterBuilder;
use super::processor::{ExpressionProcessor, QueryOutcome};
use crate::error::{Error, Result};
use crate::model::Entity;
use crate::writer::ExpressionWriter;

/// Transport collaborator. Implementations own connection handling and
/// authentication; the provider only hands them finished URIs.
pub trait RestClient: Send + Sync {
    /// # Errors
    /// `Error::Transport` when the request cannot be completed.
    fn get(&self, uri: &str) -> Result<Box<dyn Read + Send>>;

    /// # Errors
    /// `Error::Transport` when the request cannot be completed.
    fn post(&self, uri: &str, body: &[u8]) -> Result<Box<dyn Read + Send>>;

    /// # Errors
    /// `Error::Transport` when the request cannot be completed.
    fn put(&self, uri: &str, body: &[u8]) -> Result<Box<dyn Read + Send>>;

    /// # Errors
    /// `Error::Transport` when the request cannot be completed.
    fn delete(&self, uri: &str) -> Result<Box<dyn Read + Send>>;
}

/// Turns a response body into typed items.
pub trait Serializer: Send + Sync {
    /// # Errors
    /// `Error::Serialization` on malformed payloads.
    fn deserialize_list<T: DeserializeOwned, R: Read>(&self, reader: R) -> Result<Vec<T>>;
}

/// JSON payloads: a bare array, the verbose `{"d":{"results":[..]}}` and
/// `{"d":[..]}` envelopes, or a `{"value":[..]}` envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn deserialize_list<T: DeserializeOwned, R: Read>(&self, reader: R) -> Result<Vec<T>> {
        let payload: serde_json::Value =
            serde_json::from_reader(reader).map_err(|e| Error::Serialization(e.to_string()))?;
        let items = match payload {
            serde_json::Value::Object(mut envelope) => {
                let inner = envelope
                    .remove("d")
                    .or_else(|| envelope.remove("value"))
                    .ok_or_else(|| {
                        Error::Serialization("response object carries no result set".to_owned())
                    })?;
                match inner {
                    serde_json::Value::Object(mut verbose) => {
                        verbose.remove("results").ok_or_else(|| {
                            Error::Serialization("response envelope carries no results".to_owned())
                        })?
                    }
                    other => other,
                }
            }
            other => other,
        };
        serde_json::from_value(items).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// HTTP verb used for query requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestMethod {
    #[default]
    Get,
    Post(Vec<u8>),
    Put(Vec<u8>),
    Delete,
}

impl RequestMethod {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post(_) => "POST",
            Self::Put(_) => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

pub struct RestQueryProvider<C, S = JsonSerializer> {
    client: C,
    serializer: S,
    processor: ExpressionProcessor,
    service_base: Url,
    method: RequestMethod,
}

impl<C: RestClient, S: Serializer> RestQueryProvider<C, S> {
    #[must_use]
    pub fn new(client: C, serializer: S, service_base: Url, writer: ExpressionWriter) -> Self {
        Self {
            client,
            serializer,
            processor: ExpressionProcessor::new(writer),
            service_base,
            method: RequestMethod::Get,
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    #[must_use]
    pub fn service_base(&self) -> &Url {
        &self.service_base
    }

    /// Translates `query` against `T`'s descriptor, performs one request
    /// and finishes any untranslatable tail in memory.
    ///
    /// # Errors
    /// Translation, transport and serialization failures.
    pub fn execute<T>(&self, query: &Query) -> Result<QueryOutcome<T>>
    where
        T: DeserializeOwned + Entity,
    {
        let mut builder = ParameterBuilder::new(self.service_base.clone(), T::descriptor());
        self.processor
            .process(query.ops(), &mut builder, |parameters| self.load(parameters))
    }

    /// Convenience wrapper for chains that end in a sequence.
    ///
    /// # Errors
    /// See [`Self::execute`]; `Error::Argument` when the chain ends in a
    /// scalar terminal.
    pub fn list<T>(&self, query: &Query) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Entity,
    {
        self.execute(query)?.into_items().ok_or_else(|| {
            Error::Argument("query ends in a terminal operator".to_owned())
        })
    }

    fn load<T: DeserializeOwned>(&self, parameters: &ParameterBuilder) -> Result<Vec<T>> {
        let uri = parameters.full_uri();
        debug!(method = self.method.name(), uri = %uri, "executing query");
        let body = match &self.method {
            RequestMethod::Get => self.client.get(&uri)?,
            RequestMethod::Post(payload) => self.client.post(&uri, payload)?,
            RequestMethod::Put(payload) => self.client.put(&uri, payload)?,
            RequestMethod::Delete => self.client.delete(&uri)?,
        };
        self.serializer.deserialize_list(body)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        name: String,
    }

    fn parse(payload: &str) -> Result<Vec<Named>> {
        JsonSerializer.deserialize_list(payload.as_bytes())
    }

    #[test]
    fn test_bare_array() {
        let items = parse(r#"[{"name":"a"},{"name":"b"}]"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_envelopes() {
        assert_eq!(parse(r#"{"d":{"results":[{"name":"a"}]}}"#).unwrap()[0].name, "a");
        assert_eq!(parse(r#"{"d":[{"name":"b"}]}"#).unwrap()[0].name, "b");
        assert_eq!(parse(r#"{"value":[{"name":"c"}]}"#).unwrap()[0].name, "c");
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(parse("{"), Err(Error::Serialization(_))));
        assert!(matches!(parse(r#"{"other":[]}"#), Err(Error::Serialization(_))));
        assert!(matches!(parse(r#"[{"title":"x"}]"#), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_method_names() {
        assert_eq!(RequestMethod::default().name(), "GET");
        assert_eq!(RequestMethod::Post(Vec::new()).name(), "POST");
    }
}
