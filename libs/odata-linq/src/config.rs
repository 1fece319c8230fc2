//! Settings for writing and parsing queries.
//!
//! Settings are plain deserializable values passed explicitly to the writer,
//! the parser and the model filter. A host loads them from its own
//! configuration tree with [`QuerySettings::from_json_section`].

use serde::Deserialize;

use crate::limits::ODataLimits;

/// Configuration error for typed settings.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("query settings must be an object")]
    InvalidStructure,
    #[error("invalid query settings: {source}")]
    InvalidConfig {
        #[source]
        source: serde_json::Error,
    },
}

/// Dialect switches for the expression writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    /// Render string `Contains` as `contains(haystack, needle)` instead of
    /// `substringof(needle, haystack)`.
    pub use_contains_instead_of_substringof: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub use_contains_instead_of_substringof: bool,
    /// Resolve members and compare strings with case folding when parsing.
    pub ignore_case: bool,
    pub limits: ODataLimits,
}

impl QuerySettings {
    #[must_use]
    pub fn writer(&self) -> WriterSettings {
        WriterSettings {
            use_contains_instead_of_substringof: self.use_contains_instead_of_substringof,
        }
    }

    /// Lenient loading: a missing or `null` section yields defaults.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidStructure` when the section is not an
    /// object and `ConfigError::InvalidConfig` when it cannot be deserialized.
    pub fn from_json_section(section: Option<&serde_json::Value>) -> Result<Self, ConfigError> {
        let Some(raw) = section else {
            return Ok(Self::default());
        };
        if raw.is_null() {
            return Ok(Self::default());
        }
        if !raw.is_object() {
            return Err(ConfigError::InvalidStructure);
        }
        serde_json::from_value(raw.clone()).map_err(|e| ConfigError::InvalidConfig { source: e })
    }
}
