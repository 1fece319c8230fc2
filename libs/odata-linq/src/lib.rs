//! # odata-linq
//!
//! Translation between typed expression trees and OData v2/v3 query text.
//!
//! - [`writer::ExpressionWriter`] renders a predicate or selector as `$filter`
//!   or `$orderby` text.
//! - [`parser::FilterParser`] reads `$filter` text back into a tree that
//!   [`eval::Predicate`] can run in memory.
//! - [`query::RestQueryProvider`] executes an operator chain against a
//!   service through a [`query::RestClient`].
//! - [`query::ModelFilter`] applies request query options to in-memory items
//!   on the serving side.
//!
//! Source types are described by [`model::EntityType`] descriptors, usually
//! produced with `#[derive(ODataEntity)]`.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate self as odata_linq;

pub mod config;
pub mod error;
pub mod eval;
pub mod expr;
pub mod limits;
pub mod model;
pub mod parser;
pub mod query;
pub mod resolver;
pub mod writer;

pub use config::{ConfigError, QuerySettings, WriterSettings};
pub use error::{Error, Result};
pub use eval::{Predicate, Selector};
pub use expr::{Expr, Lambda};
pub use limits::ODataLimits;
pub use model::{Entity, EntityType, Literal, Member, ODataType, Record, TypeRef, Value};
pub use parser::FilterParser;
pub use query::{ModelFilter, ParameterBuilder, Query, QueryOp, QueryOutcome, RestClient, RestQueryProvider};
pub use resolver::MemberNameResolver;
pub use writer::ExpressionWriter;

#[cfg(feature = "derive")]
pub use odata_linq_macros::{ODataEntity, ODataEnum};
