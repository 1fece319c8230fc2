//! # odata-linq-macros
//!
//! Derives that describe Rust types to the `odata-linq` type system:
//! - `ODataEntity`: static entity descriptor plus member access for structs
//! - `ODataEnum`: enum descriptor and constant conversion for unit-only enums
//!
//! Generated code refers to `::odata_linq`, which the library re-exports
//! for its own tests.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use proc_macro::TokenStream;
use proc_macro_error2::proc_macro_error;
use syn::{DeriveInput, parse_macro_input};

mod entity;
mod enumeration;

/// Derives `Entity`, `Record` and `ODataType` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use odata_linq::ODataEntity;
///
/// #[derive(ODataEntity)]
/// #[odata(entity = "Tests.FakeItem")]
/// pub struct FakeItem {
///     #[odata(member = "IntValue", data_member = "Number")]
///     pub int_value: i32,
///     pub string_value: Option<String>,
///     #[odata(skip)]
///     pub cached: bool,
/// }
/// ```
///
/// Declared member names default to the `PascalCase` field name and the
/// entity name defaults to the struct name.
#[proc_macro_derive(ODataEntity, attributes(odata))]
#[proc_macro_error]
pub fn derive_odata_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand_derive_odata_entity(&input).into()
}

/// Derives `ODataType` for an enum whose variants carry no data.
///
/// ```ignore
/// #[derive(ODataEnum)]
/// #[odata(namespace = "Tests")]
/// pub enum Choice {
///     This,
///     That,
/// }
/// ```
#[proc_macro_derive(ODataEnum, attributes(odata))]
#[proc_macro_error]
pub fn derive_odata_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    enumeration::expand_derive_odata_enum(&input).into()
}
