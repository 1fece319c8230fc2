#![allow(dead_code, clippy::unwrap_used)]

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::{Cursor, Read};
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use odata_linq::model::{
    EntityRef, EntityType, Literal, Member, MemberRef, Record, TypeRef, Value,
};
use odata_linq::{
    ExpressionWriter, FilterParser, MemberNameResolver, ODataEntity, ODataEnum, RestClient,
    WriterSettings,
};

#[derive(ODataEnum, Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[odata(namespace = "Tests")]
pub enum Choice {
    #[default]
    This,
    That,
}

#[derive(ODataEntity, Clone, Debug, Default, Deserialize, PartialEq)]
#[odata(entity = "Tests.ChildItem")]
#[serde(rename_all = "PascalCase", default)]
pub struct ChildItem {
    pub id: i32,
    pub text: Option<String>,
    pub descendants: Vec<ChildItem>,
}

#[derive(ODataEntity, Clone, Debug, Default, Deserialize, PartialEq)]
#[odata(entity = "Tests.FakeItem")]
#[serde(rename_all = "PascalCase", default)]
pub struct FakeItem {
    #[odata(member = "IntValue", data_member = "Number")]
    #[serde(rename = "Number")]
    pub int_value: i32,
    pub double_value: f64,
    pub decimal_value: Decimal,
    pub string_value: Option<String>,
    pub name: Option<String>,
    pub date_value: NaiveDateTime,
    #[odata(member = "GlobalID")]
    #[serde(rename = "GlobalID")]
    pub global_id: Uuid,
    pub choice: Choice,
    pub child: Option<ChildItem>,
    pub children: Vec<ChildItem>,
    #[odata(skip)]
    #[serde(skip)]
    pub cached: bool,
}

impl FakeItem {
    pub fn numbered(number: i32, name: Option<&str>) -> Self {
        Self {
            int_value: number,
            double_value: f64::from(number) * 1.5,
            name: name.map(str::to_owned),
            ..Self::default()
        }
    }
}

#[derive(ODataEntity, Clone, Debug, Default)]
#[odata(entity = "Tests.Person")]
pub struct Person {
    pub given_name: Option<String>,
    pub surname: String,
}

impl Person {
    pub fn named(given_name: Option<&str>, surname: &str) -> Self {
        Self {
            given_name: given_name.map(str::to_owned),
            surname: surname.to_owned(),
        }
    }
}

/// Interface view whose `EmailAddress` is implemented explicitly by [`User`].
pub static QUERYABLE_USER: LazyLock<EntityType> = LazyLock::new(|| {
    EntityType::interface("Tests.IQueryableUser")
        .member(Member::new("EmailAddress", TypeRef::String))
        .member(Member::new("Age", TypeRef::Int32))
});

pub static NAMED: LazyLock<EntityType> = LazyLock::new(|| {
    EntityType::interface("Tests.INamed").member(Member::new("Name", TypeRef::String))
});

/// Redeclares `Name` with a different type than the interface it extends.
pub static NUMBERED: LazyLock<EntityType> = LazyLock::new(|| {
    EntityType::interface("Tests.INumbered")
        .member(Member::new("Name", TypeRef::Int32))
        .implements(EntityRef::lazy(|| &NAMED))
});

pub static USER: LazyLock<EntityType> = LazyLock::new(|| {
    EntityType::structure("Tests.User")
        .member(Member::new("EmailAddress", TypeRef::String))
        .member(Member::new("Age", TypeRef::Int32))
});

pub struct User {
    pub email: String,
    pub interface_email: String,
    pub age: i32,
}

impl Record for User {
    fn entity_type(&self) -> &'static EntityType {
        &USER
    }

    fn field(&self, member: &MemberRef) -> Option<Value<'_>> {
        if member.is("Tests.IQueryableUser", "EmailAddress") {
            return Some(Value::Scalar(Literal::String(self.interface_email.clone())));
        }
        match member.name.as_str() {
            "EmailAddress" => Some(Value::Scalar(Literal::String(self.email.clone()))),
            "Age" => Some(Value::Scalar(Literal::Int32(self.age))),
            _ => None,
        }
    }
}

pub fn resolver() -> Arc<MemberNameResolver> {
    Arc::new(MemberNameResolver::new())
}

pub fn writer() -> ExpressionWriter {
    ExpressionWriter::new(resolver())
}

pub fn contains_writer() -> ExpressionWriter {
    ExpressionWriter::new(resolver()).with_settings(WriterSettings {
        use_contains_instead_of_substringof: true,
    })
}

pub fn parser() -> FilterParser {
    FilterParser::new(resolver())
}

/// Client that records every request and answers with a fixed body.
#[derive(Clone, Default)]
pub struct RecordingClient {
    pub requests: Arc<Mutex<Vec<(String, String)>>>,
    pub response: String,
}

impl RecordingClient {
    pub fn answering(response: &str) -> Self {
        Self {
            requests: Arc::default(),
            response: response.to_owned(),
        }
    }

    pub fn uris(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(_, uri)| uri.clone()).collect()
    }

    fn respond(&self, method: &str, uri: &str) -> Box<dyn Read + Send> {
        self.requests.lock().push((method.to_owned(), uri.to_owned()));
        Box::new(Cursor::new(self.response.clone().into_bytes()))
    }
}

impl RestClient for RecordingClient {
    fn get(&self, uri: &str) -> odata_linq::Result<Box<dyn Read + Send>> {
        Ok(self.respond("GET", uri))
    }

    fn post(&self, uri: &str, _body: &[u8]) -> odata_linq::Result<Box<dyn Read + Send>> {
        Ok(self.respond("POST", uri))
    }

    fn put(&self, uri: &str, _body: &[u8]) -> odata_linq::Result<Box<dyn Read + Send>> {
        Ok(self.respond("PUT", uri))
    }

    fn delete(&self, uri: &str) -> odata_linq::Result<Box<dyn Read + Send>> {
        Ok(self.respond("DELETE", uri))
    }
}
