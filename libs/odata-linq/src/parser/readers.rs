//! Literal token readers.
//!
//! Each reader accepts exactly one literal grammar and fails with a format
//! error otherwise. Untyped tokens go through [`read_literal`], which tries
//! the readers in cascade order; tokens whose target type is known go
//! through [`read_as`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{EnumRef, EnumValue, Literal, LiteralKind, TypeRef};

pub trait LiteralReader: Send + Sync {
    /// # Errors
    /// `Error::Format` when `token` does not match this reader's grammar.
    fn read(&self, token: &str) -> Result<Literal>;
}

fn unreadable(token: &str, what: &str) -> Error {
    Error::format(format!("Could not read '{token}' as {what}"))
}

/// Inner text of `prefix'...'`, prefix matched case-insensitively.
fn prefixed_quoted<'t>(token: &'t str, prefix: &str) -> Option<&'t str> {
    let head = token.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    token
        .get(prefix.len()..)?
        .strip_prefix('\'')?
        .strip_suffix('\'')
}

fn looks_numeric(token: &str) -> bool {
    let body = token.strip_prefix(['-', '+']).unwrap_or(token);
    body.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

pub struct BooleanReader;

impl LiteralReader for BooleanReader {
    fn read(&self, token: &str) -> Result<Literal> {
        if token.eq_ignore_ascii_case("true") {
            Ok(Literal::Bool(true))
        } else if token.eq_ignore_ascii_case("false") {
            Ok(Literal::Bool(false))
        } else {
            Err(unreadable(token, "Boolean"))
        }
    }
}

pub struct GuidReader;

impl LiteralReader for GuidReader {
    fn read(&self, token: &str) -> Result<Literal> {
        prefixed_quoted(token, "guid")
            .and_then(|inner| Uuid::parse_str(inner).ok())
            .map(Literal::Guid)
            .ok_or_else(|| unreadable(token, "Guid"))
    }
}

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Splits a trailing `Z` or `+hh:mm`/`-hh:mm` designator off a timestamp.
fn split_offset(text: &str) -> (&str, Option<FixedOffset>) {
    if let Some(rest) = text.strip_suffix(['Z', 'z']) {
        return (rest, FixedOffset::east_opt(0));
    }
    let Some(idx) = text.len().checked_sub(6) else {
        return (text, None);
    };
    let Some(tail) = text.get(idx..) else {
        return (text, None);
    };
    let sign = match tail.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return (text, None),
    };
    if !text.contains('T') || tail.as_bytes().get(3) != Some(&b':') {
        return (text, None);
    }
    let hours = tail.get(1..3).and_then(|h| h.parse::<i32>().ok());
    let minutes = tail.get(4..6).and_then(|m| m.parse::<i32>().ok());
    match (hours, minutes) {
        (Some(h), Some(m)) => (
            &text[..idx],
            FixedOffset::east_opt(sign * (h * 3600 + m * 60)),
        ),
        _ => (text, None),
    }
}

pub struct DateTimeOffsetReader;

impl DateTimeOffsetReader {
    fn parse(text: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(value) = DateTime::parse_from_rfc3339(text) {
            return Some(value);
        }
        let (local, offset) = split_offset(text);
        let naive = parse_naive(local)?;
        let offset = offset.or_else(|| FixedOffset::east_opt(0))?;
        naive.and_local_timezone(offset).single()
    }
}

impl LiteralReader for DateTimeOffsetReader {
    fn read(&self, token: &str) -> Result<Literal> {
        prefixed_quoted(token, "datetimeoffset")
            .and_then(Self::parse)
            .map(Literal::DateTimeOffset)
            .ok_or_else(|| unreadable(token, "DateTimeOffset"))
    }
}

pub struct DateTimeReader;

impl LiteralReader for DateTimeReader {
    fn read(&self, token: &str) -> Result<Literal> {
        prefixed_quoted(token, "datetime")
            .and_then(|inner| parse_naive(inner.strip_suffix(['Z', 'z']).unwrap_or(inner)))
            .map(Literal::DateTime)
            .ok_or_else(|| unreadable(token, "DateTime"))
    }
}

/// Reader for one integer width. `Int64` also accepts an `L` suffix.
pub struct IntegerReader {
    kind: LiteralKind,
}

impl IntegerReader {
    #[must_use]
    pub const fn new(kind: LiteralKind) -> Self {
        Self { kind }
    }
}

impl LiteralReader for IntegerReader {
    fn read(&self, token: &str) -> Result<Literal> {
        let err = || unreadable(token, &format!("{:?}", self.kind));
        let digits = if self.kind == LiteralKind::Int64 {
            token.strip_suffix(['L', 'l']).unwrap_or(token)
        } else {
            token
        };
        if !looks_numeric(digits) {
            return Err(err());
        }
        let value: i128 = digits.parse().map_err(|_| err())?;
        let literal = match self.kind {
            LiteralKind::Byte => u8::try_from(value).ok().map(Literal::Byte),
            LiteralKind::SByte => i8::try_from(value).ok().map(Literal::SByte),
            LiteralKind::Int16 => i16::try_from(value).ok().map(Literal::Int16),
            LiteralKind::Int32 => i32::try_from(value).ok().map(Literal::Int32),
            LiteralKind::Int64 => i64::try_from(value).ok().map(Literal::Int64),
            LiteralKind::UInt16 => u16::try_from(value).ok().map(Literal::UInt16),
            LiteralKind::UInt32 => u32::try_from(value).ok().map(Literal::UInt32),
            LiteralKind::UInt64 => u64::try_from(value).ok().map(Literal::UInt64),
            _ => None,
        };
        literal.ok_or_else(err)
    }
}

/// Accepts plain or exponent notation with an optional `d`/`D` suffix.
pub struct DoubleReader;

impl LiteralReader for DoubleReader {
    fn read(&self, token: &str) -> Result<Literal> {
        let body = token.strip_suffix(['d', 'D']).unwrap_or(token);
        if !looks_numeric(body) {
            return Err(unreadable(token, "Double"));
        }
        body.parse::<f64>()
            .map(Literal::Double)
            .map_err(|_| unreadable(token, "Double"))
    }
}

pub struct SingleReader;

impl LiteralReader for SingleReader {
    fn read(&self, token: &str) -> Result<Literal> {
        let body = token.strip_suffix(['f', 'F']).unwrap_or(token);
        if !looks_numeric(body) {
            return Err(unreadable(token, "Single"));
        }
        body.parse::<f32>()
            .map(Literal::Single)
            .map_err(|_| unreadable(token, "Single"))
    }
}

pub struct DecimalReader;

impl LiteralReader for DecimalReader {
    fn read(&self, token: &str) -> Result<Literal> {
        let body = token.strip_suffix(['m', 'M']).unwrap_or(token);
        if !looks_numeric(body) {
            return Err(unreadable(token, "Decimal"));
        }
        Decimal::from_str(body)
            .or_else(|_| Decimal::from_scientific(body))
            .map(Literal::Decimal)
            .map_err(|_| unreadable(token, "Decimal"))
    }
}

/// Numeric family for untyped tokens: the suffix decides, then the shape.
pub struct NumericReader;

impl LiteralReader for NumericReader {
    fn read(&self, token: &str) -> Result<Literal> {
        if !looks_numeric(token) {
            return Err(unreadable(token, "a number"));
        }
        match token.as_bytes().last() {
            Some(b'L' | b'l') => return IntegerReader::new(LiteralKind::Int64).read(token),
            Some(b'm' | b'M') => return DecimalReader.read(token),
            Some(b'f' | b'F') => return SingleReader.read(token),
            Some(b'd' | b'D') => return DoubleReader.read(token),
            _ => {}
        }
        if token.contains(['.', 'e', 'E']) {
            return DoubleReader.read(token);
        }
        [LiteralKind::Int32, LiteralKind::Int64, LiteralKind::UInt64]
            .into_iter()
            .find_map(|kind| IntegerReader::new(kind).read(token).ok())
            .ok_or_else(|| unreadable(token, "a number"))
    }
}

pub struct StringReader;

impl LiteralReader for StringReader {
    fn read(&self, token: &str) -> Result<Literal> {
        let inner = token
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .filter(|_| token.len() >= 2)
            .ok_or_else(|| unreadable(token, "String"))?;
        if inner.replace("''", "").contains('\'') {
            return Err(unreadable(token, "String"));
        }
        Ok(Literal::String(inner.replace("''", "'")))
    }
}

/// `Namespace.Type'Member'`; validated against the descriptor when one is known.
pub struct EnumReader {
    target: Option<EnumRef>,
}

impl EnumReader {
    #[must_use]
    pub const fn untyped() -> Self {
        Self { target: None }
    }

    #[must_use]
    pub const fn of(target: EnumRef) -> Self {
        Self {
            target: Some(target),
        }
    }
}

impl LiteralReader for EnumReader {
    fn read(&self, token: &str) -> Result<Literal> {
        let err = || unreadable(token, "an enum value");
        let quote = token.find('\'').ok_or_else(err)?;
        let type_name = &token[..quote];
        let member = token[quote..]
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .ok_or_else(err)?;
        if type_name.is_empty()
            || member.is_empty()
            || !type_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
        {
            return Err(err());
        }
        if let Some(target) = self.target {
            let ty = target.get();
            let name_matches =
                ty.full_name() == type_name || ty.full_name().rsplit('.').next() == Some(type_name);
            if !name_matches || !ty.has_member(member) {
                return Err(err());
            }
            return Ok(Literal::Enum(EnumValue::new(ty.full_name(), member)));
        }
        Ok(Literal::Enum(EnumValue::new(type_name, member)))
    }
}

pub struct NullReader;

impl LiteralReader for NullReader {
    fn read(&self, token: &str) -> Result<Literal> {
        if token == "null" {
            Ok(Literal::Null)
        } else {
            Err(unreadable(token, "null"))
        }
    }
}

static CASCADE: &[&dyn LiteralReader] = &[
    &BooleanReader,
    &GuidReader,
    &DateTimeOffsetReader,
    &DateTimeReader,
    &NumericReader,
    &StringReader,
    &EnumReader::untyped(),
    &NullReader,
];

/// Reads a token whose type is not known from context.
///
/// # Errors
/// `Error::Format` when no reader accepts the token.
pub fn read_literal(token: &str) -> Result<Literal> {
    CASCADE
        .iter()
        .find_map(|r| r.read(token).ok())
        .ok_or_else(|| Error::format(format!("Could not read '{token}' as a literal value")))
}

/// Reads a token as a value of `ty`; `null` is accepted for every type.
///
/// # Errors
/// `Error::Format` when the token is not a valid literal of `ty`.
pub fn read_as(ty: &TypeRef, token: &str) -> Result<Literal> {
    if token == "null" {
        return Ok(Literal::Null);
    }
    match ty.underlying() {
        TypeRef::Bool => BooleanReader.read(token),
        TypeRef::Byte => IntegerReader::new(LiteralKind::Byte).read(token),
        TypeRef::SByte => IntegerReader::new(LiteralKind::SByte).read(token),
        TypeRef::Int16 => IntegerReader::new(LiteralKind::Int16).read(token),
        TypeRef::Int32 => IntegerReader::new(LiteralKind::Int32).read(token),
        TypeRef::Int64 => IntegerReader::new(LiteralKind::Int64).read(token),
        TypeRef::UInt16 => IntegerReader::new(LiteralKind::UInt16).read(token),
        TypeRef::UInt32 => IntegerReader::new(LiteralKind::UInt32).read(token),
        TypeRef::UInt64 => IntegerReader::new(LiteralKind::UInt64).read(token),
        TypeRef::Single => SingleReader.read(token),
        TypeRef::Double => DoubleReader.read(token),
        TypeRef::Decimal => DecimalReader.read(token),
        TypeRef::String => StringReader.read(token),
        TypeRef::Guid => GuidReader.read(token),
        TypeRef::DateTime => DateTimeReader.read(token),
        TypeRef::DateTimeOffset => DateTimeOffsetReader.read(token),
        TypeRef::Enum(target) => EnumReader::of(*target).read(token),
        other => Err(unreadable(token, &other.to_string())),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::EnumType;
    use chrono::{Datelike, Timelike};
    use std::sync::LazyLock;

    static CHOICE: LazyLock<EnumType> =
        LazyLock::new(|| EnumType::new("Tests.Choice", ["This", "That"]));

    #[test]
    fn test_double_reader_accepts_suffixes() {
        assert_eq!(DoubleReader.read("1.23").unwrap(), Literal::Double(1.23));
        assert_eq!(DoubleReader.read("1.23d").unwrap(), Literal::Double(1.23));
        assert_eq!(DoubleReader.read("1.23D").unwrap(), Literal::Double(1.23));
        assert_eq!(DoubleReader.read("64").unwrap(), Literal::Double(64.0));
    }

    #[test]
    fn test_double_reader_rejects_words() {
        assert!(DoubleReader.read("blah").unwrap_err().is_format());
        assert!(DoubleReader.read("inf").is_err());
    }

    #[test]
    fn test_integer_readers_check_range() {
        assert_eq!(
            IntegerReader::new(LiteralKind::Byte).read("255").unwrap(),
            Literal::Byte(255)
        );
        assert!(IntegerReader::new(LiteralKind::Byte).read("256").is_err());
        assert!(IntegerReader::new(LiteralKind::Int32).read("1.5").is_err());
        assert_eq!(
            IntegerReader::new(LiteralKind::Int64).read("5L").unwrap(),
            Literal::Int64(5)
        );
        assert_eq!(
            IntegerReader::new(LiteralKind::UInt64).read("123").unwrap(),
            Literal::UInt64(123)
        );
    }

    #[test]
    fn test_decimal_and_single() {
        assert_eq!(
            DecimalReader.read("1.23m").unwrap(),
            Literal::Decimal(Decimal::new(123, 2))
        );
        assert_eq!(SingleReader.read("1.5f").unwrap(), Literal::Single(1.5));
    }

    #[test]
    fn test_string_reader_unescapes() {
        assert_eq!(StringReader.read("'O''Neil'").unwrap(), Literal::from("O'Neil"));
        assert_eq!(StringReader.read("''").unwrap(), Literal::from(""));
        assert!(StringReader.read("'").is_err());
        assert!(StringReader.read("blah").is_err());
    }

    #[test]
    fn test_guid_reader() {
        let lit = GuidReader
            .read("guid'00000000-0000-0000-0000-000000000000'")
            .unwrap();
        assert_eq!(lit, Literal::Guid(Uuid::nil()));
        assert!(GuidReader.read("guid'nope'").is_err());
    }

    #[test]
    fn test_date_time_offset_full_form() {
        let Literal::DateTimeOffset(v) = DateTimeOffsetReader
            .read("datetimeoffset'2012-05-06T16:11:00+02:00'")
            .unwrap()
        else {
            panic!("expected offset value");
        };
        assert_eq!(v.offset().local_minus_utc(), 7200);
        assert_eq!(v.hour(), 16);
    }

    #[test]
    fn test_date_time_offset_short_forms_default_to_utc() {
        let Literal::DateTimeOffset(day) =
            DateTimeOffsetReader.read("datetimeoffset'2023-07-01'").unwrap()
        else {
            panic!("expected offset value");
        };
        assert_eq!((day.year(), day.month(), day.day()), (2023, 7, 1));
        assert_eq!(day.offset().local_minus_utc(), 0);

        let Literal::DateTimeOffset(minute) = DateTimeOffsetReader
            .read("datetimeoffset'2023-07-01T08:00'")
            .unwrap()
        else {
            panic!("expected offset value");
        };
        assert_eq!(minute.hour(), 8);
    }

    #[test]
    fn test_date_time_offset_fraction_and_minute_offset() {
        let Literal::DateTimeOffset(v) = DateTimeOffsetReader
            .read("datetimeoffset'2023-07-01T08:00-05:00'")
            .unwrap()
        else {
            panic!("expected offset value");
        };
        assert_eq!(v.offset().local_minus_utc(), -5 * 3600);
        assert!(
            DateTimeOffsetReader
                .read("datetimeoffset'2023-07-01T08:00:00.125Z'")
                .is_ok()
        );
    }

    #[test]
    fn test_date_time_reader() {
        let Literal::DateTime(v) = DateTimeReader.read("datetime'2012-05-06T16:11:00'").unwrap()
        else {
            panic!("expected date time");
        };
        assert_eq!(v.minute(), 11);
        assert!(DateTimeReader.read("123").is_err());
    }

    #[test]
    fn test_enum_reader_validates_members() {
        let reader = EnumReader::of(EnumRef(|| &CHOICE));
        assert_eq!(
            reader.read("Tests.Choice'That'").unwrap(),
            Literal::Enum(EnumValue::new("Tests.Choice", "That"))
        );
        assert!(reader.read("Tests.Choice'Other'").is_err());
        assert!(reader.read("Tests.Other'That'").is_err());
    }

    #[test]
    fn test_cascade_order() {
        assert_eq!(read_literal("true").unwrap(), Literal::Bool(true));
        assert_eq!(read_literal("123").unwrap(), Literal::Int32(123));
        assert_eq!(read_literal("5000000000").unwrap(), Literal::Int64(5_000_000_000));
        assert_eq!(read_literal("1.5").unwrap(), Literal::Double(1.5));
        assert_eq!(read_literal("'123'").unwrap(), Literal::from("123"));
        assert_eq!(read_literal("null").unwrap(), Literal::Null);
        assert!(matches!(
            read_literal("Tests.Choice'That'").unwrap(),
            Literal::Enum(_)
        ));
        assert!(read_literal("blah").unwrap_err().is_format());
    }

    #[test]
    fn test_read_as_uses_target_type() {
        assert_eq!(read_as(&TypeRef::Double, "64").unwrap(), Literal::Double(64.0));
        assert_eq!(read_as(&TypeRef::Int32, "3").unwrap(), Literal::Int32(3));
        assert!(read_as(&TypeRef::DateTime, "123").is_err());
        assert_eq!(read_as(&TypeRef::String, "null").unwrap(), Literal::Null);
    }
}
