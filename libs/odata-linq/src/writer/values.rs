//! Literal formatters, one per value family.

use chrono::SecondsFormat;

use crate::model::{Literal, LiteralKind};

/// Renders constants of the kinds it declares.
pub trait ValueWriter: Send + Sync {
    fn handles(&self, kind: LiteralKind) -> bool;

    fn write(&self, value: &Literal) -> String;
}

pub struct BooleanValueWriter;

impl ValueWriter for BooleanValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind == LiteralKind::Bool
    }

    fn write(&self, value: &Literal) -> String {
        match value {
            Literal::Bool(true) => "true".to_owned(),
            Literal::Bool(false) => "false".to_owned(),
            other => other.to_string(),
        }
    }
}

/// Single-quoted text, embedded quotes doubled.
pub struct StringValueWriter;

impl ValueWriter for StringValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind == LiteralKind::String
    }

    fn write(&self, value: &Literal) -> String {
        match value {
            Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
            other => other.to_string(),
        }
    }
}

/// Every integer width, signed or not, is written bare.
pub struct IntegralValueWriter;

impl ValueWriter for IntegralValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind.is_integral()
    }

    fn write(&self, value: &Literal) -> String {
        value.to_string()
    }
}

pub struct SingleValueWriter;

impl ValueWriter for SingleValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind == LiteralKind::Single
    }

    fn write(&self, value: &Literal) -> String {
        match value {
            Literal::Single(v) => format!("{v:?}f"),
            other => other.to_string(),
        }
    }
}

/// Always carries a fractional part or exponent so the token reads back as a double.
pub struct DoubleValueWriter;

impl ValueWriter for DoubleValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind == LiteralKind::Double
    }

    fn write(&self, value: &Literal) -> String {
        match value {
            Literal::Double(v) => format!("{v:?}"),
            other => other.to_string(),
        }
    }
}

pub struct DecimalValueWriter;

impl ValueWriter for DecimalValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind == LiteralKind::Decimal
    }

    fn write(&self, value: &Literal) -> String {
        match value {
            Literal::Decimal(v) => format!("{v}m"),
            other => other.to_string(),
        }
    }
}

pub struct GuidValueWriter;

impl ValueWriter for GuidValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind == LiteralKind::Guid
    }

    fn write(&self, value: &Literal) -> String {
        match value {
            Literal::Guid(v) => format!("guid'{}'", v.hyphenated()),
            other => other.to_string(),
        }
    }
}

pub struct DateTimeValueWriter;

impl ValueWriter for DateTimeValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind == LiteralKind::DateTime
    }

    fn write(&self, value: &Literal) -> String {
        match value {
            Literal::DateTime(v) => format!("datetime'{}'", v.format("%Y-%m-%dT%H:%M:%S%.f")),
            other => other.to_string(),
        }
    }
}

pub struct DateTimeOffsetValueWriter;

impl ValueWriter for DateTimeOffsetValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind == LiteralKind::DateTimeOffset
    }

    fn write(&self, value: &Literal) -> String {
        match value {
            Literal::DateTimeOffset(v) => format!(
                "datetimeoffset'{}'",
                v.to_rfc3339_opts(SecondsFormat::AutoSi, false)
            ),
            other => other.to_string(),
        }
    }
}

/// `Namespace.Type'Member'`.
pub struct EnumValueWriter;

impl ValueWriter for EnumValueWriter {
    fn handles(&self, kind: LiteralKind) -> bool {
        kind == LiteralKind::Enum
    }

    fn write(&self, value: &Literal) -> String {
        match value {
            Literal::Enum(v) => format!("{}'{}'", v.type_name, v.member),
            other => other.to_string(),
        }
    }
}

pub(crate) fn builtin_value_writers() -> Vec<Box<dyn ValueWriter>> {
    vec![
        Box::new(BooleanValueWriter),
        Box::new(StringValueWriter),
        Box::new(IntegralValueWriter),
        Box::new(SingleValueWriter),
        Box::new(DoubleValueWriter),
        Box::new(DecimalValueWriter),
        Box::new(GuidValueWriter),
        Box::new(DateTimeValueWriter),
        Box::new(DateTimeOffsetValueWriter),
        Box::new(EnumValueWriter),
    ]
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::EnumValue;
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn render(value: &Literal) -> String {
        builtin_value_writers()
            .iter()
            .find(|w| w.handles(value.kind()))
            .map_or_else(|| value.to_string(), |w| w.write(value))
    }

    #[test]
    fn test_string_quotes_are_doubled() {
        assert_eq!(render(&Literal::from("blah")), "'blah'");
        assert_eq!(render(&Literal::from("O'Neil")), "'O''Neil'");
    }

    #[test]
    fn test_booleans() {
        assert_eq!(render(&Literal::Bool(true)), "true");
        assert_eq!(render(&Literal::Bool(false)), "false");
    }

    #[test]
    fn test_unsigned_integers_are_bare() {
        assert_eq!(render(&Literal::UInt64(123)), "123");
        assert_eq!(render(&Literal::UInt16(7)), "7");
        assert_eq!(render(&Literal::SByte(-3)), "-3");
    }

    #[test]
    fn test_floating_and_decimal_suffixes() {
        assert_eq!(render(&Literal::Double(1.5)), "1.5");
        assert_eq!(render(&Literal::Double(3.0)), "3.0");
        assert_eq!(render(&Literal::Single(1.5)), "1.5f");
        assert_eq!(render(&Literal::Decimal(Decimal::new(123, 2))), "1.23m");
    }

    #[test]
    fn test_guid() {
        assert_eq!(
            render(&Literal::Guid(Uuid::nil())),
            "guid'00000000-0000-0000-0000-000000000000'"
        );
    }

    #[test]
    fn test_date_time_offset() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let value = offset.with_ymd_and_hms(2012, 5, 6, 16, 11, 0).unwrap();
        assert_eq!(
            render(&Literal::DateTimeOffset(value)),
            "datetimeoffset'2012-05-06T16:11:00+02:00'"
        );
    }

    #[test]
    fn test_date_time() {
        let value = NaiveDate::from_ymd_opt(2012, 5, 6)
            .unwrap()
            .and_hms_opt(16, 11, 0)
            .unwrap();
        assert_eq!(render(&Literal::DateTime(value)), "datetime'2012-05-06T16:11:00'");
    }

    #[test]
    fn test_enum_and_null() {
        let value = Literal::Enum(EnumValue::new("Tests.Choice", "That"));
        assert_eq!(render(&value), "Tests.Choice'That'");
        assert_eq!(render(&Literal::Null), "null");
    }
}
