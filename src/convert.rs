//! Declared-type to converter mapping and value conversion
//!
//! Raw log-miner values are textual literals (or wrapper syntax such as
//! `HEXTORAW('..')` and date literals). Each declared column type maps to one
//! of a small set of converter families, resolved once at cache-refresh time
//! and applied per value afterwards - never re-resolved per row.

use crate::error::{CdcError, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Wrapper syntax emitted by the log miner for binary payloads.
const HEX_WRAPPER_PREFIX: &str = "HEXTORAW('";
const HEX_WRAPPER_SUFFIX: &str = "')";

/// Accepted textual date grammars, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d",
];

/// A fully-typed field value in an output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// SQL NULL
    Null,
    /// Arbitrary-precision numeric value
    Decimal(Decimal),
    /// Text value
    Text(String),
    /// Raw bytes (UTF-8 encoding of a character LOB literal)
    Bytes(Vec<u8>),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Ordered name -> raw value map (nested representation mode)
    Map(serde_json::Map<String, serde_json::Value>),
}

impl FieldValue {
    /// Check for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Get the text value, if this is a text field.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the decimal value, if this is a numeric field.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }
}

/// Converter family for one declared column type.
///
/// Built once per table at cache-refresh time; the per-value [`convert`]
/// path is a pure function with no allocation beyond the output value.
///
/// [`convert`]: TypeConverter::convert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeConverter {
    /// Numeric family: NUMBER, INT, FLOAT, DECIMAL, BINARY_DOUBLE, ...
    Decimal,
    /// Text family: CHAR, VARCHAR2, NVARCHAR2, ROWID, LONG, ...
    Text,
    /// Binary family: RAW, BLOB, LONG RAW (HEXTORAW-wrapped payloads)
    Binary,
    /// Temporal family: DATE, TIMESTAMP (without time zone)
    Timestamp,
    /// Character-LOB family: CLOB, NCLOB
    Clob,
}

impl TypeConverter {
    /// Resolve the converter for a declared database type.
    ///
    /// Matching is case-insensitive and ignores a parenthesized precision
    /// suffix (`NUMBER(10,2)` matches `NUMBER`). Types carrying a time-zone
    /// qualifier, interval types, BFILE, and anything unrecognized fail fast
    /// with an unsupported-type error.
    pub fn for_declared_type(declared: &str) -> Result<Self> {
        let upper = declared.trim().to_uppercase();

        // '2021-05-17 15:08:27.000000 AM +08:00' cannot be represented as a
        // plain timestamp, so time-zone qualified temporal types fail fast.
        if upper.contains("TIME ZONE") {
            return Err(CdcError::unsupported_type(declared));
        }

        let base = match upper.find('(') {
            Some(index) => upper[..index].trim(),
            None => upper.as_str(),
        };

        match base {
            "NUMBER" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "INT24" | "FLOAT"
            | "DOUBLE" | "REAL" | "BIGINT" | "DECIMAL" | "NUMERIC" | "BINARY_FLOAT"
            | "BINARY_DOUBLE" => Ok(Self::Decimal),
            // LONG accepts string inserts, so it joins the text family
            "CHAR" | "NCHAR" | "NVARCHAR2" | "ROWID" | "VARCHAR2" | "VARCHAR" | "LONG" => {
                Ok(Self::Text)
            }
            "RAW" | "BLOB" | "LONG RAW" => Ok(Self::Binary),
            "DATE" | "TIMESTAMP" => Ok(Self::Timestamp),
            "CLOB" | "NCLOB" => Ok(Self::Clob),
            _ => Err(CdcError::unsupported_type(declared)),
        }
    }

    /// Convert a raw textual value to its typed representation.
    ///
    /// A NULL raw value converts to [`FieldValue::Null`] without invoking
    /// the type-specific parser.
    pub fn convert(&self, raw: Option<&str>) -> Result<FieldValue> {
        let Some(raw) = raw else {
            return Ok(FieldValue::Null);
        };

        match self {
            Self::Decimal => parse_decimal(raw),
            Self::Text => Ok(FieldValue::Text(raw.to_string())),
            Self::Binary => decode_binary(raw),
            Self::Timestamp => parse_timestamp(raw),
            Self::Clob => Ok(FieldValue::Bytes(raw.as_bytes().to_vec())),
        }
    }
}

/// Parse a numeric literal, tolerating scientific notation (`1.223E-002`).
fn parse_decimal(raw: &str) -> Result<FieldValue> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map(FieldValue::Decimal)
        .map_err(|e| CdcError::value_conversion(raw, format!("invalid numeric literal: {e}")))
}

/// Decode a binary literal.
///
/// `HEXTORAW('<hex>')` payloads are hex-decoded and interpreted as UTF-8
/// text; anything else passes through unchanged.
fn decode_binary(raw: &str) -> Result<FieldValue> {
    let inner = raw
        .strip_prefix(HEX_WRAPPER_PREFIX)
        .and_then(|rest| rest.strip_suffix(HEX_WRAPPER_SUFFIX));

    match inner {
        Some(payload) => {
            let bytes = hex::decode(payload)
                .map_err(|e| CdcError::value_conversion(raw, format!("invalid hex payload: {e}")))?;
            let text = String::from_utf8(bytes).map_err(|e| {
                CdcError::value_conversion(raw, format!("hex payload is not valid UTF-8: {e}"))
            })?;
            Ok(FieldValue::Text(text))
        }
        None => Ok(FieldValue::Text(raw.to_string())),
    }
}

/// Parse a temporal literal using the fixed textual-date grammar.
fn parse_timestamp(raw: &str) -> Result<FieldValue> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(FieldValue::Timestamp(ts));
        }
        // Date-only grammar has no time component
        if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, format) {
            return Ok(FieldValue::Timestamp(date.and_hms_opt(0, 0, 0).unwrap_or_default()));
        }
    }
    Err(CdcError::value_conversion(
        raw,
        "unparseable temporal literal",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_family_mapping() {
        for ty in [
            "NUMBER",
            "NUMBER(10,2)",
            "smallint",
            "INT",
            "INTEGER",
            "FLOAT",
            "DOUBLE",
            "REAL",
            "BIGINT",
            "DECIMAL(38,10)",
            "NUMERIC",
            "BINARY_FLOAT",
            "BINARY_DOUBLE",
        ] {
            assert_eq!(
                TypeConverter::for_declared_type(ty).unwrap(),
                TypeConverter::Decimal,
                "type {ty}"
            );
        }
    }

    #[test]
    fn test_text_family_mapping() {
        for ty in ["CHAR(10)", "NCHAR", "varchar2(200)", "VARCHAR", "NVARCHAR2", "ROWID", "LONG"] {
            assert_eq!(
                TypeConverter::for_declared_type(ty).unwrap(),
                TypeConverter::Text,
                "type {ty}"
            );
        }
    }

    #[test]
    fn test_binary_and_lob_family_mapping() {
        assert_eq!(
            TypeConverter::for_declared_type("RAW(2000)").unwrap(),
            TypeConverter::Binary
        );
        assert_eq!(
            TypeConverter::for_declared_type("BLOB").unwrap(),
            TypeConverter::Binary
        );
        assert_eq!(
            TypeConverter::for_declared_type("LONG RAW").unwrap(),
            TypeConverter::Binary
        );
        assert_eq!(
            TypeConverter::for_declared_type("CLOB").unwrap(),
            TypeConverter::Clob
        );
        assert_eq!(
            TypeConverter::for_declared_type("NCLOB").unwrap(),
            TypeConverter::Clob
        );
    }

    #[test]
    fn test_temporal_family_mapping() {
        assert_eq!(
            TypeConverter::for_declared_type("DATE").unwrap(),
            TypeConverter::Timestamp
        );
        assert_eq!(
            TypeConverter::for_declared_type("TIMESTAMP(6)").unwrap(),
            TypeConverter::Timestamp
        );
    }

    #[test]
    fn test_time_zone_qualified_types_rejected() {
        for ty in [
            "TIMESTAMP(6) WITH TIME ZONE",
            "TIMESTAMP WITH LOCAL TIME ZONE",
        ] {
            let err = TypeConverter::for_declared_type(ty).unwrap_err();
            assert!(matches!(err, CdcError::UnsupportedType { .. }), "type {ty}");
        }
    }

    #[test]
    fn test_unsupported_types_rejected() {
        for ty in ["INTERVAL YEAR", "INTERVAL DAY", "BFILE", "SDO_GEOMETRY"] {
            let err = TypeConverter::for_declared_type(ty).unwrap_err();
            assert!(matches!(err, CdcError::UnsupportedType { .. }), "type {ty}");
            assert!(err.to_string().contains(ty));
        }
    }

    #[test]
    fn test_null_guard_never_parses() {
        for converter in [
            TypeConverter::Decimal,
            TypeConverter::Text,
            TypeConverter::Binary,
            TypeConverter::Timestamp,
            TypeConverter::Clob,
        ] {
            assert_eq!(converter.convert(None).unwrap(), FieldValue::Null);
        }
    }

    #[test]
    fn test_decimal_conversion() {
        let value = TypeConverter::Decimal.convert(Some("123.45")).unwrap();
        assert_eq!(value.as_decimal().unwrap(), Decimal::from_str("123.45").unwrap());
    }

    #[test]
    fn test_decimal_scientific_notation() {
        let value = TypeConverter::Decimal.convert(Some("1.223E-002")).unwrap();
        assert_eq!(
            value.as_decimal().unwrap(),
            Decimal::from_str("0.01223").unwrap()
        );
    }

    #[test]
    fn test_decimal_preserves_precision() {
        let literal = "12345678901234567890.123456";
        let value = TypeConverter::Decimal.convert(Some(literal)).unwrap();
        assert_eq!(value.as_decimal().unwrap().to_string(), literal);
    }

    #[test]
    fn test_decimal_malformed() {
        let err = TypeConverter::Decimal.convert(Some("not a number")).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn test_hex_wrapper_decode() {
        let value = TypeConverter::Binary
            .convert(Some("HEXTORAW('68656c6c6f')"))
            .unwrap();
        assert_eq!(value.as_text(), Some("hello"));
    }

    #[test]
    fn test_non_wrapper_binary_passes_through() {
        let value = TypeConverter::Binary.convert(Some("plain text")).unwrap();
        assert_eq!(value.as_text(), Some("plain text"));
    }

    #[test]
    fn test_malformed_hex_payload_fails_naming_value() {
        let err = TypeConverter::Binary
            .convert(Some("HEXTORAW('zz')"))
            .unwrap_err();
        assert!(matches!(err, CdcError::ValueConversion { .. }));
        assert!(err.to_string().contains("HEXTORAW('zz')"));
    }

    #[test]
    fn test_timestamp_conversion() {
        let value = TypeConverter::Timestamp
            .convert(Some("2021-05-17 15:08:27"))
            .unwrap();
        let expected =
            NaiveDateTime::parse_from_str("2021-05-17 15:08:27", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(value, FieldValue::Timestamp(expected));
    }

    #[test]
    fn test_timestamp_with_fraction() {
        let value = TypeConverter::Timestamp
            .convert(Some("2021-05-17 15:08:27.123456"))
            .unwrap();
        match value {
            FieldValue::Timestamp(ts) => {
                assert_eq!(ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                    "2021-05-17 15:08:27.123456");
            }
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn test_date_only_literal() {
        let value = TypeConverter::Timestamp.convert(Some("2021-05-17")).unwrap();
        match value {
            FieldValue::Timestamp(ts) => {
                assert_eq!(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "2021-05-17 00:00:00");
            }
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_temporal_literal() {
        let err = TypeConverter::Timestamp
            .convert(Some("17/05/2021"))
            .unwrap_err();
        assert!(matches!(err, CdcError::ValueConversion { .. }));
    }

    #[test]
    fn test_clob_conversion() {
        let value = TypeConverter::Clob.convert(Some("hello")).unwrap();
        assert_eq!(value, FieldValue::Bytes(b"hello".to_vec()));
    }
}
