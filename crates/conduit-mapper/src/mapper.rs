//! Structural mapper
//!
//! Translates between weakly-typed nested data and [`Mapped`] object graphs.
//!
//! # Coercion
//! When a source field matches a declared field, its value is coerced by the
//! declared [`FieldKind`], in this precedence order:
//!
//! 1. nested object: mapped recursively against the nested schema
//! 2. list of nested objects: each element mapped, order and length kept
//! 3. timestamp: textual values parsed, anything else copied
//! 4. decimal: text parsed exactly, floats converted through their text,
//!    decimals passed through
//! 5. list of decimals: rule 4 element-wise
//! 6. anything else: copied unchanged
//!
//! Source fields without a declared counterpart are ignored. Declared fields
//! without a source counterpart keep the target's default.

use crate::error::{MappingError, MappingErrorKind};
use crate::schema::{assemble, FieldKind, Mapped, Schema};
use crate::value::{fields_to_json, DecimalRepr, Fields, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Schema-driven mapper between typed and weakly-typed data
///
/// Stateless; every operation is deterministic and leaves its input untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralMapper;

impl StructuralMapper {
    /// Create mapper
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Map one typed object onto another type by field name
    ///
    /// # Errors
    /// Returns error if a matching field cannot be coerced or assigned
    pub fn map<S: Mapped, T: Mapped>(&self, source: &S) -> Result<T, MappingError> {
        tracing::trace!(
            from = S::schema().type_name(),
            to = T::schema().type_name(),
            "mapping typed object"
        );
        self.map_fields(source.to_fields())
    }

    /// Map decoded wire data onto a typed object
    ///
    /// # Errors
    /// Returns error if `source` is not an object or a field cannot be coerced
    pub fn map_from_untyped<T: Mapped>(&self, source: &serde_json::Value) -> Result<T, MappingError> {
        self.map_from_value(Value::from_json(source))
    }

    /// Map a dynamic value onto a typed object
    ///
    /// # Errors
    /// Returns error if `source` is not an object or a field cannot be coerced
    pub fn map_from_value<T: Mapped>(&self, source: Value) -> Result<T, MappingError> {
        match source {
            Value::Map(fields) => self.map_fields(fields),
            other => Err(MappingError::new(MappingErrorKind::NotAnObject(
                other.kind_name(),
            ))),
        }
    }

    /// Map a typed object onto `T`, then reduce it to dynamic fields
    ///
    /// Nulls are kept.
    ///
    /// # Errors
    /// Returns error if mapping onto `T` fails
    pub fn map_to_value<S: Mapped, T: Mapped>(&self, source: &S) -> Result<Fields, MappingError> {
        let mapped: T = self.map(source)?;
        Ok(mapped.to_fields())
    }

    /// Map a typed object onto `T`, then reduce it to sparse wire data
    ///
    /// Every null field is removed at every level. With
    /// `preserve_decimal_as_string` decimals are emitted as exact text,
    /// otherwise as (lossy) floating numbers.
    ///
    /// # Errors
    /// Returns error if mapping onto `T` fails
    pub fn map_to_untyped<S: Mapped, T: Mapped>(
        &self,
        source: &S,
        preserve_decimal_as_string: bool,
    ) -> Result<serde_json::Map<String, serde_json::Value>, MappingError> {
        let fields = crate::value::strip_nulls(self.map_to_value::<S, T>(source)?);
        Ok(fields_to_json(
            &fields,
            DecimalRepr::from_preserve(preserve_decimal_as_string),
        ))
    }

    fn map_fields<T: Mapped>(&self, fields: Fields) -> Result<T, MappingError> {
        let coerced = coerce_fields(T::schema(), fields)?;
        assemble(coerced)
    }
}

/// Coerce every declared field of `fields`, dropping undeclared ones
///
/// # Errors
/// Returns error naming the first field whose value cannot be coerced
pub fn coerce_fields(schema: &Schema, fields: Fields) -> Result<Fields, MappingError> {
    let mut coerced = Fields::with_capacity(fields.len());
    for (name, value) in fields {
        let Some(kind) = schema.kind_of(&name) else {
            tracing::trace!(
                target_type = schema.type_name(),
                field = %name,
                "ignoring undeclared field"
            );
            continue;
        };
        let value = coerce(kind, value).map_err(|e| e.at_field(&name))?;
        coerced.insert(name, value);
    }
    Ok(coerced)
}

fn coerce(kind: FieldKind, value: Value) -> Result<Value, MappingError> {
    match kind {
        FieldKind::Object(schema) => coerce_object(schema(), value),
        FieldKind::ObjectList(schema) => match value {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| coerce_object(schema(), item).map_err(|e| e.at_index(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Value::Null => Ok(Value::Null),
            other => Err(MappingError::new(MappingErrorKind::NotAList(
                other.kind_name(),
            ))),
        },
        FieldKind::Timestamp => match value {
            Value::Text(text) => parse_timestamp(&text).map(Value::Timestamp),
            other => Ok(other),
        },
        FieldKind::Decimal => coerce_decimal(value),
        FieldKind::DecimalList => match value {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| coerce_decimal(item).map_err(|e| e.at_index(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Ok(other),
        },
        FieldKind::Scalar => Ok(value),
    }
}

fn coerce_object(schema: &Schema, value: Value) -> Result<Value, MappingError> {
    match value {
        Value::Map(fields) => coerce_fields(schema, fields).map(Value::Map),
        Value::Null => Ok(Value::Null),
        other => Err(MappingError::new(MappingErrorKind::NotAnObject(
            other.kind_name(),
        ))),
    }
}

fn coerce_decimal(value: Value) -> Result<Value, MappingError> {
    match value {
        Value::Text(text) => decimal_from_text(&text).map(Value::Decimal),
        Value::Float(f) => decimal_from_float(f).map(Value::Decimal),
        other => Ok(other),
    }
}

/// Parse decimal text exactly, keeping its scale
///
/// # Errors
/// Returns error if the text is not a decimal number
pub fn decimal_from_text(text: &str) -> Result<Decimal, MappingError> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| MappingError::new(MappingErrorKind::UnparsableDecimal(text.to_owned())))
}

/// Convert a float through its shortest textual form
///
/// `0.1` becomes exactly `0.1`, not the binary approximation.
///
/// # Errors
/// Returns error for non-finite or out-of-range floats
pub fn decimal_from_float(f: f64) -> Result<Decimal, MappingError> {
    decimal_from_text(&f.to_string())
}

/// Parse a textual timestamp into UTC
///
/// Accepts RFC 3339 and offset-less ISO 8601 date-times or dates; the
/// latter are taken as UTC.
///
/// # Errors
/// Returns error if no supported format matches
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, MappingError> {
    let trimmed = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| MappingError::new(MappingErrorKind::UnparsableTimestamp(text.to_owned())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn decimal_text_keeps_scale() {
        let d = decimal_from_text("14.50").unwrap();
        assert_eq!(d.to_string(), "14.50");
    }

    #[test]
    fn decimal_float_goes_through_text() {
        let d = decimal_from_float(0.1).unwrap();
        assert_eq!(d.to_string(), "0.1");
    }

    #[test]
    fn decimal_scientific() {
        let d = decimal_from_text("1.5e3").unwrap();
        assert_eq!(d, Decimal::from(1500));
    }

    #[test]
    fn decimal_garbage() {
        let err = decimal_from_text("twelve").unwrap_err();
        assert_eq!(
            err.kind(),
            &MappingErrorKind::UnparsableDecimal("twelve".into())
        );
    }

    #[test]
    fn decimal_nan() {
        assert!(decimal_from_float(f64::NAN).is_err());
    }

    #[test]
    fn timestamp_rfc3339_offset() {
        let ts = parse_timestamp("2024-05-06T10:00:00+02:00").unwrap();
        assert_eq!(ts.hour(), 8);
    }

    #[test]
    fn timestamp_naive_is_utc() {
        let ts = parse_timestamp("2024-05-06T10:11:12.5").unwrap();
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (10, 11, 12));
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn timestamp_space_separated() {
        let ts = parse_timestamp("2024-05-06 10:11:12+00:00").unwrap();
        assert_eq!(ts.day(), 6);
    }

    #[test]
    fn timestamp_date_only() {
        let ts = parse_timestamp("2024-05-06").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day(), ts.hour()), (2024, 5, 6, 0));
    }

    #[test]
    fn timestamp_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert_eq!(
            err.kind(),
            &MappingErrorKind::UnparsableTimestamp("yesterday".into())
        );
    }

    #[test]
    fn timestamp_kind_copies_non_text() {
        let value = coerce(FieldKind::Timestamp, Value::Int(5)).unwrap();
        assert_eq!(value, Value::Int(5));
    }

    #[test]
    fn decimal_list_element_error_has_index() {
        let err = coerce(
            FieldKind::DecimalList,
            Value::List(vec![Value::Text("1".into()), Value::Text("x".into())]),
        )
        .unwrap_err();
        assert_eq!(err.path(), "[1]");
    }
}
