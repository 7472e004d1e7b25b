//! Schema descriptors
//!
//! Each mapped type owns one [`Schema`], built on first use and cached for
//! the life of the process. A field's [`FieldKind`] is derived from its Rust
//! type through [`FieldType::kind`], so the coercion rule applied to a field
//! is fixed at compile time rather than discovered per call.

use crate::error::{MappingError, MappingErrorKind};
use crate::value::{Fields, Value};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Coercion rule selected for a field
///
/// Variants are listed in precedence order; a field has exactly one kind.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Nested mapped object, mapped recursively
    Object(fn() -> &'static Schema),
    /// Ordered sequence of nested mapped objects
    ObjectList(fn() -> &'static Schema),
    /// Timestamp, parsed from text
    Timestamp,
    /// High-precision decimal
    Decimal,
    /// Ordered sequence of high-precision decimals
    DecimalList,
    /// Anything else, copied unchanged
    Scalar,
}

impl FieldKind {
    /// Check for a nested object or object list
    #[inline]
    #[must_use]
    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Object(_) | Self::ObjectList(_))
    }

    /// Short name, used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::ObjectList(_) => "object_list",
            Self::Timestamp => "timestamp",
            Self::Decimal => "decimal",
            Self::DecimalList => "decimal_list",
            Self::Scalar => "scalar",
        }
    }
}

/// Declared fields of a mapped type, in declaration order
#[derive(Debug, Clone)]
pub struct Schema {
    type_name: &'static str,
    fields: IndexMap<&'static str, FieldKind>,
}

impl Schema {
    /// Create empty schema
    #[inline]
    #[must_use]
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: IndexMap::new(),
        }
    }

    /// Declare a field; redeclaring keeps the original position
    pub fn insert(&mut self, name: &'static str, kind: FieldKind) {
        self.fields.insert(name, kind);
    }

    /// Splice in every field of a base schema
    pub fn inherit(&mut self, base: &Schema) {
        for (name, kind) in &base.fields {
            self.fields.insert(name, *kind);
        }
    }

    /// Kind of a declared field
    #[inline]
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).copied()
    }

    /// Check whether a field is declared
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared field names, in order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Number of declared fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no fields are declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Name of the described type
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Typed object with a declared schema
///
/// Implement with [`impl_mapped!`](crate::impl_mapped).
pub trait Mapped: Default + 'static {
    /// Declared fields, including those of an inherited base
    fn schema() -> &'static Schema;

    /// Current field values, nulls included
    fn to_fields(&self) -> Fields;

    /// Set one declared field from an already-coerced value
    ///
    /// # Errors
    /// Returns error if the value cannot be converted to the field's type
    fn assign(&mut self, field: &str, value: Value) -> Result<(), MappingError>;
}

/// Conversion between a Rust field type and the dynamic model
pub trait FieldType: Sized {
    /// Coercion rule for fields of this type
    fn kind() -> FieldKind {
        FieldKind::Scalar
    }

    /// Convert from a coerced value
    ///
    /// # Errors
    /// Returns error if the value has the wrong shape
    fn from_value(value: Value) -> Result<Self, MappingError>;

    /// Convert into the dynamic model
    fn to_value(&self) -> Value;
}

/// Build a mapped object from coerced fields, ignoring undeclared ones
///
/// # Errors
/// Returns error if a field value cannot be assigned
pub fn assemble<T: Mapped>(fields: Fields) -> Result<T, MappingError> {
    let schema = T::schema();
    let mut target = T::default();
    for (name, value) in fields {
        if schema.contains(&name) {
            target.assign(&name, value)?;
        }
    }
    Ok(target)
}

fn missing() -> MappingError {
    MappingError::new(MappingErrorKind::MissingValue)
}

fn reject<T>(expected: &'static str, value: &Value) -> Result<T, MappingError> {
    if value.is_null() {
        Err(missing())
    } else {
        Err(MappingError::type_mismatch(expected, value))
    }
}

impl FieldType for bool {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => reject("bool", &other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FieldType for i64 {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Int(i) => Ok(i),
            other => reject("integer", &other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

macro_rules! narrow_int_field {
    ($($ty:ty),+) => {
        $(
            impl FieldType for $ty {
                fn from_value(value: Value) -> Result<Self, MappingError> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(i).map_err(|_| {
                            MappingError::new(MappingErrorKind::OutOfRange(i.to_string()))
                        }),
                        other => reject("integer", &other),
                    }
                }

                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }
        )+
    };
}

narrow_int_field!(i32, u32, u16, u8);

/// Values above `i64::MAX` travel as integral decimals so they stay exact
impl FieldType for u64 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Int(i) => u64::try_from(i)
                .map_err(|_| MappingError::new(MappingErrorKind::OutOfRange(i.to_string()))),
            Value::Decimal(d) => d
                .fract()
                .is_zero()
                .then(|| d.to_u64())
                .flatten()
                .ok_or_else(|| MappingError::new(MappingErrorKind::OutOfRange(d.to_string()))),
            Value::Float(f) if f.fract() == 0.0 && (0.0..U64_BOUND).contains(&f) => Ok(f as u64),
            Value::Text(text) => match text.trim().parse() {
                Ok(n) => Ok(n),
                Err(_) => reject("integer", &Value::Text(text)),
            },
            other => reject("integer", &other),
        }
    }

    fn to_value(&self) -> Value {
        i64::try_from(*self).map_or_else(|_| Value::Decimal(Decimal::from(*self)), Value::Int)
    }
}

/// 2^64, the first float past `u64::MAX`
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

impl FieldType for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            Value::Decimal(d) => d
                .to_string()
                .parse()
                .map_err(|_| MappingError::new(MappingErrorKind::UnparsableDecimal(d.to_string()))),
            other => reject("float", &other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FieldType for String {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Text(s) => Ok(s),
            other => reject("text", &other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FieldType for Decimal {
    fn kind() -> FieldKind {
        FieldKind::Decimal
    }

    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Decimal(d) => Ok(d),
            Value::Int(i) => Ok(Decimal::from(i)),
            Value::Float(f) => crate::mapper::decimal_from_float(f),
            Value::Text(text) => crate::mapper::decimal_from_text(&text),
            other => reject("decimal", &other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }
}

impl FieldType for DateTime<Utc> {
    fn kind() -> FieldKind {
        FieldKind::Timestamp
    }

    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::Text(text) => crate::mapper::parse_timestamp(&text),
            other => reject("timestamp", &other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

impl FieldType for Value {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        Ok(value)
    }

    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FieldType for serde_json::Value {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        Ok(value.to_json(crate::value::DecimalRepr::Text))
    }

    fn to_value(&self) -> Value {
        Value::from_json(self)
    }
}

impl<T: FieldType> FieldType for Option<T> {
    fn kind() -> FieldKind {
        T::kind()
    }

    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_value)
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn kind() -> FieldKind {
        match T::kind() {
            FieldKind::Object(schema) => FieldKind::ObjectList(schema),
            FieldKind::Decimal => FieldKind::DecimalList,
            _ => FieldKind::Scalar,
        }
    }

    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| T::from_value(item).map_err(|e| e.at_index(i)))
                .collect(),
            other => reject("list", &other),
        }
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(T::to_value).collect())
    }
}

impl<T: FieldType> FieldType for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Map(fields) => fields
                .into_iter()
                .map(|(k, v)| match T::from_value(v) {
                    Ok(v) => Ok((k, v)),
                    Err(e) => Err(e.at_field(&k)),
                })
                .collect(),
            other => reject("object", &other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn option_null_is_none() {
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
    }

    #[test]
    fn mandatory_null_is_missing() {
        let err = String::from_value(Value::Null).unwrap_err();
        assert_eq!(err.kind(), &MappingErrorKind::MissingValue);
    }

    #[test]
    fn vec_kind_follows_element() {
        assert!(matches!(Vec::<Decimal>::kind(), FieldKind::DecimalList));
        assert!(matches!(Vec::<String>::kind(), FieldKind::Scalar));
        assert!(matches!(Option::<Vec<Decimal>>::kind(), FieldKind::DecimalList));
        assert!(matches!(Option::<DateTime<Utc>>::kind(), FieldKind::Timestamp));
    }

    #[test]
    fn vec_error_carries_index() {
        let err = Vec::<i64>::from_value(Value::List(vec![Value::Int(1), Value::Bool(true)]))
            .unwrap_err();
        assert_eq!(err.path(), "[1]");
    }

    #[test]
    fn large_u64_stays_exact() {
        let big = u64::MAX - 1;
        assert_eq!(big.to_value(), Value::Decimal(Decimal::from(big)));
        assert_eq!(u64::from_value(big.to_value()), Ok(big));
        assert_eq!(u64::from_value(Value::Text(big.to_string())), Ok(big));
        assert_eq!(u64::from_value(Value::Float(1e19)), Ok(10_000_000_000_000_000_000));
        assert_eq!(7_u64.to_value(), Value::Int(7));

        let err = u64::from_value(Value::Decimal(Decimal::from_str("1.5").unwrap())).unwrap_err();
        assert_eq!(err.kind(), &MappingErrorKind::OutOfRange("1.5".into()));
        assert!(u64::from_value(Value::Float(-1.0)).is_err());
    }

    #[test]
    fn narrow_int_out_of_range() {
        let err = u8::from_value(Value::Int(300)).unwrap_err();
        assert_eq!(err.kind(), &MappingErrorKind::OutOfRange("300".into()));
    }

    #[test]
    fn decimal_accepts_int_and_text() {
        assert_eq!(Decimal::from_value(Value::Int(3)), Ok(Decimal::from(3)));
        assert_eq!(
            Decimal::from_value(Value::Text("1.25".into())),
            Ok(Decimal::from_str("1.25").unwrap())
        );
    }

    #[test]
    fn schema_inherit_keeps_position() {
        let mut base = Schema::new("Base");
        base.insert("id", FieldKind::Scalar);
        base.insert("name", FieldKind::Scalar);

        let mut schema = Schema::new("Derived");
        schema.inherit(&base);
        schema.insert("amount", FieldKind::Decimal);
        schema.insert("id", FieldKind::Scalar);

        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["id", "name", "amount"]);
        assert_eq!(schema.type_name(), "Derived");
        assert!(matches!(schema.kind_of("amount"), Some(FieldKind::Decimal)));
        assert!(schema.kind_of("missing").is_none());
    }
}
