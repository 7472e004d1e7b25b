//! Declarative helpers for implementing [`Mapped`](crate::Mapped)

/// Implement [`Mapped`](crate::Mapped) and [`FieldType`](crate::FieldType)
/// for a struct by listing its mapped fields.
///
/// Field kinds are inferred from the field types. At most one embedded
/// base may be marked `#[inherit]`; its fields are spliced into the
/// schema ahead of the struct's own fields.
///
/// ```rust
/// use conduit_mapper::{impl_mapped, StructuralMapper};
///
/// #[derive(Debug, Default)]
/// struct Audit {
///     id: Option<String>,
/// }
/// impl_mapped!(Audit { id });
///
/// #[derive(Debug, Default)]
/// struct Order {
///     audit: Audit,
///     total: Option<rust_decimal::Decimal>,
/// }
/// impl_mapped!(Order { #[inherit] audit, total });
///
/// let order: Order = StructuralMapper::new()
///     .map_from_untyped(&serde_json::json!({"id": "o-1", "total": "14.50"}))
///     .unwrap();
/// assert_eq!(order.audit.id.as_deref(), Some("o-1"));
/// ```
#[macro_export]
macro_rules! impl_mapped {
    ($name:ident { $(#[inherit] $base:ident,)? $($field:ident),* $(,)? }) => {
        impl $crate::Mapped for $name {
            fn schema() -> &'static $crate::Schema {
                static SCHEMA: $crate::__private::OnceCell<$crate::Schema> =
                    $crate::__private::OnceCell::new();
                SCHEMA.get_or_init(|| {
                    #[allow(unused_mut)]
                    let mut schema = $crate::Schema::new(stringify!($name));
                    $(
                        schema.inherit($crate::__private::schema_of(|v: &$name| &v.$base));
                    )?
                    $(
                        schema.insert(
                            stringify!($field),
                            $crate::__private::kind_of(|v: &$name| &v.$field),
                        );
                    )*
                    schema
                })
            }

            fn to_fields(&self) -> $crate::Fields {
                #[allow(unused_mut)]
                let mut fields = $crate::Fields::new();
                $(
                    fields.extend($crate::Mapped::to_fields(&self.$base));
                )?
                $(
                    fields.insert(
                        stringify!($field).to_owned(),
                        $crate::FieldType::to_value(&self.$field),
                    );
                )*
                fields
            }

            #[allow(unreachable_code, unused_variables)]
            fn assign(
                &mut self,
                field: &str,
                value: $crate::Value,
            ) -> ::std::result::Result<(), $crate::MappingError> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field = $crate::FieldType::from_value(value)
                                .map_err(|e| e.at_field(field))?;
                            Ok(())
                        }
                    )*
                    _ => {
                        $(
                            return $crate::Mapped::assign(&mut self.$base, field, value);
                        )?
                        Ok(())
                    }
                }
            }
        }

        impl $crate::FieldType for $name {
            fn kind() -> $crate::FieldKind {
                $crate::FieldKind::Object(<$name as $crate::Mapped>::schema)
            }

            fn from_value(value: $crate::Value) -> ::std::result::Result<Self, $crate::MappingError> {
                match value {
                    $crate::Value::Map(fields) => $crate::assemble(fields),
                    $crate::Value::Null => ::std::result::Result::Err($crate::MappingError::new(
                        $crate::MappingErrorKind::MissingValue,
                    )),
                    other => ::std::result::Result::Err($crate::MappingError::new(
                        $crate::MappingErrorKind::NotAnObject(other.kind_name()),
                    )),
                }
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Map($crate::Mapped::to_fields(self))
            }
        }
    };
}

/// Implement [`FieldType`](crate::FieldType) for a fieldless enum carried
/// on the wire as text.
///
/// The text is copied unchanged in both directions; presentation (casing,
/// numeric codes) belongs to the serializer.
///
/// ```rust
/// use conduit_mapper::{mapped_enum, FieldType, Value};
///
/// #[derive(Debug, PartialEq)]
/// enum Crust {
///     Thin,
///     Deep,
/// }
/// mapped_enum!(Crust { Thin => "THIN", Deep => "DEEP" });
///
/// assert_eq!(Crust::from_value(Value::from("DEEP")).unwrap(), Crust::Deep);
/// ```
#[macro_export]
macro_rules! mapped_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $crate::FieldType for $name {
            fn from_value(value: $crate::Value) -> ::std::result::Result<Self, $crate::MappingError> {
                match value {
                    $crate::Value::Text(text) => match text.as_str() {
                        $( $text => ::std::result::Result::Ok(Self::$variant), )+
                        _ => ::std::result::Result::Err($crate::MappingError::new(
                            $crate::MappingErrorKind::UnknownVariant(text.clone()),
                        )),
                    },
                    $crate::Value::Null => ::std::result::Result::Err($crate::MappingError::new(
                        $crate::MappingErrorKind::MissingValue,
                    )),
                    other => ::std::result::Result::Err($crate::MappingError::type_mismatch("text", &other)),
                }
            }

            fn to_value(&self) -> $crate::Value {
                match self {
                    $( Self::$variant => $crate::Value::Text(::std::string::String::from($text)), )+
                }
            }
        }
    };
}
