//! Conduit structural mapper
//!
//! Type-directed, recursive translation between weakly-typed nested data
//! (as decoded from the wire) and strongly-typed object graphs.
//!
//! # Core Concepts
//!
//! - [`Value`]: dynamic form with exact decimals and timestamps
//! - [`Schema`] / [`FieldKind`]: per-type field descriptors, built once
//! - [`Mapped`]: typed object with a schema, see [`impl_mapped!`]
//! - [`StructuralMapper`]: the four mapping operations
//!
//! # Example
//!
//! ```rust
//! use conduit_mapper::{impl_mapped, StructuralMapper};
//! use rust_decimal::Decimal;
//!
//! #[derive(Debug, Default)]
//! struct Price {
//!     currency: Option<String>,
//!     amount: Option<Decimal>,
//! }
//! impl_mapped!(Price { currency, amount });
//!
//! let mapper = StructuralMapper::new();
//! let price: Price = mapper
//!     .map_from_untyped(&serde_json::json!({"currency": "EUR", "amount": "14.50", "extra": 1}))
//!     .unwrap();
//! assert_eq!(price.amount.unwrap().to_string(), "14.50");
//!
//! let wire = mapper.map_to_untyped::<Price, Price>(&price, true).unwrap();
//! assert_eq!(wire["amount"], "14.50");
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod error;
mod macros;
mod mapper;
mod schema;
mod value;

pub use error::{MappingError, MappingErrorKind};
pub use mapper::{coerce_fields, decimal_from_float, decimal_from_text, parse_timestamp, StructuralMapper};
pub use schema::{assemble, FieldKind, FieldType, Mapped, Schema};
pub use value::{fields_to_json, strip_nulls, DecimalRepr, Fields, Value};

/// Support items for the exported macros.
/// **Note:** Not part of the public API and may change.
#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::OnceCell;

    use crate::{FieldKind, FieldType, Mapped, Schema};

    /// Field kind of the field selected by `accessor`
    pub fn kind_of<T, F: FieldType>(_accessor: impl Fn(&T) -> &F) -> FieldKind {
        F::kind()
    }

    /// Schema of the embedded base selected by `accessor`
    pub fn schema_of<T, B: Mapped>(_accessor: impl Fn(&T) -> &B) -> &'static Schema {
        B::schema()
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
