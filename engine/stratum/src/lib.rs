/* Copyright (c) 2026 Olle Mårtensson. This Source Code Form is subject to the terms of the Eclipse Public License, v. 2.0. */
//! Stratum: structured types, dynamic values and validation.
//!
//! This crate describes record types ([`ModelSchema`], [`TypeDescriptor`]),
//! the dynamic [`Value`] tree that instances travel as, and the validation
//! step that turns loosely typed input into canonical values. The columnar
//! bridge lives in `stratum-arrow`.
//!
//! # Examples
//! ```
//! use stratum::{Field, ModelSchema, TypeDescriptor, Value};
//!
//! let schema = ModelSchema::record(
//!     "demo.Person",
//!     vec![
//!         Field::new("name", TypeDescriptor::string()),
//!         Field::new("age", TypeDescriptor::optional(TypeDescriptor::int64())),
//!     ],
//! );
//!
//! let row = Value::record([("name", Value::from("Ann"))]);
//! let canonical = schema.validate(&row).expect("valid row");
//! assert_eq!(canonical.get("age"), Some(&Value::Null));
//! ```

mod error;
pub mod value;

pub mod decimal;
pub mod hash;
pub mod model;
pub mod schema;
mod validate;

#[cfg(feature = "serde")]
pub mod serde_support;

pub use decimal::{Decimal, DecimalError};
pub use error::{FieldError, StratumError, StratumResult, ValidationError};
pub use hash::Fingerprint;
pub use model::Model;
pub use schema::{
    Constraint, Definition, EnumDef, EnumMember, EnumValue, Field, IdentifierKind, ModelSchema,
    ScalarKind, StructDef, TagUnionDef, TemporalKind, TypeDescriptor, UnionVariant,
};
pub use value::{TaggedValue, Value};

#[cfg(feature = "serde")]
pub use serde_support::{from_value, to_value, SerdeError, SerdeModel};
