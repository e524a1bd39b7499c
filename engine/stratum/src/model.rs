use crate::error::StratumResult;
use crate::schema::ModelSchema;
use crate::value::Value;

/// A Rust type with a declared structured schema.
///
/// Implementations usually delegate `to_value` / `from_value` to the serde
/// bridge; see [`SerdeModel`](crate::SerdeModel).
pub trait Model: Sized {
    fn model_schema() -> ModelSchema;

    fn to_value(&self) -> StratumResult<Value>;

    fn from_value(value: Value) -> StratumResult<Self>;
}
