use serde::{Deserialize, Serialize};
use stratum::Fingerprint;

use crate::error::{Error, Result};

pub const DEFAULT_DECIMAL_PRECISION: u8 = 38;
pub const DEFAULT_DECIMAL_SCALE: i8 = 9;
pub const MAX_DECIMAL_PRECISION: u8 = 38;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimePolicy {
    /// Store UTC instants; naive input is taken as UTC.
    #[default]
    NormalizeUtc,
    /// Store the UTC instant next to the original offset in seconds.
    PreserveTz,
    /// Reject naive input at encode time.
    ErrorOnNaive,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumEncoding {
    /// Integer members use the narrowest integer type, string members use text.
    #[default]
    Auto,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictKeyPolicy {
    #[default]
    StringOnly,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionEncoding {
    /// `Struct<tag, variant...>` with exactly one populated payload per row.
    #[default]
    TaggedStruct,
    /// Native Arrow dense union.
    DenseUnion,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NdArrayEncoding {
    #[default]
    NestedList,
    FixedSizeListIfStatic,
}

impl DateTimePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateTimePolicy::NormalizeUtc => "normalize_utc",
            DateTimePolicy::PreserveTz => "preserve_tz",
            DateTimePolicy::ErrorOnNaive => "error_on_naive",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "normalize_utc" => Some(DateTimePolicy::NormalizeUtc),
            "preserve_tz" => Some(DateTimePolicy::PreserveTz),
            "error_on_naive" => Some(DateTimePolicy::ErrorOnNaive),
            _ => None,
        }
    }
}

impl UnionEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnionEncoding::TaggedStruct => "tagged_struct",
            UnionEncoding::DenseUnion => "dense_union",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "tagged_struct" => Some(UnionEncoding::TaggedStruct),
            "dense_union" => Some(UnionEncoding::DenseUnion),
            _ => None,
        }
    }
}

/// Policy knobs for schema mapping, encoding and decoding.
///
/// Deserializes with defaults for every missing key, so hosts can load a
/// partial JSON or TOML table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub datetime_policy: DateTimePolicy,
    pub enum_encoding: EnumEncoding,
    pub dict_key_policy: DictKeyPolicy,
    pub union_encoding: UnionEncoding,
    pub decimal_precision: u8,
    pub decimal_scale: i8,
    pub ndarray_encoding: NdArrayEncoding,
    /// Skips integer range, enum membership, identifier version and decimal
    /// precision checks on encode. Integers are narrowed with `as` casts;
    /// output for ill-typed input is unspecified.
    pub fast_path_skip_validation: bool,
    /// Admit `TypeDescriptor::Any` as a JSON text column.
    pub allow_dynamic: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            datetime_policy: DateTimePolicy::default(),
            enum_encoding: EnumEncoding::default(),
            dict_key_policy: DictKeyPolicy::default(),
            union_encoding: UnionEncoding::default(),
            decimal_precision: DEFAULT_DECIMAL_PRECISION,
            decimal_scale: DEFAULT_DECIMAL_SCALE,
            ndarray_encoding: NdArrayEncoding::default(),
            fast_path_skip_validation: false,
            allow_dynamic: false,
        }
    }
}

impl ConversionConfig {
    pub fn with_datetime_policy(mut self, policy: DateTimePolicy) -> Self {
        self.datetime_policy = policy;
        self
    }

    pub fn with_union_encoding(mut self, encoding: UnionEncoding) -> Self {
        self.union_encoding = encoding;
        self
    }

    pub fn with_decimal(mut self, precision: u8, scale: i8) -> Self {
        self.decimal_precision = precision;
        self.decimal_scale = scale;
        self
    }

    pub fn with_ndarray_encoding(mut self, encoding: NdArrayEncoding) -> Self {
        self.ndarray_encoding = encoding;
        self
    }

    pub fn with_fast_path(mut self, skip_validation: bool) -> Self {
        self.fast_path_skip_validation = skip_validation;
        self
    }

    pub fn with_allow_dynamic(mut self, allow: bool) -> Self {
        self.allow_dynamic = allow;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.decimal_precision == 0 || self.decimal_precision > MAX_DECIMAL_PRECISION {
            return Err(Error::InvalidConfig(format!(
                "decimal_precision must be within 1..={MAX_DECIMAL_PRECISION}, got {}",
                self.decimal_precision
            )));
        }
        if self.decimal_scale < 0 {
            return Err(Error::InvalidConfig(format!(
                "decimal_scale must not be negative, got {}",
                self.decimal_scale
            )));
        }
        if i16::from(self.decimal_scale) > i16::from(self.decimal_precision) {
            return Err(Error::InvalidConfig(format!(
                "decimal_scale {} exceeds decimal_precision {}",
                self.decimal_scale, self.decimal_precision
            )));
        }
        Ok(())
    }

    /// Stable hex digest over every option.
    pub fn fingerprint(&self) -> String {
        let mut fingerprint = Fingerprint::new("stratum.config.v1");
        fingerprint
            .update(self.datetime_policy.as_str())
            .update(&format!("{:?}", self.enum_encoding))
            .update(&format!("{:?}", self.dict_key_policy))
            .update(self.union_encoding.as_str())
            .update(&self.decimal_precision.to_string())
            .update(&self.decimal_scale.to_string())
            .update(&format!("{:?}", self.ndarray_encoding))
            .update(&self.fast_path_skip_validation.to_string())
            .update(&self.allow_dynamic.to_string());
        fingerprint.finish_hex()
    }
}
