//! Column scalar types, values, and the row representation handed to sinks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::MISSING_INT;

/// Storage type of one column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    I32,
    I64,
    F32,
    F64,
}

impl ScalarType {
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "i32" => Some(ScalarType::I32),
            "i64" => Some(ScalarType::I64),
            "f32" => Some(ScalarType::F32),
            "f64" => Some(ScalarType::F64),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    /// Value written at a slot with no data.
    pub fn missing(self) -> Scalar {
        match self {
            ScalarType::I32 => Scalar::I32(MISSING_INT),
            ScalarType::I64 => Scalar::I64(MISSING_INT as i64),
            ScalarType::F32 => Scalar::F32(f32::NAN),
            ScalarType::F64 => Scalar::F64(f64::NAN),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cell of an output row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::I32(_) => ScalarType::I32,
            Scalar::I64(_) => ScalarType::I64,
            Scalar::F32(_) => ScalarType::F32,
            Scalar::F64(_) => ScalarType::F64,
        }
    }

    /// Widen to f64. Integers convert exactly within ±2^53.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::I32(v) => v as f64,
            Scalar::I64(v) => v as f64,
            Scalar::F32(v) => v as f64,
            Scalar::F64(v) => v,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::I32(v) => Some(v as i64),
            Scalar::I64(v) => Some(v),
            Scalar::F32(_) | Scalar::F64(_) => None,
        }
    }

    /// Whether this is the missing-slot sentinel for its type.
    pub fn is_missing(&self) -> bool {
        match *self {
            Scalar::I32(v) => v == MISSING_INT,
            Scalar::I64(v) => v == MISSING_INT as i64,
            Scalar::F32(v) => v.is_nan(),
            Scalar::F64(v) => v.is_nan(),
        }
    }

    /// Bit-level equality, so NaN matches NaN.
    pub fn bitwise_eq(&self, other: &Scalar) -> bool {
        match (*self, *other) {
            (Scalar::I32(a), Scalar::I32(b)) => a == b,
            (Scalar::I64(a), Scalar::I64(b)) => a == b,
            (Scalar::F32(a), Scalar::F32(b)) => a.to_bits() == b.to_bits(),
            (Scalar::F64(a), Scalar::F64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

/// Rust types a filler may produce. Fixes the column's [`ScalarType`] at
/// registration time.
pub trait FillValue: Copy + 'static {
    const TYPE: ScalarType;
    const MISSING: Self;

    fn into_scalar(self) -> Scalar;
}

impl FillValue for i32 {
    const TYPE: ScalarType = ScalarType::I32;
    const MISSING: Self = MISSING_INT;

    fn into_scalar(self) -> Scalar {
        Scalar::I32(self)
    }
}

impl FillValue for i64 {
    const TYPE: ScalarType = ScalarType::I64;
    const MISSING: Self = MISSING_INT as i64;

    fn into_scalar(self) -> Scalar {
        Scalar::I64(self)
    }
}

impl FillValue for f32 {
    const TYPE: ScalarType = ScalarType::F32;
    const MISSING: Self = f32::NAN;

    fn into_scalar(self) -> Scalar {
        Scalar::F32(self)
    }
}

impl FillValue for f64 {
    const TYPE: ScalarType = ScalarType::F64;
    const MISSING: Self = f64::NAN;

    fn into_scalar(self) -> Scalar {
        Scalar::F64(self)
    }
}

/// Name and type of one output column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ScalarType,
}

impl Column {
    pub fn new(name: &str, ty: ScalarType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// One evaluated row, cells in column order.
pub type Row = Vec<Scalar>;
