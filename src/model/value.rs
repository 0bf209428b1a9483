//! Query result values and their JSON shape.
//!
//! Points serialize as `[<unix seconds>, "<value>"]`, where the timestamp is
//! a JSON number with millisecond precision and the value is a string so
//! that `NaN` and infinities survive.

use crate::model::labels::Labels;
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

/// A single sample at a millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub t: i64,
    pub v: f64,
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        if self.t % 1000 == 0 {
            tuple.serialize_element(&(self.t / 1000))?;
        } else {
            tuple.serialize_element(&(self.t as f64 / 1000.0))?;
        }
        tuple.serialize_element(&format_sample_value(self.v))?;
        tuple.end()
    }
}

/// Render a sample value the way API clients expect.
pub fn format_sample_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

/// Render a value in shortest exponent form, e.g. `1e+00`, `2.5e-03`.
pub fn format_exponent(v: f64) -> String {
    if !v.is_finite() {
        return format_sample_value(v);
    }
    let rendered = format!("{:e}", v);
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => rendered,
    }
}

/// Instant-vector element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub metric: Labels,
    #[serde(rename = "value")]
    pub point: Point,
}

/// Range-vector element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub metric: Labels,
    #[serde(rename = "values")]
    pub points: Vec<Point>,
}

/// Kind of a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Scalar,
    String,
    Vector,
    Matrix,
}

/// A query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Point),
    String { t: i64, value: String },
    Vector(Vec<Sample>),
    Matrix(Vec<Series>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Scalar(_) => ValueType::Scalar,
            Self::String { .. } => ValueType::String,
            Self::Vector(_) => ValueType::Vector,
            Self::Matrix(_) => ValueType::Matrix,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(point) => point.serialize(serializer),
            Self::String { t, value } => {
                let mut tuple = serializer.serialize_tuple(2)?;
                if t % 1000 == 0 {
                    tuple.serialize_element(&(t / 1000))?;
                } else {
                    tuple.serialize_element(&(*t as f64 / 1000.0))?;
                }
                tuple.serialize_element(value)?;
                tuple.end()
            }
            Self::Vector(samples) => samples.serialize(serializer),
            Self::Matrix(series) => series.serialize(serializer),
        }
    }
}
