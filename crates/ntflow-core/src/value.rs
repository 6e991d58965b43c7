//! Scalar payloads
//!
//! A PV carries exactly one payload: a scalar of a single primitive kind, or
//! a fixed-kind array of them. The kind is declared at construction and a
//! write of a different shape is a type mismatch, never a coercion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive kind of a PV payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Int,
    Float,
    Bool,
    String,
}

impl Kind {
    /// Whether values of this kind can participate in numeric rules
    /// (control limits, valueAlarm thresholds).
    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Int | Kind::Float)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Bool => "bool",
            Kind::String => "string",
        };
        f.write_str(s)
    }
}

/// Declared shape of a PV payload: kind plus scalar/array
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub kind: Kind,
    pub array: bool,
}

impl Shape {
    pub fn scalar(kind: Kind) -> Self {
        Shape { kind, array: false }
    }

    pub fn array(kind: Kind) -> Self {
        Shape { kind, array: true }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "{}[]", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// A PV payload value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    BoolArray(Vec<bool>),
    StrArray(Vec<String>),
}

impl ScalarValue {
    /// Primitive kind of this value (element kind for arrays).
    pub fn kind(&self) -> Kind {
        match self {
            ScalarValue::Int(_) | ScalarValue::IntArray(_) => Kind::Int,
            ScalarValue::Float(_) | ScalarValue::FloatArray(_) => Kind::Float,
            ScalarValue::Bool(_) | ScalarValue::BoolArray(_) => Kind::Bool,
            ScalarValue::Str(_) | ScalarValue::StrArray(_) => Kind::String,
        }
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            ScalarValue::IntArray(_)
                | ScalarValue::FloatArray(_)
                | ScalarValue::BoolArray(_)
                | ScalarValue::StrArray(_)
        )
    }

    pub fn shape(&self) -> Shape {
        Shape {
            kind: self.kind(),
            array: self.is_array(),
        }
    }

    /// Number of elements (1 for scalars).
    pub fn len(&self) -> usize {
        match self {
            ScalarValue::IntArray(v) => v.len(),
            ScalarValue::FloatArray(v) => v.len(),
            ScalarValue::BoolArray(v) => v.len(),
            ScalarValue::StrArray(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric view of a scalar value. `None` for arrays and non-numeric
    /// kinds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(v) => Some(*v as f64),
            ScalarValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of every element. `None` for non-numeric kinds.
    pub fn numeric_elements(&self) -> Option<Vec<f64>> {
        match self {
            ScalarValue::Int(v) => Some(vec![*v as f64]),
            ScalarValue::Float(v) => Some(vec![*v]),
            ScalarValue::IntArray(v) => Some(v.iter().map(|&x| x as f64).collect()),
            ScalarValue::FloatArray(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    /// Element at `index` as a scalar. Scalars are their own element 0.
    pub fn element(&self, index: usize) -> Option<ScalarValue> {
        match self {
            ScalarValue::IntArray(v) => v.get(index).map(|&x| ScalarValue::Int(x)),
            ScalarValue::FloatArray(v) => v.get(index).map(|&x| ScalarValue::Float(x)),
            ScalarValue::BoolArray(v) => v.get(index).map(|&x| ScalarValue::Bool(x)),
            ScalarValue::StrArray(v) => v.get(index).map(|x| ScalarValue::Str(x.clone())),
            scalar if index == 0 => Some(scalar.clone()),
            _ => None,
        }
    }

    /// Replace the element at `index`. The replacement must match the
    /// element kind; out-of-range or mismatched writes are ignored.
    pub fn set_element(&mut self, index: usize, element: ScalarValue) {
        match (self, element) {
            (ScalarValue::IntArray(v), ScalarValue::Int(x)) => {
                if let Some(slot) = v.get_mut(index) {
                    *slot = x;
                }
            }
            (ScalarValue::FloatArray(v), ScalarValue::Float(x)) => {
                if let Some(slot) = v.get_mut(index) {
                    *slot = x;
                }
            }
            (ScalarValue::BoolArray(v), ScalarValue::Bool(x)) => {
                if let Some(slot) = v.get_mut(index) {
                    *slot = x;
                }
            }
            (ScalarValue::StrArray(v), ScalarValue::Str(x)) => {
                if let Some(slot) = v.get_mut(index) {
                    *slot = x;
                }
            }
            (slot, element) if !slot.is_array() && index == 0 && slot.kind() == element.kind() => {
                *slot = element;
            }
            _ => {}
        }
    }

    /// Apply a numeric transform to every element, preserving kind and
    /// shape. Integers are rounded to the nearest value. Non-numeric values
    /// are returned unchanged.
    pub fn map_numeric<F>(&self, f: F) -> ScalarValue
    where
        F: Fn(f64) -> f64,
    {
        match self {
            ScalarValue::Int(v) => ScalarValue::Int(f(*v as f64).round() as i64),
            ScalarValue::Float(v) => ScalarValue::Float(f(*v)),
            ScalarValue::IntArray(v) => {
                ScalarValue::IntArray(v.iter().map(|&x| f(x as f64).round() as i64).collect())
            }
            ScalarValue::FloatArray(v) => {
                ScalarValue::FloatArray(v.iter().map(|&x| f(x)).collect())
            }
            other => other.clone(),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Str(v.to_string())
    }
}

impl From<Vec<f64>> for ScalarValue {
    fn from(v: Vec<f64>) -> Self {
        ScalarValue::FloatArray(v)
    }
}

impl From<Vec<i64>> for ScalarValue {
    fn from(v: Vec<i64>) -> Self {
        ScalarValue::IntArray(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape() {
        assert_eq!(ScalarValue::Int(3).shape(), Shape::scalar(Kind::Int));
        assert_eq!(
            ScalarValue::FloatArray(vec![1.0, 2.0]).shape(),
            Shape::array(Kind::Float)
        );
        assert_ne!(
            ScalarValue::Int(3).shape(),
            ScalarValue::IntArray(vec![3]).shape()
        );
    }

    #[test]
    fn test_map_numeric_preserves_kind() {
        let v = ScalarValue::Int(7).map_numeric(|x| x / 2.0);
        assert_eq!(v, ScalarValue::Int(4));

        let v = ScalarValue::FloatArray(vec![1.5, -2.5]).map_numeric(f64::abs);
        assert_eq!(v, ScalarValue::FloatArray(vec![1.5, 2.5]));

        let v = ScalarValue::Str("x".into()).map_numeric(|x| x + 1.0);
        assert_eq!(v, ScalarValue::Str("x".into()));
    }

    #[test]
    fn test_numeric_elements() {
        assert_eq!(ScalarValue::Int(2).numeric_elements(), Some(vec![2.0]));
        assert_eq!(
            ScalarValue::IntArray(vec![1, 2]).numeric_elements(),
            Some(vec![1.0, 2.0])
        );
        assert_eq!(ScalarValue::Bool(true).numeric_elements(), None);
    }
}
