use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A single field value inside a record.
///
/// CSV sources produce only [`Value::Str`]; JSON-lines sources produce the
/// full range. Equality and hashing are defined for every variant (floats by
/// bit pattern) so values can key the join multimap directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// One dataset row: an ordered sequence of field values.
///
/// Field names and arity are fixed per dataset and carried by the manifest,
/// not by each record.
pub type Record = Vec<Value>;

impl Value {
    /// Canonical byte encoding used for bucket hashing.
    ///
    /// Must stay stable across releases: two datasets partitioned at
    /// different times are only joinable because equal keys encode to equal
    /// bytes on both sides.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Value::Null => vec![0x00],
            Value::Bool(b) => vec![0x01, *b as u8],
            Value::Int(i) => {
                let mut out = Vec::with_capacity(9);
                out.push(0x02);
                out.extend_from_slice(&i.to_le_bytes());
                out
            }
            Value::Float(f) => {
                let mut out = Vec::with_capacity(9);
                out.push(0x03);
                out.extend_from_slice(&f.to_bits().to_le_bytes());
                out
            }
            Value::Str(s) => {
                let mut out = Vec::with_capacity(1 + s.len());
                out.push(0x04);
                out.extend_from_slice(s.as_bytes());
                out
            }
        }
    }

    /// Textual rendering for delimited output. `Null` renders empty.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Bool(b) => Cow::Owned(b.to_string()),
            Value::Int(i) => Cow::Owned(i.to_string()),
            Value::Float(f) => Cow::Owned(f.to_string()),
            Value::Str(s) => Cow::Borrowed(s),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            // Nested shapes are carried through as their compact JSON text.
            other => Value::Str(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => state.write_u8(0x00),
            Value::Bool(b) => {
                state.write_u8(0x01);
                b.hash(state);
            }
            Value::Int(i) => {
                state.write_u8(0x02);
                i.hash(state);
            }
            Value::Float(f) => {
                state.write_u8(0x03);
                f.to_bits().hash(state);
            }
            Value::Str(s) => {
                state.write_u8(0x04);
                s.hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn canonical_bytes_distinguish_variants() {
        // "1" as text, integer, and float must hash to different buckets.
        let text = Value::Str("1".to_string()).canonical_bytes();
        let int = Value::Int(1).canonical_bytes();
        let float = Value::Float(1.0).canonical_bytes();
        assert_ne!(text, int);
        assert_ne!(int, float);
    }

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Value::Float(1.5), Value::Float(1.5));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn render_null_is_empty() {
        assert_eq!(Value::Null.render(), "");
        assert_eq!(Value::Int(-7).render(), "-7");
    }

    #[test]
    fn json_roundtrip_keeps_scalars() {
        let v = Value::from_json(serde_json::json!(42));
        assert_eq!(v, Value::Int(42));
        assert_eq!(v.to_json(), serde_json::json!(42));
    }
}
