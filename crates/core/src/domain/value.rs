// Decoded snippet result

use serde_json::Value;

/// Value produced by a successful run, shaped by the code's return convention
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Structured(Value),
    Scalar(Value),
    Raw(Vec<u8>),
}

impl DecodedValue {
    /// JSON view of structured and scalar values
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            DecodedValue::Structured(v) | DecodedValue::Scalar(v) => Some(v),
            DecodedValue::Raw(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            DecodedValue::Structured(v) | DecodedValue::Scalar(v) => Some(v),
            DecodedValue::Raw(_) => None,
        }
    }

    /// PHP truthiness for scalar results (`false`, `0`, `""`, `null` are false)
    pub fn is_truthy(&self) -> bool {
        match self {
            DecodedValue::Scalar(Value::Null) => false,
            DecodedValue::Scalar(Value::Bool(b)) => *b,
            DecodedValue::Scalar(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            DecodedValue::Scalar(Value::String(s)) => !s.is_empty() && s != "0",
            DecodedValue::Structured(v) => match v {
                Value::Array(a) => !a.is_empty(),
                Value::Object(o) => !o.is_empty(),
                _ => true,
            },
            DecodedValue::Scalar(_) => true,
            DecodedValue::Raw(bytes) => !bytes.is_empty(),
        }
    }

    pub fn into_raw(self) -> Vec<u8> {
        match self {
            DecodedValue::Raw(bytes) => bytes,
            DecodedValue::Structured(v) | DecodedValue::Scalar(v) => v.to_string().into_bytes(),
        }
    }
}
