// Raw adapter output and its classification into a decoded value or an error

use serde_json::Value;

use super::code::ReturnConvention;
use super::value::DecodedValue;
use crate::error::{CacheToolError, Result};

/// Status that marks a successful run
pub const STATUS_OK: u16 = 200;

/// Status reported by the subprocess adapter for a non-zero exit
pub const STATUS_FAILED: u16 = 500;

/// Raw outcome of one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterResult {
    pub status_code: u16,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl AdapterResult {
    pub fn new(status_code: u16, stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK && self.stderr.is_empty()
    }

    fn into_execution_error(self) -> CacheToolError {
        CacheToolError::Execution {
            status: self.status_code,
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
        }
    }
}

/// Turns an `AdapterResult` into a `DecodedValue` or an `Execution` error
pub struct ResultDecoder;

impl ResultDecoder {
    /// Decode stdout per convention. Failures carry both streams verbatim;
    /// no partial decoding is attempted.
    pub fn decode(result: AdapterResult, convention: ReturnConvention) -> Result<DecodedValue> {
        if !result.is_success() {
            return Err(result.into_execution_error());
        }

        match convention {
            ReturnConvention::Raw => Ok(DecodedValue::Raw(result.stdout)),
            ReturnConvention::Structured => match parse_json(&result.stdout) {
                Some(value @ (Value::Array(_) | Value::Object(_))) => {
                    Ok(DecodedValue::Structured(value))
                }
                // json_encode(false) is how PHP functions report failure
                Some(Value::Bool(false)) => Ok(DecodedValue::Structured(Value::Bool(false))),
                _ => Err(undecodable(result, convention)),
            },
            ReturnConvention::Scalar => match parse_json(&result.stdout) {
                Some(value) if !value.is_array() && !value.is_object() => {
                    Ok(DecodedValue::Scalar(value))
                }
                _ => Err(undecodable(result, convention)),
            },
        }
    }
}

fn parse_json(stdout: &[u8]) -> Option<Value> {
    serde_json::from_slice(stdout).ok()
}

fn undecodable(result: AdapterResult, convention: ReturnConvention) -> CacheToolError {
    CacheToolError::Execution {
        status: result.status_code,
        stderr: format!(
            "output is not a {} value{}",
            convention,
            if result.stderr.is_empty() {
                String::new()
            } else {
                format!(" ({})", String::from_utf8_lossy(&result.stderr))
            }
        ),
        stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_success() {
        let value =
            ResultDecoder::decode(AdapterResult::new(200, "42", ""), ReturnConvention::Scalar)
                .unwrap();
        assert_eq!(value, DecodedValue::Scalar(json!(42)));
    }

    #[test]
    fn test_structured_success() {
        let value = ResultDecoder::decode(
            AdapterResult::new(200, r#"{"num_seg":1}"#, ""),
            ReturnConvention::Structured,
        )
        .unwrap();
        assert_eq!(value, DecodedValue::Structured(json!({"num_seg": 1})));
    }

    #[test]
    fn test_raw_keeps_bytes() {
        let value = ResultDecoder::decode(
            AdapterResult::new(200, vec![0xff, 0x00, 0x7f], ""),
            ReturnConvention::Raw,
        )
        .unwrap();
        assert_eq!(value, DecodedValue::Raw(vec![0xff, 0x00, 0x7f]));
    }

    #[test]
    fn test_non_200_is_execution_error_with_streams() {
        let err = ResultDecoder::decode(
            AdapterResult::new(500, "half", "boom"),
            ReturnConvention::Scalar,
        )
        .unwrap_err();

        match err {
            CacheToolError::Execution {
                status,
                stderr,
                stdout,
            } => {
                assert_eq!(status, 500);
                assert_eq!(stderr, "boom");
                assert_eq!(stdout, "half");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stderr_on_200_is_failure() {
        let err = ResultDecoder::decode(
            AdapterResult::new(200, "true", "PHP Warning: deprecated"),
            ReturnConvention::Scalar,
        )
        .unwrap_err();
        assert!(err.to_string().contains("PHP Warning"));
    }

    #[test]
    fn test_shape_mismatch_is_execution_error() {
        let err = ResultDecoder::decode(
            AdapterResult::new(200, "[1,2]", ""),
            ReturnConvention::Scalar,
        )
        .unwrap_err();
        assert!(matches!(err, CacheToolError::Execution { .. }));

        let err = ResultDecoder::decode(
            AdapterResult::new(200, "not json", ""),
            ReturnConvention::Structured,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not json"));
    }
}
