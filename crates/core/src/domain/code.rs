// Code Unit - a generated PHP snippet plus its return-value convention

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use super::literal::php_literal;
use crate::error::{CacheToolError, Result};

/// Diagnostics must never land on stdout, which carries only the encoded result
const PRELUDE: &str = "ini_set('display_errors', 'stderr');\nini_set('html_errors', '0');\n";

/// How the snippet emits its result and how stdout is decoded afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnConvention {
    /// `json_encode` of an array/object
    Structured,
    /// `json_encode` of a null, bool, number or string
    Scalar,
    /// The value is echoed verbatim (binary-safe)
    Raw,
}

impl ReturnConvention {
    fn emit_statement(&self) -> &'static str {
        match self {
            ReturnConvention::Structured | ReturnConvention::Scalar => {
                "echo json_encode($result);\n"
            }
            ReturnConvention::Raw => "echo $result;\n",
        }
    }
}

impl fmt::Display for ReturnConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnConvention::Structured => write!(f, "STRUCTURED"),
            ReturnConvention::Scalar => write!(f, "SCALAR"),
            ReturnConvention::Raw => write!(f, "RAW"),
        }
    }
}

/// Immutable snippet. The body always assigns `$result`, and the emit
/// statement for the convention is the last thing written to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    body: String,
    convention: ReturnConvention,
}

impl Code {
    /// `$result = <expression>;`
    pub fn expression(expression: impl AsRef<str>, convention: ReturnConvention) -> Self {
        Self {
            body: format!("$result = {};\n", expression.as_ref()),
            convention,
        }
    }

    /// `$result = function(arg, ...);` with arguments rendered as PHP literals
    pub fn call(function: &str, args: &[Value], convention: ReturnConvention) -> Self {
        let args: Vec<String> = args.iter().map(php_literal).collect();
        Self::expression(format!("{}({})", function, args.join(", ")), convention)
    }

    /// Extension check run before dispatching real work
    pub fn extension_loaded(name: &str) -> Self {
        Self::call(
            "extension_loaded",
            &[Value::String(name.to_string())],
            ReturnConvention::Scalar,
        )
    }

    pub fn convention(&self) -> ReturnConvention {
        self.convention
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Complete PHP source, including the open tag and the emit statement
    pub fn source(&self) -> String {
        let emit = self.convention.emit_statement();
        let mut out = String::with_capacity(6 + PRELUDE.len() + self.body.len() + emit.len());
        out.push_str("<?php\n");
        out.push_str(PRELUDE);
        out.push_str(&self.body);
        out.push_str(emit);
        out
    }

    /// Persist the source verbatim as UTF-8
    ///
    /// # Errors
    /// - CacheToolError::Staging if the file cannot be opened or written
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path).map_err(|e| {
            CacheToolError::staging(format!("Could not open {}", path.display()), e)
        })?;
        file.write_all(self.source().as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| {
                CacheToolError::staging(format!("Could not write code to {}", path.display()), e)
            })
    }
}
