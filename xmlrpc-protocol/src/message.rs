//! Call and response messages.

use crate::error::FaultCode;
use crate::value::{Members, Value};
use std::fmt;

/// An incoming method call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Name of the method to invoke.
    pub method_name: String,

    /// Positional parameters in document order.
    pub params: Vec<Value>,
}

impl Request {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Envelope used when writing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Minimal envelope: `<response>` directly holds the value.
    Bare,
    /// Standard `methodResponse/params/param/value` envelope.
    #[default]
    Wrapped,
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Bare => write!(f, "bare"),
            ResponseMode::Wrapped => write!(f, "wrapped"),
        }
    }
}

/// A structured fault carrying a numeric code and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a fault using one of the endpoint's own fault codes.
    pub fn from_code(code: FaultCode, message: impl Into<String>) -> Self {
        Self::new(code.code(), message)
    }

    /// Returns the two-member struct written on the wire.
    pub fn to_value(&self) -> Value {
        Value::Struct(
            Members::new()
                .with("faultCode", Value::int(self.code))
                .with("faultString", Value::string(self.message.as_str())),
        )
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {}: {}", self.code, self.message)
    }
}

impl std::error::Error for Fault {}

/// A decoded response document.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// A result value; `None` when the envelope holds an empty value.
    Success(Option<Value>),
    Fault(Fault),
}

impl MethodResponse {
    pub fn is_fault(&self) -> bool {
        matches!(self, MethodResponse::Fault(_))
    }
}
