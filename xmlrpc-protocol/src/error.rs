//! Protocol error types and fault codes.

use crate::value::ScalarKind;
use std::fmt;
use thiserror::Error;

/// Protocol-level errors raised while reading or writing wire documents.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid UTF-8 in document")]
    InvalidUtf8,

    #[error("document has no root element")]
    EmptyDocument,

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("unexpected element <{found}>, expected <{expected}>")]
    UnexpectedElement {
        expected: &'static str,
        found: String,
    },

    #[error("element <{0}> is not closed")]
    UnclosedElement(String),

    #[error("unexpected closing tag </{0}>")]
    UnexpectedClose(String),

    #[error("document nesting exceeds {max} levels")]
    TooDeep { max: usize },

    #[error("missing required element: <{0}>")]
    MissingElement(&'static str),

    #[error("call does not name a method")]
    MissingMethodName,

    #[error("invalid {kind} literal: {text:?}")]
    InvalidLiteral { kind: ScalarKind, text: String },

    #[error("double {0} has no wire representation")]
    NonFiniteDouble(String),
}

impl ProtocolError {
    /// Returns the fault code reported to callers for this error.
    pub fn fault_code(&self) -> FaultCode {
        match self {
            ProtocolError::Io(_) | ProtocolError::NonFiniteDouble(_) => FaultCode::InternalError,
            ProtocolError::MissingMethodName
            | ProtocolError::UnexpectedElement { .. }
            | ProtocolError::MissingElement(_) => FaultCode::InvalidRequest,
            ProtocolError::InvalidLiteral { .. } => FaultCode::InvalidParams,
            _ => FaultCode::ParseError,
        }
    }
}

/// Fault codes used for faults raised by the endpoint itself.
///
/// These follow the interoperability fault code convention shared by most
/// XML-RPC servers. Business faults raised by services carry their own codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl FaultCode {
    /// Returns the numeric code written into `faultCode`.
    pub fn code(&self) -> i32 {
        match self {
            FaultCode::ParseError => -32700,
            FaultCode::InvalidRequest => -32600,
            FaultCode::MethodNotFound => -32601,
            FaultCode::InvalidParams => -32602,
            FaultCode::InternalError => -32603,
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultCode::ParseError => write!(f, "PARSE_ERROR"),
            FaultCode::InvalidRequest => write!(f, "INVALID_REQUEST"),
            FaultCode::MethodNotFound => write!(f, "METHOD_NOT_FOUND"),
            FaultCode::InvalidParams => write!(f, "INVALID_PARAMS"),
            FaultCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_code_numbers() {
        assert_eq!(FaultCode::ParseError.code(), -32700);
        assert_eq!(FaultCode::InvalidRequest.code(), -32600);
        assert_eq!(FaultCode::MethodNotFound.code(), -32601);
        assert_eq!(FaultCode::InvalidParams.code(), -32602);
        assert_eq!(FaultCode::InternalError.code(), -32603);
    }

    #[test]
    fn test_fault_code_display() {
        assert_eq!(format!("{}", FaultCode::ParseError), "PARSE_ERROR");
        assert_eq!(
            format!("{}", FaultCode::MethodNotFound),
            "METHOD_NOT_FOUND"
        );
        assert_eq!(format!("{}", FaultCode::InvalidParams), "INVALID_PARAMS");
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::UnexpectedElement {
            expected: "methodCall",
            found: "html".to_string(),
        };
        assert!(err.to_string().contains("methodCall"));
        assert!(err.to_string().contains("html"));

        let err = ProtocolError::TooDeep { max: 128 };
        assert!(err.to_string().contains("128"));

        let err = ProtocolError::InvalidLiteral {
            kind: ScalarKind::Int,
            text: "five".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("int"));
        assert!(msg.contains("five"));

        let err = ProtocolError::MissingElement("methodName");
        assert!(err.to_string().contains("methodName"));
    }

    #[test]
    fn test_protocol_error_fault_code() {
        assert_eq!(
            ProtocolError::MissingMethodName.fault_code(),
            FaultCode::InvalidRequest
        );
        assert_eq!(
            ProtocolError::EmptyDocument.fault_code(),
            FaultCode::ParseError
        );
        assert_eq!(
            ProtocolError::InvalidLiteral {
                kind: ScalarKind::Boolean,
                text: "maybe".to_string()
            }
            .fault_code(),
            FaultCode::InvalidParams
        );
        assert_eq!(
            ProtocolError::NonFiniteDouble("NaN".to_string()).fault_code(),
            FaultCode::InternalError
        );
    }
}
