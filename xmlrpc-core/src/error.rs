//! Core error types.

use crate::binder::DeclaredType;
use std::fmt;
use thiserror::Error;
use xmlrpc_protocol::{Fault, ProtocolError, Scalar};

/// Boxed error raised by a method implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from registry construction and dispatch.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("method '{method}' registered by both {first} and {second}")]
    DuplicateMethod {
        method: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid method name {name:?} in {service}")]
    InvalidMethodName { name: String, service: &'static str },

    #[error("method '{method}' failed: {source}")]
    MethodFailed {
        method: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl CoreError {
    /// Returns true for errors caused by the request document itself.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, CoreError::Protocol(e) if !matches!(e, ProtocolError::Io(_)))
    }
}

/// One step in the location of a binding failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A wire value could not be bound to its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    expected: DeclaredType,
    found: String,
    path: Vec<PathSegment>,
}

impl BindError {
    /// The value's shape does not match the declared type.
    pub fn shape(expected: DeclaredType, found: &str) -> Self {
        Self {
            expected,
            found: found.to_string(),
            path: Vec::new(),
        }
    }

    /// The scalar's literal text cannot be coerced into the declared type.
    pub fn literal(expected: DeclaredType, scalar: &Scalar) -> Self {
        Self {
            expected,
            found: format!("{} {:?}", scalar.kind(), scalar.text()),
            path: Vec::new(),
        }
    }

    /// Records that the failure happened inside the named struct member.
    pub fn in_field(mut self, name: &str) -> Self {
        self.path.insert(0, PathSegment::Field(name.to_string()));
        self
    }

    /// Records that the failure happened at an array position.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path.insert(0, PathSegment::Index(index));
        self
    }

    pub fn expected(&self) -> &DeclaredType {
        &self.expected
    }

    pub fn found(&self) -> &str {
        &self.found
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)?;
        if !self.path.is_empty() {
            f.write_str(" at ")?;
            for (i, segment) in self.path.iter().enumerate() {
                match segment {
                    PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                    PathSegment::Field(name) => write!(f, ".{}", name)?,
                    PathSegment::Index(index) => write!(f, "[{}]", index)?,
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for BindError {}

/// Error returned by a method implementation.
#[derive(Debug, Error)]
pub enum MethodError {
    /// A deliberate business fault, written to the caller.
    #[error(transparent)]
    Fault(#[from] Fault),

    /// Any other failure. Never written as a fault.
    #[error("{0}")]
    Failure(BoxError),
}

impl MethodError {
    pub fn fault(code: i32, message: impl Into<String>) -> Self {
        MethodError::Fault(Fault::new(code, message))
    }

    pub fn failure(err: impl Into<BoxError>) -> Self {
        MethodError::Failure(err.into())
    }
}

/// Failure while invoking a registered handler.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("expected {expected} parameters, got {found}")]
    Arity { expected: usize, found: usize },

    #[error("parameter {index}: {source}")]
    Bind {
        index: usize,
        #[source]
        source: BindError,
    },

    #[error(transparent)]
    Method(MethodError),
}
