//! Request dispatcher.
//!
//! Turns a parsed [`Request`] into an [`Outcome`]:
//!
//! 1. Unknown method names become a `METHOD_NOT_FOUND` fault.
//! 2. A parameter count that differs from the method's arity becomes an
//!    `INVALID_PARAMS` fault.
//! 3. The first parameter that fails to bind becomes an `INVALID_PARAMS`
//!    fault naming its index.
//! 4. A [`MethodError::Fault`] raised by the method is returned verbatim.
//! 5. A [`MethodError::Failure`] is not a fault; it is returned as
//!    [`CoreError::MethodFailed`] for the transport to handle.

use crate::error::{CoreError, InvokeError, MethodError};
use crate::registry::Registry;
use std::sync::Arc;
use xmlrpc_protocol::{Encoder, Fault, FaultCode, ProtocolError, Request, ResponseMode, Value};

/// Result of a dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    Success(Option<Value>),
    Fault(Fault),
}

/// A dispatch result with the envelope it is written in.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub mode: ResponseMode,
    pub result: DispatchResult,
}

impl Outcome {
    fn fault(mode: ResponseMode, fault: Fault) -> Self {
        Self {
            mode,
            result: DispatchResult::Fault(fault),
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self.result, DispatchResult::Fault(_))
    }

    /// Serializes the outcome as a response document.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match &self.result {
            DispatchResult::Success(value) => Encoder::encode_response(value.as_ref(), self.mode),
            DispatchResult::Fault(fault) => Encoder::encode_fault(fault, self.mode),
        }
    }
}

/// Routes requests to registered methods.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatches a single request.
    pub fn dispatch(&self, request: &Request) -> Result<Outcome, CoreError> {
        let name = request.method_name.as_str();

        let Some(method) = self.registry.lookup(name) else {
            tracing::warn!(method = name, "unknown method");
            return Ok(Outcome::fault(
                ResponseMode::Wrapped,
                Fault::from_code(
                    FaultCode::MethodNotFound,
                    format!("method not found: {}", name),
                ),
            ));
        };
        let mode = method.response_mode();

        if request.params.len() != method.arity() {
            tracing::warn!(
                method = name,
                expected = method.arity(),
                found = request.params.len(),
                "parameter count mismatch"
            );
            return Ok(Outcome::fault(
                mode,
                arity_fault(name, method.arity(), request.params.len()),
            ));
        }

        tracing::debug!(method = name, params = request.params.len(), "dispatching");

        match method.invoke(&request.params) {
            Ok(value) => Ok(Outcome {
                mode,
                result: DispatchResult::Success(value),
            }),
            Err(InvokeError::Arity { expected, found }) => {
                Ok(Outcome::fault(mode, arity_fault(name, expected, found)))
            }
            Err(InvokeError::Bind { index, source }) => {
                tracing::warn!(method = name, index, error = %source, "parameter type mismatch");
                Ok(Outcome::fault(
                    mode,
                    Fault::from_code(
                        FaultCode::InvalidParams,
                        format!("invalid parameter {} for {}: {}", index, name, source),
                    ),
                ))
            }
            Err(InvokeError::Method(MethodError::Fault(fault))) => {
                tracing::warn!(method = name, code = fault.code, "method raised fault");
                Ok(Outcome::fault(mode, fault))
            }
            Err(InvokeError::Method(MethodError::Failure(source))) => {
                tracing::error!(method = name, error = %source, "method failed");
                Err(CoreError::MethodFailed {
                    method: name.to_string(),
                    source,
                })
            }
        }
    }
}

fn arity_fault(name: &str, expected: usize, found: usize) -> Fault {
    Fault::from_code(
        FaultCode::InvalidParams,
        format!(
            "{} expects {} parameter{}, got {}",
            name,
            expected,
            if expected == 1 { "" } else { "s" },
            found
        ),
    )
}
