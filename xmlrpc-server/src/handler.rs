//! RPC request handler.
//!
//! Takes the raw body of a call and produces the raw response document.
//! Runs synchronously; the server moves it onto a blocking thread.

use crate::error::ServerError;
use crate::metrics::{Metrics, UNKNOWN_METHOD};
use std::sync::Arc;
use std::time::Instant;
use xmlrpc_core::{DispatchResult, Dispatcher, Registry};
use xmlrpc_protocol::{Decoder, FaultCode, CONTENT_TYPE};

/// A response document and its content type.
#[derive(Debug, Clone)]
pub struct Reply {
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// Parses, dispatches and serializes calls.
pub struct RpcHandler {
    dispatcher: Dispatcher,
    /// Metrics for request tracking.
    metrics: Option<Arc<Metrics>>,
}

impl RpcHandler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry),
            metrics: None,
        }
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Registry {
        self.dispatcher.registry()
    }

    /// Handles one call.
    ///
    /// Faults are successful replies. Errors are returned only when the body
    /// cannot be parsed or the method failed outright.
    pub fn handle(&self, body: &[u8]) -> Result<Reply, ServerError> {
        let start = Instant::now();

        let request = Decoder::decode_request(body).map_err(|e| {
            tracing::debug!(error = %e, "rejecting malformed call");
            self.record_failure();
            e
        })?;

        let outcome = match self.dispatcher.dispatch(&request) {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.observe_call(
                        &request.method_name,
                        start.elapsed().as_secs_f64(),
                        None,
                    );
                }
                self.record_failure();
                return Err(e.into());
            }
        };

        if let Some(ref metrics) = self.metrics {
            let fault_code = match &outcome.result {
                DispatchResult::Fault(fault) => Some(fault.code),
                DispatchResult::Success(_) => None,
            };
            let label = if fault_code == Some(FaultCode::MethodNotFound.code()) {
                UNKNOWN_METHOD
            } else {
                request.method_name.as_str()
            };
            metrics.observe_call(label, start.elapsed().as_secs_f64(), fault_code);
        }

        let body = outcome.encode().map_err(|e| {
            tracing::error!(method = %request.method_name, error = %e, "failed to encode response");
            self.record_failure();
            e
        })?;

        Ok(Reply {
            body,
            content_type: CONTENT_TYPE,
        })
    }

    /// Counts a call that ended without a response document.
    pub fn record_failure(&self) {
        if let Some(ref metrics) = self.metrics {
            metrics.failures_total.inc();
        }
    }
}
