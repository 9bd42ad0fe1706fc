//! # xmlrpc-protocol
//!
//! Wire format implementation for XML-RPC.
//!
//! This crate provides:
//! - The generic value model (scalars, arrays, structs)
//! - Request parsing from `methodCall` documents
//! - Response serialization in wrapped and bare envelopes
//! - Fault types and the endpoint's own fault codes

pub mod codec;
pub mod error;
pub mod message;
pub mod value;
pub mod xml;

pub use codec::{Decoder, Encoder};
pub use error::{FaultCode, ProtocolError};
pub use message::{Fault, MethodResponse, Request, ResponseMode};
pub use value::{Members, Scalar, ScalarKind, Value, DATETIME_FORMAT};
pub use xml::MAX_DEPTH;

/// Content type of every XML-RPC document.
pub const CONTENT_TYPE: &str = "text/xml";

/// Default port for xmlrpcd.
pub const DEFAULT_PORT: u16 = 8080;
