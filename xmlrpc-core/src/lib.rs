//! # xmlrpc-core
//!
//! Method registry and dispatch for xmlrpcd.
//!
//! This crate provides:
//! - Typed binding between wire values and Rust types
//! - Record declarations via `xmlrpc_record!`
//! - Explicit service registration into an immutable registry
//! - Request dispatch with fault classification

pub mod binder;
pub mod dispatcher;
pub mod error;
pub mod registry;

pub use binder::{Base64, DeclaredType, FromValue, ToValue, WireType};
pub use dispatcher::{DispatchResult, Dispatcher, Outcome};
pub use error::{BindError, BoxError, CoreError, InvokeError, MethodError, PathSegment};
pub use registry::{
    Handler, MethodDescriptor, MethodEntry, Methods, Param, Registry, RegistryBuilder, Service,
};
pub use xmlrpc_protocol::{Fault, FaultCode, Members, ResponseMode, Value};
