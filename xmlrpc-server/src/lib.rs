//! # xmlrpc-server
//!
//! HTTP transport for an XML-RPC method registry.
//!
//! This crate provides:
//! - An HTTP/1.1 server that feeds POSTed calls to the dispatcher
//! - A generated HTML overview of the registered methods
//! - YAML configuration with environment overrides
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod overview;
pub mod server;

pub use config::{Config, ConfigError, MetricsConfig, NetworkConfig, OverviewConfig, RpcConfig};
pub use error::ServerError;
pub use handler::{Reply, RpcHandler};
pub use metrics::Metrics;
pub use server::{Server, ServerConfig};
