//! # signet-server
//!
//! HTTP server shell for the Signet token service: configuration loading,
//! tracing setup, router assembly, and the process entry point. The token
//! issuance semantics live in the `signet-auth` crate.

pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use server::{ServerBuilder, SignetServer, build_app};
