//! `metaso-mcp` crate (library surface).
//!
//! The primary entrypoint is the `metaso` binary (CLI + MCP stdio). The library exposes the
//! dispatcher so it can be embedded or driven in-process.

pub mod envelope;
pub mod server;

pub use metaso_core as core;
pub use server::MetasoMcp;
