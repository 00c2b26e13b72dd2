//! Public facade crate for `metaso`.
//!
//! Re-exports the validation, payload and formatting types from `metaso-core`, and the
//! reqwest-backed client as [`local`]. The MCP server lives in `metaso-mcp`.

pub use metaso_core::*;
pub use metaso_local as local;
