//! API Module
//!
//! Dashboard datasource HTTP API: codec, handlers, and server.

pub mod codec;
pub mod rest;
pub mod server;

pub use codec::{JsonCodec, JsonCodecRef, QueryRequest, QueryTarget, SearchRequest, SerdeJsonCodec};
pub use rest::*;
pub use server::*;
