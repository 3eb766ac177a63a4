//! JSON Codec
//!
//! Decoding of dashboard requests and encoding of responses, behind a trait
//! so handlers can be driven with failing codecs in tests.

use crate::error::{Error, Result};
use crate::query::{FilterPredicate, TableResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Request Types
// =============================================================================

/// Table query request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub targets: Vec<QueryTarget>,
}

/// One dashboard target; `target` is itself a JSON-encoded predicate map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTarget {
    pub target: String,
}

/// Distinct-values request naming one display field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub target: String,
}

// =============================================================================
// Codec Trait
// =============================================================================

/// Request decoding and response encoding used by the REST handlers
pub trait JsonCodec: Send + Sync {
    /// Decode a table query body; `None` when the body is absent
    fn decode_query(&self, body: &[u8]) -> Result<Option<QueryRequest>>;

    /// Decode a distinct-values body; `None` when the body is absent
    fn decode_search(&self, body: &[u8]) -> Result<Option<SearchRequest>>;

    /// Decode one target string into a predicate map
    fn decode_target(&self, target: &str) -> Result<FilterPredicate>;

    /// Encode a table response
    fn encode_tables(&self, tables: &[TableResponse]) -> Result<Vec<u8>>;

    /// Encode a distinct-values response
    fn encode_values(&self, values: &[String]) -> Result<Vec<u8>>;
}

pub type JsonCodecRef = Arc<dyn JsonCodec>;

/// Decode the predicates carried by every target of `request`
pub fn decode_predicates(codec: &dyn JsonCodec, request: &QueryRequest) -> Result<Vec<FilterPredicate>> {
    request
        .targets
        .iter()
        .map(|target| codec.decode_target(&target.target))
        .collect()
}

// =============================================================================
// serde_json Codec
// =============================================================================

/// Codec backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec;

impl SerdeJsonCodec {
    fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(body)
            .map(Some)
            .map_err(|e| Error::RequestDecode(e.to_string()))
    }
}

impl JsonCodec for SerdeJsonCodec {
    fn decode_query(&self, body: &[u8]) -> Result<Option<QueryRequest>> {
        Self::decode_body(body)
    }

    fn decode_search(&self, body: &[u8]) -> Result<Option<SearchRequest>> {
        Self::decode_body(body)
    }

    fn decode_target(&self, target: &str) -> Result<FilterPredicate> {
        // Dashboards escape quotes inside the target string.
        let unescaped = target.replace('\\', "");
        serde_json::from_str(&unescaped).map_err(|e| Error::TargetDecode {
            target: unescaped.clone(),
            reason: e.to_string(),
        })
    }

    fn encode_tables(&self, tables: &[TableResponse]) -> Result<Vec<u8>> {
        serde_json::to_vec(tables).map_err(|e| Error::ResponseEncode(e.to_string()))
    }

    fn encode_values(&self, values: &[String]) -> Result<Vec<u8>> {
        serde_json::to_vec(values).map_err(|e| Error::ResponseEncode(e.to_string()))
    }
}
