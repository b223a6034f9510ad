//! codec
//!
//! Resource fork encoding and decoding.
//!
//! # Architecture
//!
//! The merge engine never looks at a fork's stored form. It receives decoded
//! [`ResourceRecord`]s from a [`ResourceCodec`] and hands the canonical
//! sequence back to one for writing. Any format can be plugged in by
//! implementing the trait.
//!
//! [`JsonCodec`] is the bundled format: one JSON document per fork, payloads
//! hex-encoded, records in the order given, stored as `<name>.rjson`. Forks
//! in other formats, such as Rez text dumps (`.rdump`), need their own codec.
//!
//! ```json
//! {
//!   "resources": [
//!     { "type": "ptch", "id": -20217, "name": null, "attributes": 0, "data": "4e75" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{ResType, ResourceKey, ResourceRecord};

/// Errors from encoding or decoding a resource fork.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document is not valid for this format.
    #[error("malformed resource fork: {0}")]
    Malformed(String),

    /// A payload could not be decoded.
    #[error("bad payload for {key}: {message}")]
    Payload {
        /// Resource whose payload failed.
        key: ResourceKey,
        /// What went wrong.
        message: String,
    },

    /// Encoding failed.
    #[error("failed to encode resource fork: {0}")]
    Encode(String),
}

/// Converts between a fork's stored bytes and decoded records.
///
/// Implementations must preserve record order on decode and must write
/// records in exactly the order given on encode.
pub trait ResourceCodec: Send + Sync {
    /// File extension of forks in this format, without the dot.
    fn extension(&self) -> &'static str;

    /// Decode a stored fork.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<ResourceRecord>, CodecError>;

    /// Encode records in the given order.
    fn encode(&self, records: &[ResourceRecord]) -> Result<Vec<u8>, CodecError>;
}

/// JSON fork format with hex payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Extension of JSON fork files.
    pub const EXTENSION: &'static str = "rjson";
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ForkDocument {
    resources: Vec<ResourceEntry>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceEntry {
    #[serde(rename = "type")]
    res_type: ResType,
    id: i16,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    attributes: u8,
    data: String,
}

impl ResourceCodec for JsonCodec {
    fn extension(&self) -> &'static str {
        Self::EXTENSION
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<ResourceRecord>, CodecError> {
        let doc: ForkDocument =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;

        doc.resources
            .into_iter()
            .map(|entry| {
                let key = ResourceKey::new(entry.res_type, entry.id);
                let data = hex::decode(entry.data.trim()).map_err(|e| CodecError::Payload {
                    key,
                    message: e.to_string(),
                })?;
                Ok(ResourceRecord {
                    key,
                    name: entry.name,
                    attributes: entry.attributes,
                    data,
                })
            })
            .collect()
    }

    fn encode(&self, records: &[ResourceRecord]) -> Result<Vec<u8>, CodecError> {
        let doc = ForkDocument {
            resources: records
                .iter()
                .map(|r| ResourceEntry {
                    res_type: r.key.res_type,
                    id: r.key.id,
                    name: r.name.clone(),
                    attributes: r.attributes,
                    data: hex::encode(&r.data),
                })
                .collect(),
        };

        let mut out =
            serde_json::to_vec_pretty(&doc).map_err(|e| CodecError::Encode(e.to_string()))?;
        out.push(b'\n');
        Ok(out)
    }
}
