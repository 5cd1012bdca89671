//! Self-describing value envelopes for cache storage.
//!
//! Scalars stay human-readable in the store (`plain:<json>`); compound
//! values are MessagePack-encoded and hex-tagged (`binary:<hex>`), with a
//! gzip path for payloads above the compression threshold
//! (`binary-compressed:<hex>`). Decoding dispatches on the tag and never
//! fails: an unrecognized or corrupt envelope falls back to plain JSON and
//! finally to the raw string itself.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;

use crate::OpstoreError;

const PLAIN_TAG: &str = "plain:";
const BINARY_TAG: &str = "binary:";
const COMPRESSED_TAG: &str = "binary-compressed:";

pub(crate) fn encode(value: &Value, compression_threshold: usize) -> Result<String, OpstoreError> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Ok(format!("{PLAIN_TAG}{}", serde_json::to_string(value)?))
        }
        Value::Array(_) | Value::Object(_) => {
            let bytes = rmp_serde::to_vec(value)?;
            if bytes.len() > compression_threshold {
                let compressed = gzip(&bytes)?;
                Ok(format!("{COMPRESSED_TAG}{}", hex::encode(compressed)))
            } else {
                Ok(format!("{BINARY_TAG}{}", hex::encode(bytes)))
            }
        }
    }
}

pub(crate) fn decode(raw: &str) -> Value {
    if let Some(hex_data) = raw.strip_prefix(COMPRESSED_TAG)
        && let Some(value) = decode_binary(hex_data, true)
    {
        return value;
    }
    if let Some(hex_data) = raw.strip_prefix(BINARY_TAG)
        && let Some(value) = decode_binary(hex_data, false)
    {
        return value;
    }

    let plain = raw.strip_prefix(PLAIN_TAG).unwrap_or(raw);
    match serde_json::from_str(plain) {
        Ok(value) => value,
        Err(_) => Value::String(raw.to_string()),
    }
}

fn decode_binary(hex_data: &str, compressed: bool) -> Option<Value> {
    let mut bytes = hex::decode(hex_data).ok()?;
    if compressed {
        bytes = gunzip(&bytes).ok()?;
    }
    rmp_serde::from_slice(&bytes).ok()
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
