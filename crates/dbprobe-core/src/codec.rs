//! CBOR encoding for messages that cross a context boundary.
//!
//! Only plain data is encoded here. Channel endpoints are moved between
//! contexts as values and never pass through this module.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::compat::CompatibilityReply;
use crate::error::CodecError;

/// Encode any serializable message to CBOR.
pub fn encode<T: Serialize>(message: &T) -> Result<Bytes, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)
        .map_err(|e| CodecError::Encoding(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode a CBOR message.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Decoding(e.to_string()))
}

/// Encode a compatibility reply.
pub fn encode_reply(reply: &CompatibilityReply) -> Result<Bytes, CodecError> {
    encode(reply)
}

/// Decode a compatibility reply.
pub fn decode_reply(bytes: &[u8]) -> Result<CompatibilityReply, CodecError> {
    decode(bytes)
}
