//! Payload encoding shared by shard files and the reference index

use serde_json::Value as Json;

use crate::error::{Result, ShardError};

use super::cipher::{Cipher, Envelope};
use super::ShardContents;

/// Serialize a JSON object, sealing it when a cipher is configured
pub fn encode(contents: &ShardContents, cipher: Option<&Cipher>) -> Result<Vec<u8>> {
    let plain = serde_json::to_vec(contents)?;
    match cipher {
        Some(cipher) => Ok(serde_json::to_vec(&cipher.encrypt(&plain)?)?),
        None => Ok(plain),
    }
}

/// Parse bytes produced by [`encode`].
///
/// Errors when the payload is not an envelope (with a cipher), fails to
/// decrypt, or is not a JSON object.
pub fn decode(bytes: &[u8], cipher: Option<&Cipher>) -> Result<ShardContents> {
    let plain = match cipher {
        Some(cipher) => {
            let envelope: Envelope = serde_json::from_slice(bytes)?;
            cipher.decrypt(&envelope)?
        }
        None => bytes.to_vec(),
    };

    match serde_json::from_slice::<Json>(&plain)? {
        Json::Object(map) => Ok(map),
        other => Err(ShardError::Serialization(format!(
            "expected a JSON object, found {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
