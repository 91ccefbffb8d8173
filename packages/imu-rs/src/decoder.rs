// Payload decoding
//
// Turns one transport payload into a Sample. The device emits one JSON object
// per line/message; anything that does not start with `{` (boot banners,
// blank lines, partial frames) is noise and is dropped without comment.

use crate::error::DecodeError;
use crate::types::{RawPayload, Sample};

/// Outcome of a decode attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Sample(Sample),
    /// Not an object; silently skipped
    Ignored,
}

/// Decode a single payload.
///
/// Missing or `null` keys become `None`. Unknown keys are ignored. A present
/// key of the wrong type, truncated JSON, or invalid UTF-8 inside an
/// object-looking payload is a [`DecodeError`].
pub fn decode(payload: &RawPayload) -> Result<Decoded, DecodeError> {
    let bytes = payload.as_bytes().trim_ascii();

    if bytes.first() != Some(&b'{') {
        return Ok(Decoded::Ignored);
    }

    let text = std::str::from_utf8(bytes).map_err(|e| {
        DecodeError::new(
            format!("invalid UTF-8: {}", e),
            &String::from_utf8_lossy(bytes),
        )
    })?;

    serde_json::from_str::<Sample>(text)
        .map(Decoded::Sample)
        .map_err(|e| DecodeError::new(format!("invalid JSON: {}", e), text))
}
