//! CBOR codec shared by every wire message.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a message to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_cbor<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Decode a message from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or do not match the
/// message schema (wrong types, integers out of range for their width).
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    if bytes.is_empty() {
        return Err(CodecError::decoding_failed("empty body"));
    }
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Narrow {
        width: i32,
    }

    #[derive(Debug, Serialize)]
    struct Wide {
        width: i64,
    }

    #[test]
    fn empty_body_is_rejected() {
        let result: CodecResult<Narrow> = from_cbor(&[]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = to_cbor(&Narrow { width: 7 }).unwrap();
        let result: CodecResult<Narrow> = from_cbor(&bytes[..bytes.len() - 1]);
        assert!(result.is_err());
    }

    #[test]
    fn fixed_width_integers_are_enforced() {
        let bytes = to_cbor(&Wide {
            width: i64::from(i32::MAX) + 1,
        })
        .unwrap();
        let result: CodecResult<Narrow> = from_cbor(&bytes);
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn decoding_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = from_cbor::<Narrow>(&bytes);
        }
    }
}
