//! Text codec for persisted auth state.
//!
//! State is encoded as pretty-printed JSON. Binary payloads travel as
//! [`Buffer`], which serializes to the tagged form
//!
//! ```json
//! { "type": "Buffer", "data": "3q2+7w==" }
//! ```
//!
//! and decodes back to the exact bytes, wherever it sits in the structure.
//! `data` is standard base64; the array-of-bytes form (`"data": [222, 173]`)
//! is accepted on decode as well.
//!
//! Maps in the encoded types are ordered, so encoding the same state twice
//! produces the same text.

use std::{fmt, ops::Deref};

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{DeserializeOwned, Error as _},
    ser::SerializeStruct,
};
use thiserror::Error;
use zeroize::Zeroize;

/// Tag value marking a binary payload.
pub const BUFFER_TAG: &str = "Buffer";

/// Errors raised by [`encode`] and [`decode`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Input text is not a valid encoding of the requested type.
    #[error("parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// Value could not be rendered as text.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Encodes `value` as pretty-printed JSON with tagged binary payloads.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if a `Serialize` impl fails.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string_pretty(value).map_err(CodecError::Encode)
}

/// Decodes text produced by [`encode`].
///
/// # Errors
///
/// Returns [`CodecError::Parse`] on malformed input or a shape mismatch.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Parse)
}

/// Raw binary payload with a lossless text encoding.
///
/// Contents are scrubbed on [`Zeroize`], which key pairs trigger on drop.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Buffer(Vec<u8>);

impl Buffer {
    /// Wraps raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrows the bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the bytes as a cheaply cloneable [`Bytes`].
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0)
    }

    /// Unwraps the inner vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Recovers a buffer from an untyped JSON subtree holding the tagged form.
    ///
    /// Returns `None` if `value` is not a tagged buffer. Useful for fields
    /// the session hands over as free-form JSON.
    #[must_use]
    pub fn from_tagged(value: &serde_json::Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Buffer {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Bytes> for Buffer {
    fn from(bytes: Bytes) -> Self {
        Self(bytes.to_vec())
    }
}

impl Zeroize for Buffer {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({} bytes)", self.0.len())
    }
}

impl Serialize for Buffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tagged = serializer.serialize_struct("Buffer", 2)?;
        tagged.serialize_field("type", BUFFER_TAG)?;
        tagged.serialize_field("data", &STANDARD.encode(&self.0))?;
        tagged.end()
    }
}

#[derive(Deserialize)]
struct TaggedBuffer {
    #[serde(rename = "type")]
    tag: String,
    data: BufferData,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BufferData {
    Base64(String),
    Octets(Vec<u8>),
}

impl<'de> Deserialize<'de> for Buffer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tagged = TaggedBuffer::deserialize(deserializer)?;
        if tagged.tag != BUFFER_TAG {
            return Err(D::Error::custom(format!(
                "expected type \"{BUFFER_TAG}\", found \"{}\"",
                tagged.tag
            )));
        }
        match tagged.data {
            BufferData::Base64(text) => STANDARD.decode(text).map(Self).map_err(D::Error::custom),
            BufferData::Octets(bytes) => Ok(Self(bytes)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Nested {
        outer: BTreeMap<String, Vec<Buffer>>,
    }

    #[test]
    fn buffer_encodes_as_tagged_base64() {
        let value = serde_json::to_value(Buffer::from([0xde, 0xad, 0xbe, 0xef])).unwrap();
        assert_eq!(value, json!({ "type": "Buffer", "data": "3q2+7w==" }));
    }

    #[test]
    fn nested_buffers_roundtrip_byte_for_byte() {
        let all_bytes: Vec<u8> = (0..=255).collect();
        let value = Nested {
            outer: BTreeMap::from([
                ("empty".to_owned(), vec![Buffer::default()]),
                ("all".to_owned(), vec![Buffer::new(all_bytes.clone()), Buffer::from([0u8; 3])]),
            ]),
        };

        let decoded: Nested = decode(&encode(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.outer["all"][0].as_bytes(), all_bytes.as_slice());
    }

    #[test]
    fn encoding_is_deterministic() {
        let value = Nested {
            outer: BTreeMap::from([
                ("b".to_owned(), vec![Buffer::from([2u8])]),
                ("a".to_owned(), vec![Buffer::from([1u8])]),
            ]),
        };
        let first = encode(&value).unwrap();
        let second = encode(&decode::<Nested>(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn octet_array_form_is_accepted() {
        let buffer: Buffer =
            serde_json::from_value(json!({ "type": "Buffer", "data": [1, 2, 255] })).unwrap();
        assert_eq!(buffer.as_bytes(), &[1, 2, 255]);
    }

    #[test]
    fn wrong_tag_is_rejected() {
        let result: Result<Buffer, _> =
            serde_json::from_value(json!({ "type": "Uint8Array", "data": "AA==" }));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let result = decode::<Buffer>(r#"{"type":"Buffer","data":"not base64!"}"#);
        assert!(matches!(result, Err(CodecError::Parse(_))));
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let result = decode::<Nested>("{\"outer\": {");
        assert!(matches!(result, Err(CodecError::Parse(_))));
    }

    #[test]
    fn from_tagged_reads_untyped_subtrees() {
        let value = json!({ "type": "Buffer", "data": "AQI=" });
        assert_eq!(Buffer::from_tagged(&value).unwrap().as_bytes(), &[1, 2]);
        assert!(Buffer::from_tagged(&json!({ "unrelated": true })).is_none());
    }

    #[test]
    fn debug_hides_contents() {
        assert_eq!(format!("{:?}", Buffer::from([9u8; 32])), "Buffer(32 bytes)");
    }
}
