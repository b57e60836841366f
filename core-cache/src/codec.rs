//! Value serialization for the disk tier.

use crate::error::{CacheError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Encode/decode capability pair for cached values.
pub trait Codec<V>: Send + Sync {
    /// Serialize a value into the payload stored on disk.
    fn encode(&self, value: &V) -> Result<Vec<u8>>;

    /// Restore a value from a stored payload.
    ///
    /// Returns [`CacheError::Decode`] for corrupt or foreign content.
    fn decode(&self, bytes: &[u8]) -> Result<V>;
}

/// JSON codec backed by `serde_json`.
pub struct JsonCodec<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> JsonCodec<V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for JsonCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for JsonCodec<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for JsonCodec<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<V> Codec<V> for JsonCodec<V>
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<V> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Album {
        title: String,
        tracks: Vec<u32>,
    }

    #[test]
    fn test_json_codec_nested_value() {
        let codec = JsonCodec::<Album>::new();
        let album = Album {
            title: "Blue".to_string(),
            tracks: vec![1, 2, 3],
        };
        let bytes = codec.encode(&album).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), album);
    }

    #[test]
    fn test_json_codec_none_is_null() {
        let codec = JsonCodec::<Option<String>>::new();
        let bytes = codec.encode(&None).unwrap();
        assert_eq!(bytes, b"null");
        assert_eq!(codec.decode(&bytes).unwrap(), None);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let codec = JsonCodec::<u32>::new();
        let err = codec.decode(b"hahaha").unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }
}
