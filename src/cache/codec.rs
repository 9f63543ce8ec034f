// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Payload codec for persisted cache entries.
//!
//! Entries are serialized to JSON and zstd-compressed. Decoding detects the
//! zstd magic bytes, so rows written as plain JSON still load.
//!
//! The integrity hash is SHA-256 over the *uncompressed* JSON, hex-encoded,
//! so it does not depend on the compression level.

use sha2::{Digest, Sha256};

use super::traits::{CacheEntry, CacheError};

/// Zstd magic bytes (little-endian): 0xFD2FB528
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

const COMPRESSION_LEVEL: i32 = 3;

/// Encoded payload plus the hash of its JSON form.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub payload: Vec<u8>,
    pub hash: String,
}

#[inline]
#[must_use]
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZSTD_MAGIC
}

#[must_use]
pub fn content_hash(json: &[u8]) -> String {
    hex::encode(Sha256::digest(json))
}

pub fn encode(entry: &CacheEntry) -> Result<Encoded, CacheError> {
    let json = serde_json::to_vec(entry).map_err(|e| CacheError::Codec(e.to_string()))?;
    let hash = content_hash(&json);
    let payload = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
        .map_err(|e| CacheError::Codec(format!("compression failed: {}", e)))?;
    Ok(Encoded { payload, hash })
}

/// Decode a payload; returns the entry and the hash of its JSON form.
pub fn decode(data: &[u8]) -> Result<(CacheEntry, String), CacheError> {
    let json = if is_compressed(data) {
        zstd::decode_all(data).map_err(|e| CacheError::Codec(format!("decompression failed: {}", e)))?
    } else {
        data.to_vec()
    };
    let hash = content_hash(&json);
    let entry = serde_json::from_slice(&json).map_err(|e| CacheError::Codec(e.to_string()))?;
    Ok((entry, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::traits::CachedCampaign;
    use crate::model::{AdGroup, Entity, EntityStatus};

    fn entry() -> CacheEntry {
        let mut entry = CacheEntry::default();
        entry.campaigns.insert(
            "c1".into(),
            CachedCampaign {
                ad_groups: (0..50)
                    .map(|i| AdGroup::new(Entity::new(format!("g{}", i), "Lookalike audience", EntityStatus::Active)))
                    .collect(),
            },
        );
        entry
    }

    #[test]
    fn test_encoded_payload_is_compressed() {
        let encoded = encode(&entry()).unwrap();
        assert!(is_compressed(&encoded.payload));
        let json_len = serde_json::to_vec(&entry()).unwrap().len();
        assert!(encoded.payload.len() < json_len);
    }

    #[test]
    fn test_decode_returns_matching_hash() {
        let encoded = encode(&entry()).unwrap();
        let (decoded, hash) = decode(&encoded.payload).unwrap();
        assert_eq!(decoded, entry());
        assert_eq!(hash, encoded.hash);
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_plain_json_still_decodes() {
        let (decoded, _) = decode(br#"{"campaigns":{"c1":{"adGroups":[]}}}"#).unwrap();
        assert!(decoded.campaigns.contains_key("c1"));
    }

    #[test]
    fn test_garbage_is_codec_error() {
        assert!(matches!(decode(b"not json"), Err(CacheError::Codec(_))));
        let mut truncated = encode(&entry()).unwrap().payload;
        truncated.truncate(10);
        assert!(matches!(decode(&truncated), Err(CacheError::Codec(_))));
    }
}
