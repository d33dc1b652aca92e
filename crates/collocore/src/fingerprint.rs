use std::hash::{Hash, Hasher};

use fxhash::FxHasher64;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Binds a store to the lexicon (and grammar configuration) used to build
/// it. Two fingerprints match when their `build_uuid` and `config_hash`
/// agree; `built_at` is carried for diagnostics only and is not compared,
/// since two runs of the very same build can legitimately differ by a few
/// milliseconds of wall-clock time on the same UUID.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Fingerprint {
    pub build_uuid: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub built_at: OffsetDateTime,
    pub config_hash: u64,
}

impl Fingerprint {
    /// Starts a fresh fingerprint for a new build, mixing the grammar
    /// configuration's serialized bytes into `config_hash` so that a store
    /// built under one configuration is refused against another.
    pub fn new(config_bytes: &[u8]) -> Self {
        Fingerprint {
            build_uuid: Uuid::new_v4(),
            built_at: OffsetDateTime::now_utc(),
            config_hash: hash_bytes(config_bytes),
        }
    }

    pub fn matches(&self, other: &Fingerprint) -> bool {
        self.build_uuid == other.build_uuid && self.config_hash == other.config_hash
    }

    /// Fixed-width encoding (16-byte uuid + 16-byte nanosecond timestamp +
    /// 8-byte hash) used by the lexicon and store file formats, kept
    /// alongside `binio`'s other fixed-width primitives rather than going
    /// through `serde_json` for a struct this small and this load-bearing.
    pub fn to_bytes(self) -> [u8; 40] {
        let mut out = [0u8; 40];
        out[0..16].copy_from_slice(self.build_uuid.as_bytes());
        out[16..32].copy_from_slice(&self.built_at.unix_timestamp_nanos().to_le_bytes());
        out[32..40].copy_from_slice(&self.config_hash.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; 40]) -> Option<Fingerprint> {
        let build_uuid = Uuid::from_slice(&bytes[0..16]).ok()?;
        let nanos = i128::from_le_bytes(bytes[16..32].try_into().ok()?);
        let built_at = OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()?;
        let config_hash = u64::from_le_bytes(bytes[32..40].try_into().ok()?);
        Some(Fingerprint { build_uuid, built_at, config_hash })
    }
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher64::default();
    bytes.hash(&mut hasher);
    hasher.finish()
}
