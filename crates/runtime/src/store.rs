//! Behavior profile persistence.
//!
//! Profiles survive restarts through the host's opaque [`ProfileStore`];
//! this module owns the key scheme and the bincode codec, plus the two
//! stock store implementations: in-memory (tests, ephemeral sessions) and
//! one-file-per-key on disk.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use skirmish_core::{BehaviorProfile, SpeciesId};

use crate::error::Result;
use crate::oracle::ProfileStore;

/// Storage key for a species profile blob.
pub fn profile_key(species: SpeciesId) -> String {
    format!("behavior/{}", species.0)
}

pub fn encode_profile(profile: &BehaviorProfile) -> Result<Vec<u8>> {
    Ok(bincode::serialize(profile)?)
}

pub fn decode_profile(blob: &[u8]) -> Result<BehaviorProfile> {
    Ok(bincode::deserialize(blob)?)
}

/// Keyed blob store backed by a mutexed map.
#[derive(Default)]
pub struct MemoryProfileStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, blob: Vec<u8>) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(key.to_string(), blob);
        }
    }
}

/// One file per key under a root directory.
///
/// Keys may contain `/`, which maps to subdirectories. Write failures are
/// logged and swallowed; losing a learned profile is never worth failing
/// a tick over.
pub struct FileProfileStore {
    root: PathBuf,
}

impl FileProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/') {
            // Refuse traversal components outright.
            if part.is_empty() || part == "." || part == ".." {
                continue;
            }
            path.push(part);
        }
        path.set_extension("bin");
        path
    }
}

impl ProfileStore for FileProfileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, blob: Vec<u8>) {
        let path = self.path_for(key);
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &blob)
        };
        if let Err(err) = write() {
            tracing::warn!("profile store: failed to write {}: {err}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::MovementPattern;

    fn profile() -> BehaviorProfile {
        let mut p = BehaviorProfile::new(SpeciesId(7));
        p.is_wave_attacker = true;
        p.danger = 6;
        p.confidence = 0.8;
        p.movement_pattern = MovementPattern::Kite;
        p
    }

    #[test]
    fn profile_codec_round_trip() {
        let original = profile();
        let blob = encode_profile(&original).unwrap();
        let back = decode_profile(&blob).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn corrupt_blob_is_an_error_not_a_panic() {
        assert!(decode_profile(&[0xff, 0x01, 0x02]).is_err());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryProfileStore::new();
        let key = profile_key(SpeciesId(7));
        store.set(&key, encode_profile(&profile()).unwrap());

        let blob = store.get(&key).unwrap();
        assert_eq!(decode_profile(&blob).unwrap(), profile());
        assert!(store.get("behavior/999").is_none());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path());
        let key = profile_key(SpeciesId(7));
        store.set(&key, encode_profile(&profile()).unwrap());

        let blob = store.get(&key).unwrap();
        assert_eq!(decode_profile(&blob).unwrap(), profile());
        assert!(store.get(&profile_key(SpeciesId(8))).is_none());
    }
}
