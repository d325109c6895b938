// THEORY:
// The image cache decouples slow rendering from fast serving. The refresh scheduler
// is the only writer; HTTP handlers are readers. Each slot sits behind its own
// `RwLock`, so refreshing the weather bitmap never blocks a reader of the quote
// bitmap, and a reader of a slot never sees a half-written artifact: the artifact is
// built completely outside the lock and swapped in as a whole.
//
// The bytes are held in `bytes::Bytes`, so a `get` is a reference-count bump rather
// than a copy of the bitmap.

use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::core_modules::slot::Slot;

/// The most recent bitmap produced for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    /// A complete, self-contained encoded bitmap.
    pub bytes: Bytes,
    /// When the artifact was stored.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ImageCache {
    slots: [RwLock<Option<CachedArtifact>>; Slot::COUNT],
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the slot's artifact and stamps it with the current time.
    pub fn set(&self, slot: Slot, bytes: impl Into<Bytes>) {
        let bytes = bytes.into();
        let mut entry = self.slots[slot.index()]
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *entry = Some(CachedArtifact {
            bytes,
            updated_at: Utc::now(),
        });
    }

    /// The slot's artifact, or `None` if it has never been populated.
    pub fn get(&self, slot: Slot) -> Option<CachedArtifact> {
        self.slots[slot.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|artifact| !artifact.bytes.is_empty())
    }

    pub fn is_populated(&self, slot: Slot) -> bool {
        self.get(slot).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unset_slot_is_unavailable() {
        let cache = ImageCache::new();
        for slot in Slot::ALL {
            assert_eq!(cache.get(slot), None);
            assert!(!cache.is_populated(slot));
        }
    }

    #[test]
    fn set_then_get_returns_the_same_bytes() {
        let cache = ImageCache::new();
        let before = Utc::now();
        cache.set(Slot::Quote, vec![1u8, 2, 3]);

        let artifact = cache.get(Slot::Quote).expect("populated");
        assert_eq!(artifact.bytes.as_ref(), &[1, 2, 3]);
        assert!(artifact.updated_at >= before);
        assert!(cache.get(Slot::Weather).is_none());
    }

    #[test]
    fn set_overwrites_wholesale() {
        let cache = ImageCache::new();
        cache.set(Slot::Photo, vec![1u8; 10]);
        let first = cache.get(Slot::Photo).expect("populated");
        cache.set(Slot::Photo, vec![2u8; 4]);
        let second = cache.get(Slot::Photo).expect("populated");

        assert_eq!(second.bytes.as_ref(), &[2, 2, 2, 2]);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn empty_payload_reads_as_unavailable() {
        let cache = ImageCache::new();
        cache.set(Slot::Stocks, Vec::<u8>::new());
        assert!(cache.get(Slot::Stocks).is_none());
    }

    #[test]
    fn readers_never_observe_torn_artifacts() {
        let cache = Arc::new(ImageCache::new());
        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for round in 0..500u32 {
                    let fill = (round % 251) as u8;
                    cache.set(Slot::Calendar, vec![fill; 64 + (round as usize % 7)]);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if let Some(artifact) = cache.get(Slot::Calendar) {
                            let first = artifact.bytes[0];
                            assert!(artifact.bytes.iter().all(|&b| b == first));
                        }
                    }
                })
            })
            .collect();

        writer.join().expect("writer");
        for reader in readers {
            reader.join().expect("reader");
        }
    }
}
