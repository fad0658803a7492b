// crates/core/src/llm/cache.rs
//! Bounded LRU cache keyed by request fingerprint.
//!
//! The fingerprint is a stable SHA-256 over `(model, system, user)`;
//! identical prompts against the same model always map to the same entry.
//! Writes happen only on successful completions, so invariant: a hit
//! returns exactly the text observed when the entry was written.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use sha2::{Digest, Sha256};

/// Stable cache key for one request.
pub fn fingerprint(model: &str, system_prompt: &str, user_prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b"\n");
    hasher.update(system_prompt.as_bytes());
    hasher.update(b"\n");
    hasher.update(user_prompt.as_bytes());
    hex::encode(hasher.finalize())
}

struct Inner {
    lru: LruCache<String, String>,
    approx_bytes: u64,
}

/// Thread-safe bounded completion cache. Last-writer-wins on identical
/// fingerprints; completions for the same fingerprint are equivalent.
pub struct CompletionCache {
    inner: Mutex<Inner>,
}

impl CompletionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is non-zero");
        Self {
            inner: Mutex::new(Inner {
                lru: LruCache::new(capacity),
                approx_bytes: 0,
            }),
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<String> {
        let mut inner = self.lock();
        inner.lru.get(fingerprint).cloned()
    }

    pub fn put(&self, fingerprint: String, completion: String) {
        let mut inner = self.lock();
        let added = (fingerprint.len() + completion.len()) as u64;
        if let Some((old_key, old_value)) = inner.lru.push(fingerprint, completion) {
            // push returns the displaced entry: either the previous value
            // under the same key or an evicted LRU victim.
            inner.approx_bytes = inner
                .approx_bytes
                .saturating_sub((old_key.len() + old_value.len()) as u64);
        }
        inner.approx_bytes += added;
    }

    pub fn len(&self) -> u64 {
        self.lock().lru.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lru.is_empty()
    }

    pub fn approx_bytes(&self) -> u64 {
        self.lock().approx_bytes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
