//! Bitmap cache shared between parallel decoders.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::format::bitmap::Bitmap;

/// Decoded bitmaps keyed by source identifier.
///
/// Decoding runs outside the lock, so two callers may decode the same key
/// at once. The first value inserted is kept and handed to both.
pub struct BitmapCache<K> {
    entries: Mutex<HashMap<K, Arc<Bitmap>>>,
}

impl<K> Default for BitmapCache<K> {
    fn default() -> Self { Self { entries: Mutex::new(HashMap::new()) } }
}

impl<K: Eq + Hash> BitmapCache<K> {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> MutexGuard<HashMap<K, Arc<Bitmap>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &K) -> Option<Arc<Bitmap>> { self.lock().get(key).cloned() }

    pub fn len(&self) -> usize { self.lock().len() }

    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    /// Returns the cached bitmap for `key`, decoding it with `decode` if
    /// absent. Failed decodes are not cached.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, decode: F) -> Result<Arc<Bitmap>, E>
    where F: FnOnce() -> Result<Bitmap, E> {
        if let Some(bitmap) = self.get(&key) {
            return Ok(bitmap);
        }
        let decoded = Arc::new(decode()?);
        Ok(self.lock().entry(key).or_insert(decoded).clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::format::bitmap::BitDepth;

    fn bitmap(fill: u8) -> Bitmap {
        Bitmap {
            width: 1,
            width_actual: 4,
            height: 1,
            bit_depth: BitDepth::Four,
            palettes: vec![vec![Default::default(); 16]],
            active_palette: 0,
            pixels: vec![fill; 4],
        }
    }

    #[test]
    fn decodes_once_per_key() {
        let cache = BitmapCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let result: Result<_, ()> = cache.get_or_try_insert_with(7i16, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(bitmap(1))
            });
            assert_eq!(result.unwrap().pixels, vec![1; 4]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = BitmapCache::new();
        assert_eq!(cache.get_or_try_insert_with(1u32, || Err("bad header")), Err("bad header"));
        assert!(cache.is_empty());
        let result: Result<_, &str> = cache.get_or_try_insert_with(1u32, || Ok(bitmap(2)));
        assert_eq!(result.unwrap().pixels[0], 2);
    }

    #[test]
    fn racing_inserts_keep_first_value() {
        let cache = BitmapCache::new();
        let results = std::thread::scope(|s| {
            let handles = (0..8u8)
                .map(|i| {
                    let cache = &cache;
                    s.spawn(move || {
                        cache.get_or_try_insert_with(0u8, || Ok::<_, ()>(bitmap(i))).unwrap()
                    })
                })
                .collect::<Vec<_>>();
            handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });
        let kept = cache.get(&0).unwrap();
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &kept)));
    }
}
