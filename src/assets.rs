// ============================================================================
// ASSETS — keyed image cache fed by background decodes
// ============================================================================
//
// Every key carries a generation.  Starting a load (or cancelling one) bumps
// it, and a completion is applied only if its ticket still matches, so late
// or out-of-order results can never overwrite newer state.

use image::RgbaImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;

use crate::io::{AssetError, load_image_sync};
use crate::{log_err, log_info, log_warn};

/// Identifies one load attempt for a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub key: String,
    pub generation: u64,
}

#[derive(Default)]
pub struct AssetCache {
    images: HashMap<String, Arc<RgbaImage>>,
    generations: HashMap<String, u64>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self, key: &str) -> u64 {
        let g = self.generations.entry(key.to_string()).or_insert(0);
        *g += 1;
        *g
    }

    /// Start a load for `key`; any earlier in-flight load becomes stale.
    pub fn begin(&mut self, key: &str) -> LoadTicket {
        LoadTicket { key: key.to_string(), generation: self.bump(key) }
    }

    /// Invalidate whatever is in flight for `key`.  A cached image stays.
    pub fn cancel(&mut self, key: &str) {
        self.bump(key);
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.generations.get(&ticket.key).copied() == Some(ticket.generation)
    }

    /// Apply a finished load.  Returns true when an image was stored.
    /// Stale tickets are dropped; failures are logged and leave the key unset.
    pub fn complete(&mut self, ticket: &LoadTicket, result: Result<RgbaImage, AssetError>) -> bool {
        if !self.is_current(ticket) {
            log_warn!("Discarding stale load for '{}' (generation {})", ticket.key, ticket.generation);
            return false;
        }
        match result {
            Ok(img) => {
                log_info!("Loaded '{}' ({}x{})", ticket.key, img.width(), img.height());
                self.images.insert(ticket.key.clone(), Arc::new(img));
                true
            }
            Err(e) => {
                log_err!("Failed to load '{}': {}", ticket.key, e);
                self.images.remove(&ticket.key);
                false
            }
        }
    }

    /// Store an already-decoded image.  Supersedes anything in flight.
    pub fn insert(&mut self, key: &str, image: RgbaImage) -> Arc<RgbaImage> {
        self.bump(key);
        let image = Arc::new(image);
        self.images.insert(key.to_string(), Arc::clone(&image));
        image
    }

    pub fn get(&self, key: &str) -> Option<Arc<RgbaImage>> {
        self.images.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.images.contains_key(key)
    }

}

struct Completion {
    ticket: LoadTicket,
    result: Result<RgbaImage, AssetError>,
}

/// Decodes images on the rayon pool and feeds the cache between ticks.
pub struct AssetLoader {
    cache: AssetCache,
    sender: mpsc::Sender<Completion>,
    receiver: mpsc::Receiver<Completion>,
    in_flight: usize,
    /// Generation of the live request per key, until it reports back.
    loading: HashMap<String, u64>,
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLoader {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { cache: AssetCache::new(), sender, receiver, in_flight: 0, loading: HashMap::new() }
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut AssetCache {
        &mut self.cache
    }

    pub fn get(&self, key: &str) -> Option<Arc<RgbaImage>> {
        self.cache.get(key)
    }

    /// A current (non-cancelled) load for `key` has not reported yet.
    pub fn is_loading(&self, key: &str) -> bool {
        self.loading.contains_key(key)
    }

    /// Loads started but not yet drained.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Decode `path` in the background and store it under `key`.
    pub fn request(&mut self, key: &str, path: PathBuf) -> LoadTicket {
        let ticket = self.cache.begin(key);
        let sender = self.sender.clone();
        let job_ticket = ticket.clone();
        self.in_flight += 1;
        self.loading.insert(key.to_string(), ticket.generation);
        log_info!("Loading '{}' from {}", key, path.display());
        rayon::spawn(move || {
            let result = load_image_sync(&path);
            let _ = sender.send(Completion { ticket: job_ticket, result });
        });
        ticket
    }

    pub fn cancel(&mut self, key: &str) {
        self.cache.cancel(key);
        self.loading.remove(key);
    }

    fn apply(&mut self, c: Completion, ready: &mut Vec<String>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.loading.get(&c.ticket.key) == Some(&c.ticket.generation) {
            self.loading.remove(&c.ticket.key);
        }
        if self.cache.complete(&c.ticket, c.result) {
            ready.push(c.ticket.key);
        }
    }

    /// Drain finished loads without blocking.  Returns keys that became
    /// available.
    pub fn poll(&mut self) -> Vec<String> {
        let mut ready = Vec::new();
        while let Ok(c) = self.receiver.try_recv() {
            self.apply(c, &mut ready);
        }
        ready
    }

    /// Block until every outstanding load has reported.
    pub fn wait_all(&mut self) -> Vec<String> {
        let mut ready = Vec::new();
        while self.in_flight > 0 {
            match self.receiver.recv() {
                Ok(c) => self.apply(c, &mut ready),
                Err(_) => break,
            }
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn tiny() -> RgbaImage {
        RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]))
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut cache = AssetCache::new();
        let first = cache.begin("car");
        let second = cache.begin("car");
        assert!(!cache.complete(&first, Ok(tiny())));
        assert!(!cache.contains("car"));
        assert!(cache.complete(&second, Ok(tiny())));
        assert!(cache.contains("car"));
    }

    #[test]
    fn test_out_of_order_completion_keeps_newest() {
        let mut cache = AssetCache::new();
        let old = cache.begin("car");
        let new = cache.begin("car");
        assert!(cache.complete(&new, Ok(RgbaImage::new(5, 5))));
        assert!(!cache.complete(&old, Ok(RgbaImage::new(1, 1))));
        assert_eq!(cache.get("car").unwrap().width(), 5);
    }

    #[test]
    fn test_cancel_discards_in_flight() {
        let mut cache = AssetCache::new();
        let t = cache.begin("curb");
        cache.cancel("curb");
        assert!(!cache.complete(&t, Ok(tiny())));
        assert!(cache.get("curb").is_none());
    }

    #[test]
    fn test_failed_load_leaves_key_unset() {
        let mut cache = AssetCache::new();
        cache.insert("car", tiny());
        let t = cache.begin("car");
        let err = AssetError::Decode { path: PathBuf::from("x.png"), message: "bad".into() };
        assert!(!cache.complete(&t, Err(err)));
        assert!(!cache.contains("car"));
    }

    #[test]
    fn test_loader_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        tiny().save(&good).unwrap();
        let mut loader = AssetLoader::new();
        loader.request("good", good);
        loader.request("bad", dir.path().join("missing.png"));
        let mut ready = loader.wait_all();
        ready.sort();
        assert_eq!(ready, vec!["good".to_string()]);
        assert_eq!(loader.in_flight(), 0);
        assert!(loader.get("good").is_some());
        assert!(loader.get("bad").is_none());
    }

    #[test]
    fn test_loader_cancelled_request_never_lands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        tiny().save(&path).unwrap();
        let mut loader = AssetLoader::new();
        loader.request("a", path);
        assert!(loader.is_loading("a"));
        loader.cancel("a");
        assert!(!loader.is_loading("a"));
        assert!(loader.wait_all().is_empty());
        assert!(loader.get("a").is_none());
    }

    #[test]
    fn test_is_loading_clears_when_load_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.png");
        tiny().save(&path).unwrap();
        let mut loader = AssetLoader::new();
        loader.request("b", path.clone());
        loader.request("missing", dir.path().join("nope.png"));
        loader.wait_all();
        assert!(!loader.is_loading("b"));
        assert!(!loader.is_loading("missing"));
    }
}
