//! Revocable in-memory registry for captured image bytes.
//!
//! Registering a `CaptureHandle` yields an `ImageRef`, which the UI displays
//! and the decoder resolves. Revoking the ref frees the bytes; a revoked ref
//! no longer resolves. Nothing is freed implicitly, so every registered image
//! must be revoked by whoever stops displaying it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::capture::CaptureHandle;

/// A registered, revocable reference to one captured image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    id: u64,
    file_name: String,
    mime_type: String,
}

impl ImageRef {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "blob:landmark/{}#{}", self.id, self.file_name)
    }
}

#[derive(Default)]
struct StoreInner {
    next_id: u64,
    entries: HashMap<u64, Arc<[u8]>>,
}

/// Shared image registry. Cloning shares the same entries.
#[derive(Clone, Default)]
pub struct ImageStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take ownership of a capture and hand back a reference to it.
    pub fn register(&self, handle: CaptureHandle) -> ImageRef {
        let (bytes, mime_type, file_name) = handle.into_parts();
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.insert(id, Arc::from(bytes));
        tracing::trace!("Registered image {id} ({file_name})");
        ImageRef {
            id,
            file_name,
            mime_type,
        }
    }

    /// The image bytes, or `None` once revoked.
    pub fn resolve(&self, image: &ImageRef) -> Option<Arc<[u8]>> {
        self.lock().entries.get(&image.id).cloned()
    }

    /// Free the bytes behind `image`. Returns false if it was already revoked.
    pub fn revoke(&self, image: &ImageRef) -> bool {
        let removed = self.lock().entries.remove(&image.id).is_some();
        if removed {
            tracing::trace!("Revoked image {}", image.id);
        }
        removed
    }

    /// Number of registered, unrevoked images.
    pub fn live_count(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> CaptureHandle {
        CaptureHandle::new(vec![1, 2, 3], "image/jpeg", name)
    }

    #[test]
    fn test_register_resolve_revoke() {
        let store = ImageStore::new();
        let image = store.register(handle("a.jpg"));
        assert_eq!(store.live_count(), 1);
        assert_eq!(store.resolve(&image).as_deref(), Some(&[1u8, 2, 3][..]));

        assert!(store.revoke(&image));
        assert!(store.resolve(&image).is_none());
        assert!(!store.revoke(&image));
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let store = ImageStore::new();
        let a = store.register(handle("a.jpg"));
        let b = store.register(handle("a.jpg"));
        assert_ne!(a, b);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_clones_share_entries() {
        let store = ImageStore::new();
        let view = store.clone();
        let image = store.register(handle("b.png"));
        assert!(view.resolve(&image).is_some());
        view.revoke(&image);
        assert_eq!(store.live_count(), 0);
    }
}
