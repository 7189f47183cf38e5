//! Local preview references for selected images.
//!
//! A preview is a short-lived URL pointing at image bytes held in memory.
//! Every handle is revoked exactly once, when it is dropped, so replacing or
//! resetting the draft's image cannot leak the previous preview.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::ImageBlob;

const PREVIEW_SCHEME: &str = "blob:ecoguard/";

/// Issues preview URLs and tracks which are still live.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<HashMap<Uuid, ImageBlob>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `image` and return its handle. Synchronous; no I/O.
    pub fn create(&self, image: &ImageBlob) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.live.lock().insert(id, image.clone());
        debug!(preview = %id, bytes = image.len(), "preview created");
        PreviewHandle {
            id,
            url: format!("{}{}", PREVIEW_SCHEME, id),
            registry: self.clone(),
        }
    }

    /// Resolve a preview URL to its image, if still live.
    pub fn resolve(&self, url: &str) -> Option<ImageBlob> {
        let id = url.strip_prefix(PREVIEW_SCHEME)?.parse::<Uuid>().ok()?;
        self.live.lock().get(&id).cloned()
    }

    /// Number of previews not yet revoked.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    fn revoke(&self, id: &Uuid) {
        if self.live.lock().remove(id).is_some() {
            debug!(preview = %id, "preview revoked");
        }
    }
}

/// Owning reference to one live preview.
pub struct PreviewHandle {
    id: Uuid,
    url: String,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle").field("url", &self.url).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.revoke(&self.id);
    }
}
