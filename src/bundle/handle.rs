//! Shared, atomically swappable reference to the active bundle

use super::ArtifactBundle;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Owned handle to the active [`ArtifactBundle`].
///
/// Reads are lock-free. A request calls [`BundleHandle::current`] once and
/// uses that snapshot for both transform and predict, so a concurrent
/// [`BundleHandle::publish`] can never mix artifacts from two bundles. The
/// replaced bundle is dropped when its last in-flight reader finishes.
#[derive(Debug, Default)]
pub struct BundleHandle {
    active: ArcSwapOption<ArtifactBundle>,
}

impl BundleHandle {
    /// Handle with no bundle loaded (not ready)
    pub fn empty() -> Self {
        Self {
            active: ArcSwapOption::empty(),
        }
    }

    pub fn with_bundle(bundle: ArtifactBundle) -> Self {
        Self {
            active: ArcSwapOption::from_pointee(bundle),
        }
    }

    /// Snapshot of the active bundle, `None` while not ready
    pub fn current(&self) -> Option<Arc<ArtifactBundle>> {
        self.active.load_full()
    }

    pub fn is_ready(&self) -> bool {
        self.active.load().is_some()
    }

    /// Replace the active bundle, returning the previous one
    pub fn publish(&self, bundle: ArtifactBundle) -> Option<Arc<ArtifactBundle>> {
        self.active.swap(Some(Arc::new(bundle)))
    }

    /// Drop the active bundle; the service becomes unready
    pub fn clear(&self) -> Option<Arc<ArtifactBundle>> {
        self.active.swap(None)
    }
}
