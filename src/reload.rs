//! Bundle (re)loading into the live handle

use crate::bundle::BundleHandle;
use crate::error::LoadError;
use crate::metrics::ServiceMetrics;
use crate::models::loader::ArtifactLoader;
use std::sync::Arc;
use tracing::{error, info};

/// Load a fresh bundle and publish it.
///
/// The new bundle is fully validated before the swap. On failure the
/// current bundle stays active and the failure is counted.
pub fn reload_bundle(
    loader: &ArtifactLoader,
    handle: &BundleHandle,
    metrics: &ServiceMetrics,
) -> Result<(), LoadError> {
    match loader.load() {
        Ok(bundle) => {
            let version = bundle.model_version().to_string();
            let loaded_at = bundle.loaded_at();
            let previous = handle.publish(bundle);
            metrics.record_reload(true);
            metrics.set_bundle_loaded(true);
            info!(
                model_version = %version,
                loaded_at = %loaded_at.to_rfc3339(),
                previous_version = previous.as_ref().map(|b| b.model_version()).unwrap_or("none"),
                "Bundle published"
            );
            Ok(())
        }
        Err(e) => {
            metrics.record_reload(false);
            metrics.set_bundle_loaded(handle.is_ready());
            error!(error = %e, ready = handle.is_ready(), "Bundle reload failed, keeping current bundle");
            Err(e)
        }
    }
}

/// Reload the bundle every time the process receives `SIGHUP`
#[cfg(unix)]
pub async fn reload_on_sighup(
    loader: ArtifactLoader,
    handle: Arc<BundleHandle>,
    metrics: Arc<ServiceMetrics>,
) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    while hangup.recv().await.is_some() {
        info!("SIGHUP received, reloading artifact bundle");
        let loader = loader.clone();
        let handle = handle.clone();
        let metrics = metrics.clone();
        // File reads and parsing stay off the async workers
        let joined = tokio::task::spawn_blocking(move || {
            // Errors are logged and counted inside
            let _ = reload_bundle(&loader, &handle, &metrics);
        })
        .await;
        if let Err(e) = joined {
            error!(error = %e, "Reload task failed");
        }
    }
    Ok(())
}
