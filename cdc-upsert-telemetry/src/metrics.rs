use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

/// Interval between two upkeep runs of the Prometheus recorder.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

// Global cache for the Prometheus handle used by [`init_metrics_handle`].
//
// A [`Mutex`] is used instead of a `OnceLock` because installation is fallible and
// `OnceLock::get_or_try_init` is unstable. The recorder is global, so a second
// installation would fail; tests call this function many times.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the global Prometheus recorder and returns a handle for rendering metrics.
///
/// The driver decides how the rendered text is exposed. `pipeline` is attached as a global
/// `pipeline` label to every metric. Later calls return the cached handle and ignore their
/// arguments.
///
/// When called inside a tokio runtime a background task periodically runs recorder upkeep so
/// histogram buckets do not grow without bound.
pub fn init_metrics_handle(pipeline: Option<&str>) -> Result<PrometheusHandle, BuildError> {
    let mut prometheus_handle = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(handle) = &*prometheus_handle {
        return Ok(handle.clone());
    }

    let mut builder = PrometheusBuilder::new();
    if let Some(pipeline) = pipeline {
        builder = builder.add_global_label("pipeline", pipeline);
    }

    let handle = builder.install_recorder()?;
    *prometheus_handle = Some(handle.clone());

    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        let upkeep_handle = handle.clone();
        runtime.spawn(async move {
            loop {
                tokio::time::sleep(UPKEEP_INTERVAL).await;
                trace!("running metrics upkeep");
                upkeep_handle.run_upkeep();
            }
        });
    }

    Ok(handle)
}
