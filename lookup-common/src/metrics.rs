use axum::{routing::get, Router};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::error;

/// Bind a `TcpListener` on the provided bind address to serve a `Router` on it.
/// This function is intended to take a Router as returned by `metrics_router`.
pub async fn serve(router: Router, bind: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, router).await?;

    Ok(())
}

/// Install the recorder, then serve it on `bind` in the background.
///
/// The recorder is in place once this returns, so metrics recorded by tasks started
/// afterwards are never dropped.
pub fn start_metrics_server(bind: String) -> Result<PrometheusHandle, BuildError> {
    let recorder_handle = setup_metrics_recorder()?;
    let router = metrics_router(recorder_handle.clone());

    tokio::task::spawn(async move {
        if let Err(e) = serve(router, &bind).await {
            error!(%bind, "failed to serve metrics: {}", e);
        }
    });

    Ok(recorder_handle)
}

/// Build a Router for a metrics endpoint.
pub fn metrics_router(recorder_handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || std::future::ready(recorder_handle.render())),
    )
}

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(EXPONENTIAL_SECONDS)?
        .install_recorder()
}
