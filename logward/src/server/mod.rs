//! The TLS transport in front of the sidecar injector.
//!
//! The Kubernetes API server delivers `AdmissionReview` requests to
//! `POST /mutate`; mutations travel back as an RFC 6902 patch against the
//! submitted object. The webhook never asks for admission processing to
//! halt: skipped objects are allowed unchanged, and a pod whose sidecar
//! configuration cannot be resolved is denied with the resolution error as
//! the message.

mod error;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::{
    DynamicObject,
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use sigfinn::{ExitStatus, LifecycleManager};
use snafu::ResultExt;

pub use self::error::Error;
use crate::inject::{AdmissionObject, Outcome, SidecarInjector};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Where and how the admission endpoint is exposed.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_address: SocketAddr,
    pub tls_cert_file: PathBuf,
    pub tls_key_file: PathBuf,
}

#[derive(Clone)]
struct AppState {
    injector: Arc<SidecarInjector>,
}

/// Serves the admission webhook until SIGINT/SIGTERM, draining in-flight
/// requests before exiting.
///
/// # Errors
///
/// Fails when the TLS credentials cannot be read or the listener cannot be
/// bound.
pub async fn serve(config: ServerConfig, injector: SidecarInjector) -> Result<(), Error> {
    let ServerConfig { listen_address, tls_cert_file, tls_key_file } = config;

    let tls_config =
        RustlsConfig::from_pem_file(&tls_cert_file, &tls_key_file).await.with_context(|_| {
            error::LoadTlsCredentialsSnafu {
                cert_file: tls_cert_file.clone(),
                key_file: tls_key_file.clone(),
            }
        })?;

    let app = router(injector);

    let lifecycle_manager = LifecycleManager::<Error>::new();
    let create_fn = move |shutdown_signal| async move {
        let handle = axum_server::Handle::new();
        let watcher = handle.clone();
        let _drainer = tokio::spawn(async move {
            shutdown_signal.await;
            watcher.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        tracing::info!("Admission webhook listening on {listen_address}");
        match axum_server::bind_rustls(listen_address, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
        {
            Ok(()) => ExitStatus::Success,
            Err(source) => ExitStatus::Error(Error::ServeAdmission { listen_address, source }),
        }
    };
    let _handle = lifecycle_manager.spawn("admission-server".to_string(), create_fn);

    if let Ok(Err(err)) = lifecycle_manager.serve().await {
        tracing::error!("{err}");
        Err(err)
    } else {
        Ok(())
    }
}

fn router(injector: SidecarInjector) -> Router {
    let state = AppState { injector: Arc::new(injector) };
    Router::new()
        .route("/mutate", post(mutate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

async fn mutate_handler(
    State(state): State<AppState>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!("Rejecting malformed admission review, error: {err}");
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };

    Json(admission_response(&state.injector, request).into_review())
}

/// Turns one decoded admission request into the response sent back to the
/// API server.
fn admission_response(
    injector: &SidecarInjector,
    request: AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(&request);
    let Some(object) = request.object else {
        return response;
    };

    let pod_name = if request.name.is_empty() { "<unnamed>" } else { request.name.as_str() };
    let namespace = request.namespace.as_deref().unwrap_or("<cluster>");

    let mut candidate = AdmissionObject::from_dynamic(object);
    let before = candidate.pod_json();
    match injector.mutate(&mut candidate) {
        Ok(Outcome::Skipped(reason)) => {
            tracing::debug!("Leaving {namespace}/{pod_name} untouched: {reason}");
            response
        }
        Ok(Outcome::Injected) => {
            let (Some(before), Some(after)) = (before, candidate.pod_json()) else {
                return AdmissionResponse::invalid(
                    "mutated pod could not be serialized".to_string(),
                );
            };
            tracing::info!("Injecting log sidecar into {namespace}/{pod_name}");
            match response.with_patch(json_patch::diff(&before, &after)) {
                Ok(response) => response,
                Err(err) => AdmissionResponse::invalid(err.to_string()),
            }
        }
        Err(err) => {
            tracing::warn!("Refusing {namespace}/{pod_name}, error: {err}");
            response.deny(err.to_string())
        }
    }
}
