use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;
use crate::wifi::Orchestrator;

pub mod routes;

/// Server state
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Outcome of the last failed connect attempt, shown on the form
    last_error: Mutex<Option<String>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            last_error: Mutex::new(None),
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/connect", post(routes::connect))
        .route("/status", get(routes::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Why [`run_manager`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerExit {
    /// The shutdown signal fired
    Signal,
    /// The HTTP server stopped on its own
    ServerStopped,
}

/// Run the Wi-Fi manager until `signal` resolves.
///
/// `signal` races the startup cleanup and access-point setup as well as
/// the server, so an interrupt at any point sets the shutdown flag and
/// restores client networking before returning.
pub async fn run_manager<S>(orchestrator: Arc<Orchestrator>, port: u16, signal: S) -> anyhow::Result<ManagerExit>
where
    S: Future<Output = ()>,
{
    tokio::pin!(signal);

    let startup = async {
        orchestrator.cleanup().await;
        orchestrator.start_access_point().await
    };
    let interrupted = tokio::select! {
        _ = &mut signal => true,
        result = startup => {
            if let Err(e) = result {
                tracing::error!("Access point unavailable: {}", e);
            }
            false
        }
    };
    if interrupted {
        tracing::info!("Interrupted during startup");
        shut_down(&orchestrator).await;
        return Ok(ManagerExit::Signal);
    }

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(start_server(port, orchestrator.clone(), async move {
        stop_rx.await.ok();
    }));

    let server_exit = tokio::select! {
        _ = &mut signal => None,
        joined = &mut server => Some(joined),
    };
    shut_down(&orchestrator).await;

    match server_exit {
        None => {
            stop_tx.send(()).ok();
            server.await??;
            Ok(ManagerExit::Signal)
        }
        Some(joined) => {
            joined??;
            Ok(ManagerExit::ServerStopped)
        }
    }
}

async fn shut_down(orchestrator: &Orchestrator) {
    orchestrator.shutdown().trigger();
    orchestrator.cleanup().await;
}

/// Serve the captive form until `shutdown` resolves
pub async fn start_server<F>(port: u16, orchestrator: Arc<Orchestrator>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState::new(orchestrator));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
