//! HTTP surface: one form page, one upload endpoint, static images.
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /` | empty upload form |
//! | `POST /` | multipart `pdf` + `topic` + `grade`, renders result or error |
//! | `GET {output_url_prefix}/*` | generated PNGs from `output_dir` |
//!
//! A failed request always renders the page with an error message and the
//! status from [`crate::Pdf2ImgError::status_code`]; handlers never panic
//! and never propagate errors to the transport layer.

mod handlers;
pub mod page;

use crate::illustrate::Illustrator;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use page::Pages;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

/// Headroom for the text fields and multipart framing on top of the file.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub illustrator: Arc<Illustrator>,
    pub pages: Arc<Pages>,
}

impl AppState {
    pub fn new(illustrator: Illustrator) -> Result<Self, minijinja::Error> {
        Ok(Self {
            illustrator: Arc::new(illustrator),
            pages: Arc::new(Pages::new()?),
        })
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = state.illustrator.config();
    let body_limit = config.max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES);
    let static_prefix = config.output_url_prefix.clone();
    let static_files = ServeDir::new(&config.output_dir);

    Router::new()
        .route(
            "/",
            get(handlers::index)
                .post(handlers::submit)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest_service(&static_prefix, static_files)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}
