mod api;
mod config;
mod generator;
mod openapi;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use generator::shaped::ShapedRasterizer;
use generator::text::{GlyphRasterizer, TextRasterizer};

#[derive(Clone)]
pub struct AppState {
    pub rasterizer: Arc<dyn TextRasterizer>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = std::env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("BACKEND_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let rasterizer = select_rasterizer();
    info!("text backend: {}", rasterizer.id());

    let state = AppState { rasterizer };
    let openapi = openapi::ApiDoc::openapi();

    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi))
        .route("/health", get(api::health))
        .route("/variants", get(api::variants))
        .route("/generate", post(api::generate))
        .with_state(Arc::new(state));

    let addr: SocketAddr = format!("{host}:{port}").parse().expect("bind addr");
    info!("Starting cardgen on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Probe the shaped backend once and inject the winner; per-request code
/// never branches on availability itself. `TEXT_BACKEND=basic` forces the
/// glyph fallback.
fn select_rasterizer() -> Arc<dyn TextRasterizer> {
    let forced_basic = std::env::var("TEXT_BACKEND")
        .map(|v| v.eq_ignore_ascii_case("basic"))
        .unwrap_or(false);
    if forced_basic {
        return Arc::new(GlyphRasterizer);
    }

    match ShapedRasterizer::probe(&config::all_font_paths()) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            warn!("shaped text backend unavailable, using glyph fallback: {e}");
            Arc::new(GlyphRasterizer)
        }
    }
}
