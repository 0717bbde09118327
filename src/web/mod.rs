mod assets;

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    session::{Action, ActionResponse, SessionError, SessionFacade, StatusView},
    store::SessionStore,
};

pub type SharedFacade = Arc<Mutex<SessionFacade<Box<dyn SessionStore>>>>;

#[derive(Clone)]
struct AppState {
    facade: SharedFacade,
}

pub struct WebServerConfig {
    pub facade: SessionFacade<Box<dyn SessionStore>>,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
struct RiskCheckRequest {
    destination: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps session failures onto HTTP status codes.
#[derive(Debug)]
pub struct ApiError(SessionError);

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        ApiError(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            err if err.is_configuration() => StatusCode::INTERNAL_SERVER_ERROR,
            SessionError::Game(_) => StatusCode::BAD_REQUEST,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(facade: SharedFacade) -> Router {
    let state = AppState { facade };
    Router::new()
        .route("/", get(index))
        .route("/styles.css", get(styles))
        .route("/app.js", get(script))
        .route("/api/airports", get(airports))
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/:id", get(session_status))
        .route("/api/sessions/:id/risk-check", post(risk_check))
        .route("/api/sessions/:id/confirm-flight", post(confirm_flight))
        .route("/api/sessions/:id/cancel-flight", post(cancel_flight))
        .route("/api/sessions/:id/heal", post(heal))
        .with_state(state)
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig { facade, host, port } = config;

    let facade = Arc::new(Mutex::new(facade));
    let app = router(facade);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    info!("Flight to Heal live at http://{addr} (Ctrl+C to stop)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down web server");
}

fn with_facade<T>(
    state: &AppState,
    f: impl FnOnce(&mut SessionFacade<Box<dyn SessionStore>>) -> Result<T, SessionError>,
) -> Result<T, ApiError> {
    let mut facade = state.facade.lock().expect("session facade lock poisoned");
    f(&mut *facade).map_err(ApiError::from)
}

async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

async fn styles() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        assets::STYLES_CSS,
    )
}

async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        assets::APP_JS,
    )
}

async fn airports(State(state): State<AppState>) -> Json<BTreeMap<String, [f64; 2]>> {
    let facade = state.facade.lock().expect("session facade lock poisoned");
    let coords = facade
        .world()
        .airports()
        .iter()
        .map(|airport| (airport.code.clone(), [airport.latitude, airport.longitude]))
        .collect();
    Json(coords)
}

async fn start_session(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    with_facade(&state, |facade| facade.start()).map(Json)
}

async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
    with_facade(&state, |facade| facade.status(&id)).map(Json)
}

async fn risk_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RiskCheckRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let action = Action::RiskCheck {
        destination: request.destination,
    };
    with_facade(&state, |facade| facade.dispatch(&id, action)).map(Json)
}

async fn confirm_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    with_facade(&state, |facade| facade.dispatch(&id, Action::ConfirmFlight)).map(Json)
}

async fn cancel_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    with_facade(&state, |facade| facade.dispatch(&id, Action::CancelFlight)).map(Json)
}

async fn heal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    with_facade(&state, |facade| facade.dispatch(&id, Action::Heal)).map(Json)
}
