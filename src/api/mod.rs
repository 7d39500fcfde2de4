//! HTTP API: Axum server exposing the sportsbook under `/api/v1`.
//!
//! Middleware: request tracing, CORS, a per-request timeout and panic
//! recovery. Domain errors are mapped to status codes here and nowhere else.

pub mod identity;
pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::types::SportsbookError;
use routes::AppState;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl SportsbookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SportsbookError::Validation(_)
            | SportsbookError::InsufficientFunds { .. }
            | SportsbookError::Domain(_) => StatusCode::BAD_REQUEST,
            SportsbookError::NotFound { .. } => StatusCode::NOT_FOUND,
            SportsbookError::Duplicate { .. } => StatusCode::CONFLICT,
            SportsbookError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            SportsbookError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            SportsbookError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SportsbookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        let body = ErrorBody { error: self.kind(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);
    if origin == "*" {
        return Ok(cors.allow_origin(Any));
    }
    let origin = origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {origin}"))?;
    Ok(cors.allow_origin(origin))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Bets
        .route("/bets", post(routes::place_bet))
        .route("/bets/my-bets", get(routes::my_bets))
        .route("/bets/:bet_id", get(routes::get_bet))
        // Wallet
        .route("/wallet", post(routes::create_wallet))
        .route("/wallet/balance", get(routes::balance))
        .route("/wallet/deposit", post(routes::deposit))
        .route("/wallet/withdraw", post(routes::withdraw))
        .route("/wallet/transactions", get(routes::transactions))
        // Betting options
        .route("/betting-options", post(routes::create_option))
        .route("/betting-options/game/:game_id", get(routes::options_for_game))
        .route(
            "/betting-options/:option_id",
            get(routes::get_option)
                .patch(routes::update_option)
                .delete(routes::delete_option),
        )
        // Games
        .route("/games", post(routes::create_game).get(routes::list_games))
        .route(
            "/games/:game_id",
            get(routes::get_game)
                .patch(routes::update_game)
                .delete(routes::delete_game),
        )
        .route("/games/:game_id/score", post(routes::set_final_score))
        .route("/games/:game_id/settle", post(routes::settle_game))
        // Leagues
        .route("/leagues", post(routes::create_league).get(routes::list_leagues))
        .route(
            "/leagues/:league_id",
            get(routes::get_league)
                .patch(routes::update_league)
                .delete(routes::delete_league),
        )
        // Users
        .route("/users", post(routes::register))
        .route("/users/me", get(routes::me).patch(routes::update_me))
        .route("/users/me/limits", patch(routes::update_my_limits))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState, server: &ServerConfig) -> Result<Router> {
    Ok(Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(routes::health))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(cors_layer(&server.cors_allow_origin)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Bind and serve until Ctrl+C.
pub async fn serve(state: AppState, server: &ServerConfig) -> Result<()> {
    let app = build_router(state, server)?;
    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(addr = %addr, "Sportsbook API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;
    info!("Sportsbook API stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
