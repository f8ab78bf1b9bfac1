//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::bridge::BridgeError;
use crate::health::HealthStatus;
use crate::models::{CloseRequest, HistoryQuery, ModifyRequest, TradeRequest};
use crate::service::{CommandError, TradingService};

type AppState = State<Arc<TradingService>>;

fn error_status(err: &CommandError) -> StatusCode {
    match err {
        CommandError::Bridge(BridgeError::Remote(_)) => StatusCode::BAD_REQUEST,
        CommandError::Bridge(BridgeError::NotConnected | BridgeError::Disconnected(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CommandError::Bridge(BridgeError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        CommandError::Bridge(BridgeError::Protocol(_)) | CommandError::InvalidPayload { .. } => {
            StatusCode::BAD_GATEWAY
        }
        CommandError::Bridge(BridgeError::InvalidTimeout(_))
        | CommandError::Bridge(BridgeError::AlreadyStarted | BridgeError::Bind { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        CommandError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "detail": message.into() })),
    )
        .into_response()
}

fn respond<T: Serialize>(result: Result<T, CommandError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                tracing::warn!(status = status.as_u16(), error = %e, "Command failed");
            }
            detail(status, e.to_string())
        }
    }
}

fn rejected(rejection: JsonRejection) -> Response {
    detail(rejection.status(), rejection.body_text())
}

async fn health(State(service): AppState) -> Json<HealthStatus> {
    Json(service.health().await)
}

async fn account(State(service): AppState) -> Response {
    respond(service.account_info().await)
}

async fn positions(State(service): AppState) -> Response {
    respond(service.positions().await)
}

async fn orders(State(service): AppState) -> Response {
    respond(service.orders().await)
}

async fn history(State(service): AppState, Query(query): Query<HistoryQuery>) -> Response {
    respond(service.history(&query).await)
}

async fn trade_buy(
    State(service): AppState,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => respond(service.market_buy(&request).await),
        Err(rejection) => rejected(rejection),
    }
}

async fn trade_sell(
    State(service): AppState,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => respond(service.market_sell(&request).await),
        Err(rejection) => rejected(rejection),
    }
}

async fn trade_close(
    State(service): AppState,
    payload: Result<Json<CloseRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => respond(service.close_position(&request).await),
        Err(rejection) => rejected(rejection),
    }
}

async fn trade_modify(
    State(service): AppState,
    payload: Result<Json<ModifyRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => respond(service.modify_position(&request).await),
        Err(rejection) => rejected(rejection),
    }
}

async fn symbol(State(service): AppState, Path(name): Path<String>) -> Response {
    respond(service.symbol_info(&name).await)
}

async fn symbols(State(service): AppState) -> Response {
    respond(service.symbols().await)
}

async fn tick(State(service): AppState, Path(symbol): Path<String>) -> Response {
    respond(service.tick(&symbol).await)
}

pub fn routes(service: Arc<TradingService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/account", get(account))
        .route("/positions", get(positions))
        .route("/orders", get(orders))
        .route("/history", get(history))
        .route("/trade/buy", post(trade_buy))
        .route("/trade/sell", post(trade_sell))
        .route("/trade/close", post(trade_close))
        .route("/trade/modify", post(trade_modify))
        .route("/symbol/{name}", get(symbol))
        .route("/symbols", get(symbols))
        .route("/tick/{symbol}", get(tick))
        .with_state(service)
}
