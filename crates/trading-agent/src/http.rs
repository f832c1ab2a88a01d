//! Read/write HTTP façade over the broker and execution subsystems. Kept
//! deliberately thin: every handler either forwards to `BrokerClient`
//! directly or reuses the same `risk_manager`/`ExecutionAgent` path the
//! scheduled loop uses, so there is exactly one risk-gating code path.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use broker_trait::BrokerClient;
use execution_agent::ExecutionAgent;
use portfolio_manager::PortfolioManager;
use risk_manager::RiskConfig;
use serde::{Deserialize, Serialize};
use trading_core::{Decision, Signal, SignalDirection, Thesis, TradeIntent, TurtleSystem};
use uuid::Uuid;

use crate::rate_limit::{Decision as RateDecision, RateLimiter, RouteClass};

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<dyn BrokerClient>,
    pub portfolio: Arc<PortfolioManager>,
    pub execution: Arc<ExecutionAgent>,
    pub risk_cfg: Arc<RiskConfig>,
    pub limiter: Arc<RateLimiter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/account", get(account))
        .route("/positions", get(positions))
        .route("/orders", get(orders))
        .route("/quotes", get(quotes))
        .route("/clock", get(clock))
        .route("/bars/:symbol", get(bars))
        .route("/snapshot/:symbol", get(snapshot))
        .route("/news", get(news))
        .route("/risk-limits", get(risk_limits))
        .route("/order", post(submit_order))
        .route("/pending-trades", get(pending_trades))
        .route("/pending-trades/:id/approve", post(approve_pending_trade))
        .route("/pending-trades/:id/reject", post(reject_pending_trade))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_layer))
        .with_state(state)
}

async fn rate_limit_layer(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    let class = route_class(req.uri().path());
    let decision = state.limiter.check(class, addr.ip());
    if !decision.allowed {
        return rate_limited_response(&decision);
    }
    next.run(req).await
}

fn route_class(path: &str) -> RouteClass {
    if path == "/order" {
        RouteClass::Order
    } else if path == "/quotes" {
        RouteClass::Quotes
    } else if path.starts_with("/bars/") {
        RouteClass::Bars
    } else if path == "/news" {
        RouteClass::News
    } else if matches!(path, "/account" | "/positions" | "/orders" | "/clock")
        || path.starts_with("/snapshot/")
    {
        RouteClass::AccountRead
    } else {
        RouteClass::Default
    }
}

fn rate_limited_response(decision: &RateDecision) -> Response {
    let mut resp = (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    let headers = resp.headers_mut();
    headers.insert(
        "Retry-After",
        HeaderValue::from_str(&decision.retry_after_secs.to_string()).unwrap(),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
    resp
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn broker_error(e: anyhow::Error) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn account(State(state): State<AppState>) -> Response {
    match state.broker.get_account().await {
        Ok(a) => Json(a).into_response(),
        Err(e) => broker_error(e),
    }
}

async fn positions(State(state): State<AppState>) -> Response {
    match state.broker.get_positions().await {
        Ok(p) => Json(p).into_response(),
        Err(e) => broker_error(e),
    }
}

#[derive(Deserialize)]
struct OrdersQuery {
    #[allow(dead_code)]
    status: Option<String>,
    limit: Option<usize>,
}

async fn orders(State(state): State<AppState>, Query(q): Query<OrdersQuery>) -> Response {
    match state.broker.get_orders(q.limit).await {
        Ok(o) => Json(o).into_response(),
        Err(e) => broker_error(e),
    }
}

#[derive(Deserialize)]
struct SymbolsQuery {
    symbols: Option<String>,
}

async fn quotes(State(state): State<AppState>, Query(q): Query<SymbolsQuery>) -> Response {
    let symbols: Vec<String> = q
        .symbols
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut out = Vec::new();
    for symbol in &symbols {
        match state.broker.get_latest_quote(symbol).await {
            Ok(quote) => out.push(quote),
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "quote fetch failed");
            }
        }
    }
    Json(out).into_response()
}

async fn clock(State(state): State<AppState>) -> Response {
    match state.broker.get_clock().await {
        Ok(c) => Json(c).into_response(),
        Err(e) => broker_error(e),
    }
}

#[derive(Deserialize)]
struct BarsQuery {
    #[allow(dead_code)]
    timeframe: Option<String>,
    limit: Option<usize>,
}

async fn bars(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(q): Query<BarsQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(60);
    match state.broker.get_bars(&symbol, limit).await {
        Ok(b) => Json(b).into_response(),
        Err(e) => broker_error(e),
    }
}

async fn snapshot(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    match state.portfolio.get_portfolio_state().await {
        Ok(portfolio) => match portfolio.position_for(&symbol) {
            Some(position) => Json(position).into_response(),
            None => (StatusCode::NOT_FOUND, "no position for symbol").into_response(),
        },
        Err(e) => broker_error(e),
    }
}

#[derive(Deserialize)]
struct NewsQuery {
    #[allow(dead_code)]
    symbols: Option<String>,
    #[allow(dead_code)]
    limit: Option<usize>,
}

/// News is served by the research hook, not the broker; without one
/// configured this always returns an empty list rather than an error.
async fn news(Query(_q): Query<NewsQuery>) -> Response {
    Json(Vec::<String>::new()).into_response()
}

async fn risk_limits(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "allowed_symbols": state.risk_cfg.allowed_symbols,
        "max_dollars_per_trade": state.risk_cfg.max_dollars_per_trade,
        "max_open_positions": state.risk_cfg.max_open_positions,
        "max_trades_per_day": state.risk_cfg.max_trades_per_day,
        "max_daily_loss": state.risk_cfg.max_daily_loss,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct OrderRequest {
    symbol: String,
    side: String,
    notional: f64,
}

/// A manual, discretionary order placed through the API. It still runs the
/// full risk gate; it just skips signal generation and the decision agent.
async fn submit_order(State(state): State<AppState>, Json(body): Json<OrderRequest>) -> Response {
    let direction = match body.side.to_lowercase().as_str() {
        "buy" => SignalDirection::Long,
        "sell" => SignalDirection::Short,
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: format!("unknown side: {other}"),
                }),
            )
                .into_response()
        }
    };

    let signal = Signal {
        symbol: body.symbol.clone(),
        direction,
        system: TurtleSystem::S1,
        entry_ref: 0.0,
        current_price: 0.0,
        atr_n: 0.0,
        stop_price: 0.0,
        exit_ref: 0.0,
        score_hint: 0.5,
        reason: "manual order via HTTP API".to_string(),
        volume_confirmed: None,
        trend_aligned: None,
        filters_passed: true,
        filter_notes: vec![],
    };
    let intent = TradeIntent {
        symbol: body.symbol.clone(),
        side: direction.broker_side().to_string(),
        notional_usd: body.notional,
        signal,
        stop_price: 0.0,
        exit_trigger: 0.0,
        thesis: Thesis {
            summary: "manual order via HTTP API".to_string(),
            system: None,
            breakout_days: None,
            atr_n: None,
            stop_n: None,
            signal_score: None,
            portfolio_fit: None,
            regime: None,
        },
        confidence: 1.0,
    };

    let portfolio = match state.portfolio.get_portfolio_state().await {
        Ok(p) => p,
        Err(e) => return broker_error(e),
    };

    let risk_result = risk_manager::evaluate(&Decision::Trade(intent), &portfolio, &state.risk_cfg);
    let (order_result, pending) = state.execution.execute(risk_result, &portfolio).await;

    Json(serde_json::json!({ "order": order_result, "pending_trade": pending })).into_response()
}

async fn pending_trades(State(state): State<AppState>) -> Response {
    match state.execution.pending_store().list_pending() {
        Ok(p) => Json(p).into_response(),
        Err(e) => broker_error(e),
    }
}

async fn approve_pending_trade(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let result = state.execution.approve(id).await;
    Json(result).into_response()
}

#[derive(Deserialize, Default)]
struct RejectBody {
    #[serde(default)]
    reason: String,
}

async fn reject_pending_trade(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectBody>>,
) -> Response {
    let reason = body.map(|b| b.0.reason).unwrap_or_default();
    let reason = if reason.is_empty() {
        "rejected via API".to_string()
    } else {
        reason
    };
    if state.execution.reject(id, &reason) {
        (StatusCode::OK, "rejected").into_response()
    } else {
        (StatusCode::NOT_FOUND, "trade not found").into_response()
    }
}
