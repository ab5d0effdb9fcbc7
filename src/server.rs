use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use axum::body::{Body, Bytes};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, info};

use crate::fetch::{Fetcher, HttpTransport};
use crate::market::MarketPipeline;
use crate::model::{MarketSnapshot, WeatherSnapshot};
use crate::settings::Settings;
use crate::weather::WeatherPipeline;

const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

#[derive(Clone)]
pub struct AppState {
    pub market: Arc<MarketPipeline>,
    pub weather: Arc<WeatherPipeline>,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let transport = Arc::new(
            HttpTransport::new(&settings.market.user_agent, settings.fetch.timeout())
                .context("building HTTP client")?,
        );
        let fetcher = Fetcher::new(transport, settings.fetch.retry_policy());
        let deadline = settings.fetch.deadline();
        Ok(AppState {
            market: Arc::new(MarketPipeline::new(
                fetcher.clone(),
                &settings.market,
                settings.validation_rules(),
                deadline,
            )),
            weather: Arc::new(WeatherPipeline::new(fetcher, &settings.weather, deadline)),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct MarketRequest {
    previous: Option<MarketSnapshot>,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherRequest {
    #[serde(alias = "city")]
    location: Option<String>,
}

/// Lenient JSON body: empty or malformed input reads as "no options".
fn parse_body<T: Default + for<'de> Deserialize<'de>>(body: &Bytes) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!("Ignoring malformed request body: {}", e);
        T::default()
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/market-prices", get(market_handler).post(market_handler))
        .route("/weather", get(weather_handler).post(weather_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(from_fn(cors_middleware))
        .with_state(state)
}

async fn market_handler(State(state): State<AppState>, body: Bytes) -> Json<MarketSnapshot> {
    let req: MarketRequest = parse_body(&body);
    Json(state.market.run(req.previous.as_ref()).await)
}

/// Query location, `location` before `city`. An unreadable query string
/// counts as absent rather than failing the request.
fn query_location(query: Result<Query<HashMap<String, String>>, QueryRejection>) -> Option<String> {
    let Query(mut params) = query
        .map_err(|e| debug!("Ignoring malformed query string: {}", e))
        .ok()?;
    params.remove("location").or_else(|| params.remove("city"))
}

async fn weather_handler(
    State(state): State<AppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    body: Bytes,
) -> Json<WeatherSnapshot> {
    let req: WeatherRequest = parse_body(&body);
    let location = req.location.or_else(|| query_location(query));
    Json(state.weather.run(location.as_deref()).await)
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        let headers = resp.headers_mut();
        headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
        headers.insert(
            "access-control-allow-methods",
            HeaderValue::from_static("GET,POST,OPTIONS"),
        );
        headers.insert(
            "access-control-allow-headers",
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        return resp;
    }

    let mut resp = next.run(req).await;
    resp.headers_mut()
        .insert("access-control-allow-origin", HeaderValue::from_static("*"));
    resp
}

pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
