use axum::{
    body::Bytes,
    debug_handler,
    extract::Path,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Router,
};
use metrics::counter;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub fn router() -> Router {
    Router::new()
        .route("/pessoas", post(create_person))
        .route("/status/:code", any(status))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/flaky/:fail_every", get(flaky))
        .route("/limited/:max_tps/server/:server_id", get(limited))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router()).await?;
    Ok(())
}

/// Binds an ephemeral local port and serves the mock in the background.
pub async fn spawn() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(error) = run(listener).await {
            tracing::error!("Mock service stopped: {error}");
        }
    });
    Ok(addr)
}

#[derive(Debug, Deserialize)]
#[allow(unused)]
struct Person {
    #[serde(rename = "apelido")]
    nickname: String,
    #[serde(rename = "nome")]
    name: String,
    #[serde(rename = "nascimento")]
    birthday: String,
    stack: Option<Vec<String>>,
}

#[debug_handler]
async fn create_person(body: Bytes) -> impl IntoResponse {
    counter!("mock-service.requests").increment(1);

    match serde_json::from_slice::<Person>(&body) {
        Ok(person) => {
            debug!("Created {}", person.nickname);
            let id = uuid::Uuid::new_v4();
            (
                StatusCode::CREATED,
                [(header::LOCATION, format!("/pessoas/{id}"))],
                "ok",
            )
                .into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "invalid request").into_response(),
    }
}

#[debug_handler]
async fn status(Path(code): Path<u16>) -> StatusCode {
    counter!("mock-service.requests").increment(1);
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

#[debug_handler]
async fn delay(Path(delay_ms): Path<u64>) -> &'static str {
    counter!("mock-service.requests").increment(1);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    "ok"
}

static FLAKY_COUNT: AtomicU64 = AtomicU64::new(0);

/// Fails every `fail_every`-th request across all callers.
#[debug_handler]
async fn flaky(Path(fail_every): Path<u64>) -> StatusCode {
    counter!("mock-service.requests").increment(1);
    let n = FLAKY_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
    if fail_every > 0 && n % fail_every == 0 {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

lazy_static! {
    static ref LIMITED_MAP: Arc<RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Rejects with 429 once `server_id` exceeds `max_tps` requests per second.
#[debug_handler]
async fn limited(
    Path((max_tps, server_id)): Path<(u32, String)>,
) -> Result<&'static str, StatusCode> {
    counter!("mock-service.requests").increment(1);
    let tps = NonZeroU32::new(max_tps).ok_or(StatusCode::BAD_REQUEST)?;

    let read = LIMITED_MAP
        .read()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .get(&server_id)
        .cloned();
    let limiter = match read {
        Some(limiter) => limiter,
        None => LIMITED_MAP
            .write()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .entry(server_id)
            .or_insert_with(|| Arc::new(RateLimiter::direct(Quota::per_second(tps))))
            .clone(),
    };

    match limiter.check() {
        Ok(_) => Ok("ok"),
        Err(_) => {
            debug!("Rate limited");
            Err(StatusCode::TOO_MANY_REQUESTS)
        }
    }
}
