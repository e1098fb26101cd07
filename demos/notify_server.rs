//! Receive PayJS payment notifications with Axum.
//!
//! Run with:
//! ```bash
//! cargo run --example notify_server
//! ```
//!
//! Environment variables (a `.env` file is read if present):
//! - PAYJS_MCHID: merchant id
//! - PAYJS_KEY: merchant key
//! - PORT: server port (default: 3000)

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use payjs_rs::{Key, Notification, PayJsError};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

struct AppState {
    mchid: String,
    key: Key,
}

/// Accepts notifications either as a form body or as a query string.
async fn notify_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: String,
) -> Result<Response, AppError> {
    let raw = if body.is_empty() { query.unwrap_or_default() } else { body };

    let notification = Notification::from_query(&state.key, &raw, Some(state.mchid.as_str()))?;

    tracing::info!(
        payjs_order_id = %notification.payjs_order_id,
        out_trade_no = %notification.out_trade_no,
        total_fee = notification.total_fee,
        paid = notification.paid,
        "payment notification"
    );

    Ok((StatusCode::OK, "success").into_response())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("payjs_rs=debug,notify_server=info,tower_http=info"))
        .init();

    let mchid = std::env::var("PAYJS_MCHID")?;
    let key = Key::new(std::env::var("PAYJS_KEY")?);
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()?;

    let state = Arc::new(AppState { mchid, key });
    let app = Router::new()
        .route("/payjs/notify", post(notify_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{}/payjs/notify", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

struct AppError(PayJsError);

impl From<PayJsError> for AppError {
    fn from(err: PayJsError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            PayJsError::InvalidSignature => StatusCode::UNAUTHORIZED,
            PayJsError::MissingField(_) | PayJsError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(error = %self.0, "notification rejected");
        (status, self.0.to_string()).into_response()
    }
}
