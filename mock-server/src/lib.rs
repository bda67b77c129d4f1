//! Local HTTP echo server for exercising the relay end to end.
//!
//! Any `POST` whose body is valid JSON is answered with `200` and the request
//! body echoed back byte-for-byte, so formatting such as `"test": "data"`
//! survives the round trip. Anything else gets `400` with a JSON error.

use axum::{
    body::Bytes,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;

#[derive(Debug, Serialize)]
pub struct EchoError {
    pub error: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/", post(echo))
        .route("/{*path}", post(echo))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(body: Bytes) -> Response {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(_) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(EchoError {
                error: format!("Invalid JSON: {e}"),
            }),
        )
            .into_response(),
    }
}
