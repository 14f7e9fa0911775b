#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value, json};

#[derive(Clone, Default)]
struct Users {
    next_id: Arc<AtomicU64>,
    names: Arc<Mutex<HashMap<u64, String>>>,
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn json_document() -> impl IntoResponse {
    (
        [("X-Some-Header", "hello")],
        Json(json!({"a": "a", "b": 2, "c": 3.5, "d": true})),
    )
}

async fn array_document() -> Json<Value> {
    Json(json!(["x", "y"]))
}

async fn items() -> Json<Value> {
    Json(json!({
        "total": 3,
        "items": [
            {"id": 1, "name": "apple", "tags": ["fruit", "red"]},
            {"id": 2, "name": "banana", "tags": ["fruit"]},
            {"id": 3, "name": "carrot", "tags": []}
        ],
        "owner": null
    }))
}

async fn godog() -> Json<Value> {
    Json(json!({"Length": 6, "Content": "godog"}))
}

async fn text() -> &'static str {
    "hello world!"
}

/// Reflect the request back: method, query, headers and raw body.
async fn echo(
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect();
    Json(json!({
        "method": method.as_str(),
        "query": query,
        "headers": headers,
        "body": body,
    }))
}

/// Summarise a multipart body: text fields by value, files by name and size.
async fn upload(mut multipart: Multipart) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let mut fields = Map::new();
    let mut files = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                files.insert(name, json!({"filename": file_name, "size": bytes.len()}));
            }
            None => {
                let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                fields.insert(name, Value::String(value));
            }
        }
    }
    Ok((
        StatusCode::CREATED,
        Json(json!({"fields": fields, "files": files})),
    ))
}

async fn create_user(State(users): State<Users>, Json(input): Json<NewUser>) -> impl IntoResponse {
    let id = users.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    users
        .names
        .lock()
        .expect("users lock poisoned")
        .insert(id, input.name.clone());
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("/users/{id}"))],
        Json(json!({"id": id, "name": input.name})),
    )
}

async fn show_user(State(users): State<Users>, Path(id): Path<u64>) -> impl IntoResponse {
    let names = users.names.lock().expect("users lock poisoned");
    match names.get(&id) {
        Some(name) => (StatusCode::OK, Json(json!({"id": id, "name": name}))),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "user not found"}))),
    }
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

fn router() -> Router {
    Router::new()
        .route("/json", get(json_document))
        .route("/array", get(array_document))
        .route("/items", get(items))
        .route("/godog", get(godog))
        .route("/text", get(text))
        .route("/echo", any(echo))
        .route("/upload", post(upload))
        .route("/users", post(create_user))
        .route("/users/{id}", get(show_user))
        .route("/status/{code}", any(status))
        .with_state(Users::default())
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Start the fixture server on an ephemeral port and return its base URL.
pub async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind to ephemeral port");
    let port = listener
        .local_addr()
        .expect("failed to get local addr")
        .port();

    tokio::spawn(async move {
        axum::serve(listener, router())
            .await
            .expect("fixture server error");
    });

    format!("http://127.0.0.1:{port}")
}

/// A base URL nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind to ephemeral port");
    let port = listener
        .local_addr()
        .expect("failed to get local addr")
        .port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
