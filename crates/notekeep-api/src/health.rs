//! `GET /health`

use axum::Json;
use notekeep_core::{note::now_millis, wire::format_timestamp};
use serde_json::{Value, json};

pub async fn handler() -> Json<Value> {
  Json(json!({ "status": "ok", "timestamp": format_timestamp(now_millis()) }))
}
