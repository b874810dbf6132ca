// src/web/handlers/system_handlers.rs
use crate::web::pages;
use crate::web::types::*;

use rocket::response::content::RawHtml;
use rocket::serde::json::Json;
use tracing::debug;

pub async fn index_handler() -> RawHtml<String> {
    RawHtml(pages::render_form())
}

pub async fn graphiql_handler() -> RawHtml<&'static str> {
    RawHtml(pages::GRAPHIQL)
}

pub async fn health_handler() -> Json<TextResponse> {
    debug!("Health check");
    Json(TextResponse::success("OK".to_string()))
}
