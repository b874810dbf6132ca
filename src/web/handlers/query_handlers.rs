// src/web/handlers/query_handlers.rs
use crate::query::{GatewayError, QueryGateway, QueryResponse};
use crate::web::types::*;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use tracing::{error, warn};

pub async fn graphql_handler(
    body: String,
    gateway: &State<QueryGateway>,
) -> Result<Json<QueryResponse>, ApiError> {
    // The dataset is read from disk on every query.
    let gateway = gateway.inner().clone();
    let outcome = tokio::task::spawn_blocking(move || gateway.handle(&body)).await;

    match outcome {
        Ok(Ok(response)) => Ok(Json(response)),
        Err(e) => {
            error!("Query task failed: {}", e);
            Err(StandardErrorResponse::new(
                "Internal server error".to_string(),
                "INTERNAL_ERROR".to_string(),
                vec!["Try again in a few moments".to_string()],
            )
            .with_status(Status::InternalServerError))
        }
        Ok(Err(e)) => {
            warn!("Rejected query request: {}", e);
            let suggestions = match e {
                GatewayError::EmptyBody => vec![
                    "Send a JSON body such as {\"query\": \"{ jobs { id } }\"}".to_string(),
                ],
                GatewayError::MalformedBody(_) => vec![
                    "Check your request JSON format".to_string(),
                    "The body must be an object with a \"query\" string".to_string(),
                ],
            };
            Err(
                StandardErrorResponse::new(e.to_string(), "BAD_REQUEST".to_string(), suggestions)
                    .with_status(Status::BadRequest),
            )
        }
    }
}
