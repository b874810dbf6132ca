// src/query/gateway.rs
//! Accepts a raw request body, parses it and runs it against a fresh snapshot

use super::executor::{execute, QueryResponse};
use super::parser::parse_document;
use crate::dataset::SnapshotSource;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Body of a query call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Rejections raised before the document reaches the engine.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No query data")]
    EmptyBody,
    #[error("Error parsing JSON request body: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct QueryGateway {
    source: Arc<dyn SnapshotSource>,
}

impl QueryGateway {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self { source }
    }

    pub fn parse_body(body: &str) -> Result<QueryRequest, GatewayError> {
        if body.trim().is_empty() {
            return Err(GatewayError::EmptyBody);
        }
        Ok(serde_json::from_str(body)?)
    }

    /// Parse, validate and resolve one query document. Never fails: problems end up in `errors`.
    pub fn execute(&self, request: &QueryRequest) -> QueryResponse {
        let document = match parse_document(&request.query) {
            Ok(document) => document,
            Err(err) => {
                warn!("Failed to parse query document: {}", err);
                return QueryResponse::failed(vec![err.into()]);
            }
        };

        let variables = request.variables.clone().unwrap_or_default();
        let operation_name = request
            .operation_name
            .as_deref()
            .filter(|name| !name.is_empty());

        let response = execute(&document, operation_name, &variables, self.source.as_ref());
        if response.errors.is_empty() {
            debug!("Query resolved without errors");
        } else {
            warn!(
                "Query resolved with {} error(s): {:?}",
                response.errors.len(),
                response
                    .errors
                    .iter()
                    .map(|err| err.message.as_str())
                    .collect::<Vec<_>>()
            );
        }
        response
    }

    pub fn handle(&self, body: &str) -> Result<QueryResponse, GatewayError> {
        let request = Self::parse_body(body)?;
        Ok(self.execute(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::engine::tests::sample;
    use serde_json::json;

    fn gateway() -> QueryGateway {
        QueryGateway::new(Arc::new(sample()))
    }

    #[test]
    fn test_empty_body_rejected() {
        assert!(matches!(gateway().handle(""), Err(GatewayError::EmptyBody)));
        assert!(matches!(gateway().handle("  \n"), Err(GatewayError::EmptyBody)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            gateway().handle("{\"query\": "),
            Err(GatewayError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_handle_full_body() {
        let body = json!({
            "query": "query Pick($id: Int) { job(id: $id) { company } }",
            "variables": {"id": 1},
            "operationName": "Pick"
        })
        .to_string();
        let response = gateway().handle(&body).unwrap();
        assert_eq!(response.data, Some(json!({"job": {"company": "Acme"}})));
        assert!(response.errors.is_empty());
    }

    #[test]
    fn test_syntax_error_yields_null_data() {
        let response = gateway().execute(&QueryRequest::new("{ jobs { id }"));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["data"], Value::Null);
        assert_eq!(value["errors"][0]["locations"][0]["line"], 1);
        assert!(value["errors"][0]["message"]
            .as_str()
            .unwrap()
            .starts_with("Syntax Error"));
    }

    #[test]
    fn test_missing_query_field_is_syntax_error() {
        let response = gateway().handle("{}").unwrap();
        assert_eq!(response.data, None);
        assert_eq!(response.errors.len(), 1);
    }

    #[test]
    fn test_null_variables_and_blank_operation_name() {
        let body = r#"{"query": "{ jobs { id } }", "variables": null, "operationName": ""}"#;
        let response = gateway().handle(body).unwrap();
        assert_eq!(response.data, Some(json!({"jobs": [{"id": 1}, {"id": 2}]})));
    }
}
