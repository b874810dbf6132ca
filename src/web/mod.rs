// src/web/mod.rs

pub mod handlers;
pub mod pages;
pub mod types;

pub use handlers::*;
pub use types::*;

use crate::core::ConfigManager;
use crate::dataset::JsonFileSnapshot;
use crate::query::{QueryGateway, QueryResponse};
use crate::render::{DevToolsChannel, RenderPipeline};
use anyhow::{Context, Result};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Provider;
use rocket::form::Form;
use rocket::http::{Header, Status};
use rocket::response::content::RawHtml;
use rocket::serde::json::Json;
use rocket::{catchers, get, options, post, routes, Build, Request, Response, Rocket, State};
use std::sync::Arc;
use tracing::info;

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
    }
}

/// Everything the routes pull from managed state.
pub struct AppState {
    pub gateway: QueryGateway,
    pub pipeline: RenderPipeline,
    pub config: ServerConfig,
}

impl AppState {
    /// Wire the JSON dataset file and the DevTools browser channel.
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        let snapshot = JsonFileSnapshot::new(config.environment.dataset_path.clone());
        info!("Dataset: {}", snapshot.path().display());
        let channel = DevToolsChannel::new(
            config.browser.devtools_url.clone(),
            config.browser.command_timeout,
        )
        .context("Invalid browser endpoint")?;

        Ok(Self {
            gateway: QueryGateway::new(Arc::new(snapshot)),
            pipeline: RenderPipeline::new(Arc::new(channel)),
            config: ServerConfig {
                output_path: config.environment.output_path.clone(),
                browser: config.browser.clone(),
            },
        })
    }
}

#[post("/graphql", data = "<body>")]
pub async fn graphql(
    body: String,
    gateway: &State<QueryGateway>,
) -> Result<Json<QueryResponse>, ApiError> {
    handlers::graphql_handler(body, gateway).await
}

#[get("/graphiql")]
pub async fn graphiql() -> RawHtml<&'static str> {
    handlers::graphiql_handler().await
}

#[get("/")]
pub async fn index() -> RawHtml<String> {
    handlers::index_handler().await
}

#[post("/", data = "<form>")]
pub async fn render(
    form: Option<Form<RenderForm>>,
    config: &State<ServerConfig>,
    pipeline: &State<RenderPipeline>,
) -> Result<RawHtml<String>, ApiError> {
    handlers::render_handler(form, config, pipeline).await
}

#[post("/process", data = "<form>")]
pub async fn process(
    form: Option<Form<RenderForm>>,
    config: &State<ServerConfig>,
    pipeline: &State<RenderPipeline>,
) -> Result<RawHtml<String>, ApiError> {
    handlers::render_handler(form, config, pipeline).await
}

#[get("/health")]
pub async fn health() -> Json<TextResponse> {
    handlers::health_handler().await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

// Error catchers
#[rocket::catch(400)]
pub fn bad_request() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Invalid request format".to_string(),
        "BAD_REQUEST".to_string(),
        vec!["Check your request format".to_string()],
    ))
}

#[rocket::catch(404)]
pub fn not_found(request: &Request<'_>) -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        format!("No route for {} {}", request.method(), request.uri()),
        "NOT_FOUND".to_string(),
        vec!["Available routes: /, /process, /graphql, /graphiql, /health".to_string()],
    ))
}

#[rocket::catch(413)]
pub fn payload_too_large() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Request body exceeds the configured size limit".to_string(),
        "PAYLOAD_TOO_LARGE".to_string(),
        vec!["Shorten the query document or raise ROCKET_LIMITS".to_string()],
    ))
}

#[rocket::catch(422)]
pub fn unprocessable() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Request body could not be processed".to_string(),
        "UNPROCESSABLE_ENTITY".to_string(),
        vec!["Verify all required fields are present".to_string()],
    ))
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Internal server error".to_string(),
        "INTERNAL_ERROR".to_string(),
        vec![
            "Try again in a few moments".to_string(),
            "Contact support if the problem persists".to_string(),
        ],
    ))
}

pub fn build_rocket<P: Provider>(figment: P, state: AppState) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(Cors)
        .manage(state.gateway)
        .manage(state.pipeline)
        .manage(state.config)
        .register(
            "/",
            catchers![
                bad_request,
                not_found,
                payload_too_large,
                unprocessable,
                internal_error
            ],
        )
        .mount(
            "/",
            routes![graphql, graphiql, index, render, process, health, options],
        )
}

// Main server start function
pub async fn start_web_server(config: ConfigManager) -> Result<()> {
    let state = AppState::from_config(&config)?;

    info!("Starting job-press server on port {}", config.port);
    info!("Render output: {}", config.environment.output_path.display());
    info!("Browser endpoint: {}", config.browser.devtools_url);

    let figment = rocket::Config::figment()
        .merge(("port", config.port))
        .merge(("address", "0.0.0.0"));

    let _rocket = build_rocket(figment, state)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Web server failed: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BrowserConfig;
    use crate::dataset::SnapshotSource;
    use crate::query::engine::tests::sample;
    use crate::render::{BrowserChannel, BrowserSession, RenderError};
    use async_trait::async_trait;
    use rocket::http::ContentType;
    use rocket::local::blocking::Client;
    use serde_json::{json, Value};
    use std::path::{Path, PathBuf};

    struct StubChannel {
        navigation_fails: bool,
    }

    struct StubSession {
        navigation_fails: bool,
    }

    #[async_trait]
    impl BrowserChannel for StubChannel {
        async fn open_session(&self) -> Result<Box<dyn BrowserSession>, RenderError> {
            Ok(Box::new(StubSession {
                navigation_fails: self.navigation_fails,
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for StubSession {
        async fn set_user_agent(&mut self, _user_agent: &str) -> Result<(), RenderError> {
            Ok(())
        }

        async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
            if self.navigation_fails {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                });
            }
            Ok(())
        }

        async fn wait_visible(&mut self, _selector: &str) -> Result<(), RenderError> {
            Ok(())
        }

        async fn print_to_pdf(&mut self, _print_background: bool) -> Result<Vec<u8>, RenderError> {
            Ok(b"%PDF-1.4 stub".to_vec())
        }

        async fn close(&mut self) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn client_with(
        source: Arc<dyn SnapshotSource>,
        navigation_fails: bool,
        output_path: PathBuf,
    ) -> Client {
        let state = AppState {
            gateway: QueryGateway::new(source),
            pipeline: RenderPipeline::new(Arc::new(StubChannel { navigation_fails })),
            config: ServerConfig {
                output_path,
                browser: BrowserConfig::default(),
            },
        };
        Client::tracked(build_rocket(rocket::Config::figment(), state)).unwrap()
    }

    fn client(output_path: &Path) -> Client {
        client_with(Arc::new(sample()), false, output_path.to_path_buf())
    }

    #[test]
    fn test_graphql_job_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir.path().join("out.pdf"));

        let response = client
            .post("/graphql")
            .header(ContentType::JSON)
            .body(r#"{"query": "{ job(id: 2) { position } }"}"#)
            .dispatch();

        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            response.into_string().unwrap(),
            r#"{"data":{"job":{"position":"Designer"}},"errors":[]}"#
        );
    }

    #[test]
    fn test_graphql_missing_job_is_null_without_errors() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir.path().join("out.pdf"));

        let response = client
            .post("/graphql")
            .body(r#"{"query": "{ job(id: 99) { position } }"}"#)
            .dispatch();

        let body: Value = response.into_json().unwrap();
        assert_eq!(body, json!({"data": {"job": null}, "errors": []}));
    }

    #[test]
    fn test_graphql_rejects_empty_and_malformed_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir.path().join("out.pdf"));

        let response = client.post("/graphql").dispatch();
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["type"], json!("error"));
        assert_eq!(body["error"], json!("No query data"));

        let response = client.post("/graphql").body("{not json").dispatch();
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["error_code"], json!("BAD_REQUEST"));
    }

    #[test]
    fn test_graphql_deeply_nested_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir.path().join("out.pdf"));

        let query = format!(
            "{{ job(id: 1, x: {}{}) {{ id }} }}",
            "[".repeat(2000),
            "]".repeat(2000)
        );
        let body = json!({ "query": query }).to_string();
        let response = client.post("/graphql").body(body).dispatch();

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["data"], Value::Null);
        assert!(body["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("Query nesting exceeds maximum depth"));

        let response = client.get("/health").dispatch();
        assert_eq!(response.status(), Status::Ok);
    }

    #[test]
    fn test_graphql_oversized_body_gets_error_document() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir.path().join("out.pdf"));

        let query = format!("{{ jobs {{ id }} }}{}", " ".repeat(20_000));
        let body = json!({ "query": query }).to_string();
        let response = client.post("/graphql").body(body).dispatch();

        assert_eq!(response.status(), Status::PayloadTooLarge);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["error_code"], json!("PAYLOAD_TOO_LARGE"));
    }

    #[test]
    fn test_graphql_unreadable_dataset_still_answers() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = JsonFileSnapshot::new(dir.path().join("missing.json"));
        let client = client_with(Arc::new(snapshot), false, dir.path().join("out.pdf"));

        let response = client
            .post("/graphql")
            .body(r#"{"query": "{ jobs { id } }"}"#)
            .dispatch();

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["data"], json!({"jobs": null}));
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_render_persists_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("prescription.pdf");
        let client = client(&output);

        let response = client
            .post("/process")
            .header(ContentType::Form)
            .body("new_data=https%3A%2F%2Fwww.github.com&new_data=https%3A%2F%2Fwww.wikipedia.org")
            .dispatch();

        assert_eq!(response.status(), Status::Ok);
        assert!(response.into_string().unwrap().contains("select example to turn to pdf"));
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.4 stub");
    }

    #[test]
    fn test_render_unreachable_host_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("prescription.pdf");
        let client = client_with(Arc::new(sample()), true, output.clone());

        let response = client
            .post("/")
            .header(ContentType::Form)
            .body("new_data=https%3A%2F%2Funreachable.invalid")
            .dispatch();

        assert_eq!(response.status(), Status::BadGateway);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["error_code"], json!("NAVIGATION_FAILED"));
        assert!(!output.exists());
    }

    #[test]
    fn test_render_rejects_missing_and_invalid_targets() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("prescription.pdf");
        let client = client(&output);

        let response = client
            .post("/process")
            .header(ContentType::Form)
            .body("")
            .dispatch();
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["error_code"], json!("MISSING_TARGET"));

        let response = client
            .post("/process")
            .header(ContentType::Form)
            .body("new_data=ftp%3A%2F%2Fexample.com")
            .dispatch();
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["error_code"], json!("INVALID_TARGET"));
        assert!(!output.exists());
    }

    #[test]
    fn test_static_pages_health_and_cors() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir.path().join("out.pdf"));

        let response = client.get("/").dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            response.headers().get_one("Access-Control-Allow-Origin"),
            Some("*")
        );
        assert!(response.into_string().unwrap().contains(r#"name="new_data""#));

        let response = client.get("/graphiql").dispatch();
        assert!(response.into_string().unwrap().contains("/graphql"));

        let response = client.get("/health").dispatch();
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["message"], json!("OK"));

        let response = client.get("/nowhere").dispatch();
        assert_eq!(response.status(), Status::NotFound);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["error_code"], json!("NOT_FOUND"));
    }
}
