// src/web/handlers/render_handlers.rs
use crate::core::FsOps;
use crate::render::{RenderError, RenderPipeline};
use crate::utils::first_render_target;
use crate::web::pages;
use crate::web::types::*;

use rocket::form::Form;
use rocket::http::Status;
use rocket::response::content::RawHtml;
use rocket::State;
use tracing::{error, info, warn};

pub async fn render_handler(
    form: Option<Form<RenderForm>>,
    config: &State<ServerConfig>,
    pipeline: &State<RenderPipeline>,
) -> Result<RawHtml<String>, ApiError> {
    let values = form.map(|f| f.into_inner().new_data).unwrap_or_default();

    let Some(target) = first_render_target(&values) else {
        warn!("Render request without a target");
        return Err(StandardErrorResponse::new(
            "No render target provided".to_string(),
            "MISSING_TARGET".to_string(),
            vec!["Select a page in the new_data field".to_string()],
        )
        .with_status(Status::BadRequest));
    };

    let job = config
        .browser
        .job_for(target)
        .map_err(|e| render_error_response(&e, Status::BadRequest))?;

    info!(job_id = %job.id, url = %job.url, "Render requested");

    let report = pipeline
        .run(&job)
        .await
        .map_err(|failure| render_error_response(&failure.error, Status::BadGateway))?;

    if let Err(e) = FsOps::write_bytes_safe(&config.output_path, &report.pdf).await {
        error!("Failed to persist render output: {:#}", e);
        return Err(StandardErrorResponse::new(
            format!("Failed to save document: {}", e),
            "OUTPUT_WRITE_FAILED".to_string(),
            vec!["Check that the output path is writable".to_string()],
        )
        .with_status(Status::InternalServerError));
    }

    Ok(RawHtml(pages::render_form()))
}

fn render_error_response(error: &RenderError, status: Status) -> ApiError {
    let suggestions = match error {
        RenderError::InvalidTarget { .. } => {
            vec!["Use an absolute http or https URL".to_string()]
        }
        RenderError::Channel(_) | RenderError::Protocol(_) => vec![
            "Check that the browser is running with remote debugging enabled".to_string(),
            "Try again in a few moments".to_string(),
        ],
        RenderError::Navigation { .. } => vec!["Check that the target host is reachable".to_string()],
        RenderError::ReadyTimeout { .. } => vec![
            "Increase READY_TIMEOUT_SECS".to_string(),
            "Use a selector the page actually renders".to_string(),
        ],
        RenderError::Capture(_) => vec!["Try again in a few moments".to_string()],
    };

    StandardErrorResponse::new(error.to_string(), error.error_code().to_string(), suggestions)
        .with_status(status)
}
