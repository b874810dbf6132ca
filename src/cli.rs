// src/cli.rs
use crate::core::{BrowserConfig, ConfigManager, FsOps};
use crate::dataset::JsonFileSnapshot;
use crate::query::{QueryGateway, QueryRequest};
use crate::render::{DevToolsChannel, RenderJob, RenderPipeline};
use crate::utils::format_elapsed;
use crate::web::start_web_server;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "job-press")]
#[command(about = "Job postings query service and URL to PDF renderer")]
pub struct JobPressCli {
    #[command(subcommand)]
    pub command: Option<JobPressCommand>,
}

#[derive(Subcommand)]
pub enum JobPressCommand {
    /// Run the HTTP server (default)
    Serve,
    /// Render one URL to PDF through the configured browser
    Render {
        url: String,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        selector: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Run a query document against the dataset and print the response envelope
    Query {
        document: String,
        #[arg(long)]
        dataset: Option<PathBuf>,
        #[arg(long)]
        variables: Option<String>,
    },
}

pub async fn handle_command(cli: JobPressCli, config: ConfigManager) -> Result<()> {
    match cli.command.unwrap_or(JobPressCommand::Serve) {
        JobPressCommand::Serve => start_web_server(config).await,

        JobPressCommand::Render {
            url,
            output,
            selector,
            timeout_secs,
        } => {
            let job = render_job(&config.browser, &url, selector, timeout_secs)?;

            let channel = DevToolsChannel::new(
                config.browser.devtools_url.clone(),
                config.browser.command_timeout,
            )?;
            let pipeline = RenderPipeline::new(Arc::new(channel));

            let report = match pipeline.run(&job).await {
                Ok(report) => report,
                Err(failure) => {
                    error!("❌ {}", failure);
                    return Err(failure.into());
                }
            };

            let output = output.unwrap_or(config.environment.output_path);
            FsOps::write_bytes_safe(&output, &report.pdf).await?;
            info!(
                "✅ Rendered {} to {} in {}",
                report.url,
                output.display(),
                format_elapsed(report.elapsed)
            );
            Ok(())
        }

        JobPressCommand::Query {
            document,
            dataset,
            variables,
        } => {
            let dataset = dataset.unwrap_or(config.environment.dataset_path);
            let gateway = QueryGateway::new(Arc::new(JsonFileSnapshot::new(dataset)));

            let mut request = QueryRequest::new(document);
            request.variables = parse_variables(variables.as_deref())?;

            let response = gateway.execute(&request);
            let rendered = serde_json::to_string_pretty(&response)
                .context("Failed to serialize query response")?;
            println!("{}", rendered);
            Ok(())
        }
    }
}

/// Configured job for `url` with the command line overrides applied.
fn render_job(
    browser: &BrowserConfig,
    url: &str,
    selector: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<RenderJob> {
    let mut job = browser.job_for(url)?;
    if let Some(selector) = selector {
        job = job.with_selector(selector);
    }
    if let Some(secs) = timeout_secs {
        if secs == 0 {
            anyhow::bail!("--timeout-secs must be greater than zero");
        }
        job = job.with_ready_timeout(Duration::from_secs(secs));
    }
    Ok(job)
}

fn parse_variables(raw: Option<&str>) -> Result<Option<Map<String, Value>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw).context("--variables must be valid JSON")? {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        _ => anyhow::bail!("--variables must be a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = JobPressCli::try_parse_from(["job-press"]).unwrap();
        assert!(cli.command.is_none());

        let cli = JobPressCli::try_parse_from([
            "job-press",
            "render",
            "https://www.github.com",
            "--selector",
            "main",
            "--timeout-secs",
            "5",
        ])
        .unwrap();
        match cli.command {
            Some(JobPressCommand::Render {
                url,
                selector,
                timeout_secs,
                output,
            }) => {
                assert_eq!(url, "https://www.github.com");
                assert_eq!(selector.as_deref(), Some("main"));
                assert_eq!(timeout_secs, Some(5));
                assert!(output.is_none());
            }
            _ => panic!("expected render command"),
        }
    }

    #[test]
    fn test_render_job_overrides() {
        let browser = BrowserConfig::default();

        let job = render_job(&browser, "https://www.github.com", Some("main".to_string()), Some(3))
            .unwrap();
        assert_eq!(job.selector, "main");
        assert_eq!(job.ready_timeout, Duration::from_secs(3));

        let job = render_job(&browser, "https://www.github.com", None, None).unwrap();
        assert_eq!(job.ready_timeout, browser.ready_timeout);

        let err = render_job(&browser, "https://www.github.com", None, Some(0)).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_parse_variables() {
        assert!(parse_variables(None).unwrap().is_none());
        assert!(parse_variables(Some("null")).unwrap().is_none());

        let vars = parse_variables(Some(r#"{"id": 2}"#)).unwrap().unwrap();
        assert_eq!(vars["id"], Value::from(2));

        assert!(parse_variables(Some("[1]")).is_err());
        assert!(parse_variables(Some("{")).is_err());
    }
}
