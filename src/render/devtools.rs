// src/render/devtools.rs
//! Chrome DevTools protocol client: HTTP for target management, WebSocket for page commands.

use super::channel::{BrowserChannel, BrowserSession};
use super::RenderError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

pub const DEFAULT_DEVTOOLS_URL: &str = "http://127.0.0.1:9222";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const LOAD_EVENT: &str = "Page.loadEventFired";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    id: String,
    web_socket_debugger_url: String,
}

/// Browser reachable through its remote debugging endpoint, e.g. `chrome --remote-debugging-port=9222`.
pub struct DevToolsChannel {
    http: Client,
    endpoint: String,
    command_timeout: Duration,
}

impl DevToolsChannel {
    pub fn new(endpoint: impl Into<String>, command_timeout: Duration) -> Result<Self, RenderError> {
        let http = Client::builder()
            .timeout(command_timeout)
            .build()
            .map_err(|e| RenderError::Channel(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            command_timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BrowserChannel for DevToolsChannel {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, RenderError> {
        let url = format!("{}/json/new?about:blank", self.endpoint);
        debug!("Creating browser target: {}", url);

        let target: TargetInfo = self
            .http
            .put(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| RenderError::Channel(format!("failed to create target: {}", e)))?
            .json()
            .await
            .map_err(|e| RenderError::Channel(format!("invalid target description: {}", e)))?;

        let (socket, _) = connect_async(target.web_socket_debugger_url.as_str())
            .await
            .map_err(|e| RenderError::Channel(format!("WebSocket connection failed: {}", e)))?;

        info!("Opened browser session {}", target.id);
        Ok(Box::new(DevToolsSession::new(
            socket,
            target.id,
            self.http.clone(),
            self.endpoint.clone(),
            self.command_timeout,
        )))
    }
}

pub struct DevToolsSession {
    socket: Socket,
    target_id: String,
    http: Client,
    endpoint: String,
    command_timeout: Duration,
    next_id: u64,
    page_events: bool,
    load_fired: bool,
    closed: bool,
}

impl DevToolsSession {
    pub(crate) fn new(
        socket: Socket,
        target_id: String,
        http: Client,
        endpoint: String,
        command_timeout: Duration,
    ) -> Self {
        Self {
            socket,
            target_id,
            http,
            endpoint,
            command_timeout,
            next_id: 0,
            page_events: false,
            load_fired: false,
            closed: false,
        }
    }

    fn close_url(&self) -> String {
        format!("{}/json/close/{}", self.endpoint, self.target_id)
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value, RenderError> {
        let reply = self.send_command(method, params).await?;
        command_result(method, reply)
    }

    /// Send one command and return the raw reply frame carrying its id.
    async fn send_command(&mut self, method: &str, params: Value) -> Result<Value, RenderError> {
        self.next_id += 1;
        let id = self.next_id;
        let command = json!({ "id": id, "method": method, "params": params });
        debug!(target_id = %self.target_id, id, method, "Sending DevTools command");

        let timeout = self.command_timeout;
        tokio::time::timeout(timeout, self.exchange(id, method, command))
            .await
            .map_err(|_| {
                RenderError::Protocol(format!("{} not acknowledged within {:?}", method, timeout))
            })?
    }

    async fn exchange(&mut self, id: u64, method: &str, command: Value) -> Result<Value, RenderError> {
        self.socket
            .send(Message::text(command.to_string()))
            .await
            .map_err(|e| RenderError::Channel(format!("failed to send {}: {}", method, e)))?;

        loop {
            let frame = self.next_frame(method).await?;
            if frame.get("id").and_then(Value::as_u64) == Some(id) {
                return Ok(frame);
            }
        }
    }

    /// Next JSON frame from the page. Load events are recorded as they pass.
    async fn next_frame(&mut self, waiting_for: &str) -> Result<Value, RenderError> {
        while let Some(message) = self.socket.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let frame: Value = serde_json::from_str(&text).map_err(|e| {
                        RenderError::Protocol(format!(
                            "malformed frame while waiting for {}: {}",
                            waiting_for, e
                        ))
                    })?;
                    if frame.get("method").and_then(Value::as_str) == Some(LOAD_EVENT) {
                        self.load_fired = true;
                    }
                    return Ok(frame);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(RenderError::Channel(format!(
                        "connection error while waiting for {}: {}",
                        waiting_for, e
                    )))
                }
            }
        }
        Err(RenderError::Channel(format!(
            "connection closed while waiting for {}",
            waiting_for
        )))
    }

    async fn drain_until_loaded(&mut self) -> Result<(), RenderError> {
        while !self.load_fired {
            self.next_frame(LOAD_EVENT).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for DevToolsSession {
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), RenderError> {
        self.call(
            "Emulation.setUserAgentOverride",
            json!({ "userAgent": user_agent }),
        )
        .await?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        if !self.page_events {
            self.call("Page.enable", json!({})).await?;
            self.page_events = true;
        }

        self.load_fired = false;
        let result = self.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(reason) = navigation_error(&result) {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                reason,
            });
        }

        let timeout = self.command_timeout;
        tokio::time::timeout(timeout, self.drain_until_loaded())
            .await
            .map_err(|_| RenderError::Navigation {
                url: url.to_string(),
                reason: format!("page did not finish loading within {:?}", timeout),
            })?
    }

    async fn wait_visible(&mut self, selector: &str) -> Result<(), RenderError> {
        let expression = visibility_expression(selector);
        loop {
            let reply = self
                .send_command(
                    "Runtime.evaluate",
                    json!({ "expression": expression, "returnByValue": true }),
                )
                .await?;

            if lost_execution_context(&reply) {
                debug!(target_id = %self.target_id, "Execution context replaced, polling again");
            } else if evaluation_is_true(&command_result("Runtime.evaluate", reply)?)? {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn print_to_pdf(&mut self, print_background: bool) -> Result<Vec<u8>, RenderError> {
        let result = self
            .call(
                "Page.printToPDF",
                json!({ "printBackground": print_background }),
            )
            .await
            .map_err(|e| RenderError::Capture(e.to_string()))?;
        decode_pdf(&result)
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.socket.close(None).await {
            warn!("Failed to close DevTools socket for {}: {}", self.target_id, e);
        }

        self.http
            .get(self.close_url())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                RenderError::Channel(format!("failed to close target {}: {}", self.target_id, e))
            })?;

        info!("Closed browser session {}", self.target_id);
        Ok(())
    }
}

impl Drop for DevToolsSession {
    // A cancelled job never reaches `close`; the target is torn down in the background instead.
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Browser target {} left open: no runtime to close it", self.target_id);
            return;
        };

        let http = self.http.clone();
        let url = self.close_url();
        let target_id = self.target_id.clone();
        runtime.spawn(async move {
            match http.get(&url).send().await {
                Ok(_) => info!("Closed abandoned browser session {}", target_id),
                Err(e) => warn!("Failed to close abandoned target {}: {}", target_id, e),
            }
        });
    }
}

fn command_result(method: &str, mut reply: Value) -> Result<Value, RenderError> {
    if let Some(error) = reply.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(RenderError::Protocol(format!("{} failed: {}", method, message)));
    }
    Ok(reply.get_mut("result").map(Value::take).unwrap_or(Value::Null))
}

fn navigation_error(result: &Value) -> Option<String> {
    result
        .get("errorText")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn visibility_expression(selector: &str) -> String {
    // JSON string literals are valid JavaScript string literals.
    let literal = Value::String(selector.to_string()).to_string();
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         const style = window.getComputedStyle(el); \
         if (style.visibility === 'hidden' || style.display === 'none') return false; \
         const rect = el.getBoundingClientRect(); \
         return rect.width > 0 || rect.height > 0; }})()",
        literal
    )
}

/// Evaluation raced a navigation that replaced the document.
fn lost_execution_context(reply: &Value) -> bool {
    reply
        .pointer("/error/message")
        .and_then(Value::as_str)
        .is_some_and(|message| {
            message.contains("Execution context was destroyed")
                || message.contains("Cannot find context")
                || message.contains("Cannot find default execution context")
        })
}

fn evaluation_is_true(result: &Value) -> Result<bool, RenderError> {
    if let Some(details) = result.get("exceptionDetails") {
        let text = details
            .pointer("/exception/description")
            .or_else(|| details.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("evaluation failed");
        return Err(RenderError::Protocol(format!("readiness check failed: {}", text)));
    }
    Ok(result.pointer("/result/value").and_then(Value::as_bool) == Some(true))
}

fn decode_pdf(result: &Value) -> Result<Vec<u8>, RenderError> {
    let data = result
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| RenderError::Capture("reply carries no document data".to_string()))?;
    STANDARD
        .decode(data)
        .map_err(|e| RenderError::Capture(format!("invalid document encoding: {}", e)))
}
