//! Marathon REST client.
//!
//! One HTTP/1.1 connection per call, driven in the background while the
//! request is in flight. Every REST call carries a deadline; the event
//! stream only has one on connect and response headers.

use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use bridge_core::BridgeConfig;

use crate::error::{ClientError, ClientResult};
use crate::types::{App, AppResponse, AppUpdate, Deployment, DeploymentResult, Group, Task, TasksResponse};

const JSON: &str = "application/json";
const EVENT_STREAM: &str = "text/event-stream";
const AGENT: &str = "marathon-bridge/0.1";

#[derive(Debug, Clone)]
pub struct MarathonClient {
    /// `host:port` to connect to.
    address: String,
    /// Value of the `Host` header.
    host: String,
    /// Path prefix of the base URL, without trailing slash.
    base_path: String,
    timeout: Duration,
}

impl MarathonClient {
    /// Build a client for `base_url` (`http://host[:port][/prefix]`).
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let uri: Uri = base_url
            .trim()
            .parse()
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if uri.scheme_str() != Some("http") {
            return Err(ClientError::InvalidUrl(format!(
                "{base_url}: only http:// is supported"
            )));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| ClientError::InvalidUrl(format!("{base_url}: missing host")))?;
        let port = authority.port_u16().unwrap_or(80);

        Ok(Self {
            address: format!("{}:{port}", authority.host()),
            host: authority.as_str().to_string(),
            base_path: uri.path().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &BridgeConfig) -> ClientResult<Self> {
        Self::new(config.base_url(), config.request_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ── Groups ────────────────────────────────────────────────────

    pub async fn create_group(&self, group: &Group) -> ClientResult<DeploymentResult> {
        self.request_json(Method::POST, "/v2/groups", Some(group)).await
    }

    pub async fn delete_group(&self, group_id: &str) -> ClientResult<DeploymentResult> {
        let path = format!("/v2/groups/{}?force=true", trim_id(group_id));
        self.request_json::<(), _>(Method::DELETE, &path, None).await
    }

    pub async fn get_group(&self, group_id: &str) -> ClientResult<Group> {
        let path = format!("/v2/groups/{}", trim_id(group_id));
        self.request_json::<(), _>(Method::GET, &path, None).await
    }

    // ── Deployments ───────────────────────────────────────────────

    pub async fn get_deployments(&self) -> ClientResult<Vec<Deployment>> {
        self.request_json::<(), _>(Method::GET, "/v2/deployments", None)
            .await
    }

    // ── Apps ──────────────────────────────────────────────────────

    pub async fn get_app(&self, app_id: &str) -> ClientResult<App> {
        let path = format!("/v2/apps/{}", trim_id(app_id));
        let response: AppResponse = self.request_json::<(), _>(Method::GET, &path, None).await?;
        Ok(response.app)
    }

    pub async fn get_app_tasks(&self, app_id: &str) -> ClientResult<Vec<Task>> {
        let path = format!("/v2/apps/{}/tasks", trim_id(app_id));
        let response: TasksResponse = self.request_json::<(), _>(Method::GET, &path, None).await?;
        Ok(response.tasks)
    }

    pub async fn update_app(&self, app_id: &str, update: &AppUpdate) -> ClientResult<DeploymentResult> {
        let path = format!("/v2/apps/{}?force=true", trim_id(app_id));
        self.request_json(Method::PUT, &path, Some(update)).await
    }

    // ── Events ────────────────────────────────────────────────────

    /// Open `/v2/events` filtered to `event_types`.
    pub async fn open_event_stream(&self, event_types: &[&str]) -> ClientResult<EventStream> {
        let query: Vec<String> = event_types
            .iter()
            .map(|name| format!("event_type={name}"))
            .collect();
        let path = if query.is_empty() {
            "/v2/events".to_string()
        } else {
            format!("/v2/events?{}", query.join("&"))
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.send(Method::GET, &path, Bytes::new(), EVENT_STREAM),
        )
        .await
        .map_err(|_| ClientError::Timeout(self.timeout))??;

        let status = response.status();
        debug!(path = %path, status = status.as_u16(), "marathon event stream response");
        if !status.is_success() {
            let body = read_body(response.into_body()).await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(EventStream {
            body: response.into_body(),
        })
    }

    // ── Transport ─────────────────────────────────────────────────

    async fn request_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = match body {
            Some(body) => Bytes::from(
                serde_json::to_vec(body).map_err(|e| ClientError::Decode(e.to_string()))?,
            ),
            None => Bytes::new(),
        };

        let exchange = async {
            let response = self.send(method.clone(), path, payload, JSON).await?;
            let status = response.status();
            let bytes = read_body(response.into_body()).await?;
            Ok::<_, ClientError>((status, bytes))
        };
        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;

        debug!(%method, path, status = status.as_u16(), "marathon request");

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(format!("{path}: {e}")))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        accept: &str,
    ) -> ClientResult<Response<Incoming>> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| ClientError::Transport(format!("connect {}: {e}", self.address)))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ClientError::Transport(format!("handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "marathon connection closed with error");
            }
        });

        let request = Request::builder()
            .method(method)
            .uri(format!("{}{path}", self.base_path))
            .header(HOST, &self.host)
            .header(USER_AGENT, AGENT)
            .header(ACCEPT, accept)
            .header(CONTENT_TYPE, JSON)
            .body(Full::new(body))
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        sender
            .send_request(request)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

/// Body of a `text/event-stream` response, read chunk by chunk.
#[derive(Debug)]
pub struct EventStream {
    body: Incoming,
}

impl EventStream {
    /// Next data chunk; `Ok(None)` once Marathon closes the stream.
    pub async fn next_chunk(&mut self) -> ClientResult<Option<Bytes>> {
        loop {
            match self.body.frame().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        return Ok(Some(data));
                    }
                }
            }
        }
    }
}

async fn read_body(body: Incoming) -> ClientResult<Bytes> {
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| ClientError::Transport(e.to_string()))
}

fn trim_id(id: &str) -> &str {
    id.trim_matches('/')
}
