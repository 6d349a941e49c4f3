//! HTTP(S) transport for the agent-style advisory oracle.
//!
//! Speaks the agent API envelope: the prompt travels as `showText` and the
//! answer comes back as a `txt` content item that must hold the candidate
//! JSON object.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, HOST};
use http::{Method, Request};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::{Position, Url};

use super::prompt::render_prompt;
use super::{parse_candidate, AdvisoryError, AdvisoryOracle, AdvisoryRequest, CandidatePartition};
use crate::config::AdvisoryConfig;

const DEFAULT_OPEN_ID: &str = "roommate-allocator";

/// Oracle reached over HTTP/1.1, with TLS for `https` endpoints.
#[derive(Debug, Clone)]
pub struct HttpAdvisoryOracle {
    endpoint: Url,
    tls: Option<Arc<rustls::ClientConfig>>,
    app_id: Option<String>,
    secret_key: Option<String>,
    open_id: String,
}

impl HttpAdvisoryOracle {
    pub fn new(
        endpoint: &str,
        app_id: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Self, AdvisoryError> {
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|err| AdvisoryError::UnsupportedEndpoint(format!("{endpoint} ({err})")))?;

        let tls = match endpoint.scheme() {
            "http" => None,
            "https" => Some(Arc::new(webpki_client_config()?)),
            other => {
                return Err(AdvisoryError::UnsupportedEndpoint(format!(
                    "{endpoint} (scheme {other} is not http or https)"
                )))
            }
        };
        if endpoint.host_str().is_none() {
            return Err(AdvisoryError::UnsupportedEndpoint(endpoint.to_string()));
        }

        Ok(Self {
            endpoint,
            tls,
            app_id,
            secret_key,
            open_id: DEFAULT_OPEN_ID.to_string(),
        })
    }

    pub fn with_open_id(mut self, open_id: impl Into<String>) -> Self {
        self.open_id = open_id.into();
        self
    }

    /// Replace the TLS settings, e.g. to trust a private root.
    pub fn with_tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        if self.tls.is_some() {
            self.tls = Some(config);
        }
        self
    }

    pub fn uses_tls(&self) -> bool {
        self.tls.is_some()
    }

    fn request_target(&self) -> String {
        let mut url = self.endpoint.clone();
        let params: Vec<(&str, &str)> = [
            ("appId", self.app_id.as_deref()),
            ("secretKey", self.secret_key.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect();

        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        url[Position::BeforePath..Position::AfterQuery].to_string()
    }

    fn host(&self) -> Result<&str, AdvisoryError> {
        self.endpoint
            .host_str()
            .ok_or_else(|| AdvisoryError::UnsupportedEndpoint(self.endpoint.to_string()))
    }

    fn socket_address(&self) -> Result<String, AdvisoryError> {
        let host = self.host()?;
        let port = self.endpoint.port_or_known_default().unwrap_or(80);
        Ok(format!("{host}:{port}"))
    }

    fn host_header(&self) -> Result<String, AdvisoryError> {
        let host = self.host()?;
        Ok(match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    async fn exchange(&self, body: Vec<u8>) -> Result<Bytes, AdvisoryError> {
        let address = self.socket_address()?;
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|err| AdvisoryError::Transport(format!("connect {address}: {err}")))?;

        match &self.tls {
            Some(config) => {
                let host = self.host()?.trim_start_matches('[').trim_end_matches(']');
                let server_name = ServerName::try_from(host)
                    .map_err(|err| AdvisoryError::UnsupportedEndpoint(format!("{host}: {err}")))?
                    .to_owned();
                let stream = TlsConnector::from(Arc::clone(config))
                    .connect(server_name, stream)
                    .await
                    .map_err(|err| AdvisoryError::Transport(format!("tls {address}: {err}")))?;
                self.send(stream, body).await
            }
            None => self.send(stream, body).await,
        }
    }

    async fn send<S>(&self, stream: S, body: Vec<u8>) -> Result<Bytes, AdvisoryError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|err| AdvisoryError::Transport(err.to_string()))?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                debug!(error = %err, "advisory connection closed with error");
            }
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.request_target())
            .header(HOST, self.host_header()?)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|err| AdvisoryError::Transport(err.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|err| AdvisoryError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisoryError::HttpStatus(status.as_u16()));
        }

        let collected = response
            .into_body()
            .collect()
            .await
            .map_err(|err| AdvisoryError::Transport(err.to_string()))?;
        Ok(collected.to_bytes())
    }
}

/// Client settings trusting the Mozilla root store.
fn webpki_client_config() -> Result<rustls::ClientConfig, AdvisoryError> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(
        rustls::crypto::ring::default_provider().into(),
    )
    .with_safe_default_protocol_versions()
    .map_err(|err| AdvisoryError::Transport(format!("tls protocol versions: {err}")))?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(config)
}

impl AdvisoryOracle for HttpAdvisoryOracle {
    async fn suggest(
        &self,
        request: &AdvisoryRequest,
    ) -> Result<CandidatePartition, AdvisoryError> {
        let envelope = AgentRequest::new(render_prompt(request), self);
        let body = serde_json::to_vec(&envelope)
            .map_err(|err| AdvisoryError::Transport(err.to_string()))?;

        let raw = self.exchange(body).await?;
        let text = reply_text(&raw)?;
        parse_candidate(&text)
    }
}

/// Pull the `txt` answer out of an agent reply envelope.
pub fn reply_text(raw: &[u8]) -> Result<String, AdvisoryError> {
    let reply: AgentReply =
        serde_json::from_slice(raw).map_err(|err| AdvisoryError::Malformed(err.to_string()))?;

    if reply.status != 0 {
        return Err(AdvisoryError::OracleStatus {
            status: reply.status,
            message: reply
                .message
                .unwrap_or_else(|| "oracle call failed".to_string()),
        });
    }

    reply
        .data
        .and_then(|data| {
            data.content
                .into_iter()
                .find(|item| item.data_type == "txt")
                .and_then(|item| item.data)
        })
        .ok_or_else(|| AdvisoryError::Malformed("reply carries no txt content".to_string()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentRequest {
    message: AgentMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    from: &'static str,
    open_id: String,
}

impl AgentRequest {
    fn new(show_text: String, oracle: &HttpAdvisoryOracle) -> Self {
        Self {
            message: AgentMessage {
                content: AgentContent {
                    kind: "text",
                    value: AgentValue { show_text },
                },
            },
            source: oracle.app_id.clone(),
            from: "openapi",
            open_id: oracle.open_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AgentMessage {
    content: AgentContent,
}

#[derive(Debug, Serialize)]
struct AgentContent {
    #[serde(rename = "type")]
    kind: &'static str,
    value: AgentValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentValue {
    show_text: String,
}

#[derive(Debug, Deserialize)]
struct AgentReply {
    status: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<AgentReplyData>,
}

#[derive(Debug, Deserialize)]
struct AgentReplyData {
    #[serde(default)]
    content: Vec<AgentReplyItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentReplyItem {
    data_type: String,
    #[serde(default)]
    data: Option<String>,
}

/// Oracle used when no endpoint is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledAdvisory;

impl AdvisoryOracle for DisabledAdvisory {
    async fn suggest(
        &self,
        _request: &AdvisoryRequest,
    ) -> Result<CandidatePartition, AdvisoryError> {
        Err(AdvisoryError::Disabled)
    }
}

/// Oracle selected from configuration at startup.
#[derive(Debug, Clone)]
pub enum AdvisoryBackend {
    Http(HttpAdvisoryOracle),
    Disabled(DisabledAdvisory),
}

impl AdvisoryBackend {
    pub fn from_config(config: &AdvisoryConfig) -> Result<Self, AdvisoryError> {
        match &config.endpoint {
            Some(endpoint) => HttpAdvisoryOracle::new(
                endpoint,
                config.app_id.clone(),
                config.secret_key.clone(),
            )
            .map(Self::Http),
            None => Ok(Self::Disabled(DisabledAdvisory)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

impl AdvisoryOracle for AdvisoryBackend {
    async fn suggest(
        &self,
        request: &AdvisoryRequest,
    ) -> Result<CandidatePartition, AdvisoryError> {
        match self {
            Self::Http(oracle) => oracle.suggest(request).await,
            Self::Disabled(oracle) => oracle.suggest(request).await,
        }
    }
}
