//! HTTP implementation of the engine transport

use crate::config::EngineConfig;
use crate::engine::error::{TransportError, TransportResult};
use crate::engine::protocol::{
    decode_error_body, AnalyzeResponse, BulkResponse, ExplainResponse, SearchResponse, WriteAck,
};
use crate::engine::transport::EngineTransport;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("search-orchestrator/", env!("CARGO_PKG_VERSION"));

enum RequestBody<'a> {
    Json(&'a Value),
    NdJson(String),
}

/// Engine transport speaking JSON over HTTP
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
    bulk_timeout: Duration,
    credentials: Option<(String, String)>,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| AppError::Configuration(format!("Invalid engine URL {}: {}", config.url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(AppError::Configuration(format!(
                "Engine URL {} cannot be used as a base URL",
                config.url
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            request_timeout: config.request_timeout(),
            bulk_timeout: config.bulk_timeout(),
            credentials: config.credentials()?,
        })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> TransportResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Request(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the status together with the raw body
    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<RequestBody<'_>>,
        timeout: Duration,
    ) -> TransportResult<(StatusCode, String)> {
        let url = self.url(segments)?;
        debug!(method = %method, url = %url, "Engine request");

        let mut request = self.client.request(method, url).timeout(timeout);

        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        request = match body {
            Some(RequestBody::Json(value)) => request.json(value),
            Some(RequestBody::NdJson(lines)) => request
                .header("Content-Type", "application/x-ndjson")
                .body(lines),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout.as_millis() as u64)
            } else if e.is_connect() {
                TransportError::Connection(format!("Failed to connect to engine: {}", e))
            } else {
                TransportError::Request(format!("Engine request failed: {}", e))
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout.as_millis() as u64)
            } else {
                TransportError::Decode(format!("Failed to read response body: {}", e))
            }
        })?;

        Ok((status, body))
    }

    /// Send a request and decode a successful JSON response
    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<RequestBody<'_>>,
        timeout: Duration,
    ) -> TransportResult<T> {
        let (status, body) = self.send(method, segments, body, timeout).await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Send a request where only the status matters
    async fn send_ack(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<RequestBody<'_>>,
    ) -> TransportResult<()> {
        let (status, body) = self.send(method, segments, body, self.request_timeout).await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        Ok(())
    }
}

fn status_error(status: StatusCode, body: &str) -> TransportError {
    let (error_type, reason) = decode_error_body(body);
    TransportError::Status {
        status: status.as_u16(),
        error_type,
        reason,
    }
}

#[async_trait]
impl EngineTransport for HttpTransport {
    async fn index_exists(&self, index: &str) -> TransportResult<bool> {
        let (status, body) = self
            .send(Method::HEAD, &[index], None, self.request_timeout)
            .await?;

        match status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(status_error(other, &body)),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> TransportResult<()> {
        self.send_ack(Method::PUT, &[index], Some(RequestBody::Json(body)))
            .await
    }

    async fn delete_index(&self, index: &str) -> TransportResult<()> {
        self.send_ack(Method::DELETE, &[index], None).await
    }

    async fn put_mapping(&self, index: &str, doc_type: &str, body: &Value) -> TransportResult<()> {
        self.send_ack(
            Method::PUT,
            &[index, "_mapping", doc_type],
            Some(RequestBody::Json(body)),
        )
        .await
    }

    async fn get_mapping(&self, index: &str) -> TransportResult<Value> {
        self.send_json(Method::GET, &[index, "_mapping"], None, self.request_timeout)
            .await
    }

    async fn get_settings(&self, index: &str) -> TransportResult<Value> {
        self.send_json(Method::GET, &[index, "_settings"], None, self.request_timeout)
            .await
    }

    async fn refresh(&self, index: &str) -> TransportResult<()> {
        self.send_ack(Method::POST, &[index, "_refresh"], None).await
    }

    async fn analyze(&self, index: Option<&str>, body: &Value) -> TransportResult<AnalyzeResponse> {
        let segments: Vec<&str> = match index {
            Some(index) => vec![index, "_analyze"],
            None => vec!["_analyze"],
        };
        self.send_json(
            Method::POST,
            &segments,
            Some(RequestBody::Json(body)),
            self.request_timeout,
        )
        .await
    }

    async fn bulk(&self, body: String) -> TransportResult<BulkResponse> {
        self.send_json(
            Method::POST,
            &["_bulk"],
            Some(RequestBody::NdJson(body)),
            self.bulk_timeout,
        )
        .await
    }

    async fn index_document(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> TransportResult<WriteAck> {
        self.send_json(
            Method::PUT,
            &[index, doc_type, id],
            Some(RequestBody::Json(body)),
            self.request_timeout,
        )
        .await
    }

    async fn update_document(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> TransportResult<WriteAck> {
        self.send_json(
            Method::POST,
            &[index, doc_type, id, "_update"],
            Some(RequestBody::Json(body)),
            self.request_timeout,
        )
        .await
    }

    async fn delete_document(&self, index: &str, doc_type: &str, id: &str) -> TransportResult<WriteAck> {
        self.send_json(Method::DELETE, &[index, doc_type, id], None, self.request_timeout)
            .await
    }

    async fn search(
        &self,
        index: &str,
        doc_type: Option<&str>,
        body: &Value,
    ) -> TransportResult<SearchResponse> {
        let segments: Vec<&str> = match doc_type {
            Some(doc_type) => vec![index, doc_type, "_search"],
            None => vec![index, "_search"],
        };
        self.send_json(
            Method::POST,
            &segments,
            Some(RequestBody::Json(body)),
            self.request_timeout,
        )
        .await
    }

    async fn explain(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> TransportResult<ExplainResponse> {
        self.send_json(
            Method::POST,
            &[index, doc_type, id, "_explain"],
            Some(RequestBody::Json(body)),
            self.request_timeout,
        )
        .await
    }

    async fn suggest(&self, index: &str, body: &Value) -> TransportResult<Value> {
        self.send_json(
            Method::POST,
            &[index, "_suggest"],
            Some(RequestBody::Json(body)),
            self.request_timeout,
        )
        .await
    }
}
