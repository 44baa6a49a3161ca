// Upstream client: executes forwarded calls against backend services

use bytes::Bytes;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client, Method, StatusCode,
};
use serde_json::Value;
use tokio::time::Duration;

use crate::error::{GatewayError, GatewayResult};
use crate::proxy::config::UpstreamProxyConfig;

/// Request headers that belong to the inbound connection and are not forwarded
const STRIPPED_REQUEST_HEADERS: [header::HeaderName; 2] = [header::HOST, header::CONTENT_LENGTH];

/// Backend response body
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardedBody {
    Json(Value),
    /// Anything that did not parse as JSON, kept byte for byte
    Text(Bytes),
}

/// Normalized backend response, handed to the relay
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ForwardedBody,
}

pub struct UpstreamClient {
    http_client: Client,
    default_deadline: Duration,
}

impl UpstreamClient {
    pub fn new(
        default_deadline: Duration,
        proxy_config: Option<UpstreamProxyConfig>,
    ) -> GatewayResult<Self> {
        Ok(Self {
            http_client: crate::utils::http::create_client_with_proxy(proxy_config)?,
            default_deadline,
        })
    }

    pub fn default_deadline(&self) -> Duration {
        self.default_deadline
    }

    /// Send one request to `target_url` and wait at most `deadline` for the
    /// complete response. There is no retry.
    pub async fn forward(
        &self,
        target_url: &str,
        method: Method,
        headers: &HeaderMap,
        body: Option<Value>,
        deadline: Duration,
    ) -> GatewayResult<ForwardedResponse> {
        let mut outbound = headers.clone();
        for name in &STRIPPED_REQUEST_HEADERS {
            outbound.remove(name);
        }

        let sends_body = body.is_some() && method != Method::GET && method != Method::HEAD;

        let mut request = self
            .http_client
            .request(method.clone(), target_url)
            .timeout(deadline);
        if sends_body {
            outbound.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        request = request.headers(outbound);
        if let (true, Some(body)) = (sends_body, body) {
            request = request.json(&body);
        }

        tracing::debug!("Upstream call: {} {}", method, target_url);

        let call = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, bytes))
        };

        // Dropping the timed-out future cancels the in-flight call
        let (status, headers, bytes) = match tokio::time::timeout(deadline, call).await {
            Err(_) => {
                tracing::warn!("Upstream {} timed out after {:?}", target_url, deadline);
                return Err(GatewayError::UpstreamTimeout(deadline));
            }
            Ok(Err(e)) if e.is_timeout() => {
                tracing::warn!("Upstream {} timed out: {}", target_url, e);
                return Err(GatewayError::UpstreamTimeout(deadline));
            }
            Ok(Err(e)) => {
                tracing::warn!("Upstream {} unreachable: {}", target_url, e);
                return Err(GatewayError::UpstreamUnreachable(e));
            }
            Ok(Ok(parts)) => parts,
        };

        let body = match serde_json::from_slice::<Value>(&bytes) {
            Ok(json) => ForwardedBody::Json(json),
            Err(_) => ForwardedBody::Text(bytes),
        };

        Ok(ForwardedResponse {
            status,
            headers,
            body,
        })
    }
}
