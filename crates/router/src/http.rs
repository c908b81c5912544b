//! HTTP JSON transport
//!
//! POSTs a wake or execute request to the site's listener. Listeners on a
//! private network commonly present self-signed certificates, which
//! `[http] accept_invalid_certs` allows.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use wakegate_core::{ErrorKind, HttpConfig, HttpRequestKind, Site, TimeoutConfig};

/// HTTP transport errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// Listener answered with a non-2xx status
    #[error("Listener returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl HttpError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            HttpError::Timeout { .. } => ErrorKind::Timeout,
            HttpError::Status { .. } => ErrorKind::RemoteRejected,
            HttpError::Client(_) => ErrorKind::Configuration,
            HttpError::Request { .. } => ErrorKind::TransportError,
        }
    }
}

/// `/wol` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WolBody {
    pub mac: String,
    pub ip: String,
    pub port: u16,
}

/// `/execute` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecuteBody {
    pub command: String,
}

/// Serialized request ready to POST.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRequest {
    pub path: &'static str,
    pub body: serde_json::Value,
}

impl JsonRequest {
    /// Body for `request` against `site`.
    pub fn for_site(site: &Site, request: &HttpRequestKind) -> Result<Self, HttpError> {
        let body = match request {
            HttpRequestKind::Wol { broadcast_ip, port } => serde_json::to_value(WolBody {
                mac: site.hardware_id.clone(),
                ip: broadcast_ip.clone(),
                port: *port,
            }),
            HttpRequestKind::Execute { command } => serde_json::to_value(ExecuteBody {
                command: command.clone(),
            }),
        }
        .map_err(|e| HttpError::Client(format!("request body: {e}")))?;

        Ok(Self {
            path: request.path(),
            body,
        })
    }
}

/// Join a site endpoint with a request path. Bare hosts default to HTTPS.
pub fn request_url(endpoint: &str, path: &str) -> String {
    let base = endpoint.trim().trim_end_matches('/');
    if base.contains("://") {
        format!("{base}{path}")
    } else {
        format!("https://{base}{path}")
    }
}

/// Reusable HTTP JSON client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client with the configured connect bound.
    ///
    /// reqwest has no separate read and write bounds, so the whole exchange
    /// is capped by the sum of the connect, read and write budgets.
    pub fn new(timeouts: &TimeoutConfig, http: &HttpConfig) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .timeout(timeouts.connect() + timeouts.read() + timeouts.write())
            .danger_accept_invalid_certs(http.accept_invalid_certs)
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// POST `request` to `endpoint`; returns the response body on 2xx.
    pub async fn post(&self, endpoint: &str, request: &JsonRequest) -> Result<String, HttpError> {
        let url = request_url(endpoint, request.path);
        debug!(url = %url, "sending JSON request");

        let response = self
            .client
            .post(&url)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| classify(&url, e))?;

        if status.is_success() {
            info!(url = %url, status = status.as_u16(), "listener accepted request");
            Ok(body)
        } else {
            warn!(url = %url, status = status.as_u16(), "listener rejected request");
            Err(HttpError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn classify(url: &str, err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout {
            url: url.to_string(),
        }
    } else {
        HttpError::Request {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::spawn_listener;
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use wakegate_core::SiteAction;

    fn site(request: HttpRequestKind) -> Site {
        Site {
            id: "nas".to_string(),
            display_name: "NAS".to_string(),
            local_endpoint: "https://10.0.0.9".to_string(),
            tunnel_endpoint: "https://10.8.0.9".to_string(),
            hardware_id: "AA:BB:CC:DD:EE:FF".to_string(),
            action: SiteAction::HttpJson { request },
        }
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(&TimeoutConfig::default(), &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_request_url() {
        assert_eq!(request_url("https://10.0.0.9:8443/", "/wol"), "https://10.0.0.9:8443/wol");
        assert_eq!(request_url("10.0.0.9", "/execute"), "https://10.0.0.9/execute");
        assert_eq!(request_url("http://127.0.0.1:80", "/wol"), "http://127.0.0.1:80/wol");
    }

    #[test]
    fn test_wol_body_shape() {
        let request = HttpRequestKind::Wol {
            broadcast_ip: "10.0.0.255".to_string(),
            port: 9,
        };
        let json = JsonRequest::for_site(&site(request.clone()), &request).unwrap();
        assert_eq!(json.path, "/wol");
        assert_eq!(
            json.body,
            json!({"mac": "AA:BB:CC:DD:EE:FF", "ip": "10.0.0.255", "port": 9})
        );
    }

    #[tokio::test]
    async fn test_post_success_returns_body() {
        let (base, received) = spawn_listener(StatusCode::OK, "WOL packet sent").await;
        let request = HttpRequestKind::Execute {
            command: "shutdown -r".to_string(),
        };
        let json = JsonRequest::for_site(&site(request.clone()), &request).unwrap();

        let body = transport().post(&base, &json).await.unwrap();
        assert_eq!(body, "WOL packet sent");

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "/execute");
        assert_eq!(received[0].1, json!({"command": "shutdown -r"}));
    }

    #[tokio::test]
    async fn test_non_success_status_is_preserved() {
        let (base, _) = spawn_listener(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        let request = HttpRequestKind::Wol {
            broadcast_ip: "10.0.0.255".to_string(),
            port: 9,
        };
        let json = JsonRequest::for_site(&site(request.clone()), &request).unwrap();

        let err = transport().post(&base, &json).await.unwrap_err();
        assert!(matches!(err, HttpError::Status { status: 500, ref body } if body == "boom"));
        assert_eq!(err.error_kind(), ErrorKind::RemoteRejected);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = HttpRequestKind::Execute {
            command: "true".to_string(),
        };
        let json = JsonRequest::for_site(&site(request.clone()), &request).unwrap();
        let err = transport()
            .post(&format!("http://{addr}"), &json)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::TransportError);
    }
}
