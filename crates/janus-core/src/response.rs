//! JSON bodies returned by the Janus HTTP surface.
//!
//! Every adapter serves the same routes and must produce byte-compatible
//! JSON, so the bodies live here rather than in the adapters.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use http::request::Parts;
use http::header;
use serde::{Deserialize, Serialize};

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the adapter is serving.
    pub status: String,
}

impl HealthResponse {
    /// The healthy response.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Body of `GET /logger`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerResponse {
    /// Level before the request.
    pub log_level_previous: String,
    /// Level after the request.
    pub log_level_current: String,
}

/// Body of `GET /framework`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkResponse {
    /// Framework serving the request.
    pub framework_previous: String,
    /// Framework requested (and switched to, if different).
    pub framework_current: String,
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Hostname of the machine running the service.
    pub host: String,
    /// Name of the active backend.
    pub framework: String,
    /// Echo of the incoming request.
    pub request: RequestEcho,
}

/// Echo of request metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEcho {
    /// `Host` header (or URI authority).
    pub host: String,
    /// Peer address.
    pub remote_addr: String,
    /// Path and query as received.
    pub request_uri: String,
    /// HTTP method.
    pub method: String,
    /// Protocol version, e.g. `HTTP/1.1`.
    pub proto: String,
    /// `User-Agent` header, empty if absent.
    pub user_agent: String,
    /// Parsed URL components.
    pub url: UrlEcho,
    /// All headers; repeated headers keep every value.
    pub headers: BTreeMap<String, Vec<String>>,
}

/// Parsed URL components of an echoed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEcho {
    /// Scheme, when the request target was absolute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Authority, when the request target was absolute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Request path.
    pub path: String,
    /// Raw query string without the leading `?`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_query: Option<String>,
}

impl RequestEcho {
    /// Builds the echo from request parts and the peer address.
    #[must_use]
    pub fn from_parts(parts: &Parts, remote_addr: SocketAddr) -> Self {
        let header_str = |name: header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };

        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in &parts.headers {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let uri = &parts.uri;
        Self {
            host: header_str(header::HOST)
                .or_else(|| uri.authority().map(ToString::to_string))
                .unwrap_or_default(),
            remote_addr: remote_addr.to_string(),
            request_uri: uri
                .path_and_query()
                .map_or_else(|| uri.path().to_string(), ToString::to_string),
            method: parts.method.to_string(),
            proto: format!("{:?}", parts.version),
            user_agent: header_str(header::USER_AGENT).unwrap_or_default(),
            url: UrlEcho {
                scheme: uri.scheme_str().map(ToString::to_string),
                host: uri.authority().map(ToString::to_string),
                path: uri.path().to_string(),
                raw_query: uri.query().map(ToString::to_string),
            },
            headers,
        }
    }
}

/// Error body sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error kind label.
    pub error: String,
    /// Client-safe message.
    pub message: String,
}

impl ErrorBody {
    /// Creates a new error body.
    #[must_use]
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn parts(builder: http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_echo_from_parts() {
        let parts = parts(
            Request::get("/hello?name=janus")
                .header("host", "example.test:3000")
                .header("user-agent", "curl/8.0")
                .header("accept", "text/plain")
                .header("accept", "application/json"),
        );
        let remote: SocketAddr = "10.0.0.1:51000".parse().unwrap();

        let echo = RequestEcho::from_parts(&parts, remote);

        assert_eq!(echo.host, "example.test:3000");
        assert_eq!(echo.remote_addr, "10.0.0.1:51000");
        assert_eq!(echo.request_uri, "/hello?name=janus");
        assert_eq!(echo.method, "GET");
        assert_eq!(echo.proto, "HTTP/1.1");
        assert_eq!(echo.user_agent, "curl/8.0");
        assert_eq!(echo.url.path, "/hello");
        assert_eq!(echo.url.raw_query.as_deref(), Some("name=janus"));
        assert_eq!(echo.headers["accept"].len(), 2);
    }

    #[test]
    fn test_echo_absolute_uri() {
        let parts = parts(Request::get("http://upstream.test/path"));
        let echo = RequestEcho::from_parts(&parts, "127.0.0.1:1".parse().unwrap());

        assert_eq!(echo.host, "upstream.test");
        assert_eq!(echo.url.scheme.as_deref(), Some("http"));
        assert_eq!(echo.user_agent, "");
    }

    #[test]
    fn test_health_body() {
        let json = serde_json::to_string(&HealthResponse::ok()).unwrap();
        assert_eq!(json, r#"{"status":"ok"}"#);
    }

    #[test]
    fn test_url_echo_skips_empty_fields() {
        let url = UrlEcho {
            scheme: None,
            host: None,
            path: "/".to_string(),
            raw_query: None,
        };
        assert_eq!(serde_json::to_string(&url).unwrap(), r#"{"path":"/"}"#);
    }
}
