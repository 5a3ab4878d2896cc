use super::SendRequest;
use super::message::{HttpRequest, HttpResponse, TransportError, TransportResult};

use http::HeaderMap;
use std::borrow::Cow;

/// [`SendRequest`] over a `reqwest` [`Client`].
///
/// The `Client` keeps a connection pool, and cloning it shares the pool, so a
/// single `ReqwestClient` should be built and reused for all uploads.
///
/// Relative request URLs are resolved against the API root. Headers that
/// every request needs, like `Authorization` and `Accept`, are supplied by
/// the caller with [`with_default_headers`](ReqwestClient::with_default_headers).
///
/// [`Client`]: reqwest::Client
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    api_root: Cow<'static, str>,
    default_headers: HeaderMap,
}

impl ReqwestClient {
    /// Create a new `ReqwestClient` from an existing `reqwest::Client` and
    /// the root URL of the API, e.g. `https://api.example.com`.
    pub fn new<T: Into<Cow<'static, str>>>(client: reqwest::Client, api_root: T) -> Self {
        let api_root: Cow<'static, str> = api_root.into();
        let api_root = match api_root.strip_suffix('/') {
            Some(root) => Cow::Owned(root.to_string()),
            _ => api_root,
        };
        Self {
            client,
            api_root,
            default_headers: HeaderMap::new(),
        }
    }

    /// Set headers that are added to every request.
    pub fn with_default_headers(self, headers: HeaderMap) -> Self {
        Self {
            default_headers: headers,
            ..self
        }
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match url.strip_prefix('/') {
            Some(path) => format!("{}/{path}", self.api_root),
            _ => format!("{}/{url}", self.api_root),
        }
    }
}

impl SendRequest for ReqwestClient {
    async fn send_request(&self, req: HttpRequest) -> TransportResult<HttpResponse> {
        let url = self.resolve(&req.url);
        let mut builder = self
            .client
            .request(req.method, url)
            .headers(self.default_headers.clone())
            .headers(req.headers)
            .body(req.body);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse::new(status, headers, body))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else {
            Self::other(value)
        }
    }
}
