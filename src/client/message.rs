use crate::error::{ErrorRepr, Result};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

/// A `Result` for the transport layer.
pub type TransportResult<T> = ::std::result::Result<T, TransportError>;

/// A failure to get any response at all.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request did not finish within its timeout.
    #[error("request timed out")]
    Timeout,
    /// Any other failure to send the request or read the response.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl TransportError {
    /// Wrap an arbitrary error as a non-timeout transport failure.
    pub fn other<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(e))
    }
}

/// A request to the remote service.
///
/// `url` is either absolute, such as the upload link of a ticket, or a path
/// relative to the API root that the transport resolves.
#[derive(Clone)]
pub struct HttpRequest {
    /// Method of the request.
    pub method: Method,
    /// Absolute URL or path relative to the API root.
    pub url: String,
    /// Headers of the request.
    pub headers: HeaderMap,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// Body of the request, possibly empty.
    pub body: Bytes,
    /// How long to wait for the response.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request with no headers and an empty body.
    pub fn new<T: Into<String>>(method: Method, url: T) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: Bytes::new(),
            timeout: None,
        }
    }

    /// Set a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a query parameter.
    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body along with the matching content type.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(ErrorRepr::from)?;
        Ok(self
            .header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .body(body))
    }

    /// Set the timeout of this request.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Debug for HttpRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body", &format_args!("{} bytes", self.body.len()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// The raw response to a request.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// The full response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a new `HttpResponse`.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the value of the header if it is present and valid text.
    ///
    /// Header names are case-insensitive.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
