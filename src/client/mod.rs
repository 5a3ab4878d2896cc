//! This module contains `SendRequest`, the single operation every step of an
//! upload is built on.
use self::inner::{BoxedSendRequest, SendRequestInner};

use futures::future::Future;
use std::fmt::{self, Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

mod message;
pub use self::message::{HttpRequest, HttpResponse, TransportError, TransportResult};

mod inner;

mod transport;
pub use transport::ReqwestClient;

/// `SendRequest` sends one HTTP request to the remote service.
///
/// Implementations own authentication and resolve relative URLs against the
/// API root. A request that exceeds its timeout must fail with
/// [`TransportError::Timeout`] because the upload relies on telling timeouts
/// apart from other failures.
pub trait SendRequest: Send + Sync {
    /// Send the request, returning whatever response the server gave.
    ///
    /// Unsuccessful status codes are not errors at this level.
    fn send_request(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = TransportResult<HttpResponse>> + Send;
}

impl<D, T> SendRequest for T
where
    D: SendRequest,
    T: Deref<Target = D> + Send + Sync,
{
    async fn send_request(&self, req: HttpRequest) -> TransportResult<HttpResponse> {
        self.deref().send_request(req).await
    }
}

/// `UploadClient` holds a type that can implement the interface of
/// [`SendRequest`].
///
/// Cloning is cheap and clones share the underlying transport, so one client
/// can serve any number of concurrent uploads.
#[derive(Clone)]
pub struct UploadClient {
    pub(crate) inner: Arc<dyn BoxedSendRequest + Send + Sync>,
}

impl UploadClient {
    /// Create a new `UploadClient`.
    pub fn new<C>(client: C) -> Self
    where
        C: SendRequest + Send + Sync + 'static,
    {
        let inner = SendRequestInner::new(client);
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl SendRequest for UploadClient {
    async fn send_request(&self, req: HttpRequest) -> TransportResult<HttpResponse> {
        self.inner.send(req).await
    }
}

impl Debug for UploadClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadClient")
            .field("inner", &"SendRequest")
            .finish()
    }
}
